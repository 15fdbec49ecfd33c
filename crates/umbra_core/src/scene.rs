//! Scene description for the renderer.
//!
//! A scene is a flat list of drawables. Each drawable shares its geometry
//! through an `Arc` so the renderer can upload a mesh once and draw it many
//! times. The scene keeps a running bounding volume of everything added,
//! which drives camera framing and the shadow frustum.

use std::sync::Arc;

use umbra_math::{DrawableTransform, SceneBounds, Vec3};

use crate::mesh::{Mesh, MeshResult, Wire};
use crate::params::Material;

/// Geometry of a drawable.
#[derive(Clone, Debug)]
pub enum Geometry {
    Triangles(Arc<Mesh>),
    Lines(Arc<Wire>),
}

impl Geometry {
    /// Local-space points used for bounds.
    pub fn points(&self) -> &[Vec3] {
        match self {
            Geometry::Triangles(mesh) => mesh.positions(),
            Geometry::Lines(wire) => wire.points(),
        }
    }
}

/// A placed piece of geometry with its material.
#[derive(Clone, Debug)]
pub struct SceneObject {
    pub name: String,
    pub geometry: Geometry,
    pub transform: DrawableTransform,
    pub material: Material,
}

impl SceneObject {
    pub fn new(name: impl Into<String>, mesh: Mesh, transform: DrawableTransform, material: Material) -> Self {
        Self {
            name: name.into(),
            geometry: Geometry::Triangles(Arc::new(mesh)),
            transform,
            material,
        }
    }

    /// Geometry points in world space.
    pub fn world_points(&self) -> Vec<Vec3> {
        self.transform.apply(self.geometry.points())
    }

    pub fn triangle_count(&self) -> usize {
        match &self.geometry {
            Geometry::Triangles(mesh) => mesh.triangle_count(),
            Geometry::Lines(_) => 0,
        }
    }
}

/// Everything drawn by the lit, shadow and AO passes.
#[derive(Clone, Debug, Default)]
pub struct Scene {
    pub name: String,
    objects: Vec<SceneObject>,
    bounds: SceneBounds,
}

impl Scene {
    /// Create an empty scene.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            objects: Vec::new(),
            bounds: SceneBounds::empty(),
        }
    }

    /// Add a drawable and grow the scene bounds by its world-space points.
    pub fn add(&mut self, object: SceneObject) {
        self.bounds.merge(object.world_points());
        self.objects.push(object);
    }

    pub fn objects(&self) -> &[SceneObject] {
        &self.objects
    }

    /// World-space bounding volume of every drawable added so far.
    pub fn bounds(&self) -> &SceneBounds {
        &self.bounds
    }

    pub fn object_count(&self) -> usize {
        self.objects.len()
    }

    /// Get total triangle count across all drawables.
    pub fn total_triangle_count(&self) -> usize {
        self.objects.iter().map(SceneObject::triangle_count).sum()
    }

    /// The default scene: a box, a cone and a cylinder on a ground slab.
    pub fn primitives() -> MeshResult<Self> {
        let mut scene = Self::new("primitives");

        scene.add(SceneObject::new(
            "box",
            Mesh::cuboid(1.0, 1.0, 1.0)?,
            DrawableTransform::default(),
            Material::SHINY_RED,
        ));
        scene.add(SceneObject::new(
            "cone",
            Mesh::cone(0.8, 1.6, 16)?,
            DrawableTransform::new(Vec3::new(1.0, 2.0, 1.0), 1.5, Vec3::new(0.0, -1.0, 1.0), Vec3::ONE),
            Material::PLASTIC_GREEN,
        ));
        scene.add(SceneObject::new(
            "cylinder",
            Mesh::cylinder(0.6, 1.6, 16)?,
            DrawableTransform::new(Vec3::new(-1.0, -0.5, 1.0), 1.1, Vec3::new(0.0, 1.0, 1.0), Vec3::ONE),
            Material::COPPER,
        ));
        scene.add(ground_plane()?);

        Ok(scene)
    }

    /// An imported model standing on the ground slab.
    pub fn with_model(name: impl Into<String>, meshes: Vec<Mesh>) -> MeshResult<Self> {
        let mut scene = Self::new(name);
        for (i, mesh) in meshes.into_iter().enumerate() {
            scene.add(SceneObject::new(
                format!("model_{}", i),
                mesh,
                DrawableTransform::default(),
                Material::PURE_WHITE,
            ));
        }
        scene.add(ground_plane()?);
        Ok(scene)
    }
}

fn ground_plane() -> MeshResult<SceneObject> {
    Ok(SceneObject::new(
        "plane",
        Mesh::cuboid(1.0, 1.0, 1.0)?,
        DrawableTransform::new(Vec3::new(-4.0, -4.0, -0.25), 0.0, Vec3::Z, Vec3::new(8.0, 8.0, 0.25)),
        Material::MATTE_GRAY,
    ))
}
