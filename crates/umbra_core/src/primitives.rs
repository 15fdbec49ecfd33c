//! Procedural primitive meshes: box, truncated cone, cone, cylinder, arrow.
//!
//! All primitives are Z-up and sit on the XY plane. Faces are unshared so
//! that flat faces keep hard normals.

use std::f32::consts::PI;

use umbra_math::Vec3;

use crate::mesh::{Mesh, MeshResult};

/// Tip radius used for cones, so the apex still has a usable normal.
pub const CONE_TIP_RADIUS: f32 = 0.001;

const MIN_SUBDIVISIONS: u32 = 3;

impl Mesh {
    /// Axis-aligned box spanning `[0, width] x [0, height] x [0, depth]`.
    pub fn cuboid(width: f32, height: f32, depth: f32) -> MeshResult<Self> {
        let p = |x: f32, y: f32, z: f32| Vec3::new(x * width, y * height, z * depth);

        // Four corners per face, counter-clockwise seen from outside
        let faces = [
            ([p(0.0, 0.0, 0.0), p(0.0, 1.0, 0.0), p(1.0, 1.0, 0.0), p(1.0, 0.0, 0.0)], Vec3::NEG_Z),
            ([p(0.0, 0.0, 0.0), p(1.0, 0.0, 0.0), p(1.0, 0.0, 1.0), p(0.0, 0.0, 1.0)], Vec3::NEG_Y),
            ([p(1.0, 0.0, 0.0), p(1.0, 1.0, 0.0), p(1.0, 1.0, 1.0), p(1.0, 0.0, 1.0)], Vec3::X),
            ([p(0.0, 1.0, 0.0), p(0.0, 1.0, 1.0), p(1.0, 1.0, 1.0), p(1.0, 1.0, 0.0)], Vec3::Y),
            ([p(0.0, 0.0, 0.0), p(0.0, 0.0, 1.0), p(0.0, 1.0, 1.0), p(0.0, 1.0, 0.0)], Vec3::NEG_X),
            ([p(0.0, 0.0, 1.0), p(1.0, 0.0, 1.0), p(1.0, 1.0, 1.0), p(0.0, 1.0, 1.0)], Vec3::Z),
        ];

        let mut positions = Vec::with_capacity(36);
        let mut normals = Vec::with_capacity(36);
        for ([a, b, c, d], normal) in faces {
            positions.extend_from_slice(&[a, b, c, a, c, d]);
            normals.extend_from_slice(&[normal; 6]);
        }
        let indices = (0..positions.len() as u32).collect();

        Mesh::new(positions, normals, indices)
    }

    /// Truncated cone from `radius` at z = 0 to `tip_radius` at z = `height`.
    ///
    /// Each of the `subdivisions` side segments is its own quad (4 vertices),
    /// followed by a bottom cap and a top cap of `subdivisions` vertices each.
    pub fn trunc_cone(radius: f32, tip_radius: f32, height: f32, subdivisions: u32) -> MeshResult<Self> {
        let n = subdivisions.max(MIN_SUBDIVISIONS);
        let d_angle = PI * 2.0 / n as f32;
        let slope = if height.abs() > f32::EPSILON { (radius - tip_radius) / height } else { 0.0 };
        let ring = |i: u32| {
            let (sin_a, cos_a) = (i as f32 * d_angle).sin_cos();
            (cos_a, sin_a)
        };

        let mut positions = Vec::with_capacity(6 * n as usize);
        let mut normals = Vec::with_capacity(6 * n as usize);
        let mut indices = Vec::with_capacity(12 * n as usize);

        // Side
        for k in 0..n {
            let base = positions.len() as u32;
            for i in [k, k + 1] {
                let (cos_a, sin_a) = ring(i % n);
                let normal = Vec3::new(cos_a, sin_a, slope).normalize();
                positions.push(Vec3::new(cos_a * radius, sin_a * radius, 0.0));
                positions.push(Vec3::new(cos_a * tip_radius, sin_a * tip_radius, height));
                normals.extend_from_slice(&[normal, normal]);
            }
            indices.extend_from_slice(&[base, base + 2, base + 3, base, base + 3, base + 1]);
        }

        // Bottom cap, facing -Z
        let offset = positions.len() as u32;
        for i in 0..n {
            let (cos_a, sin_a) = ring(i);
            positions.push(Vec3::new(cos_a * radius, sin_a * radius, 0.0));
            normals.push(Vec3::NEG_Z);
        }
        for k in 0..n - 2 {
            indices.extend_from_slice(&[offset, offset + k + 2, offset + k + 1]);
        }

        // Top cap, facing +Z
        let offset = positions.len() as u32;
        for i in 0..n {
            let (cos_a, sin_a) = ring(i);
            positions.push(Vec3::new(cos_a * tip_radius, sin_a * tip_radius, height));
            normals.push(Vec3::Z);
        }
        for k in 0..n - 2 {
            indices.extend_from_slice(&[offset, offset + k + 1, offset + k + 2]);
        }

        Mesh::new(positions, normals, indices)
    }

    pub fn cone(radius: f32, height: f32, subdivisions: u32) -> MeshResult<Self> {
        Self::trunc_cone(radius, CONE_TIP_RADIUS, height, subdivisions)
    }

    pub fn cylinder(radius: f32, height: f32, subdivisions: u32) -> MeshResult<Self> {
        Self::trunc_cone(radius, radius, height, subdivisions)
    }

    /// Cylinder shaft with a cone head on top, pointing along +Z.
    pub fn arrow(
        shaft_radius: f32,
        shaft_length: f32,
        head_radius: f32,
        head_length: f32,
        subdivisions: u32,
    ) -> MeshResult<Self> {
        let mut arrow = Self::cylinder(shaft_radius, shaft_length, subdivisions)?;
        let head = Self::cone(head_radius, head_length, subdivisions)?;
        arrow.append(&head, Vec3::new(0.0, 0.0, shaft_length));
        Ok(arrow)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unit_box_counts() {
        let mesh = Mesh::cuboid(1.0, 1.0, 1.0).unwrap();
        assert_eq!(mesh.vertex_count(), 36);
        assert_eq!(mesh.normals().len(), 36);
        assert_eq!(mesh.indices().len() % 3, 0);
        assert_eq!(mesh.triangle_count(), 12);
    }

    #[test]
    fn test_box_normals_face_outward() {
        let mesh = Mesh::cuboid(2.0, 3.0, 4.0).unwrap();
        let center = Vec3::new(1.0, 1.5, 2.0);
        for tri in mesh.indices().chunks(3) {
            let [a, b, c] = [0, 1, 2].map(|i| mesh.positions()[tri[i] as usize]);
            let winding = (b - a).cross(c - a);
            let normal = mesh.normals()[tri[0] as usize];
            assert!(winding.dot(normal) > 0.0);
            assert!((a - center).dot(normal) > 0.0);
        }
    }

    #[test]
    fn test_cylinder_vertex_counts() {
        let n = 16;
        let mesh = Mesh::trunc_cone(0.5, 0.5, 2.0, n).unwrap();
        // 4n side vertices plus 2n cap vertices
        assert_eq!(mesh.vertex_count(), (4 * n + 2 * n) as usize);
        assert_eq!(mesh.normals().len(), mesh.vertex_count());
        assert_eq!(mesh.indices().len() % 3, 0);
    }

    #[test]
    fn test_trunc_cone_side_normals_slope() {
        let mesh = Mesh::trunc_cone(1.0, 0.0, 1.0, 8).unwrap();
        let normal = mesh.normals()[0];
        // Slope of 1: normal leans 45 degrees up
        assert!((normal.x - normal.z).abs() < 0.001);
        assert!((normal.length() - 1.0).abs() < 0.001);
    }

    #[test]
    fn test_cone_has_small_tip() {
        let mesh = Mesh::cone(0.8, 1.6, 16).unwrap();
        let top = mesh.bounds().max();
        assert!((top.z - 1.6).abs() < 0.001);
        assert!(mesh.positions()[1].truncate().length() <= CONE_TIP_RADIUS + 1e-6);
    }

    #[test]
    fn test_subdivisions_clamped() {
        let mesh = Mesh::cylinder(1.0, 1.0, 1).unwrap();
        assert_eq!(mesh.vertex_count(), 18);
    }

    #[test]
    fn test_arrow_combines_parts() {
        let n = 16;
        let arrow = Mesh::arrow(0.3, 1.0, 0.5, 0.5, n).unwrap();
        let part = Mesh::cylinder(0.3, 1.0, n).unwrap();

        assert_eq!(arrow.vertex_count(), part.vertex_count() * 2);
        assert!((arrow.bounds().max().z - 1.5).abs() < 0.001);
        assert!(arrow.indices().iter().all(|&i| (i as usize) < arrow.vertex_count()));
    }
}
