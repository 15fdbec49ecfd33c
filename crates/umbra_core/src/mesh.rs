//! Triangle mesh and line-set geometry.
//!
//! Meshes are GPU-agnostic: positions, parallel normals and triangle
//! indices. The renderer uploads them into vertex/index buffers. Line-only
//! drawables use [`Wire`], which is a flat list of segment point pairs.

use thiserror::Error;
use umbra_math::{SceneBounds, Vec2, Vec3};

/// Structural errors raised while constructing a mesh.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum MeshError {
    #[error("number of vertices ({positions}) does not match number of normals ({normals})")]
    NormalCountMismatch { positions: usize, normals: usize },

    #[error("a mesh must contain at least one triangle, got {0} indices")]
    TooFewIndices(usize),

    #[error("index count {0} is not a multiple of 3")]
    PartialTriangle(usize),

    #[error("index {index} out of range for {vertex_count} vertices")]
    IndexOutOfRange { index: u32, vertex_count: usize },
}

pub type MeshResult<T> = Result<T, MeshError>;

/// A triangle mesh with one normal per vertex.
#[derive(Clone, Debug)]
pub struct Mesh {
    positions: Vec<Vec3>,
    normals: Vec<Vec3>,
    indices: Vec<u32>,
    bounds: SceneBounds,
}

impl Mesh {
    /// Create a mesh, validating its structure.
    ///
    /// Fails without building anything when the normal count differs from
    /// the vertex count, when there is not at least one full triangle, or
    /// when an index points past the vertex list.
    pub fn new(positions: Vec<Vec3>, normals: Vec<Vec3>, indices: Vec<u32>) -> MeshResult<Self> {
        if positions.len() != normals.len() {
            return Err(MeshError::NormalCountMismatch {
                positions: positions.len(),
                normals: normals.len(),
            });
        }
        if indices.len() < 3 {
            return Err(MeshError::TooFewIndices(indices.len()));
        }
        if indices.len() % 3 != 0 {
            return Err(MeshError::PartialTriangle(indices.len()));
        }
        if let Some(&index) = indices.iter().find(|&&i| i as usize >= positions.len()) {
            return Err(MeshError::IndexOutOfRange {
                index,
                vertex_count: positions.len(),
            });
        }

        let bounds = SceneBounds::from_points(&positions);
        Ok(Self {
            positions,
            normals,
            indices,
            bounds,
        })
    }

    /// Create a mesh whose normals are computed by averaging face normals.
    pub fn with_computed_normals(positions: Vec<Vec3>, indices: Vec<u32>) -> MeshResult<Self> {
        let normals = compute_normals(&positions, &indices);
        Self::new(positions, normals, indices)
    }

    pub fn positions(&self) -> &[Vec3] {
        &self.positions
    }

    pub fn normals(&self) -> &[Vec3] {
        &self.normals
    }

    pub fn indices(&self) -> &[u32] {
        &self.indices
    }

    /// Local-space bounding volume.
    pub fn bounds(&self) -> &SceneBounds {
        &self.bounds
    }

    /// Get the number of triangles in the mesh.
    pub fn triangle_count(&self) -> usize {
        self.indices.len() / 3
    }

    /// Get the number of vertices in the mesh.
    pub fn vertex_count(&self) -> usize {
        self.positions.len()
    }

    /// Append another mesh, offsetting its positions and indices.
    pub fn append(&mut self, other: &Mesh, offset: Vec3) {
        let base = self.positions.len() as u32;
        self.positions.extend(other.positions.iter().map(|p| *p + offset));
        self.normals.extend_from_slice(&other.normals);
        self.indices.extend(other.indices.iter().map(|i| i + base));
        self.bounds = SceneBounds::from_points(&self.positions);
    }
}

/// Smooth vertex normals from counter-clockwise triangles.
///
/// Vertices not referenced by any triangle get +Z.
pub fn compute_normals(positions: &[Vec3], indices: &[u32]) -> Vec<Vec3> {
    let vertex_count = positions.len();
    let mut normals = vec![Vec3::ZERO; vertex_count];

    // Accumulate area-weighted face normals at each vertex
    for face in indices.chunks_exact(3) {
        let [i0, i1, i2] = [face[0] as usize, face[1] as usize, face[2] as usize];
        if i0 >= vertex_count || i1 >= vertex_count || i2 >= vertex_count {
            continue;
        }

        let face_normal = (positions[i1] - positions[i0]).cross(positions[i2] - positions[i0]);
        normals[i0] += face_normal;
        normals[i1] += face_normal;
        normals[i2] += face_normal;
    }

    for normal in &mut normals {
        *normal = normal.try_normalize().unwrap_or(Vec3::Z);
    }
    normals
}

/// A set of line segments stored as consecutive point pairs.
#[derive(Clone, Debug, Default)]
pub struct Wire {
    points: Vec<Vec3>,
}

impl Wire {
    /// Create a line set; a trailing unpaired point is dropped.
    pub fn new(mut points: Vec<Vec3>) -> Self {
        if points.len() % 2 != 0 {
            log::warn!("Wire has an odd number of points ({}), dropping the last one", points.len());
            points.pop();
        }
        Self { points }
    }

    /// Grid of lines on the XY plane, one line every `step` units.
    pub fn grid(min: Vec2, max: Vec2, step: f32) -> Self {
        if step <= 0.0 || max.x < min.x || max.y < min.y {
            return Self::default();
        }

        let lines_x = ((max.x - min.x) / step).floor() as usize + 1;
        let lines_y = ((max.y - min.y) / step).floor() as usize + 1;

        let mut points = Vec::with_capacity((lines_x + lines_y) * 2);
        for i in 0..lines_x {
            let x = min.x + i as f32 * step;
            points.push(Vec3::new(x, min.y, 0.0));
            points.push(Vec3::new(x, max.y, 0.0));
        }
        for j in 0..lines_y {
            let y = min.y + j as f32 * step;
            points.push(Vec3::new(min.x, y, 0.0));
            points.push(Vec3::new(max.x, y, 0.0));
        }
        Self { points }
    }

    pub fn points(&self) -> &[Vec3] {
        &self.points
    }

    pub fn segment_count(&self) -> usize {
        self.points.len() / 2
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn triangle() -> (Vec<Vec3>, Vec<Vec3>, Vec<u32>) {
        (
            vec![Vec3::ZERO, Vec3::X, Vec3::Y],
            vec![Vec3::Z; 3],
            vec![0, 1, 2],
        )
    }

    #[test]
    fn test_mesh_creation() {
        let (positions, normals, indices) = triangle();
        let mesh = Mesh::new(positions, normals, indices).unwrap();

        assert_eq!(mesh.vertex_count(), 3);
        assert_eq!(mesh.triangle_count(), 1);
        assert!((mesh.bounds().max() - Vec3::new(1.0, 1.0, 0.0)).length() < 0.001);
    }

    #[test]
    fn test_normal_count_mismatch() {
        let (positions, _, indices) = triangle();
        let result = Mesh::new(positions, vec![Vec3::Z; 2], indices);
        assert_eq!(
            result.unwrap_err(),
            MeshError::NormalCountMismatch { positions: 3, normals: 2 }
        );
    }

    #[test]
    fn test_too_few_indices() {
        let (positions, normals, _) = triangle();
        let result = Mesh::new(positions, normals, vec![0, 1]);
        assert_eq!(result.unwrap_err(), MeshError::TooFewIndices(2));
    }

    #[test]
    fn test_partial_triangle_rejected() {
        let (positions, normals, _) = triangle();
        let result = Mesh::new(positions, normals, vec![0, 1, 2, 0]);
        assert_eq!(result.unwrap_err(), MeshError::PartialTriangle(4));
    }

    #[test]
    fn test_index_out_of_range() {
        let (positions, normals, _) = triangle();
        let result = Mesh::new(positions, normals, vec![0, 1, 3]);
        assert!(matches!(result, Err(MeshError::IndexOutOfRange { index: 3, .. })));
    }

    #[test]
    fn test_compute_normals() {
        // CCW when viewed from +Z
        let mesh = Mesh::with_computed_normals(vec![Vec3::ZERO, Vec3::X, Vec3::Y], vec![0, 1, 2]).unwrap();
        for normal in mesh.normals() {
            assert!((normal.z - 1.0).abs() < 0.001);
        }
    }

    #[test]
    fn test_append_offsets_indices() {
        let (positions, normals, indices) = triangle();
        let mut mesh = Mesh::new(positions.clone(), normals.clone(), indices.clone()).unwrap();
        let other = Mesh::new(positions, normals, indices).unwrap();
        mesh.append(&other, Vec3::new(0.0, 0.0, 2.0));

        assert_eq!(mesh.vertex_count(), 6);
        assert_eq!(&mesh.indices()[3..], &[3, 4, 5]);
        assert!((mesh.bounds().max().z - 2.0).abs() < 0.001);
    }

    #[test]
    fn test_grid_lines() {
        let grid = Wire::grid(Vec2::new(-5.0, -5.0), Vec2::new(5.0, 5.0), 1.0);
        assert_eq!(grid.segment_count(), 22);
        assert_eq!(grid.points()[0], Vec3::new(-5.0, -5.0, 0.0));
        assert_eq!(grid.points()[1], Vec3::new(-5.0, 5.0, 0.0));
    }

    #[test]
    fn test_grid_with_invalid_step_is_empty() {
        let grid = Wire::grid(Vec2::ZERO, Vec2::ONE, 0.0);
        assert_eq!(grid.segment_count(), 0);
    }

    #[test]
    fn test_wire_drops_unpaired_point() {
        let wire = Wire::new(vec![Vec3::ZERO, Vec3::X, Vec3::Y]);
        assert_eq!(wire.points().len(), 2);
    }
}
