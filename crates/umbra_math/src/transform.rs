// Drawable transforms and Mat4 helpers
//
// A drawable's model matrix is always translate * rotate * scale.

use glam::{Mat4, Quat, Vec3};
use crate::SceneBounds;

/// Extension trait for Mat4 to provide additional transform utilities
pub trait Mat4Ext {
    /// Inverse-transpose, for transforming normals under non-uniform scale.
    fn normal_matrix(&self) -> Mat4;

    /// Transform a bounding volume.
    /// Computes the bounding volume of all 8 transformed corners.
    fn transform_bounds(&self, bounds: &SceneBounds) -> SceneBounds;
}

impl Mat4Ext for Mat4 {
    fn normal_matrix(&self) -> Mat4 {
        self.inverse().transpose()
    }

    fn transform_bounds(&self, bounds: &SceneBounds) -> SceneBounds {
        if bounds.is_empty() {
            return SceneBounds::empty();
        }
        let mut result = SceneBounds::empty();
        result.merge(bounds.corners().iter().map(|&corner| self.transform_point3(corner)));
        result
    }
}

/// How a transform update combines with the current model matrix.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransformMode {
    /// The new transform replaces the current one.
    Replace,
    /// The new transform is applied on top of the current one (`new * old`).
    Cumulative,
}

/// Position, rotation (angle in radians around an axis) and non-uniform scale
/// of a drawable, composed into a model matrix.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DrawableTransform {
    pub position: Vec3,
    pub angle: f32,
    pub axis: Vec3,
    pub scale: Vec3,
    model: Mat4,
}

impl Default for DrawableTransform {
    fn default() -> Self {
        Self::new(Vec3::ZERO, 0.0, Vec3::Z, Vec3::ONE)
    }
}

impl DrawableTransform {
    pub fn new(position: Vec3, angle: f32, axis: Vec3, scale: Vec3) -> Self {
        Self {
            position,
            angle,
            axis,
            scale,
            model: compose(position, angle, axis, scale),
        }
    }

    /// Update the transform, either replacing or accumulating onto the current matrix.
    pub fn set(&mut self, position: Vec3, angle: f32, axis: Vec3, scale: Vec3, mode: TransformMode) {
        let update = compose(position, angle, axis, scale);
        self.model = match mode {
            TransformMode::Replace => update,
            TransformMode::Cumulative => update * self.model,
        };
        self.position = position;
        self.angle = angle;
        self.axis = axis;
        self.scale = scale;
    }

    pub fn model_matrix(&self) -> Mat4 {
        self.model
    }

    pub fn normal_matrix(&self) -> Mat4 {
        self.model.normal_matrix()
    }

    /// Transform local points to world space.
    pub fn apply(&self, points: &[Vec3]) -> Vec<Vec3> {
        points.iter().map(|p| self.model.transform_point3(*p)).collect()
    }
}

fn compose(position: Vec3, angle: f32, axis: Vec3, scale: Vec3) -> Mat4 {
    // A zero axis means no rotation
    let rotation = axis
        .try_normalize()
        .map_or(Quat::IDENTITY, |axis| Quat::from_axis_angle(axis, angle));
    Mat4::from_scale_rotation_translation(scale, rotation, position)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::f32::consts::PI;

    #[test]
    fn test_identity_transform() {
        let transform = DrawableTransform::default();
        assert_eq!(transform.model_matrix(), Mat4::IDENTITY);
    }

    #[test]
    fn test_translate_rotate_scale_order() {
        // Scale first, then rotate 90 degrees about Z, then translate
        let transform = DrawableTransform::new(
            Vec3::new(10.0, 0.0, 0.0),
            PI / 2.0,
            Vec3::Z,
            Vec3::new(2.0, 1.0, 1.0),
        );
        let p = transform.apply(&[Vec3::X])[0];

        assert!((p.x - 10.0).abs() < 0.001);
        assert!((p.y - 2.0).abs() < 0.001);
        assert!(p.z.abs() < 0.001);
    }

    #[test]
    fn test_zero_axis_means_no_rotation() {
        let transform = DrawableTransform::new(Vec3::ZERO, 1.0, Vec3::ZERO, Vec3::ONE);
        assert_eq!(transform.model_matrix(), Mat4::IDENTITY);
    }

    #[test]
    fn test_replace_mode() {
        let mut transform = DrawableTransform::new(Vec3::X, 0.0, Vec3::Z, Vec3::ONE);
        transform.set(Vec3::Y, 0.0, Vec3::Z, Vec3::ONE, TransformMode::Replace);

        let p = transform.apply(&[Vec3::ZERO])[0];
        assert!((p - Vec3::Y).length() < 0.001);
    }

    #[test]
    fn test_cumulative_mode() {
        let mut transform = DrawableTransform::new(Vec3::X, 0.0, Vec3::Z, Vec3::ONE);
        transform.set(Vec3::ZERO, 0.0, Vec3::Z, Vec3::splat(2.0), TransformMode::Cumulative);

        // Translation of the old transform is scaled by the new one
        let p = transform.apply(&[Vec3::ZERO])[0];
        assert!((p - Vec3::new(2.0, 0.0, 0.0)).length() < 0.001);
    }

    #[test]
    fn test_normal_matrix_non_uniform_scale() {
        let transform = DrawableTransform::new(Vec3::ZERO, 0.0, Vec3::Z, Vec3::new(1.0, 4.0, 1.0));

        // Normal of the plane x + y = 0 stays perpendicular after scaling
        let normal = transform.normal_matrix().transform_vector3(Vec3::new(1.0, 1.0, 0.0));
        let tangent = transform.model_matrix().transform_vector3(Vec3::new(1.0, -1.0, 0.0));
        assert!(normal.dot(tangent).abs() < 0.001);
    }

    #[test]
    fn test_transform_bounds_translation() {
        let mat = Mat4::from_translation(Vec3::new(5.0, 5.0, 5.0));
        let bounds = SceneBounds::from_points(&[Vec3::ZERO, Vec3::ONE]);
        let transformed = mat.transform_bounds(&bounds);

        assert!((transformed.min() - Vec3::splat(5.0)).length() < 0.001);
        assert!((transformed.max() - Vec3::splat(6.0)).length() < 0.001);
    }

    #[test]
    fn test_transform_bounds_rotation_grows() {
        let mat = Mat4::from_rotation_z(PI / 4.0);
        let bounds = SceneBounds::from_points(&[Vec3::splat(-1.0), Vec3::splat(1.0)]);
        let transformed = mat.transform_bounds(&bounds);

        assert!((transformed.max().x - 2.0_f32.sqrt()).abs() < 0.001);
    }
}
