// Re-export glam for convenience
pub use glam::*;

// Umbra math types
mod bounds;
mod camera;
mod shadow;
mod transform;

pub use bounds::SceneBounds;
pub use camera::{OrbitCamera, CAMERA_NEAR};
pub use shadow::{LightFrustum, MIN_SHADOW_EXTENT};
pub use transform::{DrawableTransform, Mat4Ext, TransformMode};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_vec3_creation() {
        let v = Vec3::new(1.0, 2.0, 3.0);
        assert_eq!(v.x, 1.0);
        assert_eq!(v.y, 2.0);
        assert_eq!(v.z, 3.0);
    }

    #[test]
    fn test_reexports_compose() {
        let transform = DrawableTransform::new(Vec3::new(1.0, 0.0, 0.0), 0.0, Vec3::Z, Vec3::ONE);
        let mut bounds = SceneBounds::empty();
        bounds.merge(transform.apply(&[Vec3::ZERO, Vec3::ONE]));

        assert_eq!(bounds.min(), Vec3::new(1.0, 0.0, 0.0));
        assert_eq!(bounds.max(), Vec3::new(2.0, 1.0, 1.0));
    }
}
