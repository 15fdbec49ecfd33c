//! Light-aligned orthographic frustum fit to the scene bounds.
//!
//! The directional light is placed behind the scene along its direction and
//! an orthographic projection is sized to the light-space extents of the
//! bounding volume corners, so no depth precision is spent outside the scene.

use crate::{Mat4, SceneBounds, Vec3};

/// Smallest extent allowed on any light-space axis.
///
/// Flat scenes (a single plane lit head-on) would otherwise produce a
/// zero-depth projection.
pub const MIN_SHADOW_EXTENT: f32 = 0.01;

/// View and projection of the shadow-casting light.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LightFrustum {
    pub position: Vec3,
    pub direction: Vec3,
    pub view: Mat4,
    pub projection: Mat4,
    /// Light-space min corner of the fitted volume
    pub extents_min: Vec3,
    /// Light-space max corner of the fitted volume
    pub extents_max: Vec3,
}

impl LightFrustum {
    /// Fit a frustum for a light shining along `direction`.
    ///
    /// Returns `None` when the bounds are empty or have zero size, or when the
    /// direction is zero; the shadow pass is skipped in that case.
    pub fn fit(direction: Vec3, bounds: &SceneBounds) -> Option<Self> {
        let direction = direction.try_normalize()?;
        if bounds.is_empty() || bounds.size() <= f32::EPSILON {
            return None;
        }

        let position = bounds.center() - direction * bounds.size() * 0.5;

        // Z-up scene; fall back to Y when the light points straight up or down
        let up = if direction.z.abs() > 0.99 { Vec3::Y } else { Vec3::Z };
        let view = Mat4::look_at_rh(position, position + direction, up);

        let mut light_space = SceneBounds::empty();
        light_space.merge(bounds.corners().iter().map(|c| view.transform_point3(*c)));
        let (extents_min, extents_max) = pad_extents(light_space.min(), light_space.max());

        // Visible depth is negative in view space
        let projection = Mat4::orthographic_rh(
            extents_min.x,
            extents_max.x,
            extents_min.y,
            extents_max.y,
            -extents_max.z,
            -extents_min.z,
        );

        Some(Self {
            position,
            direction,
            view,
            projection,
            extents_min,
            extents_max,
        })
    }

    /// World → light clip space.
    pub fn light_space_matrix(&self) -> Mat4 {
        self.projection * self.view
    }
}

fn pad_extents(min: Vec3, max: Vec3) -> (Vec3, Vec3) {
    let center = (min + max) * 0.5;
    let half = ((max - min) * 0.5).max(Vec3::splat(MIN_SHADOW_EXTENT * 0.5));
    (center - half, center + half)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assert_contains_corners(frustum: &LightFrustum, bounds: &SceneBounds) {
        let eps = 1e-4;
        let light_space = frustum.light_space_matrix();
        for corner in bounds.corners() {
            let ndc = light_space.project_point3(corner);
            assert!(ndc.x >= -1.0 - eps && ndc.x <= 1.0 + eps, "x clipped: {:?}", ndc);
            assert!(ndc.y >= -1.0 - eps && ndc.y <= 1.0 + eps, "y clipped: {:?}", ndc);
            assert!(ndc.z >= -eps && ndc.z <= 1.0 + eps, "z clipped: {:?}", ndc);
        }
    }

    #[test]
    fn test_frustum_contains_all_corners() {
        let bounds = SceneBounds::from_points(&[
            Vec3::new(-4.0, -4.0, -0.25),
            Vec3::new(4.0, 4.0, 2.5),
        ]);
        let directions = [
            Vec3::new(1.0, 1.0, -1.0),
            Vec3::new(0.0, 0.0, -1.0),
            Vec3::new(-0.3, 0.8, -0.2),
            Vec3::new(1.0, 0.0, 0.0),
        ];

        for direction in directions {
            let frustum = LightFrustum::fit(direction, &bounds).unwrap();
            assert_contains_corners(&frustum, &bounds);
        }
    }

    #[test]
    fn test_frustum_is_tight() {
        let bounds = SceneBounds::from_points(&[Vec3::splat(-1.0), Vec3::splat(1.0)]);
        let frustum = LightFrustum::fit(Vec3::new(0.0, 0.0, -1.0), &bounds).unwrap();

        // Looking straight down at a cube: extents equal the cube's footprint
        let extent = frustum.extents_max - frustum.extents_min;
        assert!((extent.x - 2.0).abs() < 0.001);
        assert!((extent.y - 2.0).abs() < 0.001);
        assert!((extent.z - 2.0).abs() < 0.001);
    }

    #[test]
    fn test_light_behind_scene() {
        let bounds = SceneBounds::from_points(&[Vec3::splat(-1.0), Vec3::splat(1.0)]);
        let direction = Vec3::new(1.0, 1.0, -1.0);
        let frustum = LightFrustum::fit(direction, &bounds).unwrap();

        let expected = -direction.normalize() * bounds.size() * 0.5;
        assert!((frustum.position - expected).length() < 0.001);
    }

    #[test]
    fn test_zero_size_bounds_skipped() {
        assert!(LightFrustum::fit(Vec3::NEG_Z, &SceneBounds::empty()).is_none());
        let point = SceneBounds::from_points(&[Vec3::ONE]);
        assert!(LightFrustum::fit(Vec3::NEG_Z, &point).is_none());
    }

    #[test]
    fn test_zero_direction_skipped() {
        let bounds = SceneBounds::from_points(&[Vec3::ZERO, Vec3::ONE]);
        assert!(LightFrustum::fit(Vec3::ZERO, &bounds).is_none());
    }

    #[test]
    fn test_flat_scene_gets_minimum_depth() {
        let plane = SceneBounds::from_points(&[Vec3::new(-5.0, -5.0, 0.0), Vec3::new(5.0, 5.0, 0.0)]);
        let frustum = LightFrustum::fit(Vec3::NEG_Z, &plane).unwrap();

        let depth = frustum.extents_max.z - frustum.extents_min.z;
        assert!(depth >= MIN_SHADOW_EXTENT - 1e-6);
        assert!(frustum.projection.is_finite());
        assert_contains_corners(&frustum, &plane);
    }
}
