use glam::{Mat4, Vec3};
use crate::SceneBounds;

/// Near plane shared by the camera projection and the soft-shadow filter.
pub const CAMERA_NEAR: f32 = 0.1;

/// Orbit camera around a target point (Z-up)
#[derive(Debug, Clone, Copy)]
pub struct OrbitCamera {
    pub target: Vec3,
    pub distance: f32,
    /// Rotation around +Z, radians
    pub yaw: f32,
    /// Elevation above the XY plane, radians
    pub pitch: f32,
    /// Vertical field of view, degrees
    pub fov_y: f32,
    pub aspect: f32,
    pub near: f32,
    pub far: f32,
    pub perspective: bool,
}

impl OrbitCamera {
    /// Create a new camera
    pub fn new(target: Vec3, distance: f32, aspect: f32) -> Self {
        Self {
            target,
            distance,
            yaw: -90.0_f32.to_radians(),
            pitch: 30.0_f32.to_radians(),
            fov_y: 45.0,
            aspect,
            near: CAMERA_NEAR,
            far: 100.0,
            perspective: true,
        }
    }

    /// Eye position derived from target, distance and angles
    pub fn position(&self) -> Vec3 {
        let (sin_yaw, cos_yaw) = self.yaw.sin_cos();
        let (sin_pitch, cos_pitch) = self.pitch.sin_cos();
        self.target + Vec3::new(cos_pitch * cos_yaw, cos_pitch * sin_yaw, sin_pitch) * self.distance
    }

    /// Get the view matrix (world → camera space)
    pub fn view_matrix(&self) -> Mat4 {
        Mat4::look_at_rh(self.position(), self.target, Vec3::Z)
    }

    /// Get the projection matrix (camera → clip space)
    pub fn projection_matrix(&self) -> Mat4 {
        if self.perspective {
            Mat4::perspective_rh(self.fov_y.to_radians(), self.aspect, self.near, self.far)
        } else {
            // Match the perspective framing at the target distance
            let half_height = self.distance * (self.fov_y.to_radians() * 0.5).tan();
            let half_width = half_height * self.aspect;
            Mat4::orthographic_rh(-half_width, half_width, -half_height, half_height, self.near, self.far)
        }
    }

    /// Get the combined view-projection matrix
    pub fn view_projection_matrix(&self) -> Mat4 {
        self.projection_matrix() * self.view_matrix()
    }

    /// Update aspect ratio (e.g., on window resize)
    pub fn set_aspect(&mut self, aspect: f32) {
        self.aspect = aspect;
    }

    /// Rotate around the target
    pub fn orbit(&mut self, delta_yaw: f32, delta_pitch: f32) {
        let limit = 89.0_f32.to_radians();
        self.yaw += delta_yaw;
        self.pitch = (self.pitch + delta_pitch).clamp(-limit, limit);
    }

    /// Move toward (negative) or away from (positive) the target
    pub fn dolly(&mut self, amount: f32) {
        let factor = (1.0 + amount * 0.001).clamp(0.5, 2.0);
        self.distance = (self.distance * factor).max(CAMERA_NEAR * 2.0);
    }

    /// Center on the bounds and back off to see all of it
    pub fn frame(&mut self, bounds: &SceneBounds) {
        if bounds.is_empty() {
            return;
        }
        self.target = bounds.center();
        self.distance = (bounds.size() * 1.5).max(CAMERA_NEAR * 2.0);
        self.fit_planes(bounds);
    }

    /// Fit the far plane to the bounds; the near plane stays at `CAMERA_NEAR`
    pub fn fit_planes(&mut self, bounds: &SceneBounds) {
        let (_, far) = bounds.tight_near_far(self.view_matrix());
        self.near = CAMERA_NEAR;
        self.far = far.max(self.distance + bounds.size());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_camera_creation() {
        let camera = OrbitCamera::new(Vec3::ZERO, 5.0, 16.0 / 9.0);

        assert!((camera.position().length() - 5.0).abs() < 0.001);
        assert_eq!(camera.aspect, 16.0 / 9.0);
        assert_eq!(camera.near, CAMERA_NEAR);
    }

    #[test]
    fn test_view_matrix_puts_target_in_front() {
        let camera = OrbitCamera::new(Vec3::new(1.0, 2.0, 3.0), 5.0, 1.0);
        let target_in_view = camera.view_matrix().transform_point3(camera.target);

        assert!((target_in_view.z + 5.0).abs() < 0.001);
        assert!(target_in_view.x.abs() < 0.001);
        assert!(target_in_view.y.abs() < 0.001);
    }

    #[test]
    fn test_orbit_clamps_pitch() {
        let mut camera = OrbitCamera::new(Vec3::ZERO, 5.0, 1.0);
        camera.orbit(0.0, 10.0);
        assert!(camera.pitch < 90.0_f32.to_radians());
        camera.orbit(0.0, -20.0);
        assert!(camera.pitch > -90.0_f32.to_radians());
    }

    #[test]
    fn test_dolly_never_crosses_near_plane() {
        let mut camera = OrbitCamera::new(Vec3::ZERO, 1.0, 1.0);
        for _ in 0..100 {
            camera.dolly(-1000.0);
        }
        assert!(camera.distance >= CAMERA_NEAR * 2.0);
    }

    #[test]
    fn test_frame_bounds() {
        let mut camera = OrbitCamera::new(Vec3::ZERO, 1.0, 1.0);
        let bounds = SceneBounds::from_points(&[Vec3::splat(-1.0), Vec3::splat(1.0)]);
        camera.frame(&bounds);

        assert_eq!(camera.target, Vec3::ZERO);
        assert!((camera.distance - bounds.size() * 1.5).abs() < 0.001);
        assert_eq!(camera.near, CAMERA_NEAR);
        assert!(camera.far > camera.distance);
    }

    #[test]
    fn test_orthographic_projection() {
        let mut camera = OrbitCamera::new(Vec3::ZERO, 10.0, 1.0);
        camera.perspective = false;
        let proj = camera.projection_matrix();

        // No perspective divide for orthographic projections
        assert_eq!(proj.w_axis.w, 1.0);
    }

    #[test]
    fn test_fit_planes_follows_dolly() {
        let bounds = SceneBounds::from_points(&[Vec3::splat(-1.0), Vec3::splat(1.0)]);
        let mut camera = OrbitCamera::new(Vec3::ZERO, 1.0, 1.0);
        camera.frame(&bounds);

        for _ in 0..10 {
            camera.dolly(1000.0);
            camera.orbit(0.3, 0.1);
            camera.fit_planes(&bounds);

            let (_, needed_far) = bounds.tight_near_far(camera.view_matrix());
            assert!(needed_far <= camera.far, "needed {} > far {}", needed_far, camera.far);
            assert_eq!(camera.near, CAMERA_NEAR);
        }
        assert!(camera.distance > 1000.0);
    }

    #[test]
    fn test_fit_planes_follows_dolly_in() {
        let bounds = SceneBounds::from_points(&[Vec3::splat(-1.0), Vec3::splat(1.0)]);
        let mut camera = OrbitCamera::new(Vec3::ZERO, 1.0, 1.0);
        camera.frame(&bounds);
        for _ in 0..10 {
            camera.dolly(1000.0);
        }
        camera.fit_planes(&bounds);
        let far_away = camera.far;

        camera.frame(&bounds);
        assert!(camera.far < far_away);
    }
}
