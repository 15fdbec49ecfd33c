//! Per-frame snapshot of everything the passes read, and the uniform blocks
//! built from it.
//!
//! The orchestrator builds one [`FrameContext`] after input and UI have
//! mutated the scene parameters, then hands it to every pass by reference.

use umbra_core::{Material, Scene, SceneParams};
use umbra_math::{LightFrustum, Mat4, OrbitCamera, Vec3, Vec4, CAMERA_NEAR};

/// Camera uniform data for GPU
#[repr(C)]
#[derive(Copy, Clone, Debug, bytemuck::Pod, bytemuck::Zeroable)]
pub struct CameraUniform {
    pub view: [[f32; 4]; 4],
    pub proj: [[f32; 4]; 4],
    pub eye: [f32; 4],
}

impl CameraUniform {
    pub fn new(view: Mat4, proj: Mat4, eye: Vec3) -> Self {
        Self {
            view: view.to_cols_array_2d(),
            proj: proj.to_cols_array_2d(),
            eye: eye.extend(1.0).to_array(),
        }
    }
}

#[repr(C)]
#[derive(Copy, Clone, Debug, bytemuck::Pod, bytemuck::Zeroable)]
pub struct ModelUniform {
    pub model: [[f32; 4]; 4],
    pub normal_matrix: [[f32; 4]; 4],
}

impl ModelUniform {
    pub fn new(model: Mat4, normal_matrix: Mat4) -> Self {
        Self {
            model: model.to_cols_array_2d(),
            normal_matrix: normal_matrix.to_cols_array_2d(),
        }
    }
}

#[repr(C)]
#[derive(Copy, Clone, Debug, bytemuck::Pod, bytemuck::Zeroable)]
pub struct MaterialUniform {
    pub diffuse: [f32; 4],
    pub specular: [f32; 4],
    /// x = shininess
    pub params: [f32; 4],
}

impl From<&Material> for MaterialUniform {
    fn from(material: &Material) -> Self {
        Self {
            diffuse: material.diffuse.to_array(),
            specular: material.specular.to_array(),
            params: [material.shininess, 0.0, 0.0, 0.0],
        }
    }
}

#[repr(C)]
#[derive(Copy, Clone, Debug, bytemuck::Pod, bytemuck::Zeroable)]
pub struct LightsUniform {
    pub ambient: [f32; 4],
    pub light_direction: [f32; 4],
    pub light_diffuse: [f32; 4],
    pub light_specular: [f32; 4],
    pub eye_world_pos: [f32; 4],
    /// x = AO strength
    pub ao: [f32; 4],
}

#[repr(C)]
#[derive(Copy, Clone, Debug, bytemuck::Pod, bytemuck::Zeroable)]
pub struct ShadowUniform {
    pub light_space: [[f32; 4]; 4],
    /// bias, slope bias, softness, camera near
    pub params: [f32; 4],
}

/// Read-only view of one frame.
pub struct FrameContext<'a> {
    pub scene: &'a Scene,
    pub params: &'a SceneParams,
    pub view: Mat4,
    pub projection: Mat4,
    pub eye: Vec3,
    pub near: f32,
    pub far: f32,
    pub width: u32,
    pub height: u32,
    /// Fitted light frustum; `None` when shadows are off or the scene has no extent
    pub light: Option<LightFrustum>,
}

impl<'a> FrameContext<'a> {
    pub fn new(scene: &'a Scene, params: &'a SceneParams, camera: &OrbitCamera, width: u32, height: u32) -> Self {
        let light = if params.draw.shadows {
            LightFrustum::fit(params.lights.directional.direction, scene.bounds())
        } else {
            None
        };

        Self {
            scene,
            params,
            view: camera.view_matrix(),
            projection: camera.projection_matrix(),
            eye: camera.position(),
            near: camera.near,
            far: camera.far,
            width,
            height,
            light,
        }
    }

    pub fn camera_uniform(&self) -> CameraUniform {
        CameraUniform::new(self.view, self.projection, self.eye)
    }

    /// Camera block seen from the light, for the shadow depth pass.
    pub fn light_camera_uniform(&self) -> Option<CameraUniform> {
        self.light
            .as_ref()
            .map(|light| CameraUniform::new(light.view, light.projection, light.position))
    }

    pub fn lights_uniform(&self) -> LightsUniform {
        let lights = &self.params.lights;
        LightsUniform {
            ambient: lights.ambient.color.to_array(),
            light_direction: lights.directional.direction.extend(0.0).to_array(),
            light_diffuse: lights.directional.diffuse.to_array(),
            light_specular: lights.directional.specular.to_array(),
            eye_world_pos: self.eye.extend(1.0).to_array(),
            ao: Vec4::new(lights.ambient.ao.strength, 0.0, 0.0, 0.0).to_array(),
        }
    }

    pub fn shadow_uniform(&self) -> ShadowUniform {
        let directional = &self.params.lights.directional;
        let light_space = self
            .light
            .as_ref()
            .map(LightFrustum::light_space_matrix)
            .unwrap_or(Mat4::IDENTITY);
        ShadowUniform {
            light_space: light_space.to_cols_array_2d(),
            params: [directional.bias, directional.slope_bias, directional.softness, CAMERA_NEAR],
        }
    }

    pub fn shadows_active(&self) -> bool {
        self.light.is_some()
    }

    pub fn aspect(&self) -> f32 {
        self.width as f32 / self.height.max(1) as f32
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn camera() -> OrbitCamera {
        OrbitCamera::new(Vec3::ZERO, 10.0, 1.0)
    }

    #[test]
    fn test_uniform_sizes_are_16_byte_aligned() {
        for size in [
            std::mem::size_of::<CameraUniform>(),
            std::mem::size_of::<ModelUniform>(),
            std::mem::size_of::<MaterialUniform>(),
            std::mem::size_of::<LightsUniform>(),
            std::mem::size_of::<ShadowUniform>(),
        ] {
            assert_eq!(size % 16, 0);
        }
    }

    #[test]
    fn test_primitives_scene_casts_shadows() {
        let scene = Scene::primitives().unwrap();
        let params = SceneParams::default();
        let frame = FrameContext::new(&scene, &params, &camera(), 800, 800);

        assert!(frame.shadows_active());
        assert!(frame.light_camera_uniform().is_some());
        assert!((frame.shadow_uniform().params[3] - CAMERA_NEAR).abs() < 0.0001);
    }

    #[test]
    fn test_empty_scene_skips_shadows() {
        let scene = Scene::new("empty");
        let params = SceneParams::default();
        let frame = FrameContext::new(&scene, &params, &camera(), 800, 600);

        assert!(!frame.shadows_active());
        assert_eq!(frame.shadow_uniform().light_space, Mat4::IDENTITY.to_cols_array_2d());
        assert!((frame.aspect() - 800.0 / 600.0).abs() < 0.001);
    }

    #[test]
    fn test_shadows_disabled() {
        let scene = Scene::primitives().unwrap();
        let mut params = SceneParams::default();
        params.draw.shadows = false;
        let frame = FrameContext::new(&scene, &params, &camera(), 800, 800);

        assert!(!frame.shadows_active());
    }

    #[test]
    fn test_lights_uniform_carries_strength() {
        let scene = Scene::new("empty");
        let mut params = SceneParams::default();
        params.lights.ambient.ao.strength = 2.5;
        let frame = FrameContext::new(&scene, &params, &camera(), 800, 800);
        let lights = frame.lights_uniform();

        assert!((lights.ao[0] - 2.5).abs() < 0.001);
        assert_eq!(lights.light_direction[3], 0.0);
    }
}
