//! Depth-only draw of the scene from the directional light.

use anyhow::Result;

use crate::frame::{CameraUniform, FrameContext};
use crate::geometry::GpuScene;
use crate::render_target::{RenderTarget, TargetDesc, DEPTH_FORMAT};
use crate::shader::{LinkOptions, ShaderKind, ShaderTable};
use crate::vertex::Vertex;

/// The shadow pass reuses the unlit program with its fragment stage dropped.
const SHADOW_KIND: ShaderKind = ShaderKind::Unlit;

pub struct ShadowPass {
    target: RenderTarget,
    pipeline: Option<wgpu::RenderPipeline>,
    camera_buffer: wgpu::Buffer,
}

impl ShadowPass {
    pub fn new(device: &wgpu::Device, shaders: &ShaderTable, resolution: u32) -> Self {
        let target = RenderTarget::new(device, "Shadow Map", TargetDesc::depth_only(resolution, resolution));

        let pipeline = shaders.get(SHADOW_KIND).link(
            device,
            &LinkOptions {
                label: "Shadow Pass",
                color_formats: &[],
                blend: None,
                depth: Some(wgpu::DepthStencilState {
                    format: DEPTH_FORMAT,
                    depth_write_enabled: true,
                    depth_compare: wgpu::CompareFunction::Less,
                    stencil: wgpu::StencilState::default(),
                    bias: wgpu::DepthBiasState::default(),
                }),
                topology: wgpu::PrimitiveTopology::TriangleList,
                cull_mode: None,
                use_fragment: false,
                vertex_buffers: &[Vertex::desc()],
            },
        );

        let camera_buffer = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("Light Camera Buffer"),
            size: std::mem::size_of::<CameraUniform>() as wgpu::BufferAddress,
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });

        log::info!("Shadow map {}x{}", resolution, resolution);
        Self {
            target,
            pipeline,
            camera_buffer,
        }
    }

    pub fn resolution(&self) -> u32 {
        self.target.width()
    }

    /// Render the shadow map. Returns false when the pass was skipped: no
    /// fitted light (shadows off or zero-size bounds) or an unusable program.
    pub fn render(
        &self,
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        encoder: &mut wgpu::CommandEncoder,
        shaders: &ShaderTable,
        frame: &FrameContext,
        scene: &GpuScene,
    ) -> Result<bool> {
        let (Some(pipeline), Some(light_camera)) = (&self.pipeline, frame.light_camera_uniform()) else {
            return Ok(false);
        };
        if !self.target.is_complete() {
            return Ok(false);
        }
        queue.write_buffer(&self.camera_buffer, 0, bytemuck::bytes_of(&light_camera));

        let camera = shaders
            .get(SHADOW_KIND)
            .create_bind_group(device, 0, &[("camera", self.camera_buffer.as_entire_binding())])?;
        let output = self.target.bind_for_write(&[], true)?;

        let mut pass = output.begin(encoder, "Shadow Pass");
        pass.set_pipeline(pipeline);
        pass.set_bind_group(0, &camera, &[]);
        for object in scene.triangles() {
            object.draw(&mut pass, SHADOW_KIND);
        }
        Ok(true)
    }

    /// Depth written by the last `render`.
    pub fn shadow_map(&self) -> Result<&wgpu::TextureView> {
        Ok(self.target.depth_view()?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shader::FragmentLibrary;
    use crate::test_support::test_device;
    use umbra_core::{Scene, SceneParams};
    use umbra_math::{OrbitCamera, Vec3};

    #[test]
    fn test_shadow_pass_skips_empty_scene() {
        let Some((device, queue)) = test_device() else {
            return;
        };
        let shaders = ShaderTable::build(&device, &FragmentLibrary::standard());
        let pass = ShadowPass::new(&device, &shaders, 256);
        assert_eq!(pass.resolution(), 256);

        let scene = Scene::new("empty");
        let gpu_scene = GpuScene::upload(&device, &shaders, &scene).unwrap();
        let params = SceneParams::default();
        let camera = OrbitCamera::new(Vec3::ZERO, 10.0, 1.0);
        let frame = FrameContext::new(&scene, &params, &camera, 64, 64);

        let mut encoder = device.create_command_encoder(&wgpu::CommandEncoderDescriptor { label: None });
        let rendered = pass
            .render(&device, &queue, &mut encoder, &shaders, &frame, &gpu_scene)
            .unwrap();
        assert!(!rendered);
    }

    #[test]
    fn test_shadow_pass_renders_primitives() {
        let Some((device, queue)) = test_device() else {
            return;
        };
        let shaders = ShaderTable::build(&device, &FragmentLibrary::standard());
        let pass = ShadowPass::new(&device, &shaders, 256);

        let scene = Scene::primitives().unwrap();
        let gpu_scene = GpuScene::upload(&device, &shaders, &scene).unwrap();
        let params = SceneParams::default();
        let camera = OrbitCamera::new(Vec3::ZERO, 10.0, 1.0);
        let frame = FrameContext::new(&scene, &params, &camera, 64, 64);

        let mut encoder = device.create_command_encoder(&wgpu::CommandEncoderDescriptor { label: None });
        let rendered = pass
            .render(&device, &queue, &mut encoder, &shaders, &frame, &gpu_scene)
            .unwrap();
        queue.submit(std::iter::once(encoder.finish()));

        assert!(rendered);
        assert!(pass.shadow_map().is_ok());
    }
}
