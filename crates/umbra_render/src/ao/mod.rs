//! Screen-space ambient occlusion.
//!
//! The pass owns a working target (color 0 = view positions, then the AO
//! map; color 1 = view normals from the pre-pass; depth) and a one-color
//! scratch target. Passes that read color 0 write scratch and copy back, so
//! no pass samples the attachment it renders to.

pub mod kernel;
pub mod reference;

use anyhow::Result;
use wgpu::util::DeviceExt;

use umbra_core::params::{SSAO_BLUR_MAX_RADIUS, SSAO_MAX_SAMPLES, SSAO_NOISE_SIZE};
use umbra_core::{AoSettings, BlurKind, NormalSource};
use umbra_math::Mat4;

use crate::frame::FrameContext;
use crate::render_target::{CopyRegion, CopyTarget, RenderTarget, TargetDesc, TargetWrite, COLOR_FORMAT};
use crate::shader::{LinkOptions, ShaderKind, ShaderTable};

pub use kernel::{binomial, binomial_weights, SampleSet, KERNEL_SEED};

/// Working target attachment holding positions and then occlusion.
pub const AO_ATTACHMENT: usize = 0;
/// Working target attachment holding pre-pass view normals.
pub const NORMALS_ATTACHMENT: usize = 1;

/// Uniform block shared by every post-processing shader.
#[repr(C)]
#[derive(Copy, Clone, Debug, bytemuck::Pod, bytemuck::Zeroable)]
pub struct AoParams {
    pub proj: [[f32; 4]; 4],
    /// radius, near, far, strength
    pub settings: [f32; 4],
    /// samples, steps, blur radius, normal source
    pub counts: [u32; 4],
    /// width, height, 1 / width, 1 / height
    pub screen: [f32; 4],
    pub kernel: [[f32; 4]; SSAO_MAX_SAMPLES as usize],
}

impl AoParams {
    pub fn new(proj: Mat4, near: f32, far: f32, width: u32, height: u32, settings: &AoSettings, samples: &SampleSet) -> Self {
        let mut kernel = [[0.0; 4]; SSAO_MAX_SAMPLES as usize];
        for (dst, k) in kernel.iter_mut().zip(&samples.kernel) {
            *dst = k.extend(0.0).to_array();
        }
        let (w, h) = (width.max(1) as f32, height.max(1) as f32);
        let normals = match settings.normals {
            NormalSource::Reconstructed => 0,
            NormalSource::Prepass => 1,
        };

        Self {
            proj: proj.to_cols_array_2d(),
            settings: [settings.radius, near, far, settings.strength],
            counts: [settings.samples, settings.steps, settings.blur_radius, normals],
            screen: [w, h, 1.0 / w, 1.0 / h],
            kernel,
        }
    }
}

/// Post-processing pipelines, linked once at startup.
struct Pipelines {
    positions: Option<wgpu::RenderPipeline>,
    ssao: Option<wgpu::RenderPipeline>,
    hbao: Option<wgpu::RenderPipeline>,
    box_blur: Option<wgpu::RenderPipeline>,
    gaussian_blur: Option<wgpu::RenderPipeline>,
}

impl Pipelines {
    fn link(device: &wgpu::Device, shaders: &ShaderTable) -> Self {
        let link = |kind: ShaderKind| {
            shaders.get(kind).link(
                device,
                &LinkOptions {
                    label: kind.name(),
                    color_formats: &[COLOR_FORMAT],
                    blend: None,
                    depth: None,
                    topology: wgpu::PrimitiveTopology::TriangleList,
                    cull_mode: None,
                    use_fragment: true,
                    vertex_buffers: &[],
                },
            )
        };

        Self {
            positions: link(ShaderKind::PositionReconstruct),
            ssao: link(ShaderKind::Ssao),
            hbao: link(ShaderKind::Hbao),
            box_blur: link(ShaderKind::BoxBlur),
            gaussian_blur: link(ShaderKind::GaussianBlur),
        }
    }

    fn get(&self, kind: ShaderKind) -> Option<&wgpu::RenderPipeline> {
        match kind {
            ShaderKind::PositionReconstruct => self.positions.as_ref(),
            ShaderKind::Ssao => self.ssao.as_ref(),
            ShaderKind::Hbao => self.hbao.as_ref(),
            ShaderKind::BoxBlur => self.box_blur.as_ref(),
            ShaderKind::GaussianBlur => self.gaussian_blur.as_ref(),
            _ => None,
        }
    }
}

pub struct AmbientOcclusionPass {
    working: RenderTarget,
    scratch: RenderTarget,
    samples: SampleSet,
    pipelines: Pipelines,
    params_buffer: wgpu::Buffer,
    horizontal_buffer: wgpu::Buffer,
    vertical_buffer: wgpu::Buffer,
    _noise_texture: wgpu::Texture,
    noise_view: wgpu::TextureView,
    _weights_texture: wgpu::Texture,
    weights_view: wgpu::TextureView,
}

impl AmbientOcclusionPass {
    pub fn new(device: &wgpu::Device, queue: &wgpu::Queue, shaders: &ShaderTable, width: u32, height: u32) -> Self {
        let samples = SampleSet::default();
        let (working, scratch) = create_targets(device, width, height);

        let noise: Vec<[f32; 4]> = samples.noise.iter().map(|n| n.extend(0.0).to_array()).collect();
        let noise_texture = device.create_texture_with_data(
            queue,
            &wgpu::TextureDescriptor {
                label: Some("AO Noise Texture"),
                size: wgpu::Extent3d {
                    width: SSAO_NOISE_SIZE,
                    height: SSAO_NOISE_SIZE,
                    depth_or_array_layers: 1,
                },
                mip_level_count: 1,
                sample_count: 1,
                dimension: wgpu::TextureDimension::D2,
                format: wgpu::TextureFormat::Rgba32Float,
                usage: wgpu::TextureUsages::TEXTURE_BINDING,
                view_formats: &[],
            },
            wgpu::util::TextureDataOrder::LayerMajor,
            bytemuck::cast_slice(&noise),
        );

        let weights = binomial_weights();
        let weights_texture = device.create_texture_with_data(
            queue,
            &wgpu::TextureDescriptor {
                label: Some("AO Blur Weights"),
                size: wgpu::Extent3d {
                    width: SSAO_BLUR_MAX_RADIUS,
                    height: SSAO_BLUR_MAX_RADIUS,
                    depth_or_array_layers: 1,
                },
                mip_level_count: 1,
                sample_count: 1,
                dimension: wgpu::TextureDimension::D2,
                format: wgpu::TextureFormat::R32Uint,
                usage: wgpu::TextureUsages::TEXTURE_BINDING,
                view_formats: &[],
            },
            wgpu::util::TextureDataOrder::LayerMajor,
            bytemuck::cast_slice(&weights),
        );

        let params = AoParams::new(Mat4::IDENTITY, 0.1, 100.0, width, height, &AoSettings::default(), &samples);
        let params_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("AO Params Buffer"),
            contents: bytemuck::bytes_of(&params),
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
        });
        let horizontal_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("AO Horizontal Blur"),
            contents: bytemuck::cast_slice(&[1.0f32, 0.0, 0.0, 0.0]),
            usage: wgpu::BufferUsages::UNIFORM,
        });
        let vertical_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("AO Vertical Blur"),
            contents: bytemuck::cast_slice(&[0.0f32, 1.0, 0.0, 0.0]),
            usage: wgpu::BufferUsages::UNIFORM,
        });

        Self {
            working,
            scratch,
            samples,
            pipelines: Pipelines::link(device, shaders),
            params_buffer,
            horizontal_buffer,
            vertical_buffer,
            noise_view: noise_texture.create_view(&wgpu::TextureViewDescriptor::default()),
            _noise_texture: noise_texture,
            weights_view: weights_texture.create_view(&wgpu::TextureViewDescriptor::default()),
            _weights_texture: weights_texture,
        }
    }

    /// Target the normals pre-pass renders into and the lit pass reads from.
    pub fn working(&self) -> &RenderTarget {
        &self.working
    }

    pub fn samples(&self) -> &SampleSet {
        &self.samples
    }

    /// Rebuild both targets when the surface size changed. Returns true on rebuild.
    pub fn resize_if_needed(&mut self, device: &wgpu::Device, width: u32, height: u32) -> bool {
        if self.working.matches(width, height) {
            return false;
        }
        self.rebuild_targets(device, width, height);
        log::info!("Rebuilt AO targets at {}x{}", width, height);
        true
    }

    /// Swap in fresh targets, releasing the old ones. Returns the released targets.
    fn rebuild_targets(&mut self, device: &wgpu::Device, width: u32, height: u32) -> [RenderTarget; 2] {
        let (working, scratch) = create_targets(device, width, height);
        let mut old_working = std::mem::replace(&mut self.working, working);
        let mut old_scratch = std::mem::replace(&mut self.scratch, scratch);
        old_working.release();
        old_scratch.release();
        [old_working, old_scratch]
    }

    /// Reconstruct, estimate and blur. The normals pre-pass must already
    /// have written the working target. Returns whether the AO map is valid.
    pub fn render(
        &self,
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        encoder: &mut wgpu::CommandEncoder,
        shaders: &ShaderTable,
        frame: &FrameContext,
    ) -> Result<bool> {
        if !self.working.is_complete() || !self.scratch.is_complete() {
            return Ok(false);
        }

        let settings = frame.params.lights.ambient.ao.clamped();
        let estimator = ShaderKind::from(settings.algorithm);
        let needed = [ShaderKind::PositionReconstruct, estimator, blur_kind(settings.blur)];
        if let Some(missing) = needed.iter().find(|kind| self.pipelines.get(**kind).is_none()) {
            log::warn!("AO disabled this frame: {} is unusable", missing.name());
            return Ok(false);
        }

        self.write_params(queue, frame.projection, frame.near, frame.far, &settings);

        // Positions only read depth, so they go straight into the working target
        let positions_out = self.working.bind_for_write(&[AO_ATTACHMENT], true)?.without_depth();
        self.fullscreen(device, encoder, shaders, ShaderKind::PositionReconstruct, &self.horizontal_buffer, &positions_out)?;

        let scratch_out = self.scratch.bind_for_write(&[0], true)?;
        self.fullscreen(device, encoder, shaders, estimator, &self.horizontal_buffer, &scratch_out)?;
        self.copy_back(device, encoder)?;

        self.blur(device, encoder, shaders, &settings)?;
        Ok(true)
    }

    fn write_params(&self, queue: &wgpu::Queue, projection: Mat4, near: f32, far: f32, settings: &AoSettings) {
        let params = AoParams::new(
            projection,
            near,
            far,
            self.working.width(),
            self.working.height(),
            settings,
            &self.samples,
        );
        queue.write_buffer(&self.params_buffer, 0, bytemuck::bytes_of(&params));
    }

    /// Scratch color back into the AO attachment.
    fn copy_back(&self, device: &wgpu::Device, encoder: &mut wgpu::CommandEncoder) -> Result<()> {
        let full = CopyRegion::color(0, AO_ATTACHMENT, self.working.width(), self.working.height());
        self.scratch.copy_region(device, encoder, CopyTarget::Target(&self.working), full)?;
        Ok(())
    }

    /// Blur the AO attachment in place. Radius 0 leaves it untouched.
    fn blur(
        &self,
        device: &wgpu::Device,
        encoder: &mut wgpu::CommandEncoder,
        shaders: &ShaderTable,
        settings: &AoSettings,
    ) -> Result<()> {
        if settings.blur_radius == 0 {
            return Ok(());
        }
        let scratch_out = self.scratch.bind_for_write(&[0], true)?;
        let directions: &[&wgpu::Buffer] = match settings.blur {
            BlurKind::Gaussian => &[&self.horizontal_buffer, &self.vertical_buffer],
            BlurKind::Box => &[&self.horizontal_buffer],
        };
        let kind = blur_kind(settings.blur);
        for direction in directions {
            self.fullscreen(device, encoder, shaders, kind, direction, &scratch_out)?;
            self.copy_back(device, encoder)?;
        }
        Ok(())
    }

    fn fullscreen(
        &self,
        device: &wgpu::Device,
        encoder: &mut wgpu::CommandEncoder,
        shaders: &ShaderTable,
        kind: ShaderKind,
        blur_pass: &wgpu::Buffer,
        output: &TargetWrite<'_>,
    ) -> Result<()> {
        let Some(pipeline) = self.pipelines.get(kind) else {
            return Ok(());
        };

        let read = self.working.bind_for_read()?;
        let depth = self.working.depth_view()?;
        let resources = [
            ("ao_params", self.params_buffer.as_entire_binding()),
            ("depth_texture", wgpu::BindingResource::TextureView(depth)),
            ("source_texture", wgpu::BindingResource::TextureView(read.colors[AO_ATTACHMENT])),
            ("view_normals", wgpu::BindingResource::TextureView(read.colors[NORMALS_ATTACHMENT])),
            ("noise_texture", wgpu::BindingResource::TextureView(&self.noise_view)),
            ("blur_weights", wgpu::BindingResource::TextureView(&self.weights_view)),
            ("blur_pass", blur_pass.as_entire_binding()),
        ];
        let bind_group = shaders.get(kind).create_bind_group(device, 0, &resources)?;

        let mut pass = output.begin(encoder, kind.name());
        pass.set_pipeline(pipeline);
        pass.set_bind_group(0, &bind_group, &[]);
        pass.draw(0..3, 0..1);
        Ok(())
    }
}

fn blur_kind(blur: BlurKind) -> ShaderKind {
    match blur {
        BlurKind::Gaussian => ShaderKind::GaussianBlur,
        BlurKind::Box => ShaderKind::BoxBlur,
    }
}

fn create_targets(device: &wgpu::Device, width: u32, height: u32) -> (RenderTarget, RenderTarget) {
    let working = RenderTarget::new(device, "AO Working Target", TargetDesc::depth_and_color(width, height, 2));
    let scratch = RenderTarget::new(device, "AO Scratch Target", TargetDesc::color_only(width, height, 1));
    (working, scratch)
}
