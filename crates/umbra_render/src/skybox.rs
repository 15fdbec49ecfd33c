//! Cube-map skybox, with a procedural gradient when no faces are configured.

use std::path::{Path, PathBuf};

use thiserror::Error;
use wgpu::util::DeviceExt;

use crate::frame::FrameContext;
use crate::render_target::DEPTH_FORMAT;

#[derive(Error, Debug)]
pub enum SkyboxError {
    #[error("failed to load skybox face {path}: {source}")]
    Image {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },

    #[error("skybox face {path} is {width}x{height}, faces must be square")]
    NotSquare { path: PathBuf, width: u32, height: u32 },

    #[error("skybox face {path} is {size} pixels wide, expected {expected}")]
    SizeMismatch { path: PathBuf, size: u32, expected: u32 },
}

/// Six decoded RGBA8 faces in +X, -X, +Y, -Y, +Z, -Z order, layer-major.
#[derive(Debug, Clone, PartialEq)]
pub struct CubeFaces {
    pub size: u32,
    pub pixels: Vec<u8>,
}

impl CubeFaces {
    pub fn load(paths: &[PathBuf; 6]) -> Result<Self, SkyboxError> {
        let mut size = None;
        let mut pixels = Vec::new();
        for path in paths {
            let face = load_face(path)?;
            let expected = *size.get_or_insert(face.width());
            if face.width() != expected {
                return Err(SkyboxError::SizeMismatch {
                    path: path.clone(),
                    size: face.width(),
                    expected,
                });
            }
            pixels.extend_from_slice(face.as_raw());
        }
        Ok(Self {
            size: size.unwrap_or(1),
            pixels,
        })
    }

    /// One-texel placeholder bound when the gradient is drawn.
    fn placeholder() -> Self {
        Self {
            size: 1,
            pixels: vec![0; 4 * 6],
        }
    }
}

fn load_face(path: &Path) -> Result<image::RgbaImage, SkyboxError> {
    let face = image::open(path)
        .map_err(|source| SkyboxError::Image {
            path: path.to_path_buf(),
            source,
        })?
        .to_rgba8();
    if face.width() != face.height() {
        return Err(SkyboxError::NotSquare {
            path: path.to_path_buf(),
            width: face.width(),
            height: face.height(),
        });
    }
    Ok(face)
}

#[repr(C)]
#[derive(Copy, Clone, Debug, bytemuck::Pod, bytemuck::Zeroable)]
struct SkyUniform {
    inv_view_proj: [[f32; 4]; 4],
    flags: [f32; 4],
}

pub struct Skybox {
    pipeline: wgpu::RenderPipeline,
    bind_group: wgpu::BindGroup,
    uniform_buffer: wgpu::Buffer,
    _texture: wgpu::Texture,
    has_cube_map: bool,
}

impl Skybox {
    /// Build the skybox. Faces that fail to load are logged and the
    /// gradient is used instead.
    pub fn new(
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        surface_format: wgpu::TextureFormat,
        faces: Option<&[PathBuf; 6]>,
    ) -> Self {
        let loaded = faces.and_then(|paths| match CubeFaces::load(paths) {
            Ok(faces) => {
                log::info!("Loaded skybox ({}x{} faces)", faces.size, faces.size);
                Some(faces)
            }
            Err(e) => {
                log::warn!("{}; using the procedural sky", e);
                None
            }
        });
        let has_cube_map = loaded.is_some();
        let faces = loaded.unwrap_or_else(CubeFaces::placeholder);

        let texture = device.create_texture_with_data(
            queue,
            &wgpu::TextureDescriptor {
                label: Some("Skybox Texture"),
                size: wgpu::Extent3d {
                    width: faces.size,
                    height: faces.size,
                    depth_or_array_layers: 6,
                },
                mip_level_count: 1,
                sample_count: 1,
                dimension: wgpu::TextureDimension::D2,
                format: wgpu::TextureFormat::Rgba8UnormSrgb,
                usage: wgpu::TextureUsages::TEXTURE_BINDING,
                view_formats: &[],
            },
            wgpu::util::TextureDataOrder::LayerMajor,
            &faces.pixels,
        );
        let view = texture.create_view(&wgpu::TextureViewDescriptor {
            label: Some("Skybox View"),
            dimension: Some(wgpu::TextureViewDimension::Cube),
            ..Default::default()
        });
        let sampler = device.create_sampler(&wgpu::SamplerDescriptor {
            label: Some("Skybox Sampler"),
            address_mode_u: wgpu::AddressMode::ClampToEdge,
            address_mode_v: wgpu::AddressMode::ClampToEdge,
            address_mode_w: wgpu::AddressMode::ClampToEdge,
            mag_filter: wgpu::FilterMode::Linear,
            min_filter: wgpu::FilterMode::Linear,
            ..Default::default()
        });

        let uniform = SkyUniform {
            inv_view_proj: umbra_math::Mat4::IDENTITY.to_cols_array_2d(),
            flags: [if has_cube_map { 1.0 } else { 0.0 }, 0.0, 0.0, 0.0],
        };
        let uniform_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("Skybox Uniform Buffer"),
            contents: bytemuck::bytes_of(&uniform),
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
        });

        let layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("Skybox Bind Group Layout"),
            entries: &[
                wgpu::BindGroupLayoutEntry {
                    binding: 0,
                    visibility: wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Buffer {
                        ty: wgpu::BufferBindingType::Uniform,
                        has_dynamic_offset: false,
                        min_binding_size: None,
                    },
                    count: None,
                },
                wgpu::BindGroupLayoutEntry {
                    binding: 1,
                    visibility: wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Texture {
                        sample_type: wgpu::TextureSampleType::Float { filterable: true },
                        view_dimension: wgpu::TextureViewDimension::Cube,
                        multisampled: false,
                    },
                    count: None,
                },
                wgpu::BindGroupLayoutEntry {
                    binding: 2,
                    visibility: wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Sampler(wgpu::SamplerBindingType::Filtering),
                    count: None,
                },
            ],
        });
        let bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("Skybox Bind Group"),
            layout: &layout,
            entries: &[
                wgpu::BindGroupEntry {
                    binding: 0,
                    resource: uniform_buffer.as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: 1,
                    resource: wgpu::BindingResource::TextureView(&view),
                },
                wgpu::BindGroupEntry {
                    binding: 2,
                    resource: wgpu::BindingResource::Sampler(&sampler),
                },
            ],
        });

        let shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("Skybox Shader"),
            source: wgpu::ShaderSource::Wgsl(include_str!("shaders/skybox.wgsl").into()),
        });
        let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("Skybox Pipeline Layout"),
            bind_group_layouts: &[&layout],
            push_constant_ranges: &[],
        });
        let pipeline = device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
            label: Some("Skybox Pipeline"),
            layout: Some(&pipeline_layout),
            vertex: wgpu::VertexState {
                module: &shader,
                entry_point: "vs_main",
                buffers: &[],
                compilation_options: Default::default(),
            },
            fragment: Some(wgpu::FragmentState {
                module: &shader,
                entry_point: "fs_main",
                targets: &[Some(wgpu::ColorTargetState {
                    format: surface_format,
                    blend: Some(wgpu::BlendState::REPLACE),
                    write_mask: wgpu::ColorWrites::ALL,
                })],
                compilation_options: Default::default(),
            }),
            primitive: wgpu::PrimitiveState::default(),
            // Only fills texels nothing else has drawn to
            depth_stencil: Some(wgpu::DepthStencilState {
                format: DEPTH_FORMAT,
                depth_write_enabled: false,
                depth_compare: wgpu::CompareFunction::LessEqual,
                stencil: wgpu::StencilState::default(),
                bias: wgpu::DepthBiasState::default(),
            }),
            multisample: wgpu::MultisampleState::default(),
            multiview: None,
            cache: None,
        });

        Self {
            pipeline,
            bind_group,
            uniform_buffer,
            _texture: texture,
            has_cube_map,
        }
    }

    pub fn has_cube_map(&self) -> bool {
        self.has_cube_map
    }

    pub fn prepare(&self, queue: &wgpu::Queue, frame: &FrameContext) {
        let uniform = SkyUniform {
            inv_view_proj: (frame.projection * frame.view).inverse().to_cols_array_2d(),
            flags: [if self.has_cube_map { 1.0 } else { 0.0 }, 0.0, 0.0, 0.0],
        };
        queue.write_buffer(&self.uniform_buffer, 0, bytemuck::bytes_of(&uniform));
    }

    /// Draw into a pass that already holds the scene's depth.
    pub fn draw(&self, pass: &mut wgpu::RenderPass<'_>) {
        pass.set_pipeline(&self.pipeline);
        pass.set_bind_group(0, &self.bind_group, &[]);
        pass.draw(0..3, 0..1);
    }
}
