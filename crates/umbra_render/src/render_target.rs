//! Offscreen render targets with owned depth and color attachments.
//!
//! A target's attachment count and formats are fixed at creation. Targets
//! are read with `textureLoad`, so no samplers are attached: every read is
//! an exact texel fetch with coordinates clamped to the edge by the shader.
//!
//! Resizing means building a new target. [`RenderTarget::release`] frees the
//! textures early; dropping a target releases it too.

use std::sync::atomic::{AtomicU64, Ordering};

use thiserror::Error;
use umbra_math::UVec2;

/// Format of every color attachment.
pub const COLOR_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Rgba32Float;
/// Format of every depth attachment.
pub const DEPTH_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Depth32Float;

static NEXT_ATTACHMENT_ID: AtomicU64 = AtomicU64::new(1);

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TargetError {
    #[error("render target '{0}' is incomplete")]
    Incomplete(String),

    #[error("render target '{0}' was released")]
    Released(String),

    #[error("render target '{label}' has no color attachment {index}")]
    NoColor { label: String, index: usize },

    #[error("render target '{0}' has no depth attachment")]
    NoDepth(String),

    #[error("copy region {min:?}..{max:?} does not fit {width}x{height}")]
    OutOfBounds {
        min: UVec2,
        max: UVec2,
        width: u32,
        height: u32,
    },

    #[error("depth can only be copied as a whole")]
    PartialDepthCopy,

    #[error("depth cannot be copied to the display surface")]
    DepthToSurface,

    #[error("copy source and destination are the same attachment")]
    SameAttachment,
}

/// Identity of one attachment texture. Never reused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct AttachmentId(u64);

impl AttachmentId {
    fn next() -> Self {
        Self(NEXT_ATTACHMENT_ID.fetch_add(1, Ordering::Relaxed))
    }
}

#[derive(Debug)]
pub struct Attachment {
    pub id: AttachmentId,
    pub texture: wgpu::Texture,
    pub view: wgpu::TextureView,
    pub format: wgpu::TextureFormat,
}

impl Attachment {
    fn new(device: &wgpu::Device, label: &str, width: u32, height: u32, format: wgpu::TextureFormat) -> Self {
        let texture = device.create_texture(&wgpu::TextureDescriptor {
            label: Some(label),
            size: wgpu::Extent3d {
                width,
                height,
                depth_or_array_layers: 1,
            },
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format,
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT
                | wgpu::TextureUsages::TEXTURE_BINDING
                | wgpu::TextureUsages::COPY_SRC
                | wgpu::TextureUsages::COPY_DST,
            view_formats: &[],
        });
        let view = texture.create_view(&wgpu::TextureViewDescriptor::default());

        Self {
            id: AttachmentId::next(),
            texture,
            view,
            format,
        }
    }
}

/// What a render target is asked to hold.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TargetDesc {
    pub width: u32,
    pub height: u32,
    pub depth: bool,
    pub color: bool,
    pub color_count: usize,
}

impl TargetDesc {
    /// Depth attachment only, e.g. a shadow map.
    pub fn depth_only(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            depth: true,
            color: false,
            color_count: 0,
        }
    }

    /// `color_count` color attachments, no depth.
    pub fn color_only(width: u32, height: u32, color_count: usize) -> Self {
        Self {
            width,
            height,
            depth: false,
            color: true,
            color_count,
        }
    }

    pub fn depth_and_color(width: u32, height: u32, color_count: usize) -> Self {
        Self {
            width,
            height,
            depth: true,
            color: true,
            color_count,
        }
    }

    /// Why wgpu would reject this target, if it would.
    fn incomplete_reason(&self, limits: &wgpu::Limits) -> Option<String> {
        let max = limits.max_texture_dimension_2d;
        if self.width == 0 || self.height == 0 {
            Some(format!("zero size {}x{}", self.width, self.height))
        } else if self.width > max || self.height > max {
            Some(format!("{}x{} exceeds the {} texel limit", self.width, self.height, max))
        } else if !self.depth && !self.color {
            Some("no attachments requested".to_string())
        } else if self.color && self.color_count == 0 {
            Some("color requested with zero attachments".to_string())
        } else if self.color && self.color_count > limits.max_color_attachments as usize {
            Some(format!(
                "{} color attachments exceed the limit of {}",
                self.color_count, limits.max_color_attachments
            ))
        } else {
            None
        }
    }
}

pub struct RenderTarget {
    label: String,
    width: u32,
    height: u32,
    depth: Option<Attachment>,
    colors: Vec<Attachment>,
    complete: bool,
    released: bool,
}

impl RenderTarget {
    /// Allocate a target. An incomplete request is logged and yields a target
    /// with no attachments whose `is_complete()` is false.
    pub fn new(device: &wgpu::Device, label: &str, desc: TargetDesc) -> Self {
        if let Some(reason) = desc.incomplete_reason(&device.limits()) {
            log::error!("Render target '{}' is incomplete: {}", label, reason);
            return Self {
                label: label.to_string(),
                width: desc.width,
                height: desc.height,
                depth: None,
                colors: Vec::new(),
                complete: false,
                released: false,
            };
        }

        let depth = desc
            .depth
            .then(|| Attachment::new(device, &format!("{} depth", label), desc.width, desc.height, DEPTH_FORMAT));
        let color_count = if desc.color { desc.color_count } else { 0 };
        let colors = (0..color_count)
            .map(|i| Attachment::new(device, &format!("{} color {}", label, i), desc.width, desc.height, COLOR_FORMAT))
            .collect();

        log::debug!(
            "Created render target '{}' {}x{} (depth: {}, colors: {})",
            label,
            desc.width,
            desc.height,
            desc.depth,
            color_count
        );

        Self {
            label: label.to_string(),
            width: desc.width,
            height: desc.height,
            depth,
            colors,
            complete: true,
            released: false,
        }
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn is_complete(&self) -> bool {
        self.complete
    }

    pub fn is_released(&self) -> bool {
        self.released
    }

    /// True when the target is usable at exactly this size.
    pub fn matches(&self, width: u32, height: u32) -> bool {
        self.complete && !self.released && self.width == width && self.height == height
    }

    pub fn color_count(&self) -> usize {
        self.colors.len()
    }

    pub fn has_depth(&self) -> bool {
        self.depth.is_some()
    }

    /// Ids of every attachment, depth first.
    pub fn attachment_ids(&self) -> Vec<AttachmentId> {
        self.depth.iter().chain(self.colors.iter()).map(|a| a.id).collect()
    }

    fn check_usable(&self) -> Result<(), TargetError> {
        if self.released {
            Err(TargetError::Released(self.label.clone()))
        } else if !self.complete {
            Err(TargetError::Incomplete(self.label.clone()))
        } else {
            Ok(())
        }
    }

    fn color(&self, index: usize) -> Result<&Attachment, TargetError> {
        self.check_usable()?;
        self.colors.get(index).ok_or_else(|| TargetError::NoColor {
            label: self.label.clone(),
            index,
        })
    }

    fn depth(&self) -> Result<&Attachment, TargetError> {
        self.check_usable()?;
        self.depth.as_ref().ok_or_else(|| TargetError::NoDepth(self.label.clone()))
    }

    pub fn color_view(&self, index: usize) -> Result<&wgpu::TextureView, TargetError> {
        Ok(&self.color(index)?.view)
    }

    pub fn depth_view(&self) -> Result<&wgpu::TextureView, TargetError> {
        Ok(&self.depth()?.view)
    }

    #[cfg(test)]
    pub(crate) fn color_texture(&self, index: usize) -> Result<&wgpu::Texture, TargetError> {
        Ok(&self.color(index)?.texture)
    }

    /// Every attachment as a readable view.
    pub fn bind_for_read(&self) -> Result<TargetRead<'_>, TargetError> {
        self.check_usable()?;
        Ok(TargetRead {
            depth: self.depth.as_ref().map(|a| &a.view),
            colors: self.colors.iter().map(|a| &a.view).collect(),
        })
    }

    /// The listed color attachments (in order) plus depth, as pass outputs.
    pub fn bind_for_write(&self, colors: &[usize], clear: bool) -> Result<TargetWrite<'_>, TargetError> {
        let color_views = colors
            .iter()
            .map(|i| self.color_view(*i))
            .collect::<Result<Vec<_>, _>>()?;
        self.check_usable()?;

        Ok(TargetWrite {
            colors: color_views,
            depth: self.depth.as_ref().map(|a| &a.view),
            clear,
        })
    }

    /// Read and write handles at once. wgpu rejects a pass that samples an
    /// attachment it also writes, so callers read only what they do not write.
    pub fn bind_both(&self, colors: &[usize], clear: bool) -> Result<(TargetRead<'_>, TargetWrite<'_>), TargetError> {
        Ok((self.bind_for_read()?, self.bind_for_write(colors, clear)?))
    }

    /// Copy a rectangle of this target to another target or to the surface.
    ///
    /// Color is copied from `source_color_index` to the destination's
    /// `dest_color_index`. Depth is copied whole or not at all.
    pub fn copy_region(
        &self,
        device: &wgpu::Device,
        encoder: &mut wgpu::CommandEncoder,
        dest: CopyTarget<'_>,
        region: CopyRegion,
    ) -> Result<(), TargetError> {
        self.check_usable()?;
        let (dest_width, dest_height) = match &dest {
            CopyTarget::Target(target) => (target.width, target.height),
            CopyTarget::Surface { width, height, .. } => (*width, *height),
        };
        region.check_bounds(self.width, self.height)?;
        region.check_bounds(dest_width, dest_height)?;

        match dest {
            CopyTarget::Target(target) => {
                target.check_usable()?;
                if region.copy_color {
                    let src = self.color(region.source_color_index)?;
                    let dst = target.color(region.dest_color_index)?;
                    if src.id == dst.id {
                        return Err(TargetError::SameAttachment);
                    }
                    copy_texture(encoder, &src.texture, &dst.texture, wgpu::TextureAspect::All, region);
                }
                if region.copy_depth {
                    let full = region.src_min == UVec2::ZERO
                        && region.src_max == UVec2::new(self.width, self.height)
                        && self.width == target.width
                        && self.height == target.height;
                    if !full {
                        return Err(TargetError::PartialDepthCopy);
                    }
                    let src = self.depth()?;
                    let dst = target.depth()?;
                    if src.id == dst.id {
                        return Err(TargetError::SameAttachment);
                    }
                    copy_texture(encoder, &src.texture, &dst.texture, wgpu::TextureAspect::DepthOnly, region);
                }
                Ok(())
            }
            CopyTarget::Surface { view, blitter, .. } => {
                if region.copy_depth {
                    return Err(TargetError::DepthToSurface);
                }
                if region.copy_color {
                    let src = self.color(region.source_color_index)?;
                    blitter.blit(device, encoder, &src.view, view, region);
                }
                Ok(())
            }
        }
    }

    /// Destroy every attachment. Safe to call more than once.
    pub fn release(&mut self) {
        if self.released {
            return;
        }
        if let Some(depth) = self.depth.take() {
            depth.texture.destroy();
        }
        for color in self.colors.drain(..) {
            color.texture.destroy();
        }
        self.released = true;
        log::debug!("Released render target '{}'", self.label);
    }
}

impl Drop for RenderTarget {
    fn drop(&mut self) {
        self.release();
    }
}

fn copy_texture(
    encoder: &mut wgpu::CommandEncoder,
    src: &wgpu::Texture,
    dst: &wgpu::Texture,
    aspect: wgpu::TextureAspect,
    region: CopyRegion,
) {
    let origin = wgpu::Origin3d {
        x: region.src_min.x,
        y: region.src_min.y,
        z: 0,
    };
    let size = region.size();
    encoder.copy_texture_to_texture(
        wgpu::ImageCopyTexture {
            texture: src,
            mip_level: 0,
            origin,
            aspect,
        },
        wgpu::ImageCopyTexture {
            texture: dst,
            mip_level: 0,
            origin,
            aspect,
        },
        wgpu::Extent3d {
            width: size.x,
            height: size.y,
            depth_or_array_layers: 1,
        },
    );
}

/// Readable views of a target's attachments.
pub struct TargetRead<'a> {
    pub depth: Option<&'a wgpu::TextureView>,
    pub colors: Vec<&'a wgpu::TextureView>,
}

/// Attachments a render pass writes.
pub struct TargetWrite<'a> {
    colors: Vec<&'a wgpu::TextureView>,
    depth: Option<&'a wgpu::TextureView>,
    clear: bool,
}

impl<'a> TargetWrite<'a> {
    /// Drop the depth attachment, for fullscreen passes.
    pub fn without_depth(mut self) -> Self {
        self.depth = None;
        self
    }

    /// Begin a render pass on these attachments. Clearing resets color to
    /// transparent black and depth to 1.
    pub fn begin<'e>(&self, encoder: &'e mut wgpu::CommandEncoder, label: &str) -> wgpu::RenderPass<'e> {
        let color_load = if self.clear {
            wgpu::LoadOp::Clear(wgpu::Color::TRANSPARENT)
        } else {
            wgpu::LoadOp::Load
        };
        let depth_load = if self.clear { wgpu::LoadOp::Clear(1.0) } else { wgpu::LoadOp::Load };

        let color_attachments: Vec<Option<wgpu::RenderPassColorAttachment>> = self
            .colors
            .iter()
            .map(|view| {
                Some(wgpu::RenderPassColorAttachment {
                    view,
                    resolve_target: None,
                    ops: wgpu::Operations {
                        load: color_load,
                        store: wgpu::StoreOp::Store,
                    },
                })
            })
            .collect();

        encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
            label: Some(label),
            color_attachments: &color_attachments,
            depth_stencil_attachment: self.depth.map(|view| wgpu::RenderPassDepthStencilAttachment {
                view,
                depth_ops: Some(wgpu::Operations {
                    load: depth_load,
                    store: wgpu::StoreOp::Store,
                }),
                stencil_ops: None,
            }),
            timestamp_writes: None,
            occlusion_query_set: None,
        })
    }
}

/// Where `copy_region` writes.
pub enum CopyTarget<'a> {
    Target(&'a RenderTarget),
    Surface {
        view: &'a wgpu::TextureView,
        width: u32,
        height: u32,
        blitter: &'a Blitter,
    },
}

/// Rectangle and attachments to copy. `src_max` is exclusive.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CopyRegion {
    pub copy_color: bool,
    pub source_color_index: usize,
    pub dest_color_index: usize,
    pub copy_depth: bool,
    pub src_min: UVec2,
    pub src_max: UVec2,
}

impl CopyRegion {
    /// Copy one color attachment over the whole `width` x `height` area.
    pub fn color(source_color_index: usize, dest_color_index: usize, width: u32, height: u32) -> Self {
        Self {
            copy_color: true,
            source_color_index,
            dest_color_index,
            copy_depth: false,
            src_min: UVec2::ZERO,
            src_max: UVec2::new(width, height),
        }
    }

    pub fn size(&self) -> UVec2 {
        self.src_max.saturating_sub(self.src_min)
    }

    fn check_bounds(&self, width: u32, height: u32) -> Result<(), TargetError> {
        let inside = self.src_min.x < self.src_max.x
            && self.src_min.y < self.src_max.y
            && self.src_max.x <= width
            && self.src_max.y <= height;
        if inside {
            Ok(())
        } else {
            Err(TargetError::OutOfBounds {
                min: self.src_min,
                max: self.src_max,
                width,
                height,
            })
        }
    }
}

/// Draws a color attachment onto the display surface. Surface textures
/// cannot be copy destinations, so surface copies are fullscreen draws
/// clipped to the region.
pub struct Blitter {
    layout: wgpu::BindGroupLayout,
    pipeline: wgpu::RenderPipeline,
}

impl Blitter {
    pub fn new(device: &wgpu::Device, format: wgpu::TextureFormat) -> Self {
        let layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("Blit Bind Group Layout"),
            entries: &[wgpu::BindGroupLayoutEntry {
                binding: 0,
                visibility: wgpu::ShaderStages::FRAGMENT,
                ty: wgpu::BindingType::Texture {
                    sample_type: wgpu::TextureSampleType::Float { filterable: false },
                    view_dimension: wgpu::TextureViewDimension::D2,
                    multisampled: false,
                },
                count: None,
            }],
        });

        let shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("Blit Shader"),
            source: wgpu::ShaderSource::Wgsl(include_str!("shaders/blit.wgsl").into()),
        });

        let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("Blit Pipeline Layout"),
            bind_group_layouts: &[&layout],
            push_constant_ranges: &[],
        });

        let pipeline = device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
            label: Some("Blit Pipeline"),
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
                    format,
                    blend: Some(wgpu::BlendState::REPLACE),
                    write_mask: wgpu::ColorWrites::ALL,
                })],
                compilation_options: Default::default(),
            }),
            primitive: wgpu::PrimitiveState::default(),
            depth_stencil: None,
            multisample: wgpu::MultisampleState::default(),
            multiview: None,
            cache: None,
        });

        Self { layout, pipeline }
    }

    fn blit(
        &self,
        device: &wgpu::Device,
        encoder: &mut wgpu::CommandEncoder,
        source: &wgpu::TextureView,
        dest: &wgpu::TextureView,
        region: CopyRegion,
    ) {
        let bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("Blit Bind Group"),
            layout: &self.layout,
            entries: &[wgpu::BindGroupEntry {
                binding: 0,
                resource: wgpu::BindingResource::TextureView(source),
            }],
        });

        let mut pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
            label: Some("Blit Pass"),
            color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                view: dest,
                resolve_target: None,
                ops: wgpu::Operations {
                    load: wgpu::LoadOp::Load,
                    store: wgpu::StoreOp::Store,
                },
            })],
            depth_stencil_attachment: None,
            timestamp_writes: None,
            occlusion_query_set: None,
        });

        let size = region.size();
        pass.set_scissor_rect(region.src_min.x, region.src_min.y, size.x, size.y);
        pass.set_pipeline(&self.pipeline);
        pass.set_bind_group(0, &bind_group, &[]);
        pass.draw(0..3, 0..1);
    }
}
