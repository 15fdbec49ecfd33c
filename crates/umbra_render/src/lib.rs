//! Umbra Render - wgpu passes for the Umbra viewer.
//!
//! - **Render targets**: offscreen attachments with read/write binding and copies
//! - **Shaders**: variants assembled from a fragment library and reflected with naga
//! - **Passes**: shadow map, view normals, ambient occlusion, lit geometry, skybox
//! - **Renderer**: owns the device and runs the passes each frame

pub mod ao;
pub mod frame;
pub mod geometry;
pub mod render_target;
pub mod renderer;
pub mod shader;
pub mod shadow;
pub mod skybox;
pub mod ui;
pub mod vertex;

pub use ao::{AmbientOcclusionPass, AoParams, SampleSet};
pub use frame::FrameContext;
pub use geometry::{GeometryPass, GpuObject, GpuScene, LitInputs};
pub use render_target::{Blitter, CopyRegion, CopyTarget, RenderTarget, TargetDesc, TargetError};
pub use renderer::{FpsCounter, FrameStatus, Renderer};
pub use shader::{FragmentLibrary, ShaderKind, ShaderTable, ShaderVariant};
pub use shadow::ShadowPass;
pub use skybox::{CubeFaces, Skybox, SkyboxError};
pub use vertex::{GpuGeometry, Vertex};

#[cfg(test)]
pub(crate) mod test_support {
    /// A headless device, or None on machines without a usable adapter.
    pub fn test_device() -> Option<(wgpu::Device, wgpu::Queue)> {
        let instance = wgpu::Instance::default();
        let adapter = pollster::block_on(instance.request_adapter(&wgpu::RequestAdapterOptions::default()))?;
        pollster::block_on(adapter.request_device(&wgpu::DeviceDescriptor::default(), None)).ok()
    }

    /// Upload row-major texels into an Rgba32Float texture.
    pub fn fill_rgba32f(queue: &wgpu::Queue, texture: &wgpu::Texture, texels: &[[f32; 4]]) {
        queue.write_texture(
            texture.as_image_copy(),
            bytemuck::cast_slice(texels),
            wgpu::ImageDataLayout {
                offset: 0,
                bytes_per_row: Some(texture.width() * 16),
                rows_per_image: Some(texture.height()),
            },
            texture.size(),
        );
    }

    /// Copy an Rgba32Float texture back to the CPU, row-major.
    pub fn read_rgba32f(device: &wgpu::Device, queue: &wgpu::Queue, texture: &wgpu::Texture) -> Vec<[f32; 4]> {
        let (width, height) = (texture.width(), texture.height());
        let unpadded = width * 16;
        let padded = unpadded.div_ceil(wgpu::COPY_BYTES_PER_ROW_ALIGNMENT) * wgpu::COPY_BYTES_PER_ROW_ALIGNMENT;

        let buffer = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("Readback Buffer"),
            size: (padded * height) as wgpu::BufferAddress,
            usage: wgpu::BufferUsages::COPY_DST | wgpu::BufferUsages::MAP_READ,
            mapped_at_creation: false,
        });
        let mut encoder = device.create_command_encoder(&wgpu::CommandEncoderDescriptor { label: None });
        encoder.copy_texture_to_buffer(
            texture.as_image_copy(),
            wgpu::ImageCopyBuffer {
                buffer: &buffer,
                layout: wgpu::ImageDataLayout {
                    offset: 0,
                    bytes_per_row: Some(padded),
                    rows_per_image: Some(height),
                },
            },
            texture.size(),
        );
        queue.submit(std::iter::once(encoder.finish()));

        let slice = buffer.slice(..);
        slice.map_async(wgpu::MapMode::Read, |result| {
            if let Err(e) = result {
                panic!("readback failed: {:?}", e);
            }
        });
        let _ = device.poll(wgpu::Maintain::Wait);

        let data = slice.get_mapped_range();
        let mut texels = Vec::with_capacity((width * height) as usize);
        for row in data.chunks(padded as usize) {
            texels.extend(
                row[..unpadded as usize]
                    .chunks_exact(16)
                    .map(bytemuck::pod_read_unaligned::<[f32; 4]>),
            );
        }
        drop(data);
        buffer.unmap();
        texels
    }
}
