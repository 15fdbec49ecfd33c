//! GPU vertex layout and uploaded geometry.

use bytemuck::Zeroable;
use wgpu::util::DeviceExt;

use umbra_core::{Geometry, Mesh, Wire};

/// Vertex data for rendering
#[repr(C)]
#[derive(Copy, Clone, Debug, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct Vertex {
    pub position: [f32; 3],
    pub normal: [f32; 3],
}

impl Vertex {
    const ATTRIBS: [wgpu::VertexAttribute; 2] = wgpu::vertex_attr_array![0 => Float32x3, 1 => Float32x3];

    pub fn desc<'a>() -> wgpu::VertexBufferLayout<'a> {
        wgpu::VertexBufferLayout {
            array_stride: std::mem::size_of::<Vertex>() as wgpu::BufferAddress,
            step_mode: wgpu::VertexStepMode::Vertex,
            attributes: &Self::ATTRIBS,
        }
    }

    pub fn from_mesh(mesh: &Mesh) -> Vec<Self> {
        mesh.positions()
            .iter()
            .zip(mesh.normals())
            .map(|(p, n)| Self {
                position: p.to_array(),
                normal: n.to_array(),
            })
            .collect()
    }

    /// Line points carry no normal.
    pub fn from_wire(wire: &Wire) -> Vec<Self> {
        wire.points()
            .iter()
            .map(|p| Self {
                position: p.to_array(),
                normal: [0.0; 3],
            })
            .collect()
    }
}

/// Geometry uploaded to vertex (and index) buffers.
pub struct GpuGeometry {
    vertex_buffer: wgpu::Buffer,
    index_buffer: Option<wgpu::Buffer>,
    count: u32,
    topology: wgpu::PrimitiveTopology,
}

impl GpuGeometry {
    pub fn upload(device: &wgpu::Device, label: &str, geometry: &Geometry) -> Self {
        match geometry {
            Geometry::Triangles(mesh) => Self::from_mesh(device, label, mesh),
            Geometry::Lines(wire) => Self::from_wire(device, label, wire),
        }
    }

    pub fn from_mesh(device: &wgpu::Device, label: &str, mesh: &Mesh) -> Self {
        let vertex_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some(label),
            contents: bytemuck::cast_slice(&Vertex::from_mesh(mesh)),
            usage: wgpu::BufferUsages::VERTEX,
        });
        let index_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some(label),
            contents: bytemuck::cast_slice(mesh.indices()),
            usage: wgpu::BufferUsages::INDEX,
        });

        Self {
            vertex_buffer,
            index_buffer: Some(index_buffer),
            count: mesh.indices().len() as u32,
            topology: wgpu::PrimitiveTopology::TriangleList,
        }
    }

    pub fn from_wire(device: &wgpu::Device, label: &str, wire: &Wire) -> Self {
        let vertices = Vertex::from_wire(wire);
        let count = vertices.len() as u32;
        // Zero-sized buffers are invalid, so an empty wire keeps one unused vertex
        let contents = if vertices.is_empty() {
            vec![Vertex::zeroed()]
        } else {
            vertices
        };
        let vertex_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some(label),
            contents: bytemuck::cast_slice(&contents),
            usage: wgpu::BufferUsages::VERTEX,
        });

        Self {
            vertex_buffer,
            index_buffer: None,
            count,
            topology: wgpu::PrimitiveTopology::LineList,
        }
    }

    pub fn topology(&self) -> wgpu::PrimitiveTopology {
        self.topology
    }

    pub fn draw(&self, pass: &mut wgpu::RenderPass<'_>) {
        if self.count == 0 {
            return;
        }
        pass.set_vertex_buffer(0, self.vertex_buffer.slice(..));
        match &self.index_buffer {
            Some(indices) => {
                pass.set_index_buffer(indices.slice(..), wgpu::IndexFormat::Uint32);
                pass.draw_indexed(0..self.count, 0, 0..1);
            }
            None => pass.draw(0..self.count, 0..1),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use umbra_math::Vec3;

    #[test]
    fn test_vertex_layout() {
        assert_eq!(std::mem::size_of::<Vertex>(), 24);
        let desc = Vertex::desc();
        assert_eq!(desc.array_stride, 24);
        assert_eq!(desc.attributes.len(), 2);
        assert_eq!(desc.attributes[1].offset, 12);
    }

    #[test]
    fn test_vertices_from_mesh() {
        let mesh = Mesh::cuboid(1.0, 1.0, 1.0).unwrap();
        let vertices = Vertex::from_mesh(&mesh);
        assert_eq!(vertices.len(), 36);
        for v in &vertices {
            assert!((Vec3::from_array(v.normal).length() - 1.0).abs() < 0.001);
        }
    }

    #[test]
    fn test_wire_vertices_have_no_normal() {
        let wire = Wire::new(vec![Vec3::ZERO, Vec3::X]);
        let vertices = Vertex::from_wire(&wire);
        assert_eq!(vertices.len(), 2);
        assert_eq!(vertices[1].position, [1.0, 0.0, 0.0]);
        assert_eq!(vertices[1].normal, [0.0; 3]);
    }
}
