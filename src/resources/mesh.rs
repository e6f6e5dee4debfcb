//! Vertex streams
//!
//! A vertex stream is a range of the shared geometry arena (one vertex
//! buffer, one index buffer) plus its index format and topology. Parts
//! reference sub-ranges of a stream through [`IndexRegion`].

use bytemuck::{Pod, Zeroable};
use glam::Vec3;

use super::bounds::BoundingBox;

/// Interleaved vertex layout shared by every geometry program.
///
/// `joints`/`weights` are only read when a part carries a palette offset.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct Vertex {
    pub position: [f32; 3],
    pub normal: [f32; 3],
    pub uv: [f32; 2],
    pub joints: [u32; 4],
    pub weights: [f32; 4],
}

impl Vertex {
    #[must_use]
    pub fn new(position: [f32; 3], normal: [f32; 3], uv: [f32; 2]) -> Self {
        Self {
            position,
            normal,
            uv,
            joints: [0; 4],
            weights: [0.0; 4],
        }
    }

    #[must_use]
    pub fn with_skin(mut self, joints: [u32; 4], weights: [f32; 4]) -> Self {
        self.joints = joints;
        self.weights = weights;
        self
    }
}

/// CPU index data, in one of the two index formats.
#[derive(Debug, Clone)]
pub enum IndexData {
    U16(Vec<u16>),
    U32(Vec<u32>),
}

impl IndexData {
    pub fn len(&self) -> usize {
        match self {
            IndexData::U16(indices) => indices.len(),
            IndexData::U32(indices) => indices.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn format(&self) -> wgpu::IndexFormat {
        match self {
            IndexData::U16(_) => wgpu::IndexFormat::Uint16,
            IndexData::U32(_) => wgpu::IndexFormat::Uint32,
        }
    }

    pub fn as_bytes(&self) -> &[u8] {
        match self {
            IndexData::U16(indices) => bytemuck::cast_slice(indices),
            IndexData::U32(indices) => bytemuck::cast_slice(indices),
        }
    }
}

/// Size in bytes of one index of `format`.
pub fn index_size(format: wgpu::IndexFormat) -> u32 {
    match format {
        wgpu::IndexFormat::Uint16 => 2,
        wgpu::IndexFormat::Uint32 => 4,
    }
}

/// Geometry handed to [`Storage::add_vertex_stream`](super::storage::Storage::add_vertex_stream).
#[derive(Debug, Clone)]
pub struct VertexStreamDesc {
    pub label: String,
    pub topology: wgpu::PrimitiveTopology,
    pub vertices: Vec<Vertex>,
    pub indices: IndexData,
}

/// A stream placed in the geometry arena.
#[derive(Debug, Clone)]
pub struct VertexStream {
    pub label: String,
    pub topology: wgpu::PrimitiveTopology,
    pub index_format: wgpu::IndexFormat,
    /// First vertex of the stream in the shared vertex buffer.
    pub vertex_offset: u32,
    pub vertex_count: u32,
    /// Byte offset of the stream's first index in the shared index buffer.
    pub index_byte_offset: u64,
    pub index_count: u32,
    /// Bounds of the stream's vertices, in model space.
    pub bounds: BoundingBox,
}

impl VertexStream {
    /// Region covering every index of the stream.
    pub fn full_region(&self) -> IndexRegion {
        IndexRegion { first: 0, count: self.index_count, base_vertex: 0 }
    }
}

/// A drawable sub-range of a vertex stream, relative to the stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IndexRegion {
    pub first: u32,
    pub count: u32,
    pub base_vertex: i32,
}

/// Axis-aligned box with 24 vertices (4 per face) and 36 `u16` indices.
#[must_use]
pub fn box_stream(label: &str, width: f32, height: f32, depth: f32) -> VertexStreamDesc {
    let half = Vec3::new(width, height, depth) * 0.5;

    // (normal, tangent u, tangent v) per face; u x v == normal keeps CCW winding.
    let faces = [
        (Vec3::Z, Vec3::X, Vec3::Y),
        (Vec3::NEG_Z, Vec3::NEG_X, Vec3::Y),
        (Vec3::Y, Vec3::X, Vec3::NEG_Z),
        (Vec3::NEG_Y, Vec3::X, Vec3::Z),
        (Vec3::X, Vec3::NEG_Z, Vec3::Y),
        (Vec3::NEG_X, Vec3::Z, Vec3::Y),
    ];

    let mut vertices = Vec::with_capacity(24);
    let mut indices = Vec::with_capacity(36);
    for (normal, u, v) in faces {
        let base = vertices.len() as u16;
        for (su, sv) in [(-1.0, -1.0), (1.0, -1.0), (1.0, 1.0), (-1.0, 1.0)] {
            let position = (normal + u * su + v * sv) * half;
            vertices.push(Vertex::new(
                position.to_array(),
                normal.to_array(),
                [(su + 1.0) * 0.5, (1.0 - sv) * 0.5],
            ));
        }
        indices.extend_from_slice(&[base, base + 1, base + 2, base, base + 2, base + 3]);
    }

    VertexStreamDesc {
        label: label.to_owned(),
        topology: wgpu::PrimitiveTopology::TriangleList,
        vertices,
        indices: IndexData::U16(indices),
    }
}

/// Square in the XZ plane facing +Y.
#[must_use]
pub fn plane_stream(label: &str, size: f32) -> VertexStreamDesc {
    let h = size * 0.5;
    let vertices = vec![
        Vertex::new([-h, 0.0, h], [0.0, 1.0, 0.0], [0.0, 1.0]),
        Vertex::new([h, 0.0, h], [0.0, 1.0, 0.0], [1.0, 1.0]),
        Vertex::new([h, 0.0, -h], [0.0, 1.0, 0.0], [1.0, 0.0]),
        Vertex::new([-h, 0.0, -h], [0.0, 1.0, 0.0], [0.0, 0.0]),
    ];
    VertexStreamDesc {
        label: label.to_owned(),
        topology: wgpu::PrimitiveTopology::TriangleList,
        vertices,
        indices: IndexData::U16(vec![0, 1, 2, 0, 2, 3]),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn box_faces_wind_counter_clockwise_outward() {
        let stream = box_stream("box", 2.0, 2.0, 2.0);
        let IndexData::U16(indices) = &stream.indices else {
            panic!("box indices are u16");
        };
        assert_eq!(indices.len(), 36);
        for tri in indices.chunks(3) {
            let p = |i: u16| Vec3::from(stream.vertices[i as usize].position);
            let n = Vec3::from(stream.vertices[tri[0] as usize].normal);
            let face_normal = (p(tri[1]) - p(tri[0])).cross(p(tri[2]) - p(tri[0]));
            assert!(face_normal.dot(n) > 0.0);
        }
    }
}
