//! Vertex Layouts
//!
//! Every geometry program reads the same two vertex buffers:
//!
//! | Slot | Step     | Locations | Content                                      |
//! |------|----------|-----------|----------------------------------------------|
//! | 0    | Vertex   | 0..=4     | [`Vertex`]: position, normal, uv, skin       |
//! | 1    | Instance | 5..=7     | [`DrawInstance`]: material, transform, palette |
//!
//! The instance buffer is indexed by the base instance of each indirect
//! command, which is how one draw call reaches per-part data.

use crate::renderer::graph::debug_draw::DebugVertex;
use crate::renderer::graph::pass_cache::DrawInstance;
use crate::resources::mesh::Vertex;

const VERTEX_ATTRIBUTES: [wgpu::VertexAttribute; 5] = wgpu::vertex_attr_array![
    0 => Float32x3,
    1 => Float32x3,
    2 => Float32x2,
    3 => Uint32x4,
    4 => Float32x4,
];

const INSTANCE_ATTRIBUTES: [wgpu::VertexAttribute; 3] = wgpu::vertex_attr_array![
    5 => Uint32,
    6 => Uint32,
    7 => Uint32,
];

const DEBUG_ATTRIBUTES: [wgpu::VertexAttribute; 2] = wgpu::vertex_attr_array![
    0 => Float32x3,
    1 => Float32x4,
];

const POSITION_ATTRIBUTES: [wgpu::VertexAttribute; 1] = wgpu::vertex_attr_array![0 => Float32x3];

/// Vertex and instance buffers of the geometry programs.
#[must_use]
pub fn geometry_buffers() -> [wgpu::VertexBufferLayout<'static>; 2] {
    [
        wgpu::VertexBufferLayout {
            array_stride: std::mem::size_of::<Vertex>() as u64,
            step_mode: wgpu::VertexStepMode::Vertex,
            attributes: &VERTEX_ATTRIBUTES,
        },
        wgpu::VertexBufferLayout {
            array_stride: std::mem::size_of::<DrawInstance>() as u64,
            step_mode: wgpu::VertexStepMode::Instance,
            attributes: &INSTANCE_ATTRIBUTES,
        },
    ]
}

/// Line list vertices of the debug draw pass.
#[must_use]
pub fn debug_vertex_buffer() -> wgpu::VertexBufferLayout<'static> {
    wgpu::VertexBufferLayout {
        array_stride: std::mem::size_of::<DebugVertex>() as u64,
        step_mode: wgpu::VertexStepMode::Vertex,
        attributes: &DEBUG_ATTRIBUTES,
    }
}

/// Bare positions, used by the skybox cube.
#[must_use]
pub fn position_buffer() -> wgpu::VertexBufferLayout<'static> {
    wgpu::VertexBufferLayout {
        array_stride: std::mem::size_of::<[f32; 3]>() as u64,
        step_mode: wgpu::VertexStepMode::Vertex,
        attributes: &POSITION_ATTRIBUTES,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn end_of_last_attribute(layout: &wgpu::VertexBufferLayout<'_>) -> u64 {
        layout
            .attributes
            .iter()
            .map(|a| a.offset + a.format.size())
            .max()
            .unwrap_or(0)
    }

    #[test]
    fn attributes_cover_the_rust_structs() {
        let [vertex, instance] = geometry_buffers();
        assert_eq!(end_of_last_attribute(&vertex), vertex.array_stride);
        assert_eq!(end_of_last_attribute(&instance), instance.array_stride);
        let debug = debug_vertex_buffer();
        assert_eq!(end_of_last_attribute(&debug), debug.array_stride);
    }
}
