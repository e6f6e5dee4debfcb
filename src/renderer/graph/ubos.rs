//! Uniform blocks of the render graph
//!
//! CPU mirrors of the uniform blocks declared by the WGSL sources, plus
//! [`GraphUbos`], the GPU buffers holding them for the frame.
//!
//! The viewing buffer holds several [`ViewingBlock`]s at a fixed stride,
//! selected with a dynamic offset: slot 0 is the camera, slot `1 + layer`
//! is the light view used to render shadow map `layer`.

use std::num::NonZeroU64;

use bytemuck::{Pod, Zeroable};
use glam::{Mat3, Mat4, Vec4};

use crate::scene::camera::Camera;
use crate::scene::light::{CASCADES_PER_SHADOW, LightsData, MAX_SHADOW_MAPS};

/// View slots in the viewing buffer: the camera, then one per shadow map.
pub const VIEW_SLOT_COUNT: usize = 1 + MAX_SHADOW_MAPS;

/// Slot of the camera view.
pub const CAMERA_VIEW_SLOT: usize = 0;

/// Slot of the light view rendering shadow map `layer`.
#[inline]
#[must_use]
pub fn shadow_view_slot(layer: usize) -> usize {
    1 + layer
}

// ============================================================================
// Blocks
// ============================================================================

#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable, Default)]
pub struct FrameBlock {
    pub time: f32,
    pub frame_index: u32,
    pub viewport: [f32; 2],
}

/// One view: camera, or light for shadow rendering.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct ViewingBlock {
    pub world_to_camera: Mat4,
    pub projection: Mat4,
    pub view_projection: Mat4,
    pub camera_position: Vec4,
    /// x: near distance, y: far distance.
    pub near_far: Vec4,
}

impl Default for ViewingBlock {
    fn default() -> Self {
        Self::from_matrices(Mat4::IDENTITY, Mat4::IDENTITY, 0.0, 1.0)
    }
}

impl ViewingBlock {
    #[must_use]
    pub fn from_matrices(world_to_camera: Mat4, projection: Mat4, near: f32, far: f32) -> Self {
        Self {
            world_to_camera,
            projection,
            view_projection: projection * world_to_camera,
            camera_position: world_to_camera.inverse().w_axis,
            near_far: Vec4::new(near, far, 0.0, 0.0),
        }
    }

    #[must_use]
    pub fn from_camera(camera: &Camera) -> Self {
        let (near, far) = camera.near_far();
        Self::from_matrices(camera.view_matrix(), camera.projection_matrix(), near, far)
    }

    /// View of a directional light, with a pure orientation.
    #[must_use]
    pub fn from_light(world_to_light: Mat3, projection: Mat4) -> Self {
        Self::from_matrices(Mat4::from_mat3(world_to_light), projection, 0.0, 1.0)
    }
}

/// World to light clip space matrices of the shadow maps.
///
/// Matrix `i` renders, and is sampled with, shadow map layer `i`.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct LightViewProjection {
    pub view_projections: [Mat4; MAX_SHADOW_MAPS],
    pub count: u32,
    /// First matrix of the range to upload.
    pub offset: u32,
    pub _padding: [u32; 2],
}

impl Default for LightViewProjection {
    fn default() -> Self {
        Self::zeroed()
    }
}

impl LightViewProjection {
    /// Writes layer `layer`. `count` covers every layer written so far.
    pub fn set(&mut self, layer: usize, view_projection: Mat4) {
        self.view_projections[layer] = view_projection;
        self.count = self.count.max(layer as u32 + 1);
    }

    /// Filled matrices, starting at `offset`.
    #[must_use]
    pub fn active(&self) -> &[Mat4] {
        let begin = self.offset as usize;
        &self.view_projections[begin..begin + self.count as usize]
    }
}

#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable, Default)]
pub struct ShadowCascadeBlock {
    /// View-space distance of each cascade's far plane.
    pub far_depths: [f32; CASCADES_PER_SHADOW],
    /// Non-zero tints the forward pass by cascade.
    pub debug_tint: u32,
    /// Non-zero when shadows use cascades.
    pub use_cascades: u32,
    pub _padding: [u32; 2],
}

// ============================================================================
// GPU buffers
// ============================================================================

/// Uniform buffers owned by the render graph.
pub struct GraphUbos {
    pub frame: wgpu::Buffer,
    pub viewing: wgpu::Buffer,
    pub lights: wgpu::Buffer,
    pub light_view_projection: wgpu::Buffer,
    pub shadow_cascade: wgpu::Buffer,
    /// Distance between two view slots, honoring the uniform offset alignment.
    pub view_stride: u64,
}

impl GraphUbos {
    pub fn new(device: &wgpu::Device) -> Self {
        let alignment = u64::from(device.limits().min_uniform_buffer_offset_alignment);
        let view_stride = (std::mem::size_of::<ViewingBlock>() as u64).next_multiple_of(alignment);

        let uniform = |label: &str, size: u64| {
            device.create_buffer(&wgpu::BufferDescriptor {
                label: Some(label),
                size,
                usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
                mapped_at_creation: false,
            })
        };

        Self {
            frame: uniform("Frame UBO", std::mem::size_of::<FrameBlock>() as u64),
            viewing: uniform("Viewing UBO", view_stride * VIEW_SLOT_COUNT as u64),
            lights: uniform("Lights UBO", std::mem::size_of::<LightsData>() as u64),
            light_view_projection: uniform(
                "Light ViewProjection UBO",
                std::mem::size_of::<LightViewProjection>() as u64,
            ),
            shadow_cascade: uniform("Shadow Cascade UBO", std::mem::size_of::<ShadowCascadeBlock>() as u64),
            view_stride,
        }
    }

    /// Dynamic offset of a view slot.
    #[inline]
    #[must_use]
    pub fn view_offset(&self, slot: usize) -> u32 {
        (self.view_stride * slot as u64) as u32
    }

    pub fn load_frame(&self, queue: &wgpu::Queue, block: &FrameBlock) {
        queue.write_buffer(&self.frame, 0, bytemuck::bytes_of(block));
    }

    pub fn load_view(&self, queue: &wgpu::Queue, slot: usize, block: &ViewingBlock) {
        debug_assert!(slot < VIEW_SLOT_COUNT);
        queue.write_buffer(&self.viewing, u64::from(self.view_offset(slot)), bytemuck::bytes_of(block));
    }

    pub fn load_lights(&self, queue: &wgpu::Queue, lights: &LightsData) {
        queue.write_buffer(&self.lights, 0, bytemuck::bytes_of(lights));
    }

    pub fn load_light_view_projection(&self, queue: &wgpu::Queue, block: &LightViewProjection) {
        queue.write_buffer(&self.light_view_projection, 0, bytemuck::bytes_of(block));
    }

    pub fn load_shadow_cascade(&self, queue: &wgpu::Queue, block: &ShadowCascadeBlock) {
        queue.write_buffer(&self.shadow_cascade, 0, bytemuck::bytes_of(block));
    }

    /// Binding of one view slot, to be selected with a dynamic offset.
    #[must_use]
    pub fn view_binding(&self) -> wgpu::BindingResource<'_> {
        wgpu::BindingResource::Buffer(wgpu::BufferBinding {
            buffer: &self.viewing,
            offset: 0,
            size: NonZeroU64::new(std::mem::size_of::<ViewingBlock>() as u64),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blocks_match_wgsl_layouts() {
        assert_eq!(std::mem::size_of::<FrameBlock>(), 16);
        assert_eq!(std::mem::size_of::<ViewingBlock>(), 224);
        assert_eq!(std::mem::size_of::<LightViewProjection>(), MAX_SHADOW_MAPS * 64 + 16);
        assert_eq!(std::mem::size_of::<ShadowCascadeBlock>(), 32);
    }

    #[test]
    fn active_matrices_follow_offset_and_count() {
        let mut block = LightViewProjection::default();
        block.set(0, Mat4::IDENTITY);
        block.set(1, Mat4::from_scale(glam::Vec3::splat(2.0)));
        assert_eq!(block.active().len(), 2);
        block.offset = 1;
        block.count = 1;
        assert_eq!(block.active()[0], Mat4::from_scale(glam::Vec3::splat(2.0)));
    }

    #[test]
    fn rewriting_a_layer_keeps_the_count() {
        let mut block = LightViewProjection::default();
        block.set(0, Mat4::IDENTITY);
        block.set(1, Mat4::IDENTITY);
        block.set(0, Mat4::from_scale(glam::Vec3::splat(3.0)));
        assert_eq!(block.count, 2);

        // Out of order writes cover up to the highest layer.
        let mut sparse = LightViewProjection::default();
        sparse.set(3, Mat4::IDENTITY);
        sparse.set(1, Mat4::IDENTITY);
        assert_eq!(sparse.count, 4);
    }
}
