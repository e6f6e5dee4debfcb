//! Size-dependent render targets
//!
//! The scene depth buffer and the two transparency targets. All of them
//! are sampled by later passes, so they carry `TEXTURE_BINDING`.

use crate::renderer::graph::render_state::{ACCUM_FORMAT, DEPTH_FORMAT, REVEALAGE_FORMAT};

pub struct RenderTarget {
    pub texture: wgpu::Texture,
    pub view: wgpu::TextureView,
}

impl RenderTarget {
    fn new(device: &wgpu::Device, label: &str, size: (u32, u32), format: wgpu::TextureFormat) -> Self {
        let texture = device.create_texture(&wgpu::TextureDescriptor {
            label: Some(label),
            size: wgpu::Extent3d {
                width: size.0,
                height: size.1,
                depth_or_array_layers: 1,
            },
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format,
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT | wgpu::TextureUsages::TEXTURE_BINDING,
            view_formats: &[],
        });
        let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
        Self { texture, view }
    }
}

pub struct FrameTargets {
    pub size: (u32, u32),
    pub depth: RenderTarget,
    pub accum: RenderTarget,
    pub revealage: RenderTarget,
    /// Incremented on every reallocation, for bind groups built on the views.
    pub generation: u32,
}

impl FrameTargets {
    pub fn new(device: &wgpu::Device, size: (u32, u32)) -> Self {
        let size = (size.0.max(1), size.1.max(1));
        Self {
            size,
            depth: RenderTarget::new(device, "Scene Depth", size, DEPTH_FORMAT),
            accum: RenderTarget::new(device, "Transparency Accumulation", size, ACCUM_FORMAT),
            revealage: RenderTarget::new(device, "Transparency Revealage", size, REVEALAGE_FORMAT),
            generation: 0,
        }
    }

    /// Reallocates every target at the new size. Zero sizes are clamped to 1.
    pub fn resize(&mut self, device: &wgpu::Device, size: (u32, u32)) {
        let generation = self.generation + 1;
        *self = Self::new(device, size);
        self.generation = generation;
    }
}
