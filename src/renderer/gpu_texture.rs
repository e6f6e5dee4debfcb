// src/renderer/gpu_texture.rs

use crate::resources::storage::TextureData;

/// GPU Texture 抽象
/// 管理 Texture 与 View 的生命周期，采样器由绑定方提供
pub struct GpuTexture {
    pub texture: wgpu::Texture,
    pub view: wgpu::TextureView,

    pub width: u32,
    pub height: u32,
    pub format: wgpu::TextureFormat,
    pub view_dimension: wgpu::TextureViewDimension,
}

impl GpuTexture {
    pub fn new(device: &wgpu::Device, queue: &wgpu::Queue, data: &TextureData) -> Self {
        let size = wgpu::Extent3d {
            width: data.width,
            height: data.height,
            depth_or_array_layers: data.layers,
        };

        let texture = device.create_texture(&wgpu::TextureDescriptor {
            label: Some(&data.label),
            size,
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: data.format,
            usage: wgpu::TextureUsages::TEXTURE_BINDING | wgpu::TextureUsages::COPY_DST,
            view_formats: &[],
        });

        Self::upload_data(queue, &texture, data);

        let view = texture.create_view(&wgpu::TextureViewDescriptor {
            label: Some(&data.label),
            dimension: Some(data.view_dimension),
            ..Default::default()
        });

        Self {
            texture,
            view,
            width: data.width,
            height: data.height,
            format: data.format,
            view_dimension: data.view_dimension,
        }
    }

    /// 1x1 白色纹理，无纹理材质的占位
    pub fn white(device: &wgpu::Device, queue: &wgpu::Queue) -> Self {
        Self::new(device, queue, &TextureData::rgba8("White Fallback", 1, 1, vec![255; 4]))
    }

    /// 1x1 黑色立方体贴图，未设置环境贴图时使用
    pub fn fallback_cube(device: &wgpu::Device, queue: &wgpu::Queue) -> Self {
        Self::new(device, queue, &TextureData::cube_faces("Environment Fallback", [[0, 0, 0, 255]; 6]))
    }

    fn upload_data(queue: &wgpu::Queue, texture: &wgpu::Texture, data: &TextureData) {
        let Some(block_size) = data.format.block_copy_size(None) else {
            log::warn!("Texture '{}' has no copyable layout, left uninitialized", data.label);
            return;
        };
        let bytes_per_row = data.width * block_size;
        let layer_size = (bytes_per_row * data.height) as usize;
        if data.data.len() < layer_size * data.layers as usize {
            log::warn!(
                "Texture '{}' expects {} bytes, got {}",
                data.label,
                layer_size * data.layers as usize,
                data.data.len()
            );
            return;
        }

        // 逐层上传（立方体贴图按 +X, -X, +Y, -Y, +Z, -Z 排列）
        for (layer, bytes) in data.data.chunks_exact(layer_size).take(data.layers as usize).enumerate() {
            queue.write_texture(
                wgpu::TexelCopyTextureInfo {
                    texture,
                    mip_level: 0,
                    origin: wgpu::Origin3d { x: 0, y: 0, z: layer as u32 },
                    aspect: wgpu::TextureAspect::All,
                },
                bytes,
                wgpu::TexelCopyBufferLayout {
                    offset: 0,
                    bytes_per_row: Some(bytes_per_row),
                    rows_per_image: Some(data.height),
                },
                wgpu::Extent3d {
                    width: data.width,
                    height: data.height,
                    depth_or_array_layers: 1,
                },
            );
        }
    }
}
