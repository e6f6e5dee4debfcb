//! GPU mirror of the resource storage
//!
//! [`ResourceManager`] keeps the GPU side of [`Storage`] current. It watches
//! the storage generation counters and re-uploads only what changed:
//!
//! - Geometry arena: one vertex buffer and one index buffer for every stream
//! - Material parameters: one storage buffer indexed by `material_idx`
//! - Textures, environment cube map and material context bind groups
//! - One shader module per program generation

use std::borrow::Cow;
use std::sync::atomic::{AtomicU64, Ordering};

use crate::resources::material::MaterialParams;
use crate::resources::storage::{MaterialContextId, ProgramId, Storage, TextureId, TextureSemantic};

use super::dynamic_buffer::DynamicBuffer;
use super::gpu_texture::GpuTexture;

// 全局资源 ID 生成器
static NEXT_RESOURCE_ID: AtomicU64 = AtomicU64::new(1);

pub fn generate_resource_id() -> u64 {
    NEXT_RESOURCE_ID.fetch_add(1, Ordering::Relaxed)
}

/// A bind group with the id render passes track it by.
pub struct TrackedBindGroup {
    pub id: u64,
    pub bind_group: wgpu::BindGroup,
}

impl TrackedBindGroup {
    pub fn new(bind_group: wgpu::BindGroup) -> Self {
        Self { id: generate_resource_id(), bind_group }
    }
}

/// What [`ResourceManager::sync`] changed on the GPU.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct SyncReport {
    /// Programs whose shader module was replaced by a newer generation.
    pub recompiled: Vec<ProgramId>,
    /// The environment cube map binding changed.
    pub environment_changed: bool,
}

struct ShaderModuleEntry {
    generation: u32,
    module: wgpu::ShaderModule,
}

pub struct ResourceManager {
    // 几何数据
    vertex_buffer: DynamicBuffer,
    index_buffer: DynamicBuffer,
    geometry_generation: Option<u32>,

    // 材质参数
    material_buffer: DynamicBuffer,
    material_generation: Option<u32>,

    // 纹理
    textures: Vec<GpuTexture>,
    white: GpuTexture,
    fallback_cube: GpuTexture,
    environment: Option<TextureId>,
    linear_sampler: wgpu::Sampler,

    material_layout: wgpu::BindGroupLayout,
    material_bind_groups: Vec<TrackedBindGroup>,

    shader_modules: Vec<Option<ShaderModuleEntry>>,
}

impl ResourceManager {
    pub fn new(device: &wgpu::Device, queue: &wgpu::Queue) -> Self {
        let material_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("Material Layout"),
            entries: &[
                wgpu::BindGroupLayoutEntry {
                    binding: 0,
                    visibility: wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Texture {
                        sample_type: wgpu::TextureSampleType::Float { filterable: true },
                        view_dimension: wgpu::TextureViewDimension::D2,
                        multisampled: false,
                    },
                    count: None,
                },
                wgpu::BindGroupLayoutEntry {
                    binding: 1,
                    visibility: wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Sampler(wgpu::SamplerBindingType::Filtering),
                    count: None,
                },
            ],
        });

        let linear_sampler = device.create_sampler(&wgpu::SamplerDescriptor {
            label: Some("Linear Sampler"),
            address_mode_u: wgpu::AddressMode::Repeat,
            address_mode_v: wgpu::AddressMode::Repeat,
            address_mode_w: wgpu::AddressMode::Repeat,
            mag_filter: wgpu::FilterMode::Linear,
            min_filter: wgpu::FilterMode::Linear,
            ..Default::default()
        });

        Self {
            vertex_buffer: DynamicBuffer::new(device, "Geometry Vertices", wgpu::BufferUsages::VERTEX, 1 << 16),
            index_buffer: DynamicBuffer::new(device, "Geometry Indices", wgpu::BufferUsages::INDEX, 1 << 14),
            geometry_generation: None,
            material_buffer: DynamicBuffer::new(
                device,
                "Material Params",
                wgpu::BufferUsages::STORAGE,
                std::mem::size_of::<MaterialParams>() as u64 * 64,
            ),
            material_generation: None,
            textures: Vec::new(),
            white: GpuTexture::white(device, queue),
            fallback_cube: GpuTexture::fallback_cube(device, queue),
            environment: None,
            linear_sampler,
            material_layout,
            material_bind_groups: Vec::new(),
            shader_modules: Vec::new(),
        }
    }

    /// Brings the GPU resources up to date with `storage`.
    pub fn sync(&mut self, device: &wgpu::Device, queue: &wgpu::Queue, storage: &Storage) -> SyncReport {
        let mut report = SyncReport::default();

        // 1. Geometry arena
        if self.geometry_generation != Some(storage.geometry_generation()) {
            self.vertex_buffer.write(device, queue, bytemuck::cast_slice(storage.vertices()));
            self.index_buffer.write(device, queue, storage.index_bytes());
            self.geometry_generation = Some(storage.geometry_generation());
            log::debug!(
                "Uploaded geometry arena: {} vertices, {} index bytes",
                storage.vertices().len(),
                storage.index_bytes().len()
            );
        }

        // 2. Material parameters
        if self.material_generation != Some(storage.material_generation()) {
            let mut params: Vec<MaterialParams> = storage.materials().iter().map(|m| m.params).collect();
            if params.is_empty() {
                params.push(MaterialParams::default());
            }
            self.material_buffer.write(device, queue, bytemuck::cast_slice(&params));
            self.material_generation = Some(storage.material_generation());
        }

        // 3. Textures (append only)
        for data in &storage.textures()[self.textures.len()..] {
            self.textures.push(GpuTexture::new(device, queue, data));
        }

        let environment = storage.semantic_texture(TextureSemantic::Environment);
        if environment != self.environment {
            if let Some(id) = environment
                && self.textures[id.index()].view_dimension != wgpu::TextureViewDimension::Cube
            {
                log::warn!("Environment texture '{}' is not a cube map", storage.texture(id).label);
            }
            self.environment = environment;
            report.environment_changed = true;
        }

        // 4. Material contexts (append only, a context never changes texture)
        for index in self.material_bind_groups.len()..storage.material_context_count() {
            let texture = storage.context_texture(MaterialContextId(index as u16));
            let view = texture.map_or(&self.white.view, |id| &self.textures[id.index()].view);
            let bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
                label: Some("Material Context"),
                layout: &self.material_layout,
                entries: &[
                    wgpu::BindGroupEntry {
                        binding: 0,
                        resource: wgpu::BindingResource::TextureView(view),
                    },
                    wgpu::BindGroupEntry {
                        binding: 1,
                        resource: wgpu::BindingResource::Sampler(&self.linear_sampler),
                    },
                ],
            });
            self.material_bind_groups.push(TrackedBindGroup::new(bind_group));
        }

        // 5. Shader modules
        for (id, program) in storage.programs() {
            let slot = id.index();
            if self.shader_modules.len() <= slot {
                self.shader_modules.resize_with(slot + 1, || None);
            }
            let current = self.shader_modules[slot].as_ref().map(|entry| entry.generation);
            if current == Some(program.generation()) {
                continue;
            }
            let module = device.create_shader_module(wgpu::ShaderModuleDescriptor {
                label: Some(program.label()),
                source: wgpu::ShaderSource::Wgsl(Cow::Borrowed(program.code())),
            });
            if current.is_some() {
                log::info!("Reloaded shader module '{}' (generation {})", program.label(), program.generation());
                report.recompiled.push(id);
            }
            self.shader_modules[slot] = Some(ShaderModuleEntry { generation: program.generation(), module });
        }

        report
    }

    pub fn shader_module(&self, program: ProgramId) -> Option<&wgpu::ShaderModule> {
        self.shader_modules
            .get(program.index())
            .and_then(Option::as_ref)
            .map(|entry| &entry.module)
    }

    pub fn material_bind_group(&self, context: MaterialContextId) -> Option<&TrackedBindGroup> {
        self.material_bind_groups.get(context.index())
    }

    pub fn material_layout(&self) -> &wgpu::BindGroupLayout {
        &self.material_layout
    }

    pub fn vertex_buffer(&self) -> &DynamicBuffer {
        &self.vertex_buffer
    }

    pub fn index_buffer(&self) -> &DynamicBuffer {
        &self.index_buffer
    }

    pub fn material_buffer(&self) -> &DynamicBuffer {
        &self.material_buffer
    }

    /// Cube view of the environment, or a black cube when none is set.
    pub fn environment_view(&self) -> &wgpu::TextureView {
        self.environment
            .map(|id| &self.textures[id.index()])
            .filter(|texture| texture.view_dimension == wgpu::TextureViewDimension::Cube)
            .map_or(&self.fallback_cube.view, |texture| &texture.view)
    }

    pub fn linear_sampler(&self) -> &wgpu::Sampler {
        &self.linear_sampler
    }
}
