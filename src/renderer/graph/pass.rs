//! 带状态追踪的渲染通道
//!
//! 避免冗余的状态切换调用，并提供 PassCache 的提交：
//! 支持 `INDIRECT_FIRST_INSTANCE` 时每个 DrawCall 一次 multi draw indirect，
//! 否则逐条命令 `draw_indexed`。

use crate::renderer::dynamic_buffer::DynamicBuffer;
use crate::renderer::graph::context::ExecuteContext;
use crate::renderer::graph::pass_cache::{DrawElementsIndirectCommand, PassCache};
use crate::renderer::pipeline::RenderPipelineId;

// 用于替代 Vec<u32> 的结构体，避免堆内存分配
#[derive(Clone, Copy, PartialEq)]
struct BindGroupState {
    id: u64,
    // 本引擎每个 BindGroup 最多一个动态偏移
    offsets: [u32; 4],
    offset_count: u8,
}

pub struct TrackedRenderPass<'a> {
    pass: wgpu::RenderPass<'a>,
    current_pipeline_id: Option<RenderPipelineId>,
    current_bind_groups: [Option<BindGroupState>; 4],
    current_vertex_buffers: [Option<u64>; 2],
    current_index_buffer: Option<(u64, wgpu::IndexFormat)>,
}

impl<'a> TrackedRenderPass<'a> {
    #[must_use]
    pub fn new(pass: wgpu::RenderPass<'a>) -> Self {
        Self {
            pass,
            current_pipeline_id: None,
            current_bind_groups: [None; 4],
            current_vertex_buffers: [None; 2],
            current_index_buffer: None,
        }
    }

    pub fn set_pipeline(&mut self, id: RenderPipelineId, pipeline: &'a wgpu::RenderPipeline) {
        if self.current_pipeline_id != Some(id) {
            self.pass.set_pipeline(pipeline);
            self.current_pipeline_id = Some(id);
        }
    }

    pub fn set_bind_group(
        &mut self,
        index: u32,
        bind_group_resource_id: u64,
        bind_group: &'a wgpu::BindGroup,
        offsets: &[u32],
    ) {
        let slot = index as usize;
        let needs_update = match &self.current_bind_groups[slot] {
            Some(state) => {
                state.id != bind_group_resource_id
                    || state.offset_count as usize != offsets.len()
                    || &state.offsets[..offsets.len()] != offsets
            }
            None => true,
        };

        if needs_update {
            self.pass.set_bind_group(index, bind_group, offsets);

            let mut state = BindGroupState {
                id: bind_group_resource_id,
                offsets: [0; 4],
                offset_count: offsets.len() as u8,
            };
            state.offsets[..offsets.len()].copy_from_slice(offsets);
            self.current_bind_groups[slot] = Some(state);
        }
    }

    pub fn set_vertex_buffer(&mut self, slot: u32, buffer_resource_id: u64, buffer_slice: wgpu::BufferSlice<'a>) {
        let index = slot as usize;
        if self.current_vertex_buffers[index] != Some(buffer_resource_id) {
            self.pass.set_vertex_buffer(slot, buffer_slice);
            self.current_vertex_buffers[index] = Some(buffer_resource_id);
        }
    }

    /// The arena index buffer holds both index formats: the binding is
    /// tracked per format.
    pub fn set_index_buffer(
        &mut self,
        buffer_resource_id: u64,
        buffer_slice: wgpu::BufferSlice<'a>,
        format: wgpu::IndexFormat,
    ) {
        let state = (buffer_resource_id, format);
        if self.current_index_buffer != Some(state) {
            self.pass.set_index_buffer(buffer_slice, format);
            self.current_index_buffer = Some(state);
        }
    }

    pub fn draw_indexed(&mut self, indices: std::ops::Range<u32>, base_vertex: i32, instances: std::ops::Range<u32>) {
        self.pass.draw_indexed(indices, base_vertex, instances);
    }

    pub fn multi_draw_indexed_indirect(&mut self, indirect_buffer: &'a wgpu::Buffer, indirect_offset: u64, count: u32) {
        self.pass.multi_draw_indexed_indirect(indirect_buffer, indirect_offset, count);
    }
}

// ─── Pass Cache Submission ────────────────────────────────────────────────────

/// A pass cache together with its GPU buffers and resolved pipelines.
pub struct PassCacheBuffers {
    pub cache: PassCache,
    /// One entry per call, `None` when the program has no module.
    pub pipelines: Vec<Option<RenderPipelineId>>,
    instances: DynamicBuffer,
    indirect: DynamicBuffer,
}

impl PassCacheBuffers {
    pub fn new(device: &wgpu::Device, label: &str) -> Self {
        Self {
            cache: PassCache::default(),
            pipelines: Vec::new(),
            instances: DynamicBuffer::new(device, &format!("{label} Instances"), wgpu::BufferUsages::VERTEX, 4096),
            indirect: DynamicBuffer::new(device, &format!("{label} Indirect"), wgpu::BufferUsages::INDIRECT, 4096),
        }
    }

    /// Replaces the cache and uploads its instances and commands.
    pub fn upload(&mut self, device: &wgpu::Device, queue: &wgpu::Queue, cache: PassCache) {
        self.instances.write(device, queue, bytemuck::cast_slice(&cache.draw_instances));
        self.indirect.write(device, queue, bytemuck::cast_slice(&cache.draw_commands));
        self.pipelines.clear();
        self.cache = cache;
    }

    pub fn clear(&mut self) {
        self.cache = PassCache::default();
        self.pipelines.clear();
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.cache.is_empty()
    }
}

const COMMAND_SIZE: u64 = std::mem::size_of::<DrawElementsIndirectCommand>() as u64;

/// Draws a pass cache. Groups other than the material group must already
/// be bound; the material context is bound to `material_group` per call.
pub fn draw_pass_cache<'a>(
    pass: &mut TrackedRenderPass<'a>,
    buffers: &'a PassCacheBuffers,
    ctx: &'a ExecuteContext<'_>,
    material_group: Option<u32>,
) {
    if buffers.is_empty() {
        return;
    }

    let vertices = ctx.resources.vertex_buffer();
    let indices = ctx.resources.index_buffer();
    pass.set_vertex_buffer(0, vertices.id(), vertices.buffer().slice(..));
    pass.set_vertex_buffer(1, buffers.instances.id(), buffers.instances.buffer().slice(..));

    for ((first_command, call), pipeline) in buffers.cache.calls_with_offsets().zip(&buffers.pipelines) {
        let Some((pipeline_id, pipeline)) =
            pipeline.and_then(|id| ctx.pipelines.get_render_pipeline(id).map(|p| (id, p)))
        else {
            continue;
        };
        pass.set_pipeline(pipeline_id, pipeline);

        if let Some(group) = material_group {
            let Some(material) = ctx.resources.material_bind_group(call.material_context) else {
                continue;
            };
            pass.set_bind_group(group, material.id, &material.bind_group, &[]);
        }

        pass.set_index_buffer(indices.id(), indices.buffer().slice(..), call.index_format);

        if ctx.multi_draw {
            pass.multi_draw_indexed_indirect(
                buffers.indirect.buffer(),
                u64::from(first_command) * COMMAND_SIZE,
                call.draw_count,
            );
        } else {
            let first = first_command as usize;
            for command in &buffers.cache.draw_commands[first..first + call.draw_count as usize] {
                pass.draw_indexed(
                    command.first_index..command.first_index + command.count,
                    command.base_vertex,
                    command.base_instance..command.base_instance + 1,
                );
            }
        }
    }
}
