//! Debug Line Pass
//!
//! Uploads the frame's [`DebugDrawList`](crate::renderer::graph::debug_draw::DebugDrawList)
//! and draws it as a line list, depth tested against the scene.

use crate::renderer::dynamic_buffer::DynamicBuffer;
use crate::renderer::graph::context::{ExecuteContext, PrepareContext};
use crate::renderer::graph::node::RenderNode;
use crate::renderer::graph::render_state::PassState;
use crate::renderer::graph::ubos::CAMERA_VIEW_SLOT;
use crate::renderer::pipeline::vertex::debug_vertex_buffer;

const DEBUG_LINES_WGSL: &str = include_str!("../../shaders/debug_lines.wgsl");

pub struct DebugDrawPass {
    vertices: DynamicBuffer,
    vertex_count: u32,
    module: wgpu::ShaderModule,
    pipeline: Option<(wgpu::TextureFormat, wgpu::RenderPipeline)>,
}

impl DebugDrawPass {
    pub fn new(device: &wgpu::Device) -> Self {
        let module = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("Debug Lines Shader"),
            source: wgpu::ShaderSource::Wgsl(DEBUG_LINES_WGSL.into()),
        });
        Self {
            vertices: DynamicBuffer::new(device, "Debug Lines", wgpu::BufferUsages::VERTEX, 4096),
            vertex_count: 0,
            module,
            pipeline: None,
        }
    }

    fn create_pipeline(&self, ctx: &PrepareContext) -> wgpu::RenderPipeline {
        let layout = ctx.device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("Debug Lines Pipeline Layout"),
            bind_group_layouts: &[Some(&ctx.shared.layouts.view)],
            immediate_size: 0,
        });
        let state = PassState::debug_lines();

        ctx.device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
            label: Some("Debug Lines Pipeline"),
            layout: Some(&layout),
            vertex: wgpu::VertexState {
                module: &self.module,
                entry_point: Some("vs_main"),
                compilation_options: wgpu::PipelineCompilationOptions::default(),
                buffers: &[debug_vertex_buffer()],
            },
            fragment: Some(wgpu::FragmentState {
                module: &self.module,
                entry_point: Some("fs_main"),
                compilation_options: wgpu::PipelineCompilationOptions::default(),
                targets: &state.color_targets(&[ctx.output_format]),
            }),
            primitive: state.primitive(wgpu::PrimitiveTopology::LineList),
            depth_stencil: state.depth_stencil(),
            multisample: wgpu::MultisampleState::default(),
            multiview_mask: None,
            cache: None,
        })
    }
}

impl RenderNode for DebugDrawPass {
    fn name(&self) -> &str {
        "Debug Lines"
    }

    fn prepare(&mut self, ctx: &mut PrepareContext) {
        self.vertex_count = 0;
        if ctx.debug_lines.is_empty() {
            return;
        }
        if self.pipeline.as_ref().is_none_or(|(format, _)| *format != ctx.output_format) {
            self.pipeline = Some((ctx.output_format, self.create_pipeline(ctx)));
        }

        let vertices = ctx.debug_lines.vertices();
        self.vertices.write(ctx.device, ctx.queue, bytemuck::cast_slice(vertices));
        self.vertex_count = vertices.len() as u32;
    }

    fn run(&self, ctx: &ExecuteContext, encoder: &mut wgpu::CommandEncoder) {
        if self.vertex_count == 0 {
            return;
        }
        let Some((_, pipeline)) = &self.pipeline else {
            return;
        };

        let shared = ctx.shared;
        let mut pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
            label: Some("Debug Lines"),
            color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                view: ctx.output,
                resolve_target: None,
                ops: wgpu::Operations {
                    load: wgpu::LoadOp::Load,
                    store: wgpu::StoreOp::Store,
                },
                depth_slice: None,
            })],
            depth_stencil_attachment: Some(wgpu::RenderPassDepthStencilAttachment {
                view: &ctx.targets.depth.view,
                depth_ops: Some(wgpu::Operations {
                    load: wgpu::LoadOp::Load,
                    store: wgpu::StoreOp::Store,
                }),
                stencil_ops: None,
            }),
            timestamp_writes: None,
            occlusion_query_set: None,
            multiview_mask: None,
        });
        pass.set_pipeline(pipeline);
        pass.set_bind_group(
            0,
            &shared.view_bind_group.bind_group,
            &[shared.ubos.view_offset(CAMERA_VIEW_SLOT)],
        );
        pass.set_vertex_buffer(0, self.vertices.buffer().slice(..));
        pass.draw(0..self.vertex_count, 0..1);
    }
}
