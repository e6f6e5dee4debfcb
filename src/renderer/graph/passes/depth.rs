//! Depth Pre-Pass
//!
//! Lays down the camera depth of every opaque part with the `DepthOpaque`
//! technique, so the forward pass shades each pixel once.

use crate::renderer::graph::context::{ExecuteContext, PrepareContext};
use crate::renderer::graph::node::RenderNode;
use crate::renderer::graph::pass::{PassCacheBuffers, TrackedRenderPass, draw_pass_cache};
use crate::renderer::graph::pass_cache::prepare_pass;
use crate::renderer::graph::render_state::PassState;
use crate::renderer::graph::ubos::CAMERA_VIEW_SLOT;
use crate::renderer::pipeline::GeometryLayout;
use crate::resources::effect::PassKind;

pub struct DepthPrepass {
    buffers: PassCacheBuffers,
}

impl DepthPrepass {
    pub fn new(device: &wgpu::Device) -> Self {
        Self {
            buffers: PassCacheBuffers::new(device, "Depth Prepass"),
        }
    }
}

impl RenderNode for DepthPrepass {
    fn name(&self) -> &str {
        "Depth Prepass"
    }

    fn prepare(&mut self, ctx: &mut PrepareContext) {
        let cache = prepare_pass(PassKind::DepthOpaque, &ctx.frame.part_list, ctx.storage);
        self.buffers.upload(ctx.device, ctx.queue, cache);

        let state = PassState::depth_prepass();
        let calls: Vec<_> = self.buffers.cache.calls.iter().map(|call| (call.program, call.topology)).collect();
        self.buffers.pipelines = calls
            .into_iter()
            .map(|(program, topology)| ctx.geometry_pipeline(program, topology, GeometryLayout::Depth, &state, &[], None))
            .collect();
    }

    fn run(&self, ctx: &ExecuteContext, encoder: &mut wgpu::CommandEncoder) {
        // 即使没有零件也要清除深度，后续通道会加载它
        let pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
            label: Some("Depth Prepass"),
            color_attachments: &[],
            depth_stencil_attachment: Some(wgpu::RenderPassDepthStencilAttachment {
                view: &ctx.targets.depth.view,
                depth_ops: Some(wgpu::Operations {
                    load: wgpu::LoadOp::Clear(1.0),
                    store: wgpu::StoreOp::Store,
                }),
                stencil_ops: None,
            }),
            timestamp_writes: None,
            occlusion_query_set: None,
            multiview_mask: None,
        });

        if self.buffers.is_empty() {
            return;
        }

        let shared = ctx.shared;
        let mut pass = TrackedRenderPass::new(pass);
        pass.set_bind_group(
            0,
            shared.view_bind_group.id,
            &shared.view_bind_group.bind_group,
            &[shared.ubos.view_offset(CAMERA_VIEW_SLOT)],
        );
        pass.set_bind_group(1, shared.objects_bind_group.id, &shared.objects_bind_group.bind_group, &[]);
        draw_pass_cache(&mut pass, &self.buffers, ctx, None);
    }
}
