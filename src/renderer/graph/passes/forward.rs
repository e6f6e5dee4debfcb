//! Forward Opaque Pass
//!
//! Shades opaque parts with the technique selected in
//! [`GraphControls::forward_technique`](crate::renderer::settings::GraphControls),
//! over the depth laid down by the pre-pass.
//!
//! Groups 0..=2 are bound once per pass; the material context (group 3) is
//! bound per draw call.

use crate::renderer::graph::context::{ExecuteContext, PrepareContext};
use crate::renderer::graph::node::RenderNode;
use crate::renderer::graph::pass::{PassCacheBuffers, TrackedRenderPass, draw_pass_cache};
use crate::renderer::graph::pass_cache::prepare_pass;
use crate::renderer::graph::render_state::PassState;
use crate::renderer::graph::ubos::CAMERA_VIEW_SLOT;
use crate::renderer::pipeline::GeometryLayout;
use crate::renderer::settings::PolygonModeSetting;
use crate::resources::effect::PassKind;

pub struct ForwardPass {
    buffers: PassCacheBuffers,
    /// Unsupported polygon mode already reported.
    warned_mode: Option<PolygonModeSetting>,
}

impl ForwardPass {
    pub fn new(device: &wgpu::Device) -> Self {
        Self {
            buffers: PassCacheBuffers::new(device, "Forward"),
            warned_mode: None,
        }
    }

    /// The requested polygon mode, or `Fill` if the device lacks its feature.
    fn polygon_mode(&mut self, requested: PolygonModeSetting, features: wgpu::Features) -> wgpu::PolygonMode {
        let supported = requested.required_feature().is_none_or(|feature| features.contains(feature));
        if supported {
            return requested.to_wgpu();
        }
        if self.warned_mode != Some(requested) {
            log::warn!("Polygon mode {requested:?} is not supported by the device, falling back to Fill");
            self.warned_mode = Some(requested);
        }
        wgpu::PolygonMode::Fill
    }
}

impl RenderNode for ForwardPass {
    fn name(&self) -> &str {
        "Forward Pass"
    }

    fn prepare(&mut self, ctx: &mut PrepareContext) {
        let technique = ctx.controls.forward_technique;
        let cache = prepare_pass(PassKind::Forward(technique), &ctx.frame.part_list, ctx.storage);
        self.buffers.upload(ctx.device, ctx.queue, cache);

        let state = PassState::forward(self.polygon_mode(ctx.controls.polygon_mode, ctx.features));
        let formats = [ctx.output_format];
        let use_cascades = Some(ctx.shadow_controls.use_cascades);
        let calls: Vec<_> = self.buffers.cache.calls.iter().map(|call| (call.program, call.topology)).collect();
        self.buffers.pipelines = calls
            .into_iter()
            .map(|(program, topology)| {
                ctx.geometry_pipeline(program, topology, GeometryLayout::Shading, &state, &formats, use_cascades)
            })
            .collect();
    }

    fn run(&self, ctx: &ExecuteContext, encoder: &mut wgpu::CommandEncoder) {
        let pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
            label: Some("Forward Pass"),
            color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                view: ctx.output,
                resolve_target: None,
                ops: wgpu::Operations {
                    load: wgpu::LoadOp::Clear(ctx.clear_color),
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
        pass.set_bind_group(2, shared.lighting_bind_group.id, &shared.lighting_bind_group.bind_group, &[]);
        draw_pass_cache(&mut pass, &self.buffers, ctx, Some(3));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fill_never_needs_a_feature() {
        assert!(PolygonModeSetting::Fill.required_feature().is_none());
        assert_eq!(PolygonModeSetting::Line.to_wgpu(), wgpu::PolygonMode::Line);
    }
}
