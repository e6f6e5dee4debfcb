//! Weighted Blended Order-Independent Transparency
//!
//! Two nodes:
//!
//! 1. [`TransparentPass`]: draws the `Transparent` technique into two
//!    targets. Accumulation (`Rgba16Float`, cleared to 0) sums weighted
//!    premultiplied colors, revealage (`R8Unorm`, cleared to 1) multiplies
//!    `1 - alpha`. Depth is tested against the opaque scene, never written.
//! 2. [`ResolvePass`]: a fullscreen triangle averaging the accumulated color
//!    and blending it over the output with `1 - revealage` as alpha.
//!
//! Both run every frame; without transparent parts the cleared targets
//! resolve to a fully discarded triangle.

use crate::renderer::graph::context::{ExecuteContext, PrepareContext};
use crate::renderer::graph::node::RenderNode;
use crate::renderer::graph::pass::{PassCacheBuffers, TrackedRenderPass, draw_pass_cache};
use crate::renderer::graph::pass_cache::prepare_pass;
use crate::renderer::graph::render_state::{ACCUM_FORMAT, PassState, REVEALAGE_FORMAT};
use crate::renderer::graph::targets::FrameTargets;
use crate::renderer::graph::ubos::CAMERA_VIEW_SLOT;
use crate::renderer::pipeline::GeometryLayout;
use crate::resources::effect::PassKind;

const RESOLVE_WGSL: &str = include_str!("../../shaders/resolve.wgsl");

// ============================================================================
// Accumulation
// ============================================================================

pub struct TransparentPass {
    buffers: PassCacheBuffers,
}

impl TransparentPass {
    pub fn new(device: &wgpu::Device) -> Self {
        Self {
            buffers: PassCacheBuffers::new(device, "Transparent"),
        }
    }
}

impl RenderNode for TransparentPass {
    fn name(&self) -> &str {
        "Transparent Accumulation"
    }

    fn prepare(&mut self, ctx: &mut PrepareContext) {
        let cache = prepare_pass(PassKind::Transparent, &ctx.frame.part_list, ctx.storage);
        self.buffers.upload(ctx.device, ctx.queue, cache);

        let state = PassState::transparent_accumulation();
        let formats = [ACCUM_FORMAT, REVEALAGE_FORMAT];
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
            label: Some("Transparent Accumulation"),
            color_attachments: &[
                Some(wgpu::RenderPassColorAttachment {
                    view: &ctx.targets.accum.view,
                    resolve_target: None,
                    ops: wgpu::Operations {
                        load: wgpu::LoadOp::Clear(wgpu::Color::TRANSPARENT),
                        store: wgpu::StoreOp::Store,
                    },
                    depth_slice: None,
                }),
                Some(wgpu::RenderPassColorAttachment {
                    view: &ctx.targets.revealage.view,
                    resolve_target: None,
                    ops: wgpu::Operations {
                        load: wgpu::LoadOp::Clear(wgpu::Color::WHITE),
                        store: wgpu::StoreOp::Store,
                    },
                    depth_slice: None,
                }),
            ],
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

// ============================================================================
// Resolve
// ============================================================================

pub struct ResolvePass {
    layout: wgpu::BindGroupLayout,
    pipeline_layout: wgpu::PipelineLayout,
    module: wgpu::ShaderModule,
    /// Pipeline and the output format it was built for.
    pipeline: Option<(wgpu::TextureFormat, wgpu::RenderPipeline)>,
    /// Bind group and the target generation it was built from.
    bind_group: Option<(u32, wgpu::BindGroup)>,
}

fn unfilterable_texture(binding: u32) -> wgpu::BindGroupLayoutEntry {
    wgpu::BindGroupLayoutEntry {
        binding,
        visibility: wgpu::ShaderStages::FRAGMENT,
        ty: wgpu::BindingType::Texture {
            sample_type: wgpu::TextureSampleType::Float { filterable: false },
            view_dimension: wgpu::TextureViewDimension::D2,
            multisampled: false,
        },
        count: None,
    }
}

impl ResolvePass {
    pub fn new(device: &wgpu::Device) -> Self {
        let layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("Transparency Resolve Layout"),
            entries: &[unfilterable_texture(0), unfilterable_texture(1)],
        });
        let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("Transparency Resolve Pipeline Layout"),
            bind_group_layouts: &[Some(&layout)],
            immediate_size: 0,
        });
        let module = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("Transparency Resolve Shader"),
            source: wgpu::ShaderSource::Wgsl(RESOLVE_WGSL.into()),
        });

        Self {
            layout,
            pipeline_layout,
            module,
            pipeline: None,
            bind_group: None,
        }
    }

    fn create_pipeline(&self, device: &wgpu::Device, format: wgpu::TextureFormat) -> wgpu::RenderPipeline {
        let state = PassState::transparent_resolve();
        device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
            label: Some("Transparency Resolve Pipeline"),
            layout: Some(&self.pipeline_layout),
            vertex: wgpu::VertexState {
                module: &self.module,
                entry_point: Some("vs_main"),
                compilation_options: wgpu::PipelineCompilationOptions::default(),
                buffers: &[],
            },
            fragment: Some(wgpu::FragmentState {
                module: &self.module,
                entry_point: Some("fs_main"),
                compilation_options: wgpu::PipelineCompilationOptions::default(),
                targets: &state.color_targets(&[format]),
            }),
            primitive: state.primitive(wgpu::PrimitiveTopology::TriangleList),
            depth_stencil: state.depth_stencil(),
            multisample: wgpu::MultisampleState::default(),
            multiview_mask: None,
            cache: None,
        })
    }

    fn create_bind_group(&self, device: &wgpu::Device, targets: &FrameTargets) -> wgpu::BindGroup {
        device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("Transparency Resolve BindGroup"),
            layout: &self.layout,
            entries: &[
                wgpu::BindGroupEntry {
                    binding: 0,
                    resource: wgpu::BindingResource::TextureView(&targets.accum.view),
                },
                wgpu::BindGroupEntry {
                    binding: 1,
                    resource: wgpu::BindingResource::TextureView(&targets.revealage.view),
                },
            ],
        })
    }
}

impl RenderNode for ResolvePass {
    fn name(&self) -> &str {
        "Transparent Resolve"
    }

    fn prepare(&mut self, ctx: &mut PrepareContext) {
        if self.pipeline.as_ref().is_none_or(|(format, _)| *format != ctx.output_format) {
            self.pipeline = Some((ctx.output_format, self.create_pipeline(ctx.device, ctx.output_format)));
        }
        let generation = ctx.targets.generation;
        if self.bind_group.as_ref().is_none_or(|(built_from, _)| *built_from != generation) {
            self.bind_group = Some((generation, self.create_bind_group(ctx.device, ctx.targets)));
        }
    }

    fn run(&self, ctx: &ExecuteContext, encoder: &mut wgpu::CommandEncoder) {
        let (Some((_, pipeline)), Some((_, bind_group))) = (&self.pipeline, &self.bind_group) else {
            return;
        };

        let mut pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
            label: Some("Transparent Resolve"),
            color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                view: ctx.output,
                resolve_target: None,
                ops: wgpu::Operations {
                    load: wgpu::LoadOp::Load,
                    store: wgpu::StoreOp::Store,
                },
                depth_slice: None,
            })],
            depth_stencil_attachment: None,
            timestamp_writes: None,
            occlusion_query_set: None,
            multiview_mask: None,
        });
        pass.set_pipeline(pipeline);
        pass.set_bind_group(0, bind_group, &[]);
        pass.draw(0..3, 0..1);
    }
}
