//! Diagnostic Texture Pass
//!
//! Draws intermediate targets into quarter-size viewports stacked up from
//! the bottom-left corner of the output:
//!
//! | Position | Texture                        | Enabled by                   |
//! |----------|--------------------------------|------------------------------|
//! | 0        | Linearized scene depth         | `show_depth`                 |
//! | 1        | Shadow map, layer 0            | `show_depth` with shadows    |
//! | 2        | Transparency accumulation      | `show_transparency_targets`  |
//! | 3        | Transparency revealage         | `show_transparency_targets`  |

use crate::renderer::graph::context::{ExecuteContext, PrepareContext};
use crate::renderer::graph::node::RenderNode;
use crate::renderer::graph::render_state::PassState;
use crate::renderer::graph::ubos::CAMERA_VIEW_SLOT;

const SHOW_TEXTURE_WGSL: &str = include_str!("../../shaders/show_texture.wgsl");

/// Number of quadrant positions.
pub const QUADRANT_COUNT: u32 = 4;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShownTexture {
    Depth,
    ShadowMap,
    Accumulation,
    Revealage,
}

impl ShownTexture {
    fn entry_point(self) -> &'static str {
        match self {
            Self::Depth => "fs_depth",
            Self::ShadowMap => "fs_depth_array",
            Self::Accumulation => "fs_accum",
            Self::Revealage => "fs_revealage",
        }
    }

    fn position(self) -> u32 {
        match self {
            Self::Depth => 0,
            Self::ShadowMap => 1,
            Self::Accumulation => 2,
            Self::Revealage => 3,
        }
    }
}

/// Viewport `(x, y, width, height)` of quadrant `position` on a target of
/// `size`.
#[must_use]
pub fn quadrant_viewport(size: (u32, u32), position: u32) -> (f32, f32, f32, f32) {
    let width = (size.0 / QUADRANT_COUNT) as f32;
    let height = (size.1 / QUADRANT_COUNT) as f32;
    let y = size.1 as f32 - (position + 1) as f32 * height;
    (0.0, y, width, height)
}

/// Textures shown this frame, in drawing order.
#[must_use]
pub fn shown_textures(show_depth: bool, show_transparency: bool, shadow_layers: usize) -> Vec<ShownTexture> {
    let mut shown = Vec::with_capacity(QUADRANT_COUNT as usize);
    if show_depth {
        shown.push(ShownTexture::Depth);
        if shadow_layers > 0 {
            shown.push(ShownTexture::ShadowMap);
        }
    }
    if show_transparency {
        shown.push(ShownTexture::Accumulation);
        shown.push(ShownTexture::Revealage);
    }
    shown
}

fn texture_entry(binding: u32, sample_type: wgpu::TextureSampleType, view_dimension: wgpu::TextureViewDimension) -> wgpu::BindGroupLayoutEntry {
    wgpu::BindGroupLayoutEntry {
        binding,
        visibility: wgpu::ShaderStages::FRAGMENT,
        ty: wgpu::BindingType::Texture {
            sample_type,
            view_dimension,
            multisampled: false,
        },
        count: None,
    }
}

pub struct ShowTexturePass {
    layout: wgpu::BindGroupLayout,
    module: wgpu::ShaderModule,
    pipeline_layout: Option<wgpu::PipelineLayout>,
    /// Lazily built, per shown texture, for one output format.
    pipelines: Vec<(ShownTexture, wgpu::TextureFormat, wgpu::RenderPipeline)>,
    /// Bind group and the `(target generation, lighting bind group id)` it
    /// was built from.
    bind_group: Option<((u32, u64), wgpu::BindGroup)>,
    shown: Vec<ShownTexture>,
}

impl ShowTexturePass {
    pub fn new(device: &wgpu::Device) -> Self {
        use wgpu::{TextureSampleType as Sample, TextureViewDimension as Dim};

        let unfilterable = Sample::Float { filterable: false };
        let layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("Show Texture Layout"),
            entries: &[
                texture_entry(0, Sample::Depth, Dim::D2),
                texture_entry(1, Sample::Depth, Dim::D2Array),
                texture_entry(2, unfilterable, Dim::D2),
                texture_entry(3, unfilterable, Dim::D2),
            ],
        });
        let module = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("Show Texture Shader"),
            source: wgpu::ShaderSource::Wgsl(SHOW_TEXTURE_WGSL.into()),
        });

        Self {
            layout,
            module,
            pipeline_layout: None,
            pipelines: Vec::new(),
            bind_group: None,
            shown: Vec::new(),
        }
    }

    fn create_pipeline(&self, ctx: &PrepareContext, layout: &wgpu::PipelineLayout, shown: ShownTexture) -> wgpu::RenderPipeline {
        let state = PassState::diagnostic_quad();
        ctx.device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
            label: Some(shown.entry_point()),
            layout: Some(layout),
            vertex: wgpu::VertexState {
                module: &self.module,
                entry_point: Some("vs_main"),
                compilation_options: wgpu::PipelineCompilationOptions::default(),
                buffers: &[],
            },
            fragment: Some(wgpu::FragmentState {
                module: &self.module,
                entry_point: Some(shown.entry_point()),
                compilation_options: wgpu::PipelineCompilationOptions::default(),
                targets: &state.color_targets(&[ctx.output_format]),
            }),
            primitive: state.primitive(wgpu::PrimitiveTopology::TriangleList),
            depth_stencil: state.depth_stencil(),
            multisample: wgpu::MultisampleState::default(),
            multiview_mask: None,
            cache: None,
        })
    }

    fn create_bind_group(&self, ctx: &PrepareContext) -> wgpu::BindGroup {
        let targets = ctx.targets;
        ctx.device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("Show Texture BindGroup"),
            layout: &self.layout,
            entries: &[
                wgpu::BindGroupEntry {
                    binding: 0,
                    resource: wgpu::BindingResource::TextureView(&targets.depth.view),
                },
                wgpu::BindGroupEntry {
                    binding: 1,
                    resource: wgpu::BindingResource::TextureView(ctx.shared.shadow_map.array_view()),
                },
                wgpu::BindGroupEntry {
                    binding: 2,
                    resource: wgpu::BindingResource::TextureView(&targets.accum.view),
                },
                wgpu::BindGroupEntry {
                    binding: 3,
                    resource: wgpu::BindingResource::TextureView(&targets.revealage.view),
                },
            ],
        })
    }
}

impl RenderNode for ShowTexturePass {
    fn name(&self) -> &str {
        "Show Texture"
    }

    fn prepare(&mut self, ctx: &mut PrepareContext) {
        self.shown = shown_textures(
            ctx.controls.show_depth,
            ctx.controls.show_transparency_targets,
            ctx.shadow_layers,
        );
        if self.shown.is_empty() {
            return;
        }

        let pipeline_layout = self.pipeline_layout.take().unwrap_or_else(|| {
            ctx.device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
                label: Some("Show Texture Pipeline Layout"),
                bind_group_layouts: &[Some(&ctx.shared.layouts.view), Some(&self.layout)],
                immediate_size: 0,
            })
        });

        let output_format = ctx.output_format;
        self.pipelines.retain(|(_, format, _)| *format == output_format);
        for shown in self.shown.clone() {
            if !self.pipelines.iter().any(|(built, _, _)| *built == shown) {
                let pipeline = self.create_pipeline(ctx, &pipeline_layout, shown);
                self.pipelines.push((shown, output_format, pipeline));
            }
        }
        self.pipeline_layout = Some(pipeline_layout);

        let sources = (ctx.targets.generation, ctx.shared.lighting_bind_group.id);
        if self.bind_group.as_ref().is_none_or(|(built_from, _)| *built_from != sources) {
            self.bind_group = Some((sources, self.create_bind_group(ctx)));
        }
    }

    fn run(&self, ctx: &ExecuteContext, encoder: &mut wgpu::CommandEncoder) {
        if self.shown.is_empty() {
            return;
        }
        let Some((_, bind_group)) = &self.bind_group else {
            return;
        };

        let shared = ctx.shared;
        let mut pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
            label: Some("Show Texture"),
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
        pass.set_bind_group(
            0,
            &shared.view_bind_group.bind_group,
            &[shared.ubos.view_offset(CAMERA_VIEW_SLOT)],
        );
        pass.set_bind_group(1, bind_group, &[]);

        for shown in &self.shown {
            let Some((_, _, pipeline)) = self.pipelines.iter().find(|(built, _, _)| built == shown) else {
                continue;
            };
            let (x, y, width, height) = quadrant_viewport(ctx.targets.size, shown.position());
            if width < 1.0 || height < 1.0 {
                continue;
            }
            pass.set_viewport(x, y, width, height, 0.0, 1.0);
            pass.set_pipeline(pipeline);
            pass.draw(0..3, 0..1);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn quadrants_stack_from_the_bottom() {
        assert_eq!(quadrant_viewport((800, 600), 0), (0.0, 450.0, 200.0, 150.0));
        assert_eq!(quadrant_viewport((800, 600), 3), (0.0, 0.0, 200.0, 150.0));
    }

    #[test]
    fn shadow_map_needs_rendered_layers() {
        assert_eq!(shown_textures(true, false, 0), vec![ShownTexture::Depth]);
        assert_eq!(
            shown_textures(true, true, 4),
            vec![
                ShownTexture::Depth,
                ShownTexture::ShadowMap,
                ShownTexture::Accumulation,
                ShownTexture::Revealage
            ]
        );
        assert!(shown_textures(false, false, 4).is_empty());
    }
}
