//! Skybox Pass
//!
//! Draws the environment cube map on a unit cube centered on the camera.
//! The vertex shader writes `z = w`, so the cube lands on the far plane and
//! only fills pixels no geometry covered. Skipped when the scene disables
//! its skybox.

use glam::Vec3;
use wgpu::util::DeviceExt;

use crate::renderer::graph::context::{ExecuteContext, PrepareContext};
use crate::renderer::graph::node::RenderNode;
use crate::renderer::graph::render_state::PassState;
use crate::renderer::graph::ubos::CAMERA_VIEW_SLOT;
use crate::renderer::pipeline::vertex::position_buffer;

const SKYBOX_WGSL: &str = include_str!("../../shaders/skybox.wgsl");

/// `(normal, u, v)` of each cube face, with `u × v = normal`.
const CUBE_FACES: [(Vec3, Vec3, Vec3); 6] = [
    (Vec3::X, Vec3::Y, Vec3::Z),
    (Vec3::NEG_X, Vec3::Z, Vec3::Y),
    (Vec3::Y, Vec3::Z, Vec3::X),
    (Vec3::NEG_Y, Vec3::X, Vec3::Z),
    (Vec3::Z, Vec3::X, Vec3::Y),
    (Vec3::NEG_Z, Vec3::Y, Vec3::X),
];

/// The 36 corners of the `[-1, 1]³` cube, counter-clockwise seen from
/// outside.
#[must_use]
pub fn cube_positions() -> Vec<[f32; 3]> {
    CUBE_FACES
        .iter()
        .flat_map(|&(n, u, v)| {
            [
                n - u - v,
                n + u - v,
                n + u + v,
                n - u - v,
                n + u + v,
                n - u + v,
            ]
        })
        .map(|v| v.to_array())
        .collect()
}

pub struct SkyboxPass {
    vertices: wgpu::Buffer,
    module: wgpu::ShaderModule,
    pipeline: Option<(wgpu::TextureFormat, wgpu::RenderPipeline)>,
    enabled: bool,
}

impl SkyboxPass {
    pub fn new(device: &wgpu::Device) -> Self {
        let vertices = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("Skybox Cube"),
            contents: bytemuck::cast_slice(&cube_positions()),
            usage: wgpu::BufferUsages::VERTEX,
        });
        let module = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("Skybox Shader"),
            source: wgpu::ShaderSource::Wgsl(SKYBOX_WGSL.into()),
        });

        Self {
            vertices,
            module,
            pipeline: None,
            enabled: false,
        }
    }

    fn create_pipeline(&self, ctx: &PrepareContext) -> wgpu::RenderPipeline {
        let layouts = &ctx.shared.layouts;
        let layout = ctx.device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("Skybox Pipeline Layout"),
            bind_group_layouts: &[Some(&layouts.view), Some(&layouts.lighting)],
            immediate_size: 0,
        });
        let state = PassState::skybox();

        ctx.device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
            label: Some("Skybox Pipeline"),
            layout: Some(&layout),
            vertex: wgpu::VertexState {
                module: &self.module,
                entry_point: Some("vs_main"),
                compilation_options: wgpu::PipelineCompilationOptions::default(),
                buffers: &[position_buffer()],
            },
            fragment: Some(wgpu::FragmentState {
                module: &self.module,
                entry_point: Some("fs_main"),
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
}

impl RenderNode for SkyboxPass {
    fn name(&self) -> &str {
        "Skybox Pass"
    }

    fn prepare(&mut self, ctx: &mut PrepareContext) {
        self.enabled = ctx.frame.draw_skybox;
        if !self.enabled {
            return;
        }
        if self.pipeline.as_ref().is_none_or(|(format, _)| *format != ctx.output_format) {
            self.pipeline = Some((ctx.output_format, self.create_pipeline(ctx)));
        }
    }

    fn run(&self, ctx: &ExecuteContext, encoder: &mut wgpu::CommandEncoder) {
        if !self.enabled {
            return;
        }
        let Some((_, pipeline)) = &self.pipeline else {
            return;
        };

        let shared = ctx.shared;
        let mut pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
            label: Some("Skybox Pass"),
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
        pass.set_bind_group(1, &shared.lighting_bind_group.bind_group, &[]);
        pass.set_vertex_buffer(0, self.vertices.slice(..));
        pass.draw(0..36, 0..1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cube_faces_point_outwards() {
        let positions = cube_positions();
        assert_eq!(positions.len(), 36);

        for triangle in positions.chunks(3) {
            let [a, b, c] = [triangle[0], triangle[1], triangle[2]].map(Vec3::from_array);
            let normal = (b - a).cross(c - a);
            let centroid = (a + b + c) / 3.0;
            assert!(normal.dot(centroid) > 0.0, "triangle {triangle:?} faces inwards");
        }
    }
}
