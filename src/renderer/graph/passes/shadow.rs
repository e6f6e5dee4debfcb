//! Shadow Map Pass
//!
//! Directional light shadows rendered into one depth texture array.
//!
//! | Mode     | Map size | Layers | Layer of light `i`, cascade `c` |
//! |----------|----------|--------|---------------------------------|
//! | Single   | 2048²    | 4      | `i`                             |
//! | Cascaded | 1024²    | 16     | `4 * i + c`                     |
//!
//! [`ShadowPass::fill_shadow_map`] fits one light frustum per layer and
//! uploads the light views. The pass then clears every layer and draws the
//! `DepthOpaque` (or `CascadedDepthOpaque`) pass cache into the active ones,
//! with the slope-scaled depth bias of [`ShadowControls`].

use glam::{Mat4, Vec3};

use crate::renderer::graph::context::{ExecuteContext, GraphShared, PrepareContext};
use crate::renderer::graph::debug_draw::DebugDrawList;
use crate::renderer::graph::node::RenderNode;
use crate::renderer::graph::pass::{PassCacheBuffers, TrackedRenderPass, draw_pass_cache};
use crate::renderer::graph::pass_cache::prepare_pass;
use crate::renderer::graph::render_state::{DEPTH_FORMAT, PassState};
use crate::renderer::graph::shadow_utils::{
    CAMERA_FRUSTUM_COLOR, CASCADE_COLORS, FittingDebug, align_minus_z, compute_light_projection,
    z_partition_camera_frustum,
};
use crate::renderer::graph::ubos::{LightViewProjection, ShadowCascadeBlock, ViewingBlock, shadow_view_slot};
use crate::renderer::pipeline::GeometryLayout;
use crate::renderer::settings::ShadowControls;
use crate::resources::bounds::BoundingBox;
use crate::resources::effect::PassKind;
use crate::scene::camera::Camera;
use crate::scene::light::{CASCADES_PER_SHADOW, Lights, MAX_LIGHTS, MAX_SHADOW_LIGHTS, MAX_SHADOW_MAPS, NO_ENTRY_INDEX};

/// Color of the light frusta in debug drawings.
const LIGHT_FRUSTUM_COLOR: Vec3 = Vec3::new(1.0, 0.85, 0.2);

/// `(map size, layer count)` of the shadow map.
#[must_use]
pub fn shadow_map_extent(use_cascades: bool) -> (u32, u32) {
    if use_cascades {
        (1024, MAX_SHADOW_MAPS as u32)
    } else {
        (2048, MAX_SHADOW_LIGHTS as u32)
    }
}

// ============================================================================
// Shadow map resources
// ============================================================================

/// The shadow map texture array and its comparison sampler.
pub struct ShadowMap {
    texture: wgpu::Texture,
    layer_views: Vec<wgpu::TextureView>,
    array_view: wgpu::TextureView,
    sampler: wgpu::Sampler,
    size: u32,
    use_cascades: bool,
    hardware_pcf: bool,
}

impl ShadowMap {
    pub fn new(device: &wgpu::Device, controls: &ShadowControls) -> Self {
        let (size, layers) = shadow_map_extent(controls.use_cascades);
        log::info!(
            "Creating {} shadow map: {size}x{size}, {layers} layers, PCF {}",
            if controls.use_cascades { "cascaded" } else { "single" },
            controls.use_hardware_pcf
        );

        let texture = device.create_texture(&wgpu::TextureDescriptor {
            label: Some("Shadow Map"),
            size: wgpu::Extent3d {
                width: size,
                height: size,
                depth_or_array_layers: layers,
            },
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: DEPTH_FORMAT,
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT | wgpu::TextureUsages::TEXTURE_BINDING,
            view_formats: &[],
        });

        let layer_views = (0..layers)
            .map(|layer| {
                texture.create_view(&wgpu::TextureViewDescriptor {
                    label: Some("Shadow Map Layer"),
                    dimension: Some(wgpu::TextureViewDimension::D2),
                    base_array_layer: layer,
                    array_layer_count: Some(1),
                    ..Default::default()
                })
            })
            .collect();

        let array_view = texture.create_view(&wgpu::TextureViewDescriptor {
            label: Some("Shadow Map Array"),
            dimension: Some(wgpu::TextureViewDimension::D2Array),
            ..Default::default()
        });

        let filter = if controls.use_hardware_pcf { wgpu::FilterMode::Linear } else { wgpu::FilterMode::Nearest };
        let sampler = device.create_sampler(&wgpu::SamplerDescriptor {
            label: Some("Shadow Comparison Sampler"),
            address_mode_u: wgpu::AddressMode::ClampToEdge,
            address_mode_v: wgpu::AddressMode::ClampToEdge,
            address_mode_w: wgpu::AddressMode::ClampToEdge,
            mag_filter: filter,
            min_filter: filter,
            compare: Some(wgpu::CompareFunction::LessEqual),
            ..Default::default()
        });

        Self {
            texture,
            layer_views,
            array_view,
            sampler,
            size,
            use_cascades: controls.use_cascades,
            hardware_pcf: controls.use_hardware_pcf,
        }
    }

    /// Re-creates the texture and sampler when `controls` changed the
    /// cascade mode or the filtering. Returns `true` if they were rebuilt.
    pub fn review_controls(&mut self, device: &wgpu::Device, controls: &ShadowControls) -> bool {
        if controls.use_cascades == self.use_cascades && controls.use_hardware_pcf == self.hardware_pcf {
            return false;
        }
        *self = Self::new(device, controls);
        true
    }

    pub fn size(&self) -> u32 {
        self.size
    }

    pub fn layer_count(&self) -> usize {
        self.layer_views.len()
    }

    pub fn use_cascades(&self) -> bool {
        self.use_cascades
    }

    pub fn array_view(&self) -> &wgpu::TextureView {
        &self.array_view
    }

    pub fn layer_view(&self, layer: usize) -> &wgpu::TextureView {
        &self.layer_views[layer]
    }

    pub fn sampler(&self) -> &wgpu::Sampler {
        &self.sampler
    }

    pub fn texture(&self) -> &wgpu::Texture {
        &self.texture
    }
}

// ============================================================================
// Light frusta
// ============================================================================

/// Shadow data of one frame.
#[derive(Debug, Clone)]
pub struct ShadowFrame {
    pub light_view_projection: LightViewProjection,
    /// Base shadow map layer of each directional light, or
    /// [`NO_ENTRY_INDEX`] for lights without shadows.
    pub shadow_map_indices: Vec<u32>,
    /// View rendering each active layer, in layer order.
    pub light_views: Vec<ViewingBlock>,
    pub cascade: ShadowCascadeBlock,
}

impl ShadowFrame {
    /// Number of shadow map layers rendered this frame.
    #[must_use]
    pub fn layer_count(&self) -> usize {
        self.light_views.len()
    }
}

/// Fits the light frusta of every shadow-casting directional light.
///
/// Panics if more than [`MAX_SHADOW_LIGHTS`] lights cast shadows. An empty
/// scene produces no layer.
pub fn compute_shadow_frame(
    lights: &Lights,
    scene_bounds: &BoundingBox,
    camera: &Camera,
    controls: &ShadowControls,
    map_size: u32,
    mut debug: Option<&mut DebugDrawList>,
) -> ShadowFrame {
    let casters = lights.directional.iter().filter(|light| light.cast_shadows).count();
    assert!(
        casters <= MAX_SHADOW_LIGHTS,
        "{casters} shadow-casting lights exceed the {MAX_SHADOW_LIGHTS} shadow map slots"
    );

    let directional = &lights.directional[..lights.directional.len().min(MAX_LIGHTS)];
    let dropped_casters = casters - directional.iter().filter(|light| light.cast_shadows).count();
    if dropped_casters > 0 {
        log::warn!("{dropped_casters} shadow-casting lights beyond the first {MAX_LIGHTS} get no shadow map");
    }

    let mut frame = ShadowFrame {
        light_view_projection: LightViewProjection::default(),
        shadow_map_indices: vec![NO_ENTRY_INDEX; directional.len()],
        light_views: Vec::new(),
        cascade: ShadowCascadeBlock {
            debug_tint: u32::from(controls.tint_view_by_cascade),
            use_cascades: u32::from(controls.use_cascades),
            ..Default::default()
        },
    };

    if casters == 0 || scene_bounds.is_empty() {
        return frame;
    }

    let debug_frusta = if controls.debug_draw_frusta { debug.as_deref_mut() } else { None };
    let camera_frusta: Vec<Mat4> = if controls.use_cascades {
        let partition = z_partition_camera_frustum(camera, controls, debug_frusta);
        frame.cascade.far_depths = partition.far_depths;
        partition.view_projections.to_vec()
    } else {
        let camera_vp = camera.view_projection();
        if let Some(list) = debug_frusta {
            list.add_frustum(&camera_vp.inverse(), CAMERA_FRUSTUM_COLOR.extend(1.0));
        }
        vec![camera_vp]
    };
    debug_assert!(camera_frusta.len() <= CASCADES_PER_SHADOW);

    let mut shadow_index = 0;
    for (light, slot) in directional.iter().zip(&mut frame.shadow_map_indices) {
        if !light.cast_shadows {
            continue;
        }
        let base = shadow_index * camera_frusta.len();
        *slot = base as u32;
        shadow_index += 1;

        let world_to_light = align_minus_z(light.direction);
        let orientation = Mat4::from_mat3(world_to_light);

        for (cascade, camera_vp) in camera_frusta.iter().enumerate() {
            let draws = controls.draws_cascade(cascade, camera_frusta.len());
            let mut fitting = debug.as_deref_mut().filter(|_| draws).map(|list| FittingDebug {
                list,
                view_frustum_color: CASCADE_COLORS[cascade],
                light_color: LIGHT_FRUSTUM_COLOR,
            });

            let projection = compute_light_projection(
                &world_to_light,
                scene_bounds,
                camera_vp,
                controls,
                map_size,
                fitting.as_mut(),
            );
            let view_projection = projection * orientation;

            if let Some(fitting) = fitting {
                fitting.list.add_frustum(&view_projection.inverse(), LIGHT_FRUSTUM_COLOR.extend(1.0));
            }

            frame.light_view_projection.set(base + cascade, view_projection);
            frame.light_views.push(ViewingBlock::from_light(world_to_light, projection));
        }
    }

    log::debug!("Shadow frame: {casters} casters, {} layers", frame.layer_count());
    frame
}

// ============================================================================
// Pass
// ============================================================================

pub struct ShadowPass {
    buffers: PassCacheBuffers,
    active_layers: usize,
}

impl ShadowPass {
    pub fn new(device: &wgpu::Device) -> Self {
        Self {
            buffers: PassCacheBuffers::new(device, "Shadow"),
            active_layers: 0,
        }
    }

    /// Fits the light frusta of the frame and uploads the light views, the
    /// light matrices and the cascade block.
    ///
    /// Returns the frame's shadow data; its shadow map indices are meant for
    /// [`LightsData::set_shadow_map_indices`](crate::scene::light::LightsData::set_shadow_map_indices).
    pub fn fill_shadow_map(
        &mut self,
        shared: &GraphShared,
        queue: &wgpu::Queue,
        lights: &Lights,
        scene_bounds: &BoundingBox,
        camera: &Camera,
        controls: &ShadowControls,
        debug: Option<&mut DebugDrawList>,
    ) -> ShadowFrame {
        let frame = compute_shadow_frame(
            lights,
            scene_bounds,
            camera,
            controls,
            shared.shadow_map.size(),
            debug,
        );

        for (layer, view) in frame.light_views.iter().enumerate() {
            shared.ubos.load_view(queue, shadow_view_slot(layer), view);
        }
        shared.ubos.load_light_view_projection(queue, &frame.light_view_projection);
        shared.ubos.load_shadow_cascade(queue, &frame.cascade);

        self.active_layers = frame.layer_count();
        frame
    }
}

impl RenderNode for ShadowPass {
    fn name(&self) -> &str {
        "Shadow Pass"
    }

    fn prepare(&mut self, ctx: &mut PrepareContext) {
        if self.active_layers == 0 {
            self.buffers.clear();
            return;
        }

        let kind = if ctx.shadow_controls.use_cascades { PassKind::CascadedDepthOpaque } else { PassKind::DepthOpaque };
        let cache = prepare_pass(kind, &ctx.frame.part_list, ctx.storage);
        self.buffers.upload(ctx.device, ctx.queue, cache);

        // 深度偏移只作用于阴影管线
        let state = PassState::shadow(ctx.shadow_controls.depth_bias());
        let calls: Vec<_> = self.buffers.cache.calls.iter().map(|call| (call.program, call.topology)).collect();
        self.buffers.pipelines = calls
            .into_iter()
            .map(|(program, topology)| {
                ctx.geometry_pipeline(program, topology, GeometryLayout::Depth, &state, &[], None)
            })
            .collect();
    }

    fn run(&self, ctx: &ExecuteContext, encoder: &mut wgpu::CommandEncoder) {
        if self.active_layers == 0 {
            return;
        }
        let shadow_map = &ctx.shared.shadow_map;

        for layer in 0..shadow_map.layer_count() {
            let pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("Shadow Layer"),
                color_attachments: &[],
                depth_stencil_attachment: Some(wgpu::RenderPassDepthStencilAttachment {
                    view: shadow_map.layer_view(layer),
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

            if layer >= self.active_layers {
                continue;
            }

            let mut pass = TrackedRenderPass::new(pass);
            let shared = ctx.shared;
            pass.set_bind_group(
                0,
                shared.view_bind_group.id,
                &shared.view_bind_group.bind_group,
                &[shared.ubos.view_offset(shadow_view_slot(layer))],
            );
            pass.set_bind_group(1, shared.objects_bind_group.id, &shared.objects_bind_group.bind_group, &[]);
            draw_pass_cache(&mut pass, &self.buffers, ctx, None);
        }
    }
}
