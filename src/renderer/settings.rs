//! Renderer Settings & Frame Controls
//!
//! Two kinds of configuration live here:
//!
//! - [`RendererSettings`]: consumed once when the GPU context is created.
//! - [`GraphControls`] and [`ShadowControls`]: tunables read by the passes at
//!   the start of every frame. Changing them takes effect on the next
//!   [`RenderGraph::render_frame`](crate::renderer::graph::RenderGraph::render_frame).
//!
//! # Quick Start
//!
//! ```rust,ignore
//! use umbra::renderer::settings::{GraphControls, PolygonModeSetting, ShadowControls};
//!
//! let mut graph = RenderGraph::new(&context, &storage, (1280, 720), wgpu::TextureFormat::Rgba8UnormSrgb);
//! graph.controls = GraphControls {
//!     polygon_mode: PolygonModeSetting::Line,
//!     ..Default::default()
//! };
//! graph.shadow_controls.use_cascades = false;
//! ```

use crate::resources::effect::ForwardTechnique;

// ---------------------------------------------------------------------------
// RendererSettings
// ---------------------------------------------------------------------------

/// Global configuration for GPU context creation.
///
/// # Fields
///
/// | Field              | Description                              | Default            |
/// |--------------------|------------------------------------------|--------------------|
/// | `vsync`            | Vertical sync enabled                    | `true`             |
/// | `power_preference` | GPU adapter selection strategy           | `HighPerformance`  |
/// | `clear_color`      | Clear color of the output target         | Dark grey          |
/// | `required_features`| Required wgpu features                   | Empty              |
/// | `required_limits`  | Required wgpu limits                     | Default            |
///
/// Optional features the graph can take advantage of (indirect first
/// instance, multi draw indirect, line polygon mode) are requested on top of
/// `required_features` when the adapter supports them.
#[derive(Debug, Clone)]
pub struct RendererSettings {
    /// Enable vertical synchronization (VSync) on surfaces.
    pub vsync: bool,

    /// GPU adapter selection preference.
    pub power_preference: wgpu::PowerPreference,

    /// Color the forward pass clears the output target to.
    pub clear_color: wgpu::Color,

    /// Required wgpu features that must be supported by the adapter.
    pub required_features: wgpu::Features,

    /// Required wgpu limits.
    pub required_limits: wgpu::Limits,
}

impl Default for RendererSettings {
    fn default() -> Self {
        Self {
            vsync: true,
            power_preference: wgpu::PowerPreference::HighPerformance,
            clear_color: wgpu::Color {
                r: 0.1,
                g: 0.1,
                b: 0.12,
                a: 1.0,
            },
            required_features: wgpu::Features::empty(),
            required_limits: wgpu::Limits::default(),
        }
    }
}

// ---------------------------------------------------------------------------
// GraphControls
// ---------------------------------------------------------------------------

/// Rasterization mode of the forward opaque pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PolygonModeSetting {
    Point,
    Line,
    #[default]
    Fill,
}

impl PolygonModeSetting {
    #[must_use]
    pub fn to_wgpu(self) -> wgpu::PolygonMode {
        match self {
            Self::Point => wgpu::PolygonMode::Point,
            Self::Line => wgpu::PolygonMode::Line,
            Self::Fill => wgpu::PolygonMode::Fill,
        }
    }

    /// Device feature required by this mode, if any.
    #[must_use]
    pub fn required_feature(self) -> Option<wgpu::Features> {
        match self {
            Self::Point => Some(wgpu::Features::POLYGON_MODE_POINT),
            Self::Line => Some(wgpu::Features::POLYGON_MODE_LINE),
            Self::Fill => None,
        }
    }
}

/// Per-frame controls of the render graph.
#[derive(Debug, Clone, Default)]
pub struct GraphControls {
    /// Technique selected for the forward opaque pass.
    pub forward_technique: ForwardTechnique,
    pub polygon_mode: PolygonModeSetting,
    /// Draws the linearized depth buffer in a viewport quadrant.
    pub show_depth: bool,
    /// Draws the transparency accumulation and revealage targets.
    pub show_transparency_targets: bool,
}

// ---------------------------------------------------------------------------
// ShadowControls
// ---------------------------------------------------------------------------

/// Shadow mapping controls.
///
/// `use_cascades` and `use_hardware_pcf` change the shadow map resources:
/// the shadow pass re-creates its texture and sampler when they differ from
/// the values it was built with.
#[derive(Debug, Clone, PartialEq)]
pub struct ShadowControls {
    /// Depth bias proportional to the polygon slope.
    pub slope_scale: f32,
    /// Depth bias in units of the depth format's precision.
    pub constant_bias: i32,
    /// Cascaded shadow maps (4 per light) instead of one map per light.
    pub use_cascades: bool,
    /// Linear filtering of the comparison sampler (2x2 PCF in hardware).
    pub use_hardware_pcf: bool,
    /// Crops the light frustum to the scene bounds, in light-space X and Y.
    pub tighten_light_frustum_xy_to_scene: bool,
    /// Snaps the light frustum to texel-sized increments.
    pub move_frustum_texel_increment: bool,
    /// Fits near and far to the scene triangles inside the light frustum.
    pub tighten_frustum_depth_to_clipped_scene: bool,
    /// Minimum distance of the first cascade's far plane computation.
    pub csm_near_plane_limit: f32,

    // === Debug ===
    /// Draws the camera sub-frusta used for each cascade.
    pub debug_draw_frusta: bool,
    /// Draws the light frustum of one cascade, `None` for none, and any
    /// value past the last cascade for all of them.
    pub debug_draw_which_cascade: Option<usize>,
    /// Tints the forward pass by cascade index.
    pub tint_view_by_cascade: bool,
    /// Draws the scene triangles surviving the light frustum clipping.
    pub debug_draw_clipped_triangles: bool,
    /// Draws the light-space shadow rectangle as a plane.
    pub debug_draw_shadow_planes: bool,
}

impl Default for ShadowControls {
    fn default() -> Self {
        Self {
            slope_scale: 3.0,
            constant_bias: 2,
            use_cascades: true,
            use_hardware_pcf: true,
            tighten_light_frustum_xy_to_scene: true,
            move_frustum_texel_increment: true,
            tighten_frustum_depth_to_clipped_scene: true,
            csm_near_plane_limit: 5.0,
            debug_draw_frusta: false,
            debug_draw_which_cascade: None,
            tint_view_by_cascade: false,
            debug_draw_clipped_triangles: false,
            debug_draw_shadow_planes: false,
        }
    }
}

impl ShadowControls {
    /// Whether the light frustum of `cascade` should be debug drawn.
    #[must_use]
    pub fn draws_cascade(&self, cascade: usize, cascade_count: usize) -> bool {
        self.debug_draw_which_cascade
            .is_some_and(|which| which == cascade || which >= cascade_count)
    }

    /// Depth bias state of the shadow pipelines.
    #[must_use]
    pub fn depth_bias(&self) -> wgpu::DepthBiasState {
        wgpu::DepthBiasState {
            constant: self.constant_bias,
            slope_scale: self.slope_scale,
            clamp: 0.0,
        }
    }
}
