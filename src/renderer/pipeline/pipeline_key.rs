//! Strongly-typed pipeline cache keys.
//!
//! `wgpu` descriptor types (`ColorTargetState`, `DepthStencilState`, …) do not
//! implement `Hash` / `Eq`. This module defines *mirror* types that extract the
//! fields relevant for pipeline identity and derive the correct trait impls.
//!
//! [`GeometryPipelineKey`] identifies the pipelines drawing pass caches: a
//! program at one generation, combined with the complete fixed-function
//! state of the pass drawing it.

use smallvec::SmallVec;

use crate::renderer::graph::render_state::PassState;
use crate::resources::storage::ProgramId;

// ─── Hashable Mirror Types ────────────────────────────────────────────────────

/// Hashable mirror of `wgpu::BlendComponent`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BlendComponentKey {
    pub src_factor: wgpu::BlendFactor,
    pub dst_factor: wgpu::BlendFactor,
    pub operation: wgpu::BlendOperation,
}

impl From<wgpu::BlendComponent> for BlendComponentKey {
    fn from(b: wgpu::BlendComponent) -> Self {
        Self {
            src_factor: b.src_factor,
            dst_factor: b.dst_factor,
            operation: b.operation,
        }
    }
}

impl From<BlendComponentKey> for wgpu::BlendComponent {
    fn from(k: BlendComponentKey) -> Self {
        Self {
            src_factor: k.src_factor,
            dst_factor: k.dst_factor,
            operation: k.operation,
        }
    }
}

/// Hashable mirror of `wgpu::BlendState`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BlendStateKey {
    pub color: BlendComponentKey,
    pub alpha: BlendComponentKey,
}

impl From<wgpu::BlendState> for BlendStateKey {
    fn from(b: wgpu::BlendState) -> Self {
        Self {
            color: b.color.into(),
            alpha: b.alpha.into(),
        }
    }
}

impl From<BlendStateKey> for wgpu::BlendState {
    fn from(k: BlendStateKey) -> Self {
        Self {
            color: k.color.into(),
            alpha: k.alpha.into(),
        }
    }
}

/// Hashable mirror of `wgpu::ColorTargetState`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ColorTargetKey {
    pub format: wgpu::TextureFormat,
    pub blend: Option<BlendStateKey>,
    pub write_mask: u32, // wgpu::ColorWrites bits
}

impl From<wgpu::ColorTargetState> for ColorTargetKey {
    fn from(c: wgpu::ColorTargetState) -> Self {
        Self {
            format: c.format,
            blend: c.blend.map(Into::into),
            write_mask: c.write_mask.bits(),
        }
    }
}

impl From<ColorTargetKey> for wgpu::ColorTargetState {
    fn from(k: ColorTargetKey) -> Self {
        Self {
            format: k.format,
            blend: k.blend.map(Into::into),
            write_mask: wgpu::ColorWrites::from_bits_truncate(k.write_mask),
        }
    }
}

/// Hashable mirror of `wgpu::DepthBiasState`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DepthBiasKey {
    pub constant: i32,
    pub slope_scale_bits: u32,
    pub clamp_bits: u32,
}

impl From<wgpu::DepthBiasState> for DepthBiasKey {
    fn from(b: wgpu::DepthBiasState) -> Self {
        Self {
            constant: b.constant,
            slope_scale_bits: b.slope_scale.to_bits(),
            clamp_bits: b.clamp.to_bits(),
        }
    }
}

/// Hashable mirror of `wgpu::DepthStencilState`, without stencil: no pass
/// uses one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DepthStencilKey {
    pub format: wgpu::TextureFormat,
    pub depth_write_enabled: bool,
    pub depth_compare: wgpu::CompareFunction,
    pub bias: DepthBiasKey,
}

impl From<wgpu::DepthStencilState> for DepthStencilKey {
    fn from(d: wgpu::DepthStencilState) -> Self {
        Self {
            format: d.format,
            depth_write_enabled: d.depth_write_enabled.unwrap_or(false),
            depth_compare: d.depth_compare.unwrap_or(wgpu::CompareFunction::Always),
            bias: d.bias.into(),
        }
    }
}

impl From<DepthStencilKey> for wgpu::DepthStencilState {
    fn from(k: DepthStencilKey) -> Self {
        Self {
            format: k.format,
            depth_write_enabled: Some(k.depth_write_enabled),
            depth_compare: Some(k.depth_compare),
            stencil: wgpu::StencilState::default(),
            bias: wgpu::DepthBiasState {
                constant: k.bias.constant,
                slope_scale: f32::from_bits(k.bias.slope_scale_bits),
                clamp: f32::from_bits(k.bias.clamp_bits),
            },
        }
    }
}

// ─── Pipeline Keys ────────────────────────────────────────────────────────────

/// Bind group layouts a geometry pipeline is built against.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum GeometryLayout {
    /// `[View, Objects]`: depth-only passes.
    Depth,
    /// `[View, Objects, Lighting, Material]`: shading passes.
    Shading,
}

/// Cache key of a pass cache pipeline.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct GeometryPipelineKey {
    pub program: ProgramId,
    /// Program generation the pipeline was compiled from.
    pub generation: u32,
    pub layout: GeometryLayout,
    pub topology: wgpu::PrimitiveTopology,
    pub cull_mode: Option<wgpu::Face>,
    pub polygon_mode: wgpu::PolygonMode,
    pub depth_stencil: Option<DepthStencilKey>,
    pub color_targets: SmallVec<[ColorTargetKey; 2]>,
    /// Value of the `USE_CASCADES` override, for programs declaring it.
    pub use_cascades: Option<bool>,
}

impl GeometryPipelineKey {
    #[must_use]
    pub fn new(
        program: ProgramId,
        generation: u32,
        layout: GeometryLayout,
        topology: wgpu::PrimitiveTopology,
        state: &PassState,
        color_formats: &[wgpu::TextureFormat],
        use_cascades: Option<bool>,
    ) -> Self {
        Self {
            program,
            generation,
            layout,
            topology,
            cull_mode: state.cull_mode,
            polygon_mode: state.polygon_mode,
            depth_stencil: state.depth_stencil().map(Into::into),
            color_targets: state
                .color_targets(color_formats)
                .into_iter()
                .flatten()
                .map(Into::into)
                .collect(),
            use_cascades,
        }
    }

    /// Primitive state rebuilt from the key.
    #[must_use]
    pub fn primitive(&self) -> wgpu::PrimitiveState {
        wgpu::PrimitiveState {
            topology: self.topology,
            strip_index_format: None,
            front_face: wgpu::FrontFace::Ccw,
            cull_mode: self.cull_mode,
            polygon_mode: self.polygon_mode,
            unclipped_depth: false,
            conservative: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::renderer::graph::render_state::ACCUM_FORMAT;

    #[test]
    fn bias_is_part_of_pipeline_identity() {
        let topology = wgpu::PrimitiveTopology::TriangleList;
        let unbiased = GeometryPipelineKey::new(
            ProgramId(0), 0, GeometryLayout::Depth, topology, &PassState::depth_prepass(), &[], None,
        );
        let bias = wgpu::DepthBiasState { constant: 2, slope_scale: 3.0, clamp: 0.0 };
        let biased = GeometryPipelineKey::new(
            ProgramId(0), 0, GeometryLayout::Depth, topology, &PassState::shadow(bias), &[], None,
        );
        assert_ne!(unbiased, biased);
        assert_eq!(
            wgpu::DepthStencilState::from(biased.depth_stencil.unwrap()).bias,
            bias
        );
    }

    #[test]
    fn color_targets_round_trip_through_mirrors() {
        let state = PassState::transparent_accumulation();
        let key = GeometryPipelineKey::new(
            ProgramId(3),
            1,
            GeometryLayout::Shading,
            wgpu::PrimitiveTopology::TriangleList,
            &state,
            &[ACCUM_FORMAT, wgpu::TextureFormat::R8Unorm],
            None,
        );
        assert_eq!(key.color_targets.len(), 2);
        let accum = wgpu::ColorTargetState::from(key.color_targets[0]);
        assert_eq!(accum.format, ACCUM_FORMAT);
        assert_eq!(accum.blend, state.color_blends[0]);
        assert_eq!(accum.write_mask, wgpu::ColorWrites::ALL);
    }
}
