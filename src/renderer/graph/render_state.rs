//! Fixed-function state of the passes
//!
//! Every pass builds its pipelines from one complete [`PassState`], so no
//! pass depends on state left behind by the previous one.

use smallvec::{SmallVec, smallvec};

/// Depth format of the scene depth buffer and of the shadow maps.
pub const DEPTH_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Depth32Float;
/// Weighted-blended OIT accumulation target.
pub const ACCUM_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Rgba16Float;
/// Weighted-blended OIT revealage target.
pub const REVEALAGE_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::R8Unorm;

/// Depth, culling, rasterization and blending of a pass.
#[derive(Debug, Clone, PartialEq)]
pub struct PassState {
    /// `None` disables the depth test and the depth attachment.
    pub depth_compare: Option<wgpu::CompareFunction>,
    pub depth_write: bool,
    pub depth_bias: wgpu::DepthBiasState,
    pub cull_mode: Option<wgpu::Face>,
    pub polygon_mode: wgpu::PolygonMode,
    /// One entry per color target.
    pub color_blends: SmallVec<[Option<wgpu::BlendState>; 2]>,
}

impl PassState {
    /// Depth only, writes enabled.
    #[must_use]
    pub fn depth_prepass() -> Self {
        Self {
            depth_compare: Some(wgpu::CompareFunction::Less),
            depth_write: true,
            depth_bias: wgpu::DepthBiasState::default(),
            cull_mode: Some(wgpu::Face::Back),
            polygon_mode: wgpu::PolygonMode::Fill,
            color_blends: SmallVec::new(),
        }
    }

    /// Depth only, with the shadow depth bias.
    #[must_use]
    pub fn shadow(bias: wgpu::DepthBiasState) -> Self {
        Self { depth_bias: bias, ..Self::depth_prepass() }
    }

    /// Opaque shading over the pre-pass depth.
    #[must_use]
    pub fn forward(polygon_mode: wgpu::PolygonMode) -> Self {
        Self {
            depth_compare: Some(wgpu::CompareFunction::LessEqual),
            depth_write: true,
            depth_bias: wgpu::DepthBiasState::default(),
            cull_mode: Some(wgpu::Face::Back),
            polygon_mode,
            color_blends: smallvec![None],
        }
    }

    /// Transparency accumulation: additive accumulation, multiplicative
    /// revealage, depth tested against opaque geometry but not written.
    #[must_use]
    pub fn transparent_accumulation() -> Self {
        let accumulate = wgpu::BlendComponent {
            src_factor: wgpu::BlendFactor::One,
            dst_factor: wgpu::BlendFactor::One,
            operation: wgpu::BlendOperation::Add,
        };
        let reveal = wgpu::BlendComponent {
            src_factor: wgpu::BlendFactor::Zero,
            dst_factor: wgpu::BlendFactor::OneMinusSrc,
            operation: wgpu::BlendOperation::Add,
        };
        Self {
            depth_compare: Some(wgpu::CompareFunction::Less),
            depth_write: false,
            depth_bias: wgpu::DepthBiasState::default(),
            cull_mode: Some(wgpu::Face::Back),
            polygon_mode: wgpu::PolygonMode::Fill,
            color_blends: smallvec![
                Some(wgpu::BlendState { color: accumulate, alpha: accumulate }),
                Some(wgpu::BlendState { color: reveal, alpha: reveal }),
            ],
        }
    }

    /// Fullscreen composition of the transparency targets.
    #[must_use]
    pub fn transparent_resolve() -> Self {
        Self {
            depth_compare: None,
            depth_write: false,
            depth_bias: wgpu::DepthBiasState::default(),
            cull_mode: None,
            polygon_mode: wgpu::PolygonMode::Fill,
            color_blends: smallvec![Some(wgpu::BlendState::ALPHA_BLENDING)],
        }
    }

    /// Skybox cube seen from inside, behind everything already drawn.
    #[must_use]
    pub fn skybox() -> Self {
        Self {
            depth_compare: Some(wgpu::CompareFunction::LessEqual),
            depth_write: false,
            depth_bias: wgpu::DepthBiasState::default(),
            cull_mode: Some(wgpu::Face::Front),
            polygon_mode: wgpu::PolygonMode::Fill,
            color_blends: smallvec![None],
        }
    }

    /// Debug lines, depth tested, never occluding each other.
    #[must_use]
    pub fn debug_lines() -> Self {
        Self {
            depth_compare: Some(wgpu::CompareFunction::LessEqual),
            depth_write: false,
            depth_bias: wgpu::DepthBiasState::default(),
            cull_mode: None,
            polygon_mode: wgpu::PolygonMode::Fill,
            color_blends: smallvec![Some(wgpu::BlendState::ALPHA_BLENDING)],
        }
    }

    /// Diagnostic quads, drawn over everything.
    #[must_use]
    pub fn diagnostic_quad() -> Self {
        Self {
            depth_compare: None,
            depth_write: false,
            depth_bias: wgpu::DepthBiasState::default(),
            cull_mode: None,
            polygon_mode: wgpu::PolygonMode::Fill,
            color_blends: smallvec![None],
        }
    }

    #[must_use]
    pub fn depth_stencil(&self) -> Option<wgpu::DepthStencilState> {
        self.depth_compare.map(|compare| wgpu::DepthStencilState {
            format: DEPTH_FORMAT,
            depth_write_enabled: Some(self.depth_write),
            depth_compare: Some(compare),
            stencil: wgpu::StencilState::default(),
            bias: self.depth_bias,
        })
    }

    #[must_use]
    pub fn primitive(&self, topology: wgpu::PrimitiveTopology) -> wgpu::PrimitiveState {
        wgpu::PrimitiveState {
            topology,
            strip_index_format: None,
            front_face: wgpu::FrontFace::Ccw,
            cull_mode: self.cull_mode,
            polygon_mode: self.polygon_mode,
            unclipped_depth: false,
            conservative: false,
        }
    }

    /// Color targets, pairing the blend states with `formats`.
    #[must_use]
    pub fn color_targets(&self, formats: &[wgpu::TextureFormat]) -> Vec<Option<wgpu::ColorTargetState>> {
        debug_assert_eq!(formats.len(), self.color_blends.len());
        formats
            .iter()
            .zip(&self.color_blends)
            .map(|(&format, &blend)| {
                Some(wgpu::ColorTargetState {
                    format,
                    blend,
                    write_mask: wgpu::ColorWrites::ALL,
                })
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transparency_blends_are_fixed() {
        let state = PassState::transparent_accumulation();
        let accum = state.color_blends[0].unwrap();
        let reveal = state.color_blends[1].unwrap();
        assert_eq!(accum.color.src_factor, wgpu::BlendFactor::One);
        assert_eq!(accum.color.dst_factor, wgpu::BlendFactor::One);
        assert_eq!(reveal.color.src_factor, wgpu::BlendFactor::Zero);
        assert_eq!(reveal.color.dst_factor, wgpu::BlendFactor::OneMinusSrc);
        assert!(!state.depth_write);
    }

    #[test]
    fn skybox_culls_front_faces_without_depth_writes() {
        let state = PassState::skybox();
        assert_eq!(state.cull_mode, Some(wgpu::Face::Front));
        assert_eq!(state.depth_compare, Some(wgpu::CompareFunction::LessEqual));
        assert!(!state.depth_write);
    }

    #[test]
    fn only_shadow_state_carries_bias() {
        let bias = wgpu::DepthBiasState { constant: 2, slope_scale: 3.0, clamp: 0.0 };
        assert_eq!(PassState::shadow(bias).depth_bias, bias);
        assert_eq!(PassState::depth_prepass().depth_bias, wgpu::DepthBiasState::default());
        assert_eq!(PassState::forward(wgpu::PolygonMode::Fill).depth_bias, wgpu::DepthBiasState::default());
    }
}
