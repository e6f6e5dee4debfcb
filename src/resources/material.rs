use bytemuck::{Pod, Zeroable};
use glam::{Vec3, Vec4};

use super::storage::{EffectId, TextureId};

/// Per-material shading parameters, uploaded as one element of the material
/// storage buffer and addressed by `DrawInstance::material_idx`.
///
/// Layout matches the WGSL `MaterialParams` struct (48 bytes, 16-byte
/// aligned).
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct MaterialParams {
    pub base_color: [f32; 4],
    pub emissive: [f32; 3],
    pub metallic: f32,
    pub roughness: f32,
    pub specular_exponent: f32,
    pub _padding: [f32; 2],
}

impl Default for MaterialParams {
    fn default() -> Self {
        Self {
            base_color: [1.0; 4],
            emissive: [0.0; 3],
            metallic: 0.0,
            roughness: 0.6,
            specular_exponent: 32.0,
            _padding: [0.0; 2],
        }
    }
}

impl MaterialParams {
    #[must_use]
    pub fn with_color(color: Vec4) -> Self {
        Self { base_color: color.to_array(), ..Default::default() }
    }

    #[must_use]
    pub fn with_emissive(mut self, emissive: Vec3) -> Self {
        self.emissive = emissive.to_array();
        self
    }

    #[must_use]
    pub fn with_metallic_roughness(mut self, metallic: f32, roughness: f32) -> Self {
        self.metallic = metallic;
        self.roughness = roughness;
        self
    }
}

/// A material: the effect selecting programs per pass, plus parameters.
///
/// Materials sharing the same base-color texture (or none) share a material
/// context, and can be batched in the same draw call.
#[derive(Debug, Clone)]
pub struct Material {
    pub label: String,
    pub effect: EffectId,
    pub params: MaterialParams,
    pub base_color_texture: Option<TextureId>,
}

impl Material {
    #[must_use]
    pub fn new(label: impl Into<String>, effect: EffectId, params: MaterialParams) -> Self {
        Self {
            label: label.into(),
            effect,
            params,
            base_color_texture: None,
        }
    }

    #[must_use]
    pub fn with_texture(mut self, texture: TextureId) -> Self {
        self.base_color_texture = Some(texture);
        self
    }
}
