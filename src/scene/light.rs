use bytemuck::{Pod, Zeroable};
use glam::{Mat4, Vec3};

/// Capacity of each light kind in the lights uniform block.
pub const MAX_LIGHTS: usize = 16;
/// Directional lights allowed to cast shadows in one frame.
pub const MAX_SHADOW_LIGHTS: usize = 4;
/// Cascades per shadow-casting light when cascaded shadow maps are enabled.
pub const CASCADES_PER_SHADOW: usize = 4;
/// Shadow map layers, and light view-projection slots.
pub const MAX_SHADOW_MAPS: usize = MAX_SHADOW_LIGHTS * CASCADES_PER_SHADOW;
/// Marks the absence of an index in GPU blocks.
pub const NO_ENTRY_INDEX: u32 = u32::MAX;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DirectionalLight {
    /// Direction the light travels in (from the light toward the scene).
    pub direction: Vec3,
    pub diffuse: Vec3,
    pub specular: Vec3,
    pub cast_shadows: bool,
}

impl DirectionalLight {
    pub fn new(direction: Vec3, color: Vec3) -> Self {
        Self {
            direction: direction.normalize(),
            diffuse: color,
            specular: color,
            cast_shadows: false,
        }
    }

    #[must_use]
    pub fn with_shadows(mut self) -> Self {
        self.cast_shadows = true;
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PointLight {
    pub position: Vec3,
    /// Full intensity up to `radius_min`, fading out to zero at `radius_max`.
    pub radius_min: f32,
    pub radius_max: f32,
    pub diffuse: Vec3,
    pub specular: Vec3,
}

impl PointLight {
    pub fn new(position: Vec3, radius_max: f32, color: Vec3) -> Self {
        Self {
            position,
            radius_min: 0.0,
            radius_max,
            diffuse: color,
            specular: color,
        }
    }
}

/// The lights of a scene.
#[derive(Debug, Clone, Default)]
pub struct Lights {
    pub ambient: Vec3,
    pub directional: Vec<DirectionalLight>,
    pub point: Vec<PointLight>,
}

impl Lights {
    pub fn shadow_caster_count(&self) -> usize {
        self.directional.iter().filter(|light| light.cast_shadows).count()
    }
}

// ============================================================================
// GPU blocks
// ============================================================================

#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct GpuDirectionalLight {
    pub direction: [f32; 4],
    pub diffuse: [f32; 4],
    pub specular: [f32; 4],
    /// Base layer in the shadow map array, or [`NO_ENTRY_INDEX`].
    pub shadow_map_index: u32,
    pub _padding: [u32; 3],
}

#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct GpuPointLight {
    pub position: [f32; 4],
    /// x: radius min, y: radius max.
    pub radius: [f32; 4],
    pub diffuse: [f32; 4],
    pub specular: [f32; 4],
}

/// Lights uniform block, mirrored by `LightsData` in the WGSL sources.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct LightsData {
    pub directional_count: u32,
    pub point_count: u32,
    pub _padding: [u32; 2],
    pub ambient: [f32; 4],
    pub directional: [GpuDirectionalLight; MAX_LIGHTS],
    pub point: [GpuPointLight; MAX_LIGHTS],
}

impl Default for LightsData {
    fn default() -> Self {
        Self::zeroed()
    }
}

impl LightsData {
    /// Packs `lights`, transforming directions and positions by `transform`.
    ///
    /// Lights beyond [`MAX_LIGHTS`] per kind are dropped with a warning.
    pub fn from_lights(lights: &Lights, transform: Mat4) -> Self {
        let mut data = Self::default();
        data.ambient = lights.ambient.extend(1.0).to_array();

        if lights.directional.len() > MAX_LIGHTS || lights.point.len() > MAX_LIGHTS {
            log::warn!(
                "Scene has {} directional and {} point lights, only {MAX_LIGHTS} of each are shaded",
                lights.directional.len(),
                lights.point.len()
            );
        }

        for (slot, light) in data.directional.iter_mut().zip(&lights.directional) {
            let direction = transform.transform_vector3(light.direction).normalize_or_zero();
            *slot = GpuDirectionalLight {
                direction: direction.extend(0.0).to_array(),
                diffuse: light.diffuse.extend(1.0).to_array(),
                specular: light.specular.extend(1.0).to_array(),
                shadow_map_index: NO_ENTRY_INDEX,
                _padding: [0; 3],
            };
        }
        data.directional_count = lights.directional.len().min(MAX_LIGHTS) as u32;

        for (slot, light) in data.point.iter_mut().zip(&lights.point) {
            *slot = GpuPointLight {
                position: transform.transform_point3(light.position).extend(1.0).to_array(),
                radius: [light.radius_min, light.radius_max, 0.0, 0.0],
                diffuse: light.diffuse.extend(1.0).to_array(),
                specular: light.specular.extend(1.0).to_array(),
            };
        }
        data.point_count = lights.point.len().min(MAX_LIGHTS) as u32;

        data
    }

    /// Writes the shadow map base indices computed by the shadow pass.
    pub fn set_shadow_map_indices(&mut self, indices: &[u32]) {
        for (slot, index) in self.directional.iter_mut().zip(indices) {
            slot.shadow_map_index = *index;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn gpu_blocks_have_uniform_friendly_sizes() {
        assert_eq!(std::mem::size_of::<GpuDirectionalLight>(), 64);
        assert_eq!(std::mem::size_of::<GpuPointLight>(), 64);
        assert_eq!(std::mem::size_of::<LightsData>(), 32 + 2 * MAX_LIGHTS * 64);
    }
}
