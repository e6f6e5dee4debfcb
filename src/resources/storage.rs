//! Resource storage
//!
//! `Storage` owns everything a frame draws with but does not rebuild every
//! frame: programs, effects, materials, textures and the geometry arena.
//! It is CPU-only; the renderer mirrors it on the GPU and watches the
//! generation counters to know when to re-upload.
//!
//! Identifiers are dense indices, which lets the pass cache pack them into
//! its sort keys.

use glam::Vec3;
use rustc_hash::FxHashMap;

use super::bounds::BoundingBox;
use super::effect::{Effect, ForwardTechnique, PassKind};
use super::material::{Material, MaterialParams};
use super::mesh::{IndexRegion, Vertex, VertexStream, VertexStreamDesc, index_size};
use super::program::Program;
use crate::errors::{Result, UmbraError};

macro_rules! define_id {
    ($(#[$meta:meta])* $name:ident($repr:ty)) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
        pub struct $name(pub $repr);

        impl $name {
            #[inline]
            pub fn index(self) -> usize {
                self.0 as usize
            }
        }
    };
}

define_id!(ProgramId(u16));
define_id!(EffectId(u32));
define_id!(MaterialId(u32));
define_id!(
    /// Materials sharing the same texture bindings.
    MaterialContextId(u16)
);
define_id!(VertexStreamId(u32));
define_id!(TextureId(u32));

/// Semantic slots of the texture repository.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TextureSemantic {
    /// Cube map drawn by the skybox and sampled for ambient reflections.
    Environment,
}

/// CPU texture data, tightly packed rows.
#[derive(Debug, Clone)]
pub struct TextureData {
    pub label: String,
    pub width: u32,
    pub height: u32,
    /// 6 for cube maps.
    pub layers: u32,
    pub format: wgpu::TextureFormat,
    pub view_dimension: wgpu::TextureViewDimension,
    pub data: Vec<u8>,
}

impl TextureData {
    pub fn rgba8(label: impl Into<String>, width: u32, height: u32, data: Vec<u8>) -> Self {
        debug_assert_eq!(data.len(), (width * height * 4) as usize);
        Self {
            label: label.into(),
            width,
            height,
            layers: 1,
            format: wgpu::TextureFormat::Rgba8UnormSrgb,
            view_dimension: wgpu::TextureViewDimension::D2,
            data,
        }
    }

    /// Cube map with one flat color per face, in +X, -X, +Y, -Y, +Z, -Z order.
    pub fn cube_faces(label: impl Into<String>, faces: [[u8; 4]; 6]) -> Self {
        Self {
            label: label.into(),
            width: 1,
            height: 1,
            layers: 6,
            format: wgpu::TextureFormat::Rgba8UnormSrgb,
            view_dimension: wgpu::TextureViewDimension::Cube,
            data: faces.concat(),
        }
    }
}

/// Effects installed by [`Storage::install_default_effects`].
#[derive(Debug, Clone, Copy)]
pub struct DefaultEffects {
    pub opaque: EffectId,
    pub transparent: EffectId,
}

const DEPTH_WGSL: &str = include_str!("../renderer/shaders/depth.wgsl");
const FORWARD_WGSL: &str = include_str!("../renderer/shaders/forward.wgsl");
const TRANSPARENT_WGSL: &str = include_str!("../renderer/shaders/transparent.wgsl");

#[derive(Debug, Default)]
pub struct Storage {
    programs: Vec<Program>,
    effects: Vec<Effect>,
    materials: Vec<Material>,
    material_contexts: Vec<MaterialContextId>,
    context_textures: Vec<Option<TextureId>>,
    vertex_streams: Vec<VertexStream>,
    textures: Vec<TextureData>,
    semantic_textures: FxHashMap<TextureSemantic, TextureId>,

    // Geometry arena shared by every vertex stream.
    vertices: Vec<Vertex>,
    index_bytes: Vec<u8>,
    geometry_generation: u32,
    material_generation: u32,
}

impl Storage {
    pub fn new() -> Self {
        Self::default()
    }

    // ========================================================================
    // Programs & Effects
    // ========================================================================

    pub fn add_program(&mut self, program: Program) -> ProgramId {
        assert!(self.programs.len() < usize::from(u16::MAX), "program count exceeds the sort key range");
        let id = ProgramId(self.programs.len() as u16);
        self.programs.push(program);
        id
    }

    pub fn program(&self, id: ProgramId) -> &Program {
        &self.programs[id.index()]
    }

    pub fn programs(&self) -> impl Iterator<Item = (ProgramId, &Program)> {
        self.programs.iter().enumerate().map(|(i, p)| (ProgramId(i as u16), p))
    }

    pub fn add_effect(&mut self, effect: Effect) -> EffectId {
        let id = EffectId(self.effects.len() as u32);
        self.effects.push(effect);
        id
    }

    pub fn effect(&self, id: EffectId) -> &Effect {
        &self.effects[id.index()]
    }

    /// The program an effect uses for `pass`, if it participates in it.
    pub fn program_for(&self, effect: EffectId, pass: PassKind) -> Option<ProgramId> {
        self.effects[effect.index()].program_for(pass)
    }

    /// Installs the built-in opaque and transparent effects.
    pub fn install_default_effects(&mut self) -> Result<DefaultEffects> {
        let depth = self.add_program(Program::inline("depth", DEPTH_WGSL)?);

        let mut opaque = Effect::new("default_opaque")
            .with_technique(PassKind::DepthOpaque, depth)
            .with_technique(PassKind::CascadedDepthOpaque, depth);
        for (model, technique) in ForwardTechnique::ALL.into_iter().enumerate() {
            let program = Program::inline(technique.annotation(), FORWARD_WGSL)?
                .with_constant("SHADING_MODEL", model as f64);
            let program = self.add_program(program);
            opaque = opaque.with_technique(PassKind::Forward(technique), program);
        }

        let transparent_program = self.add_program(Program::inline("transparent", TRANSPARENT_WGSL)?);
        let transparent = Effect::new("default_transparent")
            .with_technique(PassKind::Transparent, transparent_program);

        Ok(DefaultEffects {
            opaque: self.add_effect(opaque),
            transparent: self.add_effect(transparent),
        })
    }

    /// Re-reads and re-validates every program.
    ///
    /// Programs failing validation keep their previous code. Returns `false`
    /// if any program failed.
    pub fn recompile_programs(&mut self) -> bool {
        let mut success = true;
        for program in &mut self.programs {
            match program.recompile() {
                Ok(true) => log::info!("Recompiled program '{}'", program.label()),
                Ok(false) => {}
                Err(e) => {
                    log::error!("{e}");
                    success = false;
                }
            }
        }
        success
    }

    // ========================================================================
    // Materials
    // ========================================================================

    pub fn add_material(&mut self, material: Material) -> MaterialId {
        let context = self.context_for(material.base_color_texture);
        let id = MaterialId(self.materials.len() as u32);
        self.materials.push(material);
        self.material_contexts.push(context);
        self.material_generation += 1;
        id
    }

    fn context_for(&mut self, texture: Option<TextureId>) -> MaterialContextId {
        if let Some(index) = self.context_textures.iter().position(|t| *t == texture) {
            return MaterialContextId(index as u16);
        }
        assert!(
            self.context_textures.len() < usize::from(u16::MAX),
            "material context count exceeds the sort key range"
        );
        self.context_textures.push(texture);
        MaterialContextId((self.context_textures.len() - 1) as u16)
    }

    pub fn material(&self, id: MaterialId) -> &Material {
        &self.materials[id.index()]
    }

    /// Updates shading parameters; the material keeps its context.
    pub fn set_material_params(&mut self, id: MaterialId, params: MaterialParams) {
        self.materials[id.index()].params = params;
        self.material_generation += 1;
    }

    pub fn materials(&self) -> &[Material] {
        &self.materials
    }

    pub fn material_context(&self, id: MaterialId) -> MaterialContextId {
        self.material_contexts[id.index()]
    }

    /// Texture bound by a material context.
    pub fn context_texture(&self, context: MaterialContextId) -> Option<TextureId> {
        self.context_textures[context.index()]
    }

    pub fn material_context_count(&self) -> usize {
        self.context_textures.len()
    }

    pub fn material_generation(&self) -> u32 {
        self.material_generation
    }

    // ========================================================================
    // Geometry
    // ========================================================================

    /// Appends a stream to the geometry arena.
    ///
    /// Index data is placed at a byte offset that is a multiple of 4, which
    /// satisfies the alignment of both index formats.
    pub fn add_vertex_stream(&mut self, desc: VertexStreamDesc) -> VertexStreamId {
        let vertex_offset = self.vertices.len() as u32;
        self.vertices.extend_from_slice(&desc.vertices);

        let aligned = self.index_bytes.len().next_multiple_of(4);
        self.index_bytes.resize(aligned, 0);
        let index_byte_offset = aligned as u64;
        self.index_bytes.extend_from_slice(desc.indices.as_bytes());

        let stream = VertexStream {
            label: desc.label,
            topology: desc.topology,
            index_format: desc.indices.format(),
            vertex_offset,
            vertex_count: desc.vertices.len() as u32,
            index_byte_offset,
            index_count: desc.indices.len() as u32,
            bounds: BoundingBox::from_points(desc.vertices.iter().map(|v| Vec3::from(v.position))),
        };
        debug_assert_eq!(stream.index_byte_offset % u64::from(index_size(stream.index_format)), 0);

        self.geometry_generation += 1;
        self.vertex_streams.push(stream);
        VertexStreamId((self.vertex_streams.len() - 1) as u32)
    }

    pub fn vertex_stream(&self, id: VertexStreamId) -> &VertexStream {
        &self.vertex_streams[id.index()]
    }

    /// Checks that `region` lies inside the stream's indices.
    pub fn validate_region(&self, id: VertexStreamId, region: IndexRegion) -> Result<()> {
        let stream = self.vertex_stream(id);
        let end = region.first + region.count;
        if end > stream.index_count {
            return Err(UmbraError::InvalidIndexRegion {
                stream: stream.label.clone(),
                first: region.first,
                end,
                available: stream.index_count,
            });
        }
        Ok(())
    }

    /// Model-space bounds of the vertices referenced by `region`.
    ///
    /// Indices pointing outside the stream are ignored.
    pub fn region_bounds(&self, id: VertexStreamId, region: IndexRegion) -> BoundingBox {
        let stream = self.vertex_stream(id);
        if region == stream.full_region() {
            return stream.bounds;
        }

        let size = index_size(stream.index_format) as usize;
        let begin = stream.index_byte_offset as usize + region.first as usize * size;
        let end = begin + region.count as usize * size;
        let Some(bytes) = self.index_bytes.get(begin..end) else {
            return BoundingBox::EMPTY;
        };

        let begin_vertex = stream.vertex_offset as usize;
        let vertices = &self.vertices[begin_vertex..begin_vertex + stream.vertex_count as usize];
        let positions = bytes.chunks_exact(size).filter_map(|index| {
            let index = match stream.index_format {
                wgpu::IndexFormat::Uint16 => i64::from(u16::from_ne_bytes([index[0], index[1]])),
                wgpu::IndexFormat::Uint32 => i64::from(u32::from_ne_bytes([index[0], index[1], index[2], index[3]])),
            };
            let vertex = usize::try_from(index + i64::from(region.base_vertex)).ok()?;
            vertices.get(vertex).map(|v| Vec3::from(v.position))
        });
        BoundingBox::from_points(positions)
    }

    pub fn vertices(&self) -> &[Vertex] {
        &self.vertices
    }

    pub fn index_bytes(&self) -> &[u8] {
        &self.index_bytes
    }

    pub fn geometry_generation(&self) -> u32 {
        self.geometry_generation
    }

    // ========================================================================
    // Textures
    // ========================================================================

    pub fn add_texture(&mut self, texture: TextureData) -> TextureId {
        self.textures.push(texture);
        TextureId((self.textures.len() - 1) as u32)
    }

    pub fn texture(&self, id: TextureId) -> &TextureData {
        &self.textures[id.index()]
    }

    pub fn textures(&self) -> &[TextureData] {
        &self.textures
    }

    pub fn set_semantic_texture(&mut self, semantic: TextureSemantic, texture: TextureId) {
        self.semantic_textures.insert(semantic, texture);
    }

    pub fn semantic_texture(&self, semantic: TextureSemantic) -> Option<TextureId> {
        self.semantic_textures.get(&semantic).copied()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resources::mesh::{IndexData, box_stream};

    #[test]
    fn index_offsets_stay_aligned_across_formats() {
        let mut storage = Storage::new();
        let odd = VertexStreamDesc {
            label: "odd".into(),
            topology: wgpu::PrimitiveTopology::TriangleList,
            vertices: vec![Vertex::new([0.0; 3], [0.0, 1.0, 0.0], [0.0; 2]); 3],
            indices: IndexData::U16(vec![0, 1, 2]),
        };
        let first = storage.add_vertex_stream(odd);
        let second = storage.add_vertex_stream(box_stream("box", 1.0, 1.0, 1.0));

        assert_eq!(storage.vertex_stream(first).index_byte_offset, 0);
        assert_eq!(storage.vertex_stream(second).index_byte_offset, 8);
        assert_eq!(storage.vertex_stream(second).vertex_offset, 3);
    }

    fn two_triangle_stream(indices: IndexData) -> VertexStreamDesc {
        let normal = [0.0, 0.0, 1.0];
        VertexStreamDesc {
            label: "two triangles".into(),
            topology: wgpu::PrimitiveTopology::TriangleList,
            vertices: vec![
                Vertex::new([0.0, 0.0, 0.0], normal, [0.0; 2]),
                Vertex::new([1.0, 0.0, 0.0], normal, [0.0; 2]),
                Vertex::new([0.0, 1.0, 0.0], normal, [0.0; 2]),
                Vertex::new([10.0, 0.0, 0.0], normal, [0.0; 2]),
                Vertex::new([11.0, 0.0, 0.0], normal, [0.0; 2]),
                Vertex::new([10.0, 1.0, 2.0], normal, [0.0; 2]),
            ],
            indices,
        }
    }

    #[test]
    fn region_bounds_cover_only_the_region() {
        let mut storage = Storage::new();
        // A misaligned stream first, so the second one starts at a padded offset.
        storage.add_vertex_stream(two_triangle_stream(IndexData::U16(vec![0, 1, 2])));
        let stream = storage.add_vertex_stream(two_triangle_stream(IndexData::U16(vec![0, 1, 2, 3, 4, 5])));

        let second = storage.region_bounds(stream, IndexRegion { first: 3, count: 3, base_vertex: 0 });
        assert_eq!(second, BoundingBox::new(Vec3::new(10.0, 0.0, 0.0), Vec3::new(11.0, 1.0, 2.0)));

        let full = storage.region_bounds(stream, storage.vertex_stream(stream).full_region());
        assert_eq!(full, BoundingBox::new(Vec3::ZERO, Vec3::new(11.0, 1.0, 2.0)));
    }

    #[test]
    fn region_bounds_apply_the_base_vertex() {
        let mut storage = Storage::new();
        let stream = storage.add_vertex_stream(two_triangle_stream(IndexData::U32(vec![0, 1, 2])));

        let shifted = storage.region_bounds(stream, IndexRegion { first: 0, count: 3, base_vertex: 3 });
        assert_eq!(shifted, BoundingBox::new(Vec3::new(10.0, 0.0, 0.0), Vec3::new(11.0, 1.0, 2.0)));

        // Past the stream's vertices: nothing.
        let outside = storage.region_bounds(stream, IndexRegion { first: 0, count: 3, base_vertex: 6 });
        assert!(outside.is_empty());
    }

    #[test]
    fn materials_without_texture_share_a_context() {
        let mut storage = Storage::new();
        let effect = storage.add_effect(Effect::new("plain"));
        let a = storage.add_material(Material::new("a", effect, MaterialParams::default()));
        let b = storage.add_material(Material::new("b", effect, MaterialParams::default()));
        let texture = storage.add_texture(TextureData::rgba8("white", 1, 1, vec![255; 4]));
        let c = storage.add_material(
            Material::new("c", effect, MaterialParams::default()).with_texture(texture),
        );

        assert_eq!(storage.material_context(a), storage.material_context(b));
        assert_ne!(storage.material_context(a), storage.material_context(c));
    }

    #[test]
    fn geometry_shaders_share_the_clip_position_expression() {
        // @invariant positions of the pre-pass and the color passes.
        for (label, source) in [("depth", DEPTH_WGSL), ("forward", FORWARD_WGSL), ("transparent", TRANSPARENT_WGSL)] {
            assert!(
                source.contains("let world_position = model * vec4<f32>(input.position, 1.0);"),
                "{label} computes the world position differently"
            );
            assert!(source.contains("view.view_projection * world_position;"), "{label} projects differently");
        }
    }

    #[test]
    #[should_panic(expected = "material context count exceeds the sort key range")]
    fn material_contexts_are_capped_by_the_sort_key() {
        let mut storage = Storage::new();
        let effect = storage.add_effect(Effect::new("plain"));
        storage.context_textures = vec![None; usize::from(u16::MAX)];
        let texture = storage.add_texture(TextureData::rgba8("white", 1, 1, vec![255; 4]));
        storage.add_material(Material::new("one too many", effect, MaterialParams::default()).with_texture(texture));
    }

    #[test]
    fn default_effects_split_opaque_and_transparent_passes() {
        let mut storage = Storage::new();
        let effects = storage.install_default_effects().unwrap();
        assert!(storage.program_for(effects.opaque, PassKind::DepthOpaque).is_some());
        assert!(storage.program_for(effects.opaque, PassKind::Transparent).is_none());
        assert!(storage.program_for(effects.transparent, PassKind::Transparent).is_some());
        assert!(storage.program_for(effects.transparent, PassKind::DepthOpaque).is_none());
    }
}
