//! Pass cache generation
//!
//! Turns a frame's [`PartList`] into the draw submission of one pass:
//!
//! 1. **Expand**: one [`PartDrawEntry`] per part whose effect has a technique
//!    for the pass. Other parts are skipped.
//! 2. **Sort**: stable sort by [`DrawKey`], so parts sharing a program,
//!    material context and vertex stream become adjacent.
//! 3. **Batch**: one [`DrawCall`] per run of equal keys, one indirect command
//!    and one [`DrawInstance`] per entry.
//!
//! Batching looks only at adjacent keys. Parts are never instanced together:
//! every command draws exactly one instance, whose data lives at
//! `draw_instances[base_instance]`.

use bytemuck::{Pod, Zeroable};

use crate::resources::effect::PassKind;
use crate::resources::mesh::index_size;
use crate::resources::storage::{MaterialContextId, ProgramId, Storage, VertexStreamId};
use crate::scene::part_list::PartList;

/// Upper bound on parts drawn by one pass in one frame.
pub const MAX_DRAW_INSTANCES: usize = 2048;

/// Sort key: program (16 bits) | material context (16 bits) | vertex stream (32 bits).
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct DrawKey(u64);

impl DrawKey {
    pub const INVALID: DrawKey = DrawKey(u64::MAX);

    pub fn new(program: ProgramId, context: MaterialContextId, stream: VertexStreamId) -> Self {
        let p_bits = u64::from(program.0) << 48;
        let c_bits = u64::from(context.0) << 32;
        let s_bits = u64::from(stream.0);
        Self(p_bits | c_bits | s_bits)
    }

    pub fn program(self) -> ProgramId {
        ProgramId((self.0 >> 48) as u16)
    }

    pub fn material_context(self) -> MaterialContextId {
        MaterialContextId((self.0 >> 32) as u16)
    }

    pub fn vertex_stream(self) -> VertexStreamId {
        VertexStreamId(self.0 as u32)
    }

    pub fn bits(self) -> u64 {
        self.0
    }
}

/// A part participating in a pass, with its sort key.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PartDrawEntry {
    pub key: DrawKey,
    pub part_idx: u32,
}

/// Indexed indirect draw arguments, in the layout the GPU consumes.
#[repr(C)]
#[derive(Clone, Copy, Debug, PartialEq, Eq, Pod, Zeroable)]
pub struct DrawElementsIndirectCommand {
    pub count: u32,
    pub instance_count: u32,
    pub first_index: u32,
    pub base_vertex: i32,
    pub base_instance: u32,
}

/// Per-instance record, read through the instance vertex buffer.
#[repr(C)]
#[derive(Clone, Copy, Debug, PartialEq, Eq, Pod, Zeroable)]
pub struct DrawInstance {
    pub material_idx: u32,
    pub transform_idx: u32,
    pub palette_offset: u32,
}

/// Consecutive commands sharing pipeline and bindings.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct DrawCall {
    pub topology: wgpu::PrimitiveTopology,
    pub index_format: wgpu::IndexFormat,
    pub program: ProgramId,
    pub vertex_stream: VertexStreamId,
    pub material_context: MaterialContextId,
    /// Number of commands covered, starting after the previous call's.
    pub draw_count: u32,
}

/// Draw submission of one pass for one frame.
#[derive(Clone, Debug, Default)]
pub struct PassCache {
    pub calls: Vec<DrawCall>,
    pub draw_commands: Vec<DrawElementsIndirectCommand>,
    pub draw_instances: Vec<DrawInstance>,
}

impl PassCache {
    pub fn is_empty(&self) -> bool {
        self.calls.is_empty()
    }

    /// Index of the first command of each call, paired with the call.
    pub fn calls_with_offsets(&self) -> impl Iterator<Item = (u32, &DrawCall)> {
        self.calls.iter().scan(0_u32, |first, call| {
            let current = *first;
            *first += call.draw_count;
            Some((current, call))
        })
    }
}

/// Step 1: entries for the parts participating in `pass`, unsorted.
pub fn expand_entries(pass: PassKind, part_list: &PartList, storage: &Storage) -> Vec<PartDrawEntry> {
    part_list
        .parts
        .iter()
        .zip(&part_list.materials)
        .enumerate()
        .filter_map(|(part_idx, (part, &material))| {
            let effect = storage.material(material).effect;
            let program = storage.program_for(effect, pass)?;
            Some(PartDrawEntry {
                key: DrawKey::new(program, storage.material_context(material), part.vertex_stream),
                part_idx: part_idx as u32,
            })
        })
        .collect()
}

/// Builds the pass cache of `pass` from the frame's parts.
pub fn prepare_pass(pass: PassKind, part_list: &PartList, storage: &Storage) -> PassCache {
    part_list.assert_consistent();

    let mut entries = expand_entries(pass, part_list, storage);
    assert!(
        entries.len() <= MAX_DRAW_INSTANCES,
        "{} parts in pass {pass:?} exceed the {MAX_DRAW_INSTANCES} draw instances capacity",
        entries.len()
    );

    // Stable: parts with equal keys keep their part-list order.
    entries.sort_by_key(|entry| entry.key);

    let mut cache = PassCache {
        calls: Vec::new(),
        draw_commands: Vec::with_capacity(entries.len()),
        draw_instances: Vec::with_capacity(entries.len()),
    };

    let mut current_key = DrawKey::INVALID;
    for entry in &entries {
        let part_idx = entry.part_idx as usize;
        let part = &part_list.parts[part_idx];
        let stream = storage.vertex_stream(part.vertex_stream);

        if entry.key == current_key {
            if let Some(call) = cache.calls.last_mut() {
                call.draw_count += 1;
            }
        } else {
            current_key = entry.key;
            cache.calls.push(DrawCall {
                topology: stream.topology,
                index_format: stream.index_format,
                program: entry.key.program(),
                vertex_stream: part.vertex_stream,
                material_context: entry.key.material_context(),
                draw_count: 1,
            });
        }

        let index_size = u64::from(index_size(stream.index_format));
        assert!(
            stream.index_byte_offset % index_size == 0,
            "index data of stream '{}' at byte {} is not aligned on its {index_size}-byte indices",
            stream.label,
            stream.index_byte_offset
        );

        cache.draw_commands.push(DrawElementsIndirectCommand {
            count: part.region.count,
            instance_count: 1,
            first_index: (stream.index_byte_offset / index_size) as u32 + part.region.first,
            base_vertex: stream.vertex_offset as i32 + part.region.base_vertex,
            base_instance: cache.draw_instances.len() as u32,
        });
        cache.draw_instances.push(DrawInstance {
            material_idx: part_list.materials[part_idx].0,
            transform_idx: part_list.transform_idx[part_idx],
            palette_offset: part_list.palette_offset[part_idx],
        });
    }

    cache
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn key_fields_round_trip_through_packing() {
        let key = DrawKey::new(ProgramId(7), MaterialContextId(3), VertexStreamId(42));
        assert_eq!(key.program(), ProgramId(7));
        assert_eq!(key.material_context(), MaterialContextId(3));
        assert_eq!(key.vertex_stream(), VertexStreamId(42));
    }

    #[test]
    fn program_dominates_ordering() {
        let low_program = DrawKey::new(ProgramId(1), MaterialContextId(9), VertexStreamId(9));
        let high_program = DrawKey::new(ProgramId(2), MaterialContextId(0), VertexStreamId(0));
        assert!(low_program < high_program);
    }

    #[test]
    fn indirect_command_is_twenty_bytes() {
        assert_eq!(std::mem::size_of::<DrawElementsIndirectCommand>(), 20);
        assert_eq!(std::mem::size_of::<DrawInstance>(), 12);
    }
}
