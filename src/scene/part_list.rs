//! The per-frame flattened list of drawable parts.

use glam::Mat4;

use crate::resources::mesh::IndexRegion;
use crate::resources::storage::{MaterialId, VertexStreamId};
use crate::scene::light::NO_ENTRY_INDEX;

/// One drawable unit: a region of a vertex stream drawn with a material.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Part {
    pub vertex_stream: VertexStreamId,
    pub region: IndexRegion,
}

/// Parts of the current frame, with their parallel per-part tables.
///
/// `parts`, `materials`, `transform_idx` and `palette_offset` always have the
/// same length. Parts of the same node share one entry in
/// `instance_transforms`.
#[derive(Debug, Clone, Default)]
pub struct PartList {
    pub parts: Vec<Part>,
    pub materials: Vec<MaterialId>,
    /// World transform per draw instance, deduplicated per node.
    pub instance_transforms: Vec<Mat4>,
    /// Flattened joint matrices of every skinned node.
    pub rigging_palettes: Vec<Mat4>,
    /// Index in `instance_transforms`, per part.
    pub transform_idx: Vec<u32>,
    /// First joint of the part's palette in `rigging_palettes`, or
    /// [`NO_ENTRY_INDEX`] when the part is not skinned.
    pub palette_offset: Vec<u32>,
}

impl PartList {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.parts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.parts.is_empty()
    }

    /// Adds a world transform to the instance table, returning its index.
    pub fn push_transform(&mut self, transform: Mat4) -> u32 {
        self.instance_transforms.push(transform);
        (self.instance_transforms.len() - 1) as u32
    }

    /// Adds a skinning palette, returning its offset.
    pub fn push_palette(&mut self, palette: &[Mat4]) -> u32 {
        let offset = self.rigging_palettes.len() as u32;
        self.rigging_palettes.extend_from_slice(palette);
        offset
    }

    pub fn push_part(&mut self, part: Part, material: MaterialId, transform_idx: u32, palette_offset: u32) {
        debug_assert!((transform_idx as usize) < self.instance_transforms.len());
        self.parts.push(part);
        self.materials.push(material);
        self.transform_idx.push(transform_idx);
        self.palette_offset.push(palette_offset);
    }

    /// Adds a non-skinned part with its own transform.
    pub fn push_instance(&mut self, part: Part, material: MaterialId, transform: Mat4) {
        let transform_idx = self.push_transform(transform);
        self.push_part(part, material, transform_idx, NO_ENTRY_INDEX);
    }

    /// Checks the parallel-array invariant.
    pub fn assert_consistent(&self) {
        assert!(
            self.parts.len() == self.materials.len()
                && self.parts.len() == self.transform_idx.len()
                && self.parts.len() == self.palette_offset.len(),
            "part list arrays diverged: {} parts, {} materials, {} transform indices, {} palette offsets",
            self.parts.len(),
            self.materials.len(),
            self.transform_idx.len(),
            self.palette_offset.len()
        );
    }
}
