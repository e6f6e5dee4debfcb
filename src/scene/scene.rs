use glam::Mat4;
use slotmap::{SlotMap, new_key_type};
use smallvec::SmallVec;

use crate::resources::bounds::BoundingBox;
use crate::resources::mesh::IndexRegion;
use crate::resources::storage::{MaterialId, Storage, VertexStreamId};
use crate::scene::camera::Camera;
use crate::scene::light::{Lights, LightsData, NO_ENTRY_INDEX};
use crate::scene::part_list::{Part, PartList};

new_key_type! {
    pub struct NodeHandle;
}

/// A region of a vertex stream drawn with one material.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MeshPart {
    pub vertex_stream: VertexStreamId,
    pub region: IndexRegion,
    pub material: MaterialId,
}

#[derive(Debug, Clone)]
pub struct Node {
    pub name: String,
    pub(crate) parent: Option<NodeHandle>,
    pub(crate) children: Vec<NodeHandle>,
    /// Transform relative to the parent.
    pub local: Mat4,
    /// Hidden nodes hide their whole subtree.
    pub visible: bool,
    pub parts: SmallVec<[MeshPart; 2]>,
    /// Joint matrices, in the node's model space, for skinned parts.
    pub palette: Option<Vec<Mat4>>,
}

impl Node {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            parent: None,
            children: Vec::new(),
            local: Mat4::IDENTITY,
            visible: true,
            parts: SmallVec::new(),
            palette: None,
        }
    }

    #[must_use]
    pub fn with_transform(mut self, local: Mat4) -> Self {
        self.local = local;
        self
    }

    #[must_use]
    pub fn with_part(mut self, part: MeshPart) -> Self {
        self.parts.push(part);
        self
    }

    #[must_use]
    pub fn with_palette(mut self, palette: Vec<Mat4>) -> Self {
        self.palette = Some(palette);
        self
    }

    pub fn parent(&self) -> Option<NodeHandle> {
        self.parent
    }

    pub fn children(&self) -> &[NodeHandle] {
        &self.children
    }
}

/// Scene graph: a node hierarchy plus lights.
///
/// The render graph only reads it, through [`Scene::populate_part_list`],
/// [`Scene::bounds`] and [`Scene::lights_in_camera`].
#[derive(Debug, Default)]
pub struct Scene {
    pub nodes: SlotMap<NodeHandle, Node>,
    pub root_nodes: Vec<NodeHandle>,
    pub lights: Lights,
    /// Draws the environment cube map as a skybox when one is registered.
    pub show_skybox: bool,
}

impl Scene {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_node(&mut self, node: Node) -> NodeHandle {
        let handle = self.nodes.insert(node);
        self.root_nodes.push(handle);
        handle
    }

    pub fn add_to_parent(&mut self, mut child: Node, parent: NodeHandle) -> NodeHandle {
        if !self.nodes.contains_key(parent) {
            log::error!("Parent node not found, adding '{}' as a root", child.name);
            return self.add_node(child);
        }
        child.parent = Some(parent);
        let handle = self.nodes.insert(child);
        self.nodes[parent].children.push(handle);
        handle
    }

    /// Removes a node and its subtree.
    pub fn remove_node(&mut self, handle: NodeHandle) {
        let Some(parent) = self.nodes.get(handle).map(Node::parent) else {
            return;
        };
        match parent {
            Some(parent) => {
                if let Some(parent) = self.nodes.get_mut(parent) {
                    parent.children.retain(|&c| c != handle);
                }
            }
            None => self.root_nodes.retain(|&r| r != handle),
        }
        self.remove_subtree(handle);
    }

    fn remove_subtree(&mut self, handle: NodeHandle) {
        if let Some(node) = self.nodes.remove(handle) {
            for child in node.children {
                self.remove_subtree(child);
            }
        }
    }

    pub fn get_node(&self, handle: NodeHandle) -> Option<&Node> {
        self.nodes.get(handle)
    }

    pub fn get_node_mut(&mut self, handle: NodeHandle) -> Option<&mut Node> {
        self.nodes.get_mut(handle)
    }

    /// Flattens the visible hierarchy into this frame's part list.
    ///
    /// Depth-first; each node with parts contributes one world transform,
    /// shared by all its parts, and at most one palette.
    pub fn populate_part_list(&self) -> PartList {
        let mut part_list = PartList::new();
        let mut stack: Vec<(NodeHandle, Mat4)> =
            self.root_nodes.iter().rev().map(|&root| (root, Mat4::IDENTITY)).collect();

        while let Some((handle, parent_world)) = stack.pop() {
            let Some(node) = self.nodes.get(handle) else {
                continue;
            };
            if !node.visible {
                continue;
            }
            let world = parent_world * node.local;

            if !node.parts.is_empty() {
                let transform_idx = part_list.push_transform(world);
                let palette_offset = node
                    .palette
                    .as_deref()
                    .map_or(NO_ENTRY_INDEX, |palette| part_list.push_palette(palette));
                for part in &node.parts {
                    part_list.push_part(
                        Part { vertex_stream: part.vertex_stream, region: part.region },
                        part.material,
                        transform_idx,
                        palette_offset,
                    );
                }
            }

            stack.extend(node.children.iter().rev().map(|&child| (child, world)));
        }

        part_list
    }

    /// World-space bounds of every visible part, from the vertices of each
    /// part's own index region.
    pub fn bounds(&self, part_list: &PartList, storage: &Storage) -> BoundingBox {
        part_list
            .parts
            .iter()
            .zip(&part_list.transform_idx)
            .fold(BoundingBox::EMPTY, |acc, (part, &transform_idx)| {
                let local = storage.region_bounds(part.vertex_stream, part.region);
                acc.union(&local.transform(&part_list.instance_transforms[transform_idx as usize]))
            })
    }

    /// Lights packed for the GPU, optionally moved into camera space.
    pub fn lights_in_camera(&self, camera: &Camera, to_camera_space: bool) -> LightsData {
        let transform = if to_camera_space { camera.view_matrix() } else { Mat4::IDENTITY };
        LightsData::from_lights(&self.lights, transform)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use glam::Vec3;

    fn part(material: u32) -> MeshPart {
        MeshPart {
            vertex_stream: VertexStreamId(0),
            region: IndexRegion { first: 0, count: 36, base_vertex: 0 },
            material: MaterialId(material),
        }
    }

    #[test]
    fn parts_of_a_node_share_one_transform() {
        let mut scene = Scene::new();
        scene.add_node(Node::new("two parts").with_part(part(0)).with_part(part(1)));
        let list = scene.populate_part_list();
        list.assert_consistent();
        assert_eq!(list.len(), 2);
        assert_eq!(list.instance_transforms.len(), 1);
        assert_eq!(list.transform_idx, vec![0, 0]);
        assert_eq!(list.palette_offset, vec![NO_ENTRY_INDEX; 2]);
    }

    #[test]
    fn world_transforms_accumulate_depth_first() {
        let mut scene = Scene::new();
        let parent = scene.add_node(
            Node::new("parent").with_transform(Mat4::from_translation(Vec3::X)).with_part(part(0)),
        );
        scene.add_to_parent(
            Node::new("child").with_transform(Mat4::from_translation(Vec3::Y)).with_part(part(0)),
            parent,
        );
        let hidden = scene.add_node(Node::new("hidden").with_part(part(0)));
        scene.get_node_mut(hidden).unwrap().visible = false;

        let list = scene.populate_part_list();
        assert_eq!(list.len(), 2);
        let child_world = list.instance_transforms[1];
        assert_eq!(child_world.w_axis.truncate(), Vec3::new(1.0, 1.0, 0.0));
    }

    #[test]
    fn skinned_nodes_get_palette_offsets() {
        let mut scene = Scene::new();
        scene.add_node(Node::new("a").with_part(part(0)).with_palette(vec![Mat4::IDENTITY; 3]));
        scene.add_node(Node::new("b").with_part(part(0)).with_palette(vec![Mat4::IDENTITY; 2]));
        let list = scene.populate_part_list();
        assert_eq!(list.palette_offset, vec![0, 3]);
        assert_eq!(list.rigging_palettes.len(), 5);
    }
}
