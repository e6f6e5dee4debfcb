//! Debug Draw List
//!
//! Per-frame list of colored line segments. Producers (shadow fitting debug
//! toggles, the application) append primitives during the frame; the debug
//! draw pass uploads them as a line list and the graph clears the list
//! afterwards.

use bytemuck::{Pod, Zeroable};
use glam::{Mat4, Vec3, Vec4};

use crate::resources::bounds::BoundingBox;

/// Vertex of the debug line list.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct DebugVertex {
    pub position: [f32; 3],
    pub color: [f32; 4],
}

/// Pairs of box corners forming its 12 edges, with the corner bit layout of
/// [`BoundingBox::corner`].
const BOX_EDGES: [(usize, usize); 12] = [
    (0, 1), (2, 3), (4, 5), (6, 7),
    (0, 2), (1, 3), (4, 6), (5, 7),
    (0, 4), (1, 5), (2, 6), (3, 7),
];

#[derive(Debug, Clone, Default)]
pub struct DebugDrawList {
    vertices: Vec<DebugVertex>,
}

impl DebugDrawList {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.vertices.is_empty()
    }

    /// Number of line segments.
    pub fn line_count(&self) -> usize {
        self.vertices.len() / 2
    }

    pub fn vertices(&self) -> &[DebugVertex] {
        &self.vertices
    }

    pub fn clear(&mut self) {
        self.vertices.clear();
    }

    pub fn add_line(&mut self, from: Vec3, to: Vec3, color: Vec4) {
        let color = color.to_array();
        self.vertices.push(DebugVertex { position: from.to_array(), color });
        self.vertices.push(DebugVertex { position: to.to_array(), color });
    }

    /// The 12 edges of `aabb`, transformed by `transform`.
    pub fn add_box(&mut self, aabb: &BoundingBox, transform: &Mat4, color: Vec4) {
        let corners = aabb.corners().map(|corner| transform.transform_point3(corner));
        self.add_corner_edges(&corners, color);
    }

    /// Frustum whose clip space is mapped to world space by `clip_to_world`.
    ///
    /// Clip-space depth spans `[0, 1]`.
    pub fn add_frustum(&mut self, clip_to_world: &Mat4, color: Vec4) {
        let unit = BoundingBox::new(Vec3::new(-1.0, -1.0, 0.0), Vec3::ONE);
        let corners = unit.corners().map(|corner| clip_to_world.project_point3(corner));
        self.add_corner_edges(&corners, color);
    }

    pub fn add_triangle(&mut self, triangle: &[Vec3; 3], color: Vec4) {
        self.add_line(triangle[0], triangle[1], color);
        self.add_line(triangle[1], triangle[2], color);
        self.add_line(triangle[2], triangle[0], color);
    }

    /// Rectangle centered on `center`, spanned by the unit directions `u`
    /// and `v`, with `subdivisions` inner grid lines along each direction.
    #[allow(clippy::too_many_arguments)]
    pub fn add_plane(
        &mut self,
        center: Vec3,
        u: Vec3,
        v: Vec3,
        subdivisions: (u32, u32),
        size: (f32, f32),
        outline_color: Vec4,
        grid_color: Vec4,
    ) {
        let half_u = u * (size.0 * 0.5);
        let half_v = v * (size.1 * 0.5);
        let corners = [
            center - half_u - half_v,
            center + half_u - half_v,
            center + half_u + half_v,
            center - half_u + half_v,
        ];
        for i in 0..4 {
            self.add_line(corners[i], corners[(i + 1) % 4], outline_color);
        }

        for i in 1..=subdivisions.0 {
            let t = i as f32 / (subdivisions.0 + 1) as f32;
            let offset = -half_u + u * (size.0 * t);
            self.add_line(center + offset - half_v, center + offset + half_v, grid_color);
        }
        for i in 1..=subdivisions.1 {
            let t = i as f32 / (subdivisions.1 + 1) as f32;
            let offset = -half_v + v * (size.1 * t);
            self.add_line(center + offset - half_u, center + offset + half_u, grid_color);
        }
    }

    fn add_corner_edges(&mut self, corners: &[Vec3; 8], color: Vec4) {
        for (a, b) in BOX_EDGES {
            self.add_line(corners[a], corners[b], color);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn frustum_of_identity_spans_unit_depth() {
        let mut list = DebugDrawList::new();
        list.add_frustum(&Mat4::IDENTITY, Vec4::ONE);
        assert_eq!(list.line_count(), 12);
        let min_z = list.vertices().iter().map(|v| v.position[2]).fold(f32::INFINITY, f32::min);
        assert_eq!(min_z, 0.0);
    }

    #[test]
    fn plane_draws_outline_and_grid() {
        let mut list = DebugDrawList::new();
        list.add_plane(Vec3::ZERO, Vec3::X, Vec3::Y, (3, 3), (2.0, 2.0), Vec4::ONE, Vec4::ONE);
        assert_eq!(list.line_count(), 4 + 6);
    }
}
