//! Axis-aligned volumes and rectangles shared by the scene and the shadow
//! fitting code.

use glam::{Mat3, Mat4, Vec2, Vec3};

/// Axis-aligned bounding box.
///
/// An "empty" box (see [`BoundingBox::EMPTY`]) has `min > max` on every axis
/// and is the identity for [`BoundingBox::union`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BoundingBox {
    pub min: Vec3,
    pub max: Vec3,
}

impl BoundingBox {
    pub const EMPTY: Self = Self {
        min: Vec3::splat(f32::INFINITY),
        max: Vec3::splat(f32::NEG_INFINITY),
    };

    /// Number of corners, see [`BoundingBox::corner`].
    pub const CORNER_COUNT: usize = 8;

    #[must_use]
    pub fn new(min: Vec3, max: Vec3) -> Self {
        Self { min, max }
    }

    #[must_use]
    pub fn from_position_size(position: Vec3, size: Vec3) -> Self {
        Self { min: position, max: position + size }
    }

    #[must_use]
    pub fn from_points(points: impl IntoIterator<Item = Vec3>) -> Self {
        points.into_iter().fold(Self::EMPTY, |acc, p| Self {
            min: acc.min.min(p),
            max: acc.max.max(p),
        })
    }

    pub fn is_empty(&self) -> bool {
        self.min.cmpgt(self.max).any()
    }

    pub fn center(&self) -> Vec3 { (self.min + self.max) * 0.5 }
    pub fn size(&self) -> Vec3 { self.max - self.min }
    pub fn depth(&self) -> f32 { self.max.z - self.min.z }

    #[must_use]
    pub fn union(&self, other: &BoundingBox) -> BoundingBox {
        BoundingBox {
            min: self.min.min(other.min),
            max: self.max.max(other.max),
        }
    }

    /// Corner `index` in `0..8`: bit 0 selects max X, bit 1 max Y, bit 2 max Z.
    pub fn corner(&self, index: usize) -> Vec3 {
        debug_assert!(index < Self::CORNER_COUNT);
        Vec3::new(
            if index & 1 == 0 { self.min.x } else { self.max.x },
            if index & 2 == 0 { self.min.y } else { self.max.y },
            if index & 4 == 0 { self.min.z } else { self.max.z },
        )
    }

    pub fn corners(&self) -> [Vec3; 8] {
        std::array::from_fn(|index| self.corner(index))
    }

    /// Border value for a clipping plane, in the order l, r, b, t, z-min, z-max.
    pub fn border(&self, plane: usize) -> f32 {
        match plane {
            0 => self.min.x,
            1 => self.max.x,
            2 => self.min.y,
            3 => self.max.y,
            4 => self.min.z,
            5 => self.max.z,
            _ => panic!("box border index {plane} out of range"),
        }
    }

    /// Bounding box of the 8 transformed corners.
    #[must_use]
    pub fn transform(&self, matrix: &Mat4) -> Self {
        Self::from_points(self.corners().map(|corner| matrix.transform_point3(corner)))
    }

    /// Bounding box of the 8 rotated corners.
    #[must_use]
    pub fn rotate(&self, rotation: &Mat3) -> Self {
        Self::from_points(self.corners().map(|corner| *rotation * corner))
    }

    /// The XY face of the box, dropping Z.
    pub fn front_rectangle(&self) -> Rectangle {
        Rectangle::new(self.min.truncate(), (self.max - self.min).truncate())
    }
}

/// 2D axis-aligned rectangle, defined by its lower-left origin and dimension.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Rectangle {
    pub origin: Vec2,
    pub dimension: Vec2,
}

impl Rectangle {
    pub const ZERO: Self = Self { origin: Vec2::ZERO, dimension: Vec2::ZERO };

    #[must_use]
    pub fn new(origin: Vec2, dimension: Vec2) -> Self {
        Self { origin, dimension }
    }

    #[must_use]
    pub fn from_corners(low: Vec2, high: Vec2) -> Self {
        Self { origin: low, dimension: high - low }
    }

    pub fn width(&self) -> f32 { self.dimension.x }
    pub fn height(&self) -> f32 { self.dimension.y }
    pub fn area(&self) -> f32 { self.dimension.x * self.dimension.y }
    pub fn top_right(&self) -> Vec2 { self.origin + self.dimension }
    pub fn center(&self) -> Vec2 { self.origin + self.dimension * 0.5 }

    pub fn contains(&self, other: &Rectangle) -> bool {
        self.origin.cmple(other.origin).all() && other.top_right().cmple(self.top_right()).all()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn corner_bits_select_max_components() {
        let aabb = BoundingBox::new(Vec3::ZERO, Vec3::new(1.0, 2.0, 3.0));
        assert_eq!(aabb.corner(0), Vec3::ZERO);
        assert_eq!(aabb.corner(1), Vec3::new(1.0, 0.0, 0.0));
        assert_eq!(aabb.corner(2), Vec3::new(0.0, 2.0, 0.0));
        assert_eq!(aabb.corner(4), Vec3::new(0.0, 0.0, 3.0));
        assert_eq!(aabb.corner(7), Vec3::new(1.0, 2.0, 3.0));
    }

    #[test]
    fn empty_box_is_union_identity() {
        let aabb = BoundingBox::new(Vec3::splat(-1.0), Vec3::ONE);
        assert!(BoundingBox::EMPTY.is_empty());
        assert_eq!(BoundingBox::EMPTY.union(&aabb), aabb);
    }
}
