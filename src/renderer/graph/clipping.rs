//! Homogeneous triangle clipping
//!
//! Clips triangles expressed in homogeneous coordinates against an
//! axis-aligned box whose borders are interpreted in the same space
//! (`x / w` is compared to the left and right borders, and so on).
//!
//! Planes are indexed in the order left, right, bottom, top, z-min, z-max.
//! Z uses the box's min/max rather than near/far because which one is the
//! near plane depends on handedness.
//!
//! Each plane splits a triangle into zero, one or two triangles
//! (Sutherland-Hodgman restricted to triangles): a quad produced by a plane
//! crossing is split along one diagonal, and the pieces are recursively
//! clipped against the remaining planes.

use glam::Vec4;

use crate::resources::bounds::BoundingBox;

/// Three homogeneous positions.
pub type Triangle = [Vec4; 3];

/// Number of planes of a clipping box.
pub const PLANE_COUNT: usize = 6;

/// Signed distance of `position` to plane `plane` of `volume`.
///
/// Negative (or zero) means inside.
#[inline]
pub fn evaluate_plane(plane: usize, position: Vec4, volume: &BoundingBox) -> f32 {
    let border = volume.border(plane);
    match plane {
        0 => -position.x + border * position.w,
        1 => position.x - border * position.w,
        2 => -position.y + border * position.w,
        3 => position.y - border * position.w,
        4 => -position.z + border * position.w,
        5 => position.z - border * position.w,
        _ => unreachable!("plane index {plane} out of range"),
    }
}

/// Two plane evaluations are on the same side when both are strictly
/// outside (`> 0`) or both are inside (`<= 0`).
///
/// A vertex lying exactly on the plane is therefore grouped with the inside
/// vertices, never with an outside one.
#[inline]
pub fn on_same_side(lhs: f32, rhs: f32) -> bool {
    (lhs > 0.0) == (rhs > 0.0)
}

/// Parameter `t` along `a + t * (b - a)` where the segment crosses `plane`.
#[inline]
pub fn solve_intersection(plane: usize, a: Vec4, b: Vec4, volume: &BoundingBox) -> f32 {
    let boundary = volume.border(plane);
    let axis = plane / 2;
    (boundary * a.w - a[axis]) / ((b[axis] - a[axis]) - boundary * (b.w - a.w))
}

/// Minimum of component `axis` over the three vertices.
pub fn min_for_component(axis: usize, triangle: &Triangle) -> f32 {
    triangle[0][axis].min(triangle[1][axis]).min(triangle[2][axis])
}

/// Maximum of component `axis` over the three vertices.
pub fn max_for_component(axis: usize, triangle: &Triangle) -> f32 {
    triangle[0][axis].max(triangle[1][axis]).max(triangle[2][axis])
}

/// Clips `triangle` against planes `begin_plane..end_plane` of `volume`.
///
/// `on_clipped` is invoked once per surviving triangle. A triangle entirely
/// inside is forwarded unchanged; one entirely outside any plane produces
/// nothing. Winding is preserved: vertices are only ever rotated.
pub fn clip<F>(
    triangle: &Triangle,
    volume: &BoundingBox,
    on_clipped: &mut F,
    begin_plane: usize,
    end_plane: usize,
) where
    F: FnMut(&Triangle),
{
    debug_assert!(begin_plane <= end_plane && end_plane <= PLANE_COUNT);

    for plane in begin_plane..end_plane {
        let mut fa = evaluate_plane(plane, triangle[0], volume);
        let mut fb = evaluate_plane(plane, triangle[1], volume);
        let mut fc = evaluate_plane(plane, triangle[2], volume);

        if fa > 0.0 && fb > 0.0 && fc > 0.0 {
            return;
        }
        if fa <= 0.0 && fb <= 0.0 && fc <= 0.0 {
            continue;
        }

        let [mut a, mut b, mut c] = *triangle;

        // Rotate so that `c` is alone on its side of the plane.
        if on_same_side(fa, fc) {
            // b is alone: (a, b, c) <- (c, a, b)
            (a, b, c) = (c, a, b);
            (fa, fb, fc) = (fc, fa, fb);
        } else if on_same_side(fb, fc) {
            // a is alone: (a, b, c) <- (b, c, a)
            (a, b, c) = (b, c, a);
            (fa, fb, fc) = (fb, fc, fa);
        }

        debug_assert!(
            (fc <= 0.0 && fa > 0.0 && fb > 0.0) || (fc > 0.0 && fa <= 0.0 && fb <= 0.0),
            "vertex c must be alone on one side of plane {plane}"
        );

        let t_ac = solve_intersection(plane, a, c, volume);
        let t_bc = solve_intersection(plane, b, c, volume);
        debug_assert!(
            (0.0..=1.0).contains(&t_ac) && (0.0..=1.0).contains(&t_bc),
            "intersection parameters out of segment: {t_ac}, {t_bc}"
        );

        let vertex_ac = a + t_ac * (c - a);
        let vertex_bc = b + t_bc * (c - b);

        if fc <= 0.0 {
            clip(&[vertex_ac, vertex_bc, c], volume, on_clipped, plane + 1, end_plane);
        } else {
            clip(&[a, b, vertex_ac], volume, on_clipped, plane + 1, end_plane);
            clip(&[b, vertex_bc, vertex_ac], volume, on_clipped, plane + 1, end_plane);
        }
        return;
    }

    on_clipped(triangle);
}

/// Convenience wrapper collecting the clipped triangles.
pub fn clip_to_vec(
    triangle: &Triangle,
    volume: &BoundingBox,
    begin_plane: usize,
    end_plane: usize,
) -> Vec<Triangle> {
    let mut clipped = Vec::new();
    clip(triangle, volume, &mut |t: &Triangle| clipped.push(*t), begin_plane, end_plane);
    clipped
}

#[cfg(test)]
mod tests {
    use super::*;
    use glam::Vec3;

    fn unit_volume() -> BoundingBox {
        BoundingBox::new(Vec3::splat(-1.0), Vec3::ONE)
    }

    #[test]
    fn same_side_groups_zero_with_inside() {
        assert!(on_same_side(0.0, -1.0));
        assert!(on_same_side(0.0, 0.0));
        assert!(on_same_side(2.0, 3.0));
        assert!(!on_same_side(0.0, 1.0));
        assert!(!on_same_side(-1.0, 1.0));
    }

    #[test]
    fn intersection_respects_homogeneous_w() {
        // x/w crosses 1.0 halfway between x=0 (w=1) and x=4 (w=2).
        let a = Vec4::new(0.0, 0.0, 0.0, 1.0);
        let b = Vec4::new(4.0, 0.0, 0.0, 2.0);
        let t = solve_intersection(1, a, b, &unit_volume());
        let p = a + t * (b - a);
        assert!((p.x / p.w - 1.0).abs() < 1e-6);
    }

    #[test]
    fn rotation_preserves_winding() {
        let tri = [
            Vec4::new(-0.5, -0.5, 0.0, 1.0),
            Vec4::new(3.0, -0.5, 0.0, 1.0),
            Vec4::new(-0.5, 0.5, 0.0, 1.0),
        ];
        let normal_z = |t: &Triangle| {
            let e1 = (t[1] - t[0]).truncate();
            let e2 = (t[2] - t[0]).truncate();
            e1.cross(e2).z
        };
        for out in clip_to_vec(&tri, &unit_volume(), 0, 4) {
            assert!(normal_z(&out) > 0.0);
        }
    }
}
