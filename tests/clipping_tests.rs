//! Triangle Clipping Tests
//!
//! Tests for:
//! - Triangles fully inside, fully outside and straddling the clip box
//! - Exact output of single-plane crossings (one and two vertices outside)
//! - Idempotence: clipping an already clipped triangle changes nothing
//! - Winding preservation and area conservation

use glam::{Vec3, Vec4};

use umbra::renderer::graph::clipping::{PLANE_COUNT, Triangle, clip, clip_to_vec, evaluate_plane};
use umbra::resources::BoundingBox;

const EPSILON: f32 = 1e-4;

fn approx(a: f32, b: f32) -> bool {
    (a - b).abs() < EPSILON
}

fn unit_box() -> BoundingBox {
    BoundingBox::new(Vec3::splat(-1.0), Vec3::ONE)
}

fn point(x: f32, y: f32) -> Vec4 {
    Vec4::new(x, y, 0.0, 1.0)
}

/// Signed area of the projected (`x / w`, `y / w`) triangle.
fn signed_area(triangle: &Triangle) -> f32 {
    let [a, b, c] = triangle.map(|p| p.truncate().truncate() / p.w);
    0.5 * (b - a).perp_dot(c - a)
}

fn assert_inside(triangle: &Triangle, volume: &BoundingBox) {
    for vertex in triangle {
        for plane in 0..PLANE_COUNT {
            assert!(
                evaluate_plane(plane, *vertex, volume) <= EPSILON,
                "vertex {vertex:?} outside plane {plane}"
            );
        }
    }
}

fn assert_same_triangle(lhs: &Triangle, rhs: &Triangle) {
    for (a, b) in lhs.iter().zip(rhs) {
        assert!((*a - *b).abs().max_element() < EPSILON, "{lhs:?} != {rhs:?}");
    }
}

// ============================================================================
// Trivial cases
// ============================================================================

#[test]
fn inside_triangle_is_forwarded_once_unchanged() {
    let triangle = [point(-0.5, -0.5), point(0.5, -0.5), point(0.0, 0.5)];

    let mut calls = 0;
    clip(
        &triangle,
        &unit_box(),
        &mut |clipped: &Triangle| {
            calls += 1;
            assert_eq!(*clipped, triangle);
        },
        0,
        PLANE_COUNT,
    );
    assert_eq!(calls, 1);
}

#[test]
fn outside_triangle_produces_nothing() {
    let right = [point(2.0, 0.0), point(3.0, 0.0), point(2.5, 1.0)];
    assert!(clip_to_vec(&right, &unit_box(), 0, PLANE_COUNT).is_empty());

    // Outside in z only.
    let behind = [
        Vec4::new(0.0, 0.0, 3.0, 1.0),
        Vec4::new(0.5, 0.0, 3.0, 1.0),
        Vec4::new(0.0, 0.5, 3.0, 1.0),
    ];
    assert!(clip_to_vec(&behind, &unit_box(), 0, PLANE_COUNT).is_empty());
}

#[test]
fn skipped_planes_are_not_clipped() {
    let behind = [
        Vec4::new(0.0, 0.0, 3.0, 1.0),
        Vec4::new(0.5, 0.0, 3.0, 1.0),
        Vec4::new(0.0, 0.5, 3.0, 1.0),
    ];
    // X and Y planes only: z is ignored.
    let clipped = clip_to_vec(&behind, &unit_box(), 0, 4);
    assert_eq!(clipped, vec![behind]);
}

// ============================================================================
// Straddling triangles
// ============================================================================

#[test]
fn one_vertex_outside_produces_two_triangles() {
    let triangle = [point(0.0, 0.0), point(2.0, 0.0), point(0.0, 0.5)];
    let clipped = clip_to_vec(&triangle, &unit_box(), 0, PLANE_COUNT);

    assert_eq!(clipped.len(), 2);
    assert_same_triangle(&clipped[0], &[point(0.0, 0.5), point(0.0, 0.0), point(1.0, 0.25)]);
    assert_same_triangle(&clipped[1], &[point(0.0, 0.0), point(1.0, 0.0), point(1.0, 0.25)]);

    let area: f32 = clipped.iter().map(signed_area).sum();
    assert!(approx(area, 0.375), "clipped area {area}");
}

#[test]
fn two_vertices_outside_produce_one_triangle() {
    let triangle = [point(0.0, 0.0), point(2.0, 0.0), point(2.0, 0.5)];
    let clipped = clip_to_vec(&triangle, &unit_box(), 0, PLANE_COUNT);

    assert_eq!(clipped.len(), 1);
    assert_same_triangle(&clipped[0], &[point(1.0, 0.0), point(1.0, 0.25), point(0.0, 0.0)]);
    assert!(approx(signed_area(&clipped[0]), 0.125));
}

#[test]
fn corner_crossing_stays_inside_and_keeps_winding() {
    // Crosses the right and the top planes.
    let triangle = [point(0.0, 0.0), point(3.0, 0.5), point(0.5, 3.0)];
    let clipped = clip_to_vec(&triangle, &unit_box(), 0, PLANE_COUNT);

    assert!(!clipped.is_empty());
    for piece in &clipped {
        assert_inside(piece, &unit_box());
        assert!(signed_area(piece) > -EPSILON, "winding flipped on {piece:?}");
    }
}

#[test]
fn homogeneous_coordinates_are_clipped_after_divide() {
    // Same triangle as above with every vertex scaled by w = 2.
    let triangle = [point(0.0, 0.0), point(2.0, 0.0), point(0.0, 0.5)].map(|p| p * 2.0);
    let clipped = clip_to_vec(&triangle, &unit_box(), 0, PLANE_COUNT);

    assert_eq!(clipped.len(), 2);
    let area: f32 = clipped.iter().map(signed_area).sum();
    assert!(approx(area, 0.375));
}

// ============================================================================
// Idempotence
// ============================================================================

#[test]
fn clipping_twice_is_clipping_once() {
    let volume = unit_box();
    let triangles = [
        [point(0.0, 0.0), point(2.0, 0.0), point(0.0, 0.5)],
        [point(0.0, 0.0), point(2.0, 0.0), point(2.0, 0.5)],
    ];

    for triangle in &triangles {
        for once in clip_to_vec(triangle, &volume, 0, PLANE_COUNT) {
            let twice = clip_to_vec(&once, &volume, 0, PLANE_COUNT);
            assert_eq!(twice.len(), 1, "re-clipping {once:?} split it");
            assert_same_triangle(&twice[0], &once);
        }
    }
}
