//! Shadow Fitting Tests
//!
//! Tests for:
//! - Rectangle intersection (idempotence, disjoint inputs)
//! - Light basis construction, including the vertical-light fallback
//! - Depth tightening against the clipped scene box
//! - Cascade partition coverage of the camera depth range
//! - Light frustum fitting with and without scene tightening
//! - Shadow map layer assignment of the shadow-casting lights

use glam::{Mat3, Mat4, Vec2, Vec3};

use umbra::renderer::ShadowControls;
use umbra::renderer::graph::passes::compute_shadow_frame;
use umbra::renderer::graph::shadow_utils::*;
use umbra::resources::{BoundingBox, Rectangle};
use umbra::scene::light::{CASCADES_PER_SHADOW, MAX_LIGHTS, MAX_SHADOW_LIGHTS, NO_ENTRY_INDEX};
use umbra::scene::{Camera, DirectionalLight, Lights};

const EPSILON: f32 = 1e-4;

fn approx(a: f32, b: f32) -> bool {
    (a - b).abs() < EPSILON
}

fn camera() -> Camera {
    Camera::new_perspective(60.0, 16.0 / 9.0, 0.1, 100.0).looking_at(
        Vec3::new(0.0, 5.0, 20.0),
        Vec3::ZERO,
        Vec3::Y,
    )
}

/// A box the camera above sees entirely.
fn scene_box() -> BoundingBox {
    BoundingBox::new(Vec3::splat(-2.0), Vec3::splat(2.0))
}

fn untightened_controls() -> ShadowControls {
    ShadowControls {
        tighten_light_frustum_xy_to_scene: false,
        move_frustum_texel_increment: false,
        ..ShadowControls::default()
    }
}

fn assert_same_rectangle(lhs: &Rectangle, rhs: &Rectangle, tolerance: f32) {
    let close = |a: Vec2, b: Vec2| (a - b).abs().max_element() <= tolerance;
    assert!(
        close(lhs.origin, rhs.origin) && close(lhs.dimension, rhs.dimension),
        "{lhs:?} != {rhs:?}"
    );
}

fn assert_orthonormal(m: &Mat3) {
    let rows = [m.row(0), m.row(1), m.row(2)];
    for (i, a) in rows.iter().enumerate() {
        assert!(approx(a.length(), 1.0), "row {i} has length {}", a.length());
        for b in &rows[i + 1..] {
            assert!(approx(a.dot(*b), 0.0), "rows {a} and {b} are not perpendicular");
        }
    }
}

/// Degenerate extents and empty scenes are reported through `log`.
fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

fn lights(casters: &[bool]) -> Lights {
    init_logging();
    Lights {
        directional: casters
            .iter()
            .map(|&casts| {
                let light = DirectionalLight::new(Vec3::new(-1.0, -1.0, -0.5), Vec3::ONE);
                if casts { light.with_shadows() } else { light }
            })
            .collect(),
        ..Lights::default()
    }
}

// ============================================================================
// intersect Tests
// ============================================================================

#[test]
fn intersect_is_idempotent() {
    let a = Rectangle::new(Vec2::new(-1.0, 0.0), Vec2::new(4.0, 2.0));
    let b = Rectangle::new(Vec2::new(1.0, -1.0), Vec2::new(2.0, 5.0));

    assert_eq!(intersect(&a, &a), a);
    let once = intersect(&a, &b);
    assert_eq!(intersect(&once, &b), once);
    assert_eq!(intersect(&once, &a), once);
    assert_eq!(once, Rectangle::from_corners(Vec2::new(1.0, 0.0), Vec2::new(3.0, 2.0)));
}

#[test]
fn intersect_of_disjoint_rectangles_is_empty() {
    let a = Rectangle::new(Vec2::ZERO, Vec2::ONE);
    let b = Rectangle::new(Vec2::new(3.0, 0.5), Vec2::ONE);

    let r = intersect(&a, &b);
    assert_eq!(r.area(), 0.0);
    assert_eq!(r.dimension, Vec2::ZERO);
    assert_eq!(r.origin, Vec2::new(3.0, 0.5));
}

// ============================================================================
// align_minus_z Tests
// ============================================================================

#[test]
fn gaze_maps_to_minus_z() {
    let gaze = Vec3::new(-1.0, -1.0, -0.5).normalize();
    let m = align_minus_z(gaze);
    assert_orthonormal(&m);
    assert!((m * gaze - Vec3::NEG_Z).length() < EPSILON);
}

#[test]
fn vertical_gaze_uses_fallback_up() {
    // Straight down: the +Y up vector is anti-parallel to the gaze.
    let m = align_minus_z(Vec3::NEG_Y);
    assert_orthonormal(&m);
    assert!((m.row(2) - Vec3::Y).length() < EPSILON);
    assert!(m.determinant() > 0.0);

    let up = align_minus_z(Vec3::Y);
    assert_orthonormal(&up);
}

// ============================================================================
// tighten_near_far Tests
// ============================================================================

#[test]
fn tighten_whole_box_gives_box_depth() {
    let rect = Rectangle::new(Vec2::splat(-10.0), Vec2::splat(20.0));
    let range = tighten_near_far(&scene_box(), &Mat3::IDENTITY, &rect, None);
    let (z_min, z_max) = range.expect("box inside the rectangle");
    assert!(approx(z_min, -2.0));
    assert!(approx(z_max, 2.0));
}

#[test]
fn tighten_degenerate_box_gives_equal_planes() {
    let point = BoundingBox::new(Vec3::new(1.0, 2.0, 3.0), Vec3::new(1.0, 2.0, 3.0));
    let rect = Rectangle::new(Vec2::splat(-10.0), Vec2::splat(20.0));

    let (z_min, z_max) = tighten_near_far(&point, &Mat3::IDENTITY, &rect, None).expect("point inside");
    assert!(approx(z_min, 3.0));
    assert_eq!(z_min, z_max);
}

#[test]
fn tighten_outside_rectangle_gives_nothing() {
    let rect = Rectangle::new(Vec2::splat(10.0), Vec2::ONE);
    assert_eq!(tighten_near_far(&scene_box(), &Mat3::IDENTITY, &rect, None), None);
}

#[test]
fn tighten_partial_rectangle_clips_sloped_box() {
    // Rotated 45° around Y: the box's z range depends on x in light space.
    let rotation = Mat3::from_rotation_y(45f32.to_radians());
    let full = Rectangle::new(Vec2::splat(-10.0), Vec2::splat(20.0));
    let half = Rectangle::new(Vec2::new(1.0, -10.0), Vec2::new(9.0, 20.0));

    let (full_min, full_max) = tighten_near_far(&scene_box(), &rotation, &full, None).expect("inside");
    let (half_min, half_max) = tighten_near_far(&scene_box(), &rotation, &half, None).expect("inside");
    assert!(half_min >= full_min - EPSILON && half_max <= full_max + EPSILON);
    assert!(half_max - half_min < full_max - full_min);
}

// ============================================================================
// z_partition_camera_frustum Tests
// ============================================================================

#[test]
fn cascades_cover_the_camera_depth_range() {
    let camera = camera();
    let partition = z_partition_camera_frustum(&camera, &ShadowControls::default(), None);
    let far_depths = partition.far_depths;

    assert!(far_depths[0] > 0.1);
    for i in 1..far_depths.len() {
        assert!(far_depths[i] > far_depths[i - 1], "far depths not increasing: {far_depths:?}");
    }
    assert!(approx(far_depths[far_depths.len() - 1], 100.0));
}

#[test]
fn cascade_frusta_are_contiguous() {
    let camera = Camera::new_perspective(60.0, 1.0, 0.1, 100.0).looking_at(Vec3::ZERO, Vec3::NEG_Z, Vec3::Y);
    let partition = z_partition_camera_frustum(&camera, &ShadowControls::default(), None);

    // First cascade starts at the camera near plane.
    let near = partition.view_projections[0].project_point3(Vec3::new(0.0, 0.0, -0.1));
    assert!(approx(near.z, 0.0));

    for (cascade, vp) in partition.view_projections.iter().enumerate() {
        let far = vp.project_point3(Vec3::new(0.0, 0.0, -partition.far_depths[cascade]));
        assert!(approx(far.z, 1.0), "cascade {cascade} ends at depth {}", far.z);
        if cascade + 1 < partition.view_projections.len() {
            let next = partition.view_projections[cascade + 1];
            let start = next.project_point3(Vec3::new(0.0, 0.0, -partition.far_depths[cascade]));
            assert!(approx(start.z, 0.0), "cascade {} does not start where {cascade} ends", cascade + 1);
        }
    }
}

// ============================================================================
// fit_light_frustum Tests
// ============================================================================

#[test]
fn untightened_rectangle_is_camera_side_bounds() {
    let camera = camera();
    let controls = untightened_controls();
    let world_to_light = align_minus_z(Vec3::new(-1.0, -1.0, -0.5));
    let camera_vp = camera.view_projection();

    let frustum = fit_light_frustum(&world_to_light, &scene_box(), &camera_vp, &controls, 2048, None);
    let camera_sides = frustum_side_bounds(&(Mat4::from_mat3(world_to_light) * camera_vp.inverse()));
    assert_eq!(frustum.rectangle, camera_sides);

    // Tightening shrinks it to the scene.
    let tightened = ShadowControls { tighten_light_frustum_xy_to_scene: true, ..controls };
    let fitted = fit_light_frustum(&world_to_light, &scene_box(), &camera_vp, &tightened, 2048, None);
    assert!(camera_sides.contains(&fitted.rectangle));
    assert!(fitted.rectangle.area() < camera_sides.area());
}

#[test]
fn fitted_projection_contains_visible_scene() {
    let camera = camera();
    let controls = ShadowControls { move_frustum_texel_increment: false, ..ShadowControls::default() };
    let world_to_light = align_minus_z(Vec3::new(-1.0, -1.0, -0.5));

    let projection = compute_light_projection(
        &world_to_light,
        &scene_box(),
        &camera.view_projection(),
        &controls,
        2048,
        None,
    );
    let light_vp = projection * Mat4::from_mat3(world_to_light);

    for corner in scene_box().corners() {
        let clip = light_vp.project_point3(corner);
        assert!(clip.x.abs() <= 1.0 + EPSILON && clip.y.abs() <= 1.0 + EPSILON, "corner {corner} at {clip}");
        assert!(clip.z >= -EPSILON && clip.z <= 1.0 + EPSILON, "corner {corner} depth {}", clip.z);
    }
}

#[test]
fn scene_inside_camera_fits_to_scene_rectangle() {
    let camera = camera();
    let world_to_light = align_minus_z(Vec3::new(-1.0, -1.0, -0.5));
    let camera_vp = camera.view_projection();

    // Every scene corner is in view.
    for corner in scene_box().corners() {
        let clip = camera_vp.project_point3(corner);
        assert!(clip.x.abs() < 1.0 && clip.y.abs() < 1.0, "corner {corner} out of view at {clip}");
        assert!(clip.z > 0.0 && clip.z < 1.0);
    }

    let scene_sides = scene_box().rotate(&world_to_light).front_rectangle();

    let exact = ShadowControls { move_frustum_texel_increment: false, ..ShadowControls::default() };
    let fitted = fit_light_frustum(&world_to_light, &scene_box(), &camera_vp, &exact, 2048, None).rectangle;
    assert_same_rectangle(&fitted, &scene_sides, 1e-4);

    // With snapping, the scene rectangle moved onto the texel grid. Rounding
    // of the grid origin may land one texel apart.
    let map_size = 2048;
    let units_per_texel = scene_sides.dimension / map_size as f32;
    let snapped = Rectangle::new(
        (scene_sides.origin / units_per_texel).floor() * units_per_texel,
        (scene_sides.dimension / units_per_texel).floor() * units_per_texel,
    );
    let fitted =
        fit_light_frustum(&world_to_light, &scene_box(), &camera_vp, &ShadowControls::default(), map_size, None);
    assert_same_rectangle(&fitted.rectangle, &snapped, units_per_texel.max_element() * 1.01);
}

#[test]
fn camera_inside_scene_fits_to_camera_sides() {
    let camera = camera();
    let world_to_light = align_minus_z(Vec3::new(-1.0, -1.0, -0.5));
    let camera_vp = camera.view_projection();
    let huge_scene = BoundingBox::new(Vec3::splat(-1000.0), Vec3::splat(1000.0));

    let camera_sides = frustum_side_bounds(&(Mat4::from_mat3(world_to_light) * camera_vp.inverse()));
    let scene_sides = huge_scene.rotate(&world_to_light).front_rectangle();
    assert!(scene_sides.contains(&camera_sides));

    let controls = ShadowControls { move_frustum_texel_increment: false, ..ShadowControls::default() };
    let fitted = fit_light_frustum(&world_to_light, &huge_scene, &camera_vp, &controls, 2048, None);
    assert_same_rectangle(&fitted.rectangle, &camera_sides, 1e-3);
}

#[test]
fn texel_snapped_frustum_is_not_degenerate() {
    let camera = camera();
    let world_to_light = align_minus_z(Vec3::new(-1.0, -1.0, -0.5));
    let controls = ShadowControls::default();
    let frustum = fit_light_frustum(&world_to_light, &scene_box(), &camera.view_projection(), &controls, 1024, None);

    assert!(frustum.rectangle.area() > 0.0);
    assert!(frustum.depth > 0.0);
}

// ============================================================================
// compute_shadow_frame Tests
// ============================================================================

#[test]
fn cascaded_casters_get_four_layers_each() {
    let frame = compute_shadow_frame(
        &lights(&[true, false, true]),
        &scene_box(),
        &camera(),
        &ShadowControls::default(),
        1024,
        None,
    );

    assert_eq!(frame.shadow_map_indices, vec![0, NO_ENTRY_INDEX, 4]);
    assert_eq!(frame.layer_count(), 8);
    assert_eq!(frame.light_view_projection.count, 8);
    assert_eq!(frame.cascade.use_cascades, 1);
    assert!(approx(frame.cascade.far_depths[3], 100.0));
}

#[test]
fn single_maps_get_one_layer_each() {
    let controls = ShadowControls { use_cascades: false, ..ShadowControls::default() };
    let frame = compute_shadow_frame(&lights(&[false, true, true]), &scene_box(), &camera(), &controls, 2048, None);

    assert_eq!(frame.shadow_map_indices, vec![NO_ENTRY_INDEX, 0, 1]);
    assert_eq!(frame.layer_count(), 2);
    assert_eq!(frame.cascade.use_cascades, 0);
}

#[test]
fn no_caster_or_empty_scene_renders_no_layer() {
    let controls = ShadowControls::default();

    let unlit = compute_shadow_frame(&lights(&[false, false]), &scene_box(), &camera(), &controls, 1024, None);
    assert_eq!(unlit.layer_count(), 0);
    assert_eq!(unlit.shadow_map_indices, vec![NO_ENTRY_INDEX; 2]);

    let empty = compute_shadow_frame(&lights(&[true]), &BoundingBox::EMPTY, &camera(), &controls, 1024, None);
    assert_eq!(empty.layer_count(), 0);
    assert_eq!(empty.shadow_map_indices, vec![NO_ENTRY_INDEX]);
}

#[test]
fn casters_past_the_light_limit_get_no_layer() {
    let mut casters = vec![false; MAX_LIGHTS];
    casters[0] = true;
    casters.push(true);
    let frame = compute_shadow_frame(
        &lights(&casters),
        &scene_box(),
        &camera(),
        &ShadowControls::default(),
        1024,
        None,
    );

    assert_eq!(frame.shadow_map_indices.len(), MAX_LIGHTS);
    assert_eq!(frame.shadow_map_indices[0], 0);
    assert_eq!(frame.layer_count(), CASCADES_PER_SHADOW);
}

#[test]
#[should_panic(expected = "shadow-casting lights exceed")]
fn casters_past_the_light_limit_still_count_toward_capacity() {
    let mut casters = vec![false; MAX_LIGHTS];
    casters[..MAX_SHADOW_LIGHTS].fill(true);
    casters.push(true);
    let _ = compute_shadow_frame(
        &lights(&casters),
        &scene_box(),
        &camera(),
        &ShadowControls::default(),
        1024,
        None,
    );
}

#[test]
#[should_panic(expected = "shadow-casting lights exceed")]
fn too_many_casters_panics() {
    let casters = vec![true; MAX_SHADOW_LIGHTS + 1];
    let _ = compute_shadow_frame(
        &lights(&casters),
        &scene_box(),
        &camera(),
        &ShadowControls::default(),
        1024,
        None,
    );
}
