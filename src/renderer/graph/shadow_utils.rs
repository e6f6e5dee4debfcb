//! Shadow Utilities
//!
//! Pure math for fitting directional light shadow frusta, kept apart from the
//! shadow pass for reuse and testability.
//!
//! # Conventions
//!
//! - Column vectors: a world-to-light-clip matrix is `projection * orientation`.
//! - Light space is right-handed and the light looks down -Z. In a light-space
//!   AABB, `min.z` is the position of the far plane and `max.z` the near plane.
//! - Clip-space depth spans `[0, 1]`, so a frustum is the image of the unit
//!   box `[-1, 1] x [-1, 1] x [0, 1]`.
//! - Camera near and far are positive distances along the view direction.
//!
//! # Provided Functions
//!
//! - [`frustum_side_bounds`]: light-space XY footprint of a frustum
//! - [`intersect`]: rectangle intersection
//! - [`align_minus_z`]: world-to-light orientation of a directional light
//! - [`tighten_near_far`]: depth range of the scene triangles inside a rectangle
//! - [`compute_light_projection`]: tight orthographic projection of a light
//! - [`z_partition_camera_frustum`]: cascade sub-frusta

use glam::{Mat3, Mat4, Vec2, Vec3, Vec4};

use super::clipping::{Triangle, clip, max_for_component, min_for_component};
use super::debug_draw::DebugDrawList;
use crate::renderer::settings::ShadowControls;
use crate::resources::bounds::{BoundingBox, Rectangle};
use crate::scene::camera::Camera;
use crate::scene::light::CASCADES_PER_SHADOW;

/// Indices of the box corners tessellating its 6 faces into 12 triangles.
const BOX_TRIANGLES: [usize; 36] = [
    0, 1, 2, 1, 2, 3, // Z-min
    4, 5, 6, 5, 6, 7, // Z-max
    0, 2, 4, 2, 4, 6, // Left
    1, 3, 5, 3, 5, 7, // Right
    0, 1, 4, 1, 4, 5, // Bottom
    2, 3, 6, 3, 6, 7, // Top
];

/// Smallest light frustum extent, keeping degenerate projections invertible.
const MIN_FRUSTUM_EXTENT: f32 = 1.0e-4;

/// Tolerance when comparing the tightened depth range to the scene's.
const DEPTH_TOLERANCE: f32 = 1.0e-5;

/// Colors of the cascades in debug drawings.
pub const CASCADE_COLORS: [Vec3; CASCADES_PER_SHADOW] = [
    Vec3::new(0.894, 0.102, 0.110),
    Vec3::new(0.216, 0.494, 0.722),
    Vec3::new(0.302, 0.686, 0.290),
    Vec3::new(0.596, 0.306, 0.639),
];

/// Color of the whole camera frustum in debug drawings.
pub const CAMERA_FRUSTUM_COLOR: Vec3 = Vec3::new(0.9, 0.9, 0.9);

/// Debug drawing target of the fitting functions.
pub struct FittingDebug<'a> {
    pub list: &'a mut DebugDrawList,
    pub view_frustum_color: Vec3,
    pub light_color: Vec3,
}

// ============================================================================
// Rectangles
// ============================================================================

/// Tight light-space XY rectangle of the frustum whose clip space maps to
/// light space through `frustum_clip_to_light`.
#[must_use]
pub fn frustum_side_bounds(frustum_clip_to_light: &Mat4) -> Rectangle {
    let unit = BoundingBox::new(Vec3::new(-1.0, -1.0, 0.0), Vec3::ONE);
    let (low, high) = unit.corners().iter().fold(
        (Vec2::splat(f32::INFINITY), Vec2::splat(f32::NEG_INFINITY)),
        |(low, high), corner| {
            let light = frustum_clip_to_light.project_point3(*corner).truncate();
            (low.min(light), high.max(light))
        },
    );
    Rectangle::from_corners(low, high)
}

/// Intersection of two rectangles.
///
/// Disjoint rectangles produce a zero dimension, at the origin the
/// intersection would have had.
#[must_use]
pub fn intersect(lhs: &Rectangle, rhs: &Rectangle) -> Rectangle {
    let top_right = lhs.top_right().min(rhs.top_right());
    let origin = lhs.origin.max(rhs.origin);
    let dimension = top_right - origin;

    if dimension.x <= 0.0 || dimension.y <= 0.0 {
        Rectangle::new(origin, Vec2::ZERO)
    } else {
        Rectangle::new(origin, dimension)
    }
}

// ============================================================================
// Light orientation
// ============================================================================

/// Rotation from world space to a frame whose -Z axis is `gaze_direction`.
///
/// The up vector is +Y, except when the gaze is nearly vertical where -Z is
/// used to keep the basis well defined.
#[must_use]
pub fn align_minus_z(gaze_direction: Vec3) -> Mat3 {
    let gaze = gaze_direction.normalize();
    let up = if gaze.dot(Vec3::Y).abs() > 0.9 { Vec3::NEG_Z } else { Vec3::Y };

    let w = -gaze;
    let u = up.cross(w).normalize();
    let v = w.cross(u);

    // Rows are the light axes expressed in world space.
    Mat3::from_cols(u, v, w).transpose()
}

// ============================================================================
// Depth fitting
// ============================================================================

/// Light-space depth range `(z_min, z_max)` of the parts of `scene_aabb`
/// that fall inside `rect_light`.
///
/// The box is tessellated into 12 triangles, rotated to light space by
/// `box_to_light` and clipped on the X and Y planes only. Returns `None`
/// when nothing of the box lies inside the rectangle.
pub fn tighten_near_far(
    scene_aabb: &BoundingBox,
    box_to_light: &Mat3,
    rect_light: &Rectangle,
    mut debug: Option<&mut FittingDebug<'_>>,
) -> Option<(f32, f32)> {
    let corners_light = scene_aabb.corners().map(|corner| (*box_to_light * corner).extend(1.0));

    // Z planes are never evaluated, a zero depth is fine.
    let clipping_volume = BoundingBox::from_position_size(
        rect_light.origin.extend(0.0),
        rect_light.dimension.extend(0.0),
    );

    let mut z_min = f32::INFINITY;
    let mut z_max = f32::NEG_INFINITY;
    let light_to_box = box_to_light.transpose();

    for indices in BOX_TRIANGLES.chunks_exact(3) {
        let triangle: Triangle = [
            corners_light[indices[0]],
            corners_light[indices[1]],
            corners_light[indices[2]],
        ];
        let mut track = |clipped: &Triangle| {
            z_min = z_min.min(min_for_component(2, clipped));
            z_max = z_max.max(max_for_component(2, clipped));
            if let Some(debug) = debug.as_deref_mut() {
                let world = clipped.map(|p: Vec4| light_to_box * p.truncate());
                debug.list.add_triangle(&world, debug.view_frustum_color.extend(1.0));
            }
        };
        clip(&triangle, &clipping_volume, &mut track, 0, 4);
    }

    (z_min <= z_max).then_some((z_min, z_max))
}

// ============================================================================
// Light projection
// ============================================================================

/// Light-space box covered by a shadow map.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LightFrustum {
    /// XY extent.
    pub rectangle: Rectangle,
    /// Z of the far plane.
    pub far: f32,
    /// Distance from the far plane to the near plane.
    pub depth: f32,
}

impl LightFrustum {
    /// Orthographic projection from light space to light clip space.
    #[must_use]
    pub fn projection(&self) -> Mat4 {
        let low = self.rectangle.origin;
        let high = self.rectangle.top_right();
        let near = self.far + self.depth;
        Mat4::orthographic_rh(low.x, high.x, low.y, high.y, -near, -self.far)
    }
}

/// Fits the light frustum of one light to the camera frustum `camera_vp`
/// (the whole camera or one cascade) and the scene.
pub fn fit_light_frustum(
    world_to_light: &Mat3,
    scene_aabb: &BoundingBox,
    camera_vp: &Mat4,
    controls: &ShadowControls,
    map_size: u32,
    mut debug: Option<&mut FittingDebug<'_>>,
) -> LightFrustum {
    let orientation = Mat4::from_mat3(*world_to_light);
    let camera_sides_light = frustum_side_bounds(&(orientation * camera_vp.inverse()));

    let scene_light = scene_aabb.rotate(world_to_light);
    let scene_sides_light = scene_light.front_rectangle();

    let mut rectangle = if controls.tighten_light_frustum_xy_to_scene {
        intersect(&camera_sides_light, &scene_sides_light)
    } else {
        camera_sides_light
    };

    if controls.move_frustum_texel_increment && rectangle.area() > 0.0 {
        let units_per_texel = rectangle.dimension / map_size as f32;
        rectangle.origin = (rectangle.origin / units_per_texel).floor() * units_per_texel;
        rectangle.dimension = (rectangle.dimension / units_per_texel).floor() * units_per_texel;
    }

    if controls.debug_draw_shadow_planes
        && let Some(debug) = debug.as_deref_mut()
    {
        let light_to_world = world_to_light.transpose();
        debug.list.add_plane(
            light_to_world * rectangle.center().extend(0.0),
            light_to_world * Vec3::X,
            light_to_world * Vec3::Y,
            (3, 3),
            (rectangle.width(), rectangle.height()),
            debug.view_frustum_color.extend(1.0),
            debug.light_color.extend(1.0),
        );
    }

    let mut far = scene_light.min.z;
    let mut depth = scene_light.depth();

    if controls.tighten_frustum_depth_to_clipped_scene {
        let clipped_debug = if controls.debug_draw_clipped_triangles { debug.as_deref_mut() } else { None };
        match tighten_near_far(scene_aabb, world_to_light, &rectangle, clipped_debug) {
            Some((z_min, z_max)) => {
                if z_min < scene_light.min.z - DEPTH_TOLERANCE {
                    log::warn!(
                        "Whole scene shadow far plane {} was tighter than clipped-scene far plane {z_min}",
                        scene_light.min.z
                    );
                }
                if z_max > scene_light.max.z + DEPTH_TOLERANCE {
                    log::warn!(
                        "Whole scene shadow near plane {} was tighter than clipped-scene near plane {z_max}",
                        scene_light.max.z
                    );
                }
                far = z_min;
                depth = z_max - z_min;
            }
            None => log::debug!("No scene geometry inside the shadow rectangle, keeping the scene depth range"),
        }
    }

    if rectangle.width() <= 0.0 || rectangle.height() <= 0.0 || depth <= 0.0 {
        log::warn!(
            "Degenerate shadow frustum ({} x {} x {depth}), clamping its extent",
            rectangle.width(),
            rectangle.height()
        );
        rectangle.dimension = rectangle.dimension.max(Vec2::splat(MIN_FRUSTUM_EXTENT));
        depth = depth.max(MIN_FRUSTUM_EXTENT);
    }

    LightFrustum { rectangle, far, depth }
}

/// Tight orthographic projection for a light oriented by `world_to_light`.
///
/// Compose with the orientation to get the world-to-light-clip matrix.
pub fn compute_light_projection(
    world_to_light: &Mat3,
    scene_aabb: &BoundingBox,
    camera_vp: &Mat4,
    controls: &ShadowControls,
    map_size: u32,
    debug: Option<&mut FittingDebug<'_>>,
) -> Mat4 {
    fit_light_frustum(world_to_light, scene_aabb, camera_vp, controls, map_size, debug).projection()
}

// ============================================================================
// Cascades
// ============================================================================

/// Camera sub-frusta of the cascades.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CascadePartition {
    pub view_projections: [Mat4; CASCADES_PER_SHADOW],
    /// Far plane distance of each cascade, in view space.
    pub far_depths: [f32; CASCADES_PER_SHADOW],
}

/// Splits the camera frustum in [`CASCADES_PER_SHADOW`] sub-frusta with a
/// logarithmic distribution.
///
/// The split ratio uses the near plane clamped to
/// [`ShadowControls::csm_near_plane_limit`], so a tiny near plane does not
/// squeeze the first cascade. Each cascade's far plane is the next one's
/// near plane, the first cascade starts at the actual camera near plane and
/// the last one ends at the camera far plane.
pub fn z_partition_camera_frustum(
    camera: &Camera,
    controls: &ShadowControls,
    debug: Option<&mut DebugDrawList>,
) -> CascadePartition {
    let (camera_near, camera_far) = camera.near_far();
    let clamped_near = camera_near.max(controls.csm_near_plane_limit);
    debug_assert!(camera_far > clamped_near, "camera far plane {camera_far} is within the cascade near limit");

    let ratio = (camera_far / clamped_near).powf(1.0 / CASCADES_PER_SHADOW as f32);

    let mut far_depths = [0.0; CASCADES_PER_SHADOW];
    let mut far = clamped_near;
    for depth in &mut far_depths {
        far *= ratio;
        *depth = far;
    }
    debug_assert!((far_depths[CASCADES_PER_SHADOW - 1] - camera_far).abs() <= camera_far * 1.0e-4);
    far_depths[CASCADES_PER_SHADOW - 1] = camera_far;

    let mut near = camera_near;
    let view_projections = std::array::from_fn(|cascade| {
        let vp = camera.view_projection_between(near, far_depths[cascade]);
        near = far_depths[cascade];
        vp
    });

    if let Some(list) = debug {
        for (vp, color) in view_projections.iter().zip(CASCADE_COLORS) {
            list.add_frustum(&vp.inverse(), color.extend(1.0));
        }
    }

    CascadePartition { view_projections, far_depths }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn intersect_of_overlapping_rectangles() {
        let a = Rectangle::new(Vec2::ZERO, Vec2::new(2.0, 2.0));
        let b = Rectangle::new(Vec2::ONE, Vec2::new(2.0, 2.0));
        let r = intersect(&a, &b);
        assert_eq!(r.origin, Vec2::ONE);
        assert_eq!(r.dimension, Vec2::ONE);
    }

    #[test]
    fn light_frustum_projection_maps_near_to_zero() {
        let frustum = LightFrustum {
            rectangle: Rectangle::new(Vec2::splat(-1.0), Vec2::splat(2.0)),
            far: -10.0,
            depth: 8.0,
        };
        let projection = frustum.projection();
        let near = projection.project_point3(Vec3::new(0.0, 0.0, -2.0));
        let far = projection.project_point3(Vec3::new(0.0, 0.0, -10.0));
        assert!(near.z.abs() < 1e-6);
        assert!((far.z - 1.0).abs() < 1e-6);
    }
}
