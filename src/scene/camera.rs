use std::borrow::Cow;

use glam::{Mat4, Vec3};

/// Projection parameters. Near and far are positive distances along the
/// view direction; the camera looks down -Z (right-handed) and depth maps to
/// `[0, 1]`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Projection {
    Perspective {
        /// Vertical field of view, in radians.
        fov_y: f32,
        aspect: f32,
        near: f32,
        far: f32,
    },
    Orthographic {
        half_height: f32,
        aspect: f32,
        near: f32,
        far: f32,
    },
}

impl Projection {
    pub fn matrix(&self) -> Mat4 {
        match *self {
            Projection::Perspective { fov_y, aspect, near, far } => {
                Mat4::perspective_rh(fov_y, aspect, near, far)
            }
            Projection::Orthographic { half_height, aspect, near, far } => {
                let half_width = half_height * aspect;
                Mat4::orthographic_rh(-half_width, half_width, -half_height, half_height, near, far)
            }
        }
    }

    pub fn near_far(&self) -> (f32, f32) {
        match *self {
            Projection::Perspective { near, far, .. } | Projection::Orthographic { near, far, .. } => {
                (near, far)
            }
        }
    }

    /// Same projection with other near and far planes.
    #[must_use]
    pub fn with_near_far(mut self, new_near: f32, new_far: f32) -> Self {
        match &mut self {
            Projection::Perspective { near, far, .. } | Projection::Orthographic { near, far, .. } => {
                *near = new_near;
                *far = new_far;
            }
        }
        self
    }

    #[must_use]
    pub fn with_aspect(mut self, new_aspect: f32) -> Self {
        match &mut self {
            Projection::Perspective { aspect, .. } | Projection::Orthographic { aspect, .. } => {
                *aspect = new_aspect;
            }
        }
        self
    }
}

#[derive(Debug, Clone)]
pub struct Camera {
    pub name: Cow<'static, str>,
    pub projection: Projection,

    // Camera to world, and its inverse.
    world_matrix: Mat4,
    view_matrix: Mat4,
}

impl Camera {
    /// `fov` is in degrees.
    pub fn new_perspective(fov: f32, aspect: f32, near: f32, far: f32) -> Self {
        Self::new(Projection::Perspective {
            fov_y: fov.to_radians(),
            aspect,
            near,
            far,
        })
    }

    pub fn new_orthographic(half_height: f32, aspect: f32, near: f32, far: f32) -> Self {
        Self::new(Projection::Orthographic { half_height, aspect, near, far })
    }

    pub fn new(projection: Projection) -> Self {
        Self {
            name: Cow::Borrowed("Camera"),
            projection,
            world_matrix: Mat4::IDENTITY,
            view_matrix: Mat4::IDENTITY,
        }
    }

    /// Places the camera at `eye`, looking at `target`.
    #[must_use]
    pub fn looking_at(mut self, eye: Vec3, target: Vec3, up: Vec3) -> Self {
        self.look_at(eye, target, up);
        self
    }

    pub fn look_at(&mut self, eye: Vec3, target: Vec3, up: Vec3) {
        self.view_matrix = Mat4::look_at_rh(eye, target, up);
        self.world_matrix = self.view_matrix.inverse();
    }

    pub fn set_world_matrix(&mut self, world: Mat4) {
        self.world_matrix = world;
        self.view_matrix = world.inverse();
    }

    pub fn set_aspect(&mut self, aspect: f32) {
        self.projection = self.projection.with_aspect(aspect);
    }

    pub fn world_matrix(&self) -> Mat4 { self.world_matrix }
    pub fn view_matrix(&self) -> Mat4 { self.view_matrix }
    pub fn projection_matrix(&self) -> Mat4 { self.projection.matrix() }
    pub fn position(&self) -> Vec3 { self.world_matrix.w_axis.truncate() }
    pub fn near_far(&self) -> (f32, f32) { self.projection.near_far() }

    pub fn view_projection(&self) -> Mat4 {
        self.projection.matrix() * self.view_matrix
    }

    /// View-projection of the sub-frustum between `near` and `far`.
    pub fn view_projection_between(&self, near: f32, far: f32) -> Mat4 {
        self.projection.with_near_far(near, far).matrix() * self.view_matrix
    }
}
