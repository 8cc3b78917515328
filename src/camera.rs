// SPDX-License-Identifier: MPL-2.0

//! The orbit camera.
//!
//! The camera never touches the GPU. It accumulates interaction state from the host (mouse drags,
//! key presses) and derives the model, view, and projection matrices that the
//! [pipeline](crate::renderer::Pipeline) uploads every frame.

use std::f32::consts::FRAC_PI_2;

use glam::{Mat3, Mat4, Vec3};

use crate::mesh::Bounds;

/// The farthest the camera may zoom out.
pub const MAX_CAMERA_DISTANCE: f32 = 3.0;
/// The farthest the camera may zoom in.
///
/// This is negative: zooming past the pivot is allowed and simply moves the camera through the
/// model.
pub const MIN_CAMERA_DISTANCE: f32 = -MAX_CAMERA_DISTANCE;

/// The lower bound of [`Camera::rotation_x`].
pub const MIN_ROTATION_X: f32 = -FRAC_PI_2;
/// The upper bound of [`Camera::rotation_x`].
pub const MAX_ROTATION_X: f32 = FRAC_PI_2;

/// The rotation, in radians, applied by a single call to [`Camera::rotate`].
pub const ANGLE_INCREMENT: f32 = 0.01;

const DEFAULT_DISTANCE: f32 = 2.0;
const DEFAULT_STEP: f32 = 0.05;

/// A rectangle of the render target, in pixels.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Viewport {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

impl Viewport {
    /// The width-to-height ratio of this viewport.
    pub fn aspect_ratio(&self) -> f32 {
        self.width.max(1) as f32 / self.height.max(1) as f32
    }
}

impl Default for Viewport {
    fn default() -> Self {
        Self { x: 0, y: 0, width: 1, height: 1 }
    }
}

/// How the geometry pass transforms vertex normals into view space.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum NormalMatrixMode {
    /// The inverse-transpose of the upper-left 3x3 of `view * model`.
    ///
    /// This is correct under non-uniform scaling.
    #[default]
    InverseTranspose,
    /// The upper-left 3x3 of `view * model`, as is.
    ///
    /// This is only correct when the model-view transform scales uniformly, which is always the
    /// case for [`Camera::model`].
    Plain,
}

/// An orbit camera.
///
/// The camera orbits a pivot at the origin. The loaded mesh is centered on that pivot and scaled
/// to unit size by [the model matrix](Self::model).
///
/// Rotating, zooming and panning are independent: each is toggled by its own start/stop pair, and
/// more than one may be active at once.
#[derive(Clone, Debug)]
pub struct Camera {
    distance: f32,
    step: f32,
    rotating: bool,
    zooming: bool,
    panning: bool,
    rotation_x: f32,
    rotation_y: f32,
    pan_x: f32,
    pan_y: f32,
    /// The cursor position seen by the last interaction, used to compute drag deltas.
    last_x: f32,
    last_y: f32,
    viewport: Viewport,
    centering: Vec3,
    scaling: f32,
    field_of_view: f32,
    z_near: f32,
    z_far: f32,
}

impl Default for Camera {
    fn default() -> Self {
        Self {
            distance: DEFAULT_DISTANCE,
            step: DEFAULT_STEP,
            rotating: false,
            zooming: false,
            panning: false,
            rotation_x: 0.0,
            rotation_y: 0.0,
            pan_x: 0.0,
            pan_y: 0.0,
            last_x: -1.0,
            last_y: -1.0,
            viewport: Viewport::default(),
            centering: Vec3::ZERO,
            scaling: 1.0,
            field_of_view: 0.0,
            z_near: 0.0,
            z_far: 0.0,
        }
    }
}

impl Camera {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records the viewport rectangle.
    ///
    /// Zero dimensions are raised to 1 so that the aspect ratio is always defined.
    pub fn set_viewport(&mut self, x: u32, y: u32, width: u32, height: u32) {
        self.viewport = Viewport {
            x,
            y,
            width: width.max(1),
            height: height.max(1),
        };
    }

    pub fn viewport(&self) -> Viewport {
        self.viewport
    }

    /// Stores the perspective parameters and returns the resulting projection matrix.
    ///
    /// `fov` is the vertical field of view in degrees.
    pub fn set_projection(&mut self, fov: f32, z_near: f32, z_far: f32) -> Mat4 {
        self.field_of_view = fov;
        self.z_near = z_near;
        self.z_far = z_far;

        self.projection()
    }

    /// The perspective projection matrix for the stored parameters and the current viewport.
    ///
    /// Clip-space depth spans `[0, 1]`, as `wgpu` expects.
    pub fn projection(&self) -> Mat4 {
        Mat4::perspective_rh(
            self.field_of_view.to_radians(),
            self.aspect_ratio(),
            self.z_near,
            self.z_far,
        )
    }

    /// The view matrix.
    ///
    /// Rotation is applied first and translation last, so pan and zoom act along the axes of the
    /// final camera frame.
    pub fn view(&self) -> Mat4 {
        Mat4::from_translation(Vec3::new(self.pan_x, self.pan_y, -self.distance))
            * Mat4::from_rotation_x(self.rotation_x)
            * Mat4::from_rotation_y(self.rotation_y)
    }

    /// The model matrix: centers the mesh on the origin, then scales its longest edge to 1.
    pub fn model(&self) -> Mat4 {
        Mat4::from_scale(Vec3::splat(self.scaling)) * Mat4::from_translation(self.centering)
    }

    /// The matrix that takes mesh normals into view space.
    ///
    /// A singular model-view transform falls back to the plain submatrix.
    pub fn normal_matrix(&self, mode: NormalMatrixMode) -> Mat3 {
        let model_view = Mat3::from_mat4(self.view() * self.model());

        match mode {
            NormalMatrixMode::Plain => model_view,
            NormalMatrixMode::InverseTranspose => {
                let determinant = model_view.determinant();
                if determinant.abs() <= f32::EPSILON || !determinant.is_finite() {
                    model_view
                } else {
                    model_view.inverse().transpose()
                }
            }
        }
    }

    /// Fits the model matrix to a mesh's bounding box.
    ///
    /// Bounds whose longest edge is zero (or not finite) keep a scale of 1.
    pub fn update_model(&mut self, bounds: Bounds) {
        self.centering = -bounds.center();

        let longest_edge = bounds.longest_edge();
        self.scaling = if longest_edge > 0.0 && longest_edge.is_finite() {
            1.0 / longest_edge
        } else {
            tracing::warn!("Degenerate bounding box {:?}; keeping unit scale", bounds);
            1.0
        };
    }

    /// Moves the camera along its view axis by `step * modifier`.
    pub fn zoom(&mut self, modifier: f32) {
        self.distance = (self.distance + self.step * modifier)
            .clamp(MIN_CAMERA_DISTANCE, MAX_CAMERA_DISTANCE);
    }

    /// Zooms by one step in the direction the cursor moved vertically, if zooming is active.
    pub fn safe_zoom(&mut self, y: f32) {
        if self.zooming {
            self.zoom(if y - self.last_y < 0.0 { -1.0 } else { 1.0 });
            self.last_y = y;
        }
    }

    /// Pans by the cursor displacement, if panning is active.
    pub fn safe_pan(&mut self, x: f32, y: f32) {
        if self.panning {
            self.pan_x += (x - self.last_x) / 10.0 * self.step;
            self.pan_y -= (y - self.last_y) / 10.0 * self.step;
            self.last_x = x;
            self.last_y = y;
        }
    }

    /// Rotates about the Y axis by a fixed increment, regardless of the interaction flags.
    pub fn rotate(&mut self, modifier: f32) {
        self.rotation_y += ANGLE_INCREMENT * modifier;
    }

    /// Tilts about the X axis by the vertical cursor displacement, if rotating is active.
    pub fn set_rotation_x(&mut self, y: f32) {
        if self.rotating {
            self.rotation_x = (self.rotation_x + (y - self.last_y) * self.step)
                .clamp(MIN_ROTATION_X, MAX_ROTATION_X);
            self.last_y = y;
        }
    }

    /// Turns about the Y axis by the horizontal cursor displacement, if rotating is active.
    pub fn set_rotation_y(&mut self, x: f32) {
        if self.rotating {
            self.rotation_y += (x - self.last_x) * self.step;
            self.last_x = x;
        }
    }

    pub fn start_rotating(&mut self, x: f32, y: f32) {
        self.move_cursor(x, y);
        self.rotating = true;
    }

    pub fn stop_rotating(&mut self, x: f32, y: f32) {
        self.move_cursor(x, y);
        self.rotating = false;
    }

    pub fn start_zooming(&mut self, x: f32, y: f32) {
        self.move_cursor(x, y);
        self.zooming = true;
    }

    pub fn stop_zooming(&mut self, x: f32, y: f32) {
        self.move_cursor(x, y);
        self.zooming = false;
    }

    pub fn start_panning(&mut self, x: f32, y: f32) {
        self.move_cursor(x, y);
        self.panning = true;
    }

    pub fn stop_panning(&mut self, x: f32, y: f32) {
        self.move_cursor(x, y);
        self.panning = false;
    }

    fn move_cursor(&mut self, x: f32, y: f32) {
        self.last_x = x;
        self.last_y = y;
    }

    /// Sets the sensitivity multiplier applied to every drag and zoom.
    pub fn set_step(&mut self, step: f32) {
        self.step = step;
    }
}

impl Camera {
    pub fn distance(&self) -> f32 {
        self.distance
    }

    pub fn step(&self) -> f32 {
        self.step
    }

    pub fn rotation_x(&self) -> f32 {
        self.rotation_x
    }

    pub fn rotation_y(&self) -> f32 {
        self.rotation_y
    }

    /// The pan offset as `(x, y)`.
    pub fn pan(&self) -> (f32, f32) {
        (self.pan_x, self.pan_y)
    }

    pub fn centering(&self) -> Vec3 {
        self.centering
    }

    pub fn scaling(&self) -> f32 {
        self.scaling
    }

    pub fn is_rotating(&self) -> bool {
        self.rotating
    }

    pub fn is_zooming(&self) -> bool {
        self.zooming
    }

    pub fn is_panning(&self) -> bool {
        self.panning
    }

    /// The vertical field of view in degrees.
    pub fn field_of_view(&self) -> f32 {
        self.field_of_view
    }

    pub fn z_near(&self) -> f32 {
        self.z_near
    }

    pub fn z_far(&self) -> f32 {
        self.z_far
    }

    pub fn aspect_ratio(&self) -> f32 {
        self.viewport.aspect_ratio()
    }

    /// The tangent of half the vertical field of view.
    pub fn tan_half_fov(&self) -> f32 {
        (self.field_of_view.to_radians() / 2.0).tan()
    }
}
