// SPDX-License-Identifier: MPL-2.0

//! Uniform blocks as they are laid out in GPU memory.
//!
//! Each struct mirrors a WGSL `struct` of the same name. Matrices are column-major.

use glam::{Mat3, Mat4};

use crate::{camera::Camera, config::AoSettings};

type Matrix = [[f32; 4]; 4];

/// Mirrors `GeometryUniforms` in `g.vert.wgsl`.
#[repr(C)]
#[derive(Clone, Copy, Debug, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct GeometryUniforms {
    pub projection: Matrix,
    pub view: Matrix,
    pub model: Matrix,
    /// The 3×3 normal matrix in the upper-left corner of a 4×4 identity.
    pub normal_matrix: Matrix,
}

impl GeometryUniforms {
    pub fn new(projection: Mat4, view: Mat4, model: Mat4, normal_matrix: Mat3) -> Self {
        Self {
            projection: projection.to_cols_array_2d(),
            view: view.to_cols_array_2d(),
            model: model.to_cols_array_2d(),
            normal_matrix: Mat4::from_mat3(normal_matrix).to_cols_array_2d(),
        }
    }
}

/// Mirrors `AoUniforms` in the occlusion fragment shaders.
#[repr(C)]
#[derive(Clone, Copy, Debug, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct AoUniforms {
    pub projection: Matrix,
    /// `(1 / width, 1 / height)`.
    pub pixel_size: [f32; 2],
    pub aspect_ratio: f32,
    pub tan_half_fov: f32,
    pub directions: i32,
    pub steps: i32,
    pub radius: f32,
    pub t_bias: f32,
    pub strength: f32,
    pub z_near: f32,
    /// How many times the noise texture repeats across the target, per axis.
    pub noise_scale: [f32; 2],
    pub z_far: f32,
    _padding: [f32; 3],
}

impl AoUniforms {
    pub fn new(camera: &Camera, settings: &AoSettings, noise_size: u32) -> Self {
        let viewport = camera.viewport();
        let (width, height) = (viewport.width as f32, viewport.height as f32);
        let settings = settings.sanitized();

        Self {
            projection: camera.projection().to_cols_array_2d(),
            pixel_size: [1.0 / width, 1.0 / height],
            aspect_ratio: camera.aspect_ratio(),
            tan_half_fov: camera.tan_half_fov(),
            directions: settings.directions,
            steps: settings.steps,
            radius: settings.radius,
            t_bias: settings.t_bias,
            strength: settings.strength,
            z_near: camera.z_near(),
            noise_scale: [width / noise_size as f32, height / noise_size as f32],
            z_far: camera.z_far(),
            _padding: [0.0; 3],
        }
    }
}

/// Mirrors `BlurUniforms` in `blur.frag.wgsl`.
#[repr(C)]
#[derive(Clone, Copy, Debug, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct BlurUniforms {
    pub pixel_size: [f32; 2],
    /// 1 for the horizontal axis, 0 for the vertical one.
    pub horizontal: u32,
    _padding: u32,
}

impl BlurUniforms {
    pub fn new(width: u32, height: u32, horizontal: bool) -> Self {
        Self {
            pixel_size: [1.0 / width.max(1) as f32, 1.0 / height.max(1) as f32],
            horizontal: horizontal as u32,
            _padding: 0,
        }
    }
}

#[cfg(test)]
mod tests {
    use std::mem::size_of;

    use glam::Vec3;

    use super::*;

    #[test]
    fn sizes_are_multiples_of_16() {
        assert_eq!(size_of::<GeometryUniforms>(), 256);
        assert_eq!(size_of::<AoUniforms>(), 128);
        assert_eq!(size_of::<BlurUniforms>(), 16);
    }

    #[test]
    fn normal_matrix_is_padded_with_identity() {
        let uniforms = GeometryUniforms::new(
            Mat4::IDENTITY,
            Mat4::IDENTITY,
            Mat4::IDENTITY,
            Mat3::from_diagonal(Vec3::splat(2.0)),
        );

        assert_eq!(uniforms.normal_matrix[0], [2.0, 0.0, 0.0, 0.0]);
        assert_eq!(uniforms.normal_matrix[3], [0.0, 0.0, 0.0, 1.0]);
    }

    #[test]
    fn ao_uniforms_follow_the_viewport() {
        let mut camera = Camera::new();
        camera.set_viewport(0, 0, 800, 400);
        camera.set_projection(60.0, 0.1, 10.0);

        let settings = AoSettings { directions: 0, ..Default::default() };
        let uniforms = AoUniforms::new(&camera, &settings, 4);

        assert_eq!(uniforms.pixel_size, [1.0 / 800.0, 1.0 / 400.0]);
        assert_eq!(uniforms.aspect_ratio, 2.0);
        assert_eq!(uniforms.noise_scale, [200.0, 100.0]);
        assert_eq!(uniforms.directions, 1);
        assert!((uniforms.tan_half_fov - 30f32.to_radians().tan()).abs() < 1e-6);
    }

    #[test]
    fn blur_axis_flag() {
        assert_eq!(BlurUniforms::new(10, 20, true).horizontal, 1);
        assert_eq!(BlurUniforms::new(10, 20, false).horizontal, 0);
        assert_eq!(BlurUniforms::new(0, 4, true).pixel_size, [1.0, 0.25]);
    }
}
