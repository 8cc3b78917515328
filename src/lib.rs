// SPDX-License-Identifier: MPL-2.0

//! A mesh viewer with screen-space ambient occlusion.
//!
//! A triangle mesh is loaded from disk, orbited with a mouse-driven camera, and rendered through a
//! deferred pipeline: a geometry pass fills a G-buffer, a full-screen pass computes horizon-based
//! ambient occlusion (HBAO) from it, and optional blur passes smooth the result.
//!
//! # Coordinate Spaces
//!
//! There are four coordinate spaces: **mesh** space, **model** space, **view** space, and **clip**
//! space.
//!
//! ## Mesh Space
//!
//! The coordinates stored in the file. They are unbounded and arbitrarily placed.
//!
//! ## Model Space
//!
//! Mesh space translated so that the center of the mesh's bounding box is at the origin, then
//! scaled so that the longest edge of the box has length 1. The [model
//! matrix](camera::Camera::model) performs this normalization, so every mesh appears at a similar
//! size regardless of the units it was authored in.
//!
//! ## View Space
//!
//! Model space rotated about the origin by the camera's orbit angles, then pushed away from the
//! viewer by the camera's distance and shifted by its pan offsets. The viewer sits at the origin
//! looking down −z. The G-buffer stores normals and linear depth (`-z`) in this space, and the
//! occlusion pass reconstructs positions in it.
//!
//! ## Clip Space
//!
//! View space after the perspective projection. Depth spans `[0, 1]` after the perspective divide.

pub mod camera;
pub mod config;
pub mod input;
pub mod mesh;
pub mod renderer;

pub use camera::{Camera, NormalMatrixMode, Viewport};
pub use config::{AoMode, AoSettings, PipelineConfig, ProjectionSettings, ShaderSource};
pub use mesh::{Bounds, LoadError, Mesh, MeshError, MeshStats};
pub use renderer::{Error, Gpu, Pipeline, Renderer};
