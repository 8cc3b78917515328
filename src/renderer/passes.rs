// SPDX-License-Identifier: MPL-2.0

//! The ordered list of passes that make up one frame.
//!
//! A [`FramePlan`] is pure data, so the ordering and the ping-pong alternation can be checked
//! without a GPU. [`Pipeline`](super::Pipeline) walks the plan and encodes each pass.

use crate::config::{AoMode, AoSettings};

/// Clear color of the G-buffer; alpha 0 marks pixels that no geometry covered.
pub const GBUFFER_CLEAR: wgpu::Color = wgpu::Color { r: 0.0, g: 0.0, b: 0.0, a: 0.0 };
pub const OCCLUSION_CLEAR: wgpu::Color = wgpu::Color { r: 0.0, g: 0.0, b: 0.3, a: 1.0 };
/// The whole frame when there is nothing to draw.
pub const EMPTY_CLEAR: wgpu::Color = wgpu::Color::WHITE;

/// A color attachment a pass can write.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Target {
    /// One of the two ping-pong textures, by index.
    PingPong(usize),
    /// The presentable surface frame.
    Frame,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Pass {
    /// Clears `target` and draws nothing.
    Clear(Target),
    /// Rasterizes the mesh into the G-buffer.
    Geometry,
    /// Shades the screen quad from the G-buffer.
    Occlusion { mode: AoMode, target: Target },
    /// One axis of the separable blur.
    Blur {
        source: usize,
        target: Target,
        horizontal: bool,
    },
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FramePlan {
    passes: Vec<Pass>,
}

impl FramePlan {
    /// `blur_passes` is capped at [`AoSettings::MAX_BLUR_PASSES`].
    pub fn new(has_mesh: bool, mode: AoMode, blur_passes: u32) -> Self {
        if !has_mesh {
            return Self { passes: vec![Pass::Clear(Target::Frame)] };
        }

        let iterations = 2 * blur_passes.min(AoSettings::MAX_BLUR_PASSES) as usize;
        let mut passes = Vec::with_capacity(2 + iterations);
        passes.push(Pass::Geometry);
        passes.push(Pass::Occlusion {
            mode,
            target: if iterations > 0 { Target::PingPong(1) } else { Target::Frame },
        });

        let mut horizontal = true;
        for i in 0..iterations {
            let source = horizontal as usize;
            let target = if i + 1 == iterations {
                Target::Frame
            } else {
                Target::PingPong(!horizontal as usize)
            };
            passes.push(Pass::Blur { source, target, horizontal });
            horizontal = !horizontal;
        }

        Self { passes }
    }

    pub fn passes(&self) -> &[Pass] {
        &self.passes
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_scene_clears_the_frame() {
        let plan = FramePlan::new(false, AoMode::Hbao, 3);

        assert_eq!(plan.passes(), &[Pass::Clear(Target::Frame)]);
    }

    #[test]
    fn without_blur_occlusion_writes_the_frame() {
        let plan = FramePlan::new(true, AoMode::DepthDebug, 0);

        assert_eq!(
            plan.passes(),
            &[
                Pass::Geometry,
                Pass::Occlusion { mode: AoMode::DepthDebug, target: Target::Frame },
            ],
        );
    }

    #[test]
    fn blur_alternates_axis_and_textures() {
        let plan = FramePlan::new(true, AoMode::Hbao, 2);

        assert_eq!(
            plan.passes(),
            &[
                Pass::Geometry,
                Pass::Occlusion { mode: AoMode::Hbao, target: Target::PingPong(1) },
                Pass::Blur { source: 1, target: Target::PingPong(0), horizontal: true },
                Pass::Blur { source: 0, target: Target::PingPong(1), horizontal: false },
                Pass::Blur { source: 1, target: Target::PingPong(0), horizontal: true },
                Pass::Blur { source: 0, target: Target::Frame, horizontal: false },
            ],
        );
    }

    #[test]
    fn every_blur_reads_what_the_previous_pass_wrote() {
        for blur_passes in 1..6 {
            let plan = FramePlan::new(true, AoMode::Hbao, blur_passes);
            let passes = plan.passes();

            assert_eq!(passes.len(), 2 + 2 * blur_passes as usize);
            assert!(matches!(passes.last(), Some(Pass::Blur { target: Target::Frame, .. })));

            for window in passes[1..].windows(2) {
                let written = match window[0] {
                    Pass::Occlusion { target, .. } | Pass::Blur { target, .. } => target,
                    _ => unreachable!(),
                };
                if let Pass::Blur { source, .. } = window[1] {
                    assert_eq!(written, Target::PingPong(source));
                }
            }
        }
    }

    #[test]
    fn blur_iterations_are_capped() {
        let plan = FramePlan::new(true, AoMode::Hbao, u32::MAX);

        assert_eq!(plan.passes().len(), 2 + 2 * AoSettings::MAX_BLUR_PASSES as usize);
        assert!(matches!(plan.passes().last(), Some(Pass::Blur { target: Target::Frame, .. })));
    }
}
