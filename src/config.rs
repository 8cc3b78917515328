// SPDX-License-Identifier: MPL-2.0

//! Pipeline configuration.

use std::{fmt, path::PathBuf, str::FromStr};

use crate::camera::NormalMatrixMode;

/// Which ambient-occlusion program shades the screen quad.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum AoMode {
    /// Horizon-based ambient occlusion.
    #[default]
    Hbao,
    /// Visualizes linear depth from the G-buffer.
    DepthDebug,
    /// Visualizes view-space normals from the G-buffer.
    NormalDebug,
}

impl AoMode {
    pub const ALL: [Self; 3] = [Self::Hbao, Self::DepthDebug, Self::NormalDebug];

    pub fn canonical(self) -> &'static str {
        match self {
            Self::Hbao => "hbao",
            Self::DepthDebug => "depth",
            Self::NormalDebug => "normal",
        }
    }
}

impl fmt::Display for AoMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.canonical())
    }
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
#[error("unknown AO mode {0:?}; expected one of hbao, depth, normal")]
pub struct ParseAoModeError(String);

impl FromStr for AoMode {
    type Err = ParseAoModeError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        Ok(match value.trim().to_ascii_lowercase().as_str() {
            "hbao" => Self::Hbao,
            "depth" | "depth-debug" => Self::DepthDebug,
            "normal" | "normals" | "normal-debug" => Self::NormalDebug,
            _ => return Err(ParseAoModeError(value.to_owned())),
        })
    }
}

/// Ambient-occlusion parameters.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct AoSettings {
    pub mode: AoMode,
    /// Number of horizontal+vertical blur pairs; 0 disables blurring. At most
    /// [`MAX_BLUR_PASSES`](Self::MAX_BLUR_PASSES).
    pub blur_passes: u32,
    /// Sampling directions per pixel. At least 1.
    pub directions: i32,
    /// Steps along each direction. At least 1.
    pub steps: i32,
    /// Sampling radius in view-space units.
    pub radius: f32,
    /// Tangent bias in radians.
    pub t_bias: f32,
    pub strength: f32,
}

impl AoSettings {
    pub const DEFAULT_T_BIAS_DEGREES: f32 = 30.0;
    pub const MAX_BLUR_PASSES: u32 = 32;

    /// Clamps the sample counts to at least 1 and the blur pairs to
    /// [`MAX_BLUR_PASSES`](Self::MAX_BLUR_PASSES).
    pub fn sanitized(mut self) -> Self {
        self.blur_passes = self.blur_passes.min(Self::MAX_BLUR_PASSES);
        self.directions = self.directions.max(1);
        self.steps = self.steps.max(1);
        self
    }
}

impl Default for AoSettings {
    fn default() -> Self {
        Self {
            mode: AoMode::Hbao,
            blur_passes: 0,
            directions: 3,
            steps: 6,
            radius: 0.4,
            t_bias: Self::DEFAULT_T_BIAS_DEGREES.to_radians(),
            strength: 1.0,
        }
    }
}

/// Perspective parameters applied on every resize.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ProjectionSettings {
    /// Vertical field of view in degrees.
    pub field_of_view: f32,
    pub z_near: f32,
    pub z_far: f32,
}

impl Default for ProjectionSettings {
    fn default() -> Self {
        Self {
            field_of_view: 60.0,
            z_near: 0.1,
            z_far: 10.0,
        }
    }
}

/// Where WGSL sources come from.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub enum ShaderSource {
    /// Compiled into the binary.
    #[default]
    Embedded,
    /// Read from files in this directory whenever programs are (re)built.
    Directory(PathBuf),
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct PipelineConfig {
    pub shaders: ShaderSource,
    pub ao: AoSettings,
    pub projection: ProjectionSettings,
    pub normal_matrix: NormalMatrixMode,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_ao_modes() {
        assert_eq!("hbao".parse(), Ok(AoMode::Hbao));
        assert_eq!(" Depth ".parse(), Ok(AoMode::DepthDebug));
        assert_eq!("normal".parse(), Ok(AoMode::NormalDebug));
        assert_eq!(
            "ssao".parse::<AoMode>(),
            Err(ParseAoModeError("ssao".to_owned())),
        );

        for mode in AoMode::ALL {
            assert_eq!(mode.to_string().parse(), Ok(mode));
        }
    }

    #[test]
    fn defaults() {
        let ao = AoSettings::default();

        assert_eq!(ao.mode, AoMode::Hbao);
        assert_eq!(ao.blur_passes, 0);
        assert_eq!((ao.directions, ao.steps), (3, 6));
        assert!((ao.t_bias - std::f32::consts::FRAC_PI_6).abs() < 1e-6);
        assert_eq!(PipelineConfig::default().normal_matrix, NormalMatrixMode::InverseTranspose);
    }

    #[test]
    fn sanitizing_clamps_sample_counts() {
        let ao = AoSettings { directions: 0, steps: -4, ..Default::default() }.sanitized();

        assert_eq!((ao.directions, ao.steps), (1, 1));
    }

    #[test]
    fn sanitizing_bounds_blur_passes() {
        let ao = AoSettings { blur_passes: 4_000_000_000, ..Default::default() }.sanitized();
        assert_eq!(ao.blur_passes, AoSettings::MAX_BLUR_PASSES);

        let ao = AoSettings { blur_passes: 5, ..Default::default() }.sanitized();
        assert_eq!(ao.blur_passes, 5);
    }
}
