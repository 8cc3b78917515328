// SPDX-License-Identifier: MPL-2.0

//! The tileable noise texture that rotates HBAO sampling directions per pixel.

/// Width and height of the noise texture in texels.
pub const NOISE_SIZE: u32 = 4;

/// A square texture of random unit rotations and jitter.
///
/// Each texel is `(cos θ, sin θ, jitter, 1)` with `θ` in `[0, 2π)` and `jitter` in `[0, 1)`,
/// stored as RGBA `f32`. The contents depend only on `seed`.
#[derive(Clone, Debug, PartialEq)]
pub struct NoiseTexture {
    size: u32,
    texels: Vec<[f32; 4]>,
}

impl NoiseTexture {
    pub const DEFAULT_SEED: u32 = 0x0b5c_ca1e;

    pub fn new(size: u32, seed: u32) -> Self {
        let mut state = seed;
        let texels = (0..size * size)
            .map(|_| {
                let angle = next_unit(&mut state) * std::f32::consts::TAU;
                let jitter = next_unit(&mut state);

                [angle.cos(), angle.sin(), jitter, 1.0]
            })
            .collect();

        Self { size, texels }
    }

    pub fn size(&self) -> u32 {
        self.size
    }

    pub fn texels(&self) -> &[[f32; 4]] {
        &self.texels
    }

    pub fn as_bytes(&self) -> &[u8] {
        bytemuck::cast_slice(&self.texels)
    }
}

impl Default for NoiseTexture {
    fn default() -> Self {
        Self::new(NOISE_SIZE, Self::DEFAULT_SEED)
    }
}

/// Advances an xorshift32 state and maps it to `[0, 1)`.
fn next_unit(state: &mut u32) -> f32 {
    // xorshift is stuck at zero.
    if *state == 0 {
        *state = 0x9e37_79b9;
    }

    *state ^= *state << 13;
    *state ^= *state >> 17;
    *state ^= *state << 5;

    (*state >> 8) as f32 / (1u32 << 24) as f32
}
