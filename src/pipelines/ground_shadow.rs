//! Ground shadow darkening factor.
//!
//! Ground tiles are not relit per pixel. Shadowed ground is darkened by a
//! constant factor `ambient / (ambient + directional)` per channel, blended
//! multiplicatively in display (sRGB) space.

use crate::style::{AmbientLight, DirectionalLight};

const EPSILON: f64 = 1e-6;

pub fn srgb_to_linear(c: f64) -> f64 {
    if c <= 0.04045 {
        c / 12.92
    } else {
        ((c + 0.055) / 1.055).powf(2.4)
    }
}

pub fn linear_to_srgb(c: f64) -> f64 {
    if c <= 0.0031308 {
        c * 12.92
    } else {
        1.055 * c.powf(1.0 / 2.4) - 0.055
    }
}

/// Per-channel color multiplier for shadowed ground, in sRGB.
pub fn ground_shadow_factor(directional: &DirectionalLight, ambient: &AmbientLight) -> [f64; 3] {
    // Ground normal is +z, so only the polar angle matters
    let directional_factor = directional.direction[1].to_radians().cos().max(0.0);
    let mut factor = [0.0; 3];
    for (i, out) in factor.iter_mut().enumerate() {
        let a = srgb_to_linear(ambient.color[i]) * ambient.intensity;
        let d = srgb_to_linear(directional.color[i]) * directional_factor * directional.intensity;
        *out = linear_to_srgb(a / (a + d + EPSILON));
    }
    factor
}
