//! Shadow cascades and their configuration.

use cgmath::{Matrix4, SquareMatrix};

use crate::{
    context::{FramebufferHandle, TextureHandle},
    math::Frustum,
};

/// Cascades supported by the shadow uniforms.
pub const MAX_CASCADES: usize = 2;
/// Smallest usable shadow map edge in texels.
pub const MIN_SHADOW_MAP_RESOLUTION: u32 = 2;

/// Tunables of the shadow renderer.
#[derive(Clone, Debug, PartialEq)]
pub struct ShadowParameters {
    /// At most [`MAX_CASCADES`].
    pub cascade_count: usize,
    /// Edge length of a shadow map, read through [`Self::resolution`].
    pub shadow_map_resolution: u32,
    /// Split distance as a multiple of the camera-to-center distance.
    pub cascade_split_factor: f64,
    /// Cutoff distance as a multiple of the split distance.
    pub cutoff_factor: f64,
    /// The first cascade starts at viewport height divided by this.
    pub near_divisor: f64,
    /// Shadows fade out over the last part of the farthest cascade.
    pub fade_start: f64,
    pub shadow_bias: [f32; 3],
    /// Degrees.
    pub max_polar_angle: f64,
    /// Render cascades into a color attachment for inspection.
    pub debug: bool,
}

impl Default for ShadowParameters {
    fn default() -> Self {
        Self {
            cascade_count: 2,
            shadow_map_resolution: 2048,
            cascade_split_factor: 1.5,
            cutoff_factor: 3.0,
            near_divisor: 50.0,
            fade_start: 0.75,
            shadow_bias: [0.00036, 0.0012, 0.012],
            max_polar_angle: 75.0,
            debug: false,
        }
    }
}

impl ShadowParameters {
    /// Shadow map edge in texels, at least [`MIN_SHADOW_MAP_RESOLUTION`].
    pub fn resolution(&self) -> u32 {
        self.shadow_map_resolution.max(MIN_SHADOW_MAP_RESOLUTION)
    }

    /// `[near, far]` of every cascade in camera pixels. Consecutive cascades
    /// share their boundary and never overlap.
    pub fn cascade_ranges(&self, camera_to_center_distance: f64, viewport_height: f64) -> Vec<(f64, f64)> {
        let near = viewport_height / self.near_divisor;
        let split = self.cascade_split_factor * camera_to_center_distance;
        let cutoff = self.cutoff_factor * split;
        match self.cascade_count.min(MAX_CASCADES) {
            0 => Vec::new(),
            1 => vec![(near, cutoff)],
            _ => vec![(near, split), (split, cutoff)],
        }
    }
}

/// GPU resources and per-frame state of one cascade.
#[derive(Clone, Debug)]
pub struct ShadowCascade {
    pub framebuffer: FramebufferHandle,
    pub texture: TextureHandle,
    pub color_texture: Option<TextureHandle>,
    /// World to light clip space.
    pub matrix: Matrix4<f64>,
    pub near: f64,
    pub far: f64,
    /// Light volume in normalized mercator units, z in meters.
    pub frustum: Frustum,
}

impl ShadowCascade {
    pub fn new(framebuffer: FramebufferHandle, texture: TextureHandle, color_texture: Option<TextureHandle>) -> Self {
        let matrix = Matrix4::identity();
        Self {
            framebuffer,
            texture,
            color_texture,
            frustum: Frustum::from_inv_projection_matrix(&matrix, 1.0, 0.0, true),
            matrix,
            near: 0.0,
            far: 0.0,
        }
    }
}
