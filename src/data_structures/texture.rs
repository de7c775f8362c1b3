//! Material textures and shadow map texture descriptors.
//!
//! Textures are owned by the graphics collaborator; this module only keeps the
//! handle together with the sampling state a material asks for, and describes
//! the depth textures backing shadow cascades.

use crate::context::TextureHandle;

/// A material texture: GPU handle plus sampler state.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Texture {
    pub handle: TextureHandle,
    pub mag_filter: wgpu::FilterMode,
    pub min_filter: wgpu::FilterMode,
    pub address_mode_u: wgpu::AddressMode,
    pub address_mode_v: wgpu::AddressMode,
    /// Texture data is premultiplied by alpha.
    pub premultiplied: bool,
}

impl Texture {
    pub fn new(handle: TextureHandle) -> Self {
        Self {
            handle,
            mag_filter: wgpu::FilterMode::Linear,
            min_filter: wgpu::FilterMode::Linear,
            address_mode_u: wgpu::AddressMode::Repeat,
            address_mode_v: wgpu::AddressMode::Repeat,
            premultiplied: false,
        }
    }

    pub fn sampler(&self) -> wgpu::SamplerDescriptor<'static> {
        wgpu::SamplerDescriptor {
            label: Some("model texture sampler"),
            address_mode_u: self.address_mode_u,
            address_mode_v: self.address_mode_v,
            address_mode_w: wgpu::AddressMode::ClampToEdge,
            mag_filter: self.mag_filter,
            min_filter: self.min_filter,
            ..Default::default()
        }
    }
}

/// Standard shadow map depth format (32-bit float).
pub const SHADOW_DEPTH_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Depth32Float;

/// Square depth texture backing one shadow cascade.
pub fn shadow_map_descriptor(resolution: u32) -> wgpu::TextureDescriptor<'static> {
    wgpu::TextureDescriptor {
        label: Some("shadow cascade depth"),
        size: wgpu::Extent3d {
            width: resolution.max(1),
            height: resolution.max(1),
            depth_or_array_layers: 1,
        },
        mip_level_count: 1,
        sample_count: 1,
        dimension: wgpu::TextureDimension::D2,
        format: SHADOW_DEPTH_FORMAT,
        usage: wgpu::TextureUsages::RENDER_ATTACHMENT | wgpu::TextureUsages::TEXTURE_BINDING,
        view_formats: &[],
    }
}

/// Color texture used when cascades are visualized for debugging.
pub fn shadow_debug_color_descriptor(resolution: u32) -> wgpu::TextureDescriptor<'static> {
    wgpu::TextureDescriptor {
        label: Some("shadow cascade debug color"),
        format: wgpu::TextureFormat::Rgba8Unorm,
        ..shadow_map_descriptor(resolution)
    }
}

/// Comparison sampler used when receiving shadows.
pub fn shadow_sampler() -> wgpu::SamplerDescriptor<'static> {
    wgpu::SamplerDescriptor {
        label: Some("shadow map sampler"),
        address_mode_u: wgpu::AddressMode::ClampToEdge,
        address_mode_v: wgpu::AddressMode::ClampToEdge,
        address_mode_w: wgpu::AddressMode::ClampToEdge,
        mag_filter: wgpu::FilterMode::Linear,
        min_filter: wgpu::FilterMode::Linear,
        compare: Some(wgpu::CompareFunction::Greater),
        ..Default::default()
    }
}
