//! Meshes and PBR materials.

use cgmath::Vector3;

use crate::{
    context::{BufferHandle, Segment},
    data_structures::texture::Texture,
};

/// How a material's alpha channel is interpreted.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum AlphaMode {
    #[default]
    Opaque,
    Mask,
    Blend,
}

#[derive(Clone, Debug, PartialEq)]
pub struct PbrMetallicRoughness {
    pub base_color_factor: [f32; 4],
    pub base_color_texture: Option<Texture>,
    pub metallic_factor: f32,
    pub roughness_factor: f32,
    pub metallic_roughness_texture: Option<Texture>,
}

impl Default for PbrMetallicRoughness {
    fn default() -> Self {
        Self {
            base_color_factor: [1.0, 1.0, 1.0, 1.0],
            base_color_texture: None,
            metallic_factor: 1.0,
            roughness_factor: 1.0,
            metallic_roughness_texture: None,
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct Material {
    pub name: String,
    pub pbr: PbrMetallicRoughness,
    pub normal_texture: Option<Texture>,
    pub occlusion_texture: Option<Texture>,
    pub emissive_texture: Option<Texture>,
    pub emissive_factor: [f32; 3],
    pub emissive_strength: f32,
    pub alpha_mode: AlphaMode,
    pub alpha_cutoff: f32,
    pub double_sided: bool,
    /// False when the source asset carried no material for this mesh.
    pub defined: bool,
}

impl Default for Material {
    fn default() -> Self {
        Self {
            name: String::new(),
            pbr: PbrMetallicRoughness::default(),
            normal_texture: None,
            occlusion_texture: None,
            emissive_texture: None,
            emissive_factor: [0.0, 0.0, 0.0],
            emissive_strength: 1.0,
            alpha_mode: AlphaMode::Opaque,
            alpha_cutoff: 0.5,
            double_sided: false,
            defined: true,
        }
    }
}

impl Material {
    /// Placeholder material for meshes without one.
    pub fn undefined() -> Self {
        Self {
            defined: false,
            ..Default::default()
        }
    }

    pub fn is_transparent(&self) -> bool {
        self.alpha_mode == AlphaMode::Blend
    }
}

/// Per-vertex color buffer and its component count (3 or 4).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ColorBuffer {
    pub buffer: BufferHandle,
    pub item_size: u8,
}

/// Immutable geometry plus its material.
#[derive(Clone, Debug, PartialEq)]
pub struct Mesh {
    pub name: String,
    pub vertex_buffer: BufferHandle,
    pub index_buffer: BufferHandle,
    pub segments: Vec<Segment>,
    pub color_buffer: Option<ColorBuffer>,
    pub normal_buffer: Option<BufferHandle>,
    pub tex_coord_buffer: Option<BufferHandle>,
    pub pbr_buffer: Option<BufferHandle>,
    /// Centroid in mesh-local space.
    pub centroid: Vector3<f64>,
    pub material: Material,
}

impl Mesh {
    /// Vertex buffers bound in addition to positions, in attribute order.
    pub fn dynamic_buffers(&self) -> Vec<BufferHandle> {
        [
            self.normal_buffer,
            self.tex_coord_buffer,
            self.color_buffer.map(|c| c.buffer),
            self.pbr_buffer,
        ]
        .into_iter()
        .flatten()
        .collect()
    }
}
