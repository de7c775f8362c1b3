//! Shader programs and their permutations.
//!
//! - `program` holds the program cache keyed by kind and define set
//! - `uniform` names and values pushed into programs
//! - `model` builds per-mesh uniforms and the define set for a material
//! - `ground_shadow` computes the ground darkening factor

pub mod ground_shadow;
pub mod model;
pub mod program;
pub mod uniform;

bitflags::bitflags! {
    /// Shader variant flags selected from material and attribute presence.
    #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
    #[repr(transparent)]
    pub struct ShaderDefines: u32 {
        const HAS_TEXTURE_BASE_COLOR = 1 << 0;
        const HAS_TEXTURE_METALLIC_ROUGHNESS = 1 << 1;
        const HAS_TEXTURE_NORMAL = 1 << 2;
        const HAS_TEXTURE_OCCLUSION = 1 << 3;
        const HAS_TEXTURE_EMISSION = 1 << 4;
        const HAS_ATTRIBUTE_UV = 1 << 5;
        const HAS_ATTRIBUTE_COLOR_3F = 1 << 6;
        const HAS_ATTRIBUTE_COLOR_4F = 1 << 7;
        const HAS_ATTRIBUTE_NORMAL = 1 << 8;
        const HAS_ATTRIBUTE_PBR = 1 << 9;
        const UNPREMULT_TEXTURE_IN_SHADER = 1 << 10;
        /// No material defined, shade with a flat color.
        const DIFFUSE_SHADED = 1 << 11;
        const MODEL_POSITION_ON_GPU = 1 << 12;
        const INSTANCED_ARRAYS = 1 << 13;
        const RENDER_SHADOWS = 1 << 14;
        const DEPTH_TEXTURE = 1 << 15;
    }
}

/// Program families compiled by the graphics collaborator.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ProgramKind {
    Model,
    ModelDepth,
    GroundShadow,
}

/// Fixed texture unit assignment.
pub struct TextureSlots;

impl TextureSlots {
    pub const BASE_COLOR: u32 = 5;
    pub const METALLIC_ROUGHNESS: u32 = 6;
    pub const NORMAL: u32 = 7;
    pub const OCCLUSION: u32 = 8;
    pub const EMISSION: u32 = 9;
    pub const SHADOW_MAP_0: u32 = 11;

    pub fn shadow_map(cascade: usize) -> u32 {
        Self::SHADOW_MAP_0 + cascade as u32
    }
}
