//! Cascaded shadow maps for the directional light.
//!
//! - `light_matrix` builds the stable light projection of one cascade
//! - `cascade` holds cascade state and the shadow parameters
//! - `renderer` is the cascade manager used by the draw code

pub mod cascade;
pub mod light_matrix;
pub mod renderer;

pub use cascade::{ShadowCascade, ShadowParameters};
pub use renderer::{GroundQuad, LayerRenderer, ShadowRenderer};
