//! model-shadows
//!
//! Rendering core for 3D models on a map: cascaded shadow maps for a
//! directional light and the draw pipeline for textured/PBR meshes, both
//! standalone and GPU-instanced. The crate decides *what* to draw, in which
//! order, with which transform, and how the shadow volume is computed. The
//! graphics API, map transform, terrain and style are collaborators behind
//! traits so the embedding renderer keeps ownership of them.
//!
//! High-level modules
//! - `camera`: free camera used to build the light view
//! - `context`: graphics collaborator trait, render-state modes and the owned render context
//! - `data_structures`: meshes, materials, node arena, instance buffers, textures
//! - `draw`: draw dispatcher for standalone and instanced model meshes
//! - `elevation`: lazy per-instance terrain elevation updates
//! - `math`: frustums, bounding boxes, mercator helpers and precision narrowing
//! - `pipelines`: shader-define permutations, programs and uniforms
//! - `render`: scene traversal and transparent depth sorting
//! - `shadows`: light-matrix builder and the shadow cascade manager
//! - `style`, `terrain`, `transform`: collaborator interfaces
//!

pub mod camera;
pub mod context;
pub mod data_structures;
pub mod draw;
pub mod elevation;
pub mod math;
pub mod pipelines;
pub mod render;
pub mod shadows;
pub mod style;
pub mod terrain;
pub mod transform;

// Re-exports commonly used crates for convenience in downstream code.
pub use cgmath;
pub use wgpu;
