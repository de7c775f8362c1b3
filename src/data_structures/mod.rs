//! Model data structures: meshes, materials, node arenas, instances and textures.
//!
//! - `model` contains mesh and material definitions
//! - `scene_graph` holds the node arena of a model and its world matrix
//! - `instance` holds packed per-instance data and instance buckets
//! - `texture` describes material textures and shadow map textures

pub mod instance;
pub mod model;
pub mod scene_graph;
pub mod texture;
