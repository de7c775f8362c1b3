//! Scene traversal and draw ordering.
//!
//! Walks the node tree of every model once per frame and produces
//! [`SortedMeshRecord`]s. Opaque meshes keep traversal order; transparent
//! meshes are sorted back to front by the depth of their centroid.
//!
//! Every node is placed relative to the model root: its world matrix is
//! `model_matrix * node.matrix`. Ancestor transforms are not chained.

use cgmath::{Matrix4, Vector4};

use crate::data_structures::{
    model::Mesh,
    scene_graph::Model,
};

/// One mesh ready to draw this frame.
#[derive(Clone, Debug)]
pub struct SortedMeshRecord<'a> {
    pub mesh: &'a Mesh,
    /// Distance of the centroid from the camera. 0 for opaque meshes.
    pub depth: f64,
    pub model_index: usize,
    pub world_view_projection: Matrix4<f64>,
    pub node_model_matrix: Matrix4<f64>,
}

#[derive(Clone, Debug, Default)]
pub struct SortedMeshes<'a> {
    pub opaque: Vec<SortedMeshRecord<'a>>,
    pub transparent: Vec<SortedMeshRecord<'a>>,
}

impl<'a> SortedMeshes<'a> {
    pub fn len(&self) -> usize {
        self.opaque.len() + self.transparent.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Classify the meshes of `model` and append them to `out`.
///
/// Transparent meshes whose centroid is behind a perspective camera are
/// dropped. `out.transparent` is left unsorted.
pub fn prepare_meshes<'a>(
    model: &'a Model,
    model_index: usize,
    model_matrix: &Matrix4<f64>,
    projection: &Matrix4<f64>,
    orthographic: bool,
    out: &mut SortedMeshes<'a>,
) {
    for (_, node) in model.walk() {
        let node_model_matrix = model_matrix * node.matrix;
        let world_view_projection = projection * node_model_matrix;

        for mesh in &node.meshes {
            if !mesh.material.is_transparent() {
                out.opaque.push(SortedMeshRecord {
                    mesh,
                    depth: 0.0,
                    model_index,
                    world_view_projection,
                    node_model_matrix,
                });
                continue;
            }

            let c = mesh.centroid;
            let clip = world_view_projection * Vector4::new(c.x, c.y, c.z, 1.0);
            // w is the distance in front of a perspective camera
            if !orthographic && clip.w <= 0.0 {
                continue;
            }
            let depth = if orthographic { clip.z } else { clip.w };
            out.transparent.push(SortedMeshRecord {
                mesh,
                depth,
                model_index,
                world_view_projection,
                node_model_matrix,
            });
        }
    }
}

/// Farthest first. Equal depths keep their traversal order.
pub fn sort_transparent(records: &mut [SortedMeshRecord<'_>]) {
    records.sort_by(|a, b| b.depth.total_cmp(&a.depth));
}

/// Traverse all models with their current world matrices and sort.
pub fn prepare_models<'a>(models: &'a [Model], projection: &Matrix4<f64>, orthographic: bool) -> SortedMeshes<'a> {
    let mut sorted = SortedMeshes::default();
    for (index, model) in models.iter().enumerate() {
        prepare_meshes(model, index, &model.matrix, projection, orthographic, &mut sorted);
    }
    sort_transparent(&mut sorted.transparent);
    log::trace!(
        "prepared {} opaque and {} transparent meshes",
        sorted.opaque.len(),
        sorted.transparent.len()
    );
    sorted
}
