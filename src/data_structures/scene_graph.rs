//! Scene graph for models.
//!
//! Nodes live in an arena owned by their [`Model`] and refer to their children
//! by [`NodeId`]. The tree is acyclic by construction: children can only be
//! attached to nodes that already exist and a node has at most one parent.

use anyhow::ensure;
use cgmath::{Deg, Matrix4, SquareMatrix, Vector3};

use crate::{
    data_structures::model::Mesh,
    transform::{LngLat, MapTransform},
};

/// Index of a node in its model's arena.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(pub usize);

#[derive(Clone, Debug, PartialEq)]
pub struct Node {
    pub name: String,
    /// Local transform relative to the model root.
    pub matrix: Matrix4<f64>,
    pub meshes: Vec<Mesh>,
    pub children: Vec<NodeId>,
}

impl Node {
    pub fn new(name: impl Into<String>, matrix: Matrix4<f64>, meshes: Vec<Mesh>) -> Self {
        Self {
            name: name.into(),
            matrix,
            meshes,
            children: Vec::new(),
        }
    }
}

/// A loaded model: node arena, root nodes and per-frame world matrix.
#[derive(Clone, Debug)]
pub struct Model {
    pub id: String,
    pub nodes: Vec<Node>,
    pub roots: Vec<NodeId>,
    pub position: LngLat,
    /// Model-to-world matrix, rebuilt every frame from paint properties.
    pub matrix: Matrix4<f64>,
    has_parent: Vec<bool>,
}

impl Model {
    pub fn new(id: impl Into<String>, position: LngLat) -> Self {
        Self {
            id: id.into(),
            nodes: Vec::new(),
            roots: Vec::new(),
            position,
            matrix: Matrix4::identity(),
            has_parent: Vec::new(),
        }
    }

    /// Add a node to the arena without attaching it anywhere.
    pub fn add_node(&mut self, node: Node) -> NodeId {
        self.nodes.push(node);
        self.has_parent.push(false);
        NodeId(self.nodes.len() - 1)
    }

    pub fn add_root(&mut self, node: Node) -> NodeId {
        let id = self.add_node(node);
        self.roots.push(id);
        id
    }

    /// Attach `child` below `parent`.
    pub fn add_child(&mut self, parent: NodeId, child: NodeId) -> anyhow::Result<()> {
        ensure!(parent.0 < self.nodes.len(), "unknown parent node {}", parent.0);
        ensure!(child.0 < self.nodes.len(), "unknown child node {}", child.0);
        ensure!(parent != child, "node {} cannot be its own child", child.0);
        ensure!(!self.has_parent[child.0], "node {} already has a parent", child.0);
        ensure!(!self.roots.contains(&child), "root node {} cannot be a child", child.0);
        ensure!(
            !self.walk_from(child).any(|(id, _)| id == parent),
            "attaching node {} below {} would create a cycle",
            child.0,
            parent.0
        );
        self.has_parent[child.0] = true;
        self.nodes[parent.0].children.push(child);
        Ok(())
    }

    pub fn node(&self, id: NodeId) -> Option<&Node> {
        self.nodes.get(id.0)
    }

    /// Pre-order walk over every node reachable from the roots.
    pub fn walk(&self) -> Walk<'_> {
        Walk {
            model: self,
            stack: self.roots.iter().rev().copied().collect(),
        }
    }

    fn walk_from(&self, start: NodeId) -> Walk<'_> {
        Walk {
            model: self,
            stack: vec![start],
        }
    }

    /// Rebuild [`Model::matrix`] from the layer's paint properties.
    pub fn compute_model_matrix(
        &mut self,
        transform: &dyn MapTransform,
        rotation: [f64; 3],
        scale: [f64; 3],
        translation: [f64; 3],
    ) {
        self.matrix = calculate_model_matrix(transform, self.position, rotation, scale, translation);
    }
}

/// Explicit-stack pre-order traversal of a model's node tree.
pub struct Walk<'a> {
    model: &'a Model,
    stack: Vec<NodeId>,
}

impl<'a> Iterator for Walk<'a> {
    type Item = (NodeId, &'a Node);

    fn next(&mut self) -> Option<Self::Item> {
        while let Some(id) = self.stack.pop() {
            let Some(node) = self.model.nodes.get(id.0) else {
                continue;
            };
            self.stack.extend(node.children.iter().rev().copied());
            return Some((id, node));
        }
        None
    }
}

/// Model-to-world matrix for a model anchored at `position`.
///
/// Rotation is in degrees around x, y and z. Scale is unitless and translation
/// is in meters; both are converted to pixels at the model's latitude. The
/// model's y axis points north, so it is flipped into mercator y.
pub fn calculate_model_matrix(
    transform: &dyn MapTransform,
    position: LngLat,
    rotation: [f64; 3],
    scale: [f64; 3],
    translation: [f64; 3],
) -> Matrix4<f64> {
    let world_size = transform.world_size();
    let pixels_per_meter = transform.pixels_per_meter(position.lat, world_size);
    let anchor = position.to_mercator() * world_size;

    let offset = Vector3::new(
        anchor.x + translation[0] * pixels_per_meter,
        anchor.y - translation[1] * pixels_per_meter,
        translation[2],
    );
    let scaling = Matrix4::from_nonuniform_scale(
        pixels_per_meter * scale[0],
        -pixels_per_meter * scale[1],
        scale[2],
    );
    let rotation = Matrix4::from_angle_z(Deg(rotation[2]))
        * Matrix4::from_angle_y(Deg(rotation[1]))
        * Matrix4::from_angle_x(Deg(rotation[0]));

    Matrix4::from_translation(offset) * scaling * rotation
}
