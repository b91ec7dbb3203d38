//! Arena scene graph
//!
//! Nodes live in a slot arena addressed by [`NodeId`]. A node is "live" when
//! its parent chain reaches the scene root; detached subtrees keep their
//! ids and can be re-attached, which is how overlays are toggled without
//! being rebuilt.

use crate::asset::ModelAsset;
use crate::bounds::{Aabb, Bounded};
use crate::color::Color;
use crate::error::{Error, Result};
use crate::material::{MaterialId, MaterialLibrary};
use crate::mesh::TriangleMesh;
use crate::transform::NodeTransform;
use nalgebra::Matrix4;
use std::sync::Arc;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(usize);

impl NodeId {
    pub fn index(&self) -> usize {
        self.0
    }
}

/// Visual aids drawn on top of the model
#[derive(Debug, Clone, PartialEq)]
pub enum OverlayKind {
    /// Three colored axis lines of the given length
    Axes { size: f32 },
    /// Square grid on the XZ plane
    Grid { size: f32, divisions: u32 },
    /// Outline of a bounding box
    BoundingBox { bounds: Aabb, color: Color },
}

#[derive(Debug, Clone, PartialEq)]
pub struct HemisphereLight {
    pub sky: Color,
    pub ground: Color,
    pub intensity: f32,
}

#[derive(Debug, Clone)]
pub enum NodeKind {
    Group,
    Mesh {
        geometry: Arc<TriangleMesh>,
        material: MaterialId,
    },
    Light(HemisphereLight),
    Overlay(OverlayKind),
}

#[derive(Debug, Clone)]
pub struct Node {
    pub name: String,
    pub transform: NodeTransform,
    pub kind: NodeKind,
    parent: Option<NodeId>,
    children: Vec<NodeId>,
}

impl Node {
    pub fn parent(&self) -> Option<NodeId> {
        self.parent
    }

    pub fn children(&self) -> &[NodeId] {
        &self.children
    }

    pub fn is_mesh(&self) -> bool {
        matches!(self.kind, NodeKind::Mesh { .. })
    }
}

/// Node ids of an instantiated asset
#[derive(Debug, Clone)]
pub struct Instance {
    pub root: NodeId,
    /// Scene node for each asset node, by asset index
    pub nodes: Vec<NodeId>,
}

#[derive(Debug)]
pub struct SceneGraph {
    nodes: Vec<Option<Node>>,
    root: NodeId,
    materials: MaterialLibrary,
    pub background: Option<Color>,
}

impl SceneGraph {
    pub fn new() -> Self {
        let root = Node {
            name: "Scene".to_string(),
            transform: NodeTransform::identity(),
            kind: NodeKind::Group,
            parent: None,
            children: Vec::new(),
        };
        Self {
            nodes: vec![Some(root)],
            root: NodeId(0),
            materials: MaterialLibrary::new(),
            background: None,
        }
    }

    pub fn root(&self) -> NodeId {
        self.root
    }

    pub fn materials(&self) -> &MaterialLibrary {
        &self.materials
    }

    pub fn materials_mut(&mut self) -> &mut MaterialLibrary {
        &mut self.materials
    }

    /// Create a detached node
    pub fn create_node(&mut self, name: impl Into<String>, kind: NodeKind) -> NodeId {
        self.nodes.push(Some(Node {
            name: name.into(),
            transform: NodeTransform::identity(),
            kind,
            parent: None,
            children: Vec::new(),
        }));
        NodeId(self.nodes.len() - 1)
    }

    pub fn node(&self, id: NodeId) -> Result<&Node> {
        self.nodes
            .get(id.0)
            .and_then(|n| n.as_ref())
            .ok_or(Error::UnknownNode(id.0))
    }

    pub fn node_mut(&mut self, id: NodeId) -> Result<&mut Node> {
        self.nodes
            .get_mut(id.0)
            .and_then(|n| n.as_mut())
            .ok_or(Error::UnknownNode(id.0))
    }

    pub fn contains(&self, id: NodeId) -> bool {
        matches!(self.nodes.get(id.0), Some(Some(_)))
    }

    /// Number of live slots, attached or not
    pub fn node_count(&self) -> usize {
        self.nodes.iter().filter(|n| n.is_some()).count()
    }

    /// Parent `child` under `parent`, moving it if it already has a parent
    pub fn attach(&mut self, child: NodeId, parent: NodeId) -> Result<()> {
        self.node(child)?;
        self.node(parent)?;
        if child == parent || self.is_ancestor(child, parent) {
            return Err(Error::Cycle {
                child: child.0,
                parent: parent.0,
            });
        }
        self.detach(child)?;
        self.node_mut(parent)?.children.push(child);
        self.node_mut(child)?.parent = Some(parent);
        Ok(())
    }

    /// Attach under the scene root
    pub fn add(&mut self, child: NodeId) -> Result<()> {
        let root = self.root;
        self.attach(child, root)
    }

    /// Remove `child` from its parent; a detached node is left as is
    pub fn detach(&mut self, child: NodeId) -> Result<()> {
        let parent = match self.node(child)?.parent {
            Some(p) => p,
            None => return Ok(()),
        };
        self.node_mut(parent)?.children.retain(|&c| c != child);
        self.node_mut(child)?.parent = None;
        Ok(())
    }

    /// True when `ancestor` is on the parent chain of `node`
    pub fn is_ancestor(&self, ancestor: NodeId, node: NodeId) -> bool {
        let mut current = self.node(node).ok().and_then(|n| n.parent);
        while let Some(id) = current {
            if id == ancestor {
                return true;
            }
            current = self.node(id).ok().and_then(|n| n.parent);
        }
        false
    }

    /// True when the node is reachable from the scene root
    pub fn is_attached(&self, id: NodeId) -> bool {
        id == self.root || self.is_ancestor(self.root, id)
    }

    /// The subtree rooted at `id`, pre-order, `id` first
    pub fn descendants(&self, id: NodeId) -> Vec<NodeId> {
        let mut out = Vec::new();
        let mut stack = vec![id];
        while let Some(current) = stack.pop() {
            let Ok(node) = self.node(current) else {
                continue;
            };
            out.push(current);
            stack.extend(node.children.iter().rev().copied());
        }
        out
    }

    /// Mesh nodes in the subtree rooted at `id`
    pub fn mesh_nodes(&self, id: NodeId) -> Vec<NodeId> {
        self.descendants(id)
            .into_iter()
            .filter(|&n| self.node(n).map(|n| n.is_mesh()).unwrap_or(false))
            .collect()
    }

    pub fn mesh_material(&self, id: NodeId) -> Result<MaterialId> {
        match &self.node(id)?.kind {
            NodeKind::Mesh { material, .. } => Ok(*material),
            _ => Err(Error::InvalidData(format!("node {} is not a mesh", id.0))),
        }
    }

    pub fn set_mesh_material(&mut self, id: NodeId, material: MaterialId) -> Result<()> {
        if !self.materials.contains(material) {
            return Err(Error::UnknownMaterial(material.index()));
        }
        match &mut self.node_mut(id)?.kind {
            NodeKind::Mesh { material: slot, .. } => {
                *slot = material;
                Ok(())
            }
            _ => Err(Error::InvalidData(format!("node {} is not a mesh", id.0))),
        }
    }

    /// Product of local matrices from the top of the parent chain down
    pub fn world_matrix(&self, id: NodeId) -> Result<Matrix4<f32>> {
        let mut matrix = self.node(id)?.transform.to_matrix();
        let mut current = self.node(id)?.parent;
        while let Some(parent) = current {
            let node = self.node(parent)?;
            matrix = node.transform.to_matrix() * matrix;
            current = node.parent;
        }
        Ok(matrix)
    }

    /// World-space box around every mesh in the subtree
    pub fn world_bounds(&self, id: NodeId) -> Option<Aabb> {
        let mut bounds: Option<Aabb> = None;
        for mesh_id in self.mesh_nodes(id) {
            let Ok(node) = self.node(mesh_id) else {
                continue;
            };
            let NodeKind::Mesh { geometry, .. } = &node.kind else {
                continue;
            };
            let (Some(local), Ok(world)) = (geometry.bounding_box(), self.world_matrix(mesh_id)) else {
                continue;
            };
            let b = local.transformed(&world);
            bounds = Some(match bounds {
                Some(acc) => acc.union(&b),
                None => b,
            });
        }
        bounds
    }

    /// Detach the subtree and free every slot in it
    pub fn remove_subtree(&mut self, id: NodeId) -> Result<usize> {
        self.detach(id)?;
        let doomed = self.descendants(id);
        for n in &doomed {
            self.nodes[n.0] = None;
        }
        Ok(doomed.len())
    }

    /// Copy an asset into the arena as a detached subtree. Asset materials
    /// become library entries; meshes sharing an asset material share the id.
    pub fn instantiate(&mut self, asset: &ModelAsset) -> Result<Instance> {
        asset.validate()?;

        let material_ids: Vec<MaterialId> = asset
            .materials
            .iter()
            .map(|m| self.materials.insert(m.clone()))
            .collect();

        let nodes: Vec<NodeId> = asset
            .nodes
            .iter()
            .map(|n| {
                let kind = match &n.mesh {
                    Some(mesh) => NodeKind::Mesh {
                        geometry: Arc::clone(&mesh.geometry),
                        material: material_ids[mesh.material],
                    },
                    None => NodeKind::Group,
                };
                let id = self.create_node(n.name.clone(), kind);
                if let Some(Some(node)) = self.nodes.get_mut(id.0) {
                    node.transform = n.transform;
                }
                id
            })
            .collect();

        for (i, n) in asset.nodes.iter().enumerate() {
            for &child in &n.children {
                self.attach(nodes[child], nodes[i])?;
            }
        }

        Ok(Instance {
            root: nodes[asset.root],
            nodes,
        })
    }
}

impl Default for SceneGraph {
    fn default() -> Self {
        Self::new()
    }
}
