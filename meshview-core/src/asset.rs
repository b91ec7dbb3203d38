//! Decoded model assets
//!
//! Every format loader normalizes its output into a [`ModelAsset`]: a tree
//! of nodes under one group root, the materials those nodes reference and
//! the animation clips found in the file. Assets are plain data and `Send`,
//! so they can be produced on a load thread and instantiated into a
//! [`SceneGraph`](crate::SceneGraph) afterwards.

use crate::animation::AnimationClip;
use crate::error::{Error, Result};
use crate::material::Material;
use crate::mesh::TriangleMesh;
use crate::transform::NodeTransform;
use std::sync::Arc;

/// Geometry plus an index into [`ModelAsset::materials`]
#[derive(Debug, Clone)]
pub struct AssetMesh {
    pub geometry: Arc<TriangleMesh>,
    pub material: usize,
}

#[derive(Debug, Clone)]
pub struct AssetNode {
    pub name: String,
    pub transform: NodeTransform,
    pub mesh: Option<AssetMesh>,
    pub children: Vec<usize>,
}

impl AssetNode {
    pub fn group(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            transform: NodeTransform::identity(),
            mesh: None,
            children: Vec::new(),
        }
    }

    pub fn mesh(name: impl Into<String>, geometry: TriangleMesh, material: usize) -> Self {
        Self {
            mesh: Some(AssetMesh {
                geometry: Arc::new(geometry),
                material,
            }),
            ..Self::group(name)
        }
    }

    pub fn with_transform(mut self, transform: NodeTransform) -> Self {
        self.transform = transform;
        self
    }
}

#[derive(Debug, Clone)]
pub struct ModelAsset {
    pub nodes: Vec<AssetNode>,
    pub root: usize,
    pub materials: Vec<Material>,
    pub clips: Vec<AnimationClip>,
}

impl ModelAsset {
    /// Empty asset with a group root
    pub fn new(root_name: impl Into<String>) -> Self {
        Self {
            nodes: vec![AssetNode::group(root_name)],
            root: 0,
            materials: Vec::new(),
            clips: Vec::new(),
        }
    }

    /// Append a node under `parent`, returning its index
    pub fn add_node(&mut self, parent: usize, node: AssetNode) -> usize {
        let index = self.nodes.len();
        self.nodes.push(node);
        self.nodes[parent].children.push(index);
        index
    }

    pub fn add_material(&mut self, material: impl Into<Material>) -> usize {
        self.materials.push(material.into());
        self.materials.len() - 1
    }

    /// Number of nodes carrying geometry
    pub fn mesh_count(&self) -> usize {
        self.nodes.iter().filter(|n| n.mesh.is_some()).count()
    }

    pub fn triangle_count(&self) -> usize {
        self.nodes
            .iter()
            .filter_map(|n| n.mesh.as_ref())
            .map(|m| m.geometry.face_count())
            .sum()
    }

    /// Check internal references: children, materials and track targets
    pub fn validate(&self) -> Result<()> {
        if self.root >= self.nodes.len() {
            return Err(Error::InvalidData(format!("root {} out of range", self.root)));
        }
        for (i, node) in self.nodes.iter().enumerate() {
            if let Some(child) = node.children.iter().find(|&&c| c >= self.nodes.len()) {
                return Err(Error::InvalidData(format!("node {} has unknown child {}", i, child)));
            }
            if let Some(mesh) = &node.mesh {
                if mesh.material >= self.materials.len() {
                    return Err(Error::InvalidData(format!(
                        "node {} references unknown material {}",
                        i, mesh.material
                    )));
                }
                mesh.geometry.validate()?;
            }
        }
        for clip in &self.clips {
            if let Some(track) = clip.tracks.iter().find(|t| t.target >= self.nodes.len()) {
                return Err(Error::InvalidData(format!(
                    "clip {:?} targets unknown node {}",
                    clip.name, track.target
                )));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::material::StandardMaterial;
    use crate::point::Point3f;

    fn triangle() -> TriangleMesh {
        TriangleMesh::from_vertices_and_faces(
            vec![
                Point3f::new(0.0, 0.0, 0.0),
                Point3f::new(1.0, 0.0, 0.0),
                Point3f::new(0.0, 1.0, 0.0),
            ],
            vec![[0, 1, 2]],
        )
    }

    #[test]
    fn test_build_and_validate() {
        let mut asset = ModelAsset::new("root");
        let mat = asset.add_material(StandardMaterial::default());
        let group = asset.add_node(asset.root, AssetNode::group("g"));
        asset.add_node(group, AssetNode::mesh("tri", triangle(), mat));
        assert_eq!(asset.mesh_count(), 1);
        assert_eq!(asset.triangle_count(), 1);
        assert!(asset.validate().is_ok());
    }

    #[test]
    fn test_validate_catches_missing_material() {
        let mut asset = ModelAsset::new("root");
        asset.add_node(0, AssetNode::mesh("tri", triangle(), 3));
        assert!(asset.validate().is_err());
    }
}
