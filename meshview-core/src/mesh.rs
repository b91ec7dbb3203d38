//! Mesh data structures and functionality

use crate::error::{Error, Result};
use crate::point::*;
use serde::{Deserialize, Serialize};

/// A triangle mesh with vertices and faces
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TriangleMesh {
    pub vertices: Vec<Point3f>,
    pub faces: Vec<[usize; 3]>,
    pub normals: Option<Vec<Vector3f>>,
}

impl TriangleMesh {
    /// Create a new empty mesh
    pub fn new() -> Self {
        Self {
            vertices: Vec::new(),
            faces: Vec::new(),
            normals: None,
        }
    }

    /// Create a mesh from vertices and faces
    pub fn from_vertices_and_faces(vertices: Vec<Point3f>, faces: Vec<[usize; 3]>) -> Self {
        Self {
            vertices,
            faces,
            normals: None,
        }
    }

    /// Get the number of vertices
    pub fn vertex_count(&self) -> usize {
        self.vertices.len()
    }

    /// Get the number of faces
    pub fn face_count(&self) -> usize {
        self.faces.len()
    }

    /// Check if the mesh is empty
    pub fn is_empty(&self) -> bool {
        self.vertices.is_empty() || self.faces.is_empty()
    }

    /// Area-weighted vertex normals, used when a format ships none. Faces
    /// referencing missing vertices contribute nothing.
    pub fn compute_vertex_normals(&mut self) {
        let count = self.vertices.len();
        let mut acc = vec![Vector3f::zeros(); count];
        for face in self.faces.iter().filter(|f| f.iter().all(|&i| i < count)) {
            let v0 = self.vertices[face[0]];
            let v1 = self.vertices[face[1]];
            let v2 = self.vertices[face[2]];
            let n = (v1 - v0).cross(&(v2 - v0));
            for &i in face {
                acc[i] += n;
            }
        }
        let normals = acc
            .into_iter()
            .map(|n| n.try_normalize(f32::EPSILON).unwrap_or_else(|| Vector3f::new(0.0, 1.0, 0.0)))
            .collect();
        self.normals = Some(normals);
    }

    /// Set vertex normals
    pub fn set_normals(&mut self, normals: Vec<Vector3f>) {
        if normals.len() == self.vertices.len() {
            self.normals = Some(normals);
        }
    }

    /// Check that every face references an existing vertex
    pub fn validate(&self) -> Result<()> {
        let count = self.vertices.len();
        if let Some(face) = self.faces.iter().find(|f| f.iter().any(|&i| i >= count)) {
            return Err(Error::InvalidData(format!(
                "face {:?} references a vertex beyond {}",
                face, count
            )));
        }
        Ok(())
    }
}

impl Default for TriangleMesh {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn quad() -> TriangleMesh {
        TriangleMesh::from_vertices_and_faces(
            vec![
                Point3f::new(0.0, 0.0, 0.0),
                Point3f::new(1.0, 0.0, 0.0),
                Point3f::new(1.0, 1.0, 0.0),
                Point3f::new(0.0, 1.0, 0.0),
            ],
            vec![[0, 1, 2], [0, 2, 3]],
        )
    }

    #[test]
    fn test_vertex_normals_fill_every_vertex() {
        let mut mesh = quad();
        mesh.compute_vertex_normals();
        let normals = mesh.normals.as_ref().unwrap();
        assert_eq!(normals.len(), 4);
        assert_relative_eq!(normals[0].z, 1.0);
    }

    #[test]
    fn test_validate_rejects_out_of_range_face() {
        let mut mesh = quad();
        assert!(mesh.validate().is_ok());
        mesh.faces.push([0, 1, 7]);
        assert!(mesh.validate().is_err());
    }

    #[test]
    fn test_vertex_normals_skip_dangling_faces() {
        let mut mesh = quad();
        mesh.faces.push([0, 1, 9]);
        mesh.compute_vertex_normals();
        let normals = mesh.normals.as_ref().unwrap();
        assert_eq!(normals.len(), 4);
        assert_relative_eq!(normals[1].z, 1.0);
    }

    #[test]
    fn test_degenerate_face_gets_fallback_normal() {
        let mut mesh = TriangleMesh::from_vertices_and_faces(
            vec![Point3f::origin(), Point3f::origin(), Point3f::origin()],
            vec![[0, 1, 2]],
        );
        mesh.compute_vertex_normals();
        assert_eq!(mesh.normals.unwrap()[0], Vector3f::new(0.0, 1.0, 0.0));
    }
}
