//! STL support (ASCII and binary)

use crate::error::{LoadError, Result};
use crate::format::{FormatLoader, LoadRequest, SourceFormat};
use crate::progress::LoadProgress;
use crate::transport::Transport;
use meshview_core::{
    point_from_array, AssetNode, Color, ModelAsset, StandardMaterial, TriangleMesh,
};
use std::io::Cursor;

/// Surface color of STL parts; the format carries no material
pub const STL_DEFAULT_COLOR: u32 = 0xFFE4E1;

pub struct StlLoader;

impl StlLoader {
    /// Decode STL bytes into a group holding a single mesh
    pub fn parse(bytes: &[u8]) -> Result<ModelAsset> {
        let stl = stl_io::read_stl(&mut Cursor::new(bytes)).map_err(|e| LoadError::parse("stl", e))?;
        log::debug!(
            "STL contains {} vertices, {} triangles",
            stl.vertices.len(),
            stl.faces.len()
        );

        let vertices = stl.vertices.iter().map(|v| point_from_array(v.0)).collect();
        let faces = stl
            .faces
            .iter()
            .map(|f| f.vertices)
            .filter(|[a, b, c]| a != b && b != c && a != c)
            .collect();
        let mut mesh = TriangleMesh::from_vertices_and_faces(vertices, faces);
        mesh.validate()?;
        mesh.compute_vertex_normals();

        let mut asset = ModelAsset::new("STL");
        let material = asset.add_material(StandardMaterial::flat(
            "stl",
            Color::from_hex_u32(STL_DEFAULT_COLOR),
            0.5,
            0.5,
        ));
        if !mesh.is_empty() {
            asset.add_node(asset.root, AssetNode::mesh("stl_mesh", mesh, material));
        }
        Ok(asset)
    }
}

impl FormatLoader for StlLoader {
    fn format(&self) -> SourceFormat {
        SourceFormat::Stl
    }

    fn decode(
        &self,
        request: &LoadRequest,
        transport: &dyn Transport,
        progress: &mut dyn FnMut(LoadProgress),
    ) -> Result<ModelAsset> {
        let bytes = transport.fetch(&request.url, progress)?;
        let asset = Self::parse(&bytes)?;
        if asset.mesh_count() == 0 {
            return Err(LoadError::Empty {
                url: request.url.clone(),
            });
        }
        Ok(asset)
    }
}
