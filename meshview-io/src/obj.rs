//! Wavefront OBJ support with optional MTL material library

use crate::error::{LoadError, Result};
use crate::format::{FormatLoader, LoadRequest, SourceFormat};
use crate::progress::LoadProgress;
use crate::transport::{chain_progress, Transport};
use meshview_core::{
    point_from_array, vector_from_array, AssetNode, Color, ModelAsset, StandardMaterial,
    TriangleMesh,
};
use std::io::{BufReader, Read};

/// Shared surface color for OBJ meshes without an MTL binding
pub const OBJ_DEFAULT_COLOR: u32 = 0xFFFAFA;

/// Name under which a caller-supplied MTL is offered to OBJ sources that do
/// not declare an `mtllib` themselves
const SUPPLIED_MTLLIB: &str = "supplied.mtl";

pub struct ObjLoader;

impl ObjLoader {
    /// Decode OBJ bytes. With `mtl`, materials are bound by their `usemtl`
    /// names; meshes left unbound share one default material.
    pub fn parse(obj: &[u8], mtl: Option<&[u8]>) -> Result<ModelAsset> {
        let library = match mtl {
            Some(bytes) => Some(
                tobj::load_mtl_buf(&mut BufReader::new(bytes))
                    .map_err(|e| LoadError::parse("mtl", e))?,
            ),
            None => None,
        };

        let load_opts = tobj::LoadOptions {
            triangulate: true,
            single_index: true,
            ..Default::default()
        };

        let declares_mtllib = std::str::from_utf8(obj)
            .map(|s| s.lines().any(|l| l.trim_start().starts_with("mtllib")))
            .unwrap_or(false);
        let prefix = match library {
            Some(_) if !declares_mtllib => format!("mtllib {}\n", SUPPLIED_MTLLIB),
            _ => String::new(),
        };
        let mut reader = BufReader::new(prefix.as_bytes().chain(obj));

        let (models, materials) = tobj::load_obj_buf(&mut reader, &load_opts, |_| match &library {
            Some(lib) => Ok(lib.clone()),
            None => Ok((Vec::new(), Default::default())),
        })
        .map_err(|e| LoadError::parse("obj", e))?;
        let materials = materials.unwrap_or_default();

        let mut asset = ModelAsset::new("OBJ");
        let bound: Vec<usize> = materials
            .iter()
            .map(|m| asset.add_material(convert_material(m)))
            .collect();
        let mut fallback: Option<usize> = None;

        for model in models {
            let mesh = &model.mesh;
            let vertices: Vec<_> = mesh
                .positions
                .chunks_exact(3)
                .map(|p| point_from_array([p[0], p[1], p[2]]))
                .collect();
            let faces: Vec<[usize; 3]> = if mesh.indices.is_empty() {
                (0..vertices.len() / 3)
                    .map(|i| [3 * i, 3 * i + 1, 3 * i + 2])
                    .collect()
            } else {
                mesh.indices
                    .chunks_exact(3)
                    .map(|f| [f[0] as usize, f[1] as usize, f[2] as usize])
                    .collect()
            };
            if faces.is_empty() {
                log::debug!("OBJ model '{}' has no faces, skipping", model.name);
                continue;
            }

            let mut geometry = TriangleMesh::from_vertices_and_faces(vertices, faces);
            geometry.validate().map_err(|e| LoadError::parse("obj", e))?;
            if mesh.normals.len() == mesh.positions.len() {
                geometry.set_normals(
                    mesh.normals
                        .chunks_exact(3)
                        .map(|n| vector_from_array([n[0], n[1], n[2]]))
                        .collect(),
                );
            } else {
                geometry.compute_vertex_normals();
            }

            let material = match mesh.material_id.and_then(|id| bound.get(id)) {
                Some(&m) => m,
                None => *fallback.get_or_insert_with(|| {
                    asset.add_material(StandardMaterial::flat(
                        "default",
                        Color::from_hex_u32(OBJ_DEFAULT_COLOR),
                        0.5,
                        0.5,
                    ))
                }),
            };
            asset.add_node(asset.root, AssetNode::mesh(model.name, geometry, material));
        }

        Ok(asset)
    }
}

/// MTL carries Phong terms; map them onto the metal/rough model
fn convert_material(m: &tobj::Material) -> StandardMaterial {
    let [r, g, b] = m.diffuse.unwrap_or([1.0, 1.0, 1.0]);
    let shininess = m.shininess.unwrap_or(0.0).clamp(0.0, 1000.0);
    StandardMaterial {
        name: m.name.clone(),
        color: Color::new(r, g, b),
        metalness: 0.0,
        roughness: 1.0 - (shininess / 1000.0).sqrt(),
        opacity: m.dissolve.unwrap_or(1.0).clamp(0.0, 1.0),
        wireframe: false,
    }
}

impl FormatLoader for ObjLoader {
    fn format(&self) -> SourceFormat {
        SourceFormat::Obj
    }

    fn decode(
        &self,
        request: &LoadRequest,
        transport: &dyn Transport,
        progress: &mut dyn FnMut(LoadProgress),
    ) -> Result<ModelAsset> {
        // material library first so geometry parses bound to it
        let mtl = match &request.material_url {
            Some(url) => Some(transport.fetch(url, &mut *progress)?),
            None => None,
        };
        let done = mtl.as_ref().map_or(0, |m| m.len() as u64);
        let obj = transport.fetch(&request.url, &mut chain_progress(done, progress))?;
        let asset = Self::parse(&obj, mtl.as_deref())?;
        if asset.mesh_count() == 0 {
            return Err(LoadError::Empty {
                url: request.url.clone(),
            });
        }
        Ok(asset)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const TWO_QUADS: &str = "o first
v 0 0 0
v 1 0 0
v 1 1 0
v 0 1 0
usemtl red
f 1 2 3 4
o second
v 0 0 1
v 1 0 1
v 1 1 1
usemtl missing
f 5 6 7
";

    const RED_MTL: &str = "newmtl red
Kd 1.0 0.0 0.0
Ns 250
d 0.5
";

    fn material_of(asset: &ModelAsset, node: usize) -> usize {
        asset.nodes[node].mesh.as_ref().unwrap().material
    }

    #[test]
    fn test_without_mtl_meshes_share_default() {
        let asset = ObjLoader::parse(TWO_QUADS.as_bytes(), None).unwrap();
        let children = asset.nodes[asset.root].children.clone();
        assert_eq!(children.len(), 2);
        assert_eq!(asset.materials.len(), 1);
        assert_eq!(material_of(&asset, children[0]), material_of(&asset, children[1]));

        let color = asset.materials[0].color().unwrap();
        assert_eq!(color.to_hex(), "#FFFAFA");
        // quad triangulated
        assert_eq!(asset.triangle_count(), 3);
    }

    #[test]
    fn test_with_mtl_binds_by_name() {
        let asset = ObjLoader::parse(TWO_QUADS.as_bytes(), Some(RED_MTL.as_bytes())).unwrap();
        let children = asset.nodes[asset.root].children.clone();

        let first = &asset.materials[material_of(&asset, children[0])];
        assert_eq!(first.color().unwrap().to_hex(), "#FF0000");

        // `missing` is not in the library
        let second = &asset.materials[material_of(&asset, children[1])];
        assert_eq!(second.color().unwrap().to_hex(), "#FFFAFA");
    }

    #[test]
    fn test_mtl_phong_terms() {
        let lib = tobj::load_mtl_buf(&mut BufReader::new(RED_MTL.as_bytes())).unwrap();
        let m = convert_material(&lib.0[0]);
        approx::assert_relative_eq!(m.opacity, 0.5);
        approx::assert_relative_eq!(m.roughness, 0.5);
    }

    #[test]
    fn test_progress_covers_library_and_geometry() {
        let dir = tempfile::tempdir().unwrap();
        let obj = dir.path().join("quads.obj");
        let mtl = dir.path().join("quads.mtl");
        std::fs::write(&obj, TWO_QUADS).unwrap();
        std::fs::write(&mtl, RED_MTL).unwrap();

        let request = LoadRequest::new(obj.to_str().unwrap()).with_material(mtl.to_str().unwrap());
        let mut events = Vec::new();
        ObjLoader
            .decode(
                &request,
                &crate::transport::DefaultTransport::with_chunk_size(8),
                &mut |p| events.push(p),
            )
            .unwrap();

        let everything = (TWO_QUADS.len() + RED_MTL.len()) as u64;
        assert_eq!(events.last().unwrap().loaded, everything);
        assert_eq!(events.last().unwrap().total, Some(everything));
        assert!(events.windows(2).all(|w| w[0].loaded <= w[1].loaded));
    }

    #[test]
    fn test_empty_source() {
        let asset = ObjLoader::parse(b"# nothing here\n", None).unwrap();
        assert_eq!(asset.mesh_count(), 0);
    }
}
