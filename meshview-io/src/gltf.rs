//! glTF 2.0 support (`.gltf` with external or embedded buffers, `.glb`)
//!
//! The node hierarchy is kept as-is: every glTF node becomes a group
//! carrying its TRS transform, and each triangle primitive of its mesh
//! becomes a child mesh node. Animation channels on translation, rotation
//! and scale are converted into clip tracks targeting those groups.

use crate::error::{LoadError, Result};
use crate::format::{FormatLoader, LoadRequest, SourceFormat};
use crate::progress::LoadProgress;
use crate::transport::{chain_progress, resolve_url, Transport};
use ::gltf::animation::util::ReadOutputs;
use meshview_core::{
    point_from_array, vector_from_array, AnimationClip, AssetNode, Color, Interpolation,
    ModelAsset, NodeTransform, StandardMaterial, Track, TrackProperty, TrackValues,
    TriangleMesh,
};
use nalgebra::{Quaternion, UnitQuaternion, Vector3};
use std::collections::HashMap;

pub(crate) const DRACO_EXTENSION: &str = "KHR_draco_mesh_compression";

pub struct GltfLoader;

impl GltfLoader {
    /// Decode a glTF document. External buffers are resolved against
    /// `base_url` and fetched through `transport`.
    pub fn parse(
        bytes: &[u8],
        base_url: &str,
        transport: &dyn Transport,
        progress: &mut dyn FnMut(LoadProgress),
    ) -> Result<ModelAsset> {
        let gltf = ::gltf::Gltf::from_slice(bytes).map_err(|e| LoadError::parse("gltf", e))?;
        let buffers = load_buffers(&gltf, base_url, transport, progress)?;
        let doc = &gltf.document;

        let scene = doc
            .default_scene()
            .or_else(|| doc.scenes().next())
            .ok_or_else(|| LoadError::parse("gltf", "document has no scene"))?;

        let mut builder = Builder {
            asset: ModelAsset::new(scene.name().unwrap_or("glTF")),
            buffers: &buffers,
            doc,
            materials: HashMap::new(),
            node_map: HashMap::new(),
        };
        let root = builder.asset.root;
        for node in scene.nodes() {
            builder.add_node(&node, root, 0)?;
        }
        builder.add_clips();

        let asset = builder.asset;
        log::debug!(
            "glTF: {} nodes, {} meshes, {} clips",
            asset.nodes.len(),
            asset.mesh_count(),
            asset.clips.len()
        );
        Ok(asset)
    }
}

impl FormatLoader for GltfLoader {
    fn format(&self) -> SourceFormat {
        SourceFormat::Gltf
    }

    fn decode(
        &self,
        request: &LoadRequest,
        transport: &dyn Transport,
        progress: &mut dyn FnMut(LoadProgress),
    ) -> Result<ModelAsset> {
        let bytes = transport.fetch(&request.url, &mut *progress)?;
        let mut buffers_progress = chain_progress(bytes.len() as u64, progress);
        let asset = Self::parse(&bytes, &request.url, transport, &mut buffers_progress)?;
        if asset.mesh_count() == 0 {
            return Err(LoadError::Empty {
                url: request.url.clone(),
            });
        }
        Ok(asset)
    }
}

fn load_buffers(
    gltf: &::gltf::Gltf,
    base_url: &str,
    transport: &dyn Transport,
    progress: &mut dyn FnMut(LoadProgress),
) -> Result<Vec<Vec<u8>>> {
    let mut buffers = Vec::new();
    let mut fetched = 0u64;
    for buffer in gltf.document.buffers() {
        let data = match buffer.source() {
            ::gltf::buffer::Source::Bin => gltf
                .blob
                .clone()
                .ok_or_else(|| LoadError::parse("gltf", "GLB binary chunk missing"))?,
            ::gltf::buffer::Source::Uri(uri) => {
                let data = transport.fetch(
                    &resolve_url(base_url, uri),
                    &mut chain_progress(fetched, &mut *progress),
                )?;
                fetched += data.len() as u64;
                data
            }
        };
        if data.len() < buffer.length() {
            return Err(LoadError::parse(
                "gltf",
                format!(
                    "buffer {} holds {} bytes, expected {}",
                    buffer.index(),
                    data.len(),
                    buffer.length()
                ),
            ));
        }
        buffers.push(data);
    }
    Ok(buffers)
}

struct Builder<'a> {
    asset: ModelAsset,
    buffers: &'a [Vec<u8>],
    doc: &'a ::gltf::Document,
    /// glTF material index (None = default material) to asset material
    materials: HashMap<Option<usize>, usize>,
    /// glTF node index to asset node index
    node_map: HashMap<usize, usize>,
}

/// Deeper hierarchies are treated as malformed
const MAX_DEPTH: usize = 256;

impl Builder<'_> {
    fn add_node(&mut self, node: &::gltf::Node, parent: usize, depth: usize) -> Result<()> {
        if depth > MAX_DEPTH || self.node_map.contains_key(&node.index()) {
            return Err(LoadError::parse(
                "gltf",
                format!("node {} is reachable more than once", node.index()),
            ));
        }
        let name = node
            .name()
            .map(str::to_string)
            .unwrap_or_else(|| format!("node_{}", node.index()));
        let (t, r, s) = node.transform().decomposed();
        let index = self.asset.add_node(
            parent,
            AssetNode::group(name.clone()).with_transform(NodeTransform::from_parts(t, r, s)),
        );
        self.node_map.insert(node.index(), index);

        if let Some(mesh) = node.mesh() {
            let mesh_name = mesh.name().map(str::to_string).unwrap_or(name);
            for prim in mesh.primitives() {
                let Some(geometry) = self.read_primitive(&prim)? else {
                    continue;
                };
                let material = self.material(prim.material());
                self.asset.add_node(
                    index,
                    AssetNode::mesh(format!("{}_{}", mesh_name, prim.index()), geometry, material),
                );
            }
        }

        for child in node.children() {
            self.add_node(&child, index, depth + 1)?;
        }
        Ok(())
    }

    fn read_primitive(&self, prim: &::gltf::Primitive) -> Result<Option<TriangleMesh>> {
        if prim.mode() != ::gltf::mesh::Mode::Triangles {
            log::debug!("skipping primitive with mode {:?}", prim.mode());
            return Ok(None);
        }
        if prim.extension_value(DRACO_EXTENSION).is_some() {
            return decode_compressed(self.doc, self.buffers, prim).map(Some);
        }

        let reader = prim.reader(|b| self.buffers.get(b.index()).map(|d| d.as_slice()));
        let Some(positions) = reader.read_positions() else {
            return Ok(None);
        };
        let vertices: Vec<_> = positions.map(point_from_array).collect();
        let indices: Vec<u32> = match reader.read_indices() {
            Some(it) => it.into_u32().collect(),
            None => (0..vertices.len() as u32).collect(),
        };
        let faces = indices
            .chunks_exact(3)
            .map(|f| [f[0] as usize, f[1] as usize, f[2] as usize])
            .collect();

        let mut mesh = TriangleMesh::from_vertices_and_faces(vertices, faces);
        mesh.validate().map_err(|e| LoadError::parse("gltf", e))?;
        match reader.read_normals() {
            Some(normals) => mesh.set_normals(normals.map(vector_from_array).collect()),
            None => mesh.compute_vertex_normals(),
        }
        Ok(Some(mesh))
    }

    fn material(&mut self, material: ::gltf::Material) -> usize {
        let key = material.index();
        if let Some(&id) = self.materials.get(&key) {
            return id;
        }
        let pbr = material.pbr_metallic_roughness();
        let [r, g, b, a] = pbr.base_color_factor();
        let id = self.asset.add_material(StandardMaterial {
            name: material.name().unwrap_or("default").to_string(),
            color: Color::new(r, g, b),
            metalness: pbr.metallic_factor(),
            roughness: pbr.roughness_factor(),
            opacity: a,
            wireframe: false,
        });
        self.materials.insert(key, id);
        id
    }

    fn add_clips(&mut self) {
        let (doc, buffers) = (self.doc, self.buffers);
        for anim in doc.animations() {
            let mut tracks = Vec::new();
            for channel in anim.channels() {
                let Some(&target) = self.node_map.get(&channel.target().node().index()) else {
                    continue;
                };
                let reader = channel.reader(|b| buffers.get(b.index()).map(|d| d.as_slice()));
                let (Some(inputs), Some(outputs)) = (reader.read_inputs(), reader.read_outputs())
                else {
                    continue;
                };
                let times: Vec<f32> = inputs.collect();
                let cubic = channel.sampler().interpolation()
                    == ::gltf::animation::Interpolation::CubicSpline;
                let interpolation = match channel.sampler().interpolation() {
                    ::gltf::animation::Interpolation::Step => Interpolation::Step,
                    _ => Interpolation::Linear,
                };

                let (property, values) = match outputs {
                    ReadOutputs::Translations(it) => (
                        TrackProperty::Translation,
                        TrackValues::Vec3(keyframes(it.map(Vector3::from), cubic)),
                    ),
                    ReadOutputs::Scales(it) => (
                        TrackProperty::Scale,
                        TrackValues::Vec3(keyframes(it.map(Vector3::from), cubic)),
                    ),
                    ReadOutputs::Rotations(it) => {
                        let quats = it.into_f32().map(|q| {
                            UnitQuaternion::from_quaternion(Quaternion::new(q[3], q[0], q[1], q[2]))
                        });
                        (TrackProperty::Rotation, TrackValues::Quat(keyframes(quats, cubic)))
                    }
                    ReadOutputs::MorphTargetWeights(_) => continue,
                };
                tracks.push(Track {
                    target,
                    property,
                    interpolation,
                    times,
                    values,
                });
            }
            let name = anim
                .name()
                .map(str::to_string)
                .unwrap_or_else(|| format!("animation_{}", anim.index()));
            self.asset.clips.push(AnimationClip::from_tracks(name, tracks));
        }
    }
}

/// Cubic-spline samplers store in-tangent, value, out-tangent per key; only
/// the values are kept and the track is sampled linearly
fn keyframes<T>(values: impl Iterator<Item = T>, cubic: bool) -> Vec<T> {
    if cubic {
        values.skip(1).step_by(3).collect()
    } else {
        values.collect()
    }
}

#[cfg(feature = "draco")]
fn decode_compressed(
    doc: &::gltf::Document,
    buffers: &[Vec<u8>],
    prim: &::gltf::Primitive,
) -> Result<TriangleMesh> {
    crate::draco::decode_primitive(doc, buffers, prim)
}

#[cfg(not(feature = "draco"))]
fn decode_compressed(
    _doc: &::gltf::Document,
    _buffers: &[Vec<u8>],
    _prim: &::gltf::Primitive,
) -> Result<TriangleMesh> {
    Err(LoadError::Compressed {
        message: format!(
            "{} primitives need meshview-io built with the `draco` feature",
            DRACO_EXTENSION
        ),
    })
}
