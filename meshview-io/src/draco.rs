//! Draco-compressed glTF primitives (`draco` feature)

use crate::error::{LoadError, Result};
use crate::gltf::DRACO_EXTENSION;
use ::gltf::accessor::{DataType, Dimensions};
use ::gltf::mesh::Semantic;
use anyhow::Context;
use draco_decoder::{decode_mesh, AttributeDataType, MeshDecodeConfig};
use meshview_core::{point_from_array, vector_from_array, TriangleMesh};

fn compressed(err: anyhow::Error) -> LoadError {
    LoadError::Compressed {
        message: format!("{:#}", err),
    }
}

fn component_count(dimensions: Dimensions) -> usize {
    match dimensions {
        Dimensions::Scalar => 1,
        Dimensions::Vec2 => 2,
        Dimensions::Vec4 => 4,
        _ => 3,
    }
}

fn attribute_type(data_type: DataType) -> AttributeDataType {
    match data_type {
        DataType::F32 => AttributeDataType::Float32,
        DataType::U32 => AttributeDataType::UInt32,
        DataType::U16 => AttributeDataType::UInt16,
        DataType::I16 => AttributeDataType::Int16,
        DataType::U8 => AttributeDataType::UInt8,
        DataType::I8 => AttributeDataType::Int8,
    }
}

fn read_vec3(slice: &[u8], dim: usize) -> Vec<[f32; 3]> {
    slice
        .chunks_exact(4 * dim)
        .map(|c| {
            let f = |i: usize| {
                if i < dim {
                    f32::from_le_bytes([c[4 * i], c[4 * i + 1], c[4 * i + 2], c[4 * i + 3]])
                } else {
                    0.0
                }
            };
            [f(0), f(1), f(2)]
        })
        .collect()
}

/// Decode one compressed primitive into positions, normals and triangles
pub(crate) fn decode_primitive(
    doc: &::gltf::Document,
    buffers: &[Vec<u8>],
    prim: &::gltf::Primitive,
) -> Result<TriangleMesh> {
    decode(doc, buffers, prim).map_err(compressed)
}

fn decode(
    doc: &::gltf::Document,
    buffers: &[Vec<u8>],
    prim: &::gltf::Primitive,
) -> anyhow::Result<TriangleMesh> {
    let ext = prim
        .extension_value(DRACO_EXTENSION)
        .and_then(|v| v.as_object())
        .context("draco extension is not an object")?;
    let view_index = ext
        .get("bufferView")
        .and_then(|v| v.as_u64())
        .context("draco bufferView missing")? as usize;
    let attributes = ext
        .get("attributes")
        .and_then(|v| v.as_object())
        .context("draco attributes missing")?;

    let view = doc
        .views()
        .nth(view_index)
        .context("draco bufferView out of range")?;
    let data = buffers
        .get(view.buffer().index())
        .context("draco buffer missing")?;
    let bytes = data
        .get(view.offset()..view.offset() + view.length())
        .context("draco bufferView exceeds buffer")?;

    let vertex_count = prim
        .get(&Semantic::Positions)
        .context("POSITION accessor missing")?
        .count() as u32;
    let index_count = prim.indices().map(|a| a.count() as u32).unwrap_or(0);

    // decoded attributes come back ordered by their draco id
    let mut mapped: Vec<(u64, Semantic)> = attributes
        .iter()
        .filter_map(|(name, id)| {
            let semantic = match name.as_str() {
                "POSITION" => Semantic::Positions,
                "NORMAL" => Semantic::Normals,
                s => {
                    let set = s.strip_prefix("TEXCOORD_")?.parse().ok()?;
                    Semantic::TexCoords(set)
                }
            };
            Some((id.as_u64()?, semantic))
        })
        .collect();
    mapped.sort_by_key(|(id, _)| *id);

    let mut cfg = MeshDecodeConfig::new(vertex_count, index_count);
    let mut layout = Vec::with_capacity(mapped.len());
    for (_, semantic) in &mapped {
        let accessor = prim
            .get(semantic)
            .context("accessor for draco attribute missing")?;
        let dim = component_count(accessor.dimensions());
        cfg.add_attribute(dim as u32, attribute_type(accessor.data_type()));
        layout.push((semantic.clone(), dim, accessor.data_type()));
    }

    let decoded = pollster::block_on(decode_mesh(bytes, &cfg)).context("draco decode failed")?;

    let mut offset = 0usize;
    let wide = index_count > u16::MAX as u32;
    let index_bytes = index_count as usize * if wide { 4 } else { 2 };
    let index_slice = decoded
        .get(..index_bytes)
        .context("decoded stream shorter than its indices")?;
    let indices: Vec<usize> = if wide {
        index_slice
            .chunks_exact(4)
            .map(|c| u32::from_le_bytes([c[0], c[1], c[2], c[3]]) as usize)
            .collect()
    } else {
        index_slice
            .chunks_exact(2)
            .map(|c| u16::from_le_bytes([c[0], c[1]]) as usize)
            .collect()
    };
    offset += index_bytes;

    let mut positions = None;
    let mut normals = None;
    for (semantic, dim, data_type) in layout {
        let len = dim * vertex_count as usize * attribute_type(data_type).size_in_bytes();
        let slice = decoded
            .get(offset..offset + len)
            .context("decoded stream shorter than its attributes")?;
        offset += len;
        match (semantic, data_type) {
            (Semantic::Positions, DataType::F32) => positions = Some(read_vec3(slice, dim)),
            (Semantic::Normals, DataType::F32) => normals = Some(read_vec3(slice, dim)),
            _ => {}
        }
    }

    let positions = positions.context("draco stream has no float positions")?;
    let faces = if indices.is_empty() {
        (0..positions.len() / 3)
            .map(|i| [3 * i, 3 * i + 1, 3 * i + 2])
            .collect()
    } else {
        indices.chunks_exact(3).map(|f| [f[0], f[1], f[2]]).collect()
    };
    let mut mesh =
        TriangleMesh::from_vertices_and_faces(positions.into_iter().map(point_from_array).collect(), faces);
    match normals {
        Some(n) => mesh.set_normals(n.into_iter().map(vector_from_array).collect()),
        None => mesh.compute_vertex_normals(),
    }
    mesh.validate()?;
    Ok(mesh)
}
