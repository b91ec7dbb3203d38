//! Binary FBX support
//!
//! The binary node tree is read with `fbxcel` and copied into a small owned
//! [`FbxNode`] tree. `Model` objects become the node hierarchy, linked by the
//! `Connections` section and placed by their `Lcl` TRS properties; meshes hang
//! off the model they are connected to. Each `AnimationStack` becomes a clip
//! whose tracks are resampled from its `AnimationCurve`s. Skinning, blend
//! shapes and FBX materials are not decoded.

use crate::error::{LoadError, Result};
use crate::format::{FormatLoader, LoadRequest, SourceFormat};
use crate::progress::LoadProgress;
use crate::transport::Transport;
use fbxcel::low::v7400::AttributeValue;
use fbxcel::tree::any::AnyTree;
use meshview_core::{
    AnimationClip, AssetNode, Color, Interpolation, ModelAsset, NodeTransform, Point3f,
    StandardMaterial, Track, TrackProperty, TrackValues, TriangleMesh,
};
use nalgebra::{UnitQuaternion, Vector3};
use std::collections::{BTreeSet, HashMap};
use std::io::Cursor;

pub const FBX_BINARY_MAGIC: &[u8] = b"Kaydara FBX Binary";

/// FBX time units per second
pub const FBX_TICKS_PER_SECOND: f64 = 46_186_158_000.0;

pub const FBX_DEFAULT_COLOR: u32 = 0xCCCCCC;

/// Node attribute, widened to a handful of owned shapes
#[derive(Debug, Clone, PartialEq)]
pub enum FbxValue {
    Int(i64),
    Float(f64),
    Str(String),
    IntArray(Vec<i64>),
    FloatArray(Vec<f64>),
    Other,
}

impl FbxValue {
    pub fn as_str(&self) -> Option<&str> {
        match self {
            FbxValue::Str(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            FbxValue::Int(v) => Some(*v),
            FbxValue::Float(v) => Some(*v as i64),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            FbxValue::Int(v) => Some(*v as f64),
            FbxValue::Float(v) => Some(*v),
            _ => None,
        }
    }
}

impl From<&AttributeValue> for FbxValue {
    fn from(value: &AttributeValue) -> Self {
        match value {
            AttributeValue::Bool(v) => FbxValue::Int(*v as i64),
            AttributeValue::I16(v) => FbxValue::Int(*v as i64),
            AttributeValue::I32(v) => FbxValue::Int(*v as i64),
            AttributeValue::I64(v) => FbxValue::Int(*v),
            AttributeValue::F32(v) => FbxValue::Float(*v as f64),
            AttributeValue::F64(v) => FbxValue::Float(*v),
            AttributeValue::ArrI32(v) => FbxValue::IntArray(v.iter().map(|&x| x as i64).collect()),
            AttributeValue::ArrI64(v) => FbxValue::IntArray(v.clone()),
            AttributeValue::ArrF32(v) => FbxValue::FloatArray(v.iter().map(|&x| x as f64).collect()),
            AttributeValue::ArrF64(v) => FbxValue::FloatArray(v.clone()),
            AttributeValue::String(s) => FbxValue::Str(s.clone()),
            _ => FbxValue::Other,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct FbxNode {
    pub name: String,
    pub attributes: Vec<FbxValue>,
    pub children: Vec<FbxNode>,
}

impl FbxNode {
    pub fn new(name: impl Into<String>, attributes: Vec<FbxValue>) -> Self {
        Self {
            name: name.into(),
            attributes,
            children: Vec::new(),
        }
    }

    pub fn with_children(mut self, children: Vec<FbxNode>) -> Self {
        self.children = children;
        self
    }

    pub fn child(&self, name: &str) -> Option<&FbxNode> {
        self.children.iter().find(|c| c.name == name)
    }

    pub fn children_named<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a FbxNode> + 'a {
        self.children.iter().filter(move |c| c.name == name)
    }

    /// Object id, the first attribute of every entry under `Objects`
    pub fn object_id(&self) -> Option<i64> {
        self.attributes.first()?.as_i64()
    }

    /// Object name without the `\0\x01Class` suffix binary files append
    pub fn object_name(&self) -> Option<&str> {
        let raw = self.attributes.get(1)?.as_str()?;
        Some(raw.split("\u{0}\u{1}").next().unwrap_or(raw))
    }

    fn property_entry(&self, key: &str) -> Option<&FbxNode> {
        self.child("Properties70")?
            .children_named("P")
            .find(|p| p.attributes.first().and_then(FbxValue::as_str) == Some(key))
    }

    /// Value of a `Properties70` entry
    pub fn property(&self, key: &str) -> Option<&FbxValue> {
        self.property_entry(key)?.attributes.get(4)
    }

    /// Three-component `Properties70` entry such as `Lcl Translation`
    pub fn property_vec3(&self, key: &str) -> Option<Vector3<f32>> {
        let p = self.property_entry(key)?;
        let axis = |i: usize| p.attributes.get(i).and_then(FbxValue::as_f64).map(|v| v as f32);
        Some(Vector3::new(axis(4)?, axis(5)?, axis(6)?))
    }
}

fn copy_tree(handle: fbxcel::tree::v7400::NodeHandle<'_>) -> FbxNode {
    FbxNode {
        name: handle.name().to_string(),
        attributes: handle.attributes().iter().map(FbxValue::from).collect(),
        children: handle.children().map(copy_tree).collect(),
    }
}

/// Parse binary FBX bytes into an owned node tree
pub fn read_tree(bytes: &[u8]) -> Result<FbxNode> {
    if !bytes.starts_with(FBX_BINARY_MAGIC) {
        return Err(LoadError::parse("fbx", "only binary FBX files are supported"));
    }
    match AnyTree::from_seekable_reader(Cursor::new(bytes)).map_err(|e| LoadError::parse("fbx", e))? {
        AnyTree::V7400(_, tree, _) => Ok(copy_tree(tree.root())),
        _ => Err(LoadError::UnsupportedFormat {
            format: "fbx (unsupported version)".to_string(),
        }),
    }
}

/// Polygon vertex indices end each polygon with a bitwise-negated index;
/// polygons are fan-triangulated
fn triangulate(polygon_indices: &[i64], vertex_count: usize) -> Result<Vec<[usize; 3]>> {
    let mut faces = Vec::new();
    let mut polygon: Vec<usize> = Vec::new();
    for &raw in polygon_indices {
        let (index, last) = if raw < 0 { (!raw, true) } else { (raw, false) };
        let index = index as usize;
        if index >= vertex_count {
            return Err(LoadError::parse(
                "fbx",
                format!("polygon index {} out of {} vertices", index, vertex_count),
            ));
        }
        polygon.push(index);
        if last {
            for i in 1..polygon.len().saturating_sub(1) {
                faces.push([polygon[0], polygon[i], polygon[i + 1]]);
            }
            polygon.clear();
        }
    }
    Ok(faces)
}

fn geometry_mesh(geometry: &FbxNode) -> Result<Option<TriangleMesh>> {
    let Some(FbxValue::FloatArray(coords)) = geometry.child("Vertices").and_then(|v| v.attributes.first()) else {
        return Ok(None);
    };
    let Some(FbxValue::IntArray(indices)) =
        geometry.child("PolygonVertexIndex").and_then(|v| v.attributes.first())
    else {
        return Ok(None);
    };
    let vertices: Vec<Point3f> = coords
        .chunks_exact(3)
        .map(|c| Point3f::new(c[0] as f32, c[1] as f32, c[2] as f32))
        .collect();
    let faces = triangulate(indices, vertices.len())?;
    let mut mesh = TriangleMesh::from_vertices_and_faces(vertices, faces);
    mesh.compute_vertex_normals();
    Ok(Some(mesh))
}

/// Entry of the `Connections` section: `OO` links object to object, `OP`
/// links an object to a named property of its parent
#[derive(Debug, Clone, Copy, PartialEq)]
struct Link<'a> {
    child: i64,
    parent: i64,
    property: Option<&'a str>,
}

fn read_links(root: &FbxNode) -> Vec<Link<'_>> {
    let Some(section) = root.child("Connections") else {
        return Vec::new();
    };
    section
        .children_named("C")
        .filter_map(|c| {
            Some(Link {
                child: c.attributes.get(1)?.as_i64()?,
                parent: c.attributes.get(2)?.as_i64()?,
                property: c.attributes.get(3).and_then(FbxValue::as_str),
            })
        })
        .collect()
}

/// Euler angles in degrees, applied X then Y then Z
fn euler_degrees(angles: &Vector3<f32>) -> UnitQuaternion<f32> {
    UnitQuaternion::from_euler_angles(angles.x.to_radians(), angles.y.to_radians(), angles.z.to_radians())
}

fn pre_rotation(model: &FbxNode) -> UnitQuaternion<f32> {
    model
        .property_vec3("PreRotation")
        .map(|r| euler_degrees(&r))
        .unwrap_or_else(UnitQuaternion::identity)
}

/// Static `Lcl` value of a model, with the FBX default when absent
fn lcl_value(model: &FbxNode, property: TrackProperty) -> Vector3<f32> {
    match property {
        TrackProperty::Translation => model.property_vec3("Lcl Translation").unwrap_or_else(Vector3::zeros),
        TrackProperty::Rotation => model.property_vec3("Lcl Rotation").unwrap_or_else(Vector3::zeros),
        TrackProperty::Scale => model.property_vec3("Lcl Scaling").unwrap_or_else(|| Vector3::repeat(1.0)),
    }
}

fn model_transform(model: &FbxNode) -> NodeTransform {
    NodeTransform {
        translation: lcl_value(model, TrackProperty::Translation),
        rotation: pre_rotation(model) * euler_degrees(&lcl_value(model, TrackProperty::Rotation)),
        scale: lcl_value(model, TrackProperty::Scale),
    }
}

fn lcl_property(name: &str) -> Option<TrackProperty> {
    match name {
        "Lcl Translation" => Some(TrackProperty::Translation),
        "Lcl Rotation" => Some(TrackProperty::Rotation),
        "Lcl Scaling" => Some(TrackProperty::Scale),
        _ => None,
    }
}

/// Add every `Model` to the asset, parents before children. A model whose
/// parent is not a model (or that sits on a parent cycle) hangs off the root.
fn place_models(
    asset: &mut ModelAsset,
    models: &[&FbxNode],
    links: &[Link<'_>],
) -> HashMap<i64, usize> {
    let by_id: HashMap<i64, &FbxNode> = models
        .iter()
        .filter_map(|m| Some((m.object_id()?, *m)))
        .collect();
    let mut parent_of: HashMap<i64, i64> = HashMap::new();
    for link in links.iter().filter(|l| l.property.is_none()) {
        if by_id.contains_key(&link.child) && by_id.contains_key(&link.parent) {
            parent_of.entry(link.child).or_insert(link.parent);
        }
    }

    let mut placed: HashMap<i64, usize> = HashMap::new();
    for (i, model) in models.iter().enumerate() {
        let Some(id) = model.object_id() else {
            continue;
        };
        // walk up to the first placed ancestor
        let mut chain = vec![id];
        let mut cursor = id;
        while let Some(&parent) = parent_of.get(&cursor) {
            if placed.contains_key(&parent) || chain.contains(&parent) {
                break;
            }
            chain.push(parent);
            cursor = parent;
        }
        for &m in chain.iter().rev() {
            if placed.contains_key(&m) {
                continue;
            }
            let node = by_id[&m];
            let parent = parent_of
                .get(&m)
                .and_then(|p| placed.get(p))
                .copied()
                .unwrap_or(asset.root);
            let name = node
                .object_name()
                .filter(|n| !n.is_empty())
                .map(str::to_string)
                .unwrap_or_else(|| format!("model_{}", i));
            let index = asset.add_node(parent, AssetNode::group(name).with_transform(model_transform(node)));
            placed.insert(m, index);
        }
    }
    placed
}

/// One `AnimationCurve`: key times in FBX ticks and float values
struct Curve {
    times: Vec<i64>,
    values: Vec<f64>,
}

impl Curve {
    fn from_node(node: &FbxNode) -> Option<Self> {
        let Some(FbxValue::IntArray(times)) = node.child("KeyTime").and_then(|k| k.attributes.first()) else {
            return None;
        };
        let Some(FbxValue::FloatArray(values)) =
            node.child("KeyValueFloat").and_then(|k| k.attributes.first())
        else {
            return None;
        };
        let n = times.len().min(values.len());
        (n > 0).then(|| Curve {
            times: times[..n].to_vec(),
            values: values[..n].to_vec(),
        })
    }

    /// Linear sample, held constant outside the keyed range
    fn sample(&self, tick: i64) -> f64 {
        let n = self.times.len();
        let next = self.times.partition_point(|&t| t <= tick);
        if next == 0 {
            return self.values[0];
        }
        if next == n {
            return self.values[n - 1];
        }
        let (t0, t1) = (self.times[next - 1], self.times[next]);
        if t1 <= t0 {
            return self.values[next - 1];
        }
        let alpha = (tick - t0) as f64 / (t1 - t0) as f64;
        self.values[next - 1] + (self.values[next] - self.values[next - 1]) * alpha
    }
}

/// Resolves animation objects of one file against the placed models
struct ClipBuilder<'a> {
    objects: HashMap<i64, &'a FbxNode>,
    links: &'a [Link<'a>],
    models: &'a HashMap<i64, usize>,
}

impl<'a> ClipBuilder<'a> {
    /// Objects of class `kind` linked under `parent`, with the link property
    fn linked(&self, parent: i64, kind: &'a str) -> impl Iterator<Item = (&'a FbxNode, Option<&'a str>)> + '_ {
        self.links
            .iter()
            .filter(move |l| l.parent == parent)
            .filter_map(move |l| {
                let object = *self.objects.get(&l.child)?;
                (object.name == kind).then_some((object, l.property))
            })
    }

    /// Model and property a curve node animates
    fn curve_node_target(&self, curve_node: i64) -> Option<(i64, TrackProperty)> {
        self.links.iter().find_map(|l| {
            if l.child != curve_node || !self.models.contains_key(&l.parent) {
                return None;
            }
            Some((l.parent, lcl_property(l.property?)?))
        })
    }

    fn track(&self, curve_node: &FbxNode) -> Option<Track> {
        let (model_id, property) = self.curve_node_target(curve_node.object_id()?)?;
        let model = *self.objects.get(&model_id)?;

        let mut curves: [Option<Curve>; 3] = [None, None, None];
        for (curve, channel) in self.linked(curve_node.object_id()?, "AnimationCurve") {
            let axis = match channel {
                Some("d|X") => 0,
                Some("d|Y") => 1,
                Some("d|Z") => 2,
                _ => continue,
            };
            curves[axis] = Curve::from_node(curve);
        }

        let ticks: BTreeSet<i64> = curves.iter().flatten().flat_map(|c| c.times.iter().copied()).collect();
        if ticks.is_empty() {
            return None;
        }

        let fallback = lcl_value(model, property);
        let defaults = ["d|X", "d|Y", "d|Z"].map(|key| curve_node.property(key).and_then(FbxValue::as_f64));
        let sample = |tick: i64| {
            let axis = |i: usize| match &curves[i] {
                Some(curve) => curve.sample(tick) as f32,
                None => defaults[i].map(|v| v as f32).unwrap_or(fallback[i]),
            };
            Vector3::new(axis(0), axis(1), axis(2))
        };

        let times = ticks.iter().map(|&t| (t as f64 / FBX_TICKS_PER_SECOND) as f32).collect();
        let keys: Vec<Vector3<f32>> = ticks.iter().map(|&t| sample(t)).collect();
        let values = match property {
            TrackProperty::Rotation => {
                let pre = pre_rotation(model);
                TrackValues::Quat(keys.iter().map(|k| pre * euler_degrees(k)).collect())
            }
            _ => TrackValues::Vec3(keys),
        };
        Some(Track {
            target: self.models[&model_id],
            property,
            interpolation: Interpolation::Linear,
            times,
            values,
        })
    }

    fn clip(&self, stack: &FbxNode, name: String) -> AnimationClip {
        let mut tracks = Vec::new();
        if let Some(stack_id) = stack.object_id() {
            for (layer, _) in self.linked(stack_id, "AnimationLayer") {
                let Some(layer_id) = layer.object_id() else {
                    continue;
                };
                tracks.extend(
                    self.linked(layer_id, "AnimationCurveNode")
                        .filter_map(|(curve_node, _)| self.track(curve_node)),
                );
            }
        }
        let mut clip = AnimationClip::from_tracks(name, tracks);
        let stop = stack.property("LocalStop").and_then(FbxValue::as_i64).unwrap_or(0);
        if stop > 0 {
            clip.duration = (stop as f64 / FBX_TICKS_PER_SECOND) as f32;
        }
        clip
    }
}

/// Build a model from a parsed tree: the `Model` hierarchy with one mesh
/// node per `Geometry` of class `Mesh`, one clip per `AnimationStack`
pub fn asset_from_tree(root: &FbxNode) -> Result<ModelAsset> {
    let objects = root
        .child("Objects")
        .ok_or_else(|| LoadError::parse("fbx", "no Objects section"))?;
    let links = read_links(root);

    let mut asset = ModelAsset::new("FBX");
    let models: Vec<&FbxNode> = objects.children_named("Model").collect();
    let placed = place_models(&mut asset, &models, &links);

    let mut material = None;
    for (i, geometry) in objects.children_named("Geometry").enumerate() {
        if geometry.attributes.get(2).and_then(FbxValue::as_str) != Some("Mesh") {
            continue;
        }
        let Some(mesh) = geometry_mesh(geometry)? else {
            continue;
        };
        let material = *material.get_or_insert_with(|| {
            asset.add_material(StandardMaterial::flat(
                "fbx",
                Color::from_hex_u32(FBX_DEFAULT_COLOR),
                0.0,
                0.8,
            ))
        });
        let parent = geometry
            .object_id()
            .and_then(|id| {
                links
                    .iter()
                    .filter(|l| l.child == id && l.property.is_none())
                    .find_map(|l| placed.get(&l.parent))
            })
            .copied()
            .unwrap_or(asset.root);
        let name = geometry
            .object_name()
            .filter(|n| !n.is_empty())
            .map(str::to_string)
            .unwrap_or_else(|| format!("geometry_{}", i));
        asset.add_node(parent, AssetNode::mesh(name, mesh, material));
    }

    let builder = ClipBuilder {
        objects: objects
            .children
            .iter()
            .filter_map(|o| Some((o.object_id()?, o)))
            .collect(),
        links: &links,
        models: &placed,
    };
    for (i, stack) in objects.children_named("AnimationStack").enumerate() {
        let name = stack
            .object_name()
            .filter(|n| !n.is_empty())
            .map(str::to_string)
            .unwrap_or_else(|| format!("stack_{}", i));
        let clip = builder.clip(stack, name);
        log::debug!("fbx clip {:?}: {} tracks, {:.3}s", clip.name, clip.tracks.len(), clip.duration);
        asset.clips.push(clip);
    }

    Ok(asset)
}

pub struct FbxLoader;

impl FbxLoader {
    pub fn parse(bytes: &[u8]) -> Result<ModelAsset> {
        asset_from_tree(&read_tree(bytes)?)
    }
}

impl FormatLoader for FbxLoader {
    fn format(&self) -> SourceFormat {
        SourceFormat::Fbx
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
