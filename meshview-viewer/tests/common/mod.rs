//! Shared fixtures for session tests
#![allow(dead_code)]

use std::cell::RefCell;
use std::io::{Seek, Write};
use std::path::{Path, PathBuf};
use std::rc::Rc;
use std::time::Duration;

use base64::Engine as _;
use fbxcel::low::FbxVersion;
use fbxcel::writer::v7400::binary::{FbxFooter, Writer};
use meshview_core::ModelAsset;
use meshview_io::fbx::{asset_from_tree, FbxNode, FbxValue};
use meshview_io::{
    DefaultTransport, FormatLoader, LoadProgress, LoadRequest, LoaderRegistry, SourceFormat, Transport,
};
use meshview_viewer::{
    HeadlessMount, LoadCallbacks, LoadedModel, ManualScheduler, MemoryStore, ModelSession,
    SessionError,
};

pub const FRAME: Duration = Duration::from_millis(16);

pub const TETRA_STL: &str = "solid tetra
facet normal 0 0 -1
  outer loop
    vertex 0 0 0
    vertex 0 1 0
    vertex 1 0 0
  endloop
endfacet
facet normal 0 -1 0
  outer loop
    vertex 0 0 0
    vertex 1 0 0
    vertex 0 0 1
  endloop
endfacet
facet normal -1 0 0
  outer loop
    vertex 0 0 0
    vertex 0 0 1
    vertex 0 1 0
  endloop
endfacet
facet normal 1 1 1
  outer loop
    vertex 1 0 0
    vertex 0 1 0
    vertex 0 0 1
  endloop
endfacet
endsolid tetra
";

pub const PAIR_OBJ: &str = "mtllib pair.mtl
o left
v 0 0 0
v 1 0 0
v 0 1 0
usemtl red
f 1 2 3
o right
v 2 0 0
v 3 0 0
v 2 1 0
usemtl blue
f 4 5 6
";

pub const PAIR_MTL: &str = "newmtl red
Kd 1 0 0
Ns 250
newmtl blue
Kd 0 0 1
";

/// One triangle spanning x 0..2 under a node translated by 1 in x, with a
/// two second clip sliding that node from x=1 to x=3
pub fn triangle_gltf() -> String {
    let floats: [f32; 17] = [
        0.0, 0.0, 0.0, 2.0, 0.0, 0.0, 0.0, 1.0, 0.0, // positions
        0.0, 2.0, // key times
        1.0, 0.0, 0.0, 3.0, 0.0, 0.0, // translations
    ];
    let bytes: Vec<u8> = floats.iter().flat_map(|f| f.to_le_bytes()).collect();
    let uri = format!(
        "data:application/octet-stream;base64,{}",
        base64::engine::general_purpose::STANDARD.encode(&bytes)
    );
    format!(
        r#"{{
  "asset": {{"version": "2.0"}},
  "scene": 0,
  "scenes": [{{"name": "fixture", "nodes": [0]}}],
  "nodes": [{{"name": "tri", "mesh": 0, "translation": [1.0, 0.0, 0.0]}}],
  "meshes": [{{"name": "tri_mesh", "primitives": [{{"attributes": {{"POSITION": 0}}, "material": 0}}]}}],
  "materials": [{{"name": "paint", "pbrMetallicRoughness": {{"baseColorFactor": [1.0, 0.0, 0.0, 1.0]}}}}],
  "buffers": [{{"byteLength": 68, "uri": "{uri}"}}],
  "bufferViews": [
    {{"buffer": 0, "byteOffset": 0, "byteLength": 36}},
    {{"buffer": 0, "byteOffset": 36, "byteLength": 8}},
    {{"buffer": 0, "byteOffset": 44, "byteLength": 24}}
  ],
  "accessors": [
    {{"bufferView": 0, "componentType": 5126, "count": 3, "type": "VEC3", "min": [0.0, 0.0, 0.0], "max": [2.0, 1.0, 0.0]}},
    {{"bufferView": 1, "componentType": 5126, "count": 2, "type": "SCALAR", "min": [0.0], "max": [2.0]}},
    {{"bufferView": 2, "componentType": 5126, "count": 2, "type": "VEC3"}}
  ],
  "animations": [{{"name": "slide", "channels": [{{"sampler": 0, "target": {{"node": 0, "path": "translation"}}}}], "samplers": [{{"input": 1, "output": 2, "interpolation": "LINEAR"}}]}}]
}}"#
    )
}

fn s(v: &str) -> FbxValue {
    FbxValue::Str(v.to_string())
}

/// Two quads in separate geometries and one two second take
pub fn plates_fbx_tree() -> FbxNode {
    let plate = |id: i64, name: &str, z: f64| {
        FbxNode::new("Geometry", vec![FbxValue::Int(id), s(&format!("{}\u{0}\u{1}Geometry", name)), s("Mesh")])
            .with_children(vec![
                FbxNode::new(
                    "Vertices",
                    vec![FbxValue::FloatArray(vec![
                        0.0, 0.0, z, 4.0, 0.0, z, 4.0, 4.0, z, 0.0, 4.0, z,
                    ])],
                ),
                FbxNode::new("PolygonVertexIndex", vec![FbxValue::IntArray(vec![0, 1, 2, -4])]),
            ])
    };
    let stack = FbxNode::new("AnimationStack", vec![FbxValue::Int(9), s("Take 001\u{0}\u{1}AnimStack"), s("")])
        .with_children(vec![FbxNode::new("Properties70", vec![]).with_children(vec![FbxNode::new(
            "P",
            vec![s("LocalStop"), s("KTime"), s("Time"), s(""), FbxValue::Int(92_372_316_000)],
        )])]);
    FbxNode::new("", vec![]).with_children(vec![FbxNode::new("Objects", vec![])
        .with_children(vec![plate(1, "Front", 0.0), plate(2, "Back", 1.0), stack])])
}

fn fbx_object(kind: &str, id: i64, name: &str, class: &str) -> FbxNode {
    FbxNode::new(kind, vec![FbxValue::Int(id), s(&format!("{}\u{0}\u{1}{}", name, kind)), s(class)])
}

fn fbx_p(key: &str, values: Vec<FbxValue>) -> FbxNode {
    let mut attributes = vec![s(key), s(""), s(""), s("A")];
    attributes.extend(values);
    FbxNode::new("P", attributes)
}

fn fbx_link(kind: &str, child: i64, parent: i64, property: Option<&str>) -> FbxNode {
    let mut attributes = vec![s(kind), FbxValue::Int(child), FbxValue::Int(parent)];
    attributes.extend(property.map(s));
    FbxNode::new("C", attributes)
}

/// Slider model (10) carrying a plate; the Slide take moves it from x = 1
/// to x = 5 over two seconds
pub fn slider_fbx_tree() -> FbxNode {
    const TWO_SECONDS: i64 = 92_372_316_000;
    let props = |entries: Vec<FbxNode>| FbxNode::new("Properties70", vec![]).with_children(entries);
    let slider = fbx_object("Model", 10, "Slider", "Mesh").with_children(vec![props(vec![fbx_p(
        "Lcl Translation",
        vec![FbxValue::Float(1.0), FbxValue::Float(0.0), FbxValue::Float(0.0)],
    )])]);
    let plate = fbx_object("Geometry", 1, "Plate", "Mesh").with_children(vec![
        FbxNode::new(
            "Vertices",
            vec![FbxValue::FloatArray(vec![
                0.0, 0.0, 0.0, 2.0, 0.0, 0.0, 2.0, 2.0, 0.0, 0.0, 2.0, 0.0,
            ])],
        ),
        FbxNode::new("PolygonVertexIndex", vec![FbxValue::IntArray(vec![0, 1, 2, -4])]),
    ]);
    let stack = fbx_object("AnimationStack", 20, "Slide", "")
        .with_children(vec![props(vec![fbx_p("LocalStop", vec![FbxValue::Int(TWO_SECONDS)])])]);
    let curve = fbx_object("AnimationCurve", 40, "", "").with_children(vec![
        FbxNode::new("KeyTime", vec![FbxValue::IntArray(vec![0, TWO_SECONDS])]),
        FbxNode::new("KeyValueFloat", vec![FbxValue::FloatArray(vec![1.0, 5.0])]),
    ]);
    FbxNode::new("", vec![]).with_children(vec![
        FbxNode::new("Objects", vec![]).with_children(vec![
            slider,
            plate,
            stack,
            fbx_object("AnimationLayer", 21, "BaseLayer", ""),
            fbx_object("AnimationCurveNode", 30, "T", ""),
            curve,
        ]),
        FbxNode::new("Connections", vec![]).with_children(vec![
            fbx_link("OO", 10, 0, None),
            fbx_link("OO", 1, 10, None),
            fbx_link("OO", 21, 20, None),
            fbx_link("OO", 30, 21, None),
            fbx_link("OP", 30, 10, Some("Lcl Translation")),
            fbx_link("OP", 40, 30, Some("d|X")),
        ]),
    ])
}

fn write_fbx_node<W: Write + Seek>(writer: &mut Writer<W>, node: &FbxNode) {
    let mut attrs = writer.new_node(&node.name).unwrap();
    for value in &node.attributes {
        match value {
            FbxValue::Int(v) => attrs.append_i64(*v).unwrap(),
            FbxValue::Float(v) => attrs.append_f64(*v).unwrap(),
            FbxValue::Str(v) => attrs.append_string_direct(v).unwrap(),
            FbxValue::IntArray(v) => attrs.append_arr_i64_from_iter(None, v.iter().copied()).unwrap(),
            FbxValue::FloatArray(v) => attrs.append_arr_f64_from_iter(None, v.iter().copied()).unwrap(),
            FbxValue::Other => {}
        }
    }
    drop(attrs);
    for child in &node.children {
        write_fbx_node(writer, child);
    }
    writer.close_node().unwrap();
}

/// Encode a node tree as a binary FBX 7.4 file
pub fn encode_fbx(root: &FbxNode) -> Vec<u8> {
    let mut writer = Writer::new(std::io::Cursor::new(Vec::new()), FbxVersion::V7_4).unwrap();
    for node in &root.children {
        write_fbx_node(&mut writer, node);
    }
    writer.finalize_and_flush(&FbxFooter::default()).unwrap().into_inner()
}

/// FBX loader fed from an in-memory node tree; the URL is still fetched
pub struct TreeLoader(pub FbxNode);

impl FormatLoader for TreeLoader {
    fn format(&self) -> SourceFormat {
        SourceFormat::Fbx
    }

    fn decode(
        &self,
        request: &LoadRequest,
        transport: &dyn Transport,
        progress: &mut dyn FnMut(LoadProgress),
    ) -> meshview_io::Result<ModelAsset> {
        transport.fetch(&request.url, progress)?;
        asset_from_tree(&self.0)
    }
}

/// STL loader that waits for a signal before decoding
pub struct GatedLoader {
    pub gate: flume::Receiver<()>,
}

impl FormatLoader for GatedLoader {
    fn format(&self) -> SourceFormat {
        SourceFormat::Stl
    }

    fn decode(
        &self,
        _request: &LoadRequest,
        _transport: &dyn Transport,
        _progress: &mut dyn FnMut(LoadProgress),
    ) -> meshview_io::Result<ModelAsset> {
        let _ = self.gate.recv();
        meshview_io::StlLoader::parse(TETRA_STL.as_bytes())
    }
}

/// Transport that overstates how much has arrived
pub struct OvershootTransport;

impl Transport for OvershootTransport {
    fn fetch(&self, url: &str, progress: &mut dyn FnMut(LoadProgress)) -> meshview_io::Result<Vec<u8>> {
        DefaultTransport::with_chunk_size(16).fetch(url, &mut |p: LoadProgress| {
            progress(LoadProgress::new(p.loaded * 3, p.total))
        })
    }
}

pub fn write(dir: &Path, name: &str, contents: &str) -> PathBuf {
    let path = dir.join(name);
    std::fs::write(&path, contents).unwrap();
    path
}

pub struct Harness {
    pub mount: Rc<RefCell<HeadlessMount>>,
    pub scheduler: ManualScheduler,
    pub store: Rc<MemoryStore>,
}

impl Harness {
    pub fn new() -> Self {
        Self {
            mount: HeadlessMount::shared(800, 600),
            scheduler: ManualScheduler::new(),
            store: Rc::new(MemoryStore::new()),
        }
    }

    pub fn session(&self, format: SourceFormat) -> ModelSession {
        self.session_with(format, LoaderRegistry::with_defaults())
    }

    pub fn session_with(&self, format: SourceFormat, registry: LoaderRegistry) -> ModelSession {
        ModelSession::builder(self.mount.clone(), format)
            .store(self.store.clone())
            .scheduler(Rc::new(self.scheduler.clone()))
            .registry(registry)
            .build()
    }

    pub fn fbx_session(&self) -> ModelSession {
        let mut registry = LoaderRegistry::with_defaults();
        registry.register(std::sync::Arc::new(TreeLoader(plates_fbx_tree())));
        self.session_with(SourceFormat::Fbx, registry)
    }
}

/// What the load callbacks saw
#[derive(Default)]
pub struct Outcome {
    pub loaded: Option<LoadedModel>,
    pub error: Option<String>,
    pub progress: Vec<LoadProgress>,
}

/// Start a load, record its callbacks and wait for it
pub fn load_blocking(session: &ModelSession, url: &Path, mtl: Option<&Path>) -> Rc<RefCell<Outcome>> {
    let outcome = start_load(session, url, mtl);
    session.block_until_loaded();
    outcome
}

pub fn start_load(session: &ModelSession, url: &Path, mtl: Option<&Path>) -> Rc<RefCell<Outcome>> {
    let outcome = Rc::new(RefCell::new(Outcome::default()));
    let (on_ok, on_err, on_progress) = (outcome.clone(), outcome.clone(), outcome.clone());
    let callbacks = LoadCallbacks::new()
        .on_success(move |model| on_ok.borrow_mut().loaded = Some(model.clone()))
        .on_error(move |e: &SessionError| on_err.borrow_mut().error = Some(e.to_string()))
        .on_progress(move |p| on_progress.borrow_mut().progress.push(p));
    let url = url.to_string_lossy().into_owned();
    let mtl = mtl.map(|m| m.to_string_lossy().into_owned());
    assert!(session.load(&url, mtl.as_deref(), callbacks));
    outcome
}
