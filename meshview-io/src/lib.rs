//! Model loading for meshview
//!
//! This crate fetches model sources through a [`Transport`] and decodes
//! them into [`ModelAsset`]s: glTF/GLB, OBJ with an optional MTL library,
//! ASCII or binary STL, and binary FBX.

pub mod error;
pub mod progress;
pub mod transport;
pub mod format;
pub mod registry;
pub mod gltf;
pub mod obj;
pub mod stl;
pub mod fbx;
#[cfg(feature = "draco")]
mod draco;

pub use error::*;
pub use progress::LoadProgress;
pub use transport::{chain_progress, decode_data_uri, resolve_url, DefaultTransport, Transport};
pub use format::{FormatLoader, LoadRequest, SourceFormat};
pub use registry::LoaderRegistry;
pub use self::gltf::GltfLoader;
pub use obj::ObjLoader;
pub use stl::StlLoader;
pub use fbx::FbxLoader;

use meshview_core::ModelAsset;

/// Auto-detect the format and load a model with the default transport
pub fn load_model(url: &str, material_url: Option<&str>) -> Result<ModelAsset> {
    let mut request = LoadRequest::new(url);
    request.material_url = material_url.map(str::to_string);
    LoaderRegistry::with_defaults().load(&request, None, &DefaultTransport::new(), &mut |_| {})
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn test_load_obj_with_mtl_from_disk() {
        let dir = tempfile::tempdir().unwrap();
        let obj = dir.path().join("box.obj");
        let mtl = dir.path().join("box.mtl");
        fs::write(&obj, "mtllib box.mtl\no face\nv 0 0 0\nv 1 0 0\nv 0 1 0\nusemtl blue\nf 1 2 3\n").unwrap();
        fs::write(&mtl, "newmtl blue\nKd 0 0 1\n").unwrap();

        let asset = load_model(obj.to_str().unwrap(), mtl.to_str()).unwrap();
        let node = &asset.nodes[asset.nodes[asset.root].children[0]];
        let material = &asset.materials[node.mesh.as_ref().unwrap().material];
        assert_eq!(material.color().unwrap().to_hex(), "#0000FF");
    }

    #[test]
    fn test_unknown_extension() {
        let err = load_model("/nowhere/model.dae", None).unwrap_err();
        assert!(matches!(err, LoadError::UnsupportedFormat { .. }));
    }

    #[test]
    fn test_empty_obj_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let obj = dir.path().join("empty.obj");
        fs::write(&obj, "# no geometry\n").unwrap();
        let err = load_model(obj.to_str().unwrap(), None).unwrap_err();
        assert!(matches!(err, LoadError::Empty { .. }));
    }
}
