//! Loading models from files on disk through the default transport

use meshview_io::{
    DefaultTransport, LoadError, LoadProgress, LoadRequest, LoaderRegistry, SourceFormat,
};
use std::fs;
use std::path::Path;

/// Binary STL with one triangle in the XY plane
fn binary_stl() -> Vec<u8> {
    let mut bytes = vec![0u8; 80];
    bytes.extend_from_slice(&1u32.to_le_bytes());
    let floats: [f32; 12] = [
        0.0, 0.0, 1.0, // normal
        0.0, 0.0, 0.0, //
        1.0, 0.0, 0.0, //
        0.0, 1.0, 0.0,
    ];
    for f in floats {
        bytes.extend_from_slice(&f.to_le_bytes());
    }
    bytes.extend_from_slice(&0u16.to_le_bytes());
    bytes
}

fn load(path: &Path, chunk_size: usize) -> (Result<meshview_core::ModelAsset, LoadError>, Vec<LoadProgress>) {
    let mut events = Vec::new();
    let request = LoadRequest::new(path.to_string_lossy());
    let result = LoaderRegistry::with_defaults().load(
        &request,
        None,
        &DefaultTransport::with_chunk_size(chunk_size),
        &mut |p| events.push(p),
    );
    (result, events)
}

#[test]
fn test_binary_stl_without_extension_is_sniffed() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("part");
    fs::write(&path, binary_stl()).unwrap();

    assert_eq!(LoaderRegistry::detect_file(&path), Some(SourceFormat::Stl));
    let (asset, _) = load(&path, 1024);
    let asset = asset.unwrap();
    assert_eq!(asset.mesh_count(), 1);
    assert_eq!(asset.triangle_count(), 1);
}

#[test]
fn test_progress_is_monotonic_and_completes() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("part.stl");
    let bytes = binary_stl();
    fs::write(&path, &bytes).unwrap();

    let (asset, events) = load(&path, 16);
    asset.unwrap();
    assert!(events.len() > 1);
    assert!(events.windows(2).all(|w| w[0].loaded <= w[1].loaded));
    let last = events.last().unwrap();
    assert_eq!(last.total, Some(bytes.len() as u64));
    assert!(last.is_complete());
    assert_eq!(last.percent(), Some(100));
}

#[test]
fn test_missing_file() {
    let dir = tempfile::tempdir().unwrap();
    let (result, events) = load(&dir.path().join("gone.stl"), 1024);
    assert!(matches!(result, Err(LoadError::FileNotFound { .. })));
    assert!(events.is_empty());
}

#[test]
fn test_ascii_stl_from_file_url() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("tri.stl");
    fs::write(
        &path,
        "solid tri\n\
         facet normal 0 0 1\n\
         outer loop\n\
         vertex 0 0 0\n\
         vertex 2 0 0\n\
         vertex 0 2 0\n\
         endloop\n\
         endfacet\n\
         endsolid tri\n",
    )
    .unwrap();

    let url = format!("file://{}", path.display());
    let asset = meshview_io::load_model(&url, None).unwrap();
    assert_eq!(asset.triangle_count(), 1);
}
