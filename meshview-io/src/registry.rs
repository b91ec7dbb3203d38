//! Loader registry and format detection
//!
//! The registry maps each [`SourceFormat`] to the [`FormatLoader`] that
//! decodes it. A session selects its loader once, when it is created;
//! callers can swap in their own loader for any format.

use crate::error::{LoadError, Result};
use crate::fbx::{FbxLoader, FBX_BINARY_MAGIC};
use crate::format::{FormatLoader, LoadRequest, SourceFormat};
use crate::gltf::GltfLoader;
use crate::obj::ObjLoader;
use crate::progress::LoadProgress;
use crate::stl::StlLoader;
use crate::transport::Transport;
use meshview_core::ModelAsset;
use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

/// Bytes inspected when sniffing a local file
pub const SNIFF_LEN: usize = 512;

#[derive(Clone)]
pub struct LoaderRegistry {
    loaders: HashMap<SourceFormat, Arc<dyn FormatLoader>>,
}

impl LoaderRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self {
            loaders: HashMap::new(),
        }
    }

    /// Registry with the built-in glTF, OBJ, STL and FBX loaders
    pub fn with_defaults() -> Self {
        let mut registry = Self::new();
        registry.register(Arc::new(GltfLoader));
        registry.register(Arc::new(ObjLoader));
        registry.register(Arc::new(StlLoader));
        registry.register(Arc::new(FbxLoader));
        registry
    }

    /// Register a loader for the format it reports, returning the loader it
    /// replaced
    pub fn register(&mut self, loader: Arc<dyn FormatLoader>) -> Option<Arc<dyn FormatLoader>> {
        self.loaders.insert(loader.format(), loader)
    }

    pub fn get(&self, format: SourceFormat) -> Result<Arc<dyn FormatLoader>> {
        self.loaders
            .get(&format)
            .cloned()
            .ok_or_else(|| LoadError::UnsupportedFormat {
                format: format.to_string(),
            })
    }

    pub fn supports(&self, format: SourceFormat) -> bool {
        self.loaders.contains_key(&format)
    }

    pub fn supported_formats(&self) -> Vec<SourceFormat> {
        SourceFormat::ALL
            .into_iter()
            .filter(|f| self.supports(*f))
            .collect()
    }

    /// Pick the format for `url`: the extension wins, then the header of a
    /// local file is sniffed
    pub fn detect(url: &str) -> Option<SourceFormat> {
        if let Some(format) = SourceFormat::from_url(url) {
            return Some(format);
        }
        if url.contains("://") && !url.starts_with("file://") {
            return None;
        }
        let path = Path::new(url.strip_prefix("file://").unwrap_or(url));
        Self::detect_file(path)
    }

    /// Detect a local file's format by examining its header
    pub fn detect_file(path: &Path) -> Option<SourceFormat> {
        use std::fs::File;
        use std::io::Read;

        let mut file = File::open(path).ok()?;
        let len = file.metadata().ok().map(|m| m.len());
        let mut header = Vec::with_capacity(SNIFF_LEN);
        file.by_ref().take(SNIFF_LEN as u64).read_to_end(&mut header).ok()?;
        Self::detect_header(&header, len)
    }

    /// Detect a format from leading bytes. `total_len` lets binary STL,
    /// which has no magic, be recognized by its record count.
    pub fn detect_header(header: &[u8], total_len: Option<u64>) -> Option<SourceFormat> {
        if header.starts_with(b"glTF") {
            return Some(SourceFormat::Gltf);
        }
        if header.starts_with(FBX_BINARY_MAGIC) {
            return Some(SourceFormat::Fbx);
        }

        let text = String::from_utf8_lossy(header);
        let trimmed = text.trim_start_matches('\u{feff}').trim_start();
        if trimmed.starts_with('{') {
            return Some(SourceFormat::Gltf);
        }
        if trimmed.starts_with("solid") && !is_binary_stl(header, total_len) {
            return Some(SourceFormat::Stl);
        }
        let obj_statement = |line: &str| {
            let mut words = line.split_whitespace();
            matches!(
                words.next(),
                Some("v" | "vn" | "vt" | "f" | "o" | "g" | "mtllib" | "usemtl")
            )
        };
        if trimmed.lines().any(obj_statement) {
            return Some(SourceFormat::Obj);
        }
        if is_binary_stl(header, total_len) {
            return Some(SourceFormat::Stl);
        }
        None
    }

    /// Decode `request` with the loader registered for `format`, or for the
    /// detected format when `format` is `None`
    pub fn load(
        &self,
        request: &LoadRequest,
        format: Option<SourceFormat>,
        transport: &dyn Transport,
        progress: &mut dyn FnMut(LoadProgress),
    ) -> Result<ModelAsset> {
        let format = format
            .or_else(|| Self::detect(&request.url))
            .ok_or_else(|| LoadError::UnsupportedFormat {
                format: request.url.clone(),
            })?;
        self.get(format)?.decode(request, transport, progress)
    }
}

impl Default for LoaderRegistry {
    fn default() -> Self {
        Self::with_defaults()
    }
}

impl std::fmt::Debug for LoaderRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LoaderRegistry")
            .field("formats", &self.supported_formats())
            .finish()
    }
}

/// 80-byte header, u32 triangle count, 50 bytes per triangle
fn is_binary_stl(header: &[u8], total_len: Option<u64>) -> bool {
    let (Some(len), Some(count)) = (total_len, header.get(80..84)) else {
        return false;
    };
    let count = u32::from_le_bytes([count[0], count[1], count[2], count[3]]) as u64;
    len == 84 + 50 * count
}
