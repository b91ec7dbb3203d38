//! Source formats and the loader trait

use crate::error::Result;
use crate::progress::LoadProgress;
use crate::transport::Transport;
use meshview_core::ModelAsset;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// The four model families a session can open
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceFormat {
    /// glTF 2.0, JSON or binary container
    Gltf,
    /// Wavefront OBJ with optional MTL library
    Obj,
    /// STL, ASCII or binary
    Stl,
    /// Binary FBX 7.x
    Fbx,
}

impl SourceFormat {
    pub const ALL: [SourceFormat; 4] = [
        SourceFormat::Gltf,
        SourceFormat::Obj,
        SourceFormat::Stl,
        SourceFormat::Fbx,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            SourceFormat::Gltf => "gltf",
            SourceFormat::Obj => "obj",
            SourceFormat::Stl => "stl",
            SourceFormat::Fbx => "fbx",
        }
    }

    pub fn extensions(&self) -> &'static [&'static str] {
        match self {
            SourceFormat::Gltf => &["gltf", "glb"],
            SourceFormat::Obj => &["obj"],
            SourceFormat::Stl => &["stl"],
            SourceFormat::Fbx => &["fbx"],
        }
    }

    /// Case-insensitive extension lookup
    pub fn from_extension(ext: &str) -> Option<Self> {
        let ext = ext.to_ascii_lowercase();
        Self::ALL
            .into_iter()
            .find(|f| f.extensions().contains(&ext.as_str()))
    }

    /// Format from the last extension of a path or URL, ignoring any query
    /// string or fragment
    pub fn from_url(url: &str) -> Option<Self> {
        let path = url.split(['?', '#']).next().unwrap_or(url);
        let file = path.rsplit(['/', '\\']).next().unwrap_or(path);
        let (_, ext) = file.rsplit_once('.')?;
        Self::from_extension(ext)
    }
}

impl fmt::Display for SourceFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for SourceFormat {
    type Err = crate::error::LoadError;

    fn from_str(s: &str) -> Result<Self> {
        Self::from_extension(s).ok_or_else(|| crate::error::LoadError::UnsupportedFormat {
            format: s.to_string(),
        })
    }
}

/// What to load: the model URL and, for OBJ, an optional MTL URL
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadRequest {
    pub url: String,
    pub material_url: Option<String>,
}

impl LoadRequest {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            material_url: None,
        }
    }

    pub fn with_material(mut self, material_url: impl Into<String>) -> Self {
        self.material_url = Some(material_url.into());
        self
    }
}

/// Decoder for one source format
pub trait FormatLoader: Send + Sync {
    /// The format this loader decodes
    fn format(&self) -> SourceFormat;

    /// Fetch everything `request` refers to through `transport` and decode it
    fn decode(
        &self,
        request: &LoadRequest,
        transport: &dyn Transport,
        progress: &mut dyn FnMut(LoadProgress),
    ) -> Result<ModelAsset>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_url() {
        assert_eq!(SourceFormat::from_url("a/b/Duck.GLB"), Some(SourceFormat::Gltf));
        assert_eq!(SourceFormat::from_url("https://x/y.obj?t=1"), Some(SourceFormat::Obj));
        assert_eq!(SourceFormat::from_url("part.v2.stl"), Some(SourceFormat::Stl));
        assert_eq!(SourceFormat::from_url("rig.fbx#frag"), Some(SourceFormat::Fbx));
        assert_eq!(SourceFormat::from_url("dir.gltf/model"), None);
        assert_eq!(SourceFormat::from_url("scene.ply"), None);
    }

    #[test]
    fn test_parse_name() {
        assert_eq!("GLTF".parse::<SourceFormat>().unwrap(), SourceFormat::Gltf);
        assert!("dae".parse::<SourceFormat>().is_err());
    }
}
