//! Session configuration

use meshview_core::Color;
use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;

use crate::settings::SETTINGS_KEY;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid config: {0}")]
    Json(#[from] serde_json::Error),
}

/// Tunables for a [`ModelSession`](crate::ModelSession). Every field has a
/// default, so partial JSON files are accepted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Store key the interaction settings record lives under
    pub settings_key: String,
    /// Largest model dimension after fitting
    pub target_extent: f32,
    /// Size of the axes and grid overlays
    pub overlay_extent: f32,
    pub grid_divisions: u32,
    /// Vertical field of view in degrees
    pub fov_degrees: f32,
    pub near: f32,
    pub far: f32,
    pub clear_color: String,
    pub damping_factor: f32,
    pub light_intensity: f32,
    /// Append a stats panel next to the canvas
    pub show_stats: bool,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            settings_key: SETTINGS_KEY.to_string(),
            target_extent: 10.0,
            overlay_extent: 150.0,
            grid_divisions: 150,
            fov_degrees: 50.0,
            near: 0.1,
            far: 10000.0,
            clear_color: "#F2F2F2".to_string(),
            damping_factor: 0.05,
            light_intensity: 5.0,
            show_stats: true,
        }
    }
}

impl SessionConfig {
    pub fn from_json_str(json: &str) -> Result<Self, ConfigError> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn from_json_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path)?;
        Self::from_json_str(&text)
    }

    /// Parsed clear color; an unparsable value falls back to the default
    pub fn clear_color(&self) -> Color {
        Color::parse(&self.clear_color).unwrap_or_else(|e| {
            log::warn!("clear color {:?}: {}, using #F2F2F2", self.clear_color, e);
            Color::from_hex_u32(0xF2F2F2)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_json_keeps_defaults() {
        let config = SessionConfig::from_json_str(r#"{"target_extent": 4.0, "show_stats": false}"#).unwrap();
        assert_eq!(config.target_extent, 4.0);
        assert!(!config.show_stats);
        assert_eq!(config.settings_key, "glbModelSetting");
        assert_eq!(config.overlay_extent, 150.0);
    }

    #[test]
    fn test_bad_clear_color_falls_back() {
        let config = SessionConfig {
            clear_color: "chartreuse-ish".into(),
            ..Default::default()
        };
        assert_eq!(config.clear_color().to_hex(), "#F2F2F2");
    }

    #[test]
    fn test_config_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        std::io::Write::write_all(&mut file, br#"{"settings_key": "per-model"}"#).unwrap();
        let config = SessionConfig::from_json_file(file.path()).unwrap();
        assert_eq!(config.settings_key, "per-model");
        assert!(SessionConfig::from_json_str("[1, 2]").is_err());
    }
}
