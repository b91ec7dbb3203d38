//! Persisted interaction settings
//!
//! The toggle state of a session is one JSON record stored under a single
//! key. Every session using the same store and key reads and overwrites the
//! same record.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::cell::RefCell;
use std::collections::HashMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Store key of the settings record
pub const SETTINGS_KEY: &str = "glbModelSetting";

/// Background color of a fresh record
pub const DEFAULT_BGCOLOR: &str = "#FFF8DC";

/// Toggle state replayed after every load. All fields are required when
/// parsing; a partial record counts as malformed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InteractionSettings {
    pub wireframe: bool,
    pub normal: bool,
    pub animation: bool,
    pub axes_helper: bool,
    pub grid_helper: bool,
    pub bounding_box_helper: bool,
    pub bgcolor: String,
}

impl Default for InteractionSettings {
    fn default() -> Self {
        Self {
            wireframe: false,
            normal: false,
            animation: false,
            axes_helper: false,
            grid_helper: false,
            bounding_box_helper: false,
            bgcolor: DEFAULT_BGCOLOR.to_string(),
        }
    }
}

impl InteractionSettings {
    /// Parse a stored record, `None` if it is not a complete record
    pub fn from_record(record: &str) -> Option<Self> {
        match serde_json::from_str(record) {
            Ok(settings) => Some(settings),
            Err(e) => {
                log::warn!("ignoring malformed settings record: {}", e);
                None
            }
        }
    }

    pub fn to_record(&self) -> String {
        // plain struct of bools and a string, serialization cannot fail
        serde_json::to_string(self).unwrap_or_default()
    }

    /// Record under `key`, or the defaults when absent or malformed
    pub fn load(store: &dyn SettingsStore, key: &str) -> Self {
        store
            .get(key)
            .and_then(|record| Self::from_record(&record))
            .unwrap_or_default()
    }

    /// Write the record under `key`; failures are logged
    pub fn persist(&self, store: &dyn SettingsStore, key: &str) {
        if let Err(e) = store.set(key, self.to_record()) {
            log::warn!("failed to persist settings under {:?}: {}", key, e);
        }
    }
}

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("Settings file is not a JSON object: {0}")]
    Json(#[from] serde_json::Error),
}

/// Synchronous key-value store for settings records
pub trait SettingsStore {
    fn get(&self, key: &str) -> Option<String>;

    fn set(&self, key: &str, record: String) -> Result<(), StoreError>;
}

/// Process-local store
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: RefCell<HashMap<String, String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.borrow().is_empty()
    }
}

impl SettingsStore for MemoryStore {
    fn get(&self, key: &str) -> Option<String> {
        self.entries.borrow().get(key).cloned()
    }

    fn set(&self, key: &str, record: String) -> Result<(), StoreError> {
        self.entries.borrow_mut().insert(key.to_string(), record);
        Ok(())
    }
}

/// Store backed by a JSON object file mapping keys to records
#[derive(Debug, Clone)]
pub struct FileStore {
    path: PathBuf,
}

impl FileStore {
    pub fn new<P: AsRef<Path>>(path: P) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }

    /// `<config dir>/meshview/settings.json`
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("meshview").join("settings.json"))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn read_map(&self) -> Result<Map<String, Value>, StoreError> {
        match fs::read_to_string(&self.path) {
            Ok(text) if text.trim().is_empty() => Ok(Map::new()),
            Ok(text) => Ok(serde_json::from_str(&text)?),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(Map::new()),
            Err(e) => Err(e.into()),
        }
    }
}

impl SettingsStore for FileStore {
    fn get(&self, key: &str) -> Option<String> {
        let map = match self.read_map() {
            Ok(map) => map,
            Err(e) => {
                log::warn!("reading {}: {}", self.path.display(), e);
                return None;
            }
        };
        match map.get(key)? {
            Value::String(s) => Some(s.clone()),
            other => Some(other.to_string()),
        }
    }

    fn set(&self, key: &str, record: String) -> Result<(), StoreError> {
        let mut map = self.read_map()?;
        let value = serde_json::from_str(&record).unwrap_or(Value::String(record));
        map.insert(key.to_string(), value);

        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }
        fs::write(&self.path, serde_json::to_string_pretty(&map)?)?;
        log::debug!("settings {:?} written to {}", key, self.path.display());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_field_names() {
        let settings = InteractionSettings {
            axes_helper: true,
            ..Default::default()
        };
        let value: Value = serde_json::from_str(&settings.to_record()).unwrap();
        assert_eq!(value["axesHelper"], Value::Bool(true));
        assert_eq!(value["boundingBoxHelper"], Value::Bool(false));
        assert_eq!(value["bgcolor"], Value::String("#FFF8DC".into()));
    }

    #[test]
    fn test_malformed_and_partial_records_fall_back() {
        let store = MemoryStore::new();
        store.set(SETTINGS_KEY, "{not json".into()).unwrap();
        assert_eq!(InteractionSettings::load(&store, SETTINGS_KEY), InteractionSettings::default());

        store.set(SETTINGS_KEY, r#"{"wireframe": true}"#.into()).unwrap();
        assert_eq!(InteractionSettings::load(&store, SETTINGS_KEY), InteractionSettings::default());
        assert_eq!(InteractionSettings::load(&store, "absent"), InteractionSettings::default());
    }

    #[test]
    fn test_memory_round_trip() {
        let store = MemoryStore::new();
        let settings = InteractionSettings {
            normal: true,
            bgcolor: "#000000".into(),
            ..Default::default()
        };
        settings.persist(&store, SETTINGS_KEY);
        assert_eq!(InteractionSettings::load(&store, SETTINGS_KEY), settings);
    }

    #[test]
    fn test_file_store_keeps_other_keys() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileStore::new(dir.path().join("nested").join("settings.json"));
        assert!(store.get(SETTINGS_KEY).is_none());

        store.set("other", "\"value\"".into()).unwrap();
        let settings = InteractionSettings {
            grid_helper: true,
            ..Default::default()
        };
        settings.persist(&store, SETTINGS_KEY);

        let reopened = FileStore::new(store.path());
        assert_eq!(InteractionSettings::load(&reopened, SETTINGS_KEY), settings);
        assert_eq!(reopened.get("other").as_deref(), Some("value"));
    }

    #[test]
    fn test_file_store_rejects_non_object() {
        let file = tempfile::NamedTempFile::new().unwrap();
        fs::write(file.path(), "[1]").unwrap();
        let store = FileStore::new(file.path());
        assert!(store.get(SETTINGS_KEY).is_none());
        assert!(store.set(SETTINGS_KEY, "{}".into()).is_err());
    }
}
