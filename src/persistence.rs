//! Per-controller config store
//!
//! Keeps each controller's serialized component configs keyed by uid, so a
//! controller seen before gets its settings back on reconnect. The store can
//! be snapshotted to and restored from a JSON file.

use std::collections::BTreeMap;
use std::path::Path;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tokio::fs;
use tracing::debug;

use crate::controller::ControllerEntity;

/// Saved configs of one controller
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ControllerDocument {
    /// Display name when last saved, for humans reading the file
    pub name: String,
    pub saved_at: DateTime<Utc>,
    pub configs: Map<String, Value>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ControllerConfigStore {
    controllers: BTreeMap<String, ControllerDocument>,
}

/// On-disk form of the store
#[derive(Debug, Serialize, Deserialize)]
pub struct StoreSnapshot {
    pub version: String,
    pub timestamp: DateTime<Utc>,
    pub controllers: BTreeMap<String, ControllerDocument>,
}

impl StoreSnapshot {
    /// Current snapshot format version
    pub const VERSION: &'static str = "1.0.0";
}

impl ControllerConfigStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, uid: &str) -> Option<&ControllerDocument> {
        self.controllers.get(uid)
    }

    pub fn contains(&self, uid: &str) -> bool {
        self.controllers.contains_key(uid)
    }

    pub fn len(&self) -> usize {
        self.controllers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.controllers.is_empty()
    }

    pub fn uids(&self) -> impl Iterator<Item = &str> {
        self.controllers.keys().map(String::as_str)
    }

    pub fn remove(&mut self, uid: &str) -> Option<ControllerDocument> {
        self.controllers.remove(uid)
    }

    /// Record the entity's current configs under `uid`, replacing any previous document
    pub fn record(&mut self, uid: &str, entity: &ControllerEntity) {
        let document = ControllerDocument {
            name: entity.name(),
            saved_at: Utc::now(),
            configs: entity.serialize_configs(),
        };
        self.controllers.insert(uid.to_string(), document);
    }

    /// Apply the stored document for `uid`, if any
    ///
    /// Returns `false` when the controller has never been saved.
    pub fn apply(&self, uid: &str, entity: &mut ControllerEntity) -> bool {
        match self.controllers.get(uid) {
            Some(document) => {
                let applied = entity.deserialize_configs(&document.configs);
                debug!("Applied {} saved config sections to {}", applied, uid);
                true
            },
            None => false,
        }
    }

    pub fn snapshot(&self) -> StoreSnapshot {
        StoreSnapshot {
            version: StoreSnapshot::VERSION.to_string(),
            timestamp: Utc::now(),
            controllers: self.controllers.clone(),
        }
    }

    /// Save the store to a JSON file
    pub async fn save_to_file(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        let json = serde_json::to_string_pretty(&self.snapshot()).context("Failed to serialize controller store")?;

        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)
                .await
                .with_context(|| format!("Failed to create store directory: {}", parent.display()))?;
        }
        fs::write(path, json)
            .await
            .with_context(|| format!("Failed to write controller store: {}", path.display()))?;

        debug!("Controller store saved ({} controllers)", self.controllers.len());
        Ok(())
    }

    /// Load the store from a JSON file
    pub async fn load_from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let json = fs::read_to_string(path)
            .await
            .with_context(|| format!("Failed to read controller store: {}", path.display()))?;

        let snapshot: StoreSnapshot =
            serde_json::from_str(&json).context("Failed to parse controller store JSON")?;

        debug!(
            "Controller store loaded (version: {}, saved: {}, controllers: {})",
            snapshot.version,
            snapshot.timestamp,
            snapshot.controllers.len()
        );

        Ok(Self {
            controllers: snapshot.controllers,
        })
    }

    /// Load if the file exists, otherwise start empty
    pub async fn load_or_default(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if fs::try_exists(path).await.unwrap_or(false) {
            Self::load_from_file(path).await
        } else {
            debug!("No controller store at {}, starting empty", path.display());
            Ok(Self::new())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::controller::{ControllerInfo, InputComponent};
    use crate::driver::ComponentAdderDriver;
    use crate::hid::ControllerType;
    use crate::manager::id::UniqueControllerId;
    use tempfile::{NamedTempFile, TempDir};

    fn entity() -> ControllerEntity {
        let driver = ComponentAdderDriver::new("test", |entity, id| {
            entity.set_component_from(id, InputComponent::gamepad(None));
            Ok(())
        });
        let info = ControllerInfo::new(UniqueControllerId::polled("test", 0), ControllerType::unknown(), None);
        ControllerEntity::create(info, Box::new(driver)).unwrap()
    }

    #[test]
    fn test_record_then_apply() {
        let mut source = entity();
        source.generic_config_mut().unwrap().nickname = Some("Couch pad".to_string());
        source.input_mut().unwrap().settings_mut().button_activation_threshold = 0.8;

        let mut store = ControllerConfigStore::new();
        store.record("abc", &source);
        assert_eq!(store.get("abc").unwrap().name, "Couch pad");

        let mut fresh = entity();
        assert!(store.apply("abc", &mut fresh));
        assert_eq!(fresh.name(), "Couch pad");
        assert_eq!(fresh.input().unwrap().settings().button_activation_threshold, 0.8);

        assert!(!store.apply("missing", &mut fresh));
    }

    #[tokio::test]
    async fn test_save_load_file() {
        let mut store = ControllerConfigStore::new();
        store.record("abc", &entity());
        store.record("def", &entity());

        let file = NamedTempFile::new().unwrap();
        store.save_to_file(file.path()).await.unwrap();

        let loaded = ControllerConfigStore::load_from_file(file.path()).await.unwrap();
        assert_eq!(loaded, store);
        assert_eq!(loaded.uids().collect::<Vec<_>>(), vec!["abc", "def"]);
    }

    #[tokio::test]
    async fn test_load_or_default_missing_file() {
        let dir = TempDir::new().unwrap();
        let store = ControllerConfigStore::load_or_default(dir.path().join("nested/store.json"))
            .await
            .unwrap();
        assert!(store.is_empty());
    }

    #[tokio::test]
    async fn test_save_creates_parent_directory() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested/store.json");
        ControllerConfigStore::new().save_to_file(&path).await.unwrap();
        assert!(path.exists());
    }

    #[tokio::test]
    async fn test_corrupt_file_is_an_error() {
        let file = NamedTempFile::new().unwrap();
        std::fs::write(file.path(), "{ not json").unwrap();
        assert!(ControllerConfigStore::load_from_file(file.path()).await.is_err());
    }
}
