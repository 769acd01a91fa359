//! JSON-file-backed simulated device state.
//!
//! One flat key → value map plus a `last_updated` stamp, persisted to
//! `<certificates_dir>/<thing_name>/device_state.json`. The file models
//! one best-effort device, not a database — there is no durability
//! guarantee beyond the overwrite.

use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{ExplorerError, ExplorerResult};
use sx_protocol::topics;

const STATE_FILE: &str = "device_state.json";

/// The simulated device's state — the single source of truth for
/// "device reality".
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LocalState {
    /// Stamped on every save (ISO-8601).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_updated: Option<DateTime<Utc>>,
    /// Arbitrary device properties.
    #[serde(flatten)]
    pub values: serde_json::Map<String, serde_json::Value>,
}

impl LocalState {
    /// Seed state for a device whose shadow does not exist yet.
    pub fn bootstrap() -> Self {
        let mut values = serde_json::Map::new();
        values.insert("power".into(), serde_json::json!("on"));
        values.insert("temperature".into(), serde_json::json!(22.5));
        values.insert("firmware".into(), serde_json::json!(env!("CARGO_PKG_VERSION")));
        Self {
            last_updated: None,
            values,
        }
    }

    pub fn get(&self, key: &str) -> Option<&serde_json::Value> {
        self.values.get(key)
    }

    /// Direct simulated mutation. Callers are expected to route the result
    /// through `StateStore::save` and a shadow report, the same path the
    /// reconciliation engine uses.
    pub fn set(&mut self, key: impl Into<String>, value: serde_json::Value) {
        self.values.insert(key.into(), value);
    }
}

/// File-backed store for one thing's local state.
pub struct StateStore {
    path: PathBuf,
}

impl StateStore {
    /// Build the store for a thing.
    ///
    /// The thing name is validated against the restrictive identifier
    /// pattern before any path is constructed — user-supplied names must
    /// not be able to traverse out of the certificates directory.
    pub fn for_thing(base_dir: impl AsRef<Path>, thing_name: &str) -> ExplorerResult<Self> {
        topics::validate_thing_name(thing_name)
            .map_err(|e| ExplorerError::ThingName(e.to_string()))?;
        Ok(Self {
            path: base_dir.as_ref().join(thing_name).join(STATE_FILE),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read the state file.
    ///
    /// Missing, unreadable, or corrupt files are never fatal: they yield
    /// `None` plus a diagnostic, and the caller substitutes a bootstrap
    /// default or an empty map.
    pub fn load(&self) -> Option<LocalState> {
        let raw = match std::fs::read_to_string(&self.path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!(path = %self.path.display(), "no state file yet");
                return None;
            }
            Err(e) => {
                tracing::warn!(path = %self.path.display(), error = %e, "state file unreadable");
                return None;
            }
        };

        match serde_json::from_str(&raw) {
            Ok(state) => Some(state),
            Err(e) => {
                tracing::warn!(path = %self.path.display(), error = %e, "state file corrupt, ignoring");
                None
            }
        }
    }

    pub fn load_or_empty(&self) -> LocalState {
        self.load().unwrap_or_default()
    }

    /// Stamp `last_updated` and overwrite the file.
    pub fn save(&self, state: &mut LocalState) -> ExplorerResult<()> {
        state.last_updated = Some(Utc::now());

        if let Some(dir) = self.path.parent() {
            std::fs::create_dir_all(dir).map_err(|e| {
                ExplorerError::StateFile(format!("create '{}': {e}", dir.display()))
            })?;
        }

        let bytes = serde_json::to_vec_pretty(state)
            .map_err(|e| ExplorerError::Serialization(e.to_string()))?;
        std::fs::write(&self.path, bytes)
            .map_err(|e| ExplorerError::StateFile(format!("write '{}': {e}", self.path.display())))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn store_in(dir: &Path) -> StateStore {
        StateStore::for_thing(dir, "lamp-01").unwrap()
    }

    #[test]
    fn path_is_namespaced_by_thing() {
        let store = StateStore::for_thing("certificates", "lamp-01").unwrap();
        assert!(store.path().ends_with("lamp-01/device_state.json"));
    }

    #[test]
    fn traversal_thing_name_rejected_before_path_construction() {
        assert!(StateStore::for_thing("certificates", "../../etc").is_err());
        assert!(StateStore::for_thing("certificates", "a/b").is_err());
        assert!(StateStore::for_thing("certificates", "lamp 01").is_err());
    }

    #[test]
    fn load_missing_file_is_none() {
        let dir = tempfile::tempdir().unwrap();
        assert!(store_in(dir.path()).load().is_none());
    }

    #[test]
    fn load_corrupt_file_is_none() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_in(dir.path());
        std::fs::create_dir_all(store.path().parent().unwrap()).unwrap();
        std::fs::write(store.path(), b"{not json").unwrap();
        assert!(store.load().is_none());
    }

    #[test]
    fn save_then_load_roundtrip_refreshes_last_updated() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_in(dir.path());

        let mut state = LocalState::default();
        state.set("temperature", json!(22.5));
        state.set("power", json!("on"));
        store.save(&mut state).unwrap();

        let loaded = store.load().unwrap();
        assert_eq!(loaded.values, state.values);
        assert!(loaded.last_updated.is_some());

        let first_stamp = loaded.last_updated;
        let mut again = loaded;
        store.save(&mut again).unwrap();
        let reloaded = store.load().unwrap();
        assert_eq!(reloaded.values, state.values);
        assert!(reloaded.last_updated >= first_stamp);
    }

    #[test]
    fn file_is_flat_json_with_last_updated() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_in(dir.path());

        let mut state = LocalState::default();
        state.set("brightness", json!(50));
        store.save(&mut state).unwrap();

        let raw: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(store.path()).unwrap()).unwrap();
        assert_eq!(raw["brightness"], 50);
        assert!(raw["last_updated"].is_string());
    }

    #[test]
    fn bootstrap_state_has_seed_properties() {
        let state = LocalState::bootstrap();
        assert!(state.get("power").is_some());
        assert!(state.get("temperature").is_some());
        assert!(state.last_updated.is_none());
    }
}
