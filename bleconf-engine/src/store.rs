//! Durable settings storage.
//!
//! The engine keeps its working state in memory and writes the whole
//! document back through a [`SettingsStore`] whenever something
//! persistent changes (token rotation, endpoint config, device
//! settings). The file implementation writes to a temporary file and
//! renames it over the target so a crash mid-write cannot leave a
//! truncated document.

use crate::error::EngineError;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use tracing::debug;

/// Mutable device settings controlled over the provisioning channel.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DeviceSettings {
    pub volume: u8,
    pub mic_enabled: bool,
    pub dialogue_enabled: bool,
    pub sound_enabled: bool,
    pub idle_timeout: u8,
    pub sleep_mode: u8,
    pub sleep_interval: u32,
}

impl Default for DeviceSettings {
    fn default() -> Self {
        Self {
            volume: 50,
            mic_enabled: true,
            dialogue_enabled: true,
            sound_enabled: true,
            idle_timeout: 30,
            sleep_mode: 0,
            sleep_interval: 0,
        }
    }
}

/// The full persisted document: session token, configuring flag,
/// remote endpoint, and device settings.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PersistedState {
    pub token: String,
    pub configuring: bool,
    pub endpoint_url: String,
    pub endpoint_token: String,
    pub settings: DeviceSettings,
}

/// Loads and saves the persisted state document.
pub trait SettingsStore: Send + Sync {
    fn load(&self) -> Result<PersistedState, EngineError>;
    fn save(&self, state: &PersistedState) -> Result<(), EngineError>;
}

/// JSON file backed store.
#[derive(Debug)]
pub struct FileStore {
    path: PathBuf,
}

impl FileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl SettingsStore for FileStore {
    /// Returns defaults when the file does not exist yet.
    fn load(&self) -> Result<PersistedState, EngineError> {
        match std::fs::read_to_string(&self.path) {
            Ok(content) => Ok(serde_json::from_str(&content)?),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!(path = %self.path.display(), "no settings file, starting from defaults");
                Ok(PersistedState::default())
            }
            Err(e) => Err(e.into()),
        }
    }

    fn save(&self, state: &PersistedState) -> Result<(), EngineError> {
        let content = serde_json::to_vec_pretty(state)?;
        let tmp = self.path.with_extension("json.tmp");
        std::fs::write(&tmp, &content)?;
        std::fs::rename(&tmp, &self.path)?;
        Ok(())
    }
}

/// In-memory store for tests.
#[derive(Debug, Default)]
pub struct MemoryStore {
    state: parking_lot::Mutex<PersistedState>,
}

impl MemoryStore {
    pub fn new(initial: PersistedState) -> Self {
        Self {
            state: parking_lot::Mutex::new(initial),
        }
    }
}

impl SettingsStore for MemoryStore {
    fn load(&self) -> Result<PersistedState, EngineError> {
        Ok(self.state.lock().clone())
    }

    fn save(&self, state: &PersistedState) -> Result<(), EngineError> {
        *self.state.lock() = state.clone();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_file_store_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileStore::new(dir.path().join("settings.json"));

        let mut state = PersistedState::default();
        state.token = "abcdefghijklmnopqrstuvwxyz012345".to_string();
        state.settings.volume = 80;

        store.save(&state).unwrap();
        assert_eq!(store.load().unwrap(), state);
    }

    #[test]
    fn test_missing_file_loads_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileStore::new(dir.path().join("nope.json"));
        assert_eq!(store.load().unwrap(), PersistedState::default());
    }

    #[test]
    fn test_save_overwrites_previous() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileStore::new(dir.path().join("settings.json"));

        let mut state = PersistedState::default();
        store.save(&state).unwrap();
        state.configuring = true;
        store.save(&state).unwrap();
        assert!(store.load().unwrap().configuring);
    }

    #[test]
    fn test_memory_store() {
        let store = MemoryStore::default();
        let mut state = store.load().unwrap();
        state.endpoint_url = "https://report.example".to_string();
        store.save(&state).unwrap();
        assert_eq!(store.load().unwrap().endpoint_url, "https://report.example");
    }

    #[test]
    fn test_corrupt_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        std::fs::write(&path, "{not json").unwrap();
        let store = FileStore::new(path);
        assert!(matches!(store.load(), Err(EngineError::StoreFormat(_))));
    }
}
