use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

use crate::constants::storage::{OPTIONS_KEY, SOURCE_KEY, STATE_FILENAME};
use crate::schema::VersionId;
use crate::values::OptionValueMap;

/// Durable string map outside process memory
pub trait KeyValueStore {
    fn get(&self, key: &str) -> Option<String>;
    fn set(&mut self, key: &str, value: &str) -> Result<()>;
    fn remove(&mut self, key: &str) -> Result<()>;

    /// Write several keys as one unit where the backend allows it
    fn set_many(&mut self, entries: &[(&str, String)]) -> Result<()> {
        for (key, value) in entries {
            self.set(key, value)?;
        }
        Ok(())
    }
}

/// Volatile store used by tests and `--ephemeral`
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: HashMap<String, String>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> Option<String> {
        self.entries.get(key).cloned()
    }

    fn set(&mut self, key: &str, value: &str) -> Result<()> {
        self.entries.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&mut self, key: &str) -> Result<()> {
        self.entries.remove(key);
        Ok(())
    }
}

impl<S: KeyValueStore + ?Sized> KeyValueStore for Box<S> {
    fn get(&self, key: &str) -> Option<String> {
        (**self).get(key)
    }

    fn set(&mut self, key: &str, value: &str) -> Result<()> {
        (**self).set(key, value)
    }

    fn remove(&mut self, key: &str) -> Result<()> {
        (**self).remove(key)
    }

    fn set_many(&mut self, entries: &[(&str, String)]) -> Result<()> {
        (**self).set_many(entries)
    }
}

/// The state file at `path`, or a volatile store when there is none
pub fn open_store(path: Option<PathBuf>) -> Box<dyn KeyValueStore> {
    match path {
        Some(path) => {
            let store = FileStore::open(path);
            info!(path = %store.path().display(), "Using state file");
            Box::new(store)
        }
        None => {
            info!("Using in-memory state");
            Box::new(MemoryStore::new())
        }
    }
}

/// JSON object on disk, rewritten atomically on every change
#[derive(Debug)]
pub struct FileStore {
    path: PathBuf,
    entries: HashMap<String, String>,
}

impl FileStore {
    /// Default location: `<data_dir>/clang-format-configurator/state.json`
    pub fn default_path() -> PathBuf {
        let mut path = dirs::data_dir().unwrap_or_else(|| PathBuf::from("."));
        path.push(crate::constants::config::APP_DIR);
        path.push(STATE_FILENAME);
        path
    }

    /// Open (or lazily create) the store at `path`
    ///
    /// An unreadable or corrupt file is treated as empty.
    pub fn open(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let entries = match fs::read_to_string(&path) {
            Ok(contents) => serde_json::from_str(&contents).unwrap_or_else(|e| {
                warn!(path = %path.display(), error = %e, "State file is corrupt, starting empty");
                HashMap::new()
            }),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => HashMap::new(),
            Err(e) => {
                warn!(path = %path.display(), error = %e, "Failed to read state file, starting empty");
                HashMap::new()
            }
        };
        debug!(path = %path.display(), keys = entries.len(), "Opened state file");
        Self { path, entries }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn flush(&self) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create state directory {:?}", parent))?;
        }

        let json = serde_json::to_string_pretty(&self.entries)
            .context("Failed to serialize state to JSON")?;

        let tmp = self.path.with_extension("json.tmp");
        fs::write(&tmp, json).with_context(|| format!("Failed to write state to {:?}", tmp))?;
        fs::rename(&tmp, &self.path)
            .with_context(|| format!("Failed to move state into place at {:?}", self.path))?;
        Ok(())
    }
}

impl KeyValueStore for FileStore {
    fn get(&self, key: &str) -> Option<String> {
        self.entries.get(key).cloned()
    }

    fn set(&mut self, key: &str, value: &str) -> Result<()> {
        self.set_many(&[(key, value.to_string())])
    }

    fn remove(&mut self, key: &str) -> Result<()> {
        if self.entries.remove(key).is_some() {
            self.flush()?;
        }
        Ok(())
    }

    fn set_many(&mut self, entries: &[(&str, String)]) -> Result<()> {
        let previous = self.entries.clone();
        for (key, value) in entries {
            self.entries.insert(key.to_string(), value.clone());
        }
        // Keep memory and disk in agreement when the write fails
        self.flush().inspect_err(|_| self.entries = previous)
    }
}

/// Version plus explicitly set options, as stored under the `options` key
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SavedConfig {
    pub version: VersionId,
    pub options: OptionValueMap,
}

/// Everything that survives a restart
#[derive(Debug, Clone, PartialEq)]
pub struct PersistedState {
    pub source_text: String,
    pub saved_config: SavedConfig,
}

/// Typed access to the persisted editor text and option set
pub struct ConfigStateStore<S: KeyValueStore> {
    store: S,
}

impl<S: KeyValueStore> ConfigStateStore<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    /// Read the persisted state; absent or corrupt data yields `None`
    pub fn load_persisted(&self) -> Option<PersistedState> {
        let raw = self.store.get(OPTIONS_KEY)?;
        let saved_config = match serde_json::from_str::<SavedConfig>(&raw) {
            Ok(config) if !config.version.is_empty() => config,
            Ok(_) => {
                warn!("Persisted options have no version, ignoring");
                return None;
            }
            Err(e) => {
                warn!(error = %e, "Persisted options are corrupt, ignoring");
                return None;
            }
        };
        let source_text = self.store.get(SOURCE_KEY).unwrap_or_default();
        Some(PersistedState {
            source_text,
            saved_config,
        })
    }

    /// Persisted editor text, independent of whether options survived
    pub fn load_source(&self) -> Option<String> {
        self.store.get(SOURCE_KEY).filter(|s| !s.is_empty())
    }

    /// Persist a fully resolved state; both keys are written together
    pub fn save(&mut self, state: &PersistedState) -> Result<()> {
        let options = serde_json::to_string(&state.saved_config)
            .context("Failed to serialize option state")?;
        self.store.set_many(&[
            (SOURCE_KEY, state.source_text.clone()),
            (OPTIONS_KEY, options),
        ])?;
        debug!(
            version = %state.saved_config.version,
            options = state.saved_config.options.len(),
            "Persisted state"
        );
        Ok(())
    }

    /// Forget everything (explicit reset to defaults)
    pub fn clear(&mut self) -> Result<()> {
        self.store.remove(SOURCE_KEY)?;
        self.store.remove(OPTIONS_KEY)?;
        info!("Cleared persisted state");
        Ok(())
    }
}
