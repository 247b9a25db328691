//! Durable key-value store for user preferences

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use log::{debug, warn};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;

use crate::errors::{DashboardError, DashboardResult};

/// Settings persistence that survives restarts
pub trait SettingsStore: Send + Sync {
    fn load_setting(&self, key: &str) -> DashboardResult<Option<Value>>;

    fn persist_setting(&self, key: &str, value: Value) -> DashboardResult<()>;
}

/// Load a typed setting, falling back to `default` on absence or any failure
pub fn load_or<T>(store: &dyn SettingsStore, key: &str, default: T) -> T
where
    T: DeserializeOwned,
{
    match store.load_setting(key) {
        Ok(Some(value)) => match serde_json::from_value(value) {
            Ok(parsed) => parsed,
            Err(e) => {
                warn!("Could not decode setting '{}': {}, using default", key, e);
                default
            }
        },
        Ok(None) => default,
        Err(e) => {
            warn!("Could not load setting '{}': {}, using default", key, e);
            default
        }
    }
}

/// Persist a typed setting; failures are logged and swallowed
pub fn persist_best_effort<T>(store: &dyn SettingsStore, key: &str, value: &T) -> bool
where
    T: Serialize,
{
    let result = serde_json::to_value(value)
        .map_err(DashboardError::from)
        .and_then(|v| store.persist_setting(key, v));

    match result {
        Ok(()) => true,
        Err(e) => {
            warn!("Could not save setting '{}': {}", key, e);
            false
        }
    }
}

/// All settings in one pretty-printed JSON object on disk
#[derive(Debug)]
pub struct JsonFileStore {
    path: PathBuf,
    // Serialises read-modify-write cycles on the file
    lock: Mutex<()>,
}

impl JsonFileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn read_all(&self) -> DashboardResult<BTreeMap<String, Value>> {
        if !self.path.exists() {
            return Ok(BTreeMap::new());
        }
        let content = std::fs::read_to_string(&self.path)?;
        serde_json::from_str(&content).map_err(|e| {
            DashboardError::Persistence(format!("{}: {}", self.path.display(), e))
        })
    }

    /// Write to a temp file, then rename over the original
    fn write_all_atomic(&self, values: &BTreeMap<String, Value>) -> DashboardResult<()> {
        let temp_path = self.path.with_extension("tmp");
        let content = serde_json::to_string_pretty(values)
            .map_err(|e| DashboardError::Persistence(e.to_string()))?;
        std::fs::write(&temp_path, content)?;
        std::fs::rename(&temp_path, &self.path)?;
        Ok(())
    }
}

impl SettingsStore for JsonFileStore {
    fn load_setting(&self, key: &str) -> DashboardResult<Option<Value>> {
        let _guard = self
            .lock
            .lock()
            .map_err(|_| DashboardError::Persistence("settings lock poisoned".into()))?;
        Ok(self.read_all()?.remove(key))
    }

    fn persist_setting(&self, key: &str, value: Value) -> DashboardResult<()> {
        let _guard = self
            .lock
            .lock()
            .map_err(|_| DashboardError::Persistence("settings lock poisoned".into()))?;
        let mut values = self.read_all()?;
        values.insert(key.to_string(), value);
        self.write_all_atomic(&values)?;
        debug!("Setting '{}' saved to {:?}", key, self.path);
        Ok(())
    }
}

/// In-process store, lost on exit
#[derive(Debug, Default)]
pub struct MemoryStore {
    values: Mutex<BTreeMap<String, Value>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl SettingsStore for MemoryStore {
    fn load_setting(&self, key: &str) -> DashboardResult<Option<Value>> {
        let values = self
            .values
            .lock()
            .map_err(|_| DashboardError::Persistence("settings lock poisoned".into()))?;
        Ok(values.get(key).cloned())
    }

    fn persist_setting(&self, key: &str, value: Value) -> DashboardResult<()> {
        let mut values = self
            .values
            .lock()
            .map_err(|_| DashboardError::Persistence("settings lock poisoned".into()))?;
        values.insert(key.to_string(), value);
        Ok(())
    }
}
