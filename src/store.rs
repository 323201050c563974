// src/store.rs
// Flat JSON document store: one file, two tables (watcher configs and
// per-watcher item baselines), every operation serialized through a mutex.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use serde::{Deserialize, Serialize};

use crate::error::{WatchError, WatchResult};
use crate::model::{Item, WatcherConfig};

pub const ENV_DB_PATH: &str = "WATCHER_DB_PATH";
const DEFAULT_DB_PATH: &str = "watcher_db.json";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct Tables {
    #[serde(default)]
    watchers: Vec<WatcherConfig>,
    #[serde(default)]
    watcher_data: Vec<BaselineRecord>,
}

/// The last known full item set for one watcher.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct BaselineRecord {
    name: String,
    data: Vec<Item>,
}

/// File-backed document store. Each operation locks, reads the file, applies
/// its change and writes it back; no transaction spans two operations.
pub struct JsonStore {
    path: PathBuf,
    lock: Mutex<()>,
}

impl JsonStore {
    /// Store at `$WATCHER_DB_PATH`, defaulting to `watcher_db.json` in the
    /// working directory. Relative paths resolve against the working
    /// directory.
    pub fn from_env() -> WatchResult<Self> {
        let raw = std::env::var(ENV_DB_PATH).unwrap_or_else(|_| DEFAULT_DB_PATH.to_string());
        let path = PathBuf::from(raw);
        let path = if path.is_absolute() {
            path
        } else {
            std::env::current_dir()
                .map_err(|e| WatchError::Store(format!("working directory: {e}")))?
                .join(path)
        };
        Ok(Self::open(path))
    }

    pub fn open(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn read(&self) -> WatchResult<Tables> {
        match fs::read_to_string(&self.path) {
            Ok(raw) => serde_json::from_str(&raw)
                .map_err(|e| WatchError::Store(format!("{}: {e}", self.path.display()))),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Tables::default()),
            Err(e) => Err(WatchError::Store(format!("{}: {e}", self.path.display()))),
        }
    }

    fn write(&self, tables: &Tables) -> WatchResult<()> {
        let raw = serde_json::to_string_pretty(tables)
            .map_err(|e| WatchError::Store(e.to_string()))?;
        fs::write(&self.path, raw)
            .map_err(|e| WatchError::Store(format!("{}: {e}", self.path.display())))
    }

    /// Load one watcher config by name. The store is expected to hold unique
    /// names; more than one match is reported rather than silently picking
    /// the first.
    pub fn get_watcher(&self, name: &str) -> WatchResult<WatcherConfig> {
        let _guard = self.lock.lock().expect("store mutex poisoned");
        let tables = self.read()?;
        let mut matches = tables.watchers.iter().filter(|w| w.name == name);
        match (matches.next(), matches.next()) {
            (None, _) => Err(WatchError::NotFound(format!("watcher '{name}' not found"))),
            (Some(config), None) => Ok(config.clone()),
            (Some(_), Some(_)) => Err(WatchError::Integrity(format!(
                "watchers must have unique names, found more than one named '{name}'"
            ))),
        }
    }

    pub fn watcher_exists(&self, name: &str) -> WatchResult<bool> {
        let _guard = self.lock.lock().expect("store mutex poisoned");
        Ok(self.read()?.watchers.iter().any(|w| w.name == name))
    }

    /// Append a watcher record. Uniqueness is the caller's concern; see
    /// [`crate::watcher::Watcher::create`].
    pub fn insert_watcher(&self, config: &WatcherConfig) -> WatchResult<()> {
        let _guard = self.lock.lock().expect("store mutex poisoned");
        let mut tables = self.read()?;
        tables.watchers.push(config.clone());
        self.write(&tables)
    }

    /// Replace the record stored under `name`. A rename moves the stored
    /// baseline along with the config.
    pub fn replace_watcher(&self, name: &str, config: &WatcherConfig) -> WatchResult<()> {
        let _guard = self.lock.lock().expect("store mutex poisoned");
        let mut tables = self.read()?;

        let position = tables
            .watchers
            .iter()
            .position(|w| w.name == name)
            .ok_or_else(|| WatchError::NotFound(format!("watcher '{name}' not found")))?;

        if config.name != name && tables.watchers.iter().any(|w| w.name == config.name) {
            return Err(WatchError::Integrity(format!(
                "watcher '{}' already exists",
                config.name
            )));
        }

        tables.watchers[position] = config.clone();
        if config.name != name {
            for record in tables.watcher_data.iter_mut().filter(|r| r.name == name) {
                record.name = config.name.clone();
            }
        }
        self.write(&tables)
    }

    /// Remove a watcher record together with its stored baseline.
    pub fn delete_watcher(&self, name: &str) -> WatchResult<()> {
        let _guard = self.lock.lock().expect("store mutex poisoned");
        let mut tables = self.read()?;

        let before = tables.watchers.len();
        tables.watchers.retain(|w| w.name != name);
        if tables.watchers.len() == before {
            return Err(WatchError::NotFound(format!("watcher '{name}' not found")));
        }
        tables.watcher_data.retain(|r| r.name != name);
        self.write(&tables)
    }

    /// Stored watcher names in insertion order.
    pub fn watcher_names(&self) -> WatchResult<Vec<String>> {
        let _guard = self.lock.lock().expect("store mutex poisoned");
        Ok(self.read()?.watchers.iter().map(|w| w.name.clone()).collect())
    }

    /// Baseline for one watcher; an absent record reads as empty.
    pub fn get_items(&self, watcher_name: &str) -> WatchResult<Vec<Item>> {
        let _guard = self.lock.lock().expect("store mutex poisoned");
        let tables = self.read()?;
        Ok(tables
            .watcher_data
            .iter()
            .find(|r| r.name == watcher_name)
            .map(|r| r.data.clone())
            .unwrap_or_default())
    }

    /// Upsert the baseline for one watcher.
    pub fn set_items(&self, watcher_name: &str, items: &[Item]) -> WatchResult<()> {
        let _guard = self.lock.lock().expect("store mutex poisoned");
        let mut tables = self.read()?;
        match tables
            .watcher_data
            .iter_mut()
            .find(|r| r.name == watcher_name)
        {
            Some(record) => record.data = items.to_vec(),
            None => tables.watcher_data.push(BaselineRecord {
                name: watcher_name.to_string(),
                data: items.to_vec(),
            }),
        }
        self.write(&tables)
    }
}
