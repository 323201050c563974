// src/model.rs
// Persisted watcher configuration records and the canonical item form.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{WatchError, WatchResult};

/// The data-source half of a watcher: which source to poll, which of its
/// formatters renders the delta, and the source-specific parameter bag.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DataSourceRef {
    pub name: String,
    pub formatter: String,
    pub parameters: Value,
}

/// The notification half of a watcher.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlatformRef {
    pub name: String,
    pub parameters: Value,
}

/// One stored watcher record. Names are unique across the store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WatcherConfig {
    pub name: String,
    pub data_source: DataSourceRef,
    pub notification_platform: PlatformRef,
}

/// Canonical storage form of a single fetched record.
///
/// Sources define their own item shape; the watcher only needs value
/// equality and a serializable form. Equality is structural over the
/// underlying map, so two fetches of the same listing compare equal no
/// matter in which order the source populated the fields.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Item(pub serde_json::Map<String, Value>);

impl Item {
    /// Serialize a source-typed record into its canonical form.
    pub fn from_record<T: Serialize>(record: &T) -> WatchResult<Self> {
        match serde_json::to_value(record) {
            Ok(Value::Object(map)) => Ok(Item(map)),
            Ok(other) => Err(WatchError::Store(format!(
                "items must serialize to JSON objects, got {other}"
            ))),
            Err(e) => Err(WatchError::Store(e.to_string())),
        }
    }

    /// Reconstruct the source-typed record. Together with [`Item::from_record`]
    /// this must be a lossless round trip.
    pub fn to_record<T: DeserializeOwned>(&self) -> WatchResult<T> {
        serde_json::from_value(Value::Object(self.0.clone()))
            .map_err(|e| WatchError::Store(e.to_string()))
    }
}
