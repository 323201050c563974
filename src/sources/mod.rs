// src/sources/mod.rs
pub mod bazos;

use async_trait::async_trait;
use serde_json::Value;

use crate::error::WatchResult;
use crate::model::Item;
use crate::notify::Payload;

/// A pollable external source of items.
///
/// Implementations are resolved by name from the data-source registry, get
/// their persisted parameter bag via `set_params`, and are only then asked to
/// fetch. Fetch failures are not retried here; the watcher cycle aborts and
/// the next scheduled run tries again.
#[async_trait]
pub trait DataSource: Send + Sync {
    fn name(&self) -> &'static str;

    /// JSON description of the accepted configuration parameters.
    fn parameter_schema(&self) -> Value;

    /// Validate and bind configuration. Must be called before `fetch_items`.
    fn set_params(&mut self, raw: &Value) -> WatchResult<()>;

    /// Fetch the current full item set from the external source.
    async fn fetch_items(&self) -> WatchResult<Vec<Item>>;

    /// Baseline for a watcher; empty when none has been stored yet.
    fn get_stored_items(&self, watcher_name: &str) -> WatchResult<Vec<Item>>;

    /// Resolve one of this source's named formatting strategies.
    fn get_formatter(&self, formatter_name: &str) -> WatchResult<Box<dyn Formatter>>;

    /// Format items through the named formatter.
    fn format_items(&self, formatter_name: &str, items: &[Item]) -> WatchResult<Payload> {
        self.get_formatter(formatter_name)?.format_items(items)
    }
}

impl std::fmt::Debug for dyn DataSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DataSource").field("name", &self.name()).finish()
    }
}

/// Pure item-to-payload transformation. May read the ambient clock (the
/// email footer carries the current year) but has no other side effects.
pub trait Formatter: Send + Sync {
    fn format_items(&self, items: &[Item]) -> WatchResult<Payload>;
}

impl std::fmt::Debug for dyn Formatter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("Formatter")
    }
}
