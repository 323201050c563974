// src/watcher.rs
// The per-watcher check cycle: load, resolve, fetch, diff, format, notify,
// persist. Plus registration CRUD and the batch runner.

use std::sync::Arc;

use tracing::{info, warn};

use crate::error::{WatchError, WatchResult};
use crate::model::{Item, WatcherConfig};
use crate::notify::NotificationPlatform;
use crate::registry::Registry;
use crate::sources::DataSource;
use crate::store::JsonStore;

/// Outcome of a single watcher check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CheckOutcome {
    /// First run: the fetched set became the baseline, nothing was sent.
    Initialized { item_count: usize },
    /// The fetch matched the baseline, nothing was sent.
    Unchanged,
    /// New items were formatted and dispatched.
    Notified { new_items: usize },
}

/// Per-watcher result of a batch run.
#[derive(Debug)]
pub struct CheckReport {
    pub watcher: String,
    pub outcome: WatchResult<CheckOutcome>,
}

/// Orchestrates watchers over a store and the two capability registries.
/// Constructed once by the composition root. Cycles run strictly one after
/// another, and there is no timeout at this layer: a hung fetch blocks the
/// batch.
pub struct Watcher {
    store: Arc<JsonStore>,
    sources: Registry<dyn DataSource>,
    platforms: Registry<dyn NotificationPlatform>,
}

impl Watcher {
    pub fn new(
        store: Arc<JsonStore>,
        sources: Registry<dyn DataSource>,
        platforms: Registry<dyn NotificationPlatform>,
    ) -> Self {
        Self {
            store,
            sources,
            platforms,
        }
    }

    pub fn sources(&self) -> &Registry<dyn DataSource> {
        &self.sources
    }

    pub fn platforms(&self) -> &Registry<dyn NotificationPlatform> {
        &self.platforms
    }

    /// Run the check cycle for one watcher.
    pub async fn check(&self, watcher_name: &str) -> WatchResult<CheckOutcome> {
        let config = self.store.get_watcher(watcher_name)?;

        let mut source = self.sources.resolve(&config.data_source.name)?;
        source.set_params(&config.data_source.parameters)?;

        // Platform parameters are bound before the fetch; a broken recipient
        // config fails the cycle without a network round trip.
        let mut platform = self.platforms.resolve(&config.notification_platform.name)?;
        platform.set_params(&config.notification_platform.parameters)?;

        let fetched = source.fetch_items().await?;
        let baseline = source.get_stored_items(watcher_name)?;

        // Initial run: remember what is already out there instead of
        // flooding the recipient with every pre-existing listing.
        if baseline.is_empty() {
            self.store.set_items(watcher_name, &fetched)?;
            info!(
                watcher = watcher_name,
                items = fetched.len(),
                "baseline initialized"
            );
            return Ok(CheckOutcome::Initialized {
                item_count: fetched.len(),
            });
        }

        // Set difference by value equality, fetch order preserved.
        let new_items: Vec<Item> = fetched
            .iter()
            .filter(|item| !baseline.contains(item))
            .cloned()
            .collect();

        if new_items.is_empty() {
            return Ok(CheckOutcome::Unchanged);
        }

        info!(
            watcher = watcher_name,
            new_items = new_items.len(),
            "found new items"
        );

        let payload = source.format_items(&config.data_source.formatter, &new_items)?;
        platform.notify(&payload).await?;

        // The full fetched set becomes the baseline only after the
        // notification went out.
        self.store.set_items(watcher_name, &fetched)?;

        Ok(CheckOutcome::Notified {
            new_items: new_items.len(),
        })
    }

    /// Run the check cycle for every stored watcher. One watcher's failure
    /// never aborts the batch; each outcome is reported independently.
    pub async fn check_all(&self) -> WatchResult<Vec<CheckReport>> {
        let names = self.store.watcher_names()?;
        let mut reports = Vec::with_capacity(names.len());
        for name in names {
            let outcome = self.check(&name).await;
            if let Err(e) = &outcome {
                warn!(watcher = %name, error = %e, "check failed");
            }
            reports.push(CheckReport {
                watcher: name,
                outcome,
            });
        }
        Ok(reports)
    }

    /// Register a new watcher after validating its configuration.
    ///
    /// Existence check and insert are two separately locked store
    /// operations, so concurrent creates of the same name can race in the
    /// gap; single-process usage keeps the window harmless.
    pub fn create(&self, config: &WatcherConfig) -> WatchResult<()> {
        self.validate_config(config)?;
        if self.store.watcher_exists(&config.name)? {
            return Err(WatchError::Integrity(format!(
                "watcher '{}' already exists",
                config.name
            )));
        }
        self.store.insert_watcher(config)?;
        info!(watcher = %config.name, "watcher created");
        Ok(())
    }

    /// Replace a stored watcher. A rename moves the baseline to the new name.
    pub fn update(&self, name: &str, config: &WatcherConfig) -> WatchResult<()> {
        self.validate_config(config)?;
        self.store.replace_watcher(name, config)?;
        info!(watcher = name, "watcher updated");
        Ok(())
    }

    /// Delete a watcher and its stored baseline.
    pub fn delete(&self, name: &str) -> WatchResult<()> {
        self.store.delete_watcher(name)?;
        info!(watcher = name, "watcher deleted");
        Ok(())
    }

    /// Stored watcher names.
    pub fn list(&self) -> WatchResult<Vec<String>> {
        self.store.watcher_names()
    }

    /// A watcher record is only accepted when both capability names resolve,
    /// both parameter bags pass validation and the formatter name is known.
    fn validate_config(&self, config: &WatcherConfig) -> WatchResult<()> {
        let mut source = self.sources.resolve(&config.data_source.name)?;
        source.set_params(&config.data_source.parameters)?;
        source.get_formatter(&config.data_source.formatter)?;

        let mut platform = self.platforms.resolve(&config.notification_platform.name)?;
        platform.set_params(&config.notification_platform.parameters)?;
        Ok(())
    }
}
