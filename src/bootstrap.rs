// src/bootstrap.rs
// Composition root: builds the store, fills both capability registries and
// wires the watcher together. Registration is a static table; adding an
// implementation means adding a line here.

use std::sync::Arc;

use crate::error::WatchResult;
use crate::notify::email::EmailPlatform;
use crate::notify::slack::SlackPlatform;
use crate::notify::NotificationPlatform;
use crate::registry::Registry;
use crate::sources::bazos::{BazosSource, Market};
use crate::sources::DataSource;
use crate::store::JsonStore;
use crate::watcher::Watcher;

/// Both capability registries with every built-in implementation registered.
pub fn registries(
    store: &Arc<JsonStore>,
) -> WatchResult<(Registry<dyn DataSource>, Registry<dyn NotificationPlatform>)> {
    let mut sources: Registry<dyn DataSource> = Registry::new("data source");
    for market in [Market::Cz, Market::Sk] {
        let store = Arc::clone(store);
        sources.register(market.source_name(), move || {
            Box::new(BazosSource::new(market, Arc::clone(&store)))
        })?;
    }

    let mut platforms: Registry<dyn NotificationPlatform> =
        Registry::new("notification platform");
    platforms.register("email", || Box::new(EmailPlatform::new()))?;
    platforms.register("slack", || Box::new(SlackPlatform::new()))?;

    Ok((sources, platforms))
}

/// A fully wired watcher over the store at `$WATCHER_DB_PATH`.
pub fn watcher() -> WatchResult<Watcher> {
    let store = Arc::new(JsonStore::from_env()?);
    let (sources, platforms) = registries(&store)?;
    Ok(Watcher::new(store, sources, platforms))
}
