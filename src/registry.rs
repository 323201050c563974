// src/registry.rs
// Name-to-factory tables for the two capability families.

use std::collections::HashMap;

use serde_json::Value;

use crate::error::{WatchError, WatchResult};
use crate::notify::NotificationPlatform;
use crate::sources::DataSource;

type Factory<T> = Box<dyn Fn() -> Box<T> + Send + Sync>;

/// Registry for one capability family (data sources or notification
/// platforms). Filled once by the composition root at startup and read-only
/// afterwards, so resolution needs no locking.
pub struct Registry<T: ?Sized> {
    kind: &'static str,
    entries: HashMap<String, Factory<T>>,
}

impl<T: ?Sized> Registry<T> {
    pub fn new(kind: &'static str) -> Self {
        Self {
            kind,
            entries: HashMap::new(),
        }
    }

    /// Register a named factory. Names must be unique for the process
    /// lifetime.
    pub fn register<F>(&mut self, name: &str, factory: F) -> WatchResult<()>
    where
        F: Fn() -> Box<T> + Send + Sync + 'static,
    {
        if self.entries.contains_key(name) {
            return Err(WatchError::Integrity(format!(
                "a {} named '{name}' is already registered",
                self.kind
            )));
        }
        self.entries.insert(name.to_string(), Box::new(factory));
        Ok(())
    }

    /// Construct a fresh instance of the named implementation.
    pub fn resolve(&self, name: &str) -> WatchResult<Box<T>> {
        match self.entries.get(name) {
            Some(factory) => Ok(factory()),
            None => Err(WatchError::NotFound(format!(
                "{} '{name}' is not registered",
                self.kind
            ))),
        }
    }

    /// Registered names, sorted for stable listings.
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.entries.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }
}

impl Registry<dyn DataSource> {
    /// JSON description of the named source's configuration parameters.
    pub fn parameter_schema(&self, name: &str) -> WatchResult<Value> {
        Ok(self.resolve(name)?.parameter_schema())
    }
}

impl Registry<dyn NotificationPlatform> {
    /// JSON description of the named platform's configuration parameters.
    pub fn parameter_schema(&self, name: &str) -> WatchResult<Value> {
        Ok(self.resolve(name)?.parameter_schema())
    }
}
