use thiserror::Error;

/// Error taxonomy shared by the registries, the store, the capability
/// implementations and the watcher cycle.
#[derive(Error, Debug)]
pub enum WatchError {
    /// Unknown watcher, data source, notification platform or formatter name.
    #[error("not found: {0}")]
    NotFound(String),

    /// Malformed configuration parameters.
    #[error("invalid parameters: {0}")]
    Validation(String),

    /// A name that must be unique is not.
    #[error("integrity violation: {0}")]
    Integrity(String),

    /// External source unreachable or its response unparsable.
    #[error("fetch failed: {0}")]
    Fetch(String),

    /// Notification transport failure.
    #[error("delivery failed: {0}")]
    Delivery(String),

    /// Document store I/O or (de)serialization fault.
    #[error("store error: {0}")]
    Store(String),
}

/// Result type for watcher operations.
pub type WatchResult<T> = Result<T, WatchError>;
