// src/notify/mod.rs
pub mod email;
pub mod slack;

use async_trait::async_trait;
use serde_json::Value;

use crate::error::WatchResult;

/// How a payload body should be interpreted by the transport.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PayloadKind {
    Html,
    Plain,
}

/// Formatted notification bundle: created fresh per cycle by a formatter,
/// consumed immediately by a platform, never persisted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Payload {
    pub subject: String,
    pub body: String,
    pub kind: PayloadKind,
}

/// An outbound notification channel.
///
/// Implementations are resolved by name from the platform registry and get
/// their persisted parameter bag via `set_params` before `notify` is called.
/// Delivery failures are not retried here.
#[async_trait]
pub trait NotificationPlatform: Send + Sync {
    fn name(&self) -> &'static str;

    /// JSON description of the accepted configuration parameters.
    fn parameter_schema(&self) -> Value;

    /// Validate and bind configuration. Must be called before `notify`.
    fn set_params(&mut self, raw: &Value) -> WatchResult<()>;

    /// Dispatch the payload through the external channel.
    async fn notify(&self, payload: &Payload) -> WatchResult<()>;
}
