// src/notify/slack.rs
use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde_json::{json, Value};

use super::{NotificationPlatform, Payload};
use crate::error::{WatchError, WatchResult};

#[derive(Debug, Clone, Deserialize)]
struct SlackParams {
    webhook_url: String,
}

/// The `slack` notification platform: posts the payload as text to an
/// incoming-webhook URL.
pub struct SlackPlatform {
    webhook_url: Option<String>,
    client: Client,
}

impl SlackPlatform {
    pub fn new() -> Self {
        Self {
            webhook_url: None,
            client: Client::new(),
        }
    }
}

impl Default for SlackPlatform {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl NotificationPlatform for SlackPlatform {
    fn name(&self) -> &'static str {
        "slack"
    }

    fn parameter_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "webhook_url": {
                    "type": "string",
                    "format": "uri",
                    "description": "Incoming webhook URL."
                }
            },
            "required": ["webhook_url"]
        })
    }

    fn set_params(&mut self, raw: &Value) -> WatchResult<()> {
        let params: SlackParams = serde_json::from_value(raw.clone())
            .map_err(|e| WatchError::Validation(format!("bad slack parameters: {e}")))?;
        let url = reqwest::Url::parse(&params.webhook_url).map_err(|e| {
            WatchError::Validation(format!("bad webhook url '{}': {e}", params.webhook_url))
        })?;
        if !matches!(url.scheme(), "http" | "https") {
            return Err(WatchError::Validation(format!(
                "webhook url must be http(s), got '{}'",
                params.webhook_url
            )));
        }
        self.webhook_url = Some(params.webhook_url);
        Ok(())
    }

    async fn notify(&self, payload: &Payload) -> WatchResult<()> {
        let url = self
            .webhook_url
            .as_ref()
            .ok_or_else(|| WatchError::Validation("parameters not initialized".into()))?;

        let text = format!("*{}*\n{}", payload.subject, payload.body);
        let body = json!({ "text": text });

        self.client
            .post(url)
            .json(&body)
            .send()
            .await
            .map_err(|e| WatchError::Delivery(format!("slack post: {e}")))?
            .error_for_status()
            .map_err(|e| WatchError::Delivery(format!("slack non-2xx: {e}")))?;
        Ok(())
    }
}
