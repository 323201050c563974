// src/notify/email.rs
// SMTP notification platform. The recipient comes from the watcher's
// parameter bag; the transport itself is configured from the environment.

use async_trait::async_trait;
use lettre::message::{header, Mailbox, Message};
use lettre::transport::smtp::{authentication::Credentials, AsyncSmtpTransport};
use lettre::{AsyncTransport, Tokio1Executor};
use serde::Deserialize;
use serde_json::{json, Value};

use super::{NotificationPlatform, Payload, PayloadKind};
use crate::error::{WatchError, WatchResult};

#[derive(Debug, Clone, Deserialize)]
struct EmailParams {
    to: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Encryption {
    Ssl,
    Tls,
    Starttls,
}

struct SmtpConfig {
    host: String,
    port: u16,
    encryption: Encryption,
    username: String,
    password: String,
    sender: String,
}

impl SmtpConfig {
    fn from_env() -> WatchResult<Self> {
        fn var(name: &str) -> WatchResult<String> {
            std::env::var(name).map_err(|_| WatchError::Delivery(format!("{name} is not set")))
        }

        let port_raw = var("SMTP_PORT")?;
        let port: u16 = port_raw
            .parse()
            .map_err(|_| WatchError::Delivery(format!("bad SMTP_PORT '{port_raw}'")))?;

        let encryption_raw = var("SMTP_ENCRYPTION")?;
        let encryption = match encryption_raw.to_ascii_uppercase().as_str() {
            "SSL" => Encryption::Ssl,
            "TLS" => Encryption::Tls,
            "STARTTLS" => Encryption::Starttls,
            other => {
                return Err(WatchError::Delivery(format!(
                    "unsupported SMTP_ENCRYPTION '{other}'"
                )))
            }
        };

        Ok(Self {
            host: var("SMTP_HOST")?,
            port,
            encryption,
            username: var("SMTP_USERNAME")?,
            password: var("SMTP_PASSWORD")?,
            sender: var("SMTP_SENDER_EMAIL")?,
        })
    }
}

/// The `email` notification platform.
pub struct EmailPlatform {
    to: Option<Mailbox>,
}

impl EmailPlatform {
    pub fn new() -> Self {
        Self { to: None }
    }
}

impl Default for EmailPlatform {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl NotificationPlatform for EmailPlatform {
    fn name(&self) -> &'static str {
        "email"
    }

    fn parameter_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "to": {
                    "type": "string",
                    "format": "email",
                    "description": "Recipient address."
                }
            },
            "required": ["to"]
        })
    }

    fn set_params(&mut self, raw: &Value) -> WatchResult<()> {
        let params: EmailParams = serde_json::from_value(raw.clone())
            .map_err(|e| WatchError::Validation(format!("bad email parameters: {e}")))?;
        let to: Mailbox = params.to.parse().map_err(|e| {
            WatchError::Validation(format!("bad recipient address '{}': {e}", params.to))
        })?;
        self.to = Some(to);
        Ok(())
    }

    async fn notify(&self, payload: &Payload) -> WatchResult<()> {
        let to = self
            .to
            .clone()
            .ok_or_else(|| WatchError::Validation("parameters not initialized".into()))?;

        let config = SmtpConfig::from_env()?;
        let sender: Mailbox = config.sender.parse().map_err(|e| {
            WatchError::Delivery(format!("bad SMTP_SENDER_EMAIL '{}': {e}", config.sender))
        })?;

        let builder = match config.encryption {
            Encryption::Ssl | Encryption::Tls => {
                AsyncSmtpTransport::<Tokio1Executor>::relay(&config.host)
            }
            Encryption::Starttls => {
                AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&config.host)
            }
        }
        .map_err(|e| WatchError::Delivery(format!("smtp relay {}: {e}", config.host)))?;

        let mailer = builder
            .port(config.port)
            .credentials(Credentials::new(config.username, config.password))
            .build();

        let content_type = match payload.kind {
            PayloadKind::Html => header::ContentType::TEXT_HTML,
            PayloadKind::Plain => header::ContentType::TEXT_PLAIN,
        };

        let message = Message::builder()
            .from(sender)
            .to(to)
            .subject(payload.subject.clone())
            .header(content_type)
            .body(payload.body.clone())
            .map_err(|e| WatchError::Delivery(format!("build email: {e}")))?;

        mailer
            .send(message)
            .await
            .map_err(|e| WatchError::Delivery(format!("smtp send: {e}")))?;
        Ok(())
    }
}
