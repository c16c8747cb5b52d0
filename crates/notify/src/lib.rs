//! Notification Module
//!
//! Best-effort remote notifications for escalated alerts:
//! - SendGrid e-mail over HTTPS
//! - MQTT publish to the fleet broker
//! - Log-only sink for development
//!
//! A failed send is reported to the caller and never retried here;
//! the escalation policy decides when to try again.

mod email;
mod mqtt;

pub use email::{EmailConfig, EmailNotifier};
pub use mqtt::{AlertMessage, MqttConfig, MqttNotifier};

use serde::{Deserialize, Serialize};
use std::future::Future;
use thiserror::Error;
use tracing::info;

/// Notification error types
#[derive(Error, Debug)]
pub enum NotifyError {
    #[error("Connection failed: {0}")]
    Connection(String),

    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Rejected by provider (status {status}): {body}")]
    Rejected { status: u16, body: String },

    #[error("Timed out after {0}ms")]
    Timeout(u64),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Configuration error: {0}")]
    Config(String),
}

/// Remote message sink
pub trait Notifier: Send + Sync {
    /// Deliver one message; `Ok` means the provider accepted it
    fn send(
        &self,
        to_email: &str,
        subject: &str,
        body: &str,
    ) -> impl Future<Output = Result<(), NotifyError>> + Send;
}

/// Notifier that only writes the message to the log
#[derive(Debug, Clone, Default)]
pub struct LogNotifier;

impl Notifier for LogNotifier {
    async fn send(&self, to_email: &str, subject: &str, body: &str) -> Result<(), NotifyError> {
        info!(to = to_email, subject, "Notification: {}", body);
        Ok(())
    }
}

/// Notifier selection
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum NotifierConfig {
    #[default]
    Log,
    Sendgrid(EmailConfig),
    Mqtt(MqttConfig),
}

/// Runtime-selected notifier
pub enum AnyNotifier {
    Log(LogNotifier),
    Email(EmailNotifier),
    Mqtt(MqttNotifier),
}

impl AnyNotifier {
    /// Build (and for MQTT, connect) the configured notifier
    pub async fn from_config(config: &NotifierConfig) -> Result<Self, NotifyError> {
        match config {
            NotifierConfig::Log => Ok(AnyNotifier::Log(LogNotifier)),
            NotifierConfig::Sendgrid(cfg) => Ok(AnyNotifier::Email(EmailNotifier::new(cfg.clone())?)),
            NotifierConfig::Mqtt(cfg) => {
                let mut notifier = MqttNotifier::new(cfg.clone());
                notifier.connect().await?;
                Ok(AnyNotifier::Mqtt(notifier))
            }
        }
    }
}

impl Notifier for AnyNotifier {
    async fn send(&self, to_email: &str, subject: &str, body: &str) -> Result<(), NotifyError> {
        match self {
            AnyNotifier::Log(n) => n.send(to_email, subject, body).await,
            AnyNotifier::Email(n) => n.send(to_email, subject, body).await,
            AnyNotifier::Mqtt(n) => n.send(to_email, subject, body).await,
        }
    }
}
