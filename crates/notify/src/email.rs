//! SendGrid e-mail notifier

use crate::{Notifier, NotifyError};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::time::Duration;
use tracing::{debug, warn};

/// SendGrid v3 mail-send settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EmailConfig {
    pub api_url: String,
    pub api_key: String,
    pub from_email: String,
    pub from_name: Option<String>,
    /// Request timeout (milliseconds)
    pub timeout_ms: u64,
}

impl Default for EmailConfig {
    fn default() -> Self {
        Self {
            api_url: "https://api.sendgrid.com/v3/mail/send".to_string(),
            api_key: String::new(),
            from_email: "alerts@localhost".to_string(),
            from_name: Some("Driver Watch".to_string()),
            timeout_ms: 2000,
        }
    }
}

/// Sends plain-text mail through the SendGrid HTTP API
pub struct EmailNotifier {
    config: EmailConfig,
    client: reqwest::Client,
}

impl EmailNotifier {
    pub fn new(config: EmailConfig) -> Result<Self, NotifyError> {
        if config.api_key.is_empty() {
            return Err(NotifyError::Config("SendGrid api_key is empty".into()));
        }

        let client = reqwest::Client::builder()
            .timeout(Duration::from_millis(config.timeout_ms))
            .build()
            .map_err(|e| NotifyError::Config(e.to_string()))?;

        Ok(Self { config, client })
    }

    fn payload(&self, to_email: &str, subject: &str, body: &str) -> Value {
        let mut from = json!({ "email": self.config.from_email });
        if let Some(name) = &self.config.from_name {
            from["name"] = json!(name);
        }

        json!({
            "personalizations": [{ "to": [{ "email": to_email }] }],
            "from": from,
            "subject": subject,
            "content": [{ "type": "text/plain", "value": body }],
        })
    }
}

impl Notifier for EmailNotifier {
    async fn send(&self, to_email: &str, subject: &str, body: &str) -> Result<(), NotifyError> {
        let response = self
            .client
            .post(&self.config.api_url)
            .bearer_auth(&self.config.api_key)
            .json(&self.payload(to_email, subject, body))
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    NotifyError::Timeout(self.config.timeout_ms)
                } else {
                    NotifyError::Transport(e.to_string())
                }
            })?;

        let status = response.status();
        if status.is_success() {
            debug!("Mail to {} accepted ({})", to_email, status);
            return Ok(());
        }

        let body = response.text().await.unwrap_or_default();
        warn!("Mail to {} rejected with {}", to_email, status);
        Err(NotifyError::Rejected {
            status: status.as_u16(),
            body,
        })
    }
}
