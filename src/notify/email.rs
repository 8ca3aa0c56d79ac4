//! Email channel.
//!
//! Mail goes out through an HTTP relay that accepts
//! `{"from", "to", "subject", "text"}` and an optional bearer token.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, Url};
use serde::Serialize;

use super::{DeliveryError, Notification, NotificationChannel};
use crate::core::config::EmailSettings;
use crate::error::{Error, Result};
use crate::monitoring::alerts::AlertSeverity;
use crate::utils::constants::PROBE_USER_AGENT;
use crate::utils::validation::parse_http_url;

#[derive(Debug, Serialize)]
struct RelayMessage<'a> {
    from: &'a str,
    to: &'a [String],
    subject: String,
    text: String,
}

/// Delivers notifications by email via an HTTP mail relay
#[derive(Debug, Clone)]
pub struct EmailChannel {
    client: Client,
    relay_url: Url,
    api_key: Option<String>,
    from: String,
    recipients: Vec<String>,
    min_severity: AlertSeverity,
}

impl EmailChannel {
    /// Create channel from settings
    pub fn from_settings(settings: &EmailSettings) -> Result<Self> {
        let relay_url = parse_http_url(&settings.relay_url)
            .map_err(|reason| Error::setting("alerts.email.relay_url", reason))?;
        if settings.recipients.is_empty() {
            return Err(Error::setting("alerts.email.recipients", "must not be empty"));
        }

        let client = Client::builder()
            .timeout(Duration::from_secs(settings.timeout_secs))
            .user_agent(PROBE_USER_AGENT)
            .build()
            .map_err(|e| Error::HttpClient(format!("Failed to create email client: {}", e)))?;

        Ok(Self {
            client,
            relay_url,
            api_key: settings.api_key.clone(),
            from: settings.from.clone(),
            recipients: settings.recipients.clone(),
            min_severity: settings.min_severity,
        })
    }

    /// Configured recipients
    pub fn recipients(&self) -> &[String] {
        &self.recipients
    }
}

#[async_trait]
impl NotificationChannel for EmailChannel {
    fn name(&self) -> &str {
        "email"
    }

    fn min_severity(&self) -> AlertSeverity {
        self.min_severity
    }

    async fn deliver(&self, notification: &Notification) -> std::result::Result<(), DeliveryError> {
        let message = RelayMessage {
            from: &self.from,
            to: &self.recipients,
            subject: notification.subject(),
            text: notification.body(),
        };

        let mut request = self.client.post(self.relay_url.clone()).json(&message);
        if let Some(key) = &self.api_key {
            request = request.bearer_auth(key);
        }

        let response = request
            .send()
            .await
            .map_err(|e| DeliveryError::from_transport(&e))?;

        let status = response.status();
        if status.is_success() {
            return Ok(());
        }

        let body = response.text().await.unwrap_or_default();
        Err(DeliveryError::from_status(status.as_u16(), &body))
    }
}
