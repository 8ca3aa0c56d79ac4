//! Webhook channel.
//!
//! Posts the JSON body from [`Notification::webhook_payload`] to a fixed URL.

use std::collections::BTreeMap;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use reqwest::{Client, Url};

use super::{DeliveryError, Notification, NotificationChannel};
use crate::core::config::WebhookSettings;
use crate::error::{Error, Result};
use crate::monitoring::alerts::AlertSeverity;
use crate::utils::constants::PROBE_USER_AGENT;
use crate::utils::validation::parse_http_url;

/// Delivers notifications as JSON POST requests
#[derive(Debug, Clone)]
pub struct WebhookChannel {
    client: Client,
    url: Url,
    min_severity: AlertSeverity,
}

impl WebhookChannel {
    /// Create channel from settings
    pub fn from_settings(settings: &WebhookSettings) -> Result<Self> {
        let url = parse_http_url(&settings.url).map_err(|reason| Error::setting("alerts.webhook.url", reason))?;
        let headers = build_headers(&settings.headers)?;

        let client = Client::builder()
            .timeout(Duration::from_secs(settings.timeout_secs))
            .user_agent(PROBE_USER_AGENT)
            .default_headers(headers)
            .build()
            .map_err(|e| Error::HttpClient(format!("Failed to create webhook client: {}", e)))?;

        Ok(Self {
            client,
            url,
            min_severity: settings.min_severity,
        })
    }

    /// Target URL
    pub fn url(&self) -> &Url {
        &self.url
    }
}

fn build_headers(headers: &BTreeMap<String, String>) -> Result<HeaderMap> {
    let mut map = HeaderMap::new();
    for (name, value) in headers {
        let name = HeaderName::from_bytes(name.as_bytes())
            .map_err(|e| Error::setting("alerts.webhook.headers", format!("'{}': {}", name, e)))?;
        let value = HeaderValue::from_str(value)
            .map_err(|e| Error::setting("alerts.webhook.headers", format!("'{}': {}", name, e)))?;
        map.insert(name, value);
    }
    Ok(map)
}

#[async_trait]
impl NotificationChannel for WebhookChannel {
    fn name(&self) -> &str {
        "webhook"
    }

    fn min_severity(&self) -> AlertSeverity {
        self.min_severity
    }

    async fn deliver(&self, notification: &Notification) -> std::result::Result<(), DeliveryError> {
        let response = self
            .client
            .post(self.url.clone())
            .json(&notification.webhook_payload())
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
