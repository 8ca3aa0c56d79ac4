//! Notification channels.
//!
//! A channel takes a formatted [`Notification`] and delivers it somewhere:
//! the process log, an HTTP mail relay, or a webhook. Channels attempt a
//! single delivery and classify failures with [`DeliveryError`]; retrying
//! belongs to the dispatcher worker that owns the channel.

pub mod email;
pub mod log;
pub mod webhook;

pub use email::EmailChannel;
pub use log::LogChannel;
pub use webhook::WebhookChannel;

use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use serde::Serialize;
use thiserror::Error;

use crate::core::descriptor::Criticality;
use crate::monitoring::alerts::{AlertEvent, AlertKind, AlertSeverity};
use crate::monitoring::health::HealthState;

// ═══════════════════════════════════════════════════════════════════════════════
// DELIVERY ERRORS
// ═══════════════════════════════════════════════════════════════════════════════

/// Why one delivery attempt failed
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DeliveryError {
    /// Channel endpoint could not be reached
    #[error("channel unreachable: {0}")]
    Unreachable(String),

    /// Channel did not answer in time
    #[error("channel timed out")]
    Timeout,

    /// Channel asked us to slow down (408/429)
    #[error("rate limited by channel (HTTP {status})")]
    RateLimited {
        /// HTTP status
        status: u16,
    },

    /// Channel rejected the request
    #[error("rejected by channel (HTTP {status}): {body}")]
    Rejected {
        /// HTTP status
        status: u16,
        /// Response body, truncated
        body: String,
    },

    /// Notification could not be encoded for this channel
    #[error("malformed payload: {0}")]
    Payload(String),
}

impl DeliveryError {
    /// Classify a non-2xx HTTP answer
    pub fn from_status(status: u16, body: &str) -> Self {
        match status {
            408 | 429 => DeliveryError::RateLimited { status },
            _ => DeliveryError::Rejected {
                status,
                body: body.chars().take(256).collect(),
            },
        }
    }

    /// Classify a transport error from the HTTP client
    pub fn from_transport(err: &reqwest::Error) -> Self {
        if err.is_timeout() {
            DeliveryError::Timeout
        } else if err.is_builder() {
            DeliveryError::Payload(err.to_string())
        } else {
            DeliveryError::Unreachable(err.to_string())
        }
    }

    /// Returns true if a later attempt may succeed
    pub fn is_retryable(&self) -> bool {
        match self {
            DeliveryError::Unreachable(_) | DeliveryError::Timeout | DeliveryError::RateLimited { .. } => true,
            DeliveryError::Rejected { status, .. } => *status >= 500,
            DeliveryError::Payload(_) => false,
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// NOTIFICATION
// ═══════════════════════════════════════════════════════════════════════════════

/// An alert ready for delivery
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notification {
    /// The transition being reported
    pub event: AlertEvent,
    /// Events for the same (service, severity) swallowed since the last delivery
    pub suppressed_count: u64,
}

/// JSON body posted to webhooks
#[derive(Debug, Clone, Serialize)]
pub struct WebhookPayload<'a> {
    /// Service name
    pub service: &'a str,
    /// State before
    pub previous_state: HealthState,
    /// State after
    pub new_state: HealthState,
    /// Severity
    pub severity: AlertSeverity,
    /// Transition kind
    pub kind: AlertKind,
    /// ISO-8601 timestamp
    pub timestamp: String,
    /// Criticality tier
    pub criticality: Criticality,
    /// Human-readable summary
    pub message: String,
    /// Last probe error
    pub detail: Option<&'a str>,
    /// Events suppressed since the previous notification
    pub suppressed_count: u64,
}

impl Notification {
    /// Wrap an event
    pub fn new(event: AlertEvent, suppressed_count: u64) -> Self {
        Self {
            event,
            suppressed_count,
        }
    }

    /// Severity of the underlying event
    pub fn severity(&self) -> AlertSeverity {
        self.event.severity
    }

    /// Event time as ISO-8601
    pub fn timestamp(&self) -> String {
        format_timestamp(self.event.timestamp)
    }

    /// Subject line
    pub fn subject(&self) -> String {
        let tag = match self.event.kind {
            AlertKind::Recovery => "RESOLVED",
            _ => self.event.severity.as_str(),
        };
        format!("[{}] {}", tag, self.event.summary())
    }

    /// Plain-text body
    pub fn body(&self) -> String {
        let event = &self.event;
        let mut body = format!(
            "Service: {}\nCriticality: {}\nTransition: {} -> {}\nSeverity: {}\nTime: {}\n",
            event.service,
            event.criticality,
            event.previous,
            event.current,
            event.severity,
            self.timestamp(),
        );
        if let Some(detail) = &event.detail {
            let label = match event.kind {
                AlertKind::SlowResponse => "Latency",
                _ => "Last error",
            };
            body.push_str(&format!("{}: {}\n", label, detail));
        }
        if self.suppressed_count > 0 {
            body.push_str(&format!(
                "Suppressed since last notification: {}\n",
                self.suppressed_count
            ));
        }
        body
    }

    /// Structured webhook body
    pub fn webhook_payload(&self) -> WebhookPayload<'_> {
        let event = &self.event;
        WebhookPayload {
            service: &event.service,
            previous_state: event.previous,
            new_state: event.current,
            severity: event.severity,
            kind: event.kind,
            timestamp: self.timestamp(),
            criticality: event.criticality,
            message: event.summary(),
            detail: event.detail.as_deref(),
            suppressed_count: self.suppressed_count,
        }
    }
}

/// Render a timestamp as RFC 3339 with second precision
pub fn format_timestamp(timestamp: DateTime<Utc>) -> String {
    timestamp.to_rfc3339_opts(SecondsFormat::Secs, true)
}

// ═══════════════════════════════════════════════════════════════════════════════
// CHANNEL TRAIT
// ═══════════════════════════════════════════════════════════════════════════════

/// A destination for notifications
#[async_trait]
pub trait NotificationChannel: Send + Sync {
    /// Identifier used in logs and failure reports
    fn name(&self) -> &str;

    /// Lowest severity this channel receives
    fn min_severity(&self) -> AlertSeverity;

    /// Whether the channel wants this notification
    fn accepts(&self, notification: &Notification) -> bool {
        notification.severity() >= self.min_severity()
    }

    /// Make one delivery attempt
    async fn deliver(&self, notification: &Notification) -> Result<(), DeliveryError>;
}
