//! Log channel.

use async_trait::async_trait;
use tracing::{info, warn};

use super::{DeliveryError, Notification, NotificationChannel};
use crate::monitoring::alerts::{AlertKind, AlertSeverity};

/// Writes notifications to the process log
#[derive(Debug, Clone)]
pub struct LogChannel {
    min_severity: AlertSeverity,
}

impl LogChannel {
    /// Create log channel
    pub fn new(min_severity: AlertSeverity) -> Self {
        Self { min_severity }
    }
}

impl Default for LogChannel {
    fn default() -> Self {
        Self::new(AlertSeverity::Info)
    }
}

#[async_trait]
impl NotificationChannel for LogChannel {
    fn name(&self) -> &str {
        "log"
    }

    fn min_severity(&self) -> AlertSeverity {
        self.min_severity
    }

    async fn deliver(&self, notification: &Notification) -> Result<(), DeliveryError> {
        let event = &notification.event;
        match event.kind {
            AlertKind::Recovery => info!(
                service = %event.service,
                severity = %event.severity,
                suppressed = notification.suppressed_count,
                "ALERT {}",
                notification.subject()
            ),
            _ => warn!(
                service = %event.service,
                severity = %event.severity,
                suppressed = notification.suppressed_count,
                detail = event.detail.as_deref().unwrap_or(""),
                "ALERT {}",
                notification.subject()
            ),
        }
        Ok(())
    }
}
