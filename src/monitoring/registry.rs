//! Tracker registry.
//!
//! Holds exactly one [`ServiceHealthTracker`] per configured service. Built
//! once at startup from a validated [`MonitorConfig`] and shared by `Arc`;
//! trackers are never added or removed while the monitor runs.

use std::sync::Arc;

use super::alerts::AlertSender;
use super::health::{HealthSnapshot, ServiceHealthTracker};
use crate::core::config::MonitorConfig;
use crate::error::{Error, Result};

/// All trackers of one monitor, in configuration order
#[derive(Debug)]
pub struct TrackerRegistry {
    trackers: Vec<Arc<ServiceHealthTracker>>,
}

impl TrackerRegistry {
    /// Create one tracker per configured service
    pub fn from_config(config: &MonitorConfig, alerts: AlertSender) -> Self {
        let trackers = config
            .services
            .iter()
            .map(|descriptor| {
                Arc::new(
                    ServiceHealthTracker::new(descriptor.clone(), config.history_size, alerts.clone())
                        .with_alert_on_degraded(config.alerts.alert_on_degraded)
                        .with_alert_on_slow(config.alerts.alert_on_slow),
                )
            })
            .collect();

        Self { trackers }
    }

    /// Iterate over trackers
    pub fn iter(&self) -> impl Iterator<Item = &Arc<ServiceHealthTracker>> {
        self.trackers.iter()
    }

    /// Number of trackers
    pub fn len(&self) -> usize {
        self.trackers.len()
    }

    /// Check if empty
    pub fn is_empty(&self) -> bool {
        self.trackers.is_empty()
    }

    /// Look up a tracker by service name
    pub fn get(&self, name: &str) -> Result<&Arc<ServiceHealthTracker>> {
        self.trackers
            .iter()
            .find(|t| t.name() == name)
            .ok_or_else(|| Error::ServiceNotFound(name.to_string()))
    }

    /// Published snapshots of every tracker
    pub fn snapshots(&self) -> Vec<HealthSnapshot> {
        self.trackers.iter().map(|t| t.snapshot()).collect()
    }
}
