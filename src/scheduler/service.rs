//! Monitor service lifecycle.
//!
//! Wires the pieces together in dependency order: dispatcher first (trackers
//! need its sender), then the tracker registry, the aggregator and finally
//! the scheduler. Shutdown runs in reverse: stop timers and let in-flight
//! probes finish, then drain and close the dispatcher.
//!
//! ```rust,ignore
//! use gurukul_monitor::prelude::*;
//!
//! let config = MonitorConfig::load(Path::new("monitor.json"))?;
//! let mut service = MonitorService::new(config)?;
//! service.start();
//!
//! let snapshot = service.snapshot();
//! println!("{}", snapshot.verdict);
//!
//! service.shutdown().await;
//! ```

use std::sync::Arc;

use tokio::sync::watch;
use tracing::info;

use super::{Scheduler, SchedulerHandle};
use crate::core::config::MonitorConfig;
use crate::error::Result;
use crate::monitoring::aggregator::{Aggregator, SystemSnapshot};
use crate::monitoring::dispatcher::{channels_from_settings, AlertDispatcher, DeliveryLedger, DispatcherHandle};
use crate::monitoring::metrics::MonitorMetrics;
use crate::monitoring::registry::TrackerRegistry;
use crate::notify::NotificationChannel;
use crate::probe::{HttpProbe, Probe};

/// A running monitor: trackers, aggregator, dispatcher and scheduler
#[derive(Debug)]
pub struct MonitorService {
    config: MonitorConfig,
    metrics: Arc<MonitorMetrics>,
    aggregator: Arc<Aggregator>,
    scheduler: Scheduler,
    dispatcher: Option<DispatcherHandle>,
    timers: Option<SchedulerHandle>,
}

impl MonitorService {
    /// Create with the HTTP probe and the channels enabled in `config`
    ///
    /// Must be called inside a tokio runtime; the dispatcher starts immediately.
    pub fn new(config: MonitorConfig) -> Result<Self> {
        let probe = Arc::new(HttpProbe::new()?);
        let channels = channels_from_settings(&config.alerts)?;
        Ok(Self::with_parts(config, probe, channels))
    }

    /// Create with an explicit probe and channel set
    pub fn with_parts(
        config: MonitorConfig,
        probe: Arc<dyn Probe>,
        channels: Vec<Arc<dyn NotificationChannel>>,
    ) -> Self {
        let metrics = Arc::new(MonitorMetrics::new());
        let ledger = DeliveryLedger::new();

        let dispatcher = channels.into_iter().fold(
            AlertDispatcher::new(&config.alerts, metrics.clone(), ledger.clone()),
            |dispatcher, channel| dispatcher.with_channel(channel),
        );
        info!(channels = ?dispatcher.channel_names(), "configured alert channels");
        let (alerts, dispatcher) = dispatcher.spawn();

        let registry = Arc::new(TrackerRegistry::from_config(&config, alerts));
        let aggregator = Arc::new(Aggregator::new(registry, ledger));
        let scheduler = Scheduler::new(&config.scheduler, aggregator.clone(), probe, metrics.clone());

        Self {
            config,
            metrics,
            aggregator,
            scheduler,
            dispatcher: Some(dispatcher),
            timers: None,
        }
    }

    /// Start periodic probing; calling twice has no effect
    pub fn start(&mut self) {
        if self.timers.is_none() {
            self.timers = Some(self.scheduler.spawn());
        }
    }

    /// Whether periodic probing is running
    pub fn is_running(&self) -> bool {
        self.timers.is_some()
    }

    /// Probe every service once and return the resulting snapshot
    pub async fn check_once(&self) -> Arc<SystemSnapshot> {
        self.scheduler.check_once().await
    }

    /// Latest published snapshot
    pub fn snapshot(&self) -> Arc<SystemSnapshot> {
        self.aggregator.snapshot()
    }

    /// Watch published snapshots
    pub fn subscribe(&self) -> watch::Receiver<Arc<SystemSnapshot>> {
        self.aggregator.subscribe()
    }

    /// Shared aggregator
    pub fn aggregator(&self) -> &Arc<Aggregator> {
        &self.aggregator
    }

    /// Shared metrics
    pub fn metrics(&self) -> &Arc<MonitorMetrics> {
        &self.metrics
    }

    /// Configuration in use
    pub fn config(&self) -> &MonitorConfig {
        &self.config
    }

    /// Stop timers, let in-flight probes finish, then drain pending alerts
    pub async fn shutdown(mut self) {
        info!("shutting down monitor");
        if let Some(timers) = self.timers.take() {
            timers.shutdown().await;
        }
        if let Some(dispatcher) = self.dispatcher.take() {
            dispatcher.shutdown().await;
        }
        info!("monitor stopped");
    }
}
