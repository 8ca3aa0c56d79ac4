//! Probe scheduling.
//!
//! Every service gets its own timer task firing at the descriptor interval.
//! Timers are independent; the only thing they share is a bounded pool of
//! probe slots. When the pool is saturated a cycle waits for a slot, and
//! ticks that pass while it waits are skipped rather than queued.
//!
//! Critical services draw from the whole pool. Degraded-tolerant services
//! must first take a slot from a smaller gate (`max - reserved_for_critical`),
//! so under saturation the reserved slots stay free for critical probes.

pub mod service;

pub use service::MonitorService;

use std::sync::Arc;

use tokio::sync::{watch, OwnedSemaphorePermit, Semaphore};
use tokio::task::{JoinHandle, JoinSet};
use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, error, info};

use crate::core::config::SchedulerSettings;
use crate::core::descriptor::Criticality;
use crate::monitoring::aggregator::{Aggregator, SystemSnapshot};
use crate::monitoring::health::ServiceHealthTracker;
use crate::monitoring::metrics::MonitorMetrics;
use crate::probe::{Probe, ProbeErrorKind};
use crate::utils::backoff::BackoffPolicy;

// ═══════════════════════════════════════════════════════════════════════════════
// PROBE SLOTS
// ═══════════════════════════════════════════════════════════════════════════════

/// Bounded pool of probe slots with a reserve for critical services
#[derive(Debug, Clone)]
pub struct ProbeSlots {
    all: Arc<Semaphore>,
    tolerant: Arc<Semaphore>,
}

/// Held while a probe cycle runs
#[derive(Debug)]
pub struct ProbeSlot {
    _slot: OwnedSemaphorePermit,
    _gate: Option<OwnedSemaphorePermit>,
}

impl ProbeSlots {
    /// Create pool of `max` slots, `reserved` of them only for critical services
    pub fn new(max: usize, reserved: usize) -> Self {
        let max = max.max(1);
        let tolerant = max.saturating_sub(reserved).max(1);
        Self {
            all: Arc::new(Semaphore::new(max)),
            tolerant: Arc::new(Semaphore::new(tolerant)),
        }
    }

    /// Wait for a slot; `None` once the pool is closed
    pub async fn acquire(&self, criticality: Criticality) -> Option<ProbeSlot> {
        let gate = match criticality {
            Criticality::Critical => None,
            Criticality::DegradedTolerant => Some(self.tolerant.clone().acquire_owned().await.ok()?),
        };
        let slot = self.all.clone().acquire_owned().await.ok()?;

        Some(ProbeSlot {
            _slot: slot,
            _gate: gate,
        })
    }

    /// Slots currently free
    pub fn available(&self) -> usize {
        self.all.available_permits()
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// SCHEDULER
// ═══════════════════════════════════════════════════════════════════════════════

/// Drives probe cycles for all trackers
#[derive(Clone)]
pub struct Scheduler {
    aggregator: Arc<Aggregator>,
    probe: Arc<dyn Probe>,
    slots: ProbeSlots,
    retry: BackoffPolicy,
    metrics: Arc<MonitorMetrics>,
}

impl std::fmt::Debug for Scheduler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Scheduler")
            .field("slots", &self.slots)
            .field("retry", &self.retry)
            .finish()
    }
}

impl Scheduler {
    /// Create scheduler over the aggregator's registry
    pub fn new(
        settings: &SchedulerSettings,
        aggregator: Arc<Aggregator>,
        probe: Arc<dyn Probe>,
        metrics: Arc<MonitorMetrics>,
    ) -> Self {
        Self {
            aggregator,
            probe,
            slots: ProbeSlots::new(settings.max_concurrent_probes, settings.reserved_for_critical),
            retry: settings.probe_retry,
            metrics,
        }
    }

    /// Start one timer task per service
    pub fn spawn(&self) -> SchedulerHandle {
        let (shutdown, shutdown_rx) = watch::channel(false);

        let tasks = self
            .aggregator
            .registry()
            .iter()
            .map(|tracker| {
                let scheduler = self.clone();
                let tracker = tracker.clone();
                let shutdown = shutdown_rx.clone();
                tokio::spawn(async move { scheduler.service_loop(tracker, shutdown).await })
            })
            .collect();

        info!(services = self.aggregator.registry().len(), "scheduler started");
        SchedulerHandle { shutdown, tasks }
    }

    /// Probe every service once, concurrently, and return the resulting snapshot
    pub async fn check_once(&self) -> Arc<SystemSnapshot> {
        let mut set = JoinSet::new();

        for tracker in self.aggregator.registry().iter() {
            let scheduler = self.clone();
            let tracker = tracker.clone();
            set.spawn(async move {
                if let Some(_slot) = scheduler.slots.acquire(tracker.descriptor().criticality()).await {
                    scheduler.run_cycle(&tracker).await;
                }
            });
        }

        while let Some(joined) = set.join_next().await {
            if let Err(e) = joined {
                error!("probe task failed: {}", e);
            }
        }

        self.aggregator.snapshot()
    }

    async fn service_loop(&self, tracker: Arc<ServiceHealthTracker>, mut shutdown: watch::Receiver<bool>) {
        let descriptor = tracker.descriptor().clone();
        let mut ticker = interval(descriptor.interval());
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            if *shutdown.borrow() {
                break;
            }

            tokio::select! {
                _ = ticker.tick() => {}
                _ = shutdown.changed() => break,
            }

            let slot = tokio::select! {
                slot = self.slots.acquire(descriptor.criticality()) => slot,
                _ = shutdown.changed() => break,
            };
            let Some(_slot) = slot else { break };

            // an in-flight cycle always completes
            self.run_cycle(&tracker).await;
        }

        debug!(service = %descriptor.name(), "probe timer stopped");
    }

    /// One probe cycle: probe, record, retry per policy
    pub async fn run_cycle(&self, tracker: &ServiceHealthTracker) {
        let label = format!("probe {}", tracker.name());

        let _ = self
            .retry
            .retry(&label, |_| self.attempt(tracker), |_| true)
            .await;
    }

    async fn attempt(&self, tracker: &ServiceHealthTracker) -> std::result::Result<(), ProbeErrorKind> {
        let outcome = {
            let _in_flight = self.metrics.probes_in_flight.track();
            self.metrics.probes_total.increment();
            self.probe.probe(tracker.descriptor()).await
        };

        let failure = outcome.error_kind();
        if failure.is_some() {
            self.metrics.probe_failures.increment();
        }

        tracker.observe(outcome).await;
        self.aggregator.recompute();

        match failure {
            Some(kind) => Err(kind),
            None => Ok(()),
        }
    }
}

/// Handle to running timer tasks
#[derive(Debug)]
pub struct SchedulerHandle {
    shutdown: watch::Sender<bool>,
    tasks: Vec<JoinHandle<()>>,
}

impl SchedulerHandle {
    /// Stop timers and wait for in-flight probes to finish
    pub async fn shutdown(self) {
        let _ = self.shutdown.send(true);
        for task in self.tasks {
            if let Err(e) = task.await {
                error!("probe timer task failed: {}", e);
            }
        }
        info!("scheduler stopped");
    }
}
