//! System-wide aggregation.
//!
//! [`aggregate`] turns a set of service snapshots into one [`Verdict`]. The
//! [`Aggregator`] reruns it after each tracker update and publishes an
//! immutable [`SystemSnapshot`] that readers can pull at any time.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use tokio::sync::watch;
use tracing::info;

use super::dispatcher::{DeliveryFailure, DeliveryLedger};
use super::health::{HealthSnapshot, HealthState};
use super::registry::TrackerRegistry;

// ═══════════════════════════════════════════════════════════════════════════════
// VERDICT
// ═══════════════════════════════════════════════════════════════════════════════

/// Overall system verdict
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Verdict {
    /// Nothing failing (cold-start `Unknown` included)
    Healthy,
    /// Some service failing, no critical service unhealthy
    Degraded,
    /// A critical service is unhealthy
    Critical,
}

impl Verdict {
    /// Get display string
    pub fn as_str(&self) -> &'static str {
        match self {
            Verdict::Healthy => "HEALTHY",
            Verdict::Degraded => "DEGRADED",
            Verdict::Critical => "CRITICAL",
        }
    }
}

impl fmt::Display for Verdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Compute the verdict for a set of service snapshots
pub fn aggregate<'a, I>(services: I) -> Verdict
where
    I: IntoIterator<Item = &'a HealthSnapshot>,
{
    let mut verdict = Verdict::Healthy;

    for service in services {
        match service.state {
            HealthState::Unhealthy if service.criticality.is_critical() => return Verdict::Critical,
            HealthState::Unhealthy | HealthState::Degraded => verdict = Verdict::Degraded,
            HealthState::Healthy | HealthState::Unknown => {}
        }
    }

    verdict
}

// ═══════════════════════════════════════════════════════════════════════════════
// SYSTEM SNAPSHOT
// ═══════════════════════════════════════════════════════════════════════════════

/// Immutable, point-in-time view of the whole system
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SystemSnapshot {
    /// Overall verdict
    pub verdict: Verdict,
    /// Per-service snapshots keyed by name
    pub services: BTreeMap<String, HealthSnapshot>,
    /// When this snapshot was computed
    pub generated_at: DateTime<Utc>,
    /// Monotonic publication counter
    pub generation: u64,
    /// Last permanent delivery failure per channel
    pub delivery_failures: Vec<DeliveryFailure>,
}

impl SystemSnapshot {
    /// Build from service snapshots
    pub fn from_services(
        services: Vec<HealthSnapshot>,
        delivery_failures: Vec<DeliveryFailure>,
        generation: u64,
    ) -> Self {
        let verdict = aggregate(&services);
        Self {
            verdict,
            services: services.into_iter().map(|s| (s.name.clone(), s)).collect(),
            generated_at: Utc::now(),
            generation,
            delivery_failures,
        }
    }

    /// Services currently `Healthy`
    pub fn healthy_count(&self) -> usize {
        self.services
            .values()
            .filter(|s| s.state == HealthState::Healthy)
            .count()
    }

    /// Look up one service
    pub fn service(&self, name: &str) -> Option<&HealthSnapshot> {
        self.services.get(name)
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// AGGREGATOR
// ═══════════════════════════════════════════════════════════════════════════════

/// Recomputes and publishes [`SystemSnapshot`]s
#[derive(Debug)]
pub struct Aggregator {
    registry: Arc<TrackerRegistry>,
    ledger: DeliveryLedger,
    published: watch::Sender<Arc<SystemSnapshot>>,
}

impl Aggregator {
    /// Create aggregator and publish the initial snapshot
    pub fn new(registry: Arc<TrackerRegistry>, ledger: DeliveryLedger) -> Self {
        let initial = SystemSnapshot::from_services(registry.snapshots(), ledger.failures(), 0);
        let (published, _) = watch::channel(Arc::new(initial));

        Self {
            registry,
            ledger,
            published,
        }
    }

    /// Registry this aggregator reads
    pub fn registry(&self) -> &Arc<TrackerRegistry> {
        &self.registry
    }

    /// Latest published snapshot
    pub fn snapshot(&self) -> Arc<SystemSnapshot> {
        self.published.borrow().clone()
    }

    /// Watch published snapshots
    pub fn subscribe(&self) -> watch::Receiver<Arc<SystemSnapshot>> {
        self.published.subscribe()
    }

    /// Recompute from the trackers' published snapshots and publish
    pub fn recompute(&self) -> Arc<SystemSnapshot> {
        let mut previous = None;

        // reading inside send_modify keeps publications in read order
        self.published.send_modify(|current| {
            let next = SystemSnapshot::from_services(
                self.registry.snapshots(),
                self.ledger.failures(),
                current.generation + 1,
            );
            previous = Some((current.verdict, current.healthy_count()));
            *current = Arc::new(next);
        });

        let latest = self.snapshot();
        let changed = previous.map_or(true, |(verdict, healthy)| {
            verdict != latest.verdict || healthy != latest.healthy_count()
        });
        if changed {
            info!(
                verdict = %latest.verdict,
                "{}/{} services healthy",
                latest.healthy_count(),
                latest.services.len()
            );
        }

        latest
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::config::MonitorConfig;
    use crate::core::descriptor::{Criticality, ServiceDescriptor};
    use crate::monitoring::alerts::AlertSender;
    use crate::monitoring::health::LatencyStats;
    use crate::probe::{ProbeErrorKind, ProbeResult};

    fn snapshot(name: &str, criticality: Criticality, state: HealthState) -> HealthSnapshot {
        HealthSnapshot {
            name: name.into(),
            criticality,
            state,
            consecutive_failures: 0,
            consecutive_successes: 0,
            last_transition: None,
            last_probe: None,
            latency: LatencyStats::default(),
            total_probes: 0,
            total_failures: 0,
        }
    }

    #[test]
    fn test_verdict_rules() {
        use Criticality::*;
        use HealthState::*;

        assert_eq!(aggregate(&Vec::<HealthSnapshot>::new()), Verdict::Healthy);
        assert_eq!(
            aggregate(&[snapshot("a", Critical, Unknown), snapshot("b", DegradedTolerant, Unknown)]),
            Verdict::Healthy
        );
        assert_eq!(
            aggregate(&[snapshot("a", Critical, Healthy), snapshot("b", DegradedTolerant, Unhealthy)]),
            Verdict::Degraded
        );
        assert_eq!(
            aggregate(&[snapshot("a", Critical, Degraded), snapshot("b", DegradedTolerant, Healthy)]),
            Verdict::Degraded
        );
        assert_eq!(
            aggregate(&[snapshot("a", Critical, Unhealthy), snapshot("b", DegradedTolerant, Healthy)]),
            Verdict::Critical
        );
    }

    #[tokio::test]
    async fn test_recompute_follows_trackers() {
        let config = MonitorConfig::new(vec![
            ServiceDescriptor::builder("api", "http://api/health")
                .with_thresholds(1, 1)
                .build()
                .unwrap(),
            ServiceDescriptor::builder("docs", "http://docs/health")
                .with_criticality(Criticality::DegradedTolerant)
                .build()
                .unwrap(),
        ])
        .unwrap();
        let registry = Arc::new(TrackerRegistry::from_config(&config, AlertSender::disabled()));
        let aggregator = Aggregator::new(registry.clone(), DeliveryLedger::new());

        assert_eq!(aggregator.snapshot().verdict, Verdict::Healthy);
        assert_eq!(aggregator.snapshot().generation, 0);

        registry
            .get("api")
            .unwrap()
            .observe(ProbeResult::failure("api", ProbeErrorKind::Timeout, "timed out"))
            .await;
        let snapshot = aggregator.recompute();

        assert_eq!(snapshot.verdict, Verdict::Critical);
        assert_eq!(snapshot.generation, 1);
        assert_eq!(snapshot.service("api").unwrap().state, HealthState::Unhealthy);
        assert_eq!(snapshot.service("docs").unwrap().state, HealthState::Unknown);
    }

    #[tokio::test]
    async fn test_snapshot_reads_are_idempotent() {
        let config = MonitorConfig::new(vec![ServiceDescriptor::builder("api", "http://api/health")
            .build()
            .unwrap()])
        .unwrap();
        let registry = Arc::new(TrackerRegistry::from_config(&config, AlertSender::disabled()));
        let aggregator = Aggregator::new(registry, DeliveryLedger::new());
        aggregator.recompute();

        let first = aggregator.snapshot();
        let second = aggregator.snapshot();
        assert_eq!(first, second);
        assert!(Arc::ptr_eq(&first, &second));
    }
}
