//! Service Health Tracking.
//!
//! Each monitored service owns one [`ServiceHealthTracker`]. The tracker feeds
//! probe results through a per-service state machine held in a
//! [`HealthRecord`], publishes a fresh [`HealthSnapshot`] after every update
//! and emits an [`AlertEvent`] when a transition is worth notifying about.
//!
//! ```text
//!            failure                 failures >= threshold
//!  Unknown ----------> Degraded ---------------------------> Unhealthy
//!     |                   ^  |                                   |
//!     | success           |  | successes >= recovery             | successes >= recovery
//!     v        failure    |  v                                   v
//!  Healthy ---------------+  Healthy <--------------------------+
//! ```

use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::sync::{watch, Mutex};
use tracing::{info, warn};

use super::alerts::{AlertEvent, AlertKind, AlertSender, AlertSeverity};
use crate::core::descriptor::{Criticality, ServiceDescriptor};
use crate::probe::{ProbeErrorKind, ProbeOutcome, ProbeResult};

// ═══════════════════════════════════════════════════════════════════════════════
// HEALTH STATE
// ═══════════════════════════════════════════════════════════════════════════════

/// Health state of one service
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HealthState {
    /// Never probed successfully nor failed yet
    Unknown,
    /// Answering normally
    Healthy,
    /// Failing, below the unhealthy threshold
    Degraded,
    /// Failing at or above the unhealthy threshold
    Unhealthy,
}

impl HealthState {
    /// Get display string
    pub fn as_str(&self) -> &'static str {
        match self {
            HealthState::Unknown => "UNKNOWN",
            HealthState::Healthy => "HEALTHY",
            HealthState::Degraded => "DEGRADED",
            HealthState::Unhealthy => "UNHEALTHY",
        }
    }

    /// Degraded or Unhealthy
    pub fn is_failing(&self) -> bool {
        matches!(self, HealthState::Degraded | HealthState::Unhealthy)
    }
}

impl fmt::Display for HealthState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// HEALTH RECORD
// ═══════════════════════════════════════════════════════════════════════════════

/// A state change produced by [`HealthRecord::observe`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Transition {
    /// State before
    pub from: HealthState,
    /// State after
    pub to: HealthState,
    /// Time of the probe that caused it
    pub at: DateTime<Utc>,
}

/// Counters, state and recent history for one service
#[derive(Debug, Clone)]
pub struct HealthRecord {
    state: HealthState,
    consecutive_failures: u32,
    consecutive_successes: u32,
    last_transition: Option<DateTime<Utc>>,
    history: VecDeque<ProbeResult>,
    capacity: usize,
    total_probes: u64,
    total_failures: u64,
}

impl HealthRecord {
    /// Create an `Unknown` record keeping `capacity` results
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            state: HealthState::Unknown,
            consecutive_failures: 0,
            consecutive_successes: 0,
            last_transition: None,
            history: VecDeque::with_capacity(capacity),
            capacity,
            total_probes: 0,
            total_failures: 0,
        }
    }

    /// Current state
    pub fn state(&self) -> HealthState {
        self.state
    }

    /// Consecutive failures
    pub fn consecutive_failures(&self) -> u32 {
        self.consecutive_failures
    }

    /// Consecutive successes
    pub fn consecutive_successes(&self) -> u32 {
        self.consecutive_successes
    }

    /// Time of the last state change
    pub fn last_transition(&self) -> Option<DateTime<Utc>> {
        self.last_transition
    }

    /// Retained results, oldest first
    pub fn history(&self) -> impl Iterator<Item = &ProbeResult> {
        self.history.iter()
    }

    /// Most recent result
    pub fn last_result(&self) -> Option<&ProbeResult> {
        self.history.back()
    }

    /// Apply one probe result; returns the transition if the state changed
    pub fn observe(
        &mut self,
        result: ProbeResult,
        unhealthy_threshold: u32,
        recovery_threshold: u32,
    ) -> Option<Transition> {
        let at = result.timestamp;
        let from = self.state;
        self.total_probes += 1;

        let to = if result.is_success() {
            self.consecutive_successes = self.consecutive_successes.saturating_add(1);
            self.consecutive_failures = 0;

            match self.state {
                HealthState::Unknown => HealthState::Healthy,
                HealthState::Degraded | HealthState::Unhealthy
                    if self.consecutive_successes >= recovery_threshold =>
                {
                    HealthState::Healthy
                }
                other => other,
            }
        } else {
            self.total_failures += 1;
            self.consecutive_failures = self.consecutive_failures.saturating_add(1);
            self.consecutive_successes = 0;

            if self.consecutive_failures >= unhealthy_threshold {
                HealthState::Unhealthy
            } else {
                match self.state {
                    HealthState::Healthy | HealthState::Unknown => HealthState::Degraded,
                    other => other,
                }
            }
        };

        if self.history.len() >= self.capacity {
            self.history.pop_front();
        }
        self.history.push_back(result);

        if to == from {
            return None;
        }

        self.state = to;
        self.last_transition = Some(at);
        Some(Transition { from, to, at })
    }

    /// Latency percentiles over successful results in the ring
    pub fn latency_stats(&self) -> LatencyStats {
        let mut samples: Vec<Duration> = self.history.iter().filter_map(ProbeResult::latency).collect();
        LatencyStats::from_samples(&mut samples)
    }

    /// Read-only copy for publication
    pub fn snapshot(&self, descriptor: &ServiceDescriptor) -> HealthSnapshot {
        HealthSnapshot {
            name: descriptor.name().to_string(),
            criticality: descriptor.criticality(),
            state: self.state,
            consecutive_failures: self.consecutive_failures,
            consecutive_successes: self.consecutive_successes,
            last_transition: self.last_transition,
            last_probe: self.last_result().map(ProbeSummary::from),
            latency: self.latency_stats(),
            total_probes: self.total_probes,
            total_failures: self.total_failures,
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// SNAPSHOTS
// ═══════════════════════════════════════════════════════════════════════════════

/// Latency percentiles in milliseconds (nearest-rank)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct LatencyStats {
    /// Successful samples considered
    pub samples: usize,
    /// Median
    pub p50_ms: Option<u64>,
    /// 95th percentile
    pub p95_ms: Option<u64>,
    /// 99th percentile
    pub p99_ms: Option<u64>,
    /// Slowest sample
    pub max_ms: Option<u64>,
}

impl LatencyStats {
    /// Compute from unsorted samples
    pub fn from_samples(samples: &mut [Duration]) -> Self {
        if samples.is_empty() {
            return Self::default();
        }
        samples.sort_unstable();

        let rank = |p: f64| -> Option<u64> {
            let n = samples.len();
            let idx = ((p / 100.0) * n as f64).ceil() as usize;
            samples.get(idx.clamp(1, n) - 1).map(|d| d.as_millis() as u64)
        };

        Self {
            samples: samples.len(),
            p50_ms: rank(50.0),
            p95_ms: rank(95.0),
            p99_ms: rank(99.0),
            max_ms: samples.last().map(|d| d.as_millis() as u64),
        }
    }
}

/// Serializable view of one probe result
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProbeSummary {
    /// When the probe started
    pub timestamp: DateTime<Utc>,
    /// Whether it succeeded
    pub success: bool,
    /// Latency of a success
    pub latency_ms: Option<u64>,
    /// Success slower than the latency budget
    pub slow: bool,
    /// Failure kind
    pub error: Option<ProbeErrorKind>,
    /// Failure detail
    pub detail: Option<String>,
    /// HTTP status
    pub status: Option<u16>,
    /// Truncated response body
    pub payload: Option<String>,
}

impl From<&ProbeResult> for ProbeSummary {
    fn from(result: &ProbeResult) -> Self {
        let (latency_ms, slow, error, detail) = match &result.outcome {
            ProbeOutcome::Success { latency, slow } => (Some(latency.as_millis() as u64), *slow, None, None),
            ProbeOutcome::Failure { kind, detail } => (None, false, Some(*kind), Some(detail.clone())),
        };

        Self {
            timestamp: result.timestamp,
            success: result.is_success(),
            latency_ms,
            slow,
            error,
            detail,
            status: result.status,
            payload: result.payload.clone(),
        }
    }
}

/// Published, immutable view of one service's health
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HealthSnapshot {
    /// Service name
    pub name: String,
    /// Criticality tier
    pub criticality: Criticality,
    /// Current state
    pub state: HealthState,
    /// Consecutive failures
    pub consecutive_failures: u32,
    /// Consecutive successes
    pub consecutive_successes: u32,
    /// Time of the last state change
    pub last_transition: Option<DateTime<Utc>>,
    /// Most recent probe
    pub last_probe: Option<ProbeSummary>,
    /// Latency over the retained window
    pub latency: LatencyStats,
    /// Probes observed since startup
    pub total_probes: u64,
    /// Failed probes since startup
    pub total_failures: u64,
}

// ═══════════════════════════════════════════════════════════════════════════════
// SERVICE HEALTH TRACKER
// ═══════════════════════════════════════════════════════════════════════════════

/// Owner of one service's [`HealthRecord`]
///
/// Updates are serialized by a per-service lock; readers use the published
/// snapshot and never touch the lock.
#[derive(Debug)]
pub struct ServiceHealthTracker {
    descriptor: Arc<ServiceDescriptor>,
    record: Mutex<HealthRecord>,
    published: watch::Sender<HealthSnapshot>,
    alerts: AlertSender,
    alert_on_degraded: bool,
    alert_on_slow: bool,
}

impl ServiceHealthTracker {
    /// Create tracker in `Unknown` state
    pub fn new(descriptor: Arc<ServiceDescriptor>, history_size: usize, alerts: AlertSender) -> Self {
        let record = HealthRecord::new(history_size);
        let (published, _) = watch::channel(record.snapshot(&descriptor));

        Self {
            descriptor,
            record: Mutex::new(record),
            published,
            alerts,
            alert_on_degraded: false,
            alert_on_slow: false,
        }
    }

    /// Also alert on the early Degraded step
    pub fn with_alert_on_degraded(mut self, enabled: bool) -> Self {
        self.alert_on_degraded = enabled;
        self
    }

    /// Alert on successes slower than the latency budget
    pub fn with_alert_on_slow(mut self, enabled: bool) -> Self {
        self.alert_on_slow = enabled;
        self
    }

    /// Descriptor of the tracked service
    pub fn descriptor(&self) -> &Arc<ServiceDescriptor> {
        &self.descriptor
    }

    /// Service name
    pub fn name(&self) -> &str {
        self.descriptor.name()
    }

    /// Latest published snapshot
    pub fn snapshot(&self) -> HealthSnapshot {
        self.published.borrow().clone()
    }

    /// Watch published snapshots
    pub fn subscribe(&self) -> watch::Receiver<HealthSnapshot> {
        self.published.subscribe()
    }

    /// Feed one probe result; returns the alert emitted, if any
    pub async fn observe(&self, result: ProbeResult) -> Option<AlertEvent> {
        let detail = match &result.outcome {
            ProbeOutcome::Failure { kind, detail } => Some(format!("{}: {}", kind, detail)),
            ProbeOutcome::Success { .. } => None,
        };
        let slow_latency = result.latency().filter(|_| result.is_slow());

        let mut record = self.record.lock().await;
        let transition = record.observe(
            result,
            self.descriptor.unhealthy_threshold(),
            self.descriptor.recovery_threshold(),
        );
        self.published.send_replace(record.snapshot(&self.descriptor));

        let event = match transition {
            Some(transition) => {
                self.log_transition(&transition, &record, detail.as_deref());
                self.alert_for(&transition, &record, detail)
            }
            None => None,
        };
        let event = event.or_else(|| self.slow_alert(slow_latency?, &record))?;

        // still under the lock so events for this service queue in order
        self.alerts.emit(event.clone());
        Some(event)
    }

    /// Slow-response warning; a transition alert for the same probe wins
    fn slow_alert(&self, latency: Duration, record: &HealthRecord) -> Option<AlertEvent> {
        if !self.alert_on_slow {
            return None;
        }
        let budget = self.descriptor.latency_budget()?;
        let state = record.state();

        Some(AlertEvent {
            service: self.descriptor.name().to_string(),
            previous: state,
            current: state,
            timestamp: record.last_result().map_or_else(Utc::now, |r| r.timestamp),
            severity: AlertSeverity::Warning,
            criticality: self.descriptor.criticality(),
            kind: AlertKind::SlowResponse,
            consecutive_failures: record.consecutive_failures(),
            detail: Some(format!(
                "{}ms over a {}ms budget",
                latency.as_millis(),
                budget.as_millis()
            )),
        })
    }

    fn alert_for(
        &self,
        transition: &Transition,
        record: &HealthRecord,
        detail: Option<String>,
    ) -> Option<AlertEvent> {
        let kind = match (transition.from, transition.to) {
            (HealthState::Unknown, HealthState::Healthy) => return None,
            (_, HealthState::Healthy) => AlertKind::Recovery,
            (_, HealthState::Unhealthy) => AlertKind::Incident,
            (_, HealthState::Degraded) if self.alert_on_degraded => AlertKind::EarlyWarning,
            _ => return None,
        };
        let criticality = self.descriptor.criticality();
        let severity = AlertSeverity::for_transition(transition.to, criticality)?;

        Some(AlertEvent {
            service: self.descriptor.name().to_string(),
            previous: transition.from,
            current: transition.to,
            timestamp: transition.at,
            severity,
            criticality,
            kind,
            consecutive_failures: record.consecutive_failures(),
            detail,
        })
    }

    fn log_transition(&self, transition: &Transition, record: &HealthRecord, detail: Option<&str>) {
        let name = self.descriptor.name();
        match transition.to {
            HealthState::Unhealthy | HealthState::Degraded => warn!(
                service = %name,
                from = %transition.from,
                to = %transition.to,
                consecutive_failures = record.consecutive_failures(),
                error = detail.unwrap_or(""),
                "service health changed"
            ),
            _ => info!(
                service = %name,
                from = %transition.from,
                to = %transition.to,
                consecutive_successes = record.consecutive_successes(),
                "service health changed"
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::sync::mpsc;

    fn ok() -> ProbeResult {
        ProbeResult::success("api", Duration::from_millis(20))
    }

    fn fail() -> ProbeResult {
        ProbeResult::failure("api", ProbeErrorKind::ConnectionRefused, "Connection refused")
    }

    fn descriptor(criticality: Criticality) -> Arc<ServiceDescriptor> {
        Arc::new(
            ServiceDescriptor::builder("api", "http://api:8000/health")
                .with_thresholds(3, 2)
                .with_criticality(criticality)
                .build()
                .unwrap(),
        )
    }

    #[test]
    fn test_first_success_leaves_unknown() {
        let mut record = HealthRecord::new(10);
        assert_eq!(record.state(), HealthState::Unknown);

        let transition = record.observe(ok(), 3, 2).unwrap();
        assert_eq!(transition.from, HealthState::Unknown);
        assert_eq!(record.state(), HealthState::Healthy);
    }

    #[test]
    fn test_failure_sequence() {
        let mut record = HealthRecord::new(10);
        let mut states = Vec::new();
        let mut transitions = 0;

        for result in [fail(), fail(), fail(), fail(), ok(), ok()] {
            if record.observe(result, 3, 2).is_some() {
                transitions += 1;
            }
            states.push(record.state());
        }

        assert_eq!(
            states,
            vec![
                HealthState::Degraded,
                HealthState::Degraded,
                HealthState::Unhealthy,
                HealthState::Unhealthy,
                HealthState::Unhealthy,
                HealthState::Healthy,
            ]
        );
        assert_eq!(transitions, 3);
    }

    #[test]
    fn test_threshold_of_one_skips_degraded() {
        let mut record = HealthRecord::new(10);
        let transition = record.observe(fail(), 1, 1).unwrap();
        assert_eq!(transition.to, HealthState::Unhealthy);
    }

    #[test]
    fn test_flapping_below_threshold_is_quiet() {
        let mut record = HealthRecord::new(10);
        record.observe(ok(), 3, 2);
        record.observe(fail(), 3, 2);

        for _ in 0..5 {
            assert!(record.observe(fail(), 3, 2).is_none());
            assert!(record.observe(ok(), 3, 2).is_none());
        }
        assert_ne!(record.state(), HealthState::Unhealthy);
    }

    #[test]
    fn test_history_ring_evicts_oldest() {
        let mut record = HealthRecord::new(3);
        for ms in [10, 20, 30, 40] {
            record.observe(ProbeResult::success("api", Duration::from_millis(ms)), 3, 2);
        }

        let kept: Vec<_> = record.history().filter_map(ProbeResult::latency).collect();
        assert_eq!(
            kept,
            vec![
                Duration::from_millis(20),
                Duration::from_millis(30),
                Duration::from_millis(40)
            ]
        );
    }

    #[test]
    fn test_latency_percentiles() {
        let mut samples: Vec<Duration> = (1..=100).map(Duration::from_millis).collect();
        let stats = LatencyStats::from_samples(&mut samples);

        assert_eq!(stats.samples, 100);
        assert_eq!(stats.p50_ms, Some(50));
        assert_eq!(stats.p95_ms, Some(95));
        assert_eq!(stats.p99_ms, Some(99));
        assert_eq!(stats.max_ms, Some(100));

        assert_eq!(LatencyStats::from_samples(&mut []), LatencyStats::default());
    }

    #[tokio::test]
    async fn test_tracker_emits_incident_and_recovery() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let tracker = ServiceHealthTracker::new(descriptor(Criticality::Critical), 100, AlertSender::new(tx));

        for _ in 0..4 {
            tracker.observe(fail()).await;
        }
        tracker.observe(ok()).await;
        tracker.observe(ok()).await;

        let incident = rx.recv().await.unwrap();
        assert_eq!(incident.kind, AlertKind::Incident);
        assert_eq!(incident.severity, AlertSeverity::Critical);
        assert_eq!(incident.previous, HealthState::Degraded);
        assert_eq!(incident.consecutive_failures, 3);

        let recovery = rx.recv().await.unwrap();
        assert_eq!(recovery.kind, AlertKind::Recovery);
        assert_eq!(recovery.severity, AlertSeverity::Info);
        assert!(rx.try_recv().is_err());

        let snapshot = tracker.snapshot();
        assert_eq!(snapshot.state, HealthState::Healthy);
        assert_eq!(snapshot.total_probes, 6);
        assert_eq!(snapshot.total_failures, 4);
    }

    #[tokio::test]
    async fn test_degraded_alert_is_opt_in() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let quiet = ServiceHealthTracker::new(descriptor(Criticality::Critical), 10, AlertSender::new(tx.clone()));
        assert!(quiet.observe(fail()).await.is_none());
        assert!(rx.try_recv().is_err());

        let loud = ServiceHealthTracker::new(descriptor(Criticality::DegradedTolerant), 10, AlertSender::new(tx))
            .with_alert_on_degraded(true);
        let event = loud.observe(fail()).await.unwrap();
        assert_eq!(event.kind, AlertKind::EarlyWarning);
        assert_eq!(event.severity, AlertSeverity::Warning);
    }

    #[tokio::test]
    async fn test_slow_response_alert_is_opt_in() {
        let descriptor = Arc::new(
            ServiceDescriptor::builder("api", "http://api:8000/health")
                .with_latency_budget(Some(Duration::from_secs(5)))
                .build()
                .unwrap(),
        );
        let slow = || {
            ProbeResult::success("api", Duration::from_secs(6)).with_latency_budget(Some(Duration::from_secs(5)))
        };

        let quiet = ServiceHealthTracker::new(descriptor.clone(), 10, AlertSender::disabled());
        assert!(quiet.observe(slow()).await.is_none());

        let (tx, mut rx) = mpsc::unbounded_channel();
        let loud = ServiceHealthTracker::new(descriptor, 10, AlertSender::new(tx)).with_alert_on_slow(true);

        let event = loud.observe(slow()).await.unwrap();
        assert_eq!(event.kind, AlertKind::SlowResponse);
        assert_eq!(event.severity, AlertSeverity::Warning);
        assert_eq!(event.current, HealthState::Healthy);
        assert_eq!(event.detail.as_deref(), Some("6000ms over a 5000ms budget"));
        assert_eq!(event.summary(), "api is responding slowly");
        assert_eq!(rx.recv().await.unwrap(), event);

        // fast answers and failures never count as slow
        assert!(loud.observe(ok()).await.is_none());
        assert_eq!(loud.snapshot().state, HealthState::Healthy);
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_snapshot_publication() {
        let tracker = ServiceHealthTracker::new(descriptor(Criticality::Critical), 10, AlertSender::disabled());
        let mut rx = tracker.subscribe();
        assert_eq!(rx.borrow().state, HealthState::Unknown);

        tracker.observe(ok()).await;
        rx.changed().await.unwrap();
        assert_eq!(rx.borrow().state, HealthState::Healthy);
        assert!(rx.borrow().last_probe.as_ref().unwrap().success);
    }
}
