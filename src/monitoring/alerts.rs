//! Alert Events and Debouncing.
//!
//! Trackers produce [`AlertEvent`]s on state transitions and hand them to an
//! [`AlertSender`]; the dispatcher runs them through a [`Debouncer`] before
//! fanning them out to notification channels.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use tokio::sync::mpsc;
use tracing::{debug, warn};

use super::health::HealthState;
use crate::core::descriptor::Criticality;

// ═══════════════════════════════════════════════════════════════════════════════
// ALERT SEVERITY
// ═══════════════════════════════════════════════════════════════════════════════

/// Severity levels for alerts
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AlertSeverity {
    /// Service recovered
    Info,
    /// Early warning, service degraded
    Warning,
    /// Degraded-tolerant service is unhealthy
    Major,
    /// Critical service is unhealthy
    Critical,
}

impl AlertSeverity {
    /// Get display name
    pub fn as_str(&self) -> &'static str {
        match self {
            AlertSeverity::Info => "INFO",
            AlertSeverity::Warning => "WARNING",
            AlertSeverity::Major => "MAJOR",
            AlertSeverity::Critical => "CRITICAL",
        }
    }

    /// Severity of a transition into `state` for a service of `criticality`
    pub fn for_transition(state: HealthState, criticality: Criticality) -> Option<Self> {
        match state {
            HealthState::Healthy => Some(AlertSeverity::Info),
            HealthState::Degraded => Some(AlertSeverity::Warning),
            HealthState::Unhealthy if criticality.is_critical() => Some(AlertSeverity::Critical),
            HealthState::Unhealthy => Some(AlertSeverity::Major),
            HealthState::Unknown => None,
        }
    }
}

impl fmt::Display for AlertSeverity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for AlertSeverity {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "info" => Ok(AlertSeverity::Info),
            "warning" => Ok(AlertSeverity::Warning),
            "major" => Ok(AlertSeverity::Major),
            "critical" => Ok(AlertSeverity::Critical),
            _ => Err(format!("Unknown severity: {}", s)),
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// ALERT EVENT
// ═══════════════════════════════════════════════════════════════════════════════

/// What kind of transition an alert reports
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AlertKind {
    /// Service crossed the unhealthy threshold
    Incident,
    /// Service crossed the recovery threshold
    Recovery,
    /// Service took its first failing step
    EarlyWarning,
    /// Successful probe slower than the service's latency budget
    SlowResponse,
}

/// A state transition worth notifying about
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AlertEvent {
    /// Service name
    pub service: String,
    /// State before the transition
    pub previous: HealthState,
    /// State after the transition
    pub current: HealthState,
    /// When the transition happened
    pub timestamp: DateTime<Utc>,
    /// Derived severity
    pub severity: AlertSeverity,
    /// Criticality tier of the service
    pub criticality: Criticality,
    /// Transition kind
    pub kind: AlertKind,
    /// Consecutive failures at the time of the transition
    pub consecutive_failures: u32,
    /// Last probe error, if any
    pub detail: Option<String>,
}

impl AlertEvent {
    /// One-line description used by every channel
    pub fn summary(&self) -> String {
        match self.kind {
            AlertKind::Incident => format!(
                "{} is {} after {} consecutive failures",
                self.service, self.current, self.consecutive_failures
            ),
            AlertKind::Recovery => format!("{} recovered ({} -> {})", self.service, self.previous, self.current),
            AlertKind::EarlyWarning => format!("{} is {}", self.service, self.current),
            AlertKind::SlowResponse => format!("{} is responding slowly", self.service),
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// ALERT SENDER
// ═══════════════════════════════════════════════════════════════════════════════

/// Non-blocking hand-off from trackers to the dispatcher
#[derive(Debug, Clone)]
pub struct AlertSender {
    tx: Option<mpsc::UnboundedSender<AlertEvent>>,
}

impl AlertSender {
    /// Wrap a dispatcher queue
    pub fn new(tx: mpsc::UnboundedSender<AlertEvent>) -> Self {
        Self { tx: Some(tx) }
    }

    /// Sender that drops every event
    pub fn disabled() -> Self {
        Self { tx: None }
    }

    /// Queue an event; never waits
    pub fn emit(&self, event: AlertEvent) {
        match &self.tx {
            Some(tx) => {
                if let Err(err) = tx.send(event) {
                    warn!(service = %err.0.service, "alert dispatcher is gone, dropping event");
                }
            }
            None => debug!(service = %event.service, severity = %event.severity, "alerting disabled, dropping event"),
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// DEBOUNCER
// ═══════════════════════════════════════════════════════════════════════════════

/// Outcome of a debounce check
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DebounceDecision {
    /// Deliver now; `suppressed` events were swallowed since the last delivery
    Deliver {
        /// Events suppressed since the previous delivery for this key
        suppressed: u64,
    },
    /// Inside the window; do not deliver
    Suppress {
        /// Events suppressed so far in this window, including this one
        suppressed: u64,
    },
}

#[derive(Debug, Clone, Copy)]
struct DebounceEntry {
    last_delivered: Instant,
    suppressed: u64,
}

/// Minimum-interval filter keyed by (service, severity)
#[derive(Debug)]
pub struct Debouncer {
    window: Duration,
    entries: HashMap<(String, AlertSeverity), DebounceEntry>,
}

impl Debouncer {
    /// Create debouncer with the given window
    pub fn new(window: Duration) -> Self {
        Self {
            window,
            entries: HashMap::new(),
        }
    }

    /// Window length
    pub fn window(&self) -> Duration {
        self.window
    }

    /// Decide whether an event for `service` at `severity` observed at `now` is delivered
    pub fn check(&mut self, service: &str, severity: AlertSeverity, now: Instant) -> DebounceDecision {
        let key = (service.to_string(), severity);

        match self.entries.get_mut(&key) {
            Some(entry) if now.saturating_duration_since(entry.last_delivered) < self.window => {
                entry.suppressed += 1;
                DebounceDecision::Suppress {
                    suppressed: entry.suppressed,
                }
            }
            Some(entry) => {
                let suppressed = entry.suppressed;
                *entry = DebounceEntry {
                    last_delivered: now,
                    suppressed: 0,
                };
                DebounceDecision::Deliver { suppressed }
            }
            None => {
                self.entries.insert(
                    key,
                    DebounceEntry {
                        last_delivered: now,
                        suppressed: 0,
                    },
                );
                DebounceDecision::Deliver { suppressed: 0 }
            }
        }
    }

    /// Events currently held back for a key
    pub fn pending_suppressed(&self, service: &str, severity: AlertSeverity) -> u64 {
        self.entries
            .get(&(service.to_string(), severity))
            .map_or(0, |e| e.suppressed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_severity_for_transition() {
        assert_eq!(
            AlertSeverity::for_transition(HealthState::Unhealthy, Criticality::Critical),
            Some(AlertSeverity::Critical)
        );
        assert_eq!(
            AlertSeverity::for_transition(HealthState::Unhealthy, Criticality::DegradedTolerant),
            Some(AlertSeverity::Major)
        );
        assert_eq!(
            AlertSeverity::for_transition(HealthState::Healthy, Criticality::Critical),
            Some(AlertSeverity::Info)
        );
        assert_eq!(
            AlertSeverity::for_transition(HealthState::Unknown, Criticality::Critical),
            None
        );
        assert!(AlertSeverity::Critical > AlertSeverity::Major);
        assert!(AlertSeverity::Warning > AlertSeverity::Info);
    }

    #[test]
    fn test_debounce_within_window() {
        let mut debouncer = Debouncer::new(Duration::from_secs(300));
        let start = Instant::now();

        assert_eq!(
            debouncer.check("api", AlertSeverity::Critical, start),
            DebounceDecision::Deliver { suppressed: 0 }
        );
        assert_eq!(
            debouncer.check("api", AlertSeverity::Critical, start + Duration::from_secs(10)),
            DebounceDecision::Suppress { suppressed: 1 }
        );
        assert_eq!(
            debouncer.check("api", AlertSeverity::Critical, start + Duration::from_secs(20)),
            DebounceDecision::Suppress { suppressed: 2 }
        );
        assert_eq!(debouncer.pending_suppressed("api", AlertSeverity::Critical), 2);

        // next delivery flushes the count
        assert_eq!(
            debouncer.check("api", AlertSeverity::Critical, start + Duration::from_secs(301)),
            DebounceDecision::Deliver { suppressed: 2 }
        );
        assert_eq!(debouncer.pending_suppressed("api", AlertSeverity::Critical), 0);
    }

    #[test]
    fn test_debounce_keys_are_independent() {
        let mut debouncer = Debouncer::new(Duration::from_secs(300));
        let now = Instant::now();

        debouncer.check("api", AlertSeverity::Critical, now);
        assert_eq!(
            debouncer.check("api", AlertSeverity::Info, now),
            DebounceDecision::Deliver { suppressed: 0 }
        );
        assert_eq!(
            debouncer.check("web", AlertSeverity::Critical, now),
            DebounceDecision::Deliver { suppressed: 0 }
        );
    }

    #[test]
    fn test_zero_window_never_suppresses() {
        let mut debouncer = Debouncer::new(Duration::ZERO);
        let now = Instant::now();

        for _ in 0..3 {
            assert_eq!(
                debouncer.check("api", AlertSeverity::Major, now),
                DebounceDecision::Deliver { suppressed: 0 }
            );
        }
    }

    #[test]
    fn test_summary() {
        let event = AlertEvent {
            service: "api".into(),
            previous: HealthState::Degraded,
            current: HealthState::Unhealthy,
            timestamp: Utc::now(),
            severity: AlertSeverity::Critical,
            criticality: Criticality::Critical,
            kind: AlertKind::Incident,
            consecutive_failures: 3,
            detail: Some("timeout".into()),
        };
        assert_eq!(event.summary(), "api is UNHEALTHY after 3 consecutive failures");
    }

    #[tokio::test]
    async fn test_sender_hands_off() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let sender = AlertSender::new(tx);

        sender.emit(AlertEvent {
            service: "api".into(),
            previous: HealthState::Unhealthy,
            current: HealthState::Healthy,
            timestamp: Utc::now(),
            severity: AlertSeverity::Info,
            criticality: Criticality::Critical,
            kind: AlertKind::Recovery,
            consecutive_failures: 0,
            detail: None,
        });

        let received = rx.recv().await.unwrap();
        assert_eq!(received.kind, AlertKind::Recovery);

        AlertSender::disabled().emit(received);
    }
}
