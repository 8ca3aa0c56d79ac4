//! Monitor Metrics.
//!
//! Process-wide counters for the monitor itself: how many probes ran, how
//! many alerts were emitted, delivered or suppressed. Values are plain
//! atomics so probe tasks and delivery workers can bump them without locks.

use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;

// ═══════════════════════════════════════════════════════════════════════════════
// COUNTER METRIC
// ═══════════════════════════════════════════════════════════════════════════════

/// Simple atomic counter for high-frequency metrics
#[derive(Debug)]
pub struct Counter {
    value: AtomicU64,
    name: &'static str,
}

impl Counter {
    /// Create new counter
    pub const fn new(name: &'static str) -> Self {
        Self {
            value: AtomicU64::new(0),
            name,
        }
    }

    /// Increment counter
    pub fn increment(&self) {
        self.value.fetch_add(1, Ordering::Relaxed);
    }

    /// Add to counter
    pub fn add(&self, n: u64) {
        self.value.fetch_add(n, Ordering::Relaxed);
    }

    /// Get current value
    pub fn value(&self) -> u64 {
        self.value.load(Ordering::Relaxed)
    }

    /// Get name
    pub fn name(&self) -> &'static str {
        self.name
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// GAUGE METRIC
// ═══════════════════════════════════════════════════════════════════════════════

/// Gauge for values that can go up or down
#[derive(Debug)]
pub struct Gauge {
    value: AtomicU64,
    name: &'static str,
}

impl Gauge {
    /// Create new gauge
    pub const fn new(name: &'static str) -> Self {
        Self {
            value: AtomicU64::new(0),
            name,
        }
    }

    /// Get current value
    pub fn value(&self) -> u64 {
        self.value.load(Ordering::Relaxed)
    }

    /// Increment gauge
    pub fn increment(&self) {
        self.value.fetch_add(1, Ordering::Relaxed);
    }

    /// Decrement gauge, saturating at zero
    pub fn decrement(&self) {
        let _ = self
            .value
            .fetch_update(Ordering::Relaxed, Ordering::Relaxed, |v| Some(v.saturating_sub(1)));
    }

    /// Increment now, decrement when the returned guard drops
    pub fn track(&self) -> GaugeGuard<'_> {
        self.increment();
        GaugeGuard { gauge: self }
    }

    /// Get name
    pub fn name(&self) -> &'static str {
        self.name
    }
}

/// Keeps a gauge incremented while alive
#[derive(Debug)]
pub struct GaugeGuard<'a> {
    gauge: &'a Gauge,
}

impl Drop for GaugeGuard<'_> {
    fn drop(&mut self) {
        self.gauge.decrement();
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// MONITOR METRICS
// ═══════════════════════════════════════════════════════════════════════════════

/// All counters kept by one monitor instance
#[derive(Debug)]
pub struct MonitorMetrics {
    /// Probes executed, including in-cycle retries
    pub probes_total: Counter,
    /// Probes that failed
    pub probe_failures: Counter,
    /// Probes currently running
    pub probes_in_flight: Gauge,
    /// Alert events produced by trackers
    pub alerts_emitted: Counter,
    /// Notifications accepted by a channel
    pub alerts_delivered: Counter,
    /// Alert events swallowed by the debounce window
    pub alerts_suppressed: Counter,
    /// Channel deliveries that exhausted their retries or were rejected
    pub delivery_failures: Counter,
    started: Instant,
}

impl MonitorMetrics {
    /// Create zeroed metrics
    pub fn new() -> Self {
        Self {
            probes_total: Counter::new("probes_total"),
            probe_failures: Counter::new("probe_failures_total"),
            probes_in_flight: Gauge::new("probes_in_flight"),
            alerts_emitted: Counter::new("alerts_emitted_total"),
            alerts_delivered: Counter::new("alerts_delivered_total"),
            alerts_suppressed: Counter::new("alerts_suppressed_total"),
            delivery_failures: Counter::new("delivery_failures_total"),
            started: Instant::now(),
        }
    }

    /// Read all values at once
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            probes_total: self.probes_total.value(),
            probe_failures: self.probe_failures.value(),
            probes_in_flight: self.probes_in_flight.value(),
            alerts_emitted: self.alerts_emitted.value(),
            alerts_delivered: self.alerts_delivered.value(),
            alerts_suppressed: self.alerts_suppressed.value(),
            delivery_failures: self.delivery_failures.value(),
            uptime_seconds: self.started.elapsed().as_secs(),
        }
    }
}

impl Default for MonitorMetrics {
    fn default() -> Self {
        Self::new()
    }
}

/// Point-in-time copy of [`MonitorMetrics`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct MetricsSnapshot {
    /// Probes executed
    pub probes_total: u64,
    /// Probes that failed
    pub probe_failures: u64,
    /// Probes currently running
    pub probes_in_flight: u64,
    /// Alert events produced
    pub alerts_emitted: u64,
    /// Notifications delivered
    pub alerts_delivered: u64,
    /// Alert events suppressed by debounce
    pub alerts_suppressed: u64,
    /// Failed channel deliveries
    pub delivery_failures: u64,
    /// Seconds since the monitor started
    pub uptime_seconds: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_counter() {
        let counter = Counter::new("test_counter");

        counter.increment();
        counter.increment();
        counter.add(5);

        assert_eq!(counter.value(), 7);
        assert_eq!(counter.name(), "test_counter");
    }

    #[test]
    fn test_gauge_guard() {
        let gauge = Gauge::new("in_flight");

        {
            let _a = gauge.track();
            let _b = gauge.track();
            assert_eq!(gauge.value(), 2);
        }
        assert_eq!(gauge.value(), 0);

        gauge.decrement();
        assert_eq!(gauge.value(), 0);
    }

    #[test]
    fn test_monitor_metrics_snapshot() {
        let metrics = MonitorMetrics::new();
        metrics.probes_total.add(3);
        metrics.probe_failures.increment();
        metrics.alerts_suppressed.add(2);

        let snapshot = metrics.snapshot();
        assert_eq!(snapshot.probes_total, 3);
        assert_eq!(snapshot.probe_failures, 1);
        assert_eq!(snapshot.alerts_suppressed, 2);
        assert_eq!(snapshot.delivery_failures, 0);
    }
}
