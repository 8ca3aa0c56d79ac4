//! Property tests for the health state machine, aggregation and debouncing.

use std::sync::Arc;
use std::time::{Duration, Instant};

use proptest::prelude::*;
use tokio::sync::mpsc;

use gurukul_monitor::core::descriptor::{Criticality, ServiceDescriptor};
use gurukul_monitor::monitoring::{
    aggregate, AlertEvent, AlertKind, AlertSender, AlertSeverity, DebounceDecision, Debouncer, HealthRecord,
    HealthSnapshot, HealthState, LatencyStats, ServiceHealthTracker, Verdict,
};
use gurukul_monitor::probe::{ProbeErrorKind, ProbeResult};

fn state_strategy() -> impl Strategy<Value = HealthState> {
    prop_oneof![
        Just(HealthState::Unknown),
        Just(HealthState::Healthy),
        Just(HealthState::Degraded),
        Just(HealthState::Unhealthy),
    ]
}

fn criticality_strategy() -> impl Strategy<Value = Criticality> {
    prop_oneof![Just(Criticality::Critical), Just(Criticality::DegradedTolerant)]
}

fn snapshot(index: usize, criticality: Criticality, state: HealthState) -> HealthSnapshot {
    HealthSnapshot {
        name: format!("svc-{}", index),
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

fn success() -> ProbeResult {
    ProbeResult::success("api", Duration::from_millis(20))
}

fn failure() -> ProbeResult {
    ProbeResult::failure("api", ProbeErrorKind::Timeout, "timed out")
}

/// Feed `results` through a fresh tracker and collect every emitted event
fn run_tracker(unhealthy: u32, recovery: u32, results: Vec<ProbeResult>) -> (HealthState, Vec<AlertEvent>) {
    let runtime = tokio::runtime::Builder::new_current_thread().build().unwrap();

    runtime.block_on(async move {
        let descriptor = ServiceDescriptor::builder("api", "http://api.internal/health")
            .with_thresholds(unhealthy, recovery)
            .build()
            .unwrap();
        let (tx, mut rx) = mpsc::unbounded_channel();
        let tracker = ServiceHealthTracker::new(Arc::new(descriptor), 100, AlertSender::new(tx));

        for result in results {
            tracker.observe(result).await;
        }
        let state = tracker.snapshot().state;
        drop(tracker);

        let mut events = Vec::new();
        while let Some(event) = rx.recv().await {
            events.push(event);
        }
        (state, events)
    })
}

proptest! {
    #[test]
    fn verdict_is_critical_iff_a_critical_service_is_unhealthy(
        services in prop::collection::vec((criticality_strategy(), state_strategy()), 0..12)
    ) {
        let snapshots: Vec<HealthSnapshot> = services
            .iter()
            .enumerate()
            .map(|(i, (criticality, state))| snapshot(i, *criticality, *state))
            .collect();
        let verdict = aggregate(&snapshots);

        let critical_down = services
            .iter()
            .any(|(c, s)| c.is_critical() && *s == HealthState::Unhealthy);
        let any_failing = services.iter().any(|(_, s)| s.is_failing());

        prop_assert_eq!(verdict == Verdict::Critical, critical_down);
        prop_assert_eq!(verdict == Verdict::Healthy, !any_failing);
    }

    #[test]
    fn verdict_ignores_service_order(
        mut services in prop::collection::vec((criticality_strategy(), state_strategy()), 0..12)
    ) {
        let forward: Vec<HealthSnapshot> = services
            .iter()
            .enumerate()
            .map(|(i, (c, s))| snapshot(i, *c, *s))
            .collect();
        services.reverse();
        let backward: Vec<HealthSnapshot> = services
            .iter()
            .enumerate()
            .map(|(i, (c, s))| snapshot(i, *c, *s))
            .collect();

        prop_assert_eq!(aggregate(&forward), aggregate(&backward));
    }

    #[test]
    fn sustained_failures_raise_exactly_one_incident(threshold in 1u32..6, extra in 0usize..10) {
        let results = (0..threshold as usize + extra).map(|_| failure()).collect();
        let (state, events) = run_tracker(threshold, 2, results);

        prop_assert_eq!(state, HealthState::Unhealthy);
        let incidents: Vec<_> = events.iter().filter(|e| e.kind == AlertKind::Incident).collect();
        prop_assert_eq!(incidents.len(), 1);
        prop_assert_eq!(incidents[0].severity, AlertSeverity::Critical);
        prop_assert_eq!(incidents[0].consecutive_failures, threshold);
    }

    #[test]
    fn sustained_successes_after_outage_raise_exactly_one_recovery(
        unhealthy in 1u32..5,
        recovery in 1u32..5,
        extra in 0usize..10,
    ) {
        let mut results: Vec<ProbeResult> = (0..unhealthy).map(|_| failure()).collect();
        results.extend((0..recovery as usize + extra).map(|_| success()));
        let (state, events) = run_tracker(unhealthy, recovery, results);

        prop_assert_eq!(state, HealthState::Healthy);
        let recoveries: Vec<_> = events.iter().filter(|e| e.kind == AlertKind::Recovery).collect();
        prop_assert_eq!(recoveries.len(), 1);
        prop_assert_eq!(recoveries[0].previous, HealthState::Unhealthy);
        prop_assert_eq!(recoveries[0].severity, AlertSeverity::Info);
    }

    #[test]
    fn record_transitions_follow_counters(
        outcomes in prop::collection::vec(any::<bool>(), 1..60),
        unhealthy in 1u32..5,
        recovery in 1u32..5,
        capacity in 1usize..20,
    ) {
        let mut record = HealthRecord::new(capacity);

        for ok in outcomes {
            let before = record.state();
            let transition = record.observe(if ok { success() } else { failure() }, unhealthy, recovery);

            prop_assert!(record.history().count() <= capacity);
            if record.consecutive_failures() >= unhealthy {
                prop_assert_eq!(record.state(), HealthState::Unhealthy);
            }
            match transition {
                Some(t) => {
                    prop_assert_eq!(t.from, before);
                    prop_assert_eq!(t.to, record.state());
                    prop_assert_ne!(t.from, t.to);
                }
                None => prop_assert_eq!(before, record.state()),
            }
            prop_assert_ne!(record.state(), HealthState::Unknown);
        }
    }

    #[test]
    fn debounce_delivers_once_per_window(events in 1u64..50, spacing_ms in 0u64..1000) {
        let window = Duration::from_secs(300);
        let mut debouncer = Debouncer::new(window);
        let start = Instant::now();

        let mut delivered = 0;
        for i in 0..events {
            let at = start + Duration::from_millis(i * spacing_ms.min(window.as_millis() as u64 / 50));
            if let DebounceDecision::Deliver { .. } = debouncer.check("api", AlertSeverity::Critical, at) {
                delivered += 1;
            }
        }

        prop_assert_eq!(delivered, 1);
        prop_assert_eq!(debouncer.pending_suppressed("api", AlertSeverity::Critical), events - 1);

        let after = start + window + Duration::from_secs(60);
        prop_assert_eq!(
            debouncer.check("api", AlertSeverity::Critical, after),
            DebounceDecision::Deliver { suppressed: events - 1 }
        );
    }

    #[test]
    fn latency_percentiles_are_ordered(samples in prop::collection::vec(0u64..10_000, 1..200)) {
        let mut durations: Vec<Duration> = samples.iter().map(|ms| Duration::from_millis(*ms)).collect();
        let stats = LatencyStats::from_samples(&mut durations);

        prop_assert_eq!(stats.samples, samples.len());
        prop_assert!(stats.p50_ms.is_some());
        prop_assert!(stats.p50_ms <= stats.p95_ms);
        prop_assert!(stats.p95_ms <= stats.p99_ms);
        prop_assert!(stats.p99_ms <= stats.max_ms);
        prop_assert_eq!(stats.max_ms, samples.iter().max().copied());
    }
}
