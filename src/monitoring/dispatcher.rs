//! Alert Dispatcher.
//!
//! One ordered loop receives [`AlertEvent`]s, applies the debounce window and
//! fans deliverable notifications out to one worker per channel. Workers
//! retry with the configured [`BackoffPolicy`]; a slow or failing channel
//! only delays its own queue.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Instant;

use chrono::{DateTime, Utc};
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use super::alerts::{AlertEvent, AlertSender, AlertSeverity, DebounceDecision, Debouncer};
use super::metrics::MonitorMetrics;
use crate::core::config::AlertSettings;
use crate::error::{Error, Result};
use crate::notify::{
    EmailChannel, LogChannel, Notification, NotificationChannel, WebhookChannel,
};
use crate::utils::backoff::BackoffPolicy;

// ═══════════════════════════════════════════════════════════════════════════════
// DELIVERY LEDGER
// ═══════════════════════════════════════════════════════════════════════════════

/// Last permanent delivery failure of one channel
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeliveryFailure {
    /// Channel name
    pub channel: String,
    /// Service the notification was about
    pub service: String,
    /// Notification severity
    pub severity: AlertSeverity,
    /// Attempts made
    pub attempts: u32,
    /// Last error
    pub reason: String,
    /// When the channel gave up
    pub failed_at: DateTime<Utc>,
}

/// Shared record of delivery failures, read by the aggregator
#[derive(Debug, Clone)]
pub struct DeliveryLedger {
    failures: Arc<watch::Sender<BTreeMap<String, DeliveryFailure>>>,
}

impl DeliveryLedger {
    /// Create empty ledger
    pub fn new() -> Self {
        let (tx, _) = watch::channel(BTreeMap::new());
        Self { failures: Arc::new(tx) }
    }

    /// Record a failure, replacing the previous one for the channel
    pub fn record(&self, failure: DeliveryFailure) {
        self.failures.send_modify(|map| {
            map.insert(failure.channel.clone(), failure);
        });
    }

    /// Last failure per channel, ordered by channel name
    pub fn failures(&self) -> Vec<DeliveryFailure> {
        self.failures.borrow().values().cloned().collect()
    }
}

impl Default for DeliveryLedger {
    fn default() -> Self {
        Self::new()
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// DISPATCHER
// ═══════════════════════════════════════════════════════════════════════════════

/// Alert dispatcher, configured but not yet running
pub struct AlertDispatcher {
    debouncer: Debouncer,
    retry: BackoffPolicy,
    channels: Vec<Arc<dyn NotificationChannel>>,
    metrics: Arc<MonitorMetrics>,
    ledger: DeliveryLedger,
}

impl std::fmt::Debug for AlertDispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AlertDispatcher")
            .field("debounce", &self.debouncer.window())
            .field("retry", &self.retry)
            .field("channels", &self.channels.iter().map(|c| c.name()).collect::<Vec<_>>())
            .finish()
    }
}

impl AlertDispatcher {
    /// Create dispatcher without channels
    pub fn new(settings: &AlertSettings, metrics: Arc<MonitorMetrics>, ledger: DeliveryLedger) -> Self {
        Self {
            debouncer: Debouncer::new(settings.debounce_window()),
            retry: settings.retry,
            channels: Vec::new(),
            metrics,
            ledger,
        }
    }

    /// Add a channel
    pub fn with_channel(mut self, channel: Arc<dyn NotificationChannel>) -> Self {
        self.channels.push(channel);
        self
    }

    /// Configured channel names
    pub fn channel_names(&self) -> Vec<&str> {
        self.channels.iter().map(|c| c.name()).collect()
    }

    /// Start the dispatch loop and channel workers
    pub fn spawn(self) -> (AlertSender, DispatcherHandle) {
        let (tx, rx) = mpsc::unbounded_channel();
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        let workers = self
            .channels
            .iter()
            .map(|channel| {
                ChannelWorker::spawn(
                    channel.clone(),
                    self.retry,
                    self.metrics.clone(),
                    self.ledger.clone(),
                )
            })
            .collect();

        let task = tokio::spawn(dispatch_loop(
            rx,
            shutdown_rx,
            self.debouncer,
            workers,
            self.metrics,
        ));

        (
            AlertSender::new(tx),
            DispatcherHandle {
                shutdown: shutdown_tx,
                task,
            },
        )
    }
}

/// Build the channels enabled in `settings`
pub fn channels_from_settings(settings: &AlertSettings) -> Result<Vec<Arc<dyn NotificationChannel>>> {
    let mut channels: Vec<Arc<dyn NotificationChannel>> = Vec::new();

    if settings.log.enabled {
        channels.push(Arc::new(LogChannel::new(settings.log.min_severity)));
    }
    if settings.email.enabled {
        channels.push(Arc::new(EmailChannel::from_settings(&settings.email)?));
    }
    if settings.webhook.enabled {
        channels.push(Arc::new(WebhookChannel::from_settings(&settings.webhook)?));
    }

    Ok(channels)
}

/// Handle to a running dispatcher
#[derive(Debug)]
pub struct DispatcherHandle {
    shutdown: watch::Sender<bool>,
    task: JoinHandle<()>,
}

impl DispatcherHandle {
    /// Stop accepting events, drain the queue and wait for in-flight deliveries
    pub async fn shutdown(self) {
        let _ = self.shutdown.send(true);
        if let Err(e) = self.task.await {
            error!("alert dispatcher task failed: {}", e);
        }
    }
}

async fn dispatch_loop(
    mut rx: mpsc::UnboundedReceiver<AlertEvent>,
    mut shutdown: watch::Receiver<bool>,
    mut debouncer: Debouncer,
    workers: Vec<ChannelWorker>,
    metrics: Arc<MonitorMetrics>,
) {
    info!(channels = workers.len(), "alert dispatcher started");

    loop {
        tokio::select! {
            event = rx.recv() => match event {
                Some(event) => route(event, &mut debouncer, &workers, &metrics),
                None => break,
            },
            _ = shutdown.changed() => {
                rx.close();
                while let Some(event) = rx.recv().await {
                    route(event, &mut debouncer, &workers, &metrics);
                }
                break;
            }
        }
    }

    for worker in workers {
        worker.finish().await;
    }
    info!("alert dispatcher stopped");
}

fn route(
    event: AlertEvent,
    debouncer: &mut Debouncer,
    workers: &[ChannelWorker],
    metrics: &MonitorMetrics,
) {
    metrics.alerts_emitted.increment();

    let suppressed = match debouncer.check(&event.service, event.severity, Instant::now()) {
        DebounceDecision::Suppress { suppressed } => {
            metrics.alerts_suppressed.increment();
            debug!(
                service = %event.service,
                severity = %event.severity,
                suppressed,
                "alert suppressed by debounce window"
            );
            return;
        }
        DebounceDecision::Deliver { suppressed } => suppressed,
    };

    let notification = Arc::new(Notification::new(event, suppressed));
    for worker in workers {
        if worker.channel.accepts(&notification) {
            worker.enqueue(notification.clone());
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// CHANNEL WORKER
// ═══════════════════════════════════════════════════════════════════════════════

struct ChannelWorker {
    channel: Arc<dyn NotificationChannel>,
    queue: mpsc::UnboundedSender<Arc<Notification>>,
    task: JoinHandle<()>,
}

impl ChannelWorker {
    fn spawn(
        channel: Arc<dyn NotificationChannel>,
        retry: BackoffPolicy,
        metrics: Arc<MonitorMetrics>,
        ledger: DeliveryLedger,
    ) -> Self {
        let (queue, mut rx) = mpsc::unbounded_channel::<Arc<Notification>>();
        let worker_channel = channel.clone();

        let task = tokio::spawn(async move {
            while let Some(notification) = rx.recv().await {
                deliver_with_retry(&*worker_channel, &notification, &retry, &metrics, &ledger).await;
            }
        });

        Self { channel, queue, task }
    }

    fn enqueue(&self, notification: Arc<Notification>) {
        if self.queue.send(notification).is_err() {
            warn!(channel = self.channel.name(), "channel worker is gone, dropping notification");
        }
    }

    async fn finish(self) {
        let name = self.channel.name().to_string();
        drop(self.queue);
        if let Err(e) = self.task.await {
            error!(channel = %name, "channel worker failed: {}", e);
        }
    }
}

async fn deliver_with_retry(
    channel: &dyn NotificationChannel,
    notification: &Notification,
    retry: &BackoffPolicy,
    metrics: &MonitorMetrics,
    ledger: &DeliveryLedger,
) {
    let result = retry
        .retry(
            channel.name(),
            |_| channel.deliver(notification),
            |err| err.is_retryable(),
        )
        .await;

    match result {
        Ok(()) => {
            metrics.alerts_delivered.increment();
            debug!(
                channel = channel.name(),
                service = %notification.event.service,
                "notification delivered"
            );
        }
        Err(failure) => {
            metrics.delivery_failures.increment();
            let reason = failure.last.to_string();
            let err = Error::DeliveryExhausted {
                channel: channel.name().to_string(),
                attempts: failure.attempts,
                reason: reason.clone(),
            };
            error!(
                service = %notification.event.service,
                severity = %notification.severity(),
                code = err.code(),
                "{}",
                err
            );
            ledger.record(DeliveryFailure {
                channel: channel.name().to_string(),
                service: notification.event.service.clone(),
                severity: notification.severity(),
                attempts: failure.attempts,
                reason,
                failed_at: Utc::now(),
            });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::descriptor::Criticality;
    use crate::monitoring::alerts::AlertKind;
    use crate::monitoring::health::HealthState;
    use crate::notify::DeliveryError;
    use async_trait::async_trait;
    use std::sync::Mutex;
    use std::time::Duration;

    /// Channel that records deliveries and fails the first `failures` attempts
    struct RecordingChannel {
        name: &'static str,
        failures: Mutex<u32>,
        error: DeliveryError,
        delivered: Mutex<Vec<Notification>>,
    }

    impl RecordingChannel {
        fn new(name: &'static str, failures: u32, error: DeliveryError) -> Arc<Self> {
            Arc::new(Self {
                name,
                failures: Mutex::new(failures),
                error,
                delivered: Mutex::new(Vec::new()),
            })
        }

        fn delivered(&self) -> Vec<Notification> {
            self.delivered.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl NotificationChannel for RecordingChannel {
        fn name(&self) -> &str {
            self.name
        }

        fn min_severity(&self) -> AlertSeverity {
            AlertSeverity::Info
        }

        async fn deliver(&self, notification: &Notification) -> std::result::Result<(), DeliveryError> {
            {
                let mut remaining = self.failures.lock().unwrap();
                if *remaining > 0 {
                    *remaining -= 1;
                    return Err(self.error.clone());
                }
            }
            self.delivered.lock().unwrap().push(notification.clone());
            Ok(())
        }
    }

    fn event(service: &str, severity: AlertSeverity) -> AlertEvent {
        AlertEvent {
            service: service.into(),
            previous: HealthState::Degraded,
            current: HealthState::Unhealthy,
            timestamp: Utc::now(),
            severity,
            criticality: Criticality::Critical,
            kind: AlertKind::Incident,
            consecutive_failures: 3,
            detail: None,
        }
    }

    fn settings() -> AlertSettings {
        AlertSettings {
            retry: BackoffPolicy::new(3, Duration::from_millis(1), 2.0, Duration::from_millis(5)),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_debounce_suppresses_repeats() {
        let metrics = Arc::new(MonitorMetrics::new());
        let channel = RecordingChannel::new("test", 0, DeliveryError::Timeout);
        let (sender, handle) = AlertDispatcher::new(&settings(), metrics.clone(), DeliveryLedger::new())
            .with_channel(channel.clone())
            .spawn();

        for _ in 0..4 {
            sender.emit(event("api", AlertSeverity::Critical));
        }
        handle.shutdown().await;

        assert_eq!(channel.delivered().len(), 1);
        let snapshot = metrics.snapshot();
        assert_eq!(snapshot.alerts_emitted, 4);
        assert_eq!(snapshot.alerts_suppressed, 3);
        assert_eq!(snapshot.alerts_delivered, 1);
    }

    #[tokio::test]
    async fn test_failing_channel_does_not_block_others() {
        let metrics = Arc::new(MonitorMetrics::new());
        let ledger = DeliveryLedger::new();
        let broken = RecordingChannel::new("broken", u32::MAX, DeliveryError::Unreachable("refused".into()));
        let healthy = RecordingChannel::new("healthy", 0, DeliveryError::Timeout);

        let (sender, handle) = AlertDispatcher::new(&settings(), metrics.clone(), ledger.clone())
            .with_channel(broken.clone())
            .with_channel(healthy.clone())
            .spawn();

        sender.emit(event("api", AlertSeverity::Critical));
        handle.shutdown().await;

        assert_eq!(healthy.delivered().len(), 1);
        assert!(broken.delivered().is_empty());
        assert_eq!(metrics.snapshot().delivery_failures, 1);

        let failures = ledger.failures();
        assert_eq!(failures.len(), 1);
        assert_eq!(failures[0].channel, "broken");
        assert_eq!(failures[0].attempts, 3);
        assert_eq!(failures[0].reason, DeliveryError::Unreachable("refused".into()).to_string());
    }

    #[tokio::test]
    async fn test_transient_failure_is_retried() {
        let metrics = Arc::new(MonitorMetrics::new());
        let flaky = RecordingChannel::new("flaky", 2, DeliveryError::Timeout);

        let (sender, handle) = AlertDispatcher::new(&settings(), metrics.clone(), DeliveryLedger::new())
            .with_channel(flaky.clone())
            .spawn();

        sender.emit(event("api", AlertSeverity::Major));
        handle.shutdown().await;

        assert_eq!(flaky.delivered().len(), 1);
        assert_eq!(metrics.snapshot().delivery_failures, 0);
    }

    #[tokio::test]
    async fn test_permanent_failure_is_not_retried() {
        let ledger = DeliveryLedger::new();
        let rejecting = RecordingChannel::new(
            "rejecting",
            1,
            DeliveryError::Rejected { status: 400, body: "bad".into() },
        );

        let (sender, handle) = AlertDispatcher::new(&settings(), Arc::new(MonitorMetrics::new()), ledger.clone())
            .with_channel(rejecting.clone())
            .spawn();

        sender.emit(event("api", AlertSeverity::Critical));
        handle.shutdown().await;

        assert!(rejecting.delivered().is_empty());
        assert_eq!(ledger.failures()[0].attempts, 1);
    }

    #[tokio::test]
    async fn test_zero_window_delivers_every_event() {
        let mut settings = settings();
        settings.debounce_secs = 0;
        let channel = RecordingChannel::new("test", 0, DeliveryError::Timeout);

        let (sender, handle) = AlertDispatcher::new(&settings, Arc::new(MonitorMetrics::new()), DeliveryLedger::new())
            .with_channel(channel.clone())
            .spawn();

        sender.emit(event("api", AlertSeverity::Critical));
        sender.emit(event("web", AlertSeverity::Critical));
        handle.shutdown().await;

        let delivered = channel.delivered();
        assert_eq!(delivered.len(), 2);
        assert!(delivered.iter().all(|n| n.suppressed_count == 0));
    }

    #[test]
    fn test_channels_from_settings() {
        let channels = channels_from_settings(&AlertSettings::default()).unwrap();
        assert_eq!(channels.len(), 1);
        assert_eq!(channels[0].name(), "log");
    }
}
