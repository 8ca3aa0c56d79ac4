//! Monitor configuration.
//!
//! Configuration is read once at startup from a JSON file, adjusted with a
//! small set of environment variables, then validated into a
//! [`MonitorConfig`]. Anything invalid is a fatal [`Error`]; there is no
//! hot-reload.
//!
//! ```json
//! {
//!   "services": [
//!     { "name": "backend", "url": "http://backend:8000/health",
//!       "interval_secs": 30, "timeout_secs": 15,
//!       "unhealthy_threshold": 3, "recovery_threshold": 2,
//!       "criticality": "critical" }
//!   ],
//!   "alerts": { "debounce_secs": 300, "webhook": { "enabled": true, "url": "https://hooks.example.com/x" } }
//! }
//! ```

use std::collections::{BTreeMap, HashSet};
use std::net::SocketAddr;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::core::descriptor::{Criticality, ServiceDescriptor};
use crate::error::{Error, Result};
use crate::monitoring::alerts::AlertSeverity;
use crate::utils::backoff::BackoffPolicy;
use crate::utils::constants::*;
use crate::utils::validation::{is_plausible_email, parse_http_url};

// ═══════════════════════════════════════════════════════════════════════════════
// RAW FILE FORMAT
// ═══════════════════════════════════════════════════════════════════════════════

/// One service entry as written in the configuration file
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ServiceEntry {
    /// Unique service name
    pub name: Option<String>,
    /// Health endpoint URL
    pub url: Option<String>,
    /// Probe interval in seconds
    pub interval_secs: Option<u64>,
    /// Probe timeout in seconds
    pub timeout_secs: Option<u64>,
    /// Consecutive failures before unhealthy
    pub unhealthy_threshold: Option<u32>,
    /// Consecutive successes before recovered
    pub recovery_threshold: Option<u32>,
    /// Criticality tier
    pub criticality: Option<Criticality>,
    /// Require a JSON body
    pub expect_json: bool,
    /// Slow-response budget in milliseconds
    pub latency_budget_ms: Option<u64>,
}

/// Configuration file contents before validation
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ConfigFile {
    /// Monitored services
    pub services: Vec<ServiceEntry>,
    /// Interval for entries that do not set one
    pub default_interval_secs: u64,
    /// Scheduler settings
    pub scheduler: SchedulerSettings,
    /// Alerting settings
    pub alerts: AlertSettings,
    /// Probe results kept per service
    pub history_size: usize,
    /// Snapshot API settings
    pub http: HttpSettings,
}

impl Default for ConfigFile {
    fn default() -> Self {
        Self {
            services: Vec::new(),
            default_interval_secs: DEFAULT_INTERVAL_SECS,
            scheduler: SchedulerSettings::default(),
            alerts: AlertSettings::default(),
            history_size: DEFAULT_HISTORY_SIZE,
            http: HttpSettings::default(),
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// SETTINGS
// ═══════════════════════════════════════════════════════════════════════════════

/// Scheduler settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SchedulerSettings {
    /// Maximum probes in flight across all services
    pub max_concurrent_probes: usize,
    /// Slots that only critical services may use
    pub reserved_for_critical: usize,
    /// Re-probe policy within one cycle; every attempt is recorded
    pub probe_retry: BackoffPolicy,
}

impl Default for SchedulerSettings {
    fn default() -> Self {
        Self {
            max_concurrent_probes: DEFAULT_MAX_CONCURRENT_PROBES,
            reserved_for_critical: DEFAULT_RESERVED_FOR_CRITICAL,
            probe_retry: BackoffPolicy::no_retry(),
        }
    }
}

/// Alerting settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct AlertSettings {
    /// Minimum seconds between deliveries for one (service, severity) pair
    pub debounce_secs: u64,
    /// Also alert on the early Degraded step
    pub alert_on_degraded: bool,
    /// Warn when a success exceeds the service's latency budget
    pub alert_on_slow: bool,
    /// Per-channel delivery retry policy
    pub retry: BackoffPolicy,
    /// Log channel
    pub log: LogChannelSettings,
    /// Email channel
    pub email: EmailSettings,
    /// Webhook channel
    pub webhook: WebhookSettings,
}

impl Default for AlertSettings {
    fn default() -> Self {
        Self {
            debounce_secs: DEFAULT_DEBOUNCE_SECS,
            alert_on_degraded: false,
            alert_on_slow: false,
            retry: BackoffPolicy::default(),
            log: LogChannelSettings::default(),
            email: EmailSettings::default(),
            webhook: WebhookSettings::default(),
        }
    }
}

impl AlertSettings {
    /// Debounce window as a duration
    pub fn debounce_window(&self) -> Duration {
        Duration::from_secs(self.debounce_secs)
    }

    /// Number of enabled channels
    pub fn channel_count(&self) -> usize {
        [self.log.enabled, self.email.enabled, self.webhook.enabled]
            .iter()
            .filter(|enabled| **enabled)
            .count()
    }
}

/// Log channel settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct LogChannelSettings {
    /// Whether the channel is enabled
    pub enabled: bool,
    /// Minimum severity to log
    pub min_severity: AlertSeverity,
}

impl Default for LogChannelSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            min_severity: AlertSeverity::Info,
        }
    }
}

/// Email channel settings (delivered through an HTTP mail relay)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct EmailSettings {
    /// Whether the channel is enabled
    pub enabled: bool,
    /// Mail relay endpoint accepting JSON messages
    pub relay_url: String,
    /// Bearer token for the relay
    pub api_key: Option<String>,
    /// Sender address
    pub from: String,
    /// Recipient addresses
    pub recipients: Vec<String>,
    /// Minimum severity to send
    pub min_severity: AlertSeverity,
    /// Request timeout in seconds
    pub timeout_secs: u64,
}

impl Default for EmailSettings {
    fn default() -> Self {
        Self {
            enabled: false,
            relay_url: String::new(),
            api_key: None,
            from: DEFAULT_ALERT_FROM.to_string(),
            recipients: Vec::new(),
            min_severity: AlertSeverity::Info,
            timeout_secs: DEFAULT_CHANNEL_TIMEOUT_SECS,
        }
    }
}

/// Webhook channel settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct WebhookSettings {
    /// Whether the channel is enabled
    pub enabled: bool,
    /// Target URL
    pub url: String,
    /// Extra headers sent with every request
    pub headers: BTreeMap<String, String>,
    /// Minimum severity to send
    pub min_severity: AlertSeverity,
    /// Request timeout in seconds
    pub timeout_secs: u64,
}

impl Default for WebhookSettings {
    fn default() -> Self {
        Self {
            enabled: false,
            url: String::new(),
            headers: BTreeMap::new(),
            min_severity: AlertSeverity::Info,
            timeout_secs: DEFAULT_CHANNEL_TIMEOUT_SECS,
        }
    }
}

/// Snapshot API settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct HttpSettings {
    /// Serve the snapshot API
    pub enabled: bool,
    /// Bind address
    pub bind: String,
}

impl Default for HttpSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            bind: DEFAULT_BIND_ADDR.to_string(),
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// PARSING AND ENVIRONMENT
// ═══════════════════════════════════════════════════════════════════════════════

impl ConfigFile {
    /// Parse from JSON text
    pub fn from_json(content: &str) -> Result<Self> {
        serde_json::from_str(content).map_err(|e| Error::ConfigParse(e.to_string()))
    }

    /// Read and parse a configuration file
    pub fn read(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| Error::Io(format!("{}: {}", path.display(), e)))?;
        Self::from_json(&content)
    }

    /// Apply overrides from the process environment
    pub fn apply_env(&mut self) {
        self.apply_overrides(|key| std::env::var(key).ok());
    }

    /// Apply overrides from an arbitrary variable lookup
    pub fn apply_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(secs) = lookup("MONITORING_INTERVAL").and_then(|v| v.trim().parse().ok()) {
            self.default_interval_secs = secs;
        }

        if let Some(enabled) = lookup("EMAIL_ALERTS_ENABLED") {
            self.alerts.email.enabled = parse_flag(&enabled);
        }
        if let Some(to) = lookup("ALERT_TO_EMAILS") {
            self.alerts.email.recipients = to
                .split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(String::from)
                .collect();
        }
        if let Some(from) = lookup("ALERT_FROM_EMAIL") {
            self.alerts.email.from = from;
        }
        if let Some(url) = lookup("EMAIL_RELAY_URL") {
            self.alerts.email.relay_url = url;
        }
        if let Some(key) = lookup("EMAIL_RELAY_API_KEY") {
            self.alerts.email.api_key = Some(key);
        }

        if let Some(enabled) = lookup("WEBHOOK_ALERTS_ENABLED") {
            self.alerts.webhook.enabled = parse_flag(&enabled);
        }
        if let Some(url) = lookup("ALERT_WEBHOOK_URL") {
            self.alerts.webhook.url = url;
        }

        if let Some(bind) = lookup("MONITOR_BIND") {
            self.http.bind = bind;
        }
    }

    /// Validate into a [`MonitorConfig`]
    pub fn validate(self) -> Result<MonitorConfig> {
        let mut services = Vec::with_capacity(self.services.len());

        for (index, entry) in self.services.into_iter().enumerate() {
            let label = entry
                .name
                .clone()
                .unwrap_or_else(|| format!("services[{}]", index));

            let name = entry
                .name
                .ok_or_else(|| Error::descriptor(&label, "name", "is missing"))?;
            let url = entry
                .url
                .ok_or_else(|| Error::descriptor(&label, "url", "is missing"))?;

            let interval = entry.interval_secs.unwrap_or(self.default_interval_secs);
            let timeout = entry
                .timeout_secs
                .unwrap_or_else(|| DEFAULT_TIMEOUT_SECS.min(interval));

            let descriptor = ServiceDescriptor::builder(name, url)
                .with_interval(Duration::from_secs(interval))
                .with_timeout(Duration::from_secs(timeout))
                .with_thresholds(
                    entry.unhealthy_threshold.unwrap_or(DEFAULT_UNHEALTHY_THRESHOLD),
                    entry.recovery_threshold.unwrap_or(DEFAULT_RECOVERY_THRESHOLD),
                )
                .with_criticality(entry.criticality.unwrap_or(Criticality::Critical))
                .with_expect_json(entry.expect_json)
                .with_latency_budget(entry.latency_budget_ms.map(Duration::from_millis))
                .build()?;

            services.push(descriptor);
        }

        MonitorConfig::from_parts(services, self.scheduler, self.alerts, self.history_size, self.http)
    }
}

fn parse_flag(value: &str) -> bool {
    matches!(value.trim().to_lowercase().as_str(), "true" | "1" | "yes" | "on")
}

// ═══════════════════════════════════════════════════════════════════════════════
// VALIDATED CONFIGURATION
// ═══════════════════════════════════════════════════════════════════════════════

/// Validated monitor configuration
#[derive(Debug, Clone)]
pub struct MonitorConfig {
    /// Service descriptors, in file order
    pub services: Vec<Arc<ServiceDescriptor>>,
    /// Scheduler settings
    pub scheduler: SchedulerSettings,
    /// Alerting settings
    pub alerts: AlertSettings,
    /// Probe results kept per service
    pub history_size: usize,
    /// Snapshot API settings
    pub http: HttpSettings,
}

impl MonitorConfig {
    /// Load, apply environment overrides and validate
    pub fn load(path: &Path) -> Result<Self> {
        let mut file = ConfigFile::read(path)?;
        file.apply_env();
        file.validate()
    }

    /// Build a configuration from descriptors with default settings
    pub fn new(services: Vec<ServiceDescriptor>) -> Result<Self> {
        Self::from_parts(
            services,
            SchedulerSettings::default(),
            AlertSettings::default(),
            DEFAULT_HISTORY_SIZE,
            HttpSettings::default(),
        )
    }

    /// Assemble and validate
    pub fn from_parts(
        services: Vec<ServiceDescriptor>,
        scheduler: SchedulerSettings,
        alerts: AlertSettings,
        history_size: usize,
        http: HttpSettings,
    ) -> Result<Self> {
        if services.is_empty() {
            return Err(Error::NoServices);
        }

        let mut seen = HashSet::new();
        for descriptor in &services {
            if !seen.insert(descriptor.name().to_string()) {
                return Err(Error::DuplicateService(descriptor.name().to_string()));
            }
        }

        let config = Self {
            services: services.into_iter().map(Arc::new).collect(),
            scheduler,
            alerts,
            history_size,
            http,
        };
        config.validate_settings()?;
        Ok(config)
    }

    fn validate_settings(&self) -> Result<()> {
        if self.history_size == 0 {
            return Err(Error::setting("history_size", "must be at least 1"));
        }

        let scheduler = &self.scheduler;
        if scheduler.max_concurrent_probes == 0 {
            return Err(Error::setting("scheduler.max_concurrent_probes", "must be at least 1"));
        }
        if scheduler.reserved_for_critical >= scheduler.max_concurrent_probes {
            return Err(Error::setting(
                "scheduler.reserved_for_critical",
                "must leave at least one slot for degraded-tolerant services",
            ));
        }
        scheduler.probe_retry.validate("scheduler.probe_retry")?;

        let alerts = &self.alerts;
        alerts.retry.validate("alerts.retry")?;

        if alerts.email.enabled {
            let email = &alerts.email;
            parse_http_url(&email.relay_url)
                .map_err(|reason| Error::setting("alerts.email.relay_url", reason))?;
            if !is_plausible_email(&email.from) {
                return Err(Error::setting("alerts.email.from", "is not a valid address"));
            }
            if email.recipients.is_empty() {
                return Err(Error::setting("alerts.email.recipients", "must not be empty"));
            }
            if let Some(bad) = email.recipients.iter().find(|r| !is_plausible_email(r)) {
                return Err(Error::setting(
                    "alerts.email.recipients",
                    format!("'{}' is not a valid address", bad),
                ));
            }
            if email.timeout_secs == 0 {
                return Err(Error::setting("alerts.email.timeout_secs", "must be at least 1"));
            }
        }

        if alerts.webhook.enabled {
            parse_http_url(&alerts.webhook.url)
                .map_err(|reason| Error::setting("alerts.webhook.url", reason))?;
            if alerts.webhook.timeout_secs == 0 {
                return Err(Error::setting("alerts.webhook.timeout_secs", "must be at least 1"));
            }
        }

        if self.http.enabled {
            self.bind_addr()?;
        }

        Ok(())
    }

    /// Parsed snapshot API bind address
    pub fn bind_addr(&self) -> Result<SocketAddr> {
        self.http
            .bind
            .parse()
            .map_err(|e| Error::setting("http.bind", format!("'{}': {}", self.http.bind, e)))
    }

    /// Look up a descriptor by name
    pub fn service(&self, name: &str) -> Option<&Arc<ServiceDescriptor>> {
        self.services.iter().find(|d| d.name() == name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    const SAMPLE: &str = r#"{
        "services": [
            { "name": "frontend", "url": "http://frontend:80", "timeout_secs": 10,
              "criticality": "degraded-tolerant" },
            { "name": "backend", "url": "http://backend:8000/health", "interval_secs": 30,
              "timeout_secs": 15, "unhealthy_threshold": 3, "recovery_threshold": 2,
              "expect_json": true, "latency_budget_ms": 5000 }
        ],
        "alerts": { "debounce_secs": 120 }
    }"#;

    #[test]
    fn test_parse_and_validate() {
        let config = ConfigFile::from_json(SAMPLE).unwrap().validate().unwrap();

        assert_eq!(config.services.len(), 2);
        let frontend = config.service("frontend").unwrap();
        assert_eq!(frontend.criticality(), Criticality::DegradedTolerant);
        assert_eq!(frontend.interval(), Duration::from_secs(DEFAULT_INTERVAL_SECS));

        let backend = config.service("backend").unwrap();
        assert_eq!(backend.interval(), Duration::from_secs(30));
        assert_eq!(backend.timeout(), Duration::from_secs(15));
        assert!(backend.expect_json());
        assert_eq!(backend.latency_budget(), Some(Duration::from_millis(5000)));
        assert_eq!(config.alerts.debounce_window(), Duration::from_secs(120));
    }

    #[test]
    fn test_missing_url_is_fatal() {
        let err = ConfigFile::from_json(r#"{ "services": [ { "name": "redis" } ] }"#)
            .unwrap()
            .validate()
            .unwrap_err();

        assert!(err.is_fatal());
        assert!(err.to_string().contains("redis"));
        assert!(err.to_string().contains("url"));
    }

    #[test]
    fn test_unknown_field_rejected() {
        let err = ConfigFile::from_json(r#"{ "services": [], "sevices": [] }"#).unwrap_err();
        assert!(matches!(err, Error::ConfigParse(_)));
    }

    #[test]
    fn test_duplicate_names_rejected() {
        let json = r#"{ "services": [
            { "name": "api", "url": "http://a/health" },
            { "name": "api", "url": "http://b/health" }
        ] }"#;
        let err = ConfigFile::from_json(json).unwrap().validate().unwrap_err();
        assert_eq!(err, Error::DuplicateService("api".into()));
    }

    #[test]
    fn test_empty_services_rejected() {
        let err = ConfigFile::from_json("{}").unwrap().validate().unwrap_err();
        assert_eq!(err, Error::NoServices);
    }

    #[test]
    fn test_env_overrides() {
        let vars: HashMap<&str, &str> = [
            ("MONITORING_INTERVAL", "45"),
            ("EMAIL_ALERTS_ENABLED", "true"),
            ("ALERT_TO_EMAILS", "ops@gurukul.com, oncall@gurukul.com"),
            ("EMAIL_RELAY_URL", "https://mail.example.com/send"),
            ("WEBHOOK_ALERTS_ENABLED", "false"),
        ]
        .into_iter()
        .collect();

        let mut file = ConfigFile::from_json(SAMPLE).unwrap();
        file.apply_overrides(|key| vars.get(key).map(|v| v.to_string()));

        assert_eq!(file.default_interval_secs, 45);
        assert!(file.alerts.email.enabled);
        assert_eq!(file.alerts.email.recipients.len(), 2);
        assert!(!file.alerts.webhook.enabled);

        let config = file.validate().unwrap();
        assert_eq!(
            config.service("frontend").unwrap().interval(),
            Duration::from_secs(45)
        );
    }

    #[test]
    fn test_enabled_email_requires_recipients() {
        let mut file = ConfigFile::from_json(SAMPLE).unwrap();
        file.alerts.email.enabled = true;
        file.alerts.email.relay_url = "https://mail.example.com/send".into();

        let err = file.validate().unwrap_err();
        assert!(err.to_string().contains("recipients"));
    }

    #[test]
    fn test_reserved_slots_must_leave_room() {
        let mut file = ConfigFile::from_json(SAMPLE).unwrap();
        file.scheduler.max_concurrent_probes = 2;
        file.scheduler.reserved_for_critical = 2;

        assert!(file.validate().is_err());
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("monitor.json");
        std::fs::write(&path, SAMPLE).unwrap();

        let config = MonitorConfig::load(&path).unwrap();
        assert_eq!(config.services.len(), 2);

        let missing = MonitorConfig::load(&dir.path().join("absent.json")).unwrap_err();
        assert!(matches!(missing, Error::Io(_)));
    }
}
