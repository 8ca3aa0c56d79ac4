//! Service descriptors.
//!
//! A descriptor is the static, validated description of one monitored
//! service. Descriptors can only be produced through
//! [`ServiceDescriptorBuilder::build`], so every descriptor the monitor holds
//! has already passed validation. They are shared as `Arc<ServiceDescriptor>`
//! and never mutated after load.

use std::fmt;
use std::time::Duration;

use reqwest::Url;
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::utils::constants::*;
use crate::utils::validation::*;

// ═══════════════════════════════════════════════════════════════════════════════
// CRITICALITY
// ═══════════════════════════════════════════════════════════════════════════════

/// How a service failure affects the system verdict
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Criticality {
    /// Failure only degrades the system
    DegradedTolerant,
    /// Failure makes the whole system critical
    Critical,
}

impl Criticality {
    /// Get display string
    pub fn as_str(&self) -> &'static str {
        match self {
            Criticality::Critical => "critical",
            Criticality::DegradedTolerant => "degraded-tolerant",
        }
    }

    /// Check if this is the critical tier
    pub fn is_critical(&self) -> bool {
        matches!(self, Criticality::Critical)
    }
}

impl fmt::Display for Criticality {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Criticality {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "critical" => Ok(Criticality::Critical),
            "degraded-tolerant" | "degraded_tolerant" | "tolerant" => {
                Ok(Criticality::DegradedTolerant)
            }
            _ => Err(format!("Unknown criticality: {}", s)),
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// SERVICE DESCRIPTOR
// ═══════════════════════════════════════════════════════════════════════════════

/// Validated, immutable description of a monitored service
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceDescriptor {
    name: String,
    url: Url,
    interval: Duration,
    timeout: Duration,
    unhealthy_threshold: u32,
    recovery_threshold: u32,
    criticality: Criticality,
    expect_json: bool,
    latency_budget: Option<Duration>,
}

impl ServiceDescriptor {
    /// Start building a descriptor with defaults for everything but name and URL
    pub fn builder(name: impl Into<String>, url: impl Into<String>) -> ServiceDescriptorBuilder {
        ServiceDescriptorBuilder::new(name, url)
    }

    /// Unique service name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Health endpoint
    pub fn url(&self) -> &Url {
        &self.url
    }

    /// Time between probe cycles
    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Upper bound on one probe
    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Consecutive failures that declare the service unhealthy
    pub fn unhealthy_threshold(&self) -> u32 {
        self.unhealthy_threshold
    }

    /// Consecutive successes that declare the service recovered
    pub fn recovery_threshold(&self) -> u32 {
        self.recovery_threshold
    }

    /// Criticality tier
    pub fn criticality(&self) -> Criticality {
        self.criticality
    }

    /// Whether a 2xx body must parse as JSON
    pub fn expect_json(&self) -> bool {
        self.expect_json
    }

    /// Latency above which a successful probe is flagged slow
    pub fn latency_budget(&self) -> Option<Duration> {
        self.latency_budget
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// BUILDER
// ═══════════════════════════════════════════════════════════════════════════════

/// Builder for [`ServiceDescriptor`]; `build` runs validation
#[derive(Debug, Clone)]
pub struct ServiceDescriptorBuilder {
    name: String,
    url: String,
    interval: Duration,
    timeout: Duration,
    unhealthy_threshold: u32,
    recovery_threshold: u32,
    criticality: Criticality,
    expect_json: bool,
    latency_budget: Option<Duration>,
}

impl ServiceDescriptorBuilder {
    /// Create builder with default cadence and thresholds
    pub fn new(name: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            url: url.into(),
            interval: Duration::from_secs(DEFAULT_INTERVAL_SECS),
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
            unhealthy_threshold: DEFAULT_UNHEALTHY_THRESHOLD,
            recovery_threshold: DEFAULT_RECOVERY_THRESHOLD,
            criticality: Criticality::Critical,
            expect_json: false,
            latency_budget: None,
        }
    }

    /// Set probe interval
    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    /// Set probe timeout
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Set unhealthy and recovery thresholds
    pub fn with_thresholds(mut self, unhealthy: u32, recovery: u32) -> Self {
        self.unhealthy_threshold = unhealthy;
        self.recovery_threshold = recovery;
        self
    }

    /// Set criticality tier
    pub fn with_criticality(mut self, criticality: Criticality) -> Self {
        self.criticality = criticality;
        self
    }

    /// Require a JSON body on success
    pub fn with_expect_json(mut self, expect_json: bool) -> Self {
        self.expect_json = expect_json;
        self
    }

    /// Flag successful probes slower than `budget`
    pub fn with_latency_budget(mut self, budget: Option<Duration>) -> Self {
        self.latency_budget = budget;
        self
    }

    /// Validate and produce the descriptor
    pub fn build(self) -> Result<ServiceDescriptor> {
        validate_service_name(&self.name)?;
        let name = self.name.trim().to_string();

        let url = validate_endpoint(&name, &self.url)?;
        validate_non_zero_duration(&name, "interval", self.interval)?;
        validate_non_zero_duration(&name, "timeout", self.timeout)?;

        if self.timeout > self.interval {
            return Err(crate::error::Error::descriptor(
                &name,
                "timeout",
                format!(
                    "({:?}) must not exceed the probe interval ({:?})",
                    self.timeout, self.interval
                ),
            ));
        }

        validate_threshold(&name, "unhealthy_threshold", self.unhealthy_threshold)?;
        validate_threshold(&name, "recovery_threshold", self.recovery_threshold)?;

        if let Some(budget) = self.latency_budget {
            validate_non_zero_duration(&name, "latency_budget", budget)?;
        }

        Ok(ServiceDescriptor {
            name,
            url,
            interval: self.interval,
            timeout: self.timeout,
            unhealthy_threshold: self.unhealthy_threshold,
            recovery_threshold: self.recovery_threshold,
            criticality: self.criticality,
            expect_json: self.expect_json,
            latency_budget: self.latency_budget,
        })
    }
}
