//! Probes.
//!
//! A probe performs exactly one reachability check against one service and
//! reports what it saw as a [`ProbeResult`]. Probes never retry and never
//! return errors: timeouts, refused connections, bad status codes and
//! unparseable bodies all become a failed outcome tagged with a
//! [`ProbeErrorKind`]. Retrying is the scheduler's job so that every attempt
//! reaches the tracker as its own observation.

pub mod http;

pub use http::HttpProbe;

use std::fmt;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::core::descriptor::ServiceDescriptor;
use crate::utils::constants::MAX_PAYLOAD_BYTES;

// ═══════════════════════════════════════════════════════════════════════════════
// PROBE TRAIT
// ═══════════════════════════════════════════════════════════════════════════════

/// One reachability check against one service
#[async_trait]
pub trait Probe: Send + Sync {
    /// Check `descriptor` once, bounded by its timeout
    async fn probe(&self, descriptor: &ServiceDescriptor) -> ProbeResult;
}

// ═══════════════════════════════════════════════════════════════════════════════
// PROBE RESULT
// ═══════════════════════════════════════════════════════════════════════════════

/// Why a probe failed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProbeErrorKind {
    /// No complete response within the descriptor timeout
    Timeout,
    /// Endpoint could not be reached
    ConnectionRefused,
    /// Response status outside 2xx
    UnexpectedStatus,
    /// Body could not be read or did not parse
    MalformedResponse,
}

impl ProbeErrorKind {
    /// Get display string
    pub fn as_str(&self) -> &'static str {
        match self {
            ProbeErrorKind::Timeout => "timeout",
            ProbeErrorKind::ConnectionRefused => "connection_refused",
            ProbeErrorKind::UnexpectedStatus => "unexpected_status",
            ProbeErrorKind::MalformedResponse => "malformed_response",
        }
    }
}

impl fmt::Display for ProbeErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What one probe observed
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProbeOutcome {
    /// Endpoint answered correctly
    Success {
        /// Time until the full response was read
        latency: Duration,
        /// Latency exceeded the descriptor budget
        slow: bool,
    },
    /// Endpoint did not answer correctly
    Failure {
        /// Failure classification
        kind: ProbeErrorKind,
        /// Human-readable detail
        detail: String,
    },
}

/// One observation of one service
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProbeResult {
    /// Service name
    pub service: String,
    /// When the probe started
    pub timestamp: DateTime<Utc>,
    /// Outcome
    pub outcome: ProbeOutcome,
    /// HTTP status, if a response arrived
    pub status: Option<u16>,
    /// Response body, truncated
    pub payload: Option<String>,
}

impl ProbeResult {
    /// Successful observation
    pub fn success(service: impl Into<String>, latency: Duration) -> Self {
        Self {
            service: service.into(),
            timestamp: Utc::now(),
            outcome: ProbeOutcome::Success { latency, slow: false },
            status: None,
            payload: None,
        }
    }

    /// Failed observation
    pub fn failure(
        service: impl Into<String>,
        kind: ProbeErrorKind,
        detail: impl Into<String>,
    ) -> Self {
        Self {
            service: service.into(),
            timestamp: Utc::now(),
            outcome: ProbeOutcome::Failure {
                kind,
                detail: detail.into(),
            },
            status: None,
            payload: None,
        }
    }

    /// Set start timestamp
    pub fn at(mut self, timestamp: DateTime<Utc>) -> Self {
        self.timestamp = timestamp;
        self
    }

    /// Set HTTP status
    pub fn with_status(mut self, status: u16) -> Self {
        self.status = Some(status);
        self
    }

    /// Attach the response body, truncated
    pub fn with_payload(mut self, payload: &str) -> Self {
        self.payload = Some(truncate_payload(payload));
        self
    }

    /// Flag a success as slower than `budget`
    pub fn with_latency_budget(mut self, budget: Option<Duration>) -> Self {
        if let (ProbeOutcome::Success { latency, slow }, Some(budget)) = (&mut self.outcome, budget) {
            *slow = *latency > budget;
        }
        self
    }

    /// Check for success
    pub fn is_success(&self) -> bool {
        matches!(self.outcome, ProbeOutcome::Success { .. })
    }

    /// Latency of a successful probe
    pub fn latency(&self) -> Option<Duration> {
        match self.outcome {
            ProbeOutcome::Success { latency, .. } => Some(latency),
            ProbeOutcome::Failure { .. } => None,
        }
    }

    /// Failure kind of a failed probe
    pub fn error_kind(&self) -> Option<ProbeErrorKind> {
        match self.outcome {
            ProbeOutcome::Success { .. } => None,
            ProbeOutcome::Failure { kind, .. } => Some(kind),
        }
    }

    /// Whether a successful probe exceeded its latency budget
    pub fn is_slow(&self) -> bool {
        matches!(self.outcome, ProbeOutcome::Success { slow: true, .. })
    }
}

/// Cut a payload to at most `MAX_PAYLOAD_BYTES`, on a char boundary
pub fn truncate_payload(payload: &str) -> String {
    if payload.len() <= MAX_PAYLOAD_BYTES {
        return payload.to_string();
    }
    let mut end = MAX_PAYLOAD_BYTES;
    while !payload.is_char_boundary(end) {
        end -= 1;
    }
    payload[..end].to_string()
}
