//! Monitor-wide defaults and limits.
//!
//! Every default a descriptor or setting can fall back to lives here, so the
//! effective configuration can be audited in one place.

// ═══════════════════════════════════════════════════════════════════════════════
// PROBE DEFAULTS
// ═══════════════════════════════════════════════════════════════════════════════

/// Default probe interval in seconds
pub const DEFAULT_INTERVAL_SECS: u64 = 60;

/// Default probe timeout in seconds
pub const DEFAULT_TIMEOUT_SECS: u64 = 10;

/// Consecutive failures before a service is declared unhealthy
pub const DEFAULT_UNHEALTHY_THRESHOLD: u32 = 3;

/// Consecutive successes before a failing service is declared recovered
pub const DEFAULT_RECOVERY_THRESHOLD: u32 = 2;

/// Maximum bytes of a probe response body kept for reporting
pub const MAX_PAYLOAD_BYTES: usize = 1024;

/// User agent sent with every probe
pub const PROBE_USER_AGENT: &str = concat!("gurukul-monitor/", env!("CARGO_PKG_VERSION"));

// ═══════════════════════════════════════════════════════════════════════════════
// TRACKER DEFAULTS
// ═══════════════════════════════════════════════════════════════════════════════

/// Probe results kept per service for latency percentiles
pub const DEFAULT_HISTORY_SIZE: usize = 100;

// ═══════════════════════════════════════════════════════════════════════════════
// SCHEDULER DEFAULTS
// ═══════════════════════════════════════════════════════════════════════════════

/// Maximum probes in flight across all services
pub const DEFAULT_MAX_CONCURRENT_PROBES: usize = 16;

/// Probe slots only critical services may use
pub const DEFAULT_RESERVED_FOR_CRITICAL: usize = 4;

// ═══════════════════════════════════════════════════════════════════════════════
// ALERT DEFAULTS
// ═══════════════════════════════════════════════════════════════════════════════

/// Minimum seconds between two deliveries for the same service and severity
pub const DEFAULT_DEBOUNCE_SECS: u64 = 300;

/// Delivery attempts per channel before giving up
pub const DEFAULT_DELIVERY_ATTEMPTS: u32 = 4;

/// First delivery retry delay in milliseconds
pub const DEFAULT_DELIVERY_BASE_DELAY_MS: u64 = 500;

/// Upper bound on a single delivery retry delay in milliseconds
pub const DEFAULT_DELIVERY_MAX_DELAY_MS: u64 = 10_000;

/// Timeout for a single channel request in seconds
pub const DEFAULT_CHANNEL_TIMEOUT_SECS: u64 = 10;

/// Sender address used when none is configured
pub const DEFAULT_ALERT_FROM: &str = "alerts@gurukul.com";

// ═══════════════════════════════════════════════════════════════════════════════
// HTTP API DEFAULTS
// ═══════════════════════════════════════════════════════════════════════════════

/// Bind address for the snapshot API
pub const DEFAULT_BIND_ADDR: &str = "0.0.0.0:9090";
