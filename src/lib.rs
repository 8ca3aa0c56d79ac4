//! # Gurukul Monitor
//!
//! Production health monitoring and alerting for the services behind the
//! Gurukul learning platform.
//!
//! ## Architecture
//!
//! - **Probe**: one reachability and latency check against one endpoint
//! - **Monitoring**: per-service health state machines, the system-wide
//!   verdict and the alert dispatcher
//! - **Notify**: log, email-relay and webhook notification channels
//! - **Scheduler**: independent per-service probe timers over a bounded
//!   pool of probe slots
//! - **RPC**: read-only snapshot API (feature `http-api`)
//!
//! Data flows one way: scheduler → probe → tracker → aggregator and
//! dispatcher → channels.
//!
//! ## Example
//!
//! ```rust,ignore
//! use gurukul_monitor::prelude::*;
//!
//! let config = MonitorConfig::load(Path::new("monitor.json"))?;
//! let mut monitor = MonitorService::new(config)?;
//! monitor.start();
//!
//! let mut snapshots = monitor.subscribe();
//! while snapshots.changed().await.is_ok() {
//!     println!("{}", snapshots.borrow().verdict);
//! }
//! ```

#![forbid(unsafe_code)]
#![warn(
    missing_docs,
    rust_2018_idioms,
    trivial_casts,
    unused_lifetimes,
    unused_qualifications
)]

pub mod cli;
pub mod core;
pub mod error;
pub mod monitoring;
pub mod notify;
pub mod probe;
#[cfg(feature = "http-api")]
pub mod rpc;
pub mod scheduler;
pub mod utils;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::core::{
        config::{AlertSettings, ConfigFile, MonitorConfig, SchedulerSettings},
        descriptor::{Criticality, ServiceDescriptor},
    };
    pub use crate::error::{Error, Result};
    pub use crate::monitoring::{
        aggregate, AlertEvent, AlertSeverity, Aggregator, HealthSnapshot, HealthState,
        ServiceHealthTracker, SystemSnapshot, Verdict,
    };
    pub use crate::notify::{DeliveryError, NotificationChannel, Notification};
    pub use crate::probe::{HttpProbe, Probe, ProbeErrorKind, ProbeResult};
    pub use crate::scheduler::{MonitorService, Scheduler};
}

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
