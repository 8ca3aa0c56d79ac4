//! Health monitoring and alerting.
//!
//! # Components
//!
//! - **Health**: per-service state machine and tracker
//! - **Registry**: one tracker per configured service
//! - **Aggregator**: system-wide verdict and snapshot publication
//! - **Alerts**: alert events, severities and debouncing
//! - **Dispatcher**: ordered alert routing and per-channel delivery workers
//! - **Metrics**: monitor counters

pub mod aggregator;
pub mod alerts;
pub mod dispatcher;
pub mod health;
pub mod metrics;
pub mod registry;

pub use aggregator::*;
pub use alerts::*;
pub use dispatcher::*;
pub use health::*;
pub use metrics::*;
pub use registry::*;
