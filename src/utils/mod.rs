//! Shared utilities.
//!
//! - Defaults and limits
//! - Validation helpers
//! - Retry/backoff policy

pub mod backoff;
pub mod constants;
pub mod validation;

pub use backoff::*;
pub use constants::*;
pub use validation::*;
