//! Core configuration types.
//!
//! - Service descriptors: the validated, immutable description of one target
//! - Monitor configuration: file format, environment overrides, validation

pub mod config;
pub mod descriptor;

pub use config::*;
pub use descriptor::*;
