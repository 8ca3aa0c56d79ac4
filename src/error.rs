//! Error types for the health monitor.
//!
//! Probe failures never show up here: they are normal observations and are
//! folded into the tracker state machine. What remains are configuration
//! problems (fatal at startup), notification delivery problems (retried and
//! recorded) and the plumbing errors around them.

use thiserror::Error;

/// Result type alias for monitor operations
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for the monitor
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Error {
    // ═══════════════════════════════════════════════════════════════════
    // Configuration Errors
    // ═══════════════════════════════════════════════════════════════════

    /// A service descriptor field is missing or invalid
    #[error("Invalid configuration for service '{service}': {field} {reason}")]
    InvalidDescriptor {
        /// Service the descriptor belongs to
        service: String,
        /// Offending field
        field: String,
        /// Why it was rejected
        reason: String,
    },

    /// Two descriptors share the same name
    #[error("Duplicate service name: {0}")]
    DuplicateService(String),

    /// Configuration contains no services to monitor
    #[error("No services configured")]
    NoServices,

    /// Dispatcher, scheduler or channel settings are invalid
    #[error("Invalid setting {name}: {reason}")]
    InvalidSetting {
        /// Setting name
        name: String,
        /// Reason for invalidity
        reason: String,
    },

    /// Configuration file could not be parsed
    #[error("Failed to parse configuration: {0}")]
    ConfigParse(String),

    // ═══════════════════════════════════════════════════════════════════
    // Delivery Errors
    // ═══════════════════════════════════════════════════════════════════

    /// A notification channel gave up after exhausting retries
    #[error("Delivery to {channel} failed after {attempts} attempts: {reason}")]
    DeliveryExhausted {
        /// Channel identifier
        channel: String,
        /// Attempts made
        attempts: u32,
        /// Last error seen
        reason: String,
    },

    /// HTTP client could not be constructed
    #[error("HTTP client error: {0}")]
    HttpClient(String),

    // ═══════════════════════════════════════════════════════════════════
    // Runtime Errors
    // ═══════════════════════════════════════════════════════════════════

    /// Unknown service requested
    #[error("Service not found: {0}")]
    ServiceNotFound(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(String),

    /// Serialization failed
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Internal error (should not happen in production)
    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Shorthand for a descriptor validation failure
    pub fn descriptor(
        service: impl Into<String>,
        field: impl Into<String>,
        reason: impl Into<String>,
    ) -> Self {
        Error::InvalidDescriptor {
            service: service.into(),
            field: field.into(),
            reason: reason.into(),
        }
    }

    /// Shorthand for a settings validation failure
    pub fn setting(name: impl Into<String>, reason: impl Into<String>) -> Self {
        Error::InvalidSetting {
            name: name.into(),
            reason: reason.into(),
        }
    }

    /// Returns true if this error must stop the process at startup
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            Error::InvalidDescriptor { .. }
                | Error::DuplicateService(_)
                | Error::NoServices
                | Error::InvalidSetting { .. }
                | Error::ConfigParse(_)
        )
    }

    /// Returns the error code for external systems
    pub fn code(&self) -> u32 {
        match self {
            // Configuration errors: 1xxx
            Error::InvalidDescriptor { .. } => 1001,
            Error::DuplicateService(_) => 1002,
            Error::NoServices => 1003,
            Error::InvalidSetting { .. } => 1004,
            Error::ConfigParse(_) => 1005,

            // Delivery errors: 2xxx
            Error::DeliveryExhausted { .. } => 2001,
            Error::HttpClient(_) => 2002,

            // Runtime errors: 9xxx
            Error::ServiceNotFound(_) => 9001,
            Error::Io(_) => 9002,
            Error::Serialization(_) => 9003,
            Error::Internal(_) => 9004,
        }
    }
}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        Error::Io(err.to_string())
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::Serialization(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_codes_unique() {
        let codes = vec![
            Error::descriptor("api", "url", "is empty").code(),
            Error::DuplicateService("api".into()).code(),
            Error::NoServices.code(),
            Error::setting("debounce", "zero").code(),
            Error::ConfigParse("".into()).code(),
            Error::DeliveryExhausted { channel: "".into(), attempts: 0, reason: "".into() }.code(),
            Error::HttpClient("".into()).code(),
            Error::ServiceNotFound("".into()).code(),
            Error::Io("".into()).code(),
            Error::Serialization("".into()).code(),
            Error::Internal("".into()).code(),
        ];

        let mut unique_codes = codes.clone();
        unique_codes.sort();
        unique_codes.dedup();

        assert_eq!(codes.len(), unique_codes.len(), "Error codes must be unique");
    }

    #[test]
    fn test_descriptor_error_display() {
        let err = Error::descriptor("api", "timeout", "must be greater than zero");
        let msg = err.to_string();
        assert!(msg.contains("api"));
        assert!(msg.contains("timeout"));
    }

    #[test]
    fn test_only_configuration_errors_are_fatal() {
        assert!(Error::NoServices.is_fatal());
        assert!(Error::DuplicateService("web".into()).is_fatal());
        assert!(!Error::Internal("boom".into()).is_fatal());
        assert!(!Error::DeliveryExhausted {
            channel: "webhook".into(),
            attempts: 3,
            reason: "timeout".into(),
        }
        .is_fatal());
    }

    #[test]
    fn test_delivery_exhausted_display() {
        let err = Error::DeliveryExhausted {
            channel: "webhook".into(),
            attempts: 4,
            reason: "request timed out".into(),
        };
        assert_eq!(err.to_string(), "Delivery to webhook failed after 4 attempts: request timed out");
        assert_eq!(err.code(), 2001);
    }
}
