//! Input validation utilities.
//!
//! Used while turning a configuration file into validated descriptors and
//! settings. Each helper names the service and field it rejects.

use std::time::Duration;

use reqwest::Url;

use crate::error::{Error, Result};

// ═══════════════════════════════════════════════════════════════════════════════
// NAME VALIDATION
// ═══════════════════════════════════════════════════════════════════════════════

/// Validate a service name: non-empty, ASCII alphanumerics plus `-`, `_`, `.`
pub fn validate_service_name(name: &str) -> Result<()> {
    if name.trim().is_empty() {
        return Err(Error::descriptor("<unnamed>", "name", "must not be empty"));
    }

    if let Some(bad) = name
        .chars()
        .find(|c| !(c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.')))
    {
        return Err(Error::descriptor(
            name,
            "name",
            format!("contains invalid character '{}'", bad),
        ));
    }

    Ok(())
}

// ═══════════════════════════════════════════════════════════════════════════════
// URL VALIDATION
// ═══════════════════════════════════════════════════════════════════════════════

/// Parse and validate an http(s) URL
pub fn parse_http_url(raw: &str) -> std::result::Result<Url, String> {
    let url = Url::parse(raw.trim()).map_err(|e| format!("is not a valid URL ({})", e))?;

    match url.scheme() {
        "http" | "https" => {}
        other => return Err(format!("has unsupported scheme '{}'", other)),
    }

    if url.host_str().map_or(true, str::is_empty) {
        return Err("has no host".into());
    }

    Ok(url)
}

/// Validate a service endpoint URL
pub fn validate_endpoint(service: &str, raw: &str) -> Result<Url> {
    parse_http_url(raw).map_err(|reason| Error::descriptor(service, "url", reason))
}

// ═══════════════════════════════════════════════════════════════════════════════
// NUMERIC VALIDATION
// ═══════════════════════════════════════════════════════════════════════════════

/// Validate that a duration is non-zero
pub fn validate_non_zero_duration(service: &str, field: &str, value: Duration) -> Result<()> {
    if value.is_zero() {
        return Err(Error::descriptor(service, field, "must be greater than zero"));
    }
    Ok(())
}

/// Validate that a threshold is at least one
pub fn validate_threshold(service: &str, field: &str, value: u32) -> Result<()> {
    if value == 0 {
        return Err(Error::descriptor(service, field, "must be at least 1"));
    }
    Ok(())
}

// ═══════════════════════════════════════════════════════════════════════════════
// ADDRESS VALIDATION
// ═══════════════════════════════════════════════════════════════════════════════

/// Very small sanity check for an email address (`local@domain`)
pub fn is_plausible_email(address: &str) -> bool {
    match address.trim().split_once('@') {
        Some((local, domain)) => {
            !local.is_empty() && !domain.is_empty() && !domain.contains('@') && domain.contains('.')
        }
        None => false,
    }
}
