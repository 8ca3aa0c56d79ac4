//! HTTP health probe.

use std::time::{Duration, Instant};

use async_trait::async_trait;
use chrono::Utc;
use reqwest::Client;
use tracing::debug;

use super::{Probe, ProbeErrorKind, ProbeResult};
use crate::core::descriptor::ServiceDescriptor;
use crate::error::{Error, Result};
use crate::utils::constants::{MAX_PAYLOAD_BYTES, PROBE_USER_AGENT};

/// Probe that issues `GET <url>` and expects a 2xx answer
#[derive(Debug, Clone)]
pub struct HttpProbe {
    client: Client,
}

impl HttpProbe {
    /// Create probe with its own connection pool
    pub fn new() -> Result<Self> {
        let client = Client::builder()
            .user_agent(PROBE_USER_AGENT)
            .build()
            .map_err(|e| Error::HttpClient(format!("Failed to create probe client: {}", e)))?;

        Ok(Self { client })
    }

    /// Create probe on top of an existing client
    pub fn with_client(client: Client) -> Self {
        Self { client }
    }

    /// Read the status and body; without `expect_json` only the kept prefix is read
    async fn fetch(
        &self,
        descriptor: &ServiceDescriptor,
    ) -> std::result::Result<(u16, Vec<u8>), (ProbeErrorKind, String, Option<u16>)> {
        let mut response = self
            .client
            .get(descriptor.url().clone())
            .timeout(descriptor.timeout())
            .send()
            .await
            .map_err(|e| (classify_transport(&e), e.to_string(), None))?;

        let status = response.status().as_u16();

        if descriptor.expect_json() {
            let body = response.bytes().await.map_err(|e| read_error(status, &e))?;
            return Ok((status, body.to_vec()));
        }

        let mut body = Vec::new();
        while body.len() < MAX_PAYLOAD_BYTES {
            match response.chunk().await.map_err(|e| read_error(status, &e))? {
                Some(chunk) => body.extend_from_slice(&chunk),
                None => break,
            }
        }

        Ok((status, body))
    }
}

#[async_trait]
impl Probe for HttpProbe {
    async fn probe(&self, descriptor: &ServiceDescriptor) -> ProbeResult {
        let name = descriptor.name();
        let timestamp = Utc::now();
        let started = Instant::now();

        let fetched = tokio::time::timeout(descriptor.timeout(), self.fetch(descriptor)).await;
        let latency = started.elapsed();

        let result = match fetched {
            Err(_) => ProbeResult::failure(
                name,
                ProbeErrorKind::Timeout,
                format!("no response within {:?}", descriptor.timeout()),
            ),
            Ok(Err((kind, detail, status))) => {
                let result = ProbeResult::failure(name, kind, detail);
                match status {
                    Some(status) => result.with_status(status),
                    None => result,
                }
            }
            Ok(Ok((status, body))) => evaluate(descriptor, status, &body, latency),
        };

        debug!(
            service = %name,
            success = result.is_success(),
            status = ?result.status,
            latency_ms = latency.as_millis() as u64,
            "probe finished"
        );

        result.at(timestamp)
    }
}

fn classify_transport(err: &reqwest::Error) -> ProbeErrorKind {
    if err.is_timeout() {
        ProbeErrorKind::Timeout
    } else if err.is_decode() || err.is_body() {
        ProbeErrorKind::MalformedResponse
    } else {
        ProbeErrorKind::ConnectionRefused
    }
}

fn read_error(status: u16, err: &reqwest::Error) -> (ProbeErrorKind, String, Option<u16>) {
    let kind = if err.is_timeout() {
        ProbeErrorKind::Timeout
    } else {
        ProbeErrorKind::MalformedResponse
    };
    (kind, format!("failed to read body: {}", err), Some(status))
}

fn evaluate(descriptor: &ServiceDescriptor, status: u16, body: &[u8], latency: Duration) -> ProbeResult {
    let name = descriptor.name();
    let payload = String::from_utf8_lossy(body);

    if !(200..300).contains(&status) {
        return ProbeResult::failure(
            name,
            ProbeErrorKind::UnexpectedStatus,
            format!("HTTP {}", status),
        )
        .with_status(status)
        .with_payload(&payload);
    }

    if descriptor.expect_json() {
        let parsed = std::str::from_utf8(body)
            .map_err(|e| format!("body is not UTF-8: {}", e))
            .and_then(|text| {
                serde_json::from_str::<serde_json::Value>(text).map_err(|e| format!("body is not JSON: {}", e))
            });

        if let Err(detail) = parsed {
            return ProbeResult::failure(name, ProbeErrorKind::MalformedResponse, detail)
                .with_status(status)
                .with_payload(&payload);
        }
    }

    ProbeResult::success(name, latency)
        .with_latency_budget(descriptor.latency_budget())
        .with_status(status)
        .with_payload(&payload)
}
