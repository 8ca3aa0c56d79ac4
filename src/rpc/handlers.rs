//! Request handlers.

use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::ApiState;
use crate::monitoring::{HealthSnapshot, MetricsSnapshot, SystemSnapshot, Verdict};

// ═══════════════════════════════════════════════════════════════════════════════
// RESPONSE TYPES
// ═══════════════════════════════════════════════════════════════════════════════

/// Envelope for every non-health response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiResponse<T> {
    /// Whether the request succeeded
    pub success: bool,
    /// Payload on success
    pub data: Option<T>,
    /// Message on failure
    pub error: Option<String>,
}

impl<T: Serialize> ApiResponse<T> {
    /// Successful response
    pub fn ok(data: T) -> Self {
        Self { success: true, data: Some(data), error: None }
    }

    /// Failed response
    pub fn err(msg: impl Into<String>) -> Self {
        Self { success: false, data: None, error: Some(msg.into()) }
    }
}

/// Body of `GET /health`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthSummary {
    /// Overall verdict
    pub verdict: Verdict,
    /// Configured services
    pub services_total: usize,
    /// Services currently healthy
    pub services_healthy: usize,
    /// Services neither healthy nor unknown
    pub failing: Vec<String>,
    /// Snapshot generation
    pub generation: u64,
    /// When the snapshot was computed
    pub generated_at: DateTime<Utc>,
}

impl From<&SystemSnapshot> for HealthSummary {
    fn from(snapshot: &SystemSnapshot) -> Self {
        Self {
            verdict: snapshot.verdict,
            services_total: snapshot.services.len(),
            services_healthy: snapshot.healthy_count(),
            failing: snapshot
                .services
                .values()
                .filter(|s| s.state.is_failing())
                .map(|s| s.name.clone())
                .collect(),
            generation: snapshot.generation,
            generated_at: snapshot.generated_at,
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// HANDLERS
// ═══════════════════════════════════════════════════════════════════════════════

/// Verdict summary, 503 while critical
pub(super) async fn health(State(state): State<Arc<ApiState>>) -> impl IntoResponse {
    let snapshot = state.aggregator.snapshot();
    let status = match snapshot.verdict {
        Verdict::Critical => StatusCode::SERVICE_UNAVAILABLE,
        Verdict::Healthy | Verdict::Degraded => StatusCode::OK,
    };

    (status, Json(HealthSummary::from(snapshot.as_ref())))
}

/// Full system snapshot
pub(super) async fn snapshot(State(state): State<Arc<ApiState>>) -> impl IntoResponse {
    let snapshot = state.aggregator.snapshot();
    Json(ApiResponse::ok(snapshot.as_ref().clone()))
}

/// One service snapshot
pub(super) async fn service(
    State(state): State<Arc<ApiState>>,
    Path(name): Path<String>,
) -> impl IntoResponse {
    let snapshot = state.aggregator.snapshot();

    match snapshot.service(&name) {
        Some(service) => (StatusCode::OK, Json(ApiResponse::ok(service.clone()))),
        None => (
            StatusCode::NOT_FOUND,
            Json(ApiResponse::<HealthSnapshot>::err(format!("Service not found: {}", name))),
        ),
    }
}

/// Monitor counters
pub(super) async fn metrics(State(state): State<Arc<ApiState>>) -> impl IntoResponse {
    Json(ApiResponse::<MetricsSnapshot>::ok(state.metrics.snapshot()))
}
