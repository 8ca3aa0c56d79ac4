//! Snapshot HTTP API.
//!
//! Read-only JSON endpoints over the latest published [`SystemSnapshot`]:
//!
//! - `GET /health`: verdict summary, `503` while the verdict is `Critical`
//! - `GET /snapshot`: the full system snapshot
//! - `GET /services/:name`: one service, `404` if unknown
//! - `GET /metrics`: monitor counters
//!
//! Handlers never touch tracker locks; every request is served from the
//! aggregator's published snapshot.
//!
//! [`SystemSnapshot`]: crate::monitoring::SystemSnapshot

mod handlers;

pub use handlers::{ApiResponse, HealthSummary};

use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;

use axum::{routing::get, Router};
use tokio::net::TcpListener;
use tower_http::{
    compression::CompressionLayer,
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};
use tracing::info;

use crate::error::Result;
use crate::monitoring::{Aggregator, MonitorMetrics};

// ═══════════════════════════════════════════════════════════════════════════════
// SERVER STATE
// ═══════════════════════════════════════════════════════════════════════════════

/// Shared handler state
#[derive(Debug, Clone)]
pub struct ApiState {
    /// Source of published snapshots
    pub aggregator: Arc<Aggregator>,
    /// Monitor counters
    pub metrics: Arc<MonitorMetrics>,
}

impl ApiState {
    /// Create state
    pub fn new(aggregator: Arc<Aggregator>, metrics: Arc<MonitorMetrics>) -> Self {
        Self { aggregator, metrics }
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// ROUTER
// ═══════════════════════════════════════════════════════════════════════════════

/// Build the API router
pub fn router(state: ApiState) -> Router {
    Router::new()
        .route("/health", get(handlers::health))
        .route("/snapshot", get(handlers::snapshot))
        .route("/services/:name", get(handlers::service))
        .route("/metrics", get(handlers::metrics))
        .layer(TraceLayer::new_for_http())
        .layer(CompressionLayer::new())
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .with_state(Arc::new(state))
}

/// Serve the API on `addr` until `shutdown` resolves
pub async fn serve<F>(addr: SocketAddr, state: ApiState, shutdown: F) -> Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    let listener = TcpListener::bind(addr).await?;
    info!(%addr, "snapshot API listening");
    info!("  GET  /health          - Verdict summary");
    info!("  GET  /snapshot        - Full system snapshot");
    info!("  GET  /services/:name  - One service");
    info!("  GET  /metrics         - Monitor counters");

    axum::serve(listener, router(state))
        .with_graceful_shutdown(shutdown)
        .await?;

    info!("snapshot API stopped");
    Ok(())
}
