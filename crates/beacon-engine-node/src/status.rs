//! HTTP status endpoint: `GET /stats` and `GET /health`

use std::net::SocketAddr;
use std::sync::Arc;

use axum::extract::State;
use axum::routing::get;
use axum::{Json, Router};
use beacon_engine_consensus::{StatsCollector, StatsSnapshot};
use beacon_engine_core::Shutdown;
use serde::Serialize;
use tower_http::trace::TraceLayer;
use tracing::info;

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub running: bool,
}

/// GET /stats - Current engine counters
pub async fn get_stats(State(stats): State<Arc<StatsCollector>>) -> Json<StatsSnapshot> {
    Json(stats.snapshot().await)
}

/// GET /health - Liveness
pub async fn get_health(State(stats): State<Arc<StatsCollector>>) -> Json<HealthResponse> {
    let running = stats.snapshot().await.running;
    Json(HealthResponse {
        status: "ok",
        running,
    })
}

pub fn create_router(stats: Arc<StatsCollector>) -> Router {
    Router::new()
        .route("/stats", get(get_stats))
        .route("/health", get(get_health))
        .layer(TraceLayer::new_for_http())
        .with_state(stats)
}

/// Serve the status endpoint until shutdown
pub async fn serve(
    addr: SocketAddr,
    stats: Arc<StatsCollector>,
    shutdown: Shutdown,
) -> Result<(), std::io::Error> {
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!("Status endpoint listening on {}", listener.local_addr()?);

    axum::serve(listener, create_router(stats))
        .with_graceful_shutdown(async move { shutdown.wait().await })
        .await
}
