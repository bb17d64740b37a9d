//! Liveness and metrics endpoints.

use axum::{Json, Router, extract::State, routing::get};
use azp_scaler::{MetricsSnapshot, ScalerMetrics};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::sync::watch;
use tracing::info;

/// Create the health router.
pub fn create_router(metrics: Arc<ScalerMetrics>) -> Router {
    Router::new()
        .route("/healthz", get(healthz))
        .route("/metrics", get(metrics_snapshot))
        .with_state(metrics)
}

async fn healthz() -> &'static str {
    "OK"
}

async fn metrics_snapshot(State(metrics): State<Arc<ScalerMetrics>>) -> Json<MetricsSnapshot> {
    Json(metrics.snapshot())
}

/// Serve the router until shutdown is signalled.
pub async fn serve(
    port: u16,
    router: Router,
    mut shutdown: watch::Receiver<bool>,
) -> std::io::Result<()> {
    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!(%addr, "Serving health checks");

    axum::serve(listener, router)
        .with_graceful_shutdown(async move {
            let _ = shutdown.wait_for(|stop| *stop).await;
        })
        .await
}
