//! Axum server setup and router configuration.

use crate::api::{admin, webhook};
use crate::state::AppState;
use axum::{Json, Router, response::IntoResponse, routing::get, routing::post};
use serde::Serialize;
use std::net::SocketAddr;
use tokio::net::TcpListener;
use tower::limit::ConcurrencyLimitLayer;

/// Concurrent in-flight ingest requests before callers queue. The gateway
/// is write-heavy; this keeps a burst of provider retries from exhausting
/// the pool.
const INGEST_CONCURRENCY: usize = 256;

/// Build the main application router.
pub fn build_router(state: AppState) -> Router {
    let ingest = Router::new()
        .route(
            "/webhooks/transactions",
            post(webhook::receive_transaction_webhook),
        )
        .layer(ConcurrencyLimitLayer::new(INGEST_CONCURRENCY));

    Router::new()
        .route("/health", get(health_check))
        .merge(ingest)
        .nest("/admin", admin::router())
        .with_state(state)
}

/// Health check response.
#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    version: &'static str,
}

/// Simple health check - returns OK if the server is running.
async fn health_check() -> impl IntoResponse {
    Json(HealthResponse {
        status: "healthy",
        version: env!("CARGO_PKG_VERSION"),
    })
}

/// Run the server until the shutdown future resolves.
pub async fn run_server(
    router: Router,
    addr: SocketAddr,
    shutdown: impl Future<Output = ()> + Send + 'static,
) -> Result<(), std::io::Error> {
    let listener = TcpListener::bind(addr).await?;
    tracing::info!("Server listening on {}", addr);

    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown)
        .await
}
