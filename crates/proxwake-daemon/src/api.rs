//! Read-only HTTP status endpoint.
//!
//! - `health` - Liveness check
//! - `status` - Controller phase, counters, and last wake

use std::net::SocketAddr;

use axum::routing::get;
use axum::Router;
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;
use tracing::info;

use crate::state::SharedState;

pub mod health;
pub mod status;

/// Creates the router with all endpoints.
///
/// # Route Structure
///
/// ```text
/// /health          - Health check
/// /api
/// └── /status      - Controller status snapshot
/// ```
pub fn create_router(state: SharedState) -> Router {
    Router::new()
        .nest("/health", health::router())
        .nest("/api", Router::new().route("/status", get(status::get_status)))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Serve the status endpoint until the task is dropped.
///
/// # Errors
///
/// Returns an error if the listener cannot bind or the server fails.
pub async fn serve(bind: SocketAddr, state: SharedState) -> anyhow::Result<()> {
    let listener = TcpListener::bind(bind).await?;
    info!(addr = %listener.local_addr()?, "Status endpoint listening");
    axum::serve(listener, create_router(state)).await?;
    Ok(())
}
