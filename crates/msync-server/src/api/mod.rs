//! Status API
//!
//! A small operational surface next to the scheduler: liveness, the last
//! run's summary, and a manual trigger that honors the single-flight guard.

pub mod routes;

use crate::config::ServerConfig;
use crate::ingest::RunCoordinator;
use axum::{
    routing::{get, post},
    Router,
};
use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::trace::TraceLayer;

#[derive(Clone)]
pub struct AppState {
    pub coordinator: Arc<RunCoordinator>,
}

pub fn create_router(state: AppState) -> Router {
    let api_v1 = Router::new()
        .route("/runs", post(routes::trigger_run))
        .route("/runs/latest", get(routes::latest_run));

    Router::new()
        .route("/", get(routes::root))
        .route("/health", get(routes::health))
        .nest("/api/v1", api_v1)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Serve until `shutdown` resolves
pub async fn serve(
    config: &ServerConfig,
    state: AppState,
    shutdown: impl Future<Output = ()> + Send + 'static,
) -> anyhow::Result<()> {
    let app = create_router(state);

    let addr: SocketAddr = format!("{}:{}", config.host, config.port).parse()?;
    tracing::info!("Status API listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown)
        .await?;

    Ok(())
}
