use crate::api::AppState;
use crate::error::AppError;
use crate::ingest::{RunRejected, RunSummary};
use axum::{extract::State, http::StatusCode, response::IntoResponse, Json};
use serde_json::json;

pub async fn root(State(state): State<AppState>) -> impl IntoResponse {
    Json(json!({
        "name": "MSync Server",
        "version": env!("CARGO_PKG_VERSION"),
        "status": "running",
        "run_in_progress": state.coordinator.is_running(),
    }))
}

pub async fn health() -> impl IntoResponse {
    (StatusCode::OK, "OK")
}

/// `GET /api/v1/runs/latest`
pub async fn latest_run(State(state): State<AppState>) -> Result<Json<RunSummary>, AppError> {
    state
        .coordinator
        .last_summary()
        .await
        .map(Json)
        .ok_or_else(|| AppError::NotFound("No sync run has finished yet".to_string()))
}

/// `POST /api/v1/runs`
pub async fn trigger_run(State(state): State<AppState>) -> Result<impl IntoResponse, AppError> {
    match state.coordinator.try_start() {
        Ok(handle) => {
            tracing::info!(run_id = %handle.run_id, "Manual sync run started");
            Ok((
                StatusCode::ACCEPTED,
                Json(json!({ "run_id": handle.run_id })),
            ))
        },
        Err(e @ RunRejected::AlreadyRunning) => Err(AppError::Conflict(e.to_string())),
    }
}
