//! Server-specific error types
//!
//! The pipeline distinguishes four failure classes. Transport and remap
//! failures are scoped to one item or file and never abort a run. A stage
//! collision is benign. Anything else ends the run early without taking the
//! process down.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use std::path::PathBuf;
use thiserror::Error;

/// Remote connect, list, or fetch failure
#[derive(Error, Debug)]
pub enum TransportError {
    /// The remote refused this one item (missing, still being written, or
    /// any other status-level refusal). The item is retried next run.
    #[error("Remote item unavailable: {0}")]
    Unavailable(String),

    #[error("Connection error: {0}")]
    Connection(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl TransportError {
    /// Whether this failure should be logged as a warning rather than an error
    pub fn is_unavailable(&self) -> bool {
        matches!(self, TransportError::Unavailable(_))
    }
}

/// Stage move failure
#[derive(Error, Debug)]
pub enum StageError {
    /// The destination already exists. Callers treat this as benign.
    #[error("Already exists: {}", path.display())]
    AlreadyExists { path: PathBuf },

    #[error("IO error on {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl StageError {
    pub fn is_already_exists(&self) -> bool {
        matches!(self, StageError::AlreadyExists { .. })
    }
}

/// Per-file remap failure. The file stays in the changed stage.
#[derive(Error, Debug)]
pub enum RemapError {
    #[error("Parse error in {}: {message}", file.display())]
    Parse { file: PathBuf, message: String },

    #[error("Staging store error: {0}")]
    Staging(#[from] sqlx::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error(transparent)]
    Stage(#[from] StageError),
}

/// Failure that ends a run early
#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("Failed to prepare stage directories: {0}")]
    Directories(#[source] StageError),

    #[error("Ledger error on {}: {source}", path.display())]
    Ledger {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to record ledger entry {token}: {source}")]
    Record {
        token: String,
        #[source]
        source: std::io::Error,
    },

    /// The hash is recorded but its file never reached the changed stage.
    /// Later copies of this content classify as renamed.
    #[error("Content {hash} recorded but {} could not enter the changed stage: {source}", file.display())]
    Unclassified {
        file: PathBuf,
        hash: String,
        #[source]
        source: StageError,
    },

    #[error("Staging store error: {0}")]
    Staging(#[from] sqlx::Error),

    #[error("Failed to read remap query from {}: {source}", path.display())]
    RemapQuery {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Run task failed: {0}")]
    Task(String),
}

/// Status API error types
#[derive(Error, Debug)]
pub enum AppError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Internal server error: {0}")]
    Internal(String),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error_message) = match self {
            AppError::NotFound(ref message) => (StatusCode::NOT_FOUND, message.clone()),
            AppError::Conflict(ref message) => (StatusCode::CONFLICT, message.clone()),
            AppError::Internal(ref message) => {
                tracing::error!("Internal error: {}", message);
                (StatusCode::INTERNAL_SERVER_ERROR, message.clone())
            },
        };

        let body = Json(json!({
            "error": {
                "message": error_message,
                "status": status.as_u16(),
            }
        }));

        (status, body).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stage_error_already_exists() {
        let err = StageError::AlreadyExists {
            path: PathBuf::from("/data/03_renamed/a_ABC.csv"),
        };
        assert!(err.is_already_exists());
        assert!(err.to_string().contains("a_ABC.csv"));
    }

    #[test]
    fn test_transport_unavailable() {
        assert!(TransportError::Unavailable("gone".into()).is_unavailable());
        assert!(!TransportError::Connection("refused".into()).is_unavailable());
    }

    #[test]
    fn test_app_error_status_codes() {
        assert_eq!(
            AppError::NotFound("x".into()).into_response().status(),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            AppError::Conflict("x".into()).into_response().status(),
            StatusCode::CONFLICT
        );
        assert_eq!(
            AppError::Internal("x".into()).into_response().status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }
}
