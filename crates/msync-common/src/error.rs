//! Error types shared across the workspace

use thiserror::Error;

/// Result type alias for common operations
pub type Result<T> = std::result::Result<T, MsyncError>;

/// Error raised by the shared utilities
#[derive(Error, Debug)]
pub enum MsyncError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl MsyncError {
    /// Whether the underlying cause is a missing file
    pub fn is_not_found(&self) -> bool {
        match self {
            MsyncError::Io(e) => e.kind() == std::io::ErrorKind::NotFound,
        }
    }
}
