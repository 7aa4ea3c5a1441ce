use rollcall::RollcallError;
use thiserror::Error;

/// Everything that makes a sync attempt fail. The host sees one failure
/// signal regardless of the variant.
#[derive(Error, Debug, Clone)]
pub enum SyncError {
    #[error("Store error: {0}")]
    Store(#[from] RollcallError),

    #[error("Failed to reach backend: {0}")]
    Transport(String),

    #[error("Backend rejected sync with status {status}")]
    Rejected { status: u16 },

    #[error("Failed to serialize records: {0}")]
    Serialization(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Background task failed: {0}")]
    Task(String),
}

impl From<tokio::task::JoinError> for SyncError {
    fn from(e: tokio::task::JoinError) -> Self {
        SyncError::Task(e.to_string())
    }
}
