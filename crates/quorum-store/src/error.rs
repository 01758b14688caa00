use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
    #[error("blocking task panicked: {0}")]
    Join(#[from] tokio::task::JoinError),
    #[error("drift row rejected: {0}")]
    BadDrift(String),
    #[error("not found: {0}")]
    NotFound(String),
}

impl From<StoreError> for quorum_core::QuorumError {
    fn from(e: StoreError) -> Self {
        quorum_core::QuorumError::Storage(e.to_string())
    }
}

pub type Result<T> = std::result::Result<T, StoreError>;
