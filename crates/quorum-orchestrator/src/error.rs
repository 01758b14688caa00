use thiserror::Error;

#[derive(Debug, Error)]
pub enum OrchestratorError {
    #[error("invalid input: {0}")]
    InvalidInput(String),
    #[error("no experts available for this query")]
    NoExpertsAvailable,
    #[error("request deadline exceeded")]
    Deadline,
    #[error(transparent)]
    Store(#[from] quorum_store::StoreError),
}

impl From<OrchestratorError> for quorum_core::QuorumError {
    fn from(e: OrchestratorError) -> Self {
        match e {
            OrchestratorError::InvalidInput(m) => quorum_core::QuorumError::InvalidInput(m),
            OrchestratorError::NoExpertsAvailable => quorum_core::QuorumError::NoExpertsAvailable,
            OrchestratorError::Deadline => quorum_core::QuorumError::Deadline("180s".to_string()),
            OrchestratorError::Store(e) => quorum_core::QuorumError::Storage(e.to_string()),
        }
    }
}

pub type Result<T> = std::result::Result<T, OrchestratorError>;
