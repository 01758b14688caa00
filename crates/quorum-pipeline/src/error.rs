use thiserror::Error;

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error(transparent)]
    Llm(#[from] quorum_llm::GatewayError),
    #[error(transparent)]
    Store(#[from] quorum_store::StoreError),
    #[error("phase {phase} failed: {message}")]
    PhaseFailed { phase: &'static str, message: String },
}

impl From<PipelineError> for quorum_core::QuorumError {
    fn from(e: PipelineError) -> Self {
        quorum_core::QuorumError::ExpertFailure(e.to_string())
    }
}

pub type Result<T> = std::result::Result<T, PipelineError>;
