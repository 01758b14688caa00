use thiserror::Error;

#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("provider returned {status}: {message}")]
    Api { status: u16, message: String },
    #[error("rate limited, retry after {retry_after_ms}ms")]
    RateLimited { retry_after_ms: u64 },
    #[error("all keys exhausted for provider {0}")]
    QuotaExhausted(String),
    #[error("model returned malformed json even after repair: {0}")]
    BadJson(String),
    #[error("call timed out after {0}ms")]
    Timeout(u64),
    #[error("unknown logical model: {0}")]
    UnknownModel(String),
    #[error("transport retries exhausted for provider {0}")]
    RetriesExhausted(String),
}

impl From<GatewayError> for quorum_core::QuorumError {
    fn from(e: GatewayError) -> Self {
        match e {
            GatewayError::QuotaExhausted(_) => quorum_core::QuorumError::QuotaExhausted,
            GatewayError::BadJson(msg) => quorum_core::QuorumError::BadJson(msg),
            GatewayError::Timeout(ms) => {
                quorum_core::QuorumError::Deadline(format!("llm call exceeded {ms}ms"))
            }
            other => quorum_core::QuorumError::Internal(other.to_string()),
        }
    }
}

pub type Result<T> = std::result::Result<T, GatewayError>;
