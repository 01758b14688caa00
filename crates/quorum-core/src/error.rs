use thiserror::Error;

/// Top-level error type shared across the workspace.
///
/// Each variant maps to one of the error kinds named in the external
/// interface contract; `.code()` returns the machine-readable kind and
/// `.user_message()` the string that is safe to hand back to a client.
#[derive(Debug, Error)]
pub enum QuorumError {
    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("all provider keys exhausted")]
    QuotaExhausted,

    #[error("model returned malformed output: {0}")]
    BadJson(String),

    #[error("deadline exceeded: {0}")]
    Deadline(String),

    #[error("expert pipeline failed: {0}")]
    ExpertFailure(String),

    #[error("no experts available for this query")]
    NoExpertsAvailable,

    #[error("reddit sidecar unavailable: {0}")]
    RedditUnavailable(String),

    #[error("config error: {0}")]
    Config(String),

    #[error("storage error: {0}")]
    Storage(String),

    #[error("internal error: {0}")]
    Internal(String),
}

impl QuorumError {
    /// Machine-readable kind, stable across releases.
    pub fn code(&self) -> &'static str {
        match self {
            QuorumError::InvalidInput(_) => "invalid_input",
            QuorumError::QuotaExhausted => "quota_exhausted",
            QuorumError::BadJson(_) => "bad_json",
            QuorumError::Deadline(_) => "deadline",
            QuorumError::ExpertFailure(_) => "expert_failure",
            QuorumError::NoExpertsAvailable => "no_experts_available",
            QuorumError::RedditUnavailable(_) => "reddit_unavailable",
            QuorumError::Config(_) => "internal",
            QuorumError::Storage(_) => "internal",
            QuorumError::Internal(_) => "internal",
        }
    }

    /// Label safe to show to an end user; never includes internals.
    pub fn user_message(&self) -> &'static str {
        match self {
            QuorumError::InvalidInput(_) => "bad request",
            QuorumError::QuotaExhausted => "temporarily unavailable",
            QuorumError::BadJson(_) => "model returned malformed output",
            QuorumError::Deadline(_) => "request took too long",
            QuorumError::ExpertFailure(_) => "partial results",
            QuorumError::NoExpertsAvailable => "service temporarily unavailable",
            QuorumError::RedditUnavailable(_) => "",
            QuorumError::Config(_) => "internal error",
            QuorumError::Storage(_) => "internal error",
            QuorumError::Internal(_) => "internal error",
        }
    }
}

pub type Result<T> = std::result::Result<T, QuorumError>;
