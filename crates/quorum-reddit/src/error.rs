use thiserror::Error;

#[derive(Debug, Error)]
pub enum RedditError {
    #[error("mcp child unavailable: {0}")]
    ChildUnavailable(String),
    #[error("tool call timed out after {0}ms")]
    Timeout(u64),
    #[error("mcp child exceeded its restart budget")]
    Unstable,
    #[error("tool returned malformed output: {0}")]
    BadOutput(String),
    #[error("tool error: {0}")]
    ToolError(String),
}

pub type Result<T> = std::result::Result<T, RedditError>;
