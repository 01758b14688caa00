use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::Result;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Usage {
    pub prompt_tokens: u32,
    pub completion_tokens: u32,
}

#[derive(Debug, Clone, Default)]
pub struct CompleteOptions {
    pub json_mode: bool,
    pub temperature: Option<f32>,
    pub max_tokens: Option<u32>,
    pub timeout_ms: Option<u64>,
}

#[derive(Debug, Clone)]
pub struct CompleteRequest {
    pub model: String,
    pub system: String,
    pub user: String,
    pub options: CompleteOptions,
}

#[derive(Debug, Clone)]
pub struct CompleteResponse {
    pub text: String,
    pub usage: Usage,
}

/// The single call surface the rest of the workspace depends on:
/// `Complete(model, system, user, options) -> {text, usage}`. Concrete
/// providers (OpenRouter, Gemini, any OpenAI-compatible endpoint) implement
/// this without the caller needing to know which one is behind a logical
/// model name.
#[async_trait]
pub trait LlmProvider: Send + Sync {
    async fn complete(&self, request: CompleteRequest) -> Result<CompleteResponse>;

    /// Identifier used in logs and error messages.
    fn name(&self) -> &str;
}
