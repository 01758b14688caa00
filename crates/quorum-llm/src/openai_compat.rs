use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::error::{GatewayError, Result};
use crate::provider::{CompleteRequest, CompleteResponse, Usage};

/// The wire shape shared by OpenRouter, Gemini's OpenAI-compatible
/// endpoint, and any other OpenAI-style `/chat/completions` provider.
/// Separated from [`crate::provider::LlmProvider`] because key selection
/// and retry live one layer up, in [`crate::gateway::LlmGateway`] — this
/// struct only knows how to make one HTTP call.
pub struct OpenAiCompatTransport {
    client: reqwest::Client,
}

impl OpenAiCompatTransport {
    pub fn new() -> Self {
        Self {
            client: reqwest::Client::new(),
        }
    }

    pub async fn send(
        &self,
        endpoint: &str,
        api_key: &str,
        request: &CompleteRequest,
    ) -> Result<CompleteResponse> {
        let body = ChatCompletionRequest {
            model: request.model.clone(),
            messages: vec![
                ChatMessage {
                    role: "system".to_string(),
                    content: request.system.clone(),
                },
                ChatMessage {
                    role: "user".to_string(),
                    content: request.user.clone(),
                },
            ],
            temperature: request.options.temperature,
            max_tokens: request.options.max_tokens,
            response_format: request
                .options
                .json_mode
                .then(|| ResponseFormat { format_type: "json_object".to_string() }),
        };

        let timeout = Duration::from_millis(request.options.timeout_ms.unwrap_or(30_000));

        let response = self
            .client
            .post(endpoint)
            .bearer_auth(api_key)
            .json(&body)
            .timeout(timeout)
            .send()
            .await?;

        let status = response.status();

        if status.as_u16() == 429 {
            let retry_after_ms = response
                .headers()
                .get("retry-after")
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.parse::<u64>().ok())
                .map(|secs| secs * 1000)
                .unwrap_or(4_000);
            return Err(GatewayError::RateLimited { retry_after_ms });
        }

        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(GatewayError::Api {
                status: status.as_u16(),
                message,
            });
        }

        let parsed: ChatCompletionResponse = response.json().await?;
        let choice = parsed
            .choices
            .into_iter()
            .next()
            .ok_or_else(|| GatewayError::Api {
                status: status.as_u16(),
                message: "provider returned no choices".to_string(),
            })?;

        Ok(CompleteResponse {
            text: choice.message.content,
            usage: Usage {
                prompt_tokens: parsed.usage.as_ref().map(|u| u.prompt_tokens).unwrap_or(0),
                completion_tokens: parsed
                    .usage
                    .as_ref()
                    .map(|u| u.completion_tokens)
                    .unwrap_or(0),
            },
        })
    }
}

impl Default for OpenAiCompatTransport {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Serialize)]
struct ChatCompletionRequest {
    model: String,
    messages: Vec<ChatMessage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none", rename = "response_format")]
    response_format: Option<ResponseFormat>,
}

#[derive(Serialize)]
struct ResponseFormat {
    #[serde(rename = "type")]
    format_type: String,
}

#[derive(Serialize, Deserialize)]
struct ChatMessage {
    role: String,
    content: String,
}

#[derive(Deserialize)]
struct ChatCompletionResponse {
    choices: Vec<Choice>,
    usage: Option<UsageWire>,
}

#[derive(Deserialize)]
struct Choice {
    message: ChatMessage,
}

#[derive(Deserialize)]
struct UsageWire {
    prompt_tokens: u32,
    completion_tokens: u32,
}
