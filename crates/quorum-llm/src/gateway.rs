use std::collections::HashMap;
use std::time::Duration;

use serde::de::DeserializeOwned;
use tokio::time::sleep;
use tracing::{debug, warn};

use crate::error::{GatewayError, Result};
use crate::json_repair::parse_json_mode;
use crate::keypool::KeyPool;
use crate::openai_compat::OpenAiCompatTransport;
use crate::provider::{CompleteOptions, CompleteRequest, CompleteResponse};
use crate::registry::{lookup, split_logical_model};

const BACKOFF_MIN_MS: u64 = 4_000;
const BACKOFF_MAX_MS: u64 = 60_000;
const BACKOFF_FACTOR: u64 = 2;
const TRANSPORT_MAX_RETRIES: u32 = 3;

struct ProviderBinding {
    keys: KeyPool,
    base_url: Option<String>,
}

/// The uniform call surface named by the external contract:
/// `Complete(model, system, user, options) -> {text, usage}`. Owns one
/// [`KeyPool`] per configured provider and the single HTTP transport they
/// all share.
pub struct LlmGateway {
    bindings: HashMap<String, ProviderBinding>,
    transport: OpenAiCompatTransport,
    max_quota_wait_ms: u64,
}

impl LlmGateway {
    pub fn new(providers: &quorum_core::config::ProvidersConfig, max_quota_wait_ms: u64) -> Self {
        let mut bindings = HashMap::new();
        if let Some(cfg) = &providers.openrouter {
            bindings.insert(
                "openrouter".to_string(),
                ProviderBinding {
                    keys: KeyPool::new(cfg.keys.clone()),
                    base_url: cfg.base_url.clone(),
                },
            );
        }
        if let Some(cfg) = &providers.gemini {
            bindings.insert(
                "gemini".to_string(),
                ProviderBinding {
                    keys: KeyPool::new(cfg.keys.clone()),
                    base_url: cfg.base_url.clone(),
                },
            );
        }
        if let Some(cfg) = &providers.openai_compat {
            bindings.insert(
                "openai_compat".to_string(),
                ProviderBinding {
                    keys: KeyPool::new(cfg.keys.clone()),
                    base_url: cfg.base_url.clone(),
                },
            );
        }
        Self {
            bindings,
            transport: OpenAiCompatTransport::new(),
            max_quota_wait_ms,
        }
    }

    pub async fn complete(
        &self,
        model: &str,
        system: &str,
        user: &str,
        options: CompleteOptions,
    ) -> Result<CompleteResponse> {
        let (provider_id, model_name) = split_logical_model(model)
            .ok_or_else(|| GatewayError::UnknownModel(model.to_string()))?;
        let known = lookup(provider_id).ok_or_else(|| GatewayError::UnknownModel(model.to_string()))?;
        let binding = self
            .bindings
            .get(provider_id)
            .ok_or_else(|| GatewayError::UnknownModel(model.to_string()))?;

        let endpoint = known.endpoint(binding.base_url.as_deref());
        let request = CompleteRequest {
            model: model_name.to_string(),
            system: system.to_string(),
            user: user.to_string(),
            options,
        };

        let mut waited_for_quota = false;
        let mut delay_ms = BACKOFF_MIN_MS;

        for attempt in 1..=TRANSPORT_MAX_RETRIES {
            let Some((key_idx, api_key)) = binding.keys.next_key() else {
                if waited_for_quota {
                    return Err(GatewayError::QuotaExhausted(provider_id.to_string()));
                }
                warn!(provider = provider_id, "all keys exhausted, waiting for replenishment");
                sleep(Duration::from_millis(self.max_quota_wait_ms)).await;
                waited_for_quota = true;
                continue;
            };
            let api_key = api_key.to_string();

            match self.transport.send(&endpoint, &api_key, &request).await {
                Ok(response) => return Ok(response),
                Err(GatewayError::RateLimited { retry_after_ms }) => {
                    debug!(provider = provider_id, key_idx, retry_after_ms, "key rate limited, rotating");
                    binding
                        .keys
                        .mark_exhausted(key_idx, Duration::from_millis(retry_after_ms));
                    continue;
                }
                Err(GatewayError::Transport(e)) if attempt < TRANSPORT_MAX_RETRIES => {
                    warn!(provider = provider_id, attempt, error = %e, delay_ms, "transport error, retrying");
                    sleep(Duration::from_millis(delay_ms)).await;
                    delay_ms = (delay_ms * BACKOFF_FACTOR).min(BACKOFF_MAX_MS);
                }
                Err(GatewayError::Api { status, message }) if status >= 500 && attempt < TRANSPORT_MAX_RETRIES => {
                    warn!(provider = provider_id, attempt, status, delay_ms, "5xx, retrying");
                    let _ = message;
                    sleep(Duration::from_millis(delay_ms)).await;
                    delay_ms = (delay_ms * BACKOFF_FACTOR).min(BACKOFF_MAX_MS);
                }
                Err(other) => return Err(other),
            }
        }

        if binding.keys.all_exhausted() {
            Err(GatewayError::QuotaExhausted(provider_id.to_string()))
        } else {
            Err(GatewayError::RetriesExhausted(provider_id.to_string()))
        }
    }

    /// Convenience wrapper for `json_mode` calls: runs [`Self::complete`]
    /// then [`parse_json_mode`] against the returned text.
    pub async fn complete_json<T: DeserializeOwned>(
        &self,
        model: &str,
        system: &str,
        user: &str,
        mut options: CompleteOptions,
    ) -> Result<T> {
        options.json_mode = true;
        let response = self.complete(model, system, user, options).await?;
        parse_json_mode(&response.text)
    }
}
