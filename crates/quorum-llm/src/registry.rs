//! Built-in provider registry — maps the provider bindings this system is
//! allowed to use to their API endpoints. Unlike a generic gateway, this
//! list is intentionally short: the spec names exactly three bindings.

pub struct KnownProvider {
    pub id: &'static str,
    pub name: &'static str,
    pub base_url: &'static str,
    pub chat_path: &'static str,
}

impl KnownProvider {
    pub fn endpoint(&self, base_url_override: Option<&str>) -> String {
        format!(
            "{}{}",
            base_url_override.unwrap_or(self.base_url),
            self.chat_path
        )
    }
}

pub const KNOWN_PROVIDERS: &[KnownProvider] = &[
    KnownProvider {
        id: "openrouter",
        name: "OpenRouter",
        base_url: "https://openrouter.ai/api",
        chat_path: "/v1/chat/completions",
    },
    KnownProvider {
        id: "gemini",
        name: "Google AI (Gemini)",
        base_url: "https://generativelanguage.googleapis.com/v1beta/openai",
        chat_path: "/chat/completions",
    },
    KnownProvider {
        id: "openai_compat",
        name: "OpenAI-compatible",
        base_url: "https://api.openai.com",
        chat_path: "/v1/chat/completions",
    },
];

pub fn lookup(id: &str) -> Option<&'static KnownProvider> {
    KNOWN_PROVIDERS.iter().find(|p| p.id == id)
}

/// A logical model name is `"<provider_id>/<model>"`, e.g.
/// `"openrouter/anthropic/claude-3.5-sonnet"`. Splits on the first `/`.
pub fn split_logical_model(logical: &str) -> Option<(&str, &str)> {
    logical.split_once('/')
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn splits_provider_and_model() {
        let (provider, model) = split_logical_model("openrouter/anthropic/claude-3.5-sonnet").unwrap();
        assert_eq!(provider, "openrouter");
        assert_eq!(model, "anthropic/claude-3.5-sonnet");
    }

    #[test]
    fn lookup_finds_known_provider() {
        assert!(lookup("gemini").is_some());
        assert!(lookup("not-a-provider").is_none());
    }
}
