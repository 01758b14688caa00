use std::time::Duration;

use quorum_core::types::RedditResponse;
use tracing::warn;

/// Thin HTTP client to the Reddit sidecar's `POST /search`. The sidecar is a
/// fully separate process (own Watchdog, own MCP child) — this client only
/// knows its URL and treats every failure as "no Reddit insights this time"
/// per the documented failure semantics; it never surfaces a hard error to
/// the orchestrator.
pub struct RedditClient {
    http: reqwest::Client,
    base_url: String,
}

#[derive(serde::Serialize)]
struct SearchRequest<'a> {
    query: &'a str,
}

impl RedditClient {
    pub fn new(base_url: String, timeout: Duration) -> Self {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .unwrap_or_default();
        Self { http, base_url }
    }

    pub async fn search(&self, query: &str) -> Option<RedditResponse> {
        let url = format!("{}/search", self.base_url.trim_end_matches('/'));
        match self.http.post(&url).json(&SearchRequest { query }).send().await {
            Ok(resp) if resp.status().is_success() => match resp.json::<RedditResponse>().await {
                Ok(body) => Some(body),
                Err(e) => {
                    warn!(error = %e, "reddit sidecar returned an unparsable body");
                    None
                }
            },
            Ok(resp) => {
                warn!(status = %resp.status(), "reddit sidecar returned an error status");
                None
            }
            Err(e) => {
                warn!(error = %e, "reddit sidecar unreachable");
                None
            }
        }
    }
}
