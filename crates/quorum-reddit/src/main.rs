use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};

use tracing::warn;

mod aggregate;
mod cache;
mod error;
mod http;
mod mcp_client;
mod watchdog;

use cache::ResponseCache;
use http::AppState;
use watchdog::Watchdog;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "quorum_reddit=info".into()),
        )
        .init();

    let config_path = std::env::var("QUORUM_CONFIG").ok();
    let config = quorum_core::config::QuorumConfig::load(config_path.as_deref()).unwrap_or_else(|e| {
        warn!("config load failed ({}), using defaults", e);
        quorum_core::config::QuorumConfig::default()
    });
    let reddit = config.reddit;

    let (bind, port) = parse_bind(&reddit.proxy_url);

    let watchdog = Watchdog::new(
        reddit.mcp_command.clone(),
        reddit.mcp_args.clone(),
        Duration::from_millis(reddit.mcp_timeout_ms),
        Duration::from_millis(reddit.mcp_force_cleanup_ms),
        reddit.mcp_restart_budget,
    );
    let cache = ResponseCache::new(reddit.cache_capacity, Duration::from_millis(reddit.cache_ttl_ms));

    let state = Arc::new(AppState {
        watchdog,
        cache,
        started_at: Instant::now(),
    });
    let router = http::build_router(state);

    let addr: SocketAddr = format!("{bind}:{port}").parse()?;
    http::log_startup(&bind, port);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, router).await?;
    Ok(())
}

/// Pull `host:port` out of the configured proxy URL — the sidecar binds
/// to the same address the orchestrator is configured to call.
fn parse_bind(proxy_url: &str) -> (String, u16) {
    let without_scheme = proxy_url.splitn(2, "://").nth(1).unwrap_or(proxy_url);
    let mut parts = without_scheme.trim_end_matches('/').splitn(2, ':');
    let host = parts.next().unwrap_or("127.0.0.1").to_string();
    let port = parts.next().and_then(|p| p.parse().ok()).unwrap_or(8090);
    (host, port)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_host_and_port_from_proxy_url() {
        assert_eq!(parse_bind("http://127.0.0.1:8090"), ("127.0.0.1".to_string(), 8090));
        assert_eq!(parse_bind("http://0.0.0.0:9999/"), ("0.0.0.0".to_string(), 9999));
    }
}
