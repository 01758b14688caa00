use std::net::SocketAddr;
use std::sync::Arc;

use tracing::{info, warn};

mod app;
mod http;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "quorum_gateway=info,tower_http=debug".into()),
        )
        .init();

    let config_path = std::env::var("QUORUM_CONFIG").ok();
    let config = quorum_core::config::QuorumConfig::load(config_path.as_deref()).unwrap_or_else(|e| {
        warn!("config load failed ({}), using defaults", e);
        quorum_core::config::QuorumConfig::default()
    });

    let store = quorum_store::Store::open(&config.database.path)?;
    let gateway = Arc::new(quorum_llm::LlmGateway::new(
        &config.providers,
        quorum_core::config::DEFAULT_MAX_QUOTA_WAIT_MS,
    ));

    // A little slack over the sidecar's own MCP timeout covers its HTTP
    // handling and network round trip, not just the tool call it wraps.
    let reddit_timeout = std::time::Duration::from_millis(config.reddit.mcp_timeout_ms + 5_000);
    let reddit_client = Some(Arc::new(quorum_orchestrator::RedditClient::new(
        config.reddit.proxy_url.clone(),
        reddit_timeout,
    )));

    let orchestrator = Arc::new(quorum_orchestrator::QueryOrchestrator::new(
        store.clone(),
        gateway.clone(),
        reddit_client,
        config.clone(),
    ));

    let bind = config.gateway.bind.clone();
    let port = config.gateway.port;
    let state = Arc::new(app::AppState {
        config,
        store,
        gateway,
        orchestrator,
    });
    let router = app::build_router(state);

    let addr: SocketAddr = format!("{bind}:{port}").parse()?;
    info!("quorum gateway listening on {}", addr);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, router).await?;

    Ok(())
}
