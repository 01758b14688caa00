use std::sync::Arc;

use axum::routing::{get, post};
use axum::Router;
use quorum_core::config::QuorumConfig;
use quorum_llm::LlmGateway;
use quorum_orchestrator::QueryOrchestrator;
use quorum_store::Store;

/// Central shared state — passed as `Arc<AppState>` to every handler.
pub struct AppState {
    pub config: QuorumConfig,
    pub store: Store,
    pub gateway: Arc<LlmGateway>,
    pub orchestrator: Arc<QueryOrchestrator>,
}

pub fn build_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(crate::http::health::health_handler))
        .route("/api/v1/query", post(crate::http::query::query_handler))
        .route("/api/v1/experts", get(crate::http::experts::experts_handler))
        .route("/api/v1/posts/{post_id}", get(crate::http::posts::post_handler))
        .route("/api/v1/log-batch", post(crate::http::log_batch::log_batch_handler))
        .with_state(state)
        .layer(tower_http::trace::TraceLayer::new_for_http())
}
