use std::sync::Arc;
use std::time::Instant;

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::{error, info};

use crate::aggregate::{aggregate, AggregateRequest, SortOrder, TimeRange};
use crate::cache::ResponseCache;
use crate::error::RedditError;
use crate::watchdog::Watchdog;

pub struct AppState {
    pub watchdog: Watchdog,
    pub cache: ResponseCache,
    pub started_at: Instant,
}

fn default_limit() -> usize {
    10
}
fn default_sort() -> SortOrder {
    SortOrder::Relevance
}
fn default_time() -> TimeRange {
    TimeRange::All
}

#[derive(Debug, Deserialize)]
pub struct SearchRequest {
    pub query: String,
    #[serde(default = "default_limit")]
    pub limit: usize,
    pub subreddits: Option<Vec<String>>,
    #[serde(default = "default_sort")]
    pub sort: SortOrder,
    #[serde(default = "default_time")]
    pub time: TimeRange,
}

pub fn build_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/search", post(search_handler))
        .route("/health", get(health_handler))
        .with_state(state)
        .layer(tower_http::trace::TraceLayer::new_for_http())
}

async fn search_handler(State(state): State<Arc<AppState>>, Json(body): Json<SearchRequest>) -> Response {
    if body.query.is_empty() || body.query.chars().count() > 500 {
        return (
            StatusCode::BAD_REQUEST,
            Json(json!({"error": "invalid_input", "message": "query must be 1..=500 characters"})),
        )
            .into_response();
    }
    let limit = body.limit.clamp(1, 25);

    let request = AggregateRequest {
        query: body.query,
        limit,
        subreddits: body.subreddits,
        sort: body.sort,
        time: body.time,
    };
    let cache_key = request.cache_key();

    if let Some(cached) = state.cache.get(&cache_key).await {
        return Json(cached).into_response();
    }

    match aggregate(&state.watchdog, request).await {
        Ok(response) => {
            state.cache.put(cache_key, response.clone()).await;
            Json(response).into_response()
        }
        Err(e) => {
            error!(error = %e, "reddit aggregation failed");
            (StatusCode::INTERNAL_SERVER_ERROR, Json(error_body(&e))).into_response()
        }
    }
}

fn error_body(e: &RedditError) -> serde_json::Value {
    let code = match e {
        RedditError::ChildUnavailable(_) => "mcp_unavailable",
        RedditError::Timeout(_) => "mcp_timeout",
        RedditError::Unstable => "mcp_unstable",
        RedditError::BadOutput(_) => "bad_output",
        RedditError::ToolError(_) => "tool_error",
    };
    json!({"error": code, "message": e.to_string()})
}

#[derive(Debug, Serialize)]
struct HealthResponse {
    status: &'static str,
    mcp_ready: bool,
    uptime_secs: u64,
    timestamp: chrono::DateTime<chrono::Utc>,
}

async fn health_handler(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        mcp_ready: state.watchdog.is_ready().await,
        uptime_secs: state.started_at.elapsed().as_secs(),
        timestamp: chrono::Utc::now(),
    })
}

pub fn log_startup(bind: &str, port: u16) {
    info!(bind, port, "quorum-reddit sidecar listening");
}
