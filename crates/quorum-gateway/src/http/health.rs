use std::sync::Arc;

use axum::extract::State;
use axum::Json;
use serde::Serialize;

use crate::app::AppState;

#[derive(Debug, Serialize)]
pub(crate) struct HealthResponse {
    status: &'static str,
    database: &'static str,
    llm_configured: bool,
    timestamp: chrono::DateTime<chrono::Utc>,
}

/// `GET /health` — liveness probe. `database` reflects a real round trip,
/// not just "the connection object exists".
pub async fn health_handler(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    let database = match state.store.list_experts().await {
        Ok(_) => "ok",
        Err(_) => "error",
    };
    let providers = &state.config.providers;
    let llm_configured = providers.openrouter.is_some() || providers.gemini.is_some() || providers.openai_compat.is_some();

    Json(HealthResponse {
        status: "ok",
        database,
        llm_configured,
        timestamp: chrono::Utc::now(),
    })
}
