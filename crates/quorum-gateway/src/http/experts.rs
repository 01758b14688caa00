use std::sync::Arc;

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;

use crate::app::AppState;

/// `GET /api/v1/experts` → the corpus's expert roster with post/comment
/// counts, used by clients to populate an `expert_filter` picker.
pub async fn experts_handler(State(state): State<Arc<AppState>>) -> Response {
    match state.store.list_experts().await {
        Ok(experts) => Json(experts).into_response(),
        Err(e) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(json!({"error": "internal", "message": e.to_string()})),
        )
            .into_response(),
    }
}
