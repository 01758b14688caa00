use std::sync::Arc;

use axum::extract::{Path, Query as AxumQuery, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use quorum_core::types::{Comment, Post};
use quorum_llm::lang::detect_language;
use quorum_llm::CompleteOptions;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::warn;

use crate::app::AppState;

#[derive(Debug, Deserialize)]
pub struct PostQueryParams {
    expert_id: String,
    query: Option<String>,
    #[serde(default)]
    translate: bool,
}

#[derive(Debug, Serialize)]
struct PostDetailResponse {
    post: Post,
    comments: Vec<Comment>,
    translated_text: Option<String>,
}

const TRANSLATION_SYSTEM_PROMPT: &str =
    "Translate the given text to English. Output only the translated text, nothing else.";

/// `GET /api/v1/posts/{post_id}` — full post with its comments. Optional
/// on-demand translation: only attempted when the caller asks for it and
/// `query` reads confidently as English, matching the rest of the corpus's
/// "don't translate unless there's evidence the reader wants English"
/// policy. Translation failure degrades to `translated_text: null`, never
/// a 500 — the post itself is still the answer to the request.
pub async fn post_handler(
    State(state): State<Arc<AppState>>,
    Path(post_id): Path<i64>,
    AxumQuery(params): AxumQuery<PostQueryParams>,
) -> Response {
    let post = match state.store.get_post(post_id, &params.expert_id).await {
        Ok(Some(post)) => post,
        Ok(None) => {
            return (
                StatusCode::NOT_FOUND,
                Json(json!({"error": "not_found", "message": "no such post for this expert"})),
            )
                .into_response();
        }
        Err(e) => {
            return (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({"error": "internal", "message": e.to_string()})),
            )
                .into_response();
        }
    };

    let comments = match state.store.comments_for_post(post_id).await {
        Ok(comments) => comments,
        Err(e) => {
            return (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({"error": "internal", "message": e.to_string()})),
            )
                .into_response();
        }
    };

    let wants_translation = params.translate
        && params
            .query
            .as_deref()
            .map(|q| detect_language(q) == (quorum_core::types::Language::En, true))
            .unwrap_or(false);

    let translated_text = if wants_translation {
        translate(&state, &post.message_text).await
    } else {
        None
    };

    Json(PostDetailResponse {
        post,
        comments,
        translated_text,
    })
    .into_response()
}

async fn translate(state: &AppState, text: &str) -> Option<String> {
    let model = &state.config.models.analysis;
    match state
        .gateway
        .complete(model, TRANSLATION_SYSTEM_PROMPT, text, CompleteOptions::default())
        .await
    {
        Ok(response) => Some(response.text),
        Err(e) => {
            warn!(error = %e, "on-demand translation failed");
            None
        }
    }
}
