use std::convert::Infallible;
use std::sync::Arc;

use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use axum::response::sse::{Event, Sse};
use axum::response::{IntoResponse, Response};
use axum::Json;
use quorum_core::config::GatewayConfig;
use quorum_core::types::{ProgressEventType, Query, QueryRequest};
use quorum_orchestrator::{encode_event, keepalive_padding, SseLine};
use serde_json::json;
use tokio_stream::StreamExt;

use crate::app::AppState;

fn check_admin_secret(headers: &HeaderMap, gateway: &GatewayConfig) -> Result<(), Response> {
    let Some(expected) = &gateway.admin_secret else {
        return Ok(());
    };
    let provided = headers.get("X-Admin-Secret").and_then(|v| v.to_str().ok());
    if provided == Some(expected.as_str()) {
        Ok(())
    } else {
        Err((
            StatusCode::UNAUTHORIZED,
            Json(json!({"error": "unauthorized", "message": "missing or invalid X-Admin-Secret"})),
        )
            .into_response())
    }
}

/// `POST /api/v1/query` — the one operation the rest of the system exists
/// to serve. `stream_progress` chooses between an SSE stream of
/// [`quorum_orchestrator::SseLine`]s terminated by `complete`, or a single
/// JSON `MultiExpertResponse` assembled by draining that same stream here.
pub async fn query_handler(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(body): Json<QueryRequest>,
) -> Response {
    if let Err(unauthorized) = check_admin_secret(&headers, &state.config.gateway) {
        return unauthorized;
    }

    let query = match Query::from_request(body) {
        Ok(q) => q,
        Err(e) => {
            return (
                StatusCode::BAD_REQUEST,
                Json(json!({"error": e.code(), "message": e.user_message()})),
            )
                .into_response();
        }
    };

    if query.stream_progress {
        stream_response(state, query)
    } else {
        collect_response(state, query).await
    }
}

fn stream_response(state: Arc<AppState>, query: Query) -> Response {
    let stream = state.orchestrator.clone().run(query).map(|line| {
        let event = match line {
            SseLine::Data(event) => Event::default().data(encode_event(&event)),
            SseLine::KeepAlive => Event::default().comment("keepalive").data(keepalive_padding()),
        };
        Ok::<Event, Infallible>(event)
    });
    // Keep-alive lines are already produced by the orchestrator's own
    // stream (2KB padding on a 5s idle timer) — axum's built-in keep-alive
    // layer would only add a second, uncoordinated heartbeat on top.
    Sse::new(stream).into_response()
}

async fn collect_response(state: Arc<AppState>, query: Query) -> Response {
    let mut stream = Box::pin(state.orchestrator.clone().run(query));
    let mut response = None;
    while let Some(line) = stream.next().await {
        if let SseLine::Data(event) = line {
            if matches!(event.event_type, ProgressEventType::Complete) {
                response = event.data.and_then(|d| d.get("response").cloned());
                break;
            }
        }
    }
    match response {
        Some(value) => Json(value).into_response(),
        None => (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(json!({"error": "internal", "message": "orchestrator ended without a complete event"})),
        )
            .into_response(),
    }
}
