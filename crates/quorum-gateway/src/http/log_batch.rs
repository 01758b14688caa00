use axum::Json;
use serde::Deserialize;
use serde_json::Value;
use tracing::info;

#[derive(Debug, Deserialize)]
pub struct LogBatch {
    events: Vec<Value>,
}

/// `POST /api/v1/log-batch` — client-side log events for UI debugging,
/// re-emitted through the same structured logging the rest of the
/// process uses rather than stashed anywhere durable.
pub async fn log_batch_handler(Json(batch): Json<LogBatch>) -> Json<Value> {
    for event in &batch.events {
        info!(target: "quorum_gateway::client", event = %event, "client log event");
    }
    Json(serde_json::json!({"accepted": batch.events.len()}))
}
