use quorum_core::types::Language;
use quorum_llm::lang::detect_language;
use quorum_llm::{CompleteOptions, LlmGateway};

use crate::phase::PhaseOutcome;

/// Phase 5 — Language Validation. Re-renders the answer when it drifted
/// into the wrong script relative to the expected response language;
/// skipped when the answer already reads as the expected language with
/// high confidence.
pub async fn run(
    gateway: &LlmGateway,
    model: &str,
    expected: Language,
    answer: String,
) -> PhaseOutcome<String> {
    let (detected, confident) = detect_language(&answer);
    if confident && detected == expected {
        return PhaseOutcome::Skipped(answer, "answer already matches expected language".to_string());
    }

    let system = format!(
        "Re-render the following answer in {} while preserving every [post:ID] citation \
         verbatim and preserving any metaphors or examples. Do not add or drop citations.",
        match expected {
            Language::En => "English",
            Language::Ru => "Russian",
        }
    );

    let options = CompleteOptions {
        json_mode: false,
        timeout_ms: Some(30_000),
        ..Default::default()
    };

    match gateway.complete(model, &system, &answer, options).await {
        Ok(response) => PhaseOutcome::Completed(response.text),
        Err(e) => PhaseOutcome::Degraded(answer, format!("language validation failed: {e}")),
    }
}
