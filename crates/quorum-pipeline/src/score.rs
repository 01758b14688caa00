use quorum_core::config::PipelineConfig;
use quorum_core::types::{RankedPost, Relevance};
use quorum_llm::{CompleteOptions, LlmGateway};
use serde::Deserialize;
use tracing::warn;

use crate::phase::PhaseOutcome;

#[derive(Debug, Deserialize)]
struct ScoreEntry {
    telegram_message_id: i64,
    score: f64,
}

/// Phase 2 — Filter + Medium Scoring. HIGH passes unconditionally, LOW is
/// dropped, MEDIUM is scored by a single LLM call. On scoring failure this
/// degrades to keeping every MEDIUM post rather than dropping them.
pub async fn run(
    gateway: &LlmGateway,
    config: &PipelineConfig,
    model: &str,
    query: &str,
    ranked: Vec<RankedPost>,
) -> PhaseOutcome<Vec<RankedPost>> {
    let (high, medium, _low): (Vec<_>, Vec<_>, Vec<_>) = partition(ranked);

    if medium.is_empty() {
        return PhaseOutcome::Completed(high);
    }

    let system = "You score how well each Telegram post answers a user question, from 0.0 to 1.0. \
        Return strict JSON: {\"scores\":[{\"telegram_message_id\":int,\"score\":number}]}.";
    let user = build_prompt(query, &medium);

    #[derive(Deserialize)]
    struct ScoreResponse {
        scores: Vec<ScoreEntry>,
    }

    let options = CompleteOptions {
        json_mode: true,
        timeout_ms: Some(30_000),
        ..Default::default()
    };

    match gateway
        .complete_json::<ScoreResponse>(model, system, &user, options)
        .await
    {
        Ok(parsed) => {
            let scores: std::collections::HashMap<i64, f64> = parsed
                .scores
                .into_iter()
                .map(|e| (e.telegram_message_id, e.score))
                .collect();

            let mut passing: Vec<(RankedPost, f64)> = medium
                .into_iter()
                .filter_map(|ranked| {
                    let score = *scores.get(&ranked.post.telegram_message_id).unwrap_or(&0.0);
                    if score >= config.medium_score_threshold {
                        Some((ranked, score))
                    } else {
                        None
                    }
                })
                .collect();
            passing.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));
            passing.truncate(config.medium_max_selected_posts);

            let mut out = high;
            out.extend(passing.into_iter().map(|(ranked, _)| ranked));
            PhaseOutcome::Completed(out)
        }
        Err(e) => {
            warn!(error = %e, "medium scoring failed, keeping all MEDIUM posts");
            let mut out = high;
            out.extend(medium);
            PhaseOutcome::Degraded(out, format!("medium scoring failed: {e}"))
        }
    }
}

fn partition(ranked: Vec<RankedPost>) -> (Vec<RankedPost>, Vec<RankedPost>, Vec<RankedPost>) {
    let mut high = Vec::new();
    let mut medium = Vec::new();
    let mut low = Vec::new();
    for r in ranked {
        match r.relevance {
            Relevance::High => high.push(r),
            Relevance::Medium => medium.push(r),
            Relevance::Low => low.push(r),
            Relevance::Context => high.push(r),
        }
    }
    (high, medium, low)
}

fn build_prompt(query: &str, medium: &[RankedPost]) -> String {
    let mut out = format!("Question: {query}\n\nCandidate posts:\n");
    for r in medium {
        out.push_str(&format!(
            "- id={} text={}\n",
            r.post.telegram_message_id,
            r.post.message_text.chars().take(500).collect::<String>()
        ));
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partition_routes_by_relevance() {
        let make = |relevance| RankedPost {
            post: quorum_core::types::Post {
                post_id: 1,
                expert_id: "e1".into(),
                channel_id: "c".into(),
                telegram_message_id: 1,
                created_at: chrono::Utc::now(),
                message_text: "x".into(),
                author_name: "a".into(),
                channel_username: "c".into(),
            },
            relevance,
            reason: String::new(),
        };
        let (high, medium, low) = partition(vec![
            make(Relevance::High),
            make(Relevance::Medium),
            make(Relevance::Low),
        ]);
        assert_eq!(high.len(), 1);
        assert_eq!(medium.len(), 1);
        assert_eq!(low.len(), 1);
    }
}
