use quorum_core::types::{Confidence, Language, RankedPost, Relevance};
use quorum_llm::lang::language_directive;
use quorum_llm::{CompleteOptions, LlmGateway};
use serde::Deserialize;

use crate::error::PipelineError;

#[derive(Debug, Clone, Deserialize)]
pub struct ReduceOutput {
    pub answer: String,
    pub main_sources: Vec<i64>,
    pub confidence: Confidence,
    pub has_expert_comments: bool,
    pub language: Language,
}

fn ordering_rank(relevance: Relevance) -> u8 {
    match relevance {
        Relevance::High => 0,
        Relevance::Medium => 1,
        Relevance::Context => 2,
        Relevance::Low => 3,
    }
}

/// Order enriched posts HIGH before MEDIUM before CONTEXT, then by
/// recency (newest first within a tier).
fn ordered_posts(mut posts: Vec<RankedPost>) -> Vec<RankedPost> {
    posts.sort_by(|a, b| {
        ordering_rank(a.relevance)
            .cmp(&ordering_rank(b.relevance))
            .then(b.post.created_at.cmp(&a.post.created_at))
    });
    posts
}

fn length_directive(count: usize) -> &'static str {
    if count <= 3 {
        "Be concise — a short, direct answer."
    } else if count >= 10 {
        "Be comprehensive — cover the range of posts provided."
    } else {
        "Answer at a moderate length proportional to the input."
    }
}

/// Phase 4 — Reduce. MAP/REDUCE failures are fatal for this expert, so this
/// returns a hard [`Result`] rather than a [`PhaseOutcome`] — there is no
/// graceful degradation path named by the contract.
pub async fn run(
    gateway: &LlmGateway,
    model: &str,
    query: &str,
    query_language: Language,
    enriched: Vec<RankedPost>,
) -> Result<(ReduceOutput, Vec<RankedPost>), PipelineError> {
    let ordered = ordered_posts(enriched);

    let system = format!(
        "You answer questions using only the provided Telegram posts. Every non-trivial \
         claim must carry an inline [post:ID] citation referencing a post id from the input. \
         {}\n{}\n\
         Return strict JSON: {{\"answer\":string,\"main_sources\":[int],\
         \"confidence\":\"HIGH\"|\"MEDIUM\"|\"LOW\",\"has_expert_comments\":bool,\
         \"language\":\"ru\"|\"en\"}}.",
        language_directive(query_language),
        length_directive(ordered.len())
    );
    let user = build_prompt(query, &ordered);

    let options = CompleteOptions {
        json_mode: true,
        timeout_ms: Some(30_000),
        ..Default::default()
    };

    let output: ReduceOutput = gateway
        .complete_json(model, &system, &user, options)
        .await?;

    Ok((output, ordered))
}

fn build_prompt(query: &str, posts: &[RankedPost]) -> String {
    let mut out = format!("Question: {query}\n\nPosts (ordered by relevance then recency):\n");
    for r in posts {
        out.push_str(&format!(
            "- id={} relevance={:?} text={}\n",
            r.post.telegram_message_id,
            r.relevance,
            r.post.message_text.chars().take(800).collect::<String>()
        ));
    }
    out
}
