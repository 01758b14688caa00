use quorum_core::types::{CommentGroupBlock, GroupWithAnchor, Relevance};
use quorum_llm::{CompleteOptions, LlmGateway};
use serde::Deserialize;
use tracing::warn;

use crate::phase::PhaseOutcome;

const GROUP_CHUNK_SIZE: usize = 25;

#[derive(Debug, Deserialize)]
struct GroupScoreEntry {
    post_id: i64,
    relevance: Relevance,
    #[serde(default)]
    reason: String,
}

#[derive(Debug, Deserialize)]
struct GroupScoreResponse {
    groups: Vec<GroupScoreEntry>,
}

/// Phase 6 — Comment-Group Map. Scores each candidate group's drift topics
/// against the query, keeping HIGH and MEDIUM. Groups are already
/// pre-filtered by the store query to exclude anchors in the relevant-post
/// set (Invariant 3); this phase only ranks what's left.
pub async fn map_groups(
    gateway: &LlmGateway,
    model: &str,
    query: &str,
    groups: Vec<GroupWithAnchor>,
) -> PhaseOutcome<Vec<GroupWithAnchor>> {
    if groups.is_empty() {
        return PhaseOutcome::Completed(Vec::new());
    }

    let mut kept = Vec::new();
    let mut degraded = false;

    for chunk in groups.chunks(GROUP_CHUNK_SIZE) {
        let system = "You score how relevant each comment group's drift topics are to a \
            user question. Return strict JSON: \
            {\"groups\":[{\"post_id\":int,\"relevance\":\"HIGH\"|\"MEDIUM\"|\"LOW\",\"reason\":string}]}.";
        let user = build_prompt(query, chunk);

        let options = CompleteOptions {
            json_mode: true,
            timeout_ms: Some(30_000),
            ..Default::default()
        };

        match gateway
            .complete_json::<GroupScoreResponse>(model, system, &user, options)
            .await
        {
            Ok(parsed) => {
                let by_id: std::collections::HashMap<i64, GroupScoreEntry> = parsed
                    .groups
                    .into_iter()
                    .map(|e| (e.post_id, e))
                    .collect();
                for group in chunk {
                    if let Some(entry) = by_id.get(&group.anchor.post_id) {
                        if matches!(entry.relevance, Relevance::High | Relevance::Medium) {
                            kept.push(group.clone());
                        }
                    }
                }
            }
            Err(e) => {
                warn!(error = %e, "comment-group scoring failed for a chunk, skipping it");
                degraded = true;
            }
        }
    }

    if degraded {
        PhaseOutcome::Degraded(kept, "one or more comment-group chunks failed to score".to_string())
    } else {
        PhaseOutcome::Completed(kept)
    }
}

fn build_prompt(query: &str, groups: &[GroupWithAnchor]) -> String {
    let mut out = format!("Question: {query}\n\nCandidate comment groups:\n");
    for g in groups {
        let topics = g
            .drift
            .drift_topics
            .drift_topics
            .iter()
            .map(|t| t.topic.as_str())
            .collect::<Vec<_>>()
            .join(", ");
        out.push_str(&format!(
            "- post_id={} anchor_text={} topics=[{}]\n",
            g.anchor.post_id,
            g.anchor.message_text.chars().take(300).collect::<String>(),
            topics
        ));
    }
    out
}

/// Phase 7 — Comment Synthesis. Summarizes how surviving comment groups
/// complement the main answer without restating it. Skipped entirely when
/// no groups survived Phase 6.
pub async fn synthesize(
    gateway: &LlmGateway,
    model: &str,
    query: &str,
    main_answer: &str,
    groups: Vec<GroupWithAnchor>,
) -> PhaseOutcome<Option<CommentGroupBlock>> {
    if groups.is_empty() {
        return PhaseOutcome::Skipped(None, "no comment groups survived Phase 6".to_string());
    }

    let group_count = groups.len();
    let system = "Summarize how the following comment-discussion groups complement the main \
        answer, without restating it. Use [post:ID] references. Output free-form markdown.";
    let user = build_synthesis_prompt(query, main_answer, &groups);

    let options = CompleteOptions {
        json_mode: false,
        timeout_ms: Some(30_000),
        ..Default::default()
    };

    match gateway.complete(model, system, &user, options).await {
        Ok(response) => PhaseOutcome::Completed(Some(CommentGroupBlock {
            synthesis: response.text,
            group_count,
        })),
        Err(e) => PhaseOutcome::Degraded(None, format!("comment synthesis failed: {e}")),
    }
}

fn build_synthesis_prompt(query: &str, main_answer: &str, groups: &[GroupWithAnchor]) -> String {
    let mut out = format!(
        "Question: {query}\n\nMain answer:\n{main_answer}\n\nComment groups:\n"
    );
    for g in groups {
        out.push_str(&format!(
            "- anchor post_id={} text={}\n",
            g.anchor.post_id,
            g.anchor.message_text.chars().take(300).collect::<String>()
        ));
    }
    out
}
