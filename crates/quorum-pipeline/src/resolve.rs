use chrono::{DateTime, Utc};
use quorum_core::types::{RankedPost, Relevance};
use quorum_store::Store;

use crate::phase::PhaseOutcome;

/// Phase 3 — Resolve. Pure SQL link expansion, no LLM. Newly discovered
/// posts are labelled `CONTEXT`; originals keep their Phase 1/2 relevance.
/// Never fails outright — an empty expansion is a legitimate, completed
/// outcome rather than a degradation.
pub async fn run(
    store: &Store,
    expert_id: &str,
    depth: u32,
    since: Option<DateTime<Utc>>,
    surviving: Vec<RankedPost>,
) -> PhaseOutcome<Vec<RankedPost>> {
    let post_ids: Vec<i64> = surviving.iter().map(|r| r.post.post_id).collect();

    match store.expand_links(post_ids, expert_id, depth, since).await {
        Ok(expanded) => {
            let mut out = surviving;
            let known: std::collections::HashSet<i64> =
                out.iter().map(|r| r.post.post_id).collect();
            for post in expanded {
                if !known.contains(&post.post_id) {
                    out.push(RankedPost {
                        post,
                        relevance: Relevance::Context,
                        reason: "pulled in via link expansion".to_string(),
                    });
                }
            }
            PhaseOutcome::Completed(out)
        }
        Err(e) => PhaseOutcome::Degraded(surviving, format!("link expansion failed: {e}")),
    }
}
