use std::collections::HashSet;
use std::sync::Arc;
use std::time::Instant;

use chrono::{Duration as ChronoDuration, Utc};
use quorum_core::config::{ModelsConfig, PipelineConfig};
use quorum_core::types::{
    CommentGroupBlock, Expert, ExpertResponse, ProgressEvent, ProgressEventType, Query, Relevance,
};
use quorum_llm::lang::detect_language;
use quorum_llm::LlmGateway;
use quorum_store::Store;
use tracing::info;

use crate::error::{PipelineError, Result};
use crate::progress::ProgressSink;
use crate::{comments, map, reduce, resolve, score, validate};

/// Runs the full 7-phase pipeline for exactly one expert. `INIT -> MAP ->
/// SCORE -> RESOLVE -> REDUCE -> VALIDATE -> (COMMENT_MAP -> COMMENT_SYNTH)?
/// -> DONE`, with `FAILED` reachable from any state. MAP/SCORE/RESOLVE
/// degrade in place (see their modules); only REDUCE failure aborts this
/// expert's pipeline.
pub struct ExpertPipeline {
    store: Store,
    gateway: Arc<LlmGateway>,
    pipeline_config: PipelineConfig,
    models: ModelsConfig,
    sink: ProgressSink,
}

impl ExpertPipeline {
    pub fn new(
        store: Store,
        gateway: Arc<LlmGateway>,
        pipeline_config: PipelineConfig,
        models: ModelsConfig,
        sink: ProgressSink,
    ) -> Self {
        Self {
            store,
            gateway,
            pipeline_config,
            models,
            sink,
        }
    }

    fn emit(&self, event_type: ProgressEventType, phase: &str, status: &str, message: &str, expert_id: &str) {
        (self.sink)(
            ProgressEvent::new(event_type, phase, status, message).with_expert(expert_id),
        );
    }

    pub async fn run(&self, query: &Query, expert: &Expert) -> Result<ExpertResponse> {
        let started = Instant::now();
        let expert_id = expert.expert_id.as_str();
        let since = query
            .use_recent_only
            .then(|| Utc::now() - ChronoDuration::days(self.pipeline_config.recent_cutoff_days));

        // MAP
        self.emit(ProgressEventType::PhaseStart, "map", "running", "ranking posts", expert_id);
        let posts = self
            .store
            .posts_for_expert(expert_id, since)
            .await
            .map_err(PipelineError::from)?;
        let posts = if let Some(max) = query.max_posts {
            posts.into_iter().take(max.max(0) as usize).collect()
        } else {
            posts
        };
        let map_outcome = map::run(
            self.gateway.clone(),
            &self.pipeline_config,
            &self.models.map,
            &query.query,
            posts,
        )
        .await;
        let ranked = self.unwrap_outcome(map_outcome, "map", expert_id);
        self.emit(ProgressEventType::PhaseComplete, "map", "done", "posts ranked", expert_id);

        // Phase 1's relevant-post-id set (HIGH ∪ MEDIUM), used later to
        // exclude these posts' own comment groups from Phase 6's candidate
        // set (Invariant 4) — captured before SCORE consumes `ranked`.
        let relevant_post_ids: Vec<i64> = ranked
            .iter()
            .filter(|r| matches!(r.relevance, Relevance::High | Relevance::Medium))
            .map(|r| r.post.post_id)
            .collect();

        // SCORE
        self.emit(ProgressEventType::PhaseStart, "score", "running", "scoring medium posts", expert_id);
        let score_outcome = score::run(
            &self.gateway,
            &self.pipeline_config,
            &self.models.medium_scoring,
            &query.query,
            ranked,
        )
        .await;
        let surviving = self.unwrap_outcome(score_outcome, "score", expert_id);
        self.emit(ProgressEventType::PhaseComplete, "score", "done", "medium posts scored", expert_id);

        // RESOLVE
        self.emit(ProgressEventType::PhaseStart, "resolve", "running", "expanding links", expert_id);
        let resolve_outcome = resolve::run(
            &self.store,
            expert_id,
            self.pipeline_config.resolve_depth,
            since,
            surviving,
        )
        .await;
        let enriched = self.unwrap_outcome(resolve_outcome, "resolve", expert_id);
        self.emit(ProgressEventType::PhaseComplete, "resolve", "done", "links expanded", expert_id);

        // REDUCE — fatal on failure
        self.emit(ProgressEventType::PhaseStart, "reduce", "running", "synthesizing answer", expert_id);
        let (query_language, _) = detect_language(&query.query);
        let posts_analyzed = enriched.len();
        let enriched_ids: HashSet<i64> = enriched.iter().map(|r| r.post.telegram_message_id).collect();
        let (reduce_output, ordered) = reduce::run(
            &self.gateway,
            &self.models.analysis,
            &query.query,
            query_language,
            enriched,
        )
        .await
        .map_err(|e| {
            self.emit(
                ProgressEventType::ExpertError,
                "reduce",
                "failed",
                &e.to_string(),
                expert_id,
            );
            e
        })?;
        let _ = ordered;
        self.emit(ProgressEventType::PhaseComplete, "reduce", "done", "answer synthesized", expert_id);

        let main_sources = filter_main_sources(reduce_output.main_sources, &enriched_ids);

        // VALIDATE
        self.emit(ProgressEventType::PhaseStart, "validate", "running", "checking response language", expert_id);
        let validate_outcome = validate::run(
            &self.gateway,
            &self.models.analysis,
            query_language,
            reduce_output.answer,
        )
        .await;
        let answer = self.unwrap_outcome(validate_outcome, "validate", expert_id);
        self.emit(ProgressEventType::PhaseComplete, "validate", "done", "language validated", expert_id);

        // COMMENT_MAP / COMMENT_SYNTH — only when requested
        let comment_groups = if query.include_comment_groups {
            self.emit(ProgressEventType::PhaseStart, "comment_map", "running", "scoring comment groups", expert_id);
            let groups = self
                .store
                .drift_groups_for_expert(expert_id, relevant_post_ids, since)
                .await
                .map_err(PipelineError::from)?;
            let map_outcome = comments::map_groups(&self.gateway, &self.models.drift_analysis, &query.query, groups).await;
            let kept = self.unwrap_outcome(map_outcome, "comment_map", expert_id);
            self.emit(ProgressEventType::PhaseComplete, "comment_map", "done", "comment groups scored", expert_id);

            self.emit(ProgressEventType::PhaseStart, "comment_synth", "running", "synthesizing comment insights", expert_id);
            let synth_outcome =
                comments::synthesize(&self.gateway, &self.models.synthesis, &query.query, &answer, kept).await;
            let block: Option<CommentGroupBlock> = self.unwrap_outcome(synth_outcome, "comment_synth", expert_id);
            self.emit(ProgressEventType::PhaseComplete, "comment_synth", "done", "comment insights ready", expert_id);
            block
        } else {
            None
        };

        info!(expert_id, posts_analyzed, "expert pipeline done");

        Ok(ExpertResponse {
            expert_id: expert.expert_id.clone(),
            display_name: expert.display_name.clone(),
            answer,
            main_sources,
            confidence: reduce_output.confidence,
            posts_analyzed,
            processing_time_ms: started.elapsed().as_millis() as u64,
            language: query_language,
            has_expert_comments: comment_groups.is_some(),
            comment_groups,
        })
    }

    /// Degraded/Skipped outcomes are logged and their carried value used;
    /// there is no error path here because [`crate::phase::PhaseOutcome`]
    /// already encodes every non-fatal failure as data.
    fn unwrap_outcome<T>(&self, outcome: crate::phase::PhaseOutcome<T>, phase: &str, expert_id: &str) -> T {
        if let Some(reason) = outcome.into_degraded_reason() {
            self.emit(ProgressEventType::Progress, phase, "degraded", reason, expert_id);
        }
        outcome.into_value()
    }
}

/// Keeps `main_sources` a subset of the ids Reduce actually saw
/// (Invariant 2/3) without further restricting it to only ids the answer
/// text inline-cites — citation soundness and the main-sources subset are
/// independent invariants.
fn filter_main_sources(claimed: Vec<i64>, enriched_ids: &HashSet<i64>) -> Vec<i64> {
    claimed.into_iter().filter(|id| enriched_ids.contains(id)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn drops_ids_outside_the_enriched_set() {
        let enriched: HashSet<i64> = [1, 2, 3].into_iter().collect();
        let kept = filter_main_sources(vec![1, 3, 99, -1], &enriched);
        assert_eq!(kept, vec![1, 3]);
    }

    #[test]
    fn keeps_order_and_allows_empty_result() {
        let enriched: HashSet<i64> = [5].into_iter().collect();
        assert_eq!(filter_main_sources(vec![1, 2], &enriched), Vec::<i64>::new());
        assert_eq!(filter_main_sources(vec![5, 5], &enriched), vec![5, 5]);
    }
}
