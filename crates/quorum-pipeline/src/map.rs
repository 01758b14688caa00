use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use quorum_core::config::PipelineConfig;
use quorum_core::types::{Post, RankedPost, Relevance};
use quorum_llm::{CompleteOptions, LlmGateway};
use serde::Deserialize;
use tokio::sync::mpsc;
use tokio::time::sleep;
use tracing::warn;

use crate::phase::PhaseOutcome;

const CHUNK_RETRY_BASE_MS: u64 = 500;

#[derive(Debug, Deserialize)]
struct MapChunkResponse {
    relevant_posts: Vec<MapChunkEntry>,
    #[allow(dead_code)]
    #[serde(default)]
    chunk_summary: String,
}

#[derive(Debug, Deserialize)]
struct MapChunkEntry {
    telegram_message_id: i64,
    relevance: Relevance,
    #[serde(default)]
    reason: String,
}

pub struct MapChunkJob {
    index: usize,
    posts: Vec<Post>,
}

/// Output of one chunk call: either a labelled set or a hard failure to be
/// retried in the global pass.
enum ChunkResult {
    Ok(usize, Vec<RankedPost>),
    Failed(usize, Vec<Post>),
}

async fn call_chunk(
    gateway: &LlmGateway,
    model: &str,
    query: &str,
    posts: &[Post],
    max_retries: u32,
) -> std::result::Result<Vec<RankedPost>, ()> {
    let system = "You rank Telegram posts by relevance to a user question. \
        Return strict JSON: {\"relevant_posts\":[{\"telegram_message_id\":int,\"relevance\":\"HIGH\"|\"MEDIUM\"|\"LOW\",\"reason\":string}],\"chunk_summary\":string}. \
        Label every post in the input, do not omit any.";
    let user = build_chunk_prompt(query, posts);

    let mut delay_ms = CHUNK_RETRY_BASE_MS;
    for attempt in 1..=max_retries {
        let options = CompleteOptions {
            json_mode: true,
            timeout_ms: Some(30_000),
            ..Default::default()
        };
        match gateway.complete_json::<MapChunkResponse>(model, system, &user, options).await {
            Ok(parsed) => {
                let by_id: HashMap<i64, MapChunkEntry> = parsed
                    .relevant_posts
                    .into_iter()
                    .map(|e| (e.telegram_message_id, e))
                    .collect();
                let ranked = posts
                    .iter()
                    .map(|post| {
                        if let Some(entry) = by_id.get(&post.telegram_message_id) {
                            RankedPost {
                                post: post.clone(),
                                relevance: entry.relevance,
                                reason: entry.reason.clone(),
                            }
                        } else {
                            RankedPost {
                                post: post.clone(),
                                relevance: Relevance::Low,
                                reason: "not labeled by model, defaulting to LOW".to_string(),
                            }
                        }
                    })
                    .collect();
                return Ok(ranked);
            }
            Err(e) if attempt < max_retries => {
                warn!(attempt, error = %e, "map chunk call failed, retrying");
                sleep(Duration::from_millis(delay_ms)).await;
                delay_ms *= 2;
            }
            Err(e) => {
                warn!(error = %e, "map chunk call exhausted retries");
                return Err(());
            }
        }
    }
    Err(())
}

fn build_chunk_prompt(query: &str, posts: &[Post]) -> String {
    let mut out = format!("Question: {query}\n\nPosts:\n");
    for post in posts {
        out.push_str(&format!(
            "- id={} text={}\n",
            post.telegram_message_id,
            post.message_text.chars().take(500).collect::<String>()
        ));
    }
    out
}

/// Phase 1 — Map. Partitions `posts` into chunks, fans them out over a
/// bounded worker pool (never `await` inside the chunking loop itself —
/// chunks are pushed onto a channel and `map_max_parallel` workers drain
/// it), retries failed chunks individually, then makes one global retry
/// pass over chunks that never succeeded before defaulting them to LOW.
pub async fn run(
    gateway: Arc<LlmGateway>,
    config: &PipelineConfig,
    model: &str,
    query: &str,
    posts: Vec<Post>,
) -> PhaseOutcome<Vec<RankedPost>> {
    if posts.is_empty() {
        return PhaseOutcome::Completed(Vec::new());
    }

    let chunks: Vec<Vec<Post>> = posts
        .chunks(config.map_chunk_size)
        .map(|c| c.to_vec())
        .collect();

    let (job_tx, job_rx) = mpsc::channel::<MapChunkJob>(chunks.len());
    let (result_tx, mut result_rx) = mpsc::channel::<ChunkResult>(chunks.len());

    for (index, posts) in chunks.iter().cloned().enumerate() {
        let _ = job_tx.send(MapChunkJob { index, posts }).await;
    }
    drop(job_tx);

    let job_rx = Arc::new(tokio::sync::Mutex::new(job_rx));
    let worker_count = config.map_max_parallel.min(chunks.len()).max(1);
    let mut workers = Vec::with_capacity(worker_count);

    for _ in 0..worker_count {
        let job_rx = job_rx.clone();
        let result_tx = result_tx.clone();
        let gateway = gateway.clone();
        let model = model.to_string();
        let query = query.to_string();
        let max_retries = config.map_max_retries;
        workers.push(tokio::spawn(async move {
            loop {
                let job = {
                    let mut rx = job_rx.lock().await;
                    rx.recv().await
                };
                let Some(job) = job else { break };
                match call_chunk(&gateway, &model, &query, &job.posts, max_retries).await {
                    Ok(ranked) => {
                        let _ = result_tx.send(ChunkResult::Ok(job.index, ranked)).await;
                    }
                    Err(()) => {
                        let _ = result_tx
                            .send(ChunkResult::Failed(job.index, job.posts))
                            .await;
                    }
                }
            }
        }));
    }
    drop(result_tx);

    let mut ranked_by_index: HashMap<usize, Vec<RankedPost>> = HashMap::new();
    let mut failed_chunks: Vec<(usize, Vec<Post>)> = Vec::new();

    while let Some(result) = result_rx.recv().await {
        match result {
            ChunkResult::Ok(index, ranked) => {
                ranked_by_index.insert(index, ranked);
            }
            ChunkResult::Failed(index, posts) => {
                failed_chunks.push((index, posts));
            }
        }
    }
    for worker in workers {
        let _ = worker.await;
    }

    let mut degraded = false;
    if !failed_chunks.is_empty() {
        warn!(count = failed_chunks.len(), "retrying failed map chunks in a single global pass");
        for (index, posts) in failed_chunks {
            match call_chunk(&gateway, model, query, &posts, config.map_max_retries).await {
                Ok(ranked) => {
                    ranked_by_index.insert(index, ranked);
                }
                Err(()) => {
                    degraded = true;
                    let fallback = posts
                        .into_iter()
                        .map(|post| RankedPost {
                            post,
                            relevance: Relevance::Low,
                            reason: "chunk failed after global retry, defaulting to LOW".to_string(),
                        })
                        .collect();
                    ranked_by_index.insert(index, fallback);
                }
            }
        }
    }

    let mut all_ranked = Vec::with_capacity(posts.len());
    for index in 0..chunks.len() {
        if let Some(ranked) = ranked_by_index.remove(&index) {
            all_ranked.extend(ranked);
        }
    }

    if degraded {
        PhaseOutcome::Degraded(all_ranked, "one or more chunks defaulted to LOW after retries".to_string())
    } else {
        PhaseOutcome::Completed(all_ranked)
    }
}
