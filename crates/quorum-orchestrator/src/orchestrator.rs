use std::sync::Arc;
use std::time::{Duration, Instant};

use async_stream::stream;
use dashmap::DashMap;
use quorum_core::config::QuorumConfig;
use quorum_core::types::{
    Expert, ExpertResponse, MultiExpertResponse, ProgressEvent, ProgressEventType, Query,
    RedditResponse,
};
use quorum_llm::LlmGateway;
use quorum_pipeline::ExpertPipeline;
use quorum_store::Store;
use tokio::sync::mpsc;
use tokio_stream::{Stream, StreamExt};
use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::error::{OrchestratorError, Result};
use crate::progress_bus::ProgressBus;
use crate::reddit_client::RedditClient;
use crate::sse::{keep_alive_wrap, SseLine};

/// A single branch's outcome, collected on a dedicated channel separate
/// from the progress bus — progress is lossy, final results are not.
enum BranchResult {
    Expert(String, std::result::Result<ExpertResponse, String>),
    Reddit(Option<RedditResponse>),
}

/// Runs one request end to end: resolves the expert set, fans out one
/// Expert Pipeline task per expert plus one Reddit task, and yields an
/// ordered [`SseLine`] stream that ends with a terminal `complete` event
/// carrying the assembled [`MultiExpertResponse`].
pub struct QueryOrchestrator {
    store: Store,
    gateway: Arc<LlmGateway>,
    reddit: Option<Arc<RedditClient>>,
    config: QuorumConfig,
}

impl QueryOrchestrator {
    pub fn new(
        store: Store,
        gateway: Arc<LlmGateway>,
        reddit: Option<Arc<RedditClient>>,
        config: QuorumConfig,
    ) -> Self {
        Self {
            store,
            gateway,
            reddit,
            config,
        }
    }

    async fn resolve_experts(&self, query: &Query) -> Result<Vec<Expert>> {
        let summaries = self.store.list_experts().await?;
        let experts: Vec<Expert> = summaries
            .into_iter()
            .filter(|s| {
                query
                    .expert_filter
                    .as_ref()
                    .map(|ids| ids.contains(&s.expert_id))
                    .unwrap_or(true)
            })
            .map(|s| Expert {
                expert_id: s.expert_id,
                display_name: s.display_name,
                channel_username: s.channel_username,
            })
            .collect();
        Ok(experts)
    }

    pub fn run(self: Arc<Self>, query: Query) -> impl Stream<Item = SseLine> {
        stream! {
            let started = Instant::now();

            let experts = match self.resolve_experts(&query).await {
                Ok(e) => e,
                Err(e) => {
                    yield SseLine::Data(error_event(&e.to_string()));
                    return;
                }
            };
            if experts.is_empty() {
                yield SseLine::Data(error_event(&OrchestratorError::NoExpertsAvailable.to_string()));
                return;
            }

            let (bus, rx) = ProgressBus::new(quorum_core::config::DEFAULT_PROGRESS_BUS_CAPACITY);
            let sink = bus.sink();
            let cancel_tokens: DashMap<String, CancellationToken> = DashMap::new();

            let reddit_client = if query.include_reddit { self.reddit.clone() } else { None };
            let expected = experts.len() + reddit_client.is_some() as usize;
            let (result_tx, mut result_rx) = mpsc::channel::<BranchResult>(expected.max(1));

            for expert in &experts {
                let token = CancellationToken::new();
                cancel_tokens.insert(format!("expert:{}", expert.expert_id), token.clone());

                let pipeline = ExpertPipeline::new(
                    self.store.clone(),
                    self.gateway.clone(),
                    self.config.pipeline.clone(),
                    self.config.models.clone(),
                    sink.clone(),
                );
                let query = query.clone();
                let expert = expert.clone();
                let result_tx = result_tx.clone();
                tokio::spawn(async move {
                    let expert_id = expert.expert_id.clone();
                    let outcome = tokio::select! {
                        r = pipeline.run(&query, &expert) => r.map_err(|e| e.to_string()),
                        _ = token.cancelled() => Err("cancelled by orchestrator deadline".to_string()),
                    };
                    let _ = result_tx.send(BranchResult::Expert(expert_id, outcome)).await;
                });
            }

            if let Some(reddit) = reddit_client {
                let token = CancellationToken::new();
                cancel_tokens.insert("reddit".to_string(), token.clone());
                let q = query.query.clone();
                let result_tx = result_tx.clone();
                tokio::spawn(async move {
                    let outcome = tokio::select! {
                        r = reddit.search(&q) => r,
                        _ = token.cancelled() => None,
                    };
                    let _ = result_tx.send(BranchResult::Reddit(outcome)).await;
                });
            }
            drop(result_tx);

            let mut expert_responses = Vec::with_capacity(experts.len());
            let mut reddit_response = None;
            let mut collected = 0usize;
            let mut hit_deadline = false;
            let mut last_expert_failure: Option<String> = None;

            let mut sse = Box::pin(keep_alive_wrap(rx));
            let deadline_sleep = tokio::time::sleep(Duration::from_millis(self.config.gateway.request_deadline_ms));
            tokio::pin!(deadline_sleep);

            loop {
                if collected >= expected {
                    break;
                }
                tokio::select! {
                    biased;
                    _ = &mut deadline_sleep => {
                        hit_deadline = true;
                        break;
                    }
                    maybe_line = sse.next() => {
                        if let Some(line) = maybe_line {
                            yield line;
                        }
                    }
                    maybe_result = result_rx.recv() => {
                        match maybe_result {
                            Some(BranchResult::Expert(_, Ok(resp))) => {
                                expert_responses.push(resp);
                                collected += 1;
                            }
                            Some(BranchResult::Expert(expert_id, Err(reason))) => {
                                yield SseLine::Data(
                                    ProgressEvent::new(ProgressEventType::ExpertError, "pipeline", "failed", &reason)
                                        .with_expert(expert_id),
                                );
                                last_expert_failure = Some(reason);
                                collected += 1;
                            }
                            Some(BranchResult::Reddit(resp)) => {
                                reddit_response = resp;
                                collected += 1;
                            }
                            None => break,
                        }
                    }
                }
            }

            if hit_deadline {
                for entry in cancel_tokens.iter() {
                    entry.value().cancel();
                }
                yield SseLine::Data(ProgressEvent::new(
                    ProgressEventType::Error,
                    "orchestrator",
                    "failed",
                    "request deadline exceeded",
                ));

                let grace = tokio::time::sleep(Duration::from_secs(2));
                tokio::pin!(grace);
                loop {
                    tokio::select! {
                        _ = &mut grace => break,
                        maybe_result = result_rx.recv() => {
                            match maybe_result {
                                Some(BranchResult::Expert(_, Ok(resp))) => expert_responses.push(resp),
                                Some(BranchResult::Reddit(resp)) => reddit_response = reddit_response.or(resp),
                                Some(BranchResult::Expert(_, Err(reason))) => last_expert_failure = Some(reason),
                                None => break,
                            }
                        }
                    }
                }
            }

            info!(
                dropped_progress_events = bus.dropped_count(),
                experts = expert_responses.len(),
                "query orchestrator done"
            );

            if expert_responses.is_empty() {
                let message = last_expert_failure
                    .as_deref()
                    .unwrap_or_else(|| quorum_core::QuorumError::NoExpertsAvailable.user_message());
                yield SseLine::Data(error_event(message));
                return;
            }

            let response = MultiExpertResponse {
                request_id: query.request_id.clone(),
                expert_responses,
                reddit_response,
                total_processing_time_ms: started.elapsed().as_millis() as u64,
            };
            let complete = ProgressEvent::new(ProgressEventType::Complete, "orchestrator", "done", "query complete")
                .with_data(serde_json::json!({ "response": response }));
            yield SseLine::Data(complete);
        }
    }
}

fn error_event(message: &str) -> ProgressEvent {
    ProgressEvent::new(ProgressEventType::Error, "orchestrator", "failed", message)
}
