use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// An authored channel tracked as a distinct corpus with its own posts and
/// comments. `expert_id` is the isolation boundary — every row the core
/// reads during a query carries one and it must match.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Expert {
    pub expert_id: String,
    pub display_name: String,
    pub channel_username: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExpertStats {
    pub posts_count: i64,
    pub comments_count: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExpertSummary {
    pub expert_id: String,
    pub display_name: String,
    pub channel_username: String,
    pub stats: ExpertStats,
}

/// One message in a channel, the atomic unit of retrieval. Immutable within
/// a query's lifetime.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Post {
    pub post_id: i64,
    /// Isolation boundary — see [`Expert`]. Every accessor in the store
    /// adapter requires this to be bound before a row can be returned.
    pub expert_id: String,
    pub channel_id: String,
    pub telegram_message_id: i64,
    pub created_at: DateTime<Utc>,
    pub message_text: String,
    pub author_name: String,
    pub channel_username: String,
}

/// A user reply attached to exactly one [`Post`]. Unique per
/// `(telegram_comment_id, post_id)` — the numeric id may reappear across
/// posts.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Comment {
    pub comment_id: i64,
    pub post_id: i64,
    pub telegram_comment_id: i64,
    pub author_name: String,
    pub created_at: DateTime<Utc>,
    pub text: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LinkType {
    Reply,
    Forward,
    Mention,
}

/// A directed relation from a source Post to a target Post, used only by
/// Resolve to expand context within a single expert's corpus.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Link {
    pub source_post_id: i64,
    pub target_post_id: i64,
    pub link_type: LinkType,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DriftTopic {
    pub topic: String,
    pub keywords: Vec<String>,
    pub key_phrases: Vec<String>,
    pub context: String,
}

/// The structured shape `drift_topics` must take. The legacy bare-array
/// form is rejected at deserialization rather than silently coerced — see
/// Invariant 5.
#[derive(Debug, Clone, Serialize)]
pub struct DriftTopics {
    pub has_drift: bool,
    pub drift_topics: Vec<DriftTopic>,
}

impl<'de> Deserialize<'de> for DriftTopics {
    fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        use serde::de::Error;
        let value = serde_json::Value::deserialize(deserializer)?;
        match value {
            serde_json::Value::Object(_) => {
                #[derive(Deserialize)]
                struct Shape {
                    has_drift: bool,
                    #[serde(default)]
                    drift_topics: Vec<DriftTopic>,
                }
                let shape: Shape = serde_json::from_value(value).map_err(D::Error::custom)?;
                Ok(DriftTopics {
                    has_drift: shape.has_drift,
                    drift_topics: shape.drift_topics,
                })
            }
            serde_json::Value::Array(_) => Err(D::Error::custom(
                "drift_topics: legacy bare-array shape is rejected; expected {has_drift, drift_topics}",
            )),
            other => Err(D::Error::custom(format!(
                "drift_topics: expected object, got {other}"
            ))),
        }
    }
}

/// One-to-one with [`Post`]. Pre-computed offline; the core reads but never
/// writes these rows during a query.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommentGroupDrift {
    pub post_id: i64,
    pub expert_id: String,
    pub has_drift: bool,
    pub drift_topics: DriftTopics,
    pub analyzed_by: String,
}

/// A [`CommentGroupDrift`] row joined with its anchor [`Post`].
#[derive(Debug, Clone)]
pub struct GroupWithAnchor {
    pub drift: CommentGroupDrift,
    pub anchor: Post,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Relevance {
    Low,
    Medium,
    High,
    /// Added by Resolve for posts pulled in purely via link expansion.
    Context,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Confidence {
    Low,
    Medium,
    High,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Language {
    Ru,
    En,
}

/// A labelled post surviving the Map/Resolve phases, carrying its relevance
/// and the reason the model gave for it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RankedPost {
    pub post: Post,
    pub relevance: Relevance,
    pub reason: String,
}

/// A validated, runtime-only question posed to the orchestrator.
#[derive(Debug, Clone, Deserialize)]
pub struct QueryRequest {
    pub query: String,
    #[serde(default)]
    pub expert_filter: Option<Vec<String>>,
    #[serde(default)]
    pub include_comment_groups: bool,
    #[serde(default = "default_true")]
    pub include_reddit: bool,
    #[serde(default)]
    pub use_recent_only: bool,
    #[serde(default = "default_true")]
    pub stream_progress: bool,
    #[serde(default)]
    pub max_posts: Option<i64>,
}

fn default_true() -> bool {
    true
}

/// A [`QueryRequest`] that has passed validation, with a generated
/// `request_id` attached for progress events and logs.
#[derive(Debug, Clone)]
pub struct Query {
    pub request_id: String,
    pub query: String,
    pub expert_filter: Option<Vec<String>>,
    pub include_comment_groups: bool,
    pub include_reddit: bool,
    pub use_recent_only: bool,
    pub stream_progress: bool,
    pub max_posts: Option<i64>,
}

impl Query {
    /// Validate and stamp a raw request with a fresh request id.
    ///
    /// `query` must be 3..=1000 chars; this is the only validation rule
    /// named by the contract, so it is the only one enforced here.
    pub fn from_request(req: QueryRequest) -> std::result::Result<Self, crate::error::QuorumError> {
        let len = req.query.chars().count();
        if !(3..=1000).contains(&len) {
            return Err(crate::error::QuorumError::InvalidInput(format!(
                "query must be 3..=1000 chars, got {len}"
            )));
        }
        Ok(Query {
            request_id: uuid::Uuid::new_v4().to_string(),
            query: req.query,
            expert_filter: req.expert_filter,
            include_comment_groups: req.include_comment_groups,
            include_reddit: req.include_reddit,
            use_recent_only: req.use_recent_only,
            stream_progress: req.stream_progress,
            max_posts: req.max_posts,
        })
    }
}

/// Optional comment-group block attached to an [`ExpertResponse`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommentGroupBlock {
    pub synthesis: String,
    pub group_count: usize,
}

/// Per-expert output. Multiple compose into a [`MultiExpertResponse`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExpertResponse {
    pub expert_id: String,
    pub display_name: String,
    pub answer: String,
    pub main_sources: Vec<i64>,
    pub confidence: Confidence,
    pub posts_analyzed: usize,
    pub processing_time_ms: u64,
    pub language: Language,
    pub has_expert_comments: bool,
    pub comment_groups: Option<CommentGroupBlock>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RedditSource {
    pub title: String,
    pub url: String,
    pub score: i64,
    pub comments_count: i64,
    pub subreddit: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RedditResponse {
    pub markdown: String,
    pub found_count: usize,
    pub sources: Vec<RedditSource>,
    pub query: String,
    pub processing_time_ms: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MultiExpertResponse {
    pub request_id: String,
    pub expert_responses: Vec<ExpertResponse>,
    pub reddit_response: Option<RedditResponse>,
    pub total_processing_time_ms: u64,
}

/// One line of the SSE stream. `data` is left as [`serde_json::Value`]
/// because its shape varies by `event_type`; `MultiExpertResponse` is
/// serialized into `data.response` for the terminal `complete` event.
#[derive(Debug, Clone, Serialize)]
pub struct ProgressEvent {
    pub event_type: ProgressEventType,
    pub phase: String,
    pub status: String,
    pub message: String,
    pub timestamp: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<serde_json::Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expert_id: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ProgressEventType {
    PhaseStart,
    Progress,
    PhaseComplete,
    Complete,
    Error,
    ExpertError,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn query_rejects_too_short() {
        let req = QueryRequest {
            query: "hi".to_string(),
            expert_filter: None,
            include_comment_groups: false,
            include_reddit: true,
            use_recent_only: false,
            stream_progress: true,
            max_posts: None,
        };
        assert!(Query::from_request(req).is_err());
    }

    #[test]
    fn query_accepts_in_range() {
        let req = QueryRequest {
            query: "what is prompt caching?".to_string(),
            expert_filter: None,
            include_comment_groups: false,
            include_reddit: true,
            use_recent_only: false,
            stream_progress: true,
            max_posts: None,
        };
        let q = Query::from_request(req).expect("valid query");
        assert!(!q.request_id.is_empty());
    }

    #[test]
    fn drift_topics_rejects_legacy_array_shape() {
        let raw = serde_json::json!([{"topic": "x"}]);
        let err = serde_json::from_value::<DriftTopics>(raw).unwrap_err();
        assert!(err.to_string().contains("legacy"));
    }

    #[test]
    fn drift_topics_accepts_object_shape() {
        let raw = serde_json::json!({
            "has_drift": true,
            "drift_topics": [{
                "topic": "pricing",
                "keywords": ["cost"],
                "key_phrases": ["too expensive"],
                "context": "users compared pricing tiers"
            }]
        });
        let parsed: DriftTopics = serde_json::from_value(raw).unwrap();
        assert!(parsed.has_drift);
        assert_eq!(parsed.drift_topics.len(), 1);
    }
}

impl ProgressEvent {
    pub fn new(
        event_type: ProgressEventType,
        phase: impl Into<String>,
        status: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            event_type,
            phase: phase.into(),
            status: status.into(),
            message: message.into(),
            timestamp: Utc::now(),
            data: None,
            expert_id: None,
        }
    }

    pub fn with_expert(mut self, expert_id: impl Into<String>) -> Self {
        self.expert_id = Some(expert_id.into());
        self
    }

    pub fn with_data(mut self, data: serde_json::Value) -> Self {
        self.data = Some(data);
        self
    }
}
