use std::time::Instant;

use quorum_core::types::{RedditResponse, RedditSource};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::error::Result;
use crate::watchdog::Watchdog;

const MIN_SCORE: i64 = 5;
const ENRICH_COUNT: usize = 5;
const BODY_TRUNCATE_CHARS: usize = 500;
const COMMENT_LIMIT: u32 = 50;
const COMMENT_DEPTH: u32 = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortOrder {
    Relevance,
    Hot,
    New,
    Top,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TimeRange {
    Hour,
    Day,
    Week,
    Month,
    Year,
    All,
}

impl SortOrder {
    fn as_str(self) -> &'static str {
        match self {
            SortOrder::Relevance => "relevance",
            SortOrder::Hot => "hot",
            SortOrder::New => "new",
            SortOrder::Top => "top",
        }
    }
}

impl TimeRange {
    fn as_str(self) -> &'static str {
        match self {
            TimeRange::Hour => "hour",
            TimeRange::Day => "day",
            TimeRange::Week => "week",
            TimeRange::Month => "month",
            TimeRange::Year => "year",
            TimeRange::All => "all",
        }
    }
}

#[derive(Debug, Clone)]
pub struct AggregateRequest {
    pub query: String,
    pub limit: usize,
    pub subreddits: Option<Vec<String>>,
    pub sort: SortOrder,
    pub time: TimeRange,
}

impl AggregateRequest {
    /// Stable key for the response cache — two requests that would hit the
    /// same tool call with the same normalization collapse to one entry.
    pub fn cache_key(&self) -> String {
        format!(
            "{}|{}|{:?}|{}|{}",
            self.query,
            self.limit,
            self.subreddits,
            self.sort.as_str(),
            self.time.as_str()
        )
    }
}

#[derive(Debug, Clone)]
struct RedditPost {
    id: Option<String>,
    title: String,
    body: String,
    url: String,
    subreddit: String,
    score: i64,
    num_comments: i64,
}

/// Run the full pipeline described for the sidecar's `POST /search`:
/// dispatch to the right tool, normalize, filter/sort/cap, enrich the
/// top few, sanitize, and render markdown. Every step after the tool
/// call is pure and infallible — only the `execute` call can fail.
pub async fn aggregate(watchdog: &Watchdog, request: AggregateRequest) -> Result<RedditResponse> {
    let started = Instant::now();

    let browsing = request.subreddits.is_some();
    let effective_sort = if browsing && request.sort == SortOrder::Relevance {
        SortOrder::Hot
    } else {
        request.sort
    };

    let raw = if let Some(subreddits) = &request.subreddits {
        watchdog
            .execute(
                "browse_subreddit",
                json!({
                    "subreddits": subreddits,
                    "sort": effective_sort.as_str(),
                    "time": request.time.as_str(),
                    "limit": request.limit,
                }),
            )
            .await?
    } else {
        watchdog
            .execute(
                "search_reddit",
                json!({
                    "query": request.query,
                    "sort": effective_sort.as_str(),
                    "time": request.time.as_str(),
                    "limit": request.limit,
                }),
            )
            .await?
    };

    let mut posts = normalize(&raw);
    posts.retain(|p| p.score >= MIN_SCORE);
    posts.sort_by_key(|p| std::cmp::Reverse(p.score + 2 * p.num_comments));
    posts.truncate(request.limit);

    enrich_top(watchdog, &mut posts).await;

    for post in &mut posts {
        post.title = quorum_sanitize::sanitize(&post.title);
        post.body = quorum_sanitize::sanitize(&post.body);
    }

    let markdown = render_markdown(&posts);
    let sources = posts.iter().map(to_source).collect();
    let found_count = posts.len();

    Ok(RedditResponse {
        markdown,
        found_count,
        sources,
        query: request.query,
        processing_time_ms: started.elapsed().as_millis() as u64,
    })
}

/// Accept either `browse_subreddit`'s `{posts, total_posts}` or
/// `search_reddit`'s `{results, total_results}` under one record shape.
fn normalize(raw: &Value) -> Vec<RedditPost> {
    let array = raw
        .get("posts")
        .or_else(|| raw.get("results"))
        .and_then(Value::as_array);
    array
        .map(|items| items.iter().filter_map(post_from_json).collect())
        .unwrap_or_default()
}

fn post_from_json(item: &Value) -> Option<RedditPost> {
    let title = item.get("title").and_then(Value::as_str)?.to_string();
    let body = item
        .get("selftext")
        .or_else(|| item.get("body"))
        .and_then(Value::as_str)
        .unwrap_or("")
        .to_string();
    let subreddit = item
        .get("subreddit")
        .and_then(Value::as_str)
        .unwrap_or("unknown")
        .to_string();
    let score = item.get("score").and_then(Value::as_i64).unwrap_or(0);
    let num_comments = item
        .get("num_comments")
        .or_else(|| item.get("numComments"))
        .and_then(Value::as_i64)
        .unwrap_or(0);
    let url = item
        .get("url")
        .and_then(Value::as_str)
        .or_else(|| item.get("permalink").and_then(Value::as_str))
        .unwrap_or("")
        .to_string();
    let id = item.get("id").and_then(Value::as_str).map(str::to_string);
    Some(RedditPost {
        id,
        title,
        body,
        url,
        subreddit,
        score,
        num_comments,
    })
}

async fn enrich_top(watchdog: &Watchdog, posts: &mut [RedditPost]) {
    let enrich_count = posts.len().min(ENRICH_COUNT);
    let calls = posts.iter().take(enrich_count).map(|post| {
        let id = post.id.clone();
        async move {
            let id = id?;
            watchdog
                .execute(
                    "get_post_details",
                    json!({"id": id, "comment_limit": COMMENT_LIMIT, "depth": COMMENT_DEPTH}),
                )
                .await
                .ok()
        }
    });
    let details = futures_util::future::join_all(calls).await;
    for (post, detail) in posts.iter_mut().take(enrich_count).zip(details) {
        // A failed or absent enrichment leaves the original search/browse
        // record untouched — enrichment only ever adds detail.
        if let Some(detail) = detail {
            if let Some(body) = detail
                .get("selftext")
                .or_else(|| detail.get("body"))
                .and_then(Value::as_str)
            {
                if !body.is_empty() {
                    post.body = body.to_string();
                }
            }
        }
    }
}

fn to_source(post: &RedditPost) -> RedditSource {
    RedditSource {
        title: post.title.clone(),
        url: normalize_url(&post.url),
        score: post.score,
        comments_count: post.num_comments,
        subreddit: post.subreddit.clone(),
    }
}

fn normalize_url(url: &str) -> String {
    if url.starts_with("http") {
        url.to_string()
    } else {
        format!("https://reddit.com{url}")
    }
}

fn truncate_chars(s: &str, max_chars: usize) -> String {
    if s.chars().count() <= max_chars {
        s.to_string()
    } else {
        s.chars().take(max_chars).collect()
    }
}

fn render_markdown(posts: &[RedditPost]) -> String {
    let mut out = String::new();
    for (i, post) in posts.iter().enumerate() {
        let body = truncate_chars(&post.body, BODY_TRUNCATE_CHARS);
        out.push_str(&format!(
            "### {}. {}\nr/{} · score {} · {} comments\n\n{}\n\n[Read on Reddit]({})\n\n",
            i + 1,
            post.title,
            post.subreddit,
            post.score,
            post.num_comments,
            body,
            normalize_url(&post.url),
        ));
    }
    out.trim_end().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalizes_browse_and_search_shapes_identically() {
        let browse = json!({"posts": [{"title": "a", "score": 10, "num_comments": 2, "subreddit": "rust", "url": "/r/rust/1"}], "total_posts": 1});
        let search = json!({"results": [{"title": "a", "score": 10, "num_comments": 2, "subreddit": "rust", "url": "/r/rust/1"}], "total_results": 1});
        assert_eq!(normalize(&browse).len(), 1);
        assert_eq!(normalize(&search).len(), 1);
    }

    #[test]
    fn filters_low_score_and_sorts_by_engagement() {
        let raw = json!({"results": [
            {"title": "low", "score": 1, "num_comments": 50, "subreddit": "x", "url": "u"},
            {"title": "high", "score": 100, "num_comments": 5, "subreddit": "x", "url": "u"},
        ]});
        let mut posts = normalize(&raw);
        posts.retain(|p| p.score >= MIN_SCORE);
        posts.sort_by_key(|p| std::cmp::Reverse(p.score + 2 * p.num_comments));
        assert_eq!(posts.len(), 1);
        assert_eq!(posts[0].title, "high");
    }

    #[test]
    fn relative_permalinks_get_the_reddit_host_prefixed() {
        assert_eq!(normalize_url("/r/rust/comments/1"), "https://reddit.com/r/rust/comments/1");
        assert_eq!(normalize_url("https://reddit.com/x"), "https://reddit.com/x");
    }

    #[test]
    fn body_truncates_by_character_count_not_bytes() {
        let long = "a".repeat(600);
        assert_eq!(truncate_chars(&long, BODY_TRUNCATE_CHARS).chars().count(), BODY_TRUNCATE_CHARS);
    }
}
