use chrono::{DateTime, Utc};
use quorum_core::types::{Comment, CommentGroupDrift, DriftTopics, Link, LinkType, Post};
use rusqlite::Row;

use crate::error::{Result, StoreError};

pub fn post_from_row(row: &Row) -> rusqlite::Result<Post> {
    let created_raw: String = row.get("created_at")?;
    Ok(Post {
        post_id: row.get("post_id")?,
        expert_id: row.get("expert_id")?,
        channel_id: row.get("channel_id")?,
        telegram_message_id: row.get("telegram_message_id")?,
        created_at: parse_timestamp(&created_raw),
        message_text: row.get("message_text")?,
        author_name: row.get("author_name")?,
        channel_username: row.get("channel_username")?,
    })
}

pub fn comment_from_row(row: &Row) -> rusqlite::Result<Comment> {
    let created_raw: String = row.get("created_at")?;
    Ok(Comment {
        comment_id: row.get("comment_id")?,
        post_id: row.get("post_id")?,
        telegram_comment_id: row.get("telegram_comment_id")?,
        author_name: row.get("author_name")?,
        created_at: parse_timestamp(&created_raw),
        text: row.get("text")?,
    })
}

pub fn link_from_row(row: &Row) -> rusqlite::Result<Link> {
    let link_type_raw: String = row.get("link_type")?;
    let link_type = match link_type_raw.as_str() {
        "reply" => LinkType::Reply,
        "forward" => LinkType::Forward,
        "mention" => LinkType::Mention,
        other => {
            tracing::warn!(link_type = other, "unknown link_type, defaulting to mention");
            LinkType::Mention
        }
    };
    Ok(Link {
        source_post_id: row.get("source_post_id")?,
        target_post_id: row.get("target_post_id")?,
        link_type,
    })
}

pub fn drift_from_row(row: &Row) -> Result<CommentGroupDrift> {
    let drift_topics_raw: String = row.get("drift_topics").map_err(StoreError::Sqlite)?;
    let drift_topics: DriftTopics = serde_json::from_str(&drift_topics_raw)
        .map_err(|e| StoreError::BadDrift(e.to_string()))?;
    Ok(CommentGroupDrift {
        post_id: row.get("post_id").map_err(StoreError::Sqlite)?,
        expert_id: row.get("expert_id").map_err(StoreError::Sqlite)?,
        has_drift: row
            .get::<_, i64>("has_drift")
            .map_err(StoreError::Sqlite)?
            != 0,
        drift_topics,
        analyzed_by: row.get("analyzed_by").map_err(StoreError::Sqlite)?,
    })
}

fn parse_timestamp(raw: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or_else(|_| {
            tracing::warn!(raw, "unparsable timestamp, defaulting to epoch");
            DateTime::UNIX_EPOCH
        })
}
