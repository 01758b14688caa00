use rusqlite::Connection;

use crate::error::Result;

/// Create the read-only-to-the-core tables if they do not already exist.
///
/// The ingestion collaborator and the offline drift analyzer are the only
/// writers in production; tests use this to build in-memory fixtures.
pub fn init_db(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "
        CREATE TABLE IF NOT EXISTS expert_metadata (
            expert_id TEXT PRIMARY KEY,
            display_name TEXT NOT NULL,
            channel_username TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS posts (
            post_id INTEGER PRIMARY KEY,
            expert_id TEXT NOT NULL,
            channel_id TEXT NOT NULL,
            telegram_message_id INTEGER NOT NULL,
            created_at TEXT NOT NULL,
            message_text TEXT NOT NULL,
            author_name TEXT NOT NULL,
            channel_username TEXT NOT NULL,
            UNIQUE(telegram_message_id, channel_id)
        );
        CREATE INDEX IF NOT EXISTS idx_posts_expert_created
            ON posts(expert_id, created_at);
        CREATE INDEX IF NOT EXISTS idx_posts_tgmsg_channel
            ON posts(telegram_message_id, channel_id);

        CREATE TABLE IF NOT EXISTS comments (
            comment_id INTEGER PRIMARY KEY,
            post_id INTEGER NOT NULL REFERENCES posts(post_id),
            telegram_comment_id INTEGER NOT NULL,
            author_name TEXT NOT NULL,
            created_at TEXT NOT NULL,
            text TEXT NOT NULL,
            UNIQUE(telegram_comment_id, post_id)
        );

        CREATE TABLE IF NOT EXISTS links (
            source_post_id INTEGER NOT NULL REFERENCES posts(post_id),
            target_post_id INTEGER NOT NULL REFERENCES posts(post_id),
            link_type TEXT NOT NULL
        );
        CREATE INDEX IF NOT EXISTS idx_links_source ON links(source_post_id);

        CREATE TABLE IF NOT EXISTS comment_group_drift (
            post_id INTEGER PRIMARY KEY REFERENCES posts(post_id),
            expert_id TEXT NOT NULL,
            has_drift INTEGER NOT NULL,
            drift_topics TEXT NOT NULL,
            analyzed_by TEXT NOT NULL
        );
        ",
    )?;
    Ok(())
}
