pub mod error;
pub mod row_mapping;
pub mod schema;
pub mod store;

pub use error::StoreError;
pub use store::Store;

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, Utc};

    fn seed(store: &Store) {
        let conn_arc = store.conn_arc();
        let conn = conn_arc.lock().unwrap();
        conn.execute_batch(
            "
            INSERT INTO expert_metadata VALUES ('e1', 'Expert One', 'e1_channel');
            INSERT INTO expert_metadata VALUES ('e2', 'Expert Two', 'e2_channel');
            ",
        )
        .unwrap();
    }

    #[tokio::test]
    async fn expert_isolation_holds_across_duplicate_telegram_ids() {
        let store = Store::open_in_memory().unwrap();
        seed(&store);
        {
            let conn_arc = store.conn_arc();
            let conn = conn_arc.lock().unwrap();
            conn.execute_batch(
                "
                INSERT INTO posts (post_id, expert_id, channel_id, telegram_message_id, created_at, message_text, author_name, channel_username)
                VALUES
                (1, 'e1', 'c1', 42, '2024-01-01T00:00:00Z', 'hello from e1', 'a', 'e1_channel'),
                (2, 'e2', 'c2', 42, '2024-01-01T00:00:00Z', 'hello from e2', 'b', 'e2_channel');
                ",
            )
            .unwrap();
        }
        let posts = store.posts_for_expert("e1", None).await.unwrap();
        assert_eq!(posts.len(), 1);
        assert_eq!(posts[0].expert_id, "e1");
    }

    #[tokio::test]
    async fn recency_cutoff_excludes_old_posts() {
        let store = Store::open_in_memory().unwrap();
        seed(&store);
        let old = Utc::now() - Duration::days(120);
        let recent = Utc::now() - Duration::days(1);
        {
            let conn_arc = store.conn_arc();
            let conn = conn_arc.lock().unwrap();
            conn.execute(
                "INSERT INTO posts (post_id, expert_id, channel_id, telegram_message_id, created_at, message_text, author_name, channel_username)
                 VALUES (1, 'e1', 'c1', 1, ?1, 'old', 'a', 'e1_channel')",
                rusqlite::params![old.to_rfc3339()],
            ).unwrap();
            conn.execute(
                "INSERT INTO posts (post_id, expert_id, channel_id, telegram_message_id, created_at, message_text, author_name, channel_username)
                 VALUES (2, 'e1', 'c1', 2, ?1, 'new', 'a', 'e1_channel')",
                rusqlite::params![recent.to_rfc3339()],
            ).unwrap();
        }
        let cutoff = Utc::now() - Duration::days(90);
        let posts = store.posts_for_expert("e1", Some(cutoff)).await.unwrap();
        assert_eq!(posts.len(), 1);
        assert_eq!(posts[0].post_id, 2);
    }

    #[tokio::test]
    async fn expand_links_never_crosses_expert_boundary() {
        let store = Store::open_in_memory().unwrap();
        seed(&store);
        {
            let conn_arc = store.conn_arc();
            let conn = conn_arc.lock().unwrap();
            conn.execute_batch(
                "
                INSERT INTO posts (post_id, expert_id, channel_id, telegram_message_id, created_at, message_text, author_name, channel_username)
                VALUES
                (1, 'e1', 'c1', 1, '2024-01-01T00:00:00Z', 'a', 'a', 'e1_channel'),
                (2, 'e1', 'c1', 2, '2024-01-01T00:00:00Z', 'b', 'a', 'e1_channel'),
                (3, 'e2', 'c2', 3, '2024-01-01T00:00:00Z', 'c', 'a', 'e2_channel');
                INSERT INTO links (source_post_id, target_post_id, link_type) VALUES
                (1, 2, 'reply'),
                (1, 3, 'reply');
                ",
            )
            .unwrap();
        }
        let expanded = store
            .expand_links(vec![1], "e1", 2, None)
            .await
            .unwrap();
        assert_eq!(expanded.len(), 1);
        assert_eq!(expanded[0].post_id, 2);
    }

    #[tokio::test]
    async fn drift_groups_exclude_given_anchor_ids() {
        let store = Store::open_in_memory().unwrap();
        seed(&store);
        {
            let conn_arc = store.conn_arc();
            let conn = conn_arc.lock().unwrap();
            conn.execute_batch(
                "
                INSERT INTO posts (post_id, expert_id, channel_id, telegram_message_id, created_at, message_text, author_name, channel_username)
                VALUES
                (101, 'e1', 'c1', 101, '2024-01-01T00:00:00Z', 'a', 'a', 'e1_channel'),
                (103, 'e1', 'c1', 103, '2024-01-01T00:00:00Z', 'b', 'a', 'e1_channel'),
                (200, 'e1', 'c1', 200, '2024-01-01T00:00:00Z', 'c', 'a', 'e1_channel');
                ",
            )
            .unwrap();
            for post_id in [101, 103, 200] {
                conn.execute(
                    "INSERT INTO comment_group_drift (post_id, expert_id, has_drift, drift_topics, analyzed_by)
                     VALUES (?1, 'e1', 1, ?2, 'model-x')",
                    rusqlite::params![post_id, r#"{"has_drift":true,"drift_topics":[]}"#],
                ).unwrap();
            }
        }
        let groups = store
            .drift_groups_for_expert("e1", vec![101, 103], None)
            .await
            .unwrap();
        assert_eq!(groups.len(), 1);
        assert_eq!(groups[0].anchor.post_id, 200);
    }
}
