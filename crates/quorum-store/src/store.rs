use std::collections::{HashSet, VecDeque};
use std::sync::{Arc, Mutex};

use chrono::{DateTime, Utc};
use quorum_core::types::{Comment, Expert, ExpertStats, ExpertSummary, GroupWithAnchor, Post};
use rusqlite::{params_from_iter, Connection};

use crate::error::{Result, StoreError};
use crate::row_mapping::{comment_from_row, drift_from_row, link_from_row, post_from_row};

/// Typed, `expert_id`-scoped reads against the relational store.
///
/// Every accessor that touches posts, comments, links, or drift rows takes
/// `expert_id` as a mandatory parameter — there is no code path that can
/// compile a query without binding it. All queries run on the blocking
/// thread pool via [`tokio::task::spawn_blocking`] so a slow disk never
/// stalls the async runtime.
#[derive(Clone)]
pub struct Store {
    conn: Arc<Mutex<Connection>>,
}

impl Store {
    pub fn new(conn: Connection) -> Self {
        Self {
            conn: Arc::new(Mutex::new(conn)),
        }
    }

    pub fn open(path: &str) -> Result<Self> {
        let conn = Connection::open(path)?;
        crate::schema::init_db(&conn)?;
        Ok(Self::new(conn))
    }

    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        crate::schema::init_db(&conn)?;
        Ok(Self::new(conn))
    }

    #[cfg(test)]
    pub(crate) fn conn_arc(&self) -> Arc<Mutex<Connection>> {
        self.conn.clone()
    }

    async fn with_conn<F, T>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&Connection) -> Result<T> + Send + 'static,
        T: Send + 'static,
    {
        let conn = self.conn.clone();
        tokio::task::spawn_blocking(move || {
            let guard = conn.lock().expect("sqlite connection mutex poisoned");
            f(&guard)
        })
        .await?
    }

    /// `postsForExpert(expert_id, since?) -> [Post]`, stable ordering by
    /// `created_at DESC`.
    pub async fn posts_for_expert(
        &self,
        expert_id: &str,
        since: Option<DateTime<Utc>>,
    ) -> Result<Vec<Post>> {
        let expert_id = expert_id.to_string();
        self.with_conn(move |conn| {
            let mut stmt = if since.is_some() {
                conn.prepare(
                    "SELECT * FROM posts WHERE expert_id = ?1 AND created_at >= ?2
                     ORDER BY created_at DESC",
                )?
            } else {
                conn.prepare("SELECT * FROM posts WHERE expert_id = ?1 ORDER BY created_at DESC")?
            };
            let rows = if let Some(since) = since {
                stmt.query_map(
                    rusqlite::params![expert_id, since.to_rfc3339()],
                    post_from_row,
                )?
                .collect::<rusqlite::Result<Vec<_>>>()?
            } else {
                stmt.query_map(rusqlite::params![expert_id], post_from_row)?
                    .collect::<rusqlite::Result<Vec<_>>>()?
            };
            Ok(rows)
        })
        .await
    }

    pub async fn get_post(&self, post_id: i64, expert_id: &str) -> Result<Option<Post>> {
        let expert_id = expert_id.to_string();
        self.with_conn(move |conn| {
            let mut stmt =
                conn.prepare("SELECT * FROM posts WHERE post_id = ?1 AND expert_id = ?2")?;
            let mut rows = stmt.query_map(rusqlite::params![post_id, expert_id], post_from_row)?;
            match rows.next() {
                Some(row) => Ok(Some(row?)),
                None => Ok(None),
            }
        })
        .await
    }

    pub async fn comments_for_post(&self, post_id: i64) -> Result<Vec<Comment>> {
        self.with_conn(move |conn| {
            let mut stmt =
                conn.prepare("SELECT * FROM comments WHERE post_id = ?1 ORDER BY created_at ASC")?;
            let rows = stmt
                .query_map(rusqlite::params![post_id], comment_from_row)?
                .collect::<rusqlite::Result<Vec<_>>>()?;
            Ok(rows)
        })
        .await
    }

    /// `expandLinks(post_ids, expert_id, depth=2, since?) -> [Post]`: a
    /// bounded BFS over outbound links with a visited set, never crossing
    /// `expert_id` and honoring the recency cutoff at every hop.
    pub async fn expand_links(
        &self,
        post_ids: Vec<i64>,
        expert_id: &str,
        depth: u32,
        since: Option<DateTime<Utc>>,
    ) -> Result<Vec<Post>> {
        let expert_id = expert_id.to_string();
        self.with_conn(move |conn| {
            let mut visited: HashSet<i64> = post_ids.iter().copied().collect();
            let mut frontier: VecDeque<(i64, u32)> =
                post_ids.into_iter().map(|id| (id, 0)).collect();
            let mut newly_added = Vec::new();

            while let Some((post_id, level)) = frontier.pop_front() {
                if level >= depth {
                    continue;
                }
                let mut stmt = conn.prepare(
                    "SELECT l.target_post_id FROM links l
                     JOIN posts p ON p.post_id = l.target_post_id
                     WHERE l.source_post_id = ?1 AND p.expert_id = ?2",
                )?;
                let targets: Vec<i64> = stmt
                    .query_map(rusqlite::params![post_id, expert_id], |row| row.get(0))?
                    .collect::<rusqlite::Result<Vec<_>>>()?;

                for target_id in targets {
                    if visited.contains(&target_id) {
                        continue;
                    }
                    visited.insert(target_id);

                    let mut post_stmt = if since.is_some() {
                        conn.prepare(
                            "SELECT * FROM posts WHERE post_id = ?1 AND expert_id = ?2
                             AND created_at >= ?3",
                        )?
                    } else {
                        conn.prepare("SELECT * FROM posts WHERE post_id = ?1 AND expert_id = ?2")?
                    };
                    let found = if let Some(since) = since {
                        post_stmt
                            .query_map(
                                rusqlite::params![target_id, expert_id, since.to_rfc3339()],
                                post_from_row,
                            )?
                            .next()
                    } else {
                        post_stmt
                            .query_map(rusqlite::params![target_id, expert_id], post_from_row)?
                            .next()
                    };

                    if let Some(post) = found {
                        let post = post?;
                        newly_added.push(post);
                        frontier.push_back((target_id, level + 1));
                    }
                }
            }

            Ok(newly_added)
        })
        .await
    }

    /// `driftGroupsForExpert(expert_id, exclude_post_ids, since?) ->
    /// [GroupWithAnchor]`. Only rows with `analyzed_by != 'pending'` and
    /// `has_drift = 1` are eligible; anchors whose id is in
    /// `exclude_post_ids` never appear — see Invariant 3.
    pub async fn drift_groups_for_expert(
        &self,
        expert_id: &str,
        exclude_post_ids: Vec<i64>,
        since: Option<DateTime<Utc>>,
    ) -> Result<Vec<GroupWithAnchor>> {
        let expert_id = expert_id.to_string();
        self.with_conn(move |conn| {
            let mut sql = String::from(
                "SELECT d.*, p.channel_id as p_channel_id, p.telegram_message_id as p_tgmsg,
                        p.created_at as p_created_at, p.message_text as p_text,
                        p.author_name as p_author, p.channel_username as p_channel_username
                 FROM comment_group_drift d
                 JOIN posts p ON p.post_id = d.post_id
                 WHERE d.expert_id = ?1 AND d.has_drift = 1 AND d.analyzed_by != 'pending'",
            );
            let mut param_count = 1;
            if !exclude_post_ids.is_empty() {
                let placeholders = (0..exclude_post_ids.len())
                    .map(|i| format!("?{}", i + 2))
                    .collect::<Vec<_>>()
                    .join(",");
                sql.push_str(&format!(" AND d.post_id NOT IN ({placeholders})"));
                param_count += exclude_post_ids.len();
            }
            if since.is_some() {
                sql.push_str(&format!(" AND p.created_at >= ?{}", param_count + 1));
            }

            let mut stmt = conn.prepare(&sql)?;

            let mut params: Vec<Box<dyn rusqlite::ToSql>> = vec![Box::new(expert_id.clone())];
            for id in &exclude_post_ids {
                params.push(Box::new(*id));
            }
            if let Some(since) = since {
                params.push(Box::new(since.to_rfc3339()));
            }

            let mut out = Vec::new();
            let mut rows = stmt.query(params_from_iter(params.iter().map(|p| p.as_ref())))?;
            while let Some(row) = rows.next()? {
                let drift = drift_from_row(row)?;
                let created_raw: String = row.get("p_created_at")?;
                let anchor = Post {
                    post_id: drift.post_id,
                    expert_id: drift.expert_id.clone(),
                    channel_id: row.get("p_channel_id")?,
                    telegram_message_id: row.get("p_tgmsg")?,
                    created_at: DateTime::parse_from_rfc3339(&created_raw)
                        .map(|dt| dt.with_timezone(&Utc))
                        .unwrap_or(DateTime::UNIX_EPOCH),
                    message_text: row.get("p_text")?,
                    author_name: row.get("p_author")?,
                    channel_username: row.get("p_channel_username")?,
                };
                out.push(GroupWithAnchor { drift, anchor });
            }
            Ok(out)
        })
        .await
    }

    pub async fn list_experts(&self) -> Result<Vec<ExpertSummary>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare("SELECT expert_id, display_name, channel_username FROM expert_metadata ORDER BY expert_id")?;
            let experts: Vec<Expert> = stmt
                .query_map([], |row| {
                    Ok(Expert {
                        expert_id: row.get(0)?,
                        display_name: row.get(1)?,
                        channel_username: row.get(2)?,
                    })
                })?
                .collect::<rusqlite::Result<Vec<_>>>()?;

            let mut out = Vec::with_capacity(experts.len());
            for expert in experts {
                let posts_count: i64 = conn.query_row(
                    "SELECT COUNT(*) FROM posts WHERE expert_id = ?1",
                    rusqlite::params![expert.expert_id],
                    |r| r.get(0),
                )?;
                let comments_count: i64 = conn.query_row(
                    "SELECT COUNT(*) FROM comments c JOIN posts p ON p.post_id = c.post_id
                     WHERE p.expert_id = ?1",
                    rusqlite::params![expert.expert_id],
                    |r| r.get(0),
                )?;
                out.push(ExpertSummary {
                    expert_id: expert.expert_id,
                    display_name: expert.display_name,
                    channel_username: expert.channel_username,
                    stats: ExpertStats {
                        posts_count,
                        comments_count,
                    },
                });
            }
            Ok(out)
        })
        .await
    }

    /// Every expert id that owns at least one post, optionally filtered to
    /// those with a post newer than `since`.
    pub async fn experts_with_posts(&self, since: Option<DateTime<Utc>>) -> Result<Vec<String>> {
        self.with_conn(move |conn| {
            let mut stmt = if since.is_some() {
                conn.prepare(
                    "SELECT DISTINCT expert_id FROM posts WHERE created_at >= ?1",
                )?
            } else {
                conn.prepare("SELECT DISTINCT expert_id FROM posts")?
            };
            let rows = if let Some(since) = since {
                stmt.query_map(rusqlite::params![since.to_rfc3339()], |r| r.get(0))?
                    .collect::<rusqlite::Result<Vec<_>>>()?
            } else {
                stmt.query_map([], |r| r.get(0))?
                    .collect::<rusqlite::Result<Vec<_>>>()?
            };
            Ok(rows)
        })
        .await
    }

    /// Raw outbound links for a post, scoped to `expert_id` on both ends.
    /// Exposed mainly for tests exercising [`Self::expand_links`]'s BFS
    /// against a known graph shape.
    pub async fn outbound_links(
        &self,
        post_id: i64,
        expert_id: &str,
    ) -> Result<Vec<quorum_core::types::Link>> {
        let expert_id = expert_id.to_string();
        self.with_conn(move |conn| {
            let mut stmt = conn.prepare(
                "SELECT l.* FROM links l
                 JOIN posts p ON p.post_id = l.source_post_id
                 WHERE l.source_post_id = ?1 AND p.expert_id = ?2",
            )?;
            let rows = stmt
                .query_map(rusqlite::params![post_id, expert_id], link_from_row)?
                .collect::<rusqlite::Result<Vec<_>>>()?;
            Ok(rows)
        })
        .await
    }
}
