use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;

use serde_json::Value;
use tokio::sync::Mutex;
use tracing::{info, warn};

use crate::error::{RedditError, Result};
use crate::mcp_client::McpChild;

/// Lifecycle of the managed child process, transitions logged at every
/// step. `Dead` carries the reason the last child went away.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WatchdogState {
    Spawning,
    Ready,
    Killing,
    Dead(String),
}

struct Guarded {
    child: Option<McpChild>,
    state: WatchdogState,
}

/// Keeps one child MCP server alive behind a single-flight queue.
/// `execute` is the only entry point callers see — it hides spawning,
/// the hard per-call timeout, and SIGKILL-and-respawn behind one call.
/// Concurrency=1 is enforced by holding the queue's lock across the whole
/// call, including its timeout — a correctness requirement, not a
/// throttle, since the wire protocol has no request/response id space the
/// child itself guarantees to honor under overlap.
pub struct Watchdog {
    command: String,
    args: Vec<String>,
    call_timeout: Duration,
    force_cleanup: Duration,
    restart_budget: u32,
    restarts: AtomicU32,
    queue: Mutex<Guarded>,
}

impl Watchdog {
    pub fn new(
        command: String,
        args: Vec<String>,
        call_timeout: Duration,
        force_cleanup: Duration,
        restart_budget: u32,
    ) -> Self {
        Self {
            command,
            args,
            call_timeout,
            force_cleanup,
            restart_budget,
            restarts: AtomicU32::new(0),
            queue: Mutex::new(Guarded {
                child: None,
                state: WatchdogState::Dead("not started".to_string()),
            }),
        }
    }

    pub async fn is_ready(&self) -> bool {
        matches!(self.queue.lock().await.state, WatchdogState::Ready)
    }

    pub fn restart_count(&self) -> u32 {
        self.restarts.load(Ordering::Relaxed)
    }

    async fn spawn_locked(&self, inner: &mut Guarded) -> Result<()> {
        inner.state = WatchdogState::Spawning;
        let mut child =
            McpChild::spawn(&self.command, &self.args).map_err(|e| RedditError::ChildUnavailable(e.to_string()))?;
        child.initialize().await?;
        inner.child = Some(child);
        inner.state = WatchdogState::Ready;
        info!("mcp child ready");
        Ok(())
    }

    async fn kill_locked(&self, inner: &mut Guarded, reason: &str) {
        inner.state = WatchdogState::Killing;
        if let Some(child) = inner.child.take() {
            if let Some(pid) = child.pid() {
                // SIGKILL first and directly — the wedged child may never
                // observe anything softer.
                unsafe {
                    libc::kill(pid as i32, libc::SIGKILL);
                }
            }
            if tokio::time::timeout(self.force_cleanup, child.shutdown()).await.is_err() {
                warn!(reason, "mcp child did not tear down within the force-cleanup window");
            }
        }
        warn!(reason, "mcp child killed");
        inner.state = WatchdogState::Dead(reason.to_string());
    }

    /// Run one tool call end to end: ensure a ready child, enforce the
    /// hard timeout, and on timeout kill-and-mark-dead so the *next* call
    /// respawns — this call still returns the timeout error.
    pub async fn execute(&self, tool: &str, args: Value) -> Result<Value> {
        let mut inner = self.queue.lock().await;

        if !matches!(inner.state, WatchdogState::Ready) {
            if self.restarts.load(Ordering::Relaxed) >= self.restart_budget {
                return Err(RedditError::Unstable);
            }
            if let Err(e) = self.spawn_locked(&mut inner).await {
                inner.state = WatchdogState::Dead(e.to_string());
                self.restarts.fetch_add(1, Ordering::Relaxed);
                return Err(e);
            }
        }

        let Some(child) = inner.child.as_mut() else {
            return Err(RedditError::ChildUnavailable("child missing after spawn".to_string()));
        };

        match tokio::time::timeout(self.call_timeout, child.call_tool(tool, args)).await {
            Ok(Ok(result)) => Ok(result),
            Ok(Err(e)) => Err(e),
            Err(_) => {
                self.kill_locked(&mut inner, "call timeout").await;
                self.restarts.fetch_add(1, Ordering::Relaxed);
                Err(RedditError::Timeout(self.call_timeout.as_millis() as u64))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn starts_dead_and_reports_not_ready() {
        let watchdog = Watchdog::new(
            "true".to_string(),
            vec![],
            Duration::from_millis(100),
            Duration::from_millis(100),
            10,
        );
        assert!(!watchdog.is_ready().await);
    }

    #[tokio::test]
    async fn unreachable_command_surfaces_child_unavailable_and_counts_a_restart() {
        let watchdog = Watchdog::new(
            "/nonexistent/quorum-reddit-mcp-test-binary".to_string(),
            vec![],
            Duration::from_millis(200),
            Duration::from_millis(100),
            10,
        );
        let result = watchdog.execute("search_reddit", serde_json::json!({})).await;
        assert!(result.is_err());
        assert_eq!(watchdog.restart_count(), 1);
    }

    #[tokio::test]
    async fn restart_budget_exhaustion_surfaces_unstable() {
        let watchdog = Watchdog::new(
            "/nonexistent/quorum-reddit-mcp-test-binary".to_string(),
            vec![],
            Duration::from_millis(200),
            Duration::from_millis(100),
            2,
        );
        for _ in 0..2 {
            let _ = watchdog.execute("search_reddit", serde_json::json!({})).await;
        }
        let result = watchdog.execute("search_reddit", serde_json::json!({})).await;
        assert!(matches!(result, Err(RedditError::Unstable)));
    }
}
