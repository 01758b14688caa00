use std::process::Stdio;

use serde_json::{json, Value};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::process::{Child, ChildStdin, ChildStdout};

use crate::error::{RedditError, Result};

/// One JSON-RPC 2.0 connection to a child MCP server over its stdio.
/// Framing is newline-delimited JSON; the single-flight queue above this
/// guarantees at most one `call` is in flight, so responses never need to
/// be demultiplexed against concurrent requests — a stray line with a
/// non-matching id is simply a notification and is skipped.
pub struct McpChild {
    child: Child,
    stdin: ChildStdin,
    stdout: BufReader<ChildStdout>,
    next_id: u64,
}

impl McpChild {
    pub fn spawn(command: &str, args: &[String]) -> std::io::Result<Self> {
        let mut child = tokio::process::Command::new(command)
            .args(args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .kill_on_drop(true)
            .spawn()?;
        let stdin = child
            .stdin
            .take()
            .ok_or_else(|| std::io::Error::other("child spawned without a stdin pipe"))?;
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| std::io::Error::other("child spawned without a stdout pipe"))?;
        Ok(Self {
            child,
            stdin,
            stdout: BufReader::new(stdout),
            next_id: 0,
        })
    }

    pub fn pid(&self) -> Option<u32> {
        self.child.id()
    }

    async fn call(&mut self, method: &str, params: Value) -> Result<Value> {
        self.next_id += 1;
        let id = self.next_id;
        let request = json!({"jsonrpc": "2.0", "id": id, "method": method, "params": params});
        let line = serde_json::to_string(&request)
            .map_err(|e| RedditError::BadOutput(e.to_string()))?
            + "\n";
        self.stdin
            .write_all(line.as_bytes())
            .await
            .map_err(|e| RedditError::ChildUnavailable(e.to_string()))?;
        self.stdin
            .flush()
            .await
            .map_err(|e| RedditError::ChildUnavailable(e.to_string()))?;

        loop {
            let mut buf = String::new();
            let n = self
                .stdout
                .read_line(&mut buf)
                .await
                .map_err(|e| RedditError::ChildUnavailable(e.to_string()))?;
            if n == 0 {
                return Err(RedditError::ChildUnavailable("child closed stdout".to_string()));
            }
            let trimmed = buf.trim();
            if trimmed.is_empty() {
                continue;
            }
            let value: Value = match serde_json::from_str(trimmed) {
                Ok(v) => v,
                Err(_) => continue,
            };
            if value.get("id").and_then(Value::as_u64) != Some(id) {
                continue;
            }
            if let Some(error) = value.get("error") {
                return Err(RedditError::ToolError(error.to_string()));
            }
            return Ok(value.get("result").cloned().unwrap_or(Value::Null));
        }
    }

    pub async fn initialize(&mut self) -> Result<()> {
        self.call(
            "initialize",
            json!({
                "protocolVersion": "2024-11-05",
                "capabilities": {},
                "clientInfo": {"name": "quorum-reddit", "version": env!("CARGO_PKG_VERSION")},
            }),
        )
        .await?;
        Ok(())
    }

    pub async fn call_tool(&mut self, name: &str, arguments: Value) -> Result<Value> {
        self.call("tools/call", json!({"name": name, "arguments": arguments}))
            .await
    }

    pub async fn shutdown(mut self) {
        let _ = self.child.start_kill();
        let _ = self.child.wait().await;
    }
}
