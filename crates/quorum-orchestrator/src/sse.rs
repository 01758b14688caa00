use std::time::Duration;

use async_stream::stream;
use quorum_core::types::ProgressEvent;
use tokio::sync::mpsc;
use tokio_stream::Stream;

const KEEPALIVE_INTERVAL: Duration = Duration::from_secs(5);
const KEEPALIVE_PADDING_BYTES: usize = 2048;

/// One line of the outgoing SSE stream. `Data` carries an actual
/// [`ProgressEvent`]; `KeepAlive` is synthesized whenever the bus has been
/// idle for [`KEEPALIVE_INTERVAL`] to defeat intermediate proxy buffering.
pub enum SseLine {
    Data(ProgressEvent),
    KeepAlive,
}

/// Drain `rx`, injecting a [`SseLine::KeepAlive`] every 5 seconds of
/// idleness. Ends when the channel closes (all producers dropped).
pub fn keep_alive_wrap(mut rx: mpsc::Receiver<ProgressEvent>) -> impl Stream<Item = SseLine> {
    stream! {
        loop {
            match tokio::time::timeout(KEEPALIVE_INTERVAL, rx.recv()).await {
                Ok(Some(event)) => yield SseLine::Data(event),
                Ok(None) => break,
                Err(_) => yield SseLine::KeepAlive,
            }
        }
    }
}

/// Render a keep-alive line: a `: keepalive` comment followed by ≥2 KB of
/// whitespace padding, both forced to the wire by a caller-side flush.
pub fn keepalive_padding() -> String {
    " ".repeat(KEEPALIVE_PADDING_BYTES)
}

/// Render one [`ProgressEvent`] as the single-line JSON payload the `data:`
/// field carries. Never panics — a serialization failure falls back to a
/// minimal error event rather than dropping the line silently.
pub fn encode_event(event: &ProgressEvent) -> String {
    serde_json::to_string(event).unwrap_or_else(|e| {
        format!(r#"{{"event_type":"error","phase":"sse","status":"failed","message":"encode failed: {e}"}}"#)
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use quorum_core::types::ProgressEventType;
    use tokio_stream::StreamExt;

    #[tokio::test(start_paused = true)]
    async fn emits_keepalive_on_idle() {
        let (tx, rx) = mpsc::channel(8);
        let mut stream = Box::pin(keep_alive_wrap(rx));

        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_secs(12)).await;
            drop(tx);
        });

        let mut keepalives = 0;
        let mut total = 0;
        while let Some(line) = stream.next().await {
            total += 1;
            if matches!(line, SseLine::KeepAlive) {
                keepalives += 1;
            }
            if total > 10 {
                break;
            }
        }
        assert!(keepalives >= 2);
    }

    #[tokio::test]
    async fn data_line_passes_through_immediately() {
        let (tx, rx) = mpsc::channel(8);
        let mut stream = Box::pin(keep_alive_wrap(rx));
        tx.send(ProgressEvent::new(ProgressEventType::PhaseStart, "map", "running", "go"))
            .await
            .unwrap();
        match stream.next().await {
            Some(SseLine::Data(event)) => assert_eq!(event.phase, "map"),
            _ => panic!("expected a data line"),
        }
    }

    #[test]
    fn padding_is_at_least_2kb() {
        assert!(keepalive_padding().len() >= 2048);
    }
}
