use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use quorum_core::types::ProgressEvent;
use quorum_pipeline::ProgressSink;
use tokio::sync::mpsc;
use tracing::warn;

/// Bounded many-producer one-consumer queue of [`ProgressEvent`]. Producers
/// use a non-blocking offer; a full queue drops the event rather than
/// backpressuring the pipeline — a slow SSE consumer can never stall an
/// Expert Pipeline. Every drop increments `dropped`, logged once per burst
/// rather than per event.
pub struct ProgressBus {
    tx: mpsc::Sender<ProgressEvent>,
    dropped: Arc<AtomicU64>,
}

impl ProgressBus {
    pub fn new(capacity: usize) -> (Self, mpsc::Receiver<ProgressEvent>) {
        let (tx, rx) = mpsc::channel(capacity);
        (
            Self {
                tx,
                dropped: Arc::new(AtomicU64::new(0)),
            },
            rx,
        )
    }

    pub fn publish(&self, event: ProgressEvent) {
        if let Err(mpsc::error::TrySendError::Full(_)) = self.tx.try_send(event) {
            let total = self.dropped.fetch_add(1, Ordering::Relaxed) + 1;
            if total == 1 || total % 50 == 0 {
                warn!(total_dropped = total, "progress bus full, dropping event");
            }
        }
    }

    pub fn dropped_count(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }

    /// Adapt this bus into the closure-shaped [`ProgressSink`] the pipeline
    /// crate expects, keeping it decoupled from this bus's concrete type.
    pub fn sink(&self) -> ProgressSink {
        let tx = self.tx.clone();
        let dropped = self.dropped.clone();
        Arc::new(move |event: ProgressEvent| {
            if let Err(mpsc::error::TrySendError::Full(_)) = tx.try_send(event) {
                let total = dropped.fetch_add(1, Ordering::Relaxed) + 1;
                if total == 1 || total % 50 == 0 {
                    warn!(total_dropped = total, "progress bus full, dropping event");
                }
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use quorum_core::types::ProgressEventType;

    #[tokio::test]
    async fn publishes_and_drains() {
        let (bus, mut rx) = ProgressBus::new(4);
        bus.publish(ProgressEvent::new(ProgressEventType::PhaseStart, "map", "running", "go"));
        let event = rx.recv().await.unwrap();
        assert_eq!(event.phase, "map");
    }

    #[tokio::test]
    async fn drops_when_full_without_blocking() {
        let (bus, _rx) = ProgressBus::new(1);
        bus.publish(ProgressEvent::new(ProgressEventType::Progress, "x", "y", "z"));
        bus.publish(ProgressEvent::new(ProgressEventType::Progress, "x", "y", "z"));
        assert_eq!(bus.dropped_count(), 1);
    }
}
