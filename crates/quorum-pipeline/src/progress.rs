use std::sync::Arc;

use quorum_core::types::ProgressEvent;

/// Callback the pipeline uses to publish progress without knowing anything
/// about the transport behind it. The orchestrator supplies a closure that
/// does a non-blocking `try_send` into its bounded [`ProgressBus`] — no
/// hidden capture of pipeline internals, matching the "no shared mutable
/// progress callback" redesign.
pub type ProgressSink = Arc<dyn Fn(ProgressEvent) + Send + Sync>;
