pub mod error;
pub mod orchestrator;
pub mod progress_bus;
pub mod reddit_client;
pub mod sse;

pub use error::{OrchestratorError, Result};
pub use orchestrator::QueryOrchestrator;
pub use progress_bus::ProgressBus;
pub use reddit_client::RedditClient;
pub use sse::{encode_event, keep_alive_wrap, keepalive_padding, SseLine};
