pub mod comments;
pub mod error;
pub mod map;
pub mod phase;
pub mod pipeline;
pub mod progress;
pub mod reduce;
pub mod resolve;
pub mod score;
pub mod validate;

pub use error::{PipelineError, Result};
pub use phase::PhaseOutcome;
pub use pipeline::ExpertPipeline;
pub use progress::ProgressSink;
