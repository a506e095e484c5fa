//! Pipeline orchestration
//!
//! Stage chaining, dispatch, and the worker pool. Pipelines are fixed,
//! linearly-chained sequences per job type - this is not a general-purpose
//! workflow engine.

pub mod engine;
pub mod plan;
pub mod queue;
pub(crate) mod stages;

pub use engine::{DownloadFormat, PipelineEngine};
pub use queue::{InProcessQueue, StageKind, StageMessage, StageQueue, WorkerPool};
