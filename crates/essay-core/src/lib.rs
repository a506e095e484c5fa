//! EssayFlow Core Library
//!
//! The job orchestration engine for the EssayFlow document pipeline: the job
//! state machine, the stage-chaining orchestrator, the resilient wrapper
//! around external generation calls, and the shared state store. The thin
//! HTTP surface, document parsers, and document renderers are external
//! collaborators consumed through the traits in [`clients`].

pub mod clients;
pub mod codec;
pub mod config;
pub mod error;
pub mod pipeline;
pub mod retry;
pub mod store;

// Re-export main types for easy access
pub use config::EssayflowConfig;
pub use error::{EssayflowError, Result};

// Re-export collaborator interfaces and shipped clients
pub use clients::{
    DocumentExtractor, EssayRenderer, GenerationClient, OpenAiClient, PlainTextExtractor,
    RenderMetadata, RenderServiceClient, RenderedDocument,
};

// Re-export the orchestration surface
pub use pipeline::{
    DownloadFormat, InProcessQueue, PipelineEngine, StageKind, StageMessage, StageQueue,
    WorkerPool,
};

pub use retry::{Checkpoint, ResilientGenerator};
pub use store::{JobStore, MemoryStore, RedisStore, StateStore, RETENTION_TTL_SECS};
