//! Stage dispatch messages, the queue seam, and the worker pool
//!
//! Stage-to-stage handoff is a fire-and-forget enqueue. Messages are
//! serializable so the seam can be backed by a durable broker; delivery is
//! at-least-once, which the engine tolerates by dropping messages for
//! terminal jobs and letting stages overwrite their own artifacts.

use super::engine::PipelineEngine;
use crate::error::{EssayflowError, Result};
use async_trait::async_trait;
use essay_types::JobId;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::{mpsc, Mutex};

/// One unit of pipeline work, addressed to a job
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StageMessage {
    pub job_id: JobId,
    pub stage: StageKind,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum StageKind {
    ProcessDocument { text: String },
    GenerateDraft,
    Humanize,
    Refine { instructions: String },
    StructureImport {
        raw_text: String,
        instructions: Option<String>,
    },
    Render,
}

impl StageKind {
    pub fn name(&self) -> &'static str {
        match self {
            Self::ProcessDocument { .. } => "process_document",
            Self::GenerateDraft => "generate_draft",
            Self::Humanize => "humanize",
            Self::Refine { .. } => "refine",
            Self::StructureImport { .. } => "structure_import",
            Self::Render => "render",
        }
    }
}

/// Fire-and-forget stage handoff
#[async_trait]
pub trait StageQueue: Send + Sync {
    async fn enqueue(&self, message: StageMessage) -> Result<()>;
}

/// In-process queue backed by an unbounded channel
pub struct InProcessQueue {
    sender: mpsc::UnboundedSender<StageMessage>,
}

impl InProcessQueue {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<StageMessage>) {
        let (sender, receiver) = mpsc::unbounded_channel();
        (Self { sender }, receiver)
    }
}

#[async_trait]
impl StageQueue for InProcessQueue {
    async fn enqueue(&self, message: StageMessage) -> Result<()> {
        self.sender
            .send(message)
            .map_err(|e| EssayflowError::Stage(format!("Stage queue closed: {}", e)))
    }
}

/// Fixed-size pool of workers draining the stage queue.
///
/// Jobs run fully in parallel across workers; within one job, stages stay
/// strictly sequential because the next stage is only enqueued after the
/// previous stage's artifact is durably persisted.
pub struct WorkerPool {
    handles: Vec<tokio::task::JoinHandle<()>>,
}

impl WorkerPool {
    pub fn spawn(
        engine: Arc<PipelineEngine>,
        receiver: mpsc::UnboundedReceiver<StageMessage>,
        workers: usize,
    ) -> Self {
        let receiver = Arc::new(Mutex::new(receiver));
        let mut handles = Vec::with_capacity(workers);

        for worker_id in 0..workers {
            let engine = engine.clone();
            let receiver = receiver.clone();

            handles.push(tokio::spawn(async move {
                loop {
                    let message = { receiver.lock().await.recv().await };

                    let Some(message) = message else {
                        log::info!("Worker {} shutting down: queue closed", worker_id);
                        break;
                    };

                    log::debug!(
                        "Worker {} picked up stage '{}' for job {}",
                        worker_id,
                        message.stage.name(),
                        message.job_id
                    );
                    engine.run_stage(message).await;
                }
            }));
        }

        Self { handles }
    }

    /// Wait for every worker to drain and exit (the queue sender must be
    /// dropped first)
    pub async fn join(self) {
        futures::future::join_all(self.handles).await;
    }
}
