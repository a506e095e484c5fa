//! Pipeline orchestrator
//!
//! Sequences stage functions, advances the job state machine between stages,
//! and exposes the surface the thin HTTP layer calls. Each job has at most
//! one stage in flight at any instant; different jobs run fully in parallel.

use super::queue::{StageKind, StageMessage, StageQueue};
use super::stages;
use crate::clients::{DocumentExtractor, EssayRenderer};
use crate::error::{EssayflowError, Result};
use crate::retry::ResilientGenerator;
use crate::store::JobStore;
use essay_types::{
    ArtifactKind, EssayOutput, JobConfig, JobId, JobRecord, JobStatus, StatusReport,
};
use std::sync::Arc;

/// Rendered output formats available for download
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DownloadFormat {
    Pdf,
    Docx,
}

pub struct PipelineEngine {
    jobs: JobStore,
    generator: ResilientGenerator,
    extractor: Arc<dyn DocumentExtractor>,
    renderer: Arc<dyn EssayRenderer>,
    queue: Arc<dyn StageQueue>,
}

impl PipelineEngine {
    pub fn new(
        jobs: JobStore,
        generator: ResilientGenerator,
        extractor: Arc<dyn DocumentExtractor>,
        renderer: Arc<dyn EssayRenderer>,
        queue: Arc<dyn StageQueue>,
    ) -> Self {
        Self {
            jobs,
            generator,
            extractor,
            renderer,
            queue,
        }
    }

    pub(crate) fn jobs(&self) -> &JobStore {
        &self.jobs
    }

    pub(crate) fn generator(&self) -> &ResilientGenerator {
        &self.generator
    }

    pub(crate) fn renderer(&self) -> &Arc<dyn EssayRenderer> {
        &self.renderer
    }

    pub(crate) async fn enqueue(&self, job_id: &JobId, stage: StageKind) -> Result<()> {
        self.queue
            .enqueue(StageMessage {
                job_id: job_id.clone(),
                stage,
            })
            .await
    }

    /// Submit a document and start the generate pipeline.
    ///
    /// Extraction runs before the job record is created - a failure here
    /// prevents job creation entirely rather than producing a failed job.
    pub async fn submit_document(
        &self,
        document: &[u8],
        format_hint: &str,
        mut config: JobConfig,
        filename: Option<String>,
        ref_images: Vec<Vec<u8>>,
    ) -> Result<JobId> {
        let text = self.extractor.extract(document, format_hint).await?;

        config.ref_image_count = ref_images.len() as u32;
        let record = JobRecord::new(JobId::new(), config, filename);
        let job_id = record.job_id.clone();

        self.jobs.create_job(&record).await?;
        for (index, image) in ref_images.into_iter().enumerate() {
            self.jobs
                .put_artifact(&job_id, ArtifactKind::ReferenceImage(index as u32), image)
                .await?;
        }

        self.enqueue(&job_id, StageKind::ProcessDocument { text })
            .await?;

        log::info!("Created job {} (generate pipeline)", job_id);
        Ok(job_id)
    }

    /// Submit pasted or imported raw text and start the import pipeline
    pub async fn submit_text(&self, raw_text: String, config: JobConfig) -> Result<JobId> {
        let instructions = config.instructions.clone();
        let record = JobRecord::new(JobId::new(), config, None);
        let job_id = record.job_id.clone();

        self.jobs.create_job(&record).await?;
        self.enqueue(
            &job_id,
            StageKind::StructureImport {
                raw_text,
                instructions,
            },
        )
        .await?;

        log::info!("Created job {} (import pipeline)", job_id);
        Ok(job_id)
    }

    /// Pure read for polling clients
    pub async fn status(&self, job_id: &JobId) -> Result<StatusReport> {
        let record = self.jobs.require_job(job_id).await?;
        Ok(StatusReport::from(&record))
    }

    /// Explicit refine request. Only legal while the job waits for review;
    /// any other state is rejected and the job is left unchanged.
    pub async fn refine(&self, job_id: &JobId, instructions: String) -> Result<()> {
        self.require_waiting_for_review(job_id, "refined").await?;
        self.enqueue(job_id, StageKind::Refine { instructions })
            .await
    }

    /// Explicit finalize request: leave the review cycle and render
    pub async fn finalize(&self, job_id: &JobId) -> Result<()> {
        self.require_waiting_for_review(job_id, "finalized").await?;
        self.enqueue(job_id, StageKind::Render).await
    }

    async fn require_waiting_for_review(&self, job_id: &JobId, action: &str) -> Result<()> {
        let record = self.jobs.require_job(job_id).await?;

        if record.status != JobStatus::WaitingForReview {
            return Err(EssayflowError::Validation(format!(
                "Job {} cannot be {} while in state '{}'",
                job_id, action, record.status
            )));
        }

        Ok(())
    }

    /// Latest essay content: the humanized artifact, falling back to the
    /// draft when humanization has not produced one yet
    pub async fn content(&self, job_id: &JobId) -> Result<EssayOutput> {
        self.jobs.require_job(job_id).await?;

        if let Some(essay) = self.jobs.get_essay(job_id, ArtifactKind::Humanized).await? {
            return Ok(essay);
        }
        if let Some(essay) = self.jobs.get_essay(job_id, ArtifactKind::Draft).await? {
            return Ok(essay);
        }

        Err(EssayflowError::NotFound(format!(
            "Essay content not available yet for job {}",
            job_id
        )))
    }

    /// Rendered output download; only legal once the job has completed
    pub async fn download(&self, job_id: &JobId, format: DownloadFormat) -> Result<Vec<u8>> {
        let record = self.jobs.require_job(job_id).await?;

        if record.status != JobStatus::Completed {
            return Err(EssayflowError::Validation(format!(
                "Essay is not ready yet. Current status: {}",
                record.status
            )));
        }

        let kind = match format {
            DownloadFormat::Pdf => ArtifactKind::RenderedPdf,
            DownloadFormat::Docx => ArtifactKind::RenderedDocx,
        };
        self.jobs.require_artifact(job_id, kind).await
    }

    /// Execute one queued stage message to completion.
    ///
    /// Delivery is at-least-once: messages for unknown (expired) jobs and for
    /// jobs already in a terminal state are dropped, so a re-delivery can
    /// never un-fail or re-open a finished job. A stage error fails the job
    /// and aborts the remaining chain.
    pub async fn run_stage(&self, message: StageMessage) {
        let job_id = message.job_id.clone();

        let record = match self.jobs.load_job(&job_id).await {
            Ok(Some(record)) => record,
            Ok(None) => {
                log::warn!(
                    "Dropping stage '{}' for unknown or expired job {}",
                    message.stage.name(),
                    job_id
                );
                return;
            }
            Err(e) => {
                log::error!("Failed to load job {} for stage dispatch: {}", job_id, e);
                return;
            }
        };

        if record.status.is_terminal() {
            log::warn!(
                "Dropping stage '{}' for job {} already in terminal state '{}'",
                message.stage.name(),
                job_id,
                record.status
            );
            return;
        }

        log::info!("Running stage '{}' for job {}", message.stage.name(), job_id);

        let result = match message.stage {
            StageKind::ProcessDocument { text } => {
                stages::extract::run(self, &job_id, &record, text).await
            }
            StageKind::GenerateDraft => stages::draft::run(self, &job_id, &record).await,
            StageKind::Humanize => stages::humanize::run(self, &job_id, &record).await,
            StageKind::Refine { instructions } => {
                stages::refine::run(self, &job_id, &instructions).await
            }
            StageKind::StructureImport {
                raw_text,
                instructions,
            } => stages::structure::run(self, &job_id, &raw_text, instructions.as_deref()).await,
            StageKind::Render => stages::render::run(self, &job_id, &record).await,
        };

        if let Err(e) = result {
            self.fail_job(&job_id, &e).await;
        }
    }

    /// Abort the chain: record the error text, preserve the progress value at
    /// failure time, and schedule no further work
    async fn fail_job(&self, job_id: &JobId, error: &EssayflowError) {
        log::error!("Job {} failed: {}", job_id, error);

        let progress = match self.jobs.load_job(job_id).await {
            Ok(Some(record)) => record.progress,
            _ => 0,
        };

        let error_text = error.to_string();
        let message = format!("Processing failed: {}", error_text);

        if let Err(advance_err) = self
            .jobs
            .advance(
                job_id,
                JobStatus::Failed,
                progress,
                Some(&message),
                None,
                Some(&error_text),
            )
            .await
        {
            log::error!(
                "Failed to record failure for job {}: {}",
                job_id,
                advance_err
            );
        }
    }
}
