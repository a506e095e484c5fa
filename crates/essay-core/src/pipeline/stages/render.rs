//! Rendering stage (terminal formatting)
//!
//! Invokes the rendering collaborator once and persists both output kinds.
//! Rendering failures are fatal for the job.

use crate::clients::RenderMetadata;
use crate::error::{EssayflowError, Result};
use crate::pipeline::engine::PipelineEngine;
use essay_types::{ArtifactKind, JobId, JobRecord, JobStatus};

pub(crate) async fn run(
    engine: &PipelineEngine,
    job_id: &JobId,
    record: &JobRecord,
) -> Result<()> {
    let jobs = engine.jobs();

    jobs.advance(
        job_id,
        JobStatus::Formatting,
        90,
        Some("Rendering final documents..."),
        None,
        None,
    )
    .await?;

    // The humanized artifact is the reviewed version; the draft stands in if
    // humanization never produced one
    let essay = match jobs.get_essay(job_id, ArtifactKind::Humanized).await? {
        Some(essay) => essay,
        None => jobs
            .get_essay(job_id, ArtifactKind::Draft)
            .await?
            .ok_or_else(|| {
                EssayflowError::MissingArtifact(format!("no essay found to render for job {}", job_id))
            })?,
    };

    let metadata = RenderMetadata {
        author_name: record.config.author_name.clone(),
        course_name: record.config.course_name.clone(),
    };

    let rendered = engine.renderer().render(&essay, &metadata).await?;

    jobs.put_artifact(job_id, ArtifactKind::RenderedPdf, rendered.pdf_bytes)
        .await?;
    jobs.put_artifact(job_id, ArtifactKind::RenderedDocx, rendered.docx_bytes)
        .await?;

    let download_ref = format!("/api/download/{}", job_id);

    jobs.advance(
        job_id,
        JobStatus::Completed,
        100,
        Some("Essay generation complete!"),
        Some(&download_ref),
        None,
    )
    .await
}
