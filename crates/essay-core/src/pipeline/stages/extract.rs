//! Document processing stage
//!
//! Analyzes attached reference images and persists the combined extracted
//! content for the drafting stage.

use crate::error::Result;
use crate::pipeline::engine::PipelineEngine;
use crate::pipeline::queue::StageKind;
use essay_types::{ArtifactKind, JobId, JobRecord, JobStatus};

const VISION_PROMPT: &str = "Describe this image in detail. Focus on any data, charts, text, \
     or key visual elements that are relevant for an academic essay.";

pub(crate) async fn run(
    engine: &PipelineEngine,
    job_id: &JobId,
    record: &JobRecord,
    extracted_text: String,
) -> Result<()> {
    let jobs = engine.jobs();

    jobs.advance(
        job_id,
        JobStatus::Extracting,
        5,
        Some("Processing extracted text..."),
        None,
        None,
    )
    .await?;

    let ref_image_count = record.config.ref_image_count;
    let mut image_analysis = String::new();

    if ref_image_count > 0 {
        jobs.advance(
            job_id,
            JobStatus::Extracting,
            8,
            Some(&format!(
                "Analyzing {} reference images...",
                ref_image_count
            )),
            None,
            None,
        )
        .await?;

        for index in 0..ref_image_count {
            let Some(image) = jobs
                .get_artifact(job_id, ArtifactKind::ReferenceImage(index))
                .await?
            else {
                log::warn!(
                    "Reference image {} for job {} is missing, skipping",
                    index,
                    job_id
                );
                continue;
            };

            // A lost description degrades the context; it does not fail the job
            match engine.generator().describe_image(VISION_PROMPT, &image).await {
                Ok(description) => {
                    image_analysis.push_str(&format!(
                        "\n\n[Analysis of Reference Image {}]:\n{}",
                        index + 1,
                        description
                    ));
                }
                Err(e) => {
                    log::warn!(
                        "Failed to analyze reference image {} for job {}: {}",
                        index,
                        job_id,
                        e
                    );
                }
            }
        }
    }

    let full_content = if image_analysis.is_empty() {
        extracted_text
    } else {
        format!(
            "{}\n\n=== REFERENCE IMAGES ANALYSIS ==={}",
            extracted_text, image_analysis
        )
    };

    jobs.put_text(job_id, ArtifactKind::ExtractedContent, &full_content)
        .await?;

    jobs.advance(
        job_id,
        JobStatus::Extracting,
        12,
        Some("Text processing complete"),
        None,
        None,
    )
    .await?;

    engine.enqueue(job_id, StageKind::GenerateDraft).await
}
