//! Refinement stage
//!
//! Applies reviewer feedback to the current essay, or answers a question the
//! reviewer asked, then returns the job to the review state. The review and
//! refine states may cycle an unbounded number of times.

use crate::codec::decode_or_fallback;
use crate::error::{EssayflowError, Result};
use crate::pipeline::engine::PipelineEngine;
use crate::retry::Checkpoint;
use essay_types::{ArtifactKind, EssayOutput, JobId, JobStatus};

const REFINER_SYSTEM_PROMPT: &str =
    "You are an intelligent academic editor. Output valid JSON only.";

pub(crate) async fn run(
    engine: &PipelineEngine,
    job_id: &JobId,
    instructions: &str,
) -> Result<()> {
    let jobs = engine.jobs();

    jobs.advance(
        job_id,
        JobStatus::Refining,
        85,
        Some("Refining essay..."),
        None,
        None,
    )
    .await?;

    let essay = jobs
        .get_essay(job_id, ArtifactKind::Humanized)
        .await?
        .ok_or_else(|| {
            EssayflowError::MissingArtifact(format!("no essay found to refine for job {}", job_id))
        })?;

    let current_word_count = essay.body_word_count();
    let essay_json = serde_json::to_string_pretty(&essay)?;

    let raw = engine
        .generator()
        .generate(
            job_id,
            Checkpoint::new(JobStatus::Refining, 85),
            REFINER_SYSTEM_PROMPT,
            &refinement_prompt(instructions, current_word_count, &essay_json),
            4000,
        )
        .await?;

    // A malformed response keeps the previous version; the reviewer is told
    // via the feedback field instead of the job failing
    let mut updated: EssayOutput = decode_or_fallback(&raw, |_| {
        let mut kept = essay.clone();
        kept.ai_feedback = Some(
            "The refinement response could not be applied; the previous version was kept."
                .to_string(),
        );
        kept
    });
    updated.total_word_count = Some(updated.body_word_count());

    jobs.put_essay(job_id, ArtifactKind::Humanized, &updated)
        .await?;

    jobs.advance(
        job_id,
        JobStatus::WaitingForReview,
        85,
        Some("Refinement complete"),
        None,
        None,
    )
    .await
}

fn refinement_prompt(instructions: &str, current_word_count: u32, essay_json: &str) -> String {
    format!(
        "You are an expert academic editor.\n\
         Refinement Instructions from User:\n\"{}\"\n\
         Current Essay Stats:\n\
         - REAL Word Count: {} words (excluding references).\n\
         Current Essay JSON:\n{}\n\
         Task:\n\
         1. If the user asks a question (e.g. \"what is the word count?\"), answer it in the \
         'ai_feedback' field and keep the essay content unchanged. Use the REAL word count \
         provided above.\n\
         2. If the user asks for edits (e.g. \"Expand to 2500 words\"), apply them to the \
         introduction, body sections, and conclusion.\n\
         3. Summarize what you did, or answer the question, in the 'ai_feedback' field.\n\
         4. Keep the JSON structure EXACTLY the same as the input schema, adding 'ai_feedback' \
         at the root level.\n\
         5. Do NOT remove references unless explicitly asked.\n\
         6. Maintain academic tone unless asked to change it.\n\
         Return ONLY the valid updated JSON with the 'ai_feedback' field populated.",
        instructions, current_word_count, essay_json
    )
}
