//! Humanization stage
//!
//! Rewrites the draft to sound naturally human-written, then parks the job
//! in the review state. The chain stops here - only an explicit refine or
//! finalize request moves the job further.

use crate::codec::decode_or_fallback;
use crate::error::{EssayflowError, Result};
use crate::pipeline::engine::PipelineEngine;
use crate::retry::Checkpoint;
use essay_types::{ArtifactKind, EssayOutput, HumanizationSettings, JobId, JobRecord, JobStatus};

const HUMANIZER_SYSTEM_PROMPT: &str = "You are an expert editor who humanizes AI-generated \
     text. You MUST strictly follow the user's additional style instructions if provided.";

pub(crate) async fn run(
    engine: &PipelineEngine,
    job_id: &JobId,
    record: &JobRecord,
) -> Result<()> {
    let jobs = engine.jobs();

    jobs.advance(
        job_id,
        JobStatus::Humanizing,
        80,
        Some("Humanizing essay content..."),
        None,
        None,
    )
    .await?;

    let draft = jobs
        .get_essay(job_id, ArtifactKind::Draft)
        .await?
        .ok_or_else(|| {
            EssayflowError::MissingArtifact(format!("no draft found for job {}", job_id))
        })?;

    let settings = &record.config.humanization;
    let instructions = record
        .config
        .instructions
        .clone()
        .unwrap_or_else(|| "No additional style instructions.".to_string());

    // The rewrite tends to drop references; detach them and reattach the
    // originals afterwards
    let original_references = draft.references.clone();
    let mut draft_body = draft.clone();
    draft_body.references = Vec::new();
    let draft_json = serde_json::to_string_pretty(&draft_body)?;

    let raw = engine
        .generator()
        .generate(
            job_id,
            Checkpoint::new(JobStatus::Humanizing, 80),
            HUMANIZER_SYSTEM_PROMPT,
            &humanization_prompt(settings, &instructions, &draft_json),
            4000,
        )
        .await?;

    // Parse failure keeps the draft so the review step still has content
    let mut humanized: EssayOutput = decode_or_fallback(&raw, |_| draft_body.clone());
    humanized.references = original_references;
    humanized.total_word_count = Some(humanized.body_word_count());

    jobs.put_essay(job_id, ArtifactKind::Humanized, &humanized)
        .await?;

    // The chain ends here; review requires external input
    jobs.advance(
        job_id,
        JobStatus::WaitingForReview,
        85,
        Some("Ready for review"),
        None,
        None,
    )
    .await
}

fn humanization_prompt(
    settings: &HumanizationSettings,
    instructions: &str,
    draft_json: &str,
) -> String {
    format!(
        "Rewrite the following academic essay to sound more naturally human-written while \
         maintaining academic quality. Apply these techniques:\n\
         1. BURSTINESS: vary sentence length significantly; mix short punchy sentences with \
         longer, more complex ones.\n\
         2. PERPLEXITY: use unexpected but appropriate word choices occasionally; avoid \
         overly predictable phrasing.\n\
         3. Natural imperfections: add minor stylistic variations that feel authentic.\n\
         Humanization Intensity: {} (0=minimal, 1=aggressive)\n\
         Preserve Citations: {}\n\
         Vary Sentence Length: {}\n\
         USER ADDITIONAL INSTRUCTIONS (MUST FOLLOW FOR STYLE/TONE):\n{}\n\
         Maintain the essay's academic integrity, proper citations, and factual accuracy.\n\
         Essay to humanize:\n{}\n\
         Return the humanized essay in the same JSON structure (excluding references).",
        settings.intensity,
        settings.preserve_citations,
        settings.vary_sentence_length,
        instructions,
        draft_json
    )
}
