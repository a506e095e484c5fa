//! Structuring stage (import pipeline)
//!
//! Turns pasted or imported raw text directly into the essay schema so it
//! can be reviewed and refined. Optionally chains straight into a refine
//! cycle when steering instructions were supplied with the import.

use crate::codec::decode_or_fallback;
use crate::error::{EssayflowError, Result};
use crate::pipeline::engine::PipelineEngine;
use crate::pipeline::queue::StageKind;
use crate::retry::Checkpoint;
use essay_types::{word_count, ArtifactKind, EssayOutput, EssaySection, JobId, JobStatus};

const STRUCTURER_SYSTEM_PROMPT: &str =
    "You are a strict JSON formatter. Output ONLY valid JSON matching the schema.";

/// Token-overflow guard for absurdly large pastes
const MAX_INPUT_CHARS: usize = 15_000;

pub(crate) async fn run(
    engine: &PipelineEngine,
    job_id: &JobId,
    raw_text: &str,
    instructions: Option<&str>,
) -> Result<()> {
    let jobs = engine.jobs();

    jobs.advance(
        job_id,
        JobStatus::Planning,
        10,
        Some("Analyzing essay structure..."),
        None,
        None,
    )
    .await?;

    if raw_text.trim().len() < 50 {
        return Err(EssayflowError::Validation(
            "Input text is too short to process".to_string(),
        ));
    }

    let clipped: String = raw_text.chars().take(MAX_INPUT_CHARS).collect();

    let raw = engine
        .generator()
        .generate(
            job_id,
            Checkpoint::new(JobStatus::Planning, 10),
            STRUCTURER_SYSTEM_PROMPT,
            &structuring_prompt(&clipped),
            4000,
        )
        .await?;

    // Fallback: the whole text becomes a single untitled body section, still
    // editable through the review cycle
    let essay: EssayOutput = decode_or_fallback(&raw, |_| fallback_essay(raw_text));

    // Stored under the same kind the review surface reads
    jobs.put_essay(job_id, ArtifactKind::Humanized, &essay)
        .await?;

    match instructions {
        Some(extra) if extra.trim().len() > 5 => {
            jobs.advance(
                job_id,
                JobStatus::Refining,
                20,
                Some("Structure complete. Applying initial refinement..."),
                None,
                None,
            )
            .await?;

            engine
                .enqueue(
                    job_id,
                    StageKind::Refine {
                        instructions: extra.to_string(),
                    },
                )
                .await
        }
        _ => {
            jobs.advance(
                job_id,
                JobStatus::WaitingForReview,
                85,
                Some("Import complete"),
                None,
                None,
            )
            .await
        }
    }
}

fn fallback_essay(raw_text: &str) -> EssayOutput {
    let words = word_count(raw_text);

    EssayOutput {
        title: "Imported Essay".to_string(),
        thesis_statement: String::new(),
        introduction: String::new(),
        body_sections: vec![EssaySection {
            title: "Body".to_string(),
            content: raw_text.to_string(),
            word_count: Some(words),
        }],
        conclusion: String::new(),
        references: Vec::new(),
        total_word_count: Some(words),
        academic_level: None,
        ai_feedback: None,
    }
}

fn structuring_prompt(raw_text: &str) -> String {
    format!(
        "You are an Essay Parser.\n\
         TASK: Take the following Raw Essay Text and structure it EXACTLY into the JSON \
         schema below.\n\
         RULES:\n\
         1. Identify the 'title' (explicit, or a simple one based on content).\n\
         2. Identify the 'thesis_statement' (usually the last sentence of the intro, or \
         infer the main argument).\n\
         3. Identify the 'introduction' (first paragraphs).\n\
         4. Split the main body into logical 'body_sections' based on topic changes, each \
         with a short 'title'.\n\
         5. Identify the 'conclusion' (last paragraphs).\n\
         6. Extract the 'references' list, capturing FULL reference entries, not in-text \
         citations; return an empty list if no references section exists.\n\
         7. PRESERVE THE ORIGINAL TEXT CONTENT EXACTLY for the body.\n\
         Raw Essay Text:\n{}\n\
         Output Schema:\n\
         {{\"title\": \"string\", \"thesis_statement\": \"string\", \"introduction\": \
         \"string\", \"body_sections\": [{{\"title\": \"string\", \"content\": \"string\"}}], \
         \"conclusion\": \"string\", \"references\": [\"string\"]}}",
        raw_text
    )
}
