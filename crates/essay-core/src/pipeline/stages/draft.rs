//! Draft generation stage
//!
//! Plans requirements once, then writes introduction, body sections,
//! conclusion, and references as independent generation sub-steps with
//! fixed word targets. Sub-steps are sequential by implementation but
//! logically parallelizable - none reads another's output except the
//! thesis statement produced by the introduction.

use crate::codec::decode_or_fallback;
use crate::error::{EssayflowError, Result};
use crate::pipeline::engine::PipelineEngine;
use crate::pipeline::plan::{word_count_override, EssayRequirements, WordBudget};
use crate::pipeline::queue::StageKind;
use crate::retry::Checkpoint;
use essay_types::{word_count, ArtifactKind, EssayOutput, EssaySection, JobId, JobRecord, JobStatus};
use serde::Deserialize;

#[derive(Deserialize)]
struct IntroPayload {
    introduction: String,
    #[serde(default)]
    thesis_statement: String,
}

#[derive(Deserialize)]
struct SectionPayload {
    #[serde(default)]
    title: String,
    content: String,
}

#[derive(Deserialize)]
struct ConclusionPayload {
    conclusion: String,
}

#[derive(Deserialize)]
struct ReferencesPayload {
    #[serde(default)]
    references: Vec<String>,
}

pub(crate) async fn run(
    engine: &PipelineEngine,
    job_id: &JobId,
    record: &JobRecord,
) -> Result<()> {
    let jobs = engine.jobs();

    jobs.advance(
        job_id,
        JobStatus::Planning,
        15,
        Some("Analyzing requirements..."),
        None,
        None,
    )
    .await?;

    let content = jobs
        .get_text(job_id, ArtifactKind::ExtractedContent)
        .await?
        .ok_or_else(|| {
            EssayflowError::MissingArtifact(format!("no extracted content for job {}", job_id))
        })?;

    let instructions = record.config.instructions.clone().unwrap_or_default();

    // Steering instructions go first so they are not lost in a long context
    let mut global_context = String::new();
    if !instructions.is_empty() {
        global_context.push_str(&format!(
            "UPPERMOST PRIORITY - USER ADDITIONAL INSTRUCTIONS:\n{}\n\n",
            instructions
        ));
        global_context.push_str(
            "INSTRUCTION: The user's additional instructions above are CRITICAL. They override \
             any conflicting information in the assignment content below.\n\n",
        );
    }
    global_context.push_str(&format!("Assignment Content: {}\n\n", content));

    // Requirements extraction sub-step
    jobs.advance(
        job_id,
        JobStatus::Researching,
        20,
        Some("Extracting assignment requirements..."),
        None,
        None,
    )
    .await?;

    let requirements_raw = engine
        .generator()
        .generate(
            job_id,
            Checkpoint::new(JobStatus::Researching, 20),
            REQUIREMENTS_PROMPT,
            &global_context,
            1000,
        )
        .await?;

    let mut requirements: EssayRequirements =
        decode_or_fallback(&requirements_raw, |_| EssayRequirements::default());

    let mut target_word_count = requirements.required_word_count;
    if !instructions.is_empty() {
        if let Some(overridden) = word_count_override(&instructions) {
            target_word_count = overridden;
        }
        // Downstream sub-steps see the steering text as an explicit requirement
        requirements
            .key_requirements
            .push(format!("USER PRIORITY INSTRUCTION: {}", instructions));
    }

    let sections = requirements.body_sections();
    let budget = WordBudget::derive(target_word_count, sections.len());

    jobs.advance(
        job_id,
        JobStatus::Writing,
        25,
        Some(&format!("Generating {}-word essay...", target_word_count)),
        None,
        None,
    )
    .await?;

    // Introduction sub-step
    jobs.advance(
        job_id,
        JobStatus::Writing,
        30,
        Some("Writing introduction..."),
        None,
        None,
    )
    .await?;

    let intro_raw = engine
        .generator()
        .generate(
            job_id,
            Checkpoint::new(JobStatus::Writing, 30),
            &intro_prompt(&requirements, budget.intro),
            &global_context,
            3000,
        )
        .await?;

    let intro = decode_or_fallback(&intro_raw, |raw| IntroPayload {
        introduction: raw.to_string(),
        thesis_statement: String::new(),
    });

    // Body section sub-steps: fixed targets from the budget, no coordination
    // between the calls
    let mut body_sections = Vec::with_capacity(sections.len());
    for (index, section_title) in sections.iter().enumerate() {
        let progress = 30 + ((index as u32 * 40) / sections.len() as u32) as u8;
        jobs.advance(
            job_id,
            JobStatus::Writing,
            progress,
            Some(&format!("Writing section: {}...", section_title)),
            None,
            None,
        )
        .await?;

        let section_raw = engine
            .generator()
            .generate(
                job_id,
                Checkpoint::new(JobStatus::Writing, progress),
                &section_prompt(
                    &requirements,
                    &intro.thesis_statement,
                    section_title,
                    budget.per_section,
                ),
                &global_context,
                4000,
            )
            .await?;

        let payload = decode_or_fallback(&section_raw, |raw| SectionPayload {
            title: section_title.clone(),
            content: raw.to_string(),
        });

        let title = if payload.title.is_empty() {
            section_title.clone()
        } else {
            payload.title
        };
        let words = word_count(&payload.content);

        body_sections.push(EssaySection {
            title,
            content: payload.content,
            word_count: Some(words),
        });
    }

    // Conclusion sub-step
    jobs.advance(
        job_id,
        JobStatus::Writing,
        72,
        Some("Writing conclusion..."),
        None,
        None,
    )
    .await?;

    let conclusion_raw = engine
        .generator()
        .generate(
            job_id,
            Checkpoint::new(JobStatus::Writing, 72),
            &conclusion_prompt(&requirements, &intro.thesis_statement, &sections, budget.conclusion),
            &global_context,
            2000,
        )
        .await?;

    let conclusion = decode_or_fallback(&conclusion_raw, |raw| ConclusionPayload {
        conclusion: raw.to_string(),
    })
    .conclusion;

    // References sub-step
    jobs.advance(
        job_id,
        JobStatus::Writing,
        75,
        Some("Compiling references..."),
        None,
        None,
    )
    .await?;

    let references_raw = engine
        .generator()
        .generate(
            job_id,
            Checkpoint::new(JobStatus::Writing, 75),
            &references_prompt(&requirements),
            &global_context,
            1500,
        )
        .await?;

    let references = decode_or_fallback(&references_raw, |_| ReferencesPayload {
        references: Vec::new(),
    })
    .references;

    // Assemble and validate against the essay schema
    let total_words = word_count(&intro.introduction)
        + body_sections
            .iter()
            .map(|s| s.word_count.unwrap_or(0))
            .sum::<u32>()
        + word_count(&conclusion);

    let essay = EssayOutput {
        title: requirements.topic.clone(),
        thesis_statement: intro.thesis_statement,
        introduction: intro.introduction,
        body_sections,
        conclusion,
        references,
        total_word_count: Some(total_words),
        academic_level: Some(requirements.academic_level.clone()),
        ai_feedback: None,
    };

    jobs.put_essay(job_id, ArtifactKind::Draft, &essay).await?;

    jobs.advance(
        job_id,
        JobStatus::Writing,
        78,
        Some(&format!("Essay generated ({} words)", total_words)),
        None,
        None,
    )
    .await?;

    engine.enqueue(job_id, StageKind::Humanize).await
}

const REQUIREMENTS_PROMPT: &str = "You are an academic assignment analyzer. Extract key \
     requirements from the assignment. Return ONLY a valid JSON object with the fields \
     required_word_count (number), topic (string), key_requirements (array of strings), \
     suggested_sections (array of 4-6 section titles), academic_level (string), and \
     citation_style (string). Look for word counts like \"2000 words\" or \"minimum 1500 \
     words\"; if none is specified, default to 2000.";

fn intro_prompt(requirements: &EssayRequirements, target_words: u32) -> String {
    format!(
        "You are an expert academic writer. Write a compelling introduction for an essay.\n\
         Topic: {}\n\
         Target Length: {} words (write at least {} words)\n\
         Academic Level: {}\n\
         Include a clear, arguable thesis statement, set up the key arguments, and maintain \
         an academic tone.\n\
         Key requirements from the assignment:\n{}\n\
         Return ONLY valid JSON in this exact format: \
         {{\"introduction\": \"<text>\", \"thesis_statement\": \"<thesis>\"}}",
        requirements.topic,
        target_words,
        target_words,
        requirements.academic_level,
        requirements.key_requirements.join("\n")
    )
}

fn section_prompt(
    requirements: &EssayRequirements,
    thesis_statement: &str,
    section_title: &str,
    target_words: u32,
) -> String {
    format!(
        "You are an expert academic writer. Write a detailed body section for an academic essay.\n\
         Essay Topic: {}\n\
         Thesis Statement: {}\n\
         Section Title: {}\n\
         LENGTH REQUIREMENT: write approximately {} words; the essay must meet its word count.\n\
         Write a comprehensive, in-depth analysis with specific examples and evidence, \
         appropriate for {} level, with clear topic sentences and smooth transitions. Review \
         the USER ADDITIONAL INSTRUCTIONS in the provided context and keep this section \
         aligned with any specific focus areas.\n\
         Return ONLY valid JSON in this exact format: \
         {{\"title\": \"{}\", \"content\": \"<text>\"}}",
        requirements.topic,
        thesis_statement,
        section_title,
        target_words,
        requirements.academic_level,
        section_title
    )
}

fn conclusion_prompt(
    requirements: &EssayRequirements,
    thesis_statement: &str,
    sections: &[String],
    target_words: u32,
) -> String {
    format!(
        "You are an expert academic writer. Write a strong conclusion for an academic essay.\n\
         Topic: {}\n\
         Thesis Statement: {}\n\
         Body Sections Covered: {}\n\
         Target Length: {} words (write at least {} words)\n\
         Synthesize the key arguments, restate the thesis in light of the evidence, and do \
         NOT introduce new arguments or evidence.\n\
         Return ONLY valid JSON in this exact format: {{\"conclusion\": \"<text>\"}}",
        requirements.topic,
        thesis_statement,
        sections.join(", "),
        target_words,
        target_words
    )
}

fn references_prompt(requirements: &EssayRequirements) -> String {
    format!(
        "You are an expert academic librarian. Compile a list of scholarly references for \
         this essay.\n\
         Topic: {}\n\
         Citation Style: {}\n\
         Provide 5-8 relevant, high-quality scholarly sources formatted exactly according \
         to {} style; sources must be real and directly relevant to the topic.\n\
         Return ONLY valid JSON in this exact format: \
         {{\"references\": [\"<reference 1>\", \"<reference 2>\"]}}",
        requirements.topic, requirements.citation_style, requirements.citation_style
    )
}
