//! Shared types for the EssayFlow pipeline
//!
//! The data model exchanged between the orchestration engine, the stage
//! functions, and the thin API surface: job records, lifecycle states,
//! artifact kinds, and the structured essay schema.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Strongly typed job identifier
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct JobId(String);

impl JobId {
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    pub fn from_string(s: &str) -> Result<Self, String> {
        // Validate UUID format
        Uuid::parse_str(s)
            .map(|_| Self(s.to_string()))
            .map_err(|e| format!("Invalid JobId format: {}", e))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for JobId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Lifecycle states for essay generation jobs.
///
/// Transitions are monotonic along the pipeline order; `Failed` is reachable
/// from any non-terminal state. `WaitingForReview` and `Refining` may cycle
/// until an explicit finalize request moves the job to `Formatting`. No
/// transition is defined out of a terminal state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    Pending,
    Extracting,
    Planning,
    Researching,
    Writing,
    Humanizing,
    WaitingForReview,
    Refining,
    Formatting,
    Completed,
    Failed,
}

impl JobStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Extracting => "extracting",
            Self::Planning => "planning",
            Self::Researching => "researching",
            Self::Writing => "writing",
            Self::Humanizing => "humanizing",
            Self::WaitingForReview => "waiting_for_review",
            Self::Refining => "refining",
            Self::Formatting => "formatting",
            Self::Completed => "completed",
            Self::Failed => "failed",
        }
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Artifact kinds produced by pipeline stages.
///
/// Each kind maps to a stable key suffix under the owning job's namespace.
/// Artifacts are immutable once written; a stage re-run overwrites its own
/// kind rather than appending, and downstream stages read the latest version.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ArtifactKind {
    ExtractedContent,
    Draft,
    Humanized,
    RenderedPdf,
    RenderedDocx,
    ReferenceImage(u32),
}

impl ArtifactKind {
    pub fn key_suffix(&self) -> String {
        match self {
            Self::ExtractedContent => "content".to_string(),
            Self::Draft => "draft".to_string(),
            Self::Humanized => "humanized".to_string(),
            Self::RenderedPdf => "pdf".to_string(),
            Self::RenderedDocx => "docx".to_string(),
            Self::ReferenceImage(index) => format!("ref_image:{}", index),
        }
    }
}

/// Settings for the humanization pass
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HumanizationSettings {
    /// 0.0 (minimal) to 1.0 (aggressive)
    #[serde(default = "default_intensity")]
    pub intensity: f32,
    #[serde(default = "default_true")]
    pub preserve_citations: bool,
    #[serde(default = "default_true")]
    pub vary_sentence_length: bool,
    #[serde(default = "default_true")]
    pub add_transitional_phrases: bool,
}

fn default_intensity() -> f32 {
    0.5
}

fn default_true() -> bool {
    true
}

impl Default for HumanizationSettings {
    fn default() -> Self {
        Self {
            intensity: default_intensity(),
            preserve_citations: true,
            vary_sentence_length: true,
            add_transitional_phrases: true,
        }
    }
}

/// Per-job configuration supplied at submission time
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct JobConfig {
    #[serde(default)]
    pub humanization: HumanizationSettings,
    /// Free-text steering instructions; these take precedence over
    /// conflicting information in the assignment content
    #[serde(default)]
    pub instructions: Option<String>,
    #[serde(default)]
    pub author_name: Option<String>,
    #[serde(default)]
    pub course_name: Option<String>,
    /// Number of reference image artifacts attached at submission
    #[serde(default)]
    pub ref_image_count: u32,
}

/// The unit of work tracked through the pipeline.
///
/// Created on submission, mutated exclusively by stage functions through the
/// orchestrator, and expired by the store's retention TTL - never explicitly
/// deleted otherwise.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobRecord {
    pub job_id: JobId,
    pub status: JobStatus,
    pub progress: u8,
    pub message: Option<String>,
    pub filename: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub download_ref: Option<String>,
    pub error: Option<String>,
    #[serde(default)]
    pub config: JobConfig,
}

impl JobRecord {
    pub fn new(job_id: JobId, config: JobConfig, filename: Option<String>) -> Self {
        let now = Utc::now();
        Self {
            job_id,
            status: JobStatus::Pending,
            progress: 0,
            message: Some("Job created, waiting to start...".to_string()),
            filename,
            created_at: now,
            updated_at: now,
            download_ref: None,
            error: None,
            config,
        }
    }
}

/// Polling view of a job, returned by the status surface
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatusReport {
    pub job_id: JobId,
    pub status: JobStatus,
    pub progress: u8,
    pub message: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub download_ref: Option<String>,
    pub error: Option<String>,
}

impl From<&JobRecord> for StatusReport {
    fn from(record: &JobRecord) -> Self {
        Self {
            job_id: record.job_id.clone(),
            status: record.status,
            progress: record.progress,
            message: record.message.clone(),
            created_at: record.created_at,
            updated_at: record.updated_at,
            download_ref: record.download_ref.clone(),
            error: record.error.clone(),
        }
    }
}

/// Individual section of the essay
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EssaySection {
    pub title: String,
    pub content: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub word_count: Option<u32>,
}

/// Structured essay schema shared by the drafting, humanization, refinement,
/// and rendering stages. Decoding is deliberately tolerant - generation
/// services do not always return the optional fields.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EssayOutput {
    pub title: String,
    #[serde(default)]
    pub thesis_statement: String,
    #[serde(default)]
    pub introduction: String,
    #[serde(default)]
    pub body_sections: Vec<EssaySection>,
    #[serde(default)]
    pub conclusion: String,
    #[serde(default)]
    pub references: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub total_word_count: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub academic_level: Option<String>,
    /// Populated by the refinement stage: a summary of what was changed, or
    /// the answer to a question the reviewer asked
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ai_feedback: Option<String>,
}

impl EssayOutput {
    /// Real word count of the prose (introduction, body, conclusion),
    /// excluding references
    pub fn body_word_count(&self) -> u32 {
        word_count(&self.introduction)
            + self
                .body_sections
                .iter()
                .map(|s| word_count(&s.content))
                .sum::<u32>()
            + word_count(&self.conclusion)
    }
}

/// Whitespace-delimited word count
pub fn word_count(text: &str) -> u32 {
    text.split_whitespace().count() as u32
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_job_status_serializes_lowercase() {
        assert_eq!(
            serde_json::to_string(&JobStatus::WaitingForReview).unwrap(),
            "\"waiting_for_review\""
        );
        assert_eq!(
            serde_json::to_string(&JobStatus::Pending).unwrap(),
            "\"pending\""
        );

        let parsed: JobStatus = serde_json::from_str("\"refining\"").unwrap();
        assert_eq!(parsed, JobStatus::Refining);
    }

    #[test]
    fn test_terminal_states() {
        assert!(JobStatus::Completed.is_terminal());
        assert!(JobStatus::Failed.is_terminal());
        assert!(!JobStatus::WaitingForReview.is_terminal());
        assert!(!JobStatus::Pending.is_terminal());
    }

    #[test]
    fn test_job_id_validation() {
        let id = JobId::new();
        assert!(JobId::from_string(id.as_str()).is_ok());
        assert!(JobId::from_string("not-a-uuid").is_err());
    }

    #[test]
    fn test_artifact_key_suffixes() {
        assert_eq!(ArtifactKind::ExtractedContent.key_suffix(), "content");
        assert_eq!(ArtifactKind::Draft.key_suffix(), "draft");
        assert_eq!(ArtifactKind::Humanized.key_suffix(), "humanized");
        assert_eq!(ArtifactKind::RenderedPdf.key_suffix(), "pdf");
        assert_eq!(ArtifactKind::RenderedDocx.key_suffix(), "docx");
        assert_eq!(ArtifactKind::ReferenceImage(2).key_suffix(), "ref_image:2");
    }

    #[test]
    fn test_new_job_record_defaults() {
        let record = JobRecord::new(JobId::new(), JobConfig::default(), Some("essay.pdf".to_string()));

        assert_eq!(record.status, JobStatus::Pending);
        assert_eq!(record.progress, 0);
        assert!(record.download_ref.is_none());
        assert!(record.error.is_none());
        assert_eq!(record.config.humanization.intensity, 0.5);
        assert!(record.config.humanization.preserve_citations);
    }

    #[test]
    fn test_essay_output_tolerant_decode() {
        // Generation services frequently omit the optional fields
        let json = r#"{
            "title": "The Impact of AI on Modern Education",
            "introduction": "In recent years...",
            "body_sections": [{"title": "Historical Context", "content": "one two three"}],
            "conclusion": "In conclusion..."
        }"#;

        let essay: EssayOutput = serde_json::from_str(json).unwrap();
        assert_eq!(essay.title, "The Impact of AI on Modern Education");
        assert!(essay.references.is_empty());
        assert!(essay.thesis_statement.is_empty());
        assert!(essay.total_word_count.is_none());
        assert_eq!(essay.body_sections[0].word_count, None);
    }

    #[test]
    fn test_body_word_count_excludes_references() {
        let essay = EssayOutput {
            title: "T".to_string(),
            thesis_statement: "ignored by the count".to_string(),
            introduction: "one two three".to_string(),
            body_sections: vec![EssaySection {
                title: "S".to_string(),
                content: "four five".to_string(),
                word_count: None,
            }],
            conclusion: "six".to_string(),
            references: vec!["Smith, J. (2023). Many words here...".to_string()],
            total_word_count: None,
            academic_level: None,
            ai_feedback: None,
        };

        assert_eq!(essay.body_word_count(), 6);
    }

    #[test]
    fn test_status_report_from_record() {
        let mut record = JobRecord::new(JobId::new(), JobConfig::default(), None);
        record.status = JobStatus::Writing;
        record.progress = 40;
        record.message = Some("Generating essay draft...".to_string());

        let report = StatusReport::from(&record);
        assert_eq!(report.status, JobStatus::Writing);
        assert_eq!(report.progress, 40);
        assert_eq!(report.message.as_deref(), Some("Generating essay draft..."));
    }
}
