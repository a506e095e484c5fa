//! Shared state store: job records and stage artifacts with per-key expiry
//!
//! All state is stored as TTL-bound blobs behind the opaque [`StateStore`]
//! contract - no secondary indexes, no transactions, no multi-key atomicity.
//! Read-modify-write is safe because the orchestrator never dispatches two
//! stages for the same job concurrently.

mod memory;
mod redis;

pub use self::redis::RedisStore;
pub use memory::MemoryStore;

use crate::error::{EssayflowError, Result};
use async_trait::async_trait;
use chrono::Utc;
use essay_types::{ArtifactKind, EssayOutput, JobId, JobRecord, JobStatus};
use std::sync::Arc;

/// Retention window for job records and artifacts (24 hours). Entries that
/// outlive it become unavailable; the job is effectively abandoned, not
/// explicitly failed.
pub const RETENTION_TTL_SECS: u64 = 86_400;

/// Opaque key-value store contract with per-key TTL
#[async_trait]
pub trait StateStore: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>>;

    async fn set(&self, key: &str, value: Vec<u8>, ttl_secs: u64) -> Result<()>;

    async fn exists(&self, key: &str) -> Result<bool>;
}

/// Typed access to job records and artifacts on top of a raw [`StateStore`].
///
/// Owns the key layout (`job:{id}` for records, `job:{id}:{kind}` for
/// artifacts) so no other component builds keys by string concatenation.
#[derive(Clone)]
pub struct JobStore {
    store: Arc<dyn StateStore>,
}

impl JobStore {
    pub fn new(store: Arc<dyn StateStore>) -> Self {
        Self { store }
    }

    fn job_key(job_id: &JobId) -> String {
        format!("job:{}", job_id)
    }

    fn artifact_key(job_id: &JobId, kind: ArtifactKind) -> String {
        format!("job:{}:{}", job_id, kind.key_suffix())
    }

    /// Persist a freshly created job record
    pub async fn create_job(&self, record: &JobRecord) -> Result<()> {
        self.put_record(record).await
    }

    pub async fn load_job(&self, job_id: &JobId) -> Result<Option<JobRecord>> {
        match self.store.get(&Self::job_key(job_id)).await? {
            Some(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            None => Ok(None),
        }
    }

    pub async fn require_job(&self, job_id: &JobId) -> Result<JobRecord> {
        self.load_job(job_id).await?.ok_or_else(|| {
            EssayflowError::NotFound(format!("Job with ID '{}' not found", job_id))
        })
    }

    async fn put_record(&self, record: &JobRecord) -> Result<()> {
        let bytes = serde_json::to_vec(record)?;
        self.store
            .set(&Self::job_key(&record.job_id), bytes, RETENTION_TTL_SECS)
            .await
    }

    /// Idempotently overwrite the status fields of a job record.
    ///
    /// Does not validate transition legality - the orchestrator is
    /// responsible for only invoking legal transitions. Every call refreshes
    /// `updated_at` and the retention TTL.
    pub async fn advance(
        &self,
        job_id: &JobId,
        status: JobStatus,
        progress: u8,
        message: Option<&str>,
        download_ref: Option<&str>,
        error: Option<&str>,
    ) -> Result<()> {
        let mut record = self.require_job(job_id).await?;

        record.status = status;
        record.progress = progress;
        record.message = message.map(str::to_string);
        record.updated_at = Utc::now();
        if let Some(download_ref) = download_ref {
            record.download_ref = Some(download_ref.to_string());
        }
        if let Some(error) = error {
            record.error = Some(error.to_string());
        }

        log::debug!(
            "Job {} advanced to {} ({}%)",
            job_id,
            status,
            progress
        );
        self.put_record(&record).await
    }

    /// Store a raw artifact, overwriting any previous version of the kind
    pub async fn put_artifact(
        &self,
        job_id: &JobId,
        kind: ArtifactKind,
        bytes: Vec<u8>,
    ) -> Result<()> {
        self.store
            .set(&Self::artifact_key(job_id, kind), bytes, RETENTION_TTL_SECS)
            .await
    }

    pub async fn get_artifact(
        &self,
        job_id: &JobId,
        kind: ArtifactKind,
    ) -> Result<Option<Vec<u8>>> {
        self.store.get(&Self::artifact_key(job_id, kind)).await
    }

    pub async fn has_artifact(&self, job_id: &JobId, kind: ArtifactKind) -> Result<bool> {
        self.store.exists(&Self::artifact_key(job_id, kind)).await
    }

    pub async fn require_artifact(&self, job_id: &JobId, kind: ArtifactKind) -> Result<Vec<u8>> {
        self.get_artifact(job_id, kind).await?.ok_or_else(|| {
            EssayflowError::MissingArtifact(format!(
                "artifact '{}' for job {}",
                kind.key_suffix(),
                job_id
            ))
        })
    }

    /// Store a text artifact (extracted content)
    pub async fn put_text(&self, job_id: &JobId, kind: ArtifactKind, text: &str) -> Result<()> {
        self.put_artifact(job_id, kind, text.as_bytes().to_vec())
            .await
    }

    pub async fn get_text(&self, job_id: &JobId, kind: ArtifactKind) -> Result<Option<String>> {
        match self.get_artifact(job_id, kind).await? {
            Some(bytes) => {
                let text = String::from_utf8(bytes).map_err(|e| {
                    EssayflowError::Store(format!(
                        "artifact '{}' for job {} is not valid UTF-8: {}",
                        kind.key_suffix(),
                        job_id,
                        e
                    ))
                })?;
                Ok(Some(text))
            }
            None => Ok(None),
        }
    }

    /// Store a structured essay artifact
    pub async fn put_essay(
        &self,
        job_id: &JobId,
        kind: ArtifactKind,
        essay: &EssayOutput,
    ) -> Result<()> {
        let bytes = serde_json::to_vec(essay)?;
        self.put_artifact(job_id, kind, bytes).await
    }

    pub async fn get_essay(
        &self,
        job_id: &JobId,
        kind: ArtifactKind,
    ) -> Result<Option<EssayOutput>> {
        match self.get_artifact(job_id, kind).await? {
            Some(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            None => Ok(None),
        }
    }
}
