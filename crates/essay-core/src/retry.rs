//! Resilient wrapper for external generation calls
//!
//! Absorbs transient failures from the rate-limited upstream service with
//! bounded exponential backoff. The wrapper is stateless across calls: it
//! keeps no memory of prior jobs' rate-limit history, and each call's
//! backoff schedule starts fresh.

use crate::clients::GenerationClient;
use crate::error::{EssayflowError, Result};
use crate::store::JobStore;
use essay_types::{JobId, JobStatus};
use rand::Rng;
use std::sync::Arc;
use tokio::time::Duration;

/// The active stage's status and progress, republished while a retry wait is
/// in progress so a polling client sees that the wait is happening.
#[derive(Debug, Clone, Copy)]
pub struct Checkpoint {
    pub status: JobStatus,
    pub progress: u8,
}

impl Checkpoint {
    pub fn new(status: JobStatus, progress: u8) -> Self {
        Self { status, progress }
    }
}

/// Wraps a single external generation call with bounded retry.
///
/// Rate-limit and overload failures wait `2^attempt + jitter` seconds
/// (jitter uniform in `[0, 1)`) before the next attempt; any other failure
/// propagates immediately. Exhausting the attempt budget fails the call
/// with [`EssayflowError::RetriesExhausted`].
pub struct ResilientGenerator {
    client: Arc<dyn GenerationClient>,
    jobs: JobStore,
    max_attempts: u32,
}

impl ResilientGenerator {
    pub fn new(client: Arc<dyn GenerationClient>, jobs: JobStore, max_attempts: u32) -> Self {
        Self {
            client,
            jobs,
            max_attempts: max_attempts.max(1),
        }
    }

    pub async fn generate(
        &self,
        job_id: &JobId,
        checkpoint: Checkpoint,
        system_prompt: &str,
        user_content: &str,
        max_tokens: u32,
    ) -> Result<String> {
        let mut attempt = 0;

        loop {
            match self
                .client
                .generate(system_prompt, user_content, max_tokens)
                .await
            {
                Ok(text) => return Ok(text),
                Err(e) if e.is_retryable() => {
                    attempt += 1;
                    log::warn!(
                        "Generation call for job {} rate limited (attempt {}/{}): {}",
                        job_id,
                        attempt,
                        self.max_attempts,
                        e
                    );

                    if attempt >= self.max_attempts {
                        return Err(EssayflowError::RetriesExhausted {
                            attempts: attempt,
                            last: e.to_string(),
                        });
                    }

                    let wait = backoff_delay(attempt - 1);
                    self.publish_wait_notice(job_id, checkpoint, wait).await;
                    tokio::time::sleep(wait).await;
                }
                Err(e) => return Err(e),
            }
        }
    }

    /// Reference-image description pass-through. Callers absorb per-image
    /// failures, so there is no retry schedule here.
    pub async fn describe_image(&self, prompt: &str, image: &[u8]) -> Result<String> {
        self.client.describe_image(prompt, image).await
    }

    /// Informational only: a failure to publish must not mask the retry
    async fn publish_wait_notice(&self, job_id: &JobId, checkpoint: Checkpoint, wait: Duration) {
        let notice = format!("Rate limited, waiting {}s before retry...", wait.as_secs());

        if let Err(e) = self
            .jobs
            .advance(
                job_id,
                checkpoint.status,
                checkpoint.progress,
                Some(&notice),
                None,
                None,
            )
            .await
        {
            log::warn!("Failed to publish retry status for job {}: {}", job_id, e);
        }
    }
}

/// `2^attempt + jitter` seconds, jitter drawn uniformly from `[0, 1)`
fn backoff_delay(attempt: u32) -> Duration {
    let base = 2u64.saturating_pow(attempt);
    let jitter: f64 = rand::thread_rng().gen_range(0.0..1.0);
    Duration::from_secs_f64(base as f64 + jitter)
}
