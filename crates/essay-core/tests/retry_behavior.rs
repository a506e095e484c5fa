//! Resilient call wrapper behavior under simulated rate limiting
//!
//! Runs on a paused tokio clock, so the exponential backoff sleeps complete
//! instantly while remaining measurable.

mod common;

use common::{ScriptedGenerator, SpyStore};
use essay_core::{
    Checkpoint, EssayflowError, GenerationClient, JobStore, ResilientGenerator, StateStore,
};
use essay_types::{JobConfig, JobId, JobRecord, JobStatus};
use std::sync::Arc;

struct RetryHarness {
    generator: Arc<ScriptedGenerator>,
    resilient: ResilientGenerator,
    jobs: JobStore,
    store: Arc<SpyStore>,
    job_id: JobId,
}

async fn retry_harness(max_attempts: u32) -> RetryHarness {
    let store = Arc::new(SpyStore::new());
    let state_store: Arc<dyn StateStore> = store.clone();
    let jobs = JobStore::new(state_store);

    let record = JobRecord::new(JobId::new(), JobConfig::default(), None);
    jobs.create_job(&record).await.unwrap();
    jobs.advance(&record.job_id, JobStatus::Writing, 50, None, None, None)
        .await
        .unwrap();

    let generator = Arc::new(ScriptedGenerator::new());
    let generation_client: Arc<dyn GenerationClient> = generator.clone();
    let resilient = ResilientGenerator::new(generation_client, jobs.clone(), max_attempts);

    RetryHarness {
        generator,
        resilient,
        jobs,
        store,
        job_id: record.job_id,
    }
}

#[tokio::test(start_paused = true)]
async fn test_retry_law_three_failures_then_success() {
    let h = retry_harness(5).await;

    h.generator.push_rate_limited();
    h.generator.push_rate_limited();
    h.generator.push_rate_limited();
    h.generator.push_raw("{\"conclusion\": \"done\"}");

    let started = tokio::time::Instant::now();
    let result = h
        .resilient
        .generate(
            &h.job_id,
            Checkpoint::new(JobStatus::Writing, 50),
            "system",
            "content",
            1000,
        )
        .await
        .unwrap();
    let waited = started.elapsed().as_secs_f64();

    // The fourth attempt's result comes back after exactly four calls
    assert_eq!(result, "{\"conclusion\": \"done\"}");
    assert_eq!(h.generator.calls(), 4);

    // Cumulative wait is 2^0 + 2^1 + 2^2 plus up to one second of jitter
    // per wait
    assert!(waited >= 7.0, "waited {} < 7", waited);
    assert!(waited < 10.0, "waited {} >= 10", waited);
}

#[tokio::test(start_paused = true)]
async fn test_wait_status_updates_are_published() {
    let h = retry_harness(5).await;

    h.generator.push_rate_limited();
    h.generator.push_rate_limited();
    h.generator.push_rate_limited();
    h.generator.push_raw("{\"ok\": true}");

    h.resilient
        .generate(
            &h.job_id,
            Checkpoint::new(JobStatus::Writing, 50),
            "system",
            "content",
            1000,
        )
        .await
        .unwrap();

    let notices: Vec<String> = h
        .store
        .record_history()
        .into_iter()
        .filter_map(|record| record.message)
        .filter(|message| message.starts_with("Rate limited, waiting"))
        .collect();

    assert_eq!(notices.len(), 3);
    for notice in &notices {
        assert!(notice.contains("s before retry"), "unexpected notice: {}", notice);
    }

    // The wait notice republishes the active checkpoint, not a new state
    let history = h.store.record_history();
    let during_wait = history
        .iter()
        .find(|record| {
            record
                .message
                .as_deref()
                .is_some_and(|m| m.starts_with("Rate limited"))
        })
        .unwrap();
    assert_eq!(during_wait.status, JobStatus::Writing);
    assert_eq!(during_wait.progress, 50);
}

#[tokio::test(start_paused = true)]
async fn test_fatal_errors_propagate_immediately() {
    let h = retry_harness(5).await;

    h.generator.push_fatal("generation service returned 500");

    let result = h
        .resilient
        .generate(
            &h.job_id,
            Checkpoint::new(JobStatus::Writing, 50),
            "system",
            "content",
            1000,
        )
        .await;

    assert!(matches!(
        result,
        Err(EssayflowError::ServiceUnavailable(_))
    ));
    assert_eq!(h.generator.calls(), 1);

    // No wait notice was ever published
    assert!(h
        .store
        .record_history()
        .iter()
        .all(|record| !record
            .message
            .as_deref()
            .is_some_and(|m| m.starts_with("Rate limited"))));
}

#[tokio::test(start_paused = true)]
async fn test_exhausted_retries_raise_typed_error() {
    let h = retry_harness(3).await;

    h.generator.push_rate_limited();
    h.generator.push_rate_limited();
    h.generator.push_rate_limited();

    let started = tokio::time::Instant::now();
    let result = h
        .resilient
        .generate(
            &h.job_id,
            Checkpoint::new(JobStatus::Writing, 50),
            "system",
            "content",
            1000,
        )
        .await;
    let waited = started.elapsed().as_secs_f64();

    match result {
        Err(EssayflowError::RetriesExhausted { attempts, last }) => {
            assert_eq!(attempts, 3);
            assert!(last.contains("429"));
        }
        other => panic!("expected RetriesExhausted, got {:?}", other.map(|_| ())),
    }
    assert_eq!(h.generator.calls(), 3);

    // Two waits happened (after attempts 1 and 2); no sleep after the last
    assert!(waited >= 3.0, "waited {} < 3", waited);
    assert!(waited < 5.0, "waited {} >= 5", waited);
}

#[tokio::test(start_paused = true)]
async fn test_backoff_schedule_is_stateless_across_calls() {
    let h = retry_harness(5).await;

    // First call burns two retries
    h.generator.push_rate_limited();
    h.generator.push_rate_limited();
    h.generator.push_raw("{\"ok\": 1}");
    h.resilient
        .generate(
            &h.job_id,
            Checkpoint::new(JobStatus::Writing, 50),
            "system",
            "content",
            1000,
        )
        .await
        .unwrap();

    // Second call starts its schedule fresh at 2^0
    h.generator.push_rate_limited();
    h.generator.push_raw("{\"ok\": 2}");

    let started = tokio::time::Instant::now();
    h.resilient
        .generate(
            &h.job_id,
            Checkpoint::new(JobStatus::Writing, 50),
            "system",
            "content",
            1000,
        )
        .await
        .unwrap();
    let waited = started.elapsed().as_secs_f64();

    assert!(waited >= 1.0, "waited {} < 1", waited);
    assert!(waited < 2.0, "waited {} >= 2: schedule did not reset", waited);

    // Retry publication refreshed the record but never changed state
    let report = h.jobs.require_job(&h.job_id).await.unwrap();
    assert_eq!(report.status, JobStatus::Writing);
}
