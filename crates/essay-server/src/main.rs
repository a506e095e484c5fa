//! EssayFlow pipeline worker binary
//!
//! Wires configuration, the service clients, and the pipeline engine
//! together, then runs the stage worker pool. One-shot submit/import modes
//! exist for smoke-testing a deployment from the command line.

use anyhow::Context;
use clap::{Arg, ArgAction, Command};
use essay_core::{
    DocumentExtractor, EssayRenderer, EssayflowConfig, GenerationClient, InProcessQueue,
    JobStore, MemoryStore, OpenAiClient, PipelineEngine, PlainTextExtractor, RedisStore,
    RenderServiceClient, ResilientGenerator, StateStore, WorkerPool,
};
use essay_types::{JobConfig, JobId, JobStatus};
use std::path::Path;
use std::sync::Arc;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging with INFO as default if RUST_LOG not set
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let matches = Command::new("essay-server")
        .version("0.1.0")
        .about("EssayFlow pipeline worker")
        .arg(
            Arg::new("config")
                .long("config")
                .short('c')
                .value_name("FILE")
                .help("Configuration file path")
                .default_value("/app/config/credentials.json"),
        )
        .arg(
            Arg::new("workers")
                .long("workers")
                .value_name("N")
                .help("Worker pool size override"),
        )
        .arg(
            Arg::new("memory-store")
                .long("memory-store")
                .help("Use the in-process store instead of Redis")
                .action(ArgAction::SetTrue),
        )
        .arg(
            Arg::new("submit")
                .long("submit")
                .value_name("FILE")
                .help("Submit a document and poll until it is ready for review"),
        )
        .arg(
            Arg::new("import")
                .long("import")
                .value_name("FILE")
                .help("Import raw text through the structuring pipeline"),
        )
        .arg(
            Arg::new("instructions")
                .long("instructions")
                .value_name("TEXT")
                .help("Steering instructions attached to the submission"),
        )
        .get_matches();

    let config_path = matches.get_one::<String>("config").unwrap();
    let config = EssayflowConfig::from_file(config_path)
        .with_context(|| format!("loading configuration from {}", config_path))?;
    log::info!("Loaded configuration from {}", config_path);

    let store: Arc<dyn StateStore> = if matches.get_flag("memory-store") {
        log::info!("Using in-process memory store");
        Arc::new(MemoryStore::new())
    } else {
        log::info!("Using Redis store at {}", config.store.redis_url);
        Arc::new(RedisStore::new(&config.store.redis_url)?)
    };
    let jobs = JobStore::new(store);

    let generation_client: Arc<dyn GenerationClient> =
        Arc::new(OpenAiClient::new(config.generation.clone()));
    let generator = ResilientGenerator::new(
        generation_client,
        jobs.clone(),
        config.generation.max_attempts,
    );
    let extractor: Arc<dyn DocumentExtractor> = Arc::new(PlainTextExtractor);
    let renderer: Arc<dyn EssayRenderer> =
        Arc::new(RenderServiceClient::new(config.render_service.clone()));

    let (queue, receiver) = InProcessQueue::new();
    let engine = Arc::new(PipelineEngine::new(
        jobs,
        generator,
        extractor,
        renderer,
        Arc::new(queue),
    ));

    let workers = match matches.get_one::<String>("workers") {
        Some(raw) => raw.parse().context("invalid --workers value")?,
        None => config.worker.count,
    };
    let _pool = WorkerPool::spawn(engine.clone(), receiver, workers);
    log::info!("Started {} pipeline workers", workers);

    if let Some(path) = matches.get_one::<String>("submit") {
        let instructions = matches.get_one::<String>("instructions").cloned();
        let job_id = submit_document(&engine, path, instructions).await?;
        poll_until_review(&engine, &job_id).await?;
    } else if let Some(path) = matches.get_one::<String>("import") {
        let instructions = matches.get_one::<String>("instructions").cloned();
        let job_id = import_text(&engine, path, instructions).await?;
        poll_until_review(&engine, &job_id).await?;
    } else {
        log::info!("Running in worker mode; press Ctrl-C to stop");
        tokio::signal::ctrl_c().await?;
        log::info!("Shutdown requested");
    }

    Ok(())
}

async fn submit_document(
    engine: &Arc<PipelineEngine>,
    path: &str,
    instructions: Option<String>,
) -> anyhow::Result<JobId> {
    let bytes = std::fs::read(path).with_context(|| format!("reading document {}", path))?;

    let format_hint = Path::new(path)
        .extension()
        .and_then(|ext| ext.to_str())
        .unwrap_or("txt")
        .to_string();
    let filename = Path::new(path)
        .file_name()
        .and_then(|name| name.to_str())
        .map(str::to_string);

    let config = JobConfig {
        instructions,
        ..JobConfig::default()
    };

    let job_id = engine
        .submit_document(&bytes, &format_hint, config, filename, Vec::new())
        .await?;
    log::info!("Submitted job {}", job_id);
    Ok(job_id)
}

async fn import_text(
    engine: &Arc<PipelineEngine>,
    path: &str,
    instructions: Option<String>,
) -> anyhow::Result<JobId> {
    let raw_text =
        std::fs::read_to_string(path).with_context(|| format!("reading text file {}", path))?;

    let config = JobConfig {
        instructions,
        ..JobConfig::default()
    };

    let job_id = engine.submit_text(raw_text, config).await?;
    log::info!("Imported job {}", job_id);
    Ok(job_id)
}

async fn poll_until_review(engine: &Arc<PipelineEngine>, job_id: &JobId) -> anyhow::Result<()> {
    loop {
        tokio::time::sleep(std::time::Duration::from_secs(2)).await;

        let report = engine.status(job_id).await?;
        log::info!(
            "Job {}: {} ({}%) {}",
            job_id,
            report.status,
            report.progress,
            report.message.as_deref().unwrap_or("")
        );

        match report.status {
            JobStatus::WaitingForReview => {
                let essay = engine.content(job_id).await?;
                println!("{}", serde_json::to_string_pretty(&essay)?);
                log::info!(
                    "Job {} is ready for review; call refine or finalize to continue",
                    job_id
                );
                return Ok(());
            }
            JobStatus::Completed => {
                log::info!(
                    "Job {} completed; download at {}",
                    job_id,
                    report.download_ref.as_deref().unwrap_or("<missing>")
                );
                return Ok(());
            }
            JobStatus::Failed => {
                anyhow::bail!(
                    "job {} failed: {}",
                    job_id,
                    report.error.as_deref().unwrap_or("unknown error")
                );
            }
            _ => {}
        }
    }
}
