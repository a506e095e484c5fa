//! Shared test doubles for the pipeline integration tests
//!
//! The queue double executes nothing on its own - tests drain it and call
//! `run_stage` directly, giving deterministic, synchronous in-process
//! execution of the otherwise fire-and-forget stage chain.

#![allow(dead_code)]

use async_trait::async_trait;
use essay_core::{
    DocumentExtractor, EssayRenderer, EssayflowError, GenerationClient, JobStore, MemoryStore,
    PipelineEngine, PlainTextExtractor, RenderMetadata, RenderedDocument, ResilientGenerator,
    Result, StageMessage, StageQueue, StateStore,
};
use essay_types::{EssayOutput, JobRecord};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};

/// One scripted reply from the generation double
pub enum Reply {
    Json(String),
    RateLimited,
    Fatal(String),
}

/// Generation client double fed from a fixed script of replies
pub struct ScriptedGenerator {
    replies: Mutex<VecDeque<Reply>>,
    calls: AtomicU32,
}

impl ScriptedGenerator {
    pub fn new() -> Self {
        Self {
            replies: Mutex::new(VecDeque::new()),
            calls: AtomicU32::new(0),
        }
    }

    pub fn push_json(&self, value: serde_json::Value) {
        self.replies
            .lock()
            .unwrap()
            .push_back(Reply::Json(value.to_string()));
    }

    pub fn push_raw(&self, raw: &str) {
        self.replies
            .lock()
            .unwrap()
            .push_back(Reply::Json(raw.to_string()));
    }

    pub fn push_rate_limited(&self) {
        self.replies.lock().unwrap().push_back(Reply::RateLimited);
    }

    pub fn push_fatal(&self, message: &str) {
        self.replies
            .lock()
            .unwrap()
            .push_back(Reply::Fatal(message.to_string()));
    }

    /// Number of generate calls made so far
    pub fn calls(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl GenerationClient for ScriptedGenerator {
    async fn generate(
        &self,
        _system_prompt: &str,
        _user_content: &str,
        _max_tokens: u32,
    ) -> Result<String> {
        self.calls.fetch_add(1, Ordering::SeqCst);

        match self.replies.lock().unwrap().pop_front() {
            Some(Reply::Json(text)) => Ok(text),
            Some(Reply::RateLimited) => Err(EssayflowError::RateLimited(
                "generation service returned 429".to_string(),
            )),
            Some(Reply::Fatal(message)) => Err(EssayflowError::ServiceUnavailable(message)),
            None => Err(EssayflowError::ServiceUnavailable(
                "scripted generator exhausted".to_string(),
            )),
        }
    }

    async fn describe_image(&self, _prompt: &str, _image: &[u8]) -> Result<String> {
        Ok("Description of a chart relevant to the essay.".to_string())
    }
}

/// Renderer double capturing the essay it was asked to render
pub struct CapturingRenderer {
    pub rendered: Mutex<Option<EssayOutput>>,
    pub fail: bool,
}

impl CapturingRenderer {
    pub fn new() -> Self {
        Self {
            rendered: Mutex::new(None),
            fail: false,
        }
    }

    pub fn failing() -> Self {
        Self {
            rendered: Mutex::new(None),
            fail: true,
        }
    }

    pub fn last_rendered(&self) -> Option<EssayOutput> {
        self.rendered.lock().unwrap().clone()
    }
}

#[async_trait]
impl EssayRenderer for CapturingRenderer {
    async fn render(
        &self,
        essay: &EssayOutput,
        _metadata: &RenderMetadata,
    ) -> Result<RenderedDocument> {
        if self.fail {
            return Err(EssayflowError::ServiceUnavailable(
                "Render service returned 500 - boom".to_string(),
            ));
        }

        *self.rendered.lock().unwrap() = Some(essay.clone());

        Ok(RenderedDocument {
            pdf_bytes: b"%PDF-1.4 test".to_vec(),
            docx_bytes: b"PK docx test".to_vec(),
        })
    }
}

/// Queue double that records messages instead of executing them
pub struct RecordingQueue {
    messages: Mutex<VecDeque<StageMessage>>,
}

impl RecordingQueue {
    pub fn new() -> Self {
        Self {
            messages: Mutex::new(VecDeque::new()),
        }
    }

    pub fn drain(&self) -> Vec<StageMessage> {
        self.messages.lock().unwrap().drain(..).collect()
    }

    pub fn len(&self) -> usize {
        self.messages.lock().unwrap().len()
    }
}

#[async_trait]
impl StageQueue for RecordingQueue {
    async fn enqueue(&self, message: StageMessage) -> Result<()> {
        self.messages.lock().unwrap().push_back(message);
        Ok(())
    }
}

/// Store wrapper recording every job-record write, so tests can assert on
/// the full status/progress history a polling client would have observed
pub struct SpyStore {
    inner: MemoryStore,
    records: Mutex<Vec<JobRecord>>,
}

impl SpyStore {
    pub fn new() -> Self {
        Self {
            inner: MemoryStore::new(),
            records: Mutex::new(Vec::new()),
        }
    }

    pub fn record_history(&self) -> Vec<JobRecord> {
        self.records.lock().unwrap().clone()
    }
}

#[async_trait]
impl StateStore for SpyStore {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>> {
        self.inner.get(key).await
    }

    async fn set(&self, key: &str, value: Vec<u8>, ttl_secs: u64) -> Result<()> {
        // Record keys are "job:{uuid}"; artifact keys carry a second colon
        if key.starts_with("job:") && key.matches(':').count() == 1 {
            if let Ok(record) = serde_json::from_slice::<JobRecord>(&value) {
                self.records.lock().unwrap().push(record);
            }
        }
        self.inner.set(key, value, ttl_secs).await
    }

    async fn exists(&self, key: &str) -> Result<bool> {
        self.inner.exists(key).await
    }
}

/// Fully wired engine over test doubles
pub struct TestHarness {
    pub engine: Arc<PipelineEngine>,
    pub jobs: JobStore,
    pub queue: Arc<RecordingQueue>,
    pub generator: Arc<ScriptedGenerator>,
    pub renderer: Arc<CapturingRenderer>,
    pub store: Arc<SpyStore>,
}

pub fn harness() -> TestHarness {
    harness_with_renderer(CapturingRenderer::new())
}

pub fn harness_with_renderer(renderer: CapturingRenderer) -> TestHarness {
    let store = Arc::new(SpyStore::new());
    let state_store: Arc<dyn StateStore> = store.clone();
    let jobs = JobStore::new(state_store);

    let generator = Arc::new(ScriptedGenerator::new());
    let generation_client: Arc<dyn GenerationClient> = generator.clone();
    let resilient = ResilientGenerator::new(generation_client, jobs.clone(), 5);

    let renderer = Arc::new(renderer);
    let renderer_client: Arc<dyn EssayRenderer> = renderer.clone();
    let queue = Arc::new(RecordingQueue::new());
    let queue_client: Arc<dyn StageQueue> = queue.clone();
    let extractor: Arc<dyn DocumentExtractor> = Arc::new(PlainTextExtractor);

    let engine = Arc::new(PipelineEngine::new(
        jobs.clone(),
        resilient,
        extractor,
        renderer_client,
        queue_client,
    ));

    TestHarness {
        engine,
        jobs,
        queue,
        generator,
        renderer,
        store,
    }
}

/// Drain the queue and run each stage until no further work is scheduled
pub async fn pump(harness: &TestHarness) {
    loop {
        let messages = harness.queue.drain();
        if messages.is_empty() {
            break;
        }
        for message in messages {
            harness.engine.run_stage(message).await;
        }
    }
}

/// Scripted replies for a complete generate pipeline run (two body sections)
pub fn script_generate_pipeline(generator: &ScriptedGenerator) {
    generator.push_json(serde_json::json!({
        "required_word_count": 1000,
        "topic": "Soil Health",
        "key_requirements": ["Discuss regenerative practices"],
        "suggested_sections": ["Background", "Analysis"],
        "academic_level": "undergraduate",
        "citation_style": "APA"
    }));
    generator.push_json(serde_json::json!({
        "introduction": "Soils underpin every terrestrial food system.",
        "thesis_statement": "Soil stewardship is an economic imperative."
    }));
    generator.push_json(serde_json::json!({
        "title": "Background",
        "content": "Agricultural soils have degraded steadily since the mid twentieth century."
    }));
    generator.push_json(serde_json::json!({
        "title": "Analysis",
        "content": "Regenerative practice trials show consistent yield stability gains."
    }));
    generator.push_json(serde_json::json!({
        "conclusion": "Healthy soil is the cheapest insurance a farm can buy."
    }));
    generator.push_json(serde_json::json!({
        "references": ["Smith, J. (2023). Soil Futures. Agronomy Press."]
    }));
    // Humanization rewrite
    generator.push_json(serde_json::json!({
        "title": "Soil Health",
        "thesis_statement": "Soil stewardship is an economic imperative.",
        "introduction": "Every terrestrial food system rests, quite literally, on soil.",
        "body_sections": [
            {"title": "Background", "content": "Farm soils have been wearing out since the 1950s."},
            {"title": "Analysis", "content": "Trial after trial, regenerative methods steady the yields."}
        ],
        "conclusion": "Caring for soil costs less than replacing it."
    }));
}
