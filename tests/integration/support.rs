//! Shared collaborators for the integration tests.
//!
//! Everything here runs in memory or in a temp directory; no network and
//! no model server is needed.

use std::collections::{HashMap, HashSet, VecDeque};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::NaiveDate;
use serde_json::Value;

use research_agent::services::research::{ExecutionConfig, LocalResourceResolver, ResearchExecutor, SynthesisLimits};
use research_agent_llm::{LlmRequestOptions, Message, ModelBackend};
use research_agent_tools::{
    DocumentChunk, DocumentEntry, DocumentSummary, DocumentTool, Link, LocalDocumentIndex, PageAnalysis,
    PageMetadata, PageStructure, SearchHit, ToolError, ToolResult, WebPage, WebTool,
};

// ============================================================================
// Model backend
// ============================================================================

/// A model call as the backend saw it.
#[derive(Debug, Clone)]
pub struct ModelCall {
    pub prompt: String,
    pub system: Option<String>,
    pub temperature: Option<f32>,
    pub json: bool,
}

/// Model backend that replays queued replies.
///
/// When a queue runs dry, text calls return `default_text` and JSON calls
/// return `{}`.
#[derive(Default)]
pub struct ScriptedBackend {
    json_replies: Mutex<VecDeque<Value>>,
    text_replies: Mutex<VecDeque<String>>,
    default_text: String,
    calls: Mutex<Vec<ModelCall>>,
}

impl ScriptedBackend {
    pub fn new() -> Self {
        Self {
            default_text: "Scripted summary.".to_string(),
            ..Self::default()
        }
    }

    pub fn with_json(self, reply: Value) -> Self {
        self.json_replies.lock().unwrap().push_back(reply);
        self
    }

    pub fn with_text(self, reply: &str) -> Self {
        self.text_replies.lock().unwrap().push_back(reply.to_string());
        self
    }

    pub fn calls(&self) -> Vec<ModelCall> {
        self.calls.lock().unwrap().clone()
    }

    fn record(&self, prompt: &str, system: Option<&str>, options: &LlmRequestOptions, json: bool) {
        self.calls.lock().unwrap().push(ModelCall {
            prompt: prompt.to_string(),
            system: system.map(str::to_string),
            temperature: options.temperature_override,
            json,
        });
    }
}

#[async_trait]
impl ModelBackend for ScriptedBackend {
    async fn generate_text(
        &self,
        prompt: &str,
        system: Option<&str>,
        _history: &[Message],
        options: LlmRequestOptions,
    ) -> String {
        self.record(prompt, system, &options, false);
        self.text_replies
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| self.default_text.clone())
    }

    async fn generate_json(&self, prompt: &str, system: Option<&str>, options: LlmRequestOptions) -> Value {
        self.record(prompt, system, &options, true);
        self.json_replies
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Value::Object(Default::default()))
    }
}

// ============================================================================
// Web tool
// ============================================================================

/// Web tool serving canned search results and synthetic pages.
#[derive(Default)]
pub struct RecordingWebTool {
    results: HashMap<String, Vec<SearchHit>>,
    failing: HashSet<String>,
    calls: Mutex<Vec<String>>,
    count: AtomicUsize,
}

impl RecordingWebTool {
    pub fn new() -> Self {
        Self::default()
    }

    /// Answer `query` with one hit per URL.
    pub fn with_results(mut self, query: &str, urls: &[&str]) -> Self {
        let hits = urls
            .iter()
            .enumerate()
            .map(|(i, url)| SearchHit {
                title: format!("Result {}", i + 1),
                url: url.to_string(),
                snippet: format!("Snippet about {}", query),
            })
            .collect();
        self.results.insert(query.to_string(), hits);
        self
    }

    /// Make every call touching `target` (a query or URL) fail.
    pub fn failing_on(mut self, target: &str) -> Self {
        self.failing.insert(target.to_string());
        self
    }

    pub fn call_count(&self) -> usize {
        self.count.load(Ordering::SeqCst)
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    fn record(&self, op: &str, target: &str) -> ToolResult<()> {
        self.count.fetch_add(1, Ordering::SeqCst);
        self.calls.lock().unwrap().push(format!("{} {}", op, target));
        if self.failing.contains(target) {
            return Err(ToolError::network(format!("connection refused: {}", target)));
        }
        Ok(())
    }
}

fn page_for(url: &str) -> WebPage {
    WebPage {
        url: url.to_string(),
        title: format!("Page at {}", url),
        content: format!("Body text served from {}", url),
        html: format!("<html><body><p>Body text served from {}</p></body></html>", url),
        timestamp: "2024-05-01T12:00:00Z".to_string(),
        metadata: PageMetadata {
            status_code: 200,
            content_type: "text/html".to_string(),
            content_length: 64,
        },
    }
}

#[async_trait]
impl WebTool for RecordingWebTool {
    async fn search(&self, query: &str) -> ToolResult<Vec<SearchHit>> {
        self.record("search", query)?;
        Ok(self.results.get(query).cloned().unwrap_or_default())
    }

    async fn fetch(&self, url: &str) -> ToolResult<Option<WebPage>> {
        self.record("fetch", url)?;
        Ok(Some(page_for(url)))
    }

    async fn extract_links(&self, url: &str) -> ToolResult<Vec<Link>> {
        self.record("links", url)?;
        Ok(vec![Link {
            url: format!("{}/next", url),
            text: "next".to_string(),
        }])
    }

    async fn extract_selector(&self, url: &str, selector: &str) -> ToolResult<String> {
        self.record("select", url)?;
        Ok(format!("{} on {}", selector, url))
    }

    async fn analyze(&self, url: &str) -> ToolResult<PageAnalysis> {
        self.record("analyze", url)?;
        Ok(PageAnalysis {
            success: true,
            url: url.to_string(),
            title: format!("Page at {}", url),
            main_content: format!("Main content of {}", url),
            structure: PageStructure::default(),
            extracted_dates: vec!["2024-05-01".to_string()],
        })
    }
}

// ============================================================================
// Document tool
// ============================================================================

/// Real on-disk index with a call counter in front of it.
pub struct RecordingDocTool {
    inner: LocalDocumentIndex,
    count: AtomicUsize,
}

impl RecordingDocTool {
    pub async fn open(root: &Path) -> Self {
        Self {
            inner: LocalDocumentIndex::open(root).await.unwrap(),
            count: AtomicUsize::new(0),
        }
    }

    pub fn call_count(&self) -> usize {
        self.count.load(Ordering::SeqCst)
    }

    fn tick(&self) {
        self.count.fetch_add(1, Ordering::SeqCst);
    }
}

#[async_trait]
impl DocumentTool for RecordingDocTool {
    async fn index(&self, path: &Path) -> ToolResult<Option<String>> {
        self.tick();
        self.inner.index(path).await
    }

    async fn search(&self, query: &str, k: usize) -> ToolResult<Vec<DocumentChunk>> {
        self.tick();
        self.inner.search(query, k).await
    }

    async fn get_summary(&self, id_or_path: &str) -> ToolResult<Option<DocumentSummary>> {
        self.tick();
        self.inner.get_summary(id_or_path).await
    }

    async fn locate(&self, filename: &str) -> ToolResult<Option<PathBuf>> {
        self.tick();
        self.inner.locate(filename).await
    }

    async fn list(&self) -> ToolResult<Vec<DocumentEntry>> {
        self.tick();
        self.inner.list().await
    }
}

// ============================================================================
// Executor fixture
// ============================================================================

pub fn test_date() -> NaiveDate {
    NaiveDate::from_ymd_opt(2024, 5, 1).unwrap()
}

pub fn execution_config(max_total_steps: usize) -> ExecutionConfig {
    ExecutionConfig {
        max_total_steps,
        limits: SynthesisLimits::default(),
        current_date: test_date(),
        agent_name: "Test Agent".to_string(),
    }
}

/// Executor wired to scripted collaborators, with `dir` holding documents.
pub struct Harness {
    pub model: Arc<ScriptedBackend>,
    pub web: Arc<RecordingWebTool>,
    pub docs: Arc<RecordingDocTool>,
    pub executor: ResearchExecutor,
    pub dir: tempfile::TempDir,
}

impl Harness {
    pub async fn new(model: ScriptedBackend, web: RecordingWebTool) -> Self {
        Self::with_limit(model, web, 25).await
    }

    pub async fn with_limit(model: ScriptedBackend, web: RecordingWebTool, max_total_steps: usize) -> Self {
        let dir = tempfile::tempdir().unwrap();
        let model = Arc::new(model);
        let web = Arc::new(web);
        let docs = Arc::new(RecordingDocTool::open(&dir.path().join("index")).await);

        let catalog: Arc<dyn DocumentTool> = docs.clone();
        let resolver = LocalResourceResolver::new(vec![dir.path().to_path_buf()]).with_catalog(catalog.clone());
        let executor = ResearchExecutor::new(
            model.clone(),
            web.clone(),
            catalog,
            resolver,
            execution_config(max_total_steps),
        );

        Self {
            model,
            web,
            docs,
            executor,
            dir,
        }
    }

    /// Write a document into the resolver's candidate directory.
    pub fn write_doc(&self, name: &str, content: &str) -> PathBuf {
        let path = self.dir.path().join(name);
        std::fs::write(&path, content).unwrap();
        path
    }
}
