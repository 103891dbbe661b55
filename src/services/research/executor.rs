//! Execution Engine
//!
//! Walks a plan with a single cursor, dispatching each step to the web
//! tool, the document tool, or nothing at all. Failures are recorded per
//! step and never stop the run. Successful results may grow the plan
//! through the mutator. One model call at the end turns the gathered
//! context into an answer.

use std::sync::Arc;

use chrono::NaiveDate;
use serde::Serialize;
use serde_json::{json, Value};

use research_agent_core::{ActionKind, Plan, Step, STEP_LIMIT_KEY};
use research_agent_llm::{LlmRequestOptions, ModelBackend};
use research_agent_tools::{DocumentSummary, DocumentTool, WebTool};

use crate::storage::AgentConfig;
use crate::utils::error::{AppError, AppResult};

use super::memory_bridge::MemoryBridge;
use super::mutator;
use super::resolver::{LocalResourceResolver, Resolution, ResourceClass};
use super::synthesis::{
    self, SynthesisLimits, PREVIEW_TEMPERATURE, SYNTHESIS_TEMPERATURE,
};

/// Result recorded for every step of a dry run.
pub const DRY_RUN_PLACEHOLDER: &str = "[Dry run - no execution]";

/// Passages requested from the document tool when a step gives no `k`.
pub const DEFAULT_DOCUMENT_HITS: usize = 5;

/// Settings for one executor.
#[derive(Debug, Clone)]
pub struct ExecutionConfig {
    pub max_total_steps: usize,
    pub limits: SynthesisLimits,
    pub current_date: NaiveDate,
    pub agent_name: String,
}

impl ExecutionConfig {
    pub fn from_agent_config(config: &AgentConfig) -> Self {
        Self {
            max_total_steps: config.engine.max_total_steps,
            limits: SynthesisLimits {
                page_content_budget: config.engine.page_content_budget,
                max_results_in_prompt: config.engine.max_results_in_prompt,
            },
            current_date: config.current_date(),
            agent_name: config.agent_name.clone(),
        }
    }
}

impl Default for ExecutionConfig {
    fn default() -> Self {
        Self {
            max_total_steps: 25,
            limits: SynthesisLimits::default(),
            current_date: chrono::Local::now().date_naive(),
            agent_name: "Research Agent".to_string(),
        }
    }
}

// ============================================================================
// Report
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StepOutcome {
    Ok,
    Error,
    Skipped,
    DryRun,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StepRecord {
    pub index: usize,
    pub action: ActionKind,
    pub outcome: StepOutcome,
    pub detail: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StopReason {
    Completed,
    StepLimitReached,
}

/// What happened during one execution.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ExecutionReport {
    pub steps: Vec<StepRecord>,
    pub inserted_steps: usize,
    pub stop_reason: StopReason,
    pub dry_run: bool,
}

impl ExecutionReport {
    fn new(dry_run: bool) -> Self {
        Self {
            steps: Vec::new(),
            inserted_steps: 0,
            stop_reason: StopReason::Completed,
            dry_run,
        }
    }

    fn record(&mut self, index: usize, action: ActionKind, outcome: StepOutcome, detail: impl Into<String>) {
        self.steps.push(StepRecord {
            index,
            action,
            outcome,
            detail: detail.into(),
        });
    }

    pub fn count(&self, outcome: StepOutcome) -> usize {
        self.steps.iter().filter(|s| s.outcome == outcome).count()
    }
}

/// Final answer plus the executed plan and its report.
#[derive(Debug, Clone)]
pub struct ExecutionOutcome {
    pub summary: String,
    pub plan: Plan,
    pub report: ExecutionReport,
}

// ============================================================================
// ResearchExecutor
// ============================================================================

/// Runs validated plans against the model, web and document tools.
pub struct ResearchExecutor {
    model: Arc<dyn ModelBackend>,
    web: Arc<dyn WebTool>,
    documents: Arc<dyn DocumentTool>,
    resolver: LocalResourceResolver,
    memory: Option<MemoryBridge>,
    config: ExecutionConfig,
}

impl ResearchExecutor {
    pub fn new(
        model: Arc<dyn ModelBackend>,
        web: Arc<dyn WebTool>,
        documents: Arc<dyn DocumentTool>,
        resolver: LocalResourceResolver,
        config: ExecutionConfig,
    ) -> Self {
        Self {
            model,
            web,
            documents,
            resolver,
            memory: None,
            config,
        }
    }

    pub fn with_memory(mut self, memory: MemoryBridge) -> Self {
        self.memory = Some(memory);
        self
    }

    /// Execute `plan` and synthesize an answer.
    ///
    /// In a dry run every step gets a placeholder result, no tool is called,
    /// and the answer is a model-written preview of the plan.
    pub async fn execute(&self, mut plan: Plan, dry_run: bool) -> ExecutionOutcome {
        let mut report = ExecutionReport::new(dry_run);
        tracing::info!(query = %plan.query, steps = plan.len(), dry_run, "executing research plan");

        if !dry_run {
            if let Some(memory) = &self.memory {
                memory.project_conversation("user", &plan.query);
            }
        }

        let mut cursor = 0;
        while cursor < plan.len() {
            // Dry runs never grow the plan, so only live runs are capped.
            if !dry_run && cursor >= self.config.max_total_steps {
                self.stop_at_limit(&mut plan, &mut report, cursor);
                break;
            }
            let Some(step) = plan.step(cursor).cloned() else {
                break;
            };
            let kind = step.kind();

            if dry_run {
                plan.record_result(kind, cursor, Value::String(DRY_RUN_PLACEHOLDER.to_string()));
                report.record(cursor, kind, StepOutcome::DryRun, "");
                cursor += 1;
                continue;
            }

            tracing::info!(step = cursor, action = %kind, "executing step");
            match self.run_step(&step).await {
                Ok(result) => {
                    self.project(kind, &result);
                    let inserted = self.grow_plan(&mut plan, cursor, &result);
                    report.inserted_steps += inserted;
                    let detail = if inserted > 0 {
                        format!("inserted {} follow-up step(s)", inserted)
                    } else {
                        String::new()
                    };
                    report.record(cursor, kind, StepOutcome::Ok, detail);
                    plan.record_result(kind, cursor, result);
                }
                Err(e) => {
                    tracing::warn!(step = cursor, action = %kind, error = %e, "step failed");
                    let message = e.to_string();
                    report.record(cursor, kind, StepOutcome::Error, message.clone());
                    plan.record_error(kind, cursor, message);
                }
            }
            cursor += 1;
        }

        let summary = if dry_run {
            self.preview(&plan).await
        } else {
            let summary = self.synthesize(&plan).await;
            if let Some(memory) = &self.memory {
                memory.project_conversation("assistant", &summary);
            }
            summary
        };

        tracing::info!(
            executed = report.count(StepOutcome::Ok),
            failed = report.count(StepOutcome::Error),
            inserted = report.inserted_steps,
            "plan execution finished"
        );
        ExecutionOutcome {
            summary,
            plan,
            report,
        }
    }

    fn stop_at_limit(&self, plan: &mut Plan, report: &mut ExecutionReport, cursor: usize) {
        let remaining = plan.len() - cursor;
        tracing::warn!(
            limit = self.config.max_total_steps,
            remaining,
            "step limit reached, stopping execution"
        );
        plan.context.insert(
            STEP_LIMIT_KEY.to_string(),
            Value::String(format!(
                "step limit of {} reached with {} step(s) not executed",
                self.config.max_total_steps, remaining
            )),
        );
        for (index, step) in plan.steps().iter().enumerate().skip(cursor) {
            report.record(index, step.kind(), StepOutcome::Skipped, "step limit reached");
        }
        report.stop_reason = StopReason::StepLimitReached;
    }

    fn grow_plan(&self, plan: &mut Plan, cursor: usize, result: &Value) -> usize {
        let Some(steps) = mutator::mutate(plan.steps(), cursor, result) else {
            return 0;
        };
        let added = steps.len().saturating_sub(plan.len());
        if plan.replace_steps(cursor, steps) {
            added
        } else {
            0
        }
    }

    fn project(&self, kind: ActionKind, result: &Value) {
        let Some(memory) = &self.memory else {
            return;
        };
        match kind {
            ActionKind::FetchPage if result.get("html").is_some() => memory.project_page(result),
            ActionKind::SearchDocuments => memory.project_document_hits(result),
            _ => {}
        }
    }

    async fn run_step(&self, step: &Step) -> AppResult<Value> {
        match step.kind() {
            ActionKind::SearchWeb => {
                let query = required(step, "query")?;
                let hits = self.web.search(query).await?;
                Ok(serde_json::to_value(hits)?)
            }
            ActionKind::FetchPage => {
                let url = required(step, "url")?;
                if let Some(local) = self.local_target(url).await? {
                    return Ok(local);
                }
                let page = self.web.fetch(url).await?;
                if page.is_none() {
                    tracing::warn!(url, "page unavailable");
                }
                Ok(serde_json::to_value(page)?)
            }
            ActionKind::ExtractLinks => {
                let url = required(step, "url")?;
                if let Some(local) = self.local_target(url).await? {
                    return Ok(local);
                }
                Ok(serde_json::to_value(self.web.extract_links(url).await?)?)
            }
            ActionKind::ExtractSelector => {
                let url = required(step, "url")?;
                let selector = required(step, "selector")?;
                if let Some(local) = self.local_target(url).await? {
                    return Ok(local);
                }
                Ok(Value::String(self.web.extract_selector(url, selector).await?))
            }
            ActionKind::AnalyzePage => {
                let url = required(step, "url")?;
                if let Some(local) = self.local_target(url).await? {
                    return Ok(local);
                }
                Ok(serde_json::to_value(self.web.analyze(url).await?)?)
            }
            ActionKind::SearchDocuments => {
                let query = required(step, "query")?;
                let k = step
                    .parameters()
                    .get("k")
                    .and_then(Value::as_u64)
                    .map(|k| k as usize)
                    .unwrap_or(DEFAULT_DOCUMENT_HITS);
                Ok(serde_json::to_value(self.documents.search(query, k).await?)?)
            }
            ActionKind::GetDocumentSummary => {
                let file_path = required(step, "file_path")?;
                self.summarize_local(file_path).await
            }
            ActionKind::GenerateSummary => Ok(Value::Null),
            ActionKind::AskUser => {
                let question = required(step, "question")?;
                Ok(Value::String(format!("[User would be asked: {}]", question)))
            }
        }
    }

    /// Summary of a local document when `url` actually names one.
    async fn local_target(&self, url: &str) -> AppResult<Option<Value>> {
        if self.resolver.classify(url) == ResourceClass::Remote {
            return Ok(None);
        }
        tracing::debug!(url, "treating url as a local document");
        self.summarize_local(url).await.map(Some)
    }

    /// Summary of a local document.
    ///
    /// The resolver's lookup order decides which file is meant; the index is
    /// asked about the raw target (a document id or id prefix) only once
    /// resolution has failed.
    async fn summarize_local(&self, target: &str) -> AppResult<Value> {
        match self.resolver.resolve(target).await {
            Resolution::Found(path) => match self.documents.index(&path).await? {
                Some(id) => match self.documents.get_summary(&id).await? {
                    Some(summary) => summary_value(summary),
                    None => Ok(not_found(target)),
                },
                None => {
                    tracing::warn!(path = %path.display(), "local document could not be indexed");
                    Ok(not_found(target))
                }
            },
            Resolution::Unresolved(name) => match self.documents.get_summary(target).await? {
                Some(summary) => summary_value(summary),
                None => {
                    tracing::warn!(resource = %name, "local document not found");
                    Ok(not_found(&name))
                }
            },
        }
    }

    async fn synthesize(&self, plan: &Plan) -> String {
        let gathered = synthesis::partition(&plan.context);
        let prompt = synthesis::build_synthesis_prompt(&plan.query, &gathered, self.config.limits);
        let system = synthesis::synthesis_system_prompt(&self.config.agent_name, self.config.current_date);

        tracing::info!("generating research summary");
        let summary = self
            .model
            .generate_text(
                &prompt,
                Some(system.as_str()),
                &[],
                LlmRequestOptions::with_temperature(SYNTHESIS_TEMPERATURE),
            )
            .await;

        if summary.trim().is_empty() {
            tracing::error!("model returned no summary");
            return "Unable to generate a summary: the language model returned no answer.".to_string();
        }
        summary
    }

    async fn preview(&self, plan: &Plan) -> String {
        let prompt = synthesis::build_preview_prompt(plan);
        let system = synthesis::preview_system_prompt(&self.config.agent_name);
        let preview = self
            .model
            .generate_text(
                &prompt,
                Some(system.as_str()),
                &[],
                LlmRequestOptions::with_temperature(PREVIEW_TEMPERATURE),
            )
            .await;

        if preview.trim().is_empty() {
            return "Unable to generate a preview: the language model returned no answer.".to_string();
        }
        preview
    }
}

fn required<'a>(step: &'a Step, key: &str) -> AppResult<&'a str> {
    step.param_str(key)
        .filter(|v| !v.trim().is_empty())
        .ok_or_else(|| AppError::validation(format!("{} requires a '{}' string", step.kind(), key)))
}

fn summary_value(summary: DocumentSummary) -> AppResult<Value> {
    Ok(serde_json::to_value(summary)?)
}

/// Placeholder result for a local document no lookup could find.
pub fn not_found(resource: &str) -> Value {
    json!({
        "status": "not_found",
        "resource": resource,
        "message": format!("Document not found: {}", resource),
    })
}
