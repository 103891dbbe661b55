//! Synthesis Prompts
//!
//! Partitions an execution context by result kind and renders the bounded
//! prompt used for the final answer, plus the dry-run preview prompt.

use chrono::NaiveDate;
use serde_json::{Map, Value};

use research_agent_core::{ActionKind, ContextKey, EntryOutcome, Plan, STEP_LIMIT_KEY};

/// Temperature for the final answer.
pub const SYNTHESIS_TEMPERATURE: f32 = 0.5;

/// Temperature for the dry-run preview.
pub const PREVIEW_TEMPERATURE: f32 = 0.7;

/// Size limits applied when quoting gathered material.
#[derive(Debug, Clone, Copy)]
pub struct SynthesisLimits {
    pub page_content_budget: usize,
    pub max_results_in_prompt: usize,
}

impl Default for SynthesisLimits {
    fn default() -> Self {
        Self {
            page_content_budget: 1500,
            max_results_in_prompt: 5,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SearchEntry {
    pub title: String,
    pub url: String,
    pub snippet: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SourceEntry {
    pub title: String,
    pub location: String,
    pub content: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct DocumentHit {
    pub source: String,
    pub similarity: Option<f64>,
    pub text: String,
}

/// Execution context sorted into prompt sections.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct GatheredContext {
    pub search_results: Vec<SearchEntry>,
    pub pages: Vec<SourceEntry>,
    pub local_documents: Vec<SourceEntry>,
    pub document_hits: Vec<DocumentHit>,
    pub extracted: Vec<SourceEntry>,
    pub notes: Vec<String>,
    pub failed_fetches: usize,
    pub failed_analyses: usize,
    pub missing_documents: Vec<String>,
    pub other_errors: usize,
    pub step_limit: Option<String>,
}

impl GatheredContext {
    pub fn is_empty(&self) -> bool {
        self.search_results.is_empty()
            && self.pages.is_empty()
            && self.local_documents.is_empty()
            && self.document_hits.is_empty()
            && self.extracted.is_empty()
    }
}

fn str_field<'a>(value: &'a Value, key: &str) -> &'a str {
    value.get(key).and_then(Value::as_str).unwrap_or("")
}

fn is_not_found(value: &Value) -> bool {
    str_field(value, "status") == "not_found"
}

/// Sort context entries into prompt sections, in step order.
pub fn partition(context: &Map<String, Value>) -> GatheredContext {
    let mut entries: Vec<(ContextKey, &Value)> = context
        .iter()
        .filter_map(|(key, value)| ContextKey::parse(key).map(|k| (k, value)))
        .collect();
    entries.sort_by_key(|(key, _)| key.index);

    let mut gathered = GatheredContext {
        step_limit: context
            .get(STEP_LIMIT_KEY)
            .and_then(Value::as_str)
            .map(str::to_string),
        ..Default::default()
    };

    for (key, value) in entries {
        if key.outcome == EntryOutcome::Error {
            match key.kind {
                ActionKind::FetchPage => gathered.failed_fetches += 1,
                ActionKind::AnalyzePage => gathered.failed_analyses += 1,
                _ => gathered.other_errors += 1,
            }
            continue;
        }

        if is_not_found(value) {
            let resource = str_field(value, "resource");
            if !gathered.missing_documents.iter().any(|r| r == resource) {
                gathered.missing_documents.push(resource.to_string());
            }
            continue;
        }
        // Local documents standing in for a web resource.
        if value.get("metadata").and_then(|m| m.get("filename")).is_some() {
            add_local_document(&mut gathered, value);
            continue;
        }

        match key.kind {
            ActionKind::SearchWeb => {
                for hit in value.as_array().into_iter().flatten() {
                    gathered.search_results.push(SearchEntry {
                        title: str_field(hit, "title").to_string(),
                        url: str_field(hit, "url").to_string(),
                        snippet: str_field(hit, "snippet").to_string(),
                    });
                }
            }
            ActionKind::FetchPage => {
                if value.is_null() {
                    gathered.failed_fetches += 1;
                } else {
                    gathered.pages.push(SourceEntry {
                        title: str_field(value, "title").to_string(),
                        location: str_field(value, "url").to_string(),
                        content: str_field(value, "content").to_string(),
                    });
                }
            }
            ActionKind::AnalyzePage => {
                if value.get("success").and_then(Value::as_bool) == Some(true) {
                    let location = str_field(value, "url").to_string();
                    // The fetched page already carries the text.
                    if !gathered.pages.iter().any(|p| p.location == location) {
                        gathered.pages.push(SourceEntry {
                            title: str_field(value, "title").to_string(),
                            location,
                            content: str_field(value, "main_content").to_string(),
                        });
                    }
                } else {
                    gathered.failed_analyses += 1;
                }
            }
            ActionKind::ExtractSelector => {
                if let Some(text) = value.as_str().filter(|t| !t.trim().is_empty()) {
                    gathered.extracted.push(SourceEntry {
                        title: format!("Extracted text (step {})", key.index + 1),
                        location: String::new(),
                        content: text.to_string(),
                    });
                }
            }
            ActionKind::ExtractLinks => {
                let count = value.as_array().map_or(0, Vec::len);
                gathered
                    .notes
                    .push(format!("Step {} found {} links.", key.index + 1, count));
            }
            ActionKind::SearchDocuments => {
                for hit in value.as_array().into_iter().flatten() {
                    let metadata = hit.get("metadata");
                    gathered.document_hits.push(DocumentHit {
                        source: metadata
                            .map(|m| str_field(m, "source"))
                            .filter(|s| !s.is_empty())
                            .unwrap_or("Unknown")
                            .to_string(),
                        similarity: metadata
                            .and_then(|m| m.get("similarity"))
                            .and_then(Value::as_f64),
                        text: str_field(hit, "text").to_string(),
                    });
                }
            }
            ActionKind::GetDocumentSummary => add_local_document(&mut gathered, value),
            ActionKind::AskUser => {
                if let Some(text) = value.as_str() {
                    gathered.notes.push(text.to_string());
                }
            }
            ActionKind::GenerateSummary => {}
        }
    }

    gathered
}

fn add_local_document(gathered: &mut GatheredContext, value: &Value) {
    let metadata = value.get("metadata");
    let title = metadata
        .map(|m| str_field(m, "filename"))
        .unwrap_or("")
        .to_string();
    let location = metadata
        .and_then(|m| m.get("path"))
        .and_then(Value::as_str)
        .unwrap_or("")
        .to_string();
    // A fetch of a local file and its follow-up analysis summarize the same document.
    let seen = gathered.local_documents.iter().any(|doc| {
        if location.is_empty() {
            doc.location.is_empty() && doc.title == title
        } else {
            doc.location == location
        }
    });
    if seen {
        return;
    }
    gathered.local_documents.push(SourceEntry {
        title,
        location,
        content: str_field(value, "content").to_string(),
    });
}

/// Char-safe truncation with a trailing `...` when shortened.
pub fn truncate_chars(text: &str, max_chars: usize) -> String {
    match text.char_indices().nth(max_chars) {
        Some((byte_idx, _)) => format!("{}...", &text[..byte_idx]),
        None => text.to_string(),
    }
}

/// System prompt for the final answer.
pub fn synthesis_system_prompt(agent_name: &str, current_date: NaiveDate) -> String {
    format!(
        "You are {name}, a research assistant. Today's date is {date}.\n\
         Answer the question using only the research material provided, citing sources by title or URL.\n\
         Rules:\n\
         - Never state facts attributed to sources that failed to load. Say that they could not be read.\n\
         - If the material is not enough to answer reliably, say so explicitly instead of guessing.\n\
         - Treat {date} as today. Do not describe anything after it as having happened, \
         and do not invent dates.",
        name = agent_name,
        date = current_date.format("%B %-d, %Y"),
    )
}

/// User prompt for the final answer.
pub fn build_synthesis_prompt(query: &str, gathered: &GatheredContext, limits: SynthesisLimits) -> String {
    let budget = limits.page_content_budget;
    let max = limits.max_results_in_prompt;
    let mut prompt = format!("Research question: {}\n\n", query);

    if gathered.is_empty() {
        prompt.push_str(
            "No research material could be gathered for this question. \
             Say plainly that reliable information was not found, and do not answer from memory \
             as if it had been researched.\n",
        );
    }

    if !gathered.search_results.is_empty() {
        prompt.push_str("## Web search results\n");
        for (i, hit) in gathered.search_results.iter().take(max).enumerate() {
            prompt.push_str(&format!("{}. {} ({})\n", i + 1, hit.title, hit.url));
            if !hit.snippet.is_empty() {
                prompt.push_str(&format!("   {}\n", truncate_chars(&hit.snippet, budget)));
            }
        }
        prompt.push('\n');
    }

    write_sources(&mut prompt, "## Web pages", &gathered.pages, limits);
    write_sources(&mut prompt, "## Local documents", &gathered.local_documents, limits);
    write_sources(&mut prompt, "## Extracted text", &gathered.extracted, limits);

    if !gathered.document_hits.is_empty() {
        prompt.push_str("## Document search results\n");
        for hit in gathered.document_hits.iter().take(max) {
            match hit.similarity {
                Some(score) => prompt.push_str(&format!("[{}, relevance {:.2}]\n", hit.source, score)),
                None => prompt.push_str(&format!("[{}]\n", hit.source)),
            }
            prompt.push_str(&truncate_chars(&hit.text, budget));
            prompt.push_str("\n\n");
        }
    }

    let mut caveats = Vec::new();
    if gathered.failed_fetches > 0 || gathered.failed_analyses > 0 {
        caveats.push(format!(
            "{} page fetch(es) and {} page analysis step(s) failed. \
             Do not state anything those sources might have contained.",
            gathered.failed_fetches, gathered.failed_analyses
        ));
    }
    if !gathered.missing_documents.is_empty() {
        caveats.push(format!(
            "These local documents could not be found: {}.",
            gathered.missing_documents.join(", ")
        ));
    }
    if gathered.other_errors > 0 {
        caveats.push(format!("{} other step(s) failed.", gathered.other_errors));
    }
    if let Some(limit) = &gathered.step_limit {
        caveats.push(format!("Research was cut short: {}.", limit));
    }
    caveats.extend(gathered.notes.iter().cloned());

    if !caveats.is_empty() {
        prompt.push_str("## Notes\n");
        for caveat in caveats {
            prompt.push_str(&format!("- {}\n", caveat));
        }
        prompt.push('\n');
    }

    prompt.push_str("Write a clear, well-organized answer to the research question.");
    prompt
}

fn write_sources(prompt: &mut String, heading: &str, sources: &[SourceEntry], limits: SynthesisLimits) {
    if sources.is_empty() {
        return;
    }
    prompt.push_str(heading);
    prompt.push('\n');
    for source in sources.iter().take(limits.max_results_in_prompt) {
        let title = if source.title.is_empty() { "Untitled" } else { &source.title };
        if source.location.is_empty() {
            prompt.push_str(&format!("### {}\n", title));
        } else {
            prompt.push_str(&format!("### {} ({})\n", title, source.location));
        }
        prompt.push_str(&truncate_chars(&source.content, limits.page_content_budget));
        prompt.push_str("\n\n");
    }
}

/// System prompt for the dry-run preview.
pub fn preview_system_prompt(agent_name: &str) -> String {
    format!(
        "You are {}, a research assistant. Given a research plan, describe how it would be \
         carried out and what information each step is likely to contribute. \
         Do not invent results.",
        agent_name
    )
}

/// User prompt describing the plan for the dry-run preview.
pub fn build_preview_prompt(plan: &Plan) -> String {
    let mut prompt = format!("Query: {}\n\nExecution plan:\n", plan.query);
    for (i, step) in plan.steps().iter().enumerate() {
        prompt.push_str(&format!(
            "Step {}: {}\nParameters: {}\nReasoning: {}\n\n",
            i + 1,
            step.kind(),
            Value::Object(step.parameters().clone()),
            step.reasoning()
        ));
    }
    prompt.push_str(
        "Preview how this plan would run. Explain what each step would gather \
         and how it contributes to answering the query.",
    );
    prompt
}
