//! Research Planner
//!
//! Asks the model backend for a plan and hands the raw output to the
//! validator, with one repair attempt when the first answer has no steps.

use std::sync::Arc;

use serde_json::Value;

use research_agent_core::{ActionKind, Plan};
use research_agent_llm::{LlmRequestOptions, ModelBackend};

use crate::utils::error::{AppError, AppResult};

use super::validator::validate_plan;

/// Temperature used for plan generation.
pub const PLANNING_TEMPERATURE: f32 = 0.2;

const PLANNER_SYSTEM_PROMPT: &str = "You are a research planner. You break research questions \
into concrete tool calls and reply with JSON only.";

/// Produces validated plans for research queries.
pub struct ResearchPlanner {
    model: Arc<dyn ModelBackend>,
    max_query_length: usize,
}

impl ResearchPlanner {
    pub fn new(model: Arc<dyn ModelBackend>, max_query_length: usize) -> Self {
        Self {
            model,
            max_query_length: max_query_length.max(1),
        }
    }

    /// Plan research for `query`.
    ///
    /// Fails only when the model produces no steps at all, even after a
    /// repair prompt. Steps that are present but invalid are handled by the
    /// validator's fallback.
    pub async fn create_plan(&self, query: &str) -> AppResult<Plan> {
        let query = truncate_query(query.trim(), self.max_query_length);
        if query.is_empty() {
            return Err(AppError::validation("query is empty"));
        }

        let options = LlmRequestOptions::with_temperature(PLANNING_TEMPERATURE);
        let mut raw = self
            .model
            .generate_json(&plan_prompt(&query), Some(PLANNER_SYSTEM_PROMPT), options.clone())
            .await;

        if !has_steps(&raw) {
            tracing::warn!("plan response had no steps, retrying with a repair prompt");
            raw = self
                .model
                .generate_json(&repair_prompt(&query, &raw), Some(PLANNER_SYSTEM_PROMPT), options)
                .await;
        }
        if !has_steps(&raw) {
            tracing::error!(query = %query, "model produced no plan steps");
            return Err(AppError::planning("failed to create a research plan"));
        }

        let plan = validate_plan(&query, &raw);
        tracing::info!(steps = plan.len(), "research plan created");
        Ok(plan)
    }
}

/// Cut a query to at most `max_chars` characters.
pub fn truncate_query(query: &str, max_chars: usize) -> String {
    if query.chars().count() <= max_chars {
        return query.to_string();
    }
    tracing::warn!(max_chars, "query truncated before planning");
    query.chars().take(max_chars).collect()
}

fn has_steps(raw: &Value) -> bool {
    match raw {
        Value::Array(items) => !items.is_empty(),
        Value::Object(map) => map
            .get("steps")
            .and_then(Value::as_array)
            .is_some_and(|steps| !steps.is_empty()),
        _ => false,
    }
}

fn action_catalogue() -> String {
    ActionKind::ALL
        .iter()
        .map(|kind| {
            let params = kind.required_params();
            let params = if params.is_empty() {
                "no parameters".to_string()
            } else {
                params.join(", ")
            };
            format!("- {}: {} ({})", kind.as_str(), kind.description(), params)
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// Prompt asking for a plan for `query`.
pub fn plan_prompt(query: &str) -> String {
    format!(
        "Create a step-by-step research plan for this question:\n\n{query}\n\n\
         Available actions:\n{actions}\n\n\
         Guidelines:\n\
         - Use search_documents when local documents may help, search_web for current information.\n\
         - get_document_summary takes a local file path or document id, never a web URL.\n\
         - End the plan with generate_summary.\n\n\
         Reply with JSON in exactly this shape:\n\
         {{\"steps\": [{{\"action\": \"search_web\", \"parameters\": {{\"query\": \"...\"}}, \"reasoning\": \"...\"}}]}}",
        query = query,
        actions = action_catalogue(),
    )
}

fn repair_prompt(query: &str, previous: &Value) -> String {
    format!(
        "Your previous reply did not contain a usable plan:\n{previous}\n\n\
         Reply again with only a JSON object of the form \
         {{\"steps\": [{{\"action\": string, \"parameters\": object, \"reasoning\": string}}]}} \
         for this question:\n\n{query}\n\nValid actions: {actions}.",
        previous = previous,
        query = query,
        actions = ActionKind::ALL
            .iter()
            .map(|k| k.as_str())
            .collect::<Vec<_>>()
            .join(", "),
    )
}
