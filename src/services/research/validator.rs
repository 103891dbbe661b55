//! Plan Validator
//!
//! Turns untrusted model output into a [`Plan`] that satisfies the action
//! registry. Malformed steps are dropped with a warning, never a failure.
//! The result always has at least one step.

use serde_json::{Map, Value};

use research_agent_core::{ActionKind, Plan, PositionConstraint, Step};

/// Reasoning attached to the fallback step.
pub const FALLBACK_REASONING: &str = "no valid steps";

/// Validate raw plan data.
///
/// Accepts `{"steps": [...]}` or a bare array of steps. Anything else yields
/// the single-step fallback plan.
pub fn validate_plan(query: &str, raw: &Value) -> Plan {
    let raw_steps: &[Value] = match raw {
        Value::Array(items) => items,
        Value::Object(map) => match map.get("steps") {
            Some(Value::Array(items)) => items,
            _ => &[],
        },
        _ => &[],
    };

    let mut steps: Vec<Step> = Vec::with_capacity(raw_steps.len());
    for (index, raw_step) in raw_steps.iter().enumerate() {
        match validate_step(raw_step) {
            Ok(step) => steps.push(step),
            Err(reason) => {
                tracing::warn!(index, reason = %reason, "dropping invalid plan step");
            }
        }
    }

    if steps.is_empty() {
        tracing::warn!(
            candidates = raw_steps.len(),
            "no valid plan steps, falling back to a summary-only plan"
        );
        steps.push(fallback_step());
    }

    warn_on_position_violations(&steps);
    Plan::new(query, steps)
}

/// The step used when nothing else survives validation.
pub fn fallback_step() -> Step {
    Step::new(ActionKind::GenerateSummary, Map::new(), FALLBACK_REASONING)
}

/// Validate and repair one raw step.
pub fn validate_step(raw: &Value) -> Result<Step, String> {
    let obj = raw
        .as_object()
        .ok_or_else(|| format!("step is not a record: {}", raw))?;

    let name = obj
        .get("action")
        .or_else(|| obj.get("kind"))
        .and_then(Value::as_str)
        .ok_or_else(|| "step has no action".to_string())?;
    let kind = ActionKind::parse(name).ok_or_else(|| format!("unknown action '{}'", name))?;

    let parameters = match obj.get("parameters") {
        None | Some(Value::Null) => Map::new(),
        Some(Value::Object(params)) => params.clone(),
        Some(Value::String(query)) if kind == ActionKind::SearchWeb => {
            let mut params = Map::new();
            params.insert("query".to_string(), Value::String(query.clone()));
            params
        }
        Some(other) => {
            tracing::debug!(action = %kind, parameters = %other, "ignoring non-record parameters");
            Map::new()
        }
    };

    for key in kind.required_params() {
        if !parameters.get(*key).is_some_and(is_present) {
            return Err(format!("{} is missing required parameter '{}'", kind, key));
        }
    }

    if kind == ActionKind::GetDocumentSummary {
        let file_path = parameters.get("file_path").and_then(Value::as_str).unwrap_or("");
        if file_path.trim().to_ascii_lowercase().starts_with("http") {
            return Err(format!(
                "{} cannot summarize a remote URL: {}",
                kind, file_path
            ));
        }
    }

    let reasoning = obj
        .get("reasoning")
        .and_then(Value::as_str)
        .unwrap_or_default();

    Ok(Step::new(kind, parameters, reasoning))
}

fn is_present(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::String(s) => !s.trim().is_empty(),
        Value::Array(items) => !items.is_empty(),
        Value::Object(map) => !map.is_empty(),
        Value::Bool(_) | Value::Number(_) => true,
    }
}

fn warn_on_position_violations(steps: &[Step]) {
    let last = steps.len().saturating_sub(1);
    for (index, step) in steps.iter().enumerate() {
        if step.kind().position() == PositionConstraint::Last && index != last {
            tracing::warn!(index, action = %step.kind(), "step expected at the end of the plan");
        }
    }
}
