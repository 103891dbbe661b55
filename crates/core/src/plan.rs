//! Plan Data Model
//!
//! A plan is an ordered sequence of immutable steps plus the execution
//! context that accumulates per-step results and errors.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::action::ActionKind;

/// Context key recorded when execution stops at the step ceiling.
pub const STEP_LIMIT_KEY: &str = "error_step_limit";

// ============================================================================
// Step
// ============================================================================

/// One unit of work in a plan.
///
/// Steps are never edited after construction; growing a plan means building
/// a new step sequence.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Step {
    #[serde(rename = "action")]
    kind: ActionKind,
    #[serde(default)]
    parameters: Map<String, Value>,
    #[serde(default)]
    reasoning: String,
}

impl Step {
    pub fn new(kind: ActionKind, parameters: Map<String, Value>, reasoning: impl Into<String>) -> Self {
        Self {
            kind,
            parameters,
            reasoning: reasoning.into(),
        }
    }

    /// Step whose only parameter is `url`.
    pub fn for_url(kind: ActionKind, url: &str, reasoning: impl Into<String>) -> Self {
        let mut parameters = Map::new();
        parameters.insert("url".to_string(), Value::String(url.to_string()));
        Self::new(kind, parameters, reasoning)
    }

    pub fn kind(&self) -> ActionKind {
        self.kind
    }

    pub fn parameters(&self) -> &Map<String, Value> {
        &self.parameters
    }

    pub fn reasoning(&self) -> &str {
        &self.reasoning
    }

    /// String value of a parameter, if present and a string.
    pub fn param_str(&self, key: &str) -> Option<&str> {
        self.parameters.get(key).and_then(Value::as_str)
    }

    /// Copy of this step with a replaced parameter.
    pub fn with_param(&self, key: &str, value: Value) -> Self {
        let mut parameters = self.parameters.clone();
        parameters.insert(key.to_string(), value);
        Self::new(self.kind, parameters, self.reasoning.clone())
    }

    /// Whether this step is `kind` applied to exactly `url`.
    pub fn is_for_url(&self, kind: ActionKind, url: &str) -> bool {
        self.kind == kind && self.param_str("url") == Some(url)
    }
}

impl std::fmt::Display for Step {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}({})", self.kind, Value::Object(self.parameters.clone()))
    }
}

// ============================================================================
// Plan
// ============================================================================

/// A validated research plan and its execution context.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Plan {
    pub query: String,
    steps: Vec<Step>,
    #[serde(default)]
    pub context: Map<String, Value>,
}

impl Plan {
    pub fn new(query: impl Into<String>, steps: Vec<Step>) -> Self {
        Self {
            query: query.into(),
            steps,
            context: Map::new(),
        }
    }

    pub fn steps(&self) -> &[Step] {
        &self.steps
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    pub fn step(&self, index: usize) -> Option<&Step> {
        self.steps.get(index)
    }

    /// Swap in a new step sequence.
    ///
    /// The sequence must keep every step up to and including `cursor`
    /// unchanged; growth may only happen after the cursor.
    pub fn replace_steps(&mut self, cursor: usize, steps: Vec<Step>) -> bool {
        let keep = (cursor + 1).min(self.steps.len());
        if steps.len() < self.steps.len() || steps[..keep] != self.steps[..keep] {
            tracing::warn!(cursor, "rejected step sequence that rewrites executed steps");
            return false;
        }
        self.steps = steps;
        true
    }

    pub fn record_result(&mut self, kind: ActionKind, index: usize, value: Value) {
        self.context.insert(result_key(kind, index), value);
    }

    pub fn record_error(&mut self, kind: ActionKind, index: usize, message: impl Into<String>) {
        self.context
            .insert(error_key(kind, index), Value::String(message.into()));
    }
}

// ============================================================================
// Context keys
// ============================================================================

/// Key under which a successful step's output is stored.
pub fn result_key(kind: ActionKind, index: usize) -> String {
    format!("result_{}_{}", kind.as_str(), index)
}

/// Key under which a failed step's error message is stored.
pub fn error_key(kind: ActionKind, index: usize) -> String {
    format!("error_{}_{}", kind.as_str(), index)
}

/// Whether a context entry holds a result or an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryOutcome {
    Result,
    Error,
}

/// Decoded form of a per-step context key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ContextKey {
    pub outcome: EntryOutcome,
    pub kind: ActionKind,
    pub index: usize,
}

impl ContextKey {
    /// Decode `result_<kind>_<i>` or `error_<kind>_<i>`.
    pub fn parse(key: &str) -> Option<Self> {
        let (outcome, rest) = if let Some(rest) = key.strip_prefix("result_") {
            (EntryOutcome::Result, rest)
        } else if let Some(rest) = key.strip_prefix("error_") {
            (EntryOutcome::Error, rest)
        } else {
            return None;
        };
        let (name, index) = rest.rsplit_once('_')?;
        Some(Self {
            outcome,
            kind: ActionKind::parse(name)?,
            index: index.parse().ok()?,
        })
    }
}
