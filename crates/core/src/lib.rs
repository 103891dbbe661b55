//! Research Agent Core
//!
//! Foundational types for the research agent workspace. This crate has no
//! dependency on model providers, tools, or storage.
//!
//! ## Module Organization
//!
//! - `error` - Core error types (`CoreError`, `CoreResult`)
//! - `action` - Action registry (`ActionKind`, required parameters, position rules)
//! - `plan` - Plan and step data model, execution context keys
//! - `rate_limit` - Sliding-window call limiter shared by model and web clients

pub mod action;
pub mod error;
pub mod plan;
pub mod rate_limit;

// ── Error Types ────────────────────────────────────────────────────────
pub use error::{CoreError, CoreResult};

// ── Action Registry ────────────────────────────────────────────────────
pub use action::{ActionKind, PositionConstraint};

// ── Plan Model ─────────────────────────────────────────────────────────
pub use plan::{error_key, result_key, ContextKey, EntryOutcome, Plan, Step, STEP_LIMIT_KEY};

// ── Rate Limiting ──────────────────────────────────────────────────────
pub use rate_limit::RateLimiter;
