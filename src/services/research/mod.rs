//! Research Engine
//!
//! Plan-then-execute orchestration for research queries:
//!
//! - `planner` - asks the model for a plan
//! - `validator` - turns raw model output into a well-formed `Plan`
//! - `mutator` - grows a plan from the results of executed steps
//! - `executor` - runs a plan step by step and synthesizes the answer
//! - `resolver` - maps plan targets onto files on disk
//! - `memory_bridge` - mirrors results into the memory store
//! - `synthesis` - prompt construction for the final answer
//! - `summaries` - Markdown archive of answers

pub mod executor;
pub mod memory_bridge;
pub mod mutator;
pub mod planner;
pub mod resolver;
pub mod summaries;
pub mod synthesis;
pub mod validator;

pub use executor::{
    ExecutionConfig, ExecutionOutcome, ExecutionReport, ResearchExecutor, StepOutcome, StepRecord,
    StopReason, DRY_RUN_PLACEHOLDER,
};
pub use memory_bridge::{BridgeStats, MemoryBridge};
pub use mutator::{mutate, MAX_FOLLOW_UP_URLS};
pub use planner::ResearchPlanner;
pub use resolver::{LocalResourceResolver, Resolution, ResourceClass};
pub use summaries::{SavedSummary, SummaryArchive};
pub use synthesis::{GatheredContext, SynthesisLimits};
pub use validator::{validate_plan, validate_step};
