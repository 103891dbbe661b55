//! Research Agent
//!
//! An LLM-driven research assistant. A query is turned into a plan of tool
//! calls, the plan is executed against the web and a local document
//! collection, and the gathered context is synthesized into an answer.
//!
//! - `services::research` - the plan-execute engine
//! - `storage` - configuration and the SQLite memory store
//! - `utils` - errors and path helpers
//! - `logging` - tracing subscriber setup

pub mod logging;
pub mod services;
pub mod storage;
pub mod utils;

pub use services::research::{
    ExecutionConfig, ExecutionOutcome, LocalResourceResolver, MemoryBridge, ResearchExecutor,
    ResearchPlanner, SummaryArchive,
};
pub use storage::{AgentConfig, ConfigService, MemoryKind, MemoryStore};
pub use utils::error::{AppError, AppResult};
