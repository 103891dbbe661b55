//! Research Agent LLM
//!
//! Model access for the research agent:
//! - Ollama (local inference, the default)
//! - OpenAI-compatible chat completions
//!
//! Providers sit behind `LlmProvider`; the engine talks to the narrower
//! `ModelBackend`, which adds rate limiting, retries, and JSON extraction.

pub mod backend;
pub mod http_client;
pub mod ollama;
pub mod openai;
pub mod provider;
pub mod retry;
pub mod types;

use std::sync::Arc;

// Re-export main types
pub use backend::{default_system_prompt, parse_json_reply, ModelBackend, ResearchModel};
pub use http_client::build_http_client;
pub use ollama::OllamaProvider;
pub use openai::OpenAIProvider;
pub use provider::LlmProvider;
pub use retry::{with_retry, RetryPolicy};
pub use types::*;

/// Construct the provider named in `config`.
pub fn create_provider(config: ProviderConfig) -> LlmResult<Arc<dyn LlmProvider>> {
    let provider: Arc<dyn LlmProvider> = match config.provider {
        ProviderType::Ollama => Arc::new(OllamaProvider::new(config)?),
        ProviderType::OpenAI => Arc::new(OpenAIProvider::new(config)?),
    };
    Ok(provider)
}
