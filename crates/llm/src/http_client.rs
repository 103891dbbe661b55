//! HTTP Client Factory
//!
//! Builds the reqwest client shared by the model providers.

use std::time::Duration;

use crate::types::{LlmError, LlmResult};

/// Build a `reqwest::Client` with the given request timeout.
pub fn build_http_client(timeout_secs: u64) -> LlmResult<reqwest::Client> {
    reqwest::Client::builder()
        .timeout(Duration::from_secs(timeout_secs.max(1)))
        .user_agent(concat!("research-agent/", env!("CARGO_PKG_VERSION")))
        .build()
        .map_err(|e| LlmError::Other {
            message: format!("failed to build HTTP client: {}", e),
        })
}

/// Join a base URL and an API path without doubling slashes.
pub fn join_url(base: &str, path: &str) -> String {
    format!("{}/{}", base.trim_end_matches('/'), path.trim_start_matches('/'))
}
