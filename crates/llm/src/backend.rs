//! Model Backend
//!
//! The two operations the research engine needs from a language model:
//! free text and a JSON object. Failures are logged and turned into empty
//! values so callers never see backend errors.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::NaiveDate;
use serde_json::Value;

use research_agent_core::RateLimiter;

use crate::provider::LlmProvider;
use crate::retry::{with_retry, RetryPolicy};
use crate::types::{LlmError, LlmRequestOptions, LlmResult, Message};

/// Text and JSON generation as seen by the research engine.
#[async_trait]
pub trait ModelBackend: Send + Sync {
    /// Generate free text. Returns an empty string on failure.
    async fn generate_text(
        &self,
        prompt: &str,
        system: Option<&str>,
        history: &[Message],
        options: LlmRequestOptions,
    ) -> String;

    /// Generate a JSON value. Returns `{}` on failure.
    async fn generate_json(
        &self,
        prompt: &str,
        system: Option<&str>,
        options: LlmRequestOptions,
    ) -> Value;
}

/// Provider-backed implementation with rate limiting and retries.
pub struct ResearchModel {
    provider: Arc<dyn LlmProvider>,
    limiter: Arc<RateLimiter>,
    retry: RetryPolicy,
    current_date: NaiveDate,
}

impl ResearchModel {
    pub fn new(provider: Arc<dyn LlmProvider>, limiter: Arc<RateLimiter>, current_date: NaiveDate) -> Self {
        Self {
            provider,
            limiter,
            retry: RetryPolicy::default(),
            current_date,
        }
    }

    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn provider_name(&self) -> &'static str {
        self.provider.name()
    }

    /// System prompt used when the caller supplies none.
    pub fn default_system_prompt(&self) -> String {
        default_system_prompt(self.current_date)
    }

    async fn complete(
        &self,
        messages: Vec<Message>,
        system: String,
        options: LlmRequestOptions,
    ) -> LlmResult<String> {
        with_retry(&self.retry, self.provider.name(), || {
            let messages = messages.clone();
            let system = system.clone();
            let options = options.clone();
            async move {
                self.limiter.acquire().await;
                let response = self
                    .provider
                    .send_message(messages, Some(system), options)
                    .await?;
                Ok(response.content.unwrap_or_default())
            }
        })
        .await
    }
}

#[async_trait]
impl ModelBackend for ResearchModel {
    async fn generate_text(
        &self,
        prompt: &str,
        system: Option<&str>,
        history: &[Message],
        options: LlmRequestOptions,
    ) -> String {
        let mut messages = history.to_vec();
        messages.push(Message::user(prompt));
        let system = system
            .map(str::to_string)
            .unwrap_or_else(|| self.default_system_prompt());

        match self.complete(messages, system, options).await {
            Ok(text) => text,
            Err(e) => {
                tracing::error!(provider = self.provider.name(), error = %e, "text generation failed");
                String::new()
            }
        }
    }

    async fn generate_json(
        &self,
        prompt: &str,
        system: Option<&str>,
        options: LlmRequestOptions,
    ) -> Value {
        let messages = vec![Message::user(prompt)];
        let system = system
            .map(str::to_string)
            .unwrap_or_else(|| self.default_system_prompt());
        let options = options.json();

        // Malformed JSON counts as a transient failure and is retried.
        let result = with_retry(&self.retry, self.provider.name(), || {
            let messages = messages.clone();
            let system = system.clone();
            let options = options.clone();
            async move {
                self.limiter.acquire().await;
                let response = self
                    .provider
                    .send_message(messages, Some(system), options)
                    .await?;
                parse_json_reply(response.text()).ok_or_else(|| LlmError::ParseError {
                    message: "model reply is not valid JSON".to_string(),
                })
            }
        })
        .await;

        match result {
            Ok(value) => value,
            Err(e) => {
                tracing::error!(provider = self.provider.name(), error = %e, "JSON generation failed");
                Value::Object(serde_json::Map::new())
            }
        }
    }
}

/// Default system prompt with a date reminder.
pub fn default_system_prompt(current_date: NaiveDate) -> String {
    format!(
        "You are a helpful research assistant. Today's date is {}. \
         Do not present events after this date as having happened.",
        current_date.format("%B %-d, %Y")
    )
}

/// Parse a model reply as JSON, tolerating markdown fences and prose around
/// the payload.
pub fn parse_json_reply(text: &str) -> Option<Value> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return None;
    }
    if let Ok(value) = serde_json::from_str::<Value>(trimmed) {
        return Some(value);
    }
    if let Some(inner) = strip_code_fence(trimmed) {
        if let Ok(value) = serde_json::from_str::<Value>(inner) {
            return Some(value);
        }
    }
    outermost(trimmed, '{', '}')
        .or_else(|| outermost(trimmed, '[', ']'))
        .and_then(|slice| serde_json::from_str(slice).ok())
}

fn strip_code_fence(text: &str) -> Option<&str> {
    let start = text.find("```")?;
    let after_fence = &text[start + 3..];
    let body = match after_fence.find('\n') {
        Some(nl) => &after_fence[nl + 1..],
        None => after_fence,
    };
    let end = body.find("```")?;
    Some(body[..end].trim())
}

fn outermost(text: &str, open: char, close: char) -> Option<&str> {
    let start = text.find(open)?;
    let end = text.rfind(close)?;
    (end > start).then(|| &text[start..=end])
}
