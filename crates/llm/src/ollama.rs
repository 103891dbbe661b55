//! Ollama Provider
//!
//! Local inference through the Ollama `/api/chat` endpoint.

use async_trait::async_trait;
use serde::Deserialize;

use crate::http_client::{build_http_client, join_url};
use crate::provider::{parse_http_error, transport_error, LlmProvider};
use crate::types::{
    LlmError, LlmRequestOptions, LlmResponse, LlmResult, Message, ProviderConfig, UsageStats,
};

const DEFAULT_OLLAMA_URL: &str = "http://localhost:11434";

/// Ollama provider
pub struct OllamaProvider {
    config: ProviderConfig,
    client: reqwest::Client,
}

impl OllamaProvider {
    pub fn new(config: ProviderConfig) -> LlmResult<Self> {
        let client = build_http_client(config.timeout_secs)?;
        Ok(Self { config, client })
    }

    fn base_url(&self) -> &str {
        self.config.base_url.as_deref().unwrap_or(DEFAULT_OLLAMA_URL)
    }

    /// Build the request body for `/api/chat`
    fn build_request_body(
        &self,
        messages: &[Message],
        system: Option<&str>,
        request_options: &LlmRequestOptions,
    ) -> serde_json::Value {
        let mut wire_messages = Vec::with_capacity(messages.len() + 1);
        if let Some(system) = system {
            wire_messages.push(serde_json::json!({"role": "system", "content": system}));
        }
        for message in messages {
            wire_messages.push(serde_json::json!({
                "role": message.role.as_str(),
                "content": message.content,
            }));
        }

        let temperature = request_options
            .temperature_override
            .unwrap_or(self.config.temperature);

        let mut body = serde_json::json!({
            "model": self.config.model,
            "messages": wire_messages,
            "stream": false,
            "options": {
                "temperature": temperature,
                "num_predict": self.config.max_tokens,
            },
        });
        if request_options.json_mode {
            body["format"] = serde_json::Value::String("json".to_string());
        }
        body
    }
}

#[async_trait]
impl LlmProvider for OllamaProvider {
    fn name(&self) -> &'static str {
        "ollama"
    }

    fn model(&self) -> &str {
        &self.config.model
    }

    async fn send_message(
        &self,
        messages: Vec<Message>,
        system: Option<String>,
        request_options: LlmRequestOptions,
    ) -> LlmResult<LlmResponse> {
        let body = self.build_request_body(&messages, system.as_deref(), &request_options);

        let response = self
            .client
            .post(join_url(self.base_url(), "/api/chat"))
            .json(&body)
            .send()
            .await
            .map_err(|e| transport_error(e, "ollama"))?;

        let status = response.status().as_u16();
        let body_text = response.text().await.map_err(|e| LlmError::NetworkError {
            message: e.to_string(),
        })?;

        if status != 200 {
            return Err(parse_http_error(status, &body_text, "ollama"));
        }

        let chat: OllamaChatResponse =
            serde_json::from_str(&body_text).map_err(|e| LlmError::ParseError {
                message: format!("Failed to parse response: {}", e),
            })?;

        Ok(LlmResponse {
            content: chat.message.map(|m| m.content),
            stop_reason: chat.done_reason,
            usage: UsageStats {
                input_tokens: chat.prompt_eval_count.unwrap_or(0),
                output_tokens: chat.eval_count.unwrap_or(0),
            },
            model: chat.model.unwrap_or_else(|| self.config.model.clone()),
        })
    }

    async fn health_check(&self) -> LlmResult<()> {
        let response = self
            .client
            .get(join_url(self.base_url(), "/api/tags"))
            .send()
            .await
            .map_err(|e| transport_error(e, "ollama"))?;

        let status = response.status().as_u16();
        if status == 200 {
            Ok(())
        } else {
            let body = response.text().await.unwrap_or_default();
            Err(parse_http_error(status, &body, "ollama"))
        }
    }

    fn config(&self) -> &ProviderConfig {
        &self.config
    }
}

/// Ollama `/api/chat` response format (non-streaming)
#[derive(Debug, Deserialize)]
struct OllamaChatResponse {
    model: Option<String>,
    message: Option<OllamaMessage>,
    done_reason: Option<String>,
    prompt_eval_count: Option<u32>,
    eval_count: Option<u32>,
}

#[derive(Debug, Deserialize)]
struct OllamaMessage {
    content: String,
}
