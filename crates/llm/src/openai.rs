//! OpenAI-Compatible Provider
//!
//! Chat completions against OpenAI or any server exposing the same API.

use async_trait::async_trait;
use serde::Deserialize;

use crate::http_client::{build_http_client, join_url};
use crate::provider::{missing_api_key_error, parse_http_error, transport_error, LlmProvider};
use crate::types::{
    LlmError, LlmRequestOptions, LlmResponse, LlmResult, Message, ProviderConfig, UsageStats,
};

const OPENAI_API_BASE: &str = "https://api.openai.com/v1";

/// OpenAI provider
pub struct OpenAIProvider {
    config: ProviderConfig,
    client: reqwest::Client,
}

impl OpenAIProvider {
    pub fn new(config: ProviderConfig) -> LlmResult<Self> {
        let client = build_http_client(config.timeout_secs)?;
        Ok(Self { config, client })
    }

    fn base_url(&self) -> &str {
        self.config.base_url.as_deref().unwrap_or(OPENAI_API_BASE)
    }

    /// Build the request body for the API
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
        wire_messages.extend(messages.iter().map(|m| {
            serde_json::json!({"role": m.role.as_str(), "content": m.content})
        }));

        let mut body = serde_json::json!({
            "model": self.config.model,
            "max_tokens": self.config.max_tokens,
            "messages": wire_messages,
            "temperature": request_options
                .temperature_override
                .unwrap_or(self.config.temperature),
        });
        if request_options.json_mode {
            body["response_format"] = serde_json::json!({"type": "json_object"});
        }
        body
    }
}

#[async_trait]
impl LlmProvider for OpenAIProvider {
    fn name(&self) -> &'static str {
        "openai"
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
        let api_key = self
            .config
            .api_key
            .as_ref()
            .ok_or_else(|| missing_api_key_error("openai"))?;

        let body = self.build_request_body(&messages, system.as_deref(), &request_options);

        let response = self
            .client
            .post(join_url(self.base_url(), "/chat/completions"))
            .header("Authorization", format!("Bearer {}", api_key))
            .json(&body)
            .send()
            .await
            .map_err(|e| transport_error(e, "openai"))?;

        let status = response.status().as_u16();
        let body_text = response.text().await.map_err(|e| LlmError::NetworkError {
            message: e.to_string(),
        })?;

        if status != 200 {
            return Err(parse_http_error(status, &body_text, "openai"));
        }

        let parsed: OpenAIResponse =
            serde_json::from_str(&body_text).map_err(|e| LlmError::ParseError {
                message: format!("Failed to parse response: {}", e),
            })?;

        let choice = parsed.choices.into_iter().next();
        Ok(LlmResponse {
            content: choice
                .as_ref()
                .and_then(|c| c.message.as_ref())
                .and_then(|m| m.content.clone()),
            stop_reason: choice.and_then(|c| c.finish_reason),
            usage: parsed
                .usage
                .map(|u| UsageStats {
                    input_tokens: u.prompt_tokens,
                    output_tokens: u.completion_tokens,
                })
                .unwrap_or_default(),
            model: parsed.model,
        })
    }

    async fn health_check(&self) -> LlmResult<()> {
        let api_key = self
            .config
            .api_key
            .as_ref()
            .ok_or_else(|| missing_api_key_error("openai"))?;

        let response = self
            .client
            .get(join_url(self.base_url(), "/models"))
            .header("Authorization", format!("Bearer {}", api_key))
            .send()
            .await
            .map_err(|e| transport_error(e, "openai"))?;

        let status = response.status().as_u16();
        if status == 200 {
            Ok(())
        } else {
            let body = response.text().await.unwrap_or_default();
            Err(parse_http_error(status, &body, "openai"))
        }
    }

    fn config(&self) -> &ProviderConfig {
        &self.config
    }
}

/// OpenAI API response format
#[derive(Debug, Deserialize)]
struct OpenAIResponse {
    model: String,
    choices: Vec<Choice>,
    usage: Option<ResponseUsage>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: Option<ResponseMessage>,
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ResponseMessage {
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ResponseUsage {
    prompt_tokens: u32,
    completion_tokens: u32,
}
