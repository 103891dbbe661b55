//! JSON Configuration Management
//!
//! Loads `AgentConfig` from defaults, then `<data_dir>/config.json`, then
//! `.env` and process environment overrides.

use std::fs;
use std::path::{Path, PathBuf};

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use research_agent_llm::{ProviderConfig, ProviderType};
use research_agent_tools::{WebToolConfig, DEFAULT_ALLOWED_DOMAINS};

use crate::utils::error::{AppError, AppResult};
use crate::utils::paths::{
    config_path, default_data_dir, documents_dir, ensure_dir, expand_home, memory_db_path,
    summaries_dir,
};

// ============================================================================
// Settings groups
// ============================================================================

/// Model provider settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LlmSettings {
    /// `ollama` or `openai`
    pub provider: String,
    pub base_url: String,
    pub model: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
    pub timeout_secs: u64,
    pub temperature: f32,
    pub max_tokens: u32,
}

impl Default for LlmSettings {
    fn default() -> Self {
        Self {
            provider: "ollama".to_string(),
            base_url: "http://localhost:11434".to_string(),
            model: "gemma3:latest".to_string(),
            api_key: None,
            timeout_secs: 120,
            temperature: 0.7,
            max_tokens: 4096,
        }
    }
}

/// Web retrieval settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WebSettings {
    pub user_agent: String,
    pub request_timeout_secs: u64,
    /// Empty allows every public host
    pub allowed_domains: Vec<String>,
    /// `duckduckgo`, `tavily` or `brave`
    pub search_provider: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub search_api_key: Option<String>,
    pub max_search_results: u32,
}

impl Default for WebSettings {
    fn default() -> Self {
        let tool = WebToolConfig::default();
        Self {
            user_agent: tool.user_agent,
            request_timeout_secs: tool.timeout_secs,
            allowed_domains: DEFAULT_ALLOWED_DOMAINS.iter().map(|d| d.to_string()).collect(),
            search_provider: tool.search_provider,
            search_api_key: None,
            max_search_results: tool.max_search_results,
        }
    }
}

/// Orchestration limits
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineSettings {
    /// Hard ceiling on executed steps, including inserted ones
    pub max_total_steps: usize,
    /// Characters of page content quoted per source during synthesis
    pub page_content_budget: usize,
    /// Results per category quoted during synthesis
    pub max_results_in_prompt: usize,
    /// Longer queries are truncated before planning
    pub max_query_length: usize,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            max_total_steps: 25,
            page_content_budget: 1500,
            max_results_in_prompt: 5,
            max_query_length: 500,
        }
    }
}

// ============================================================================
// AgentConfig
// ============================================================================

/// Complete agent configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AgentConfig {
    pub agent_name: String,
    pub llm: LlmSettings,
    /// Model calls per minute
    pub api_rate_limit: u32,
    pub web: WebSettings,
    /// Web calls per minute
    pub web_rate_limit: u32,
    pub data_dir: PathBuf,
    pub engine: EngineSettings,
    /// ISO date used as "today" in prompts; absent means the system date
    #[serde(skip_serializing_if = "Option::is_none")]
    pub current_date: Option<String>,
    pub log_level: String,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            agent_name: "Research Agent".to_string(),
            llm: LlmSettings::default(),
            api_rate_limit: 1000,
            web: WebSettings::default(),
            web_rate_limit: 10,
            data_dir: default_data_dir().unwrap_or_else(|_| PathBuf::from(".research-agent")),
            engine: EngineSettings::default(),
            current_date: None,
            log_level: "info".to_string(),
        }
    }
}

impl AgentConfig {
    /// Check the configuration for values the agent cannot run with
    pub fn validate(&self) -> Result<(), String> {
        if self.api_rate_limit == 0 {
            return Err("api_rate_limit must be greater than zero".to_string());
        }
        if self.web_rate_limit == 0 {
            return Err("web_rate_limit must be greater than zero".to_string());
        }
        if self.engine.max_total_steps == 0 {
            return Err("max_total_steps must be greater than zero".to_string());
        }
        if !(0.0..=2.0).contains(&self.llm.temperature) {
            return Err(format!(
                "temperature must be between 0 and 2, got {}",
                self.llm.temperature
            ));
        }
        self.llm
            .provider
            .parse::<ProviderType>()
            .map_err(|e| format!("llm.provider: {}", e))?;
        if let Some(date) = &self.current_date {
            NaiveDate::parse_from_str(date, "%Y-%m-%d")
                .map_err(|e| format!("current_date '{}' is not an ISO date: {}", date, e))?;
        }
        Ok(())
    }

    /// Apply overrides from a variable lookup (process environment in production)
    pub fn apply_env_overrides<F>(&mut self, lookup: F) -> AppResult<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        fn parsed<T: std::str::FromStr>(key: &str, raw: String) -> AppResult<T> {
            raw.trim()
                .parse()
                .map_err(|_| AppError::config(format!("{} has an invalid value: {}", key, raw)))
        }

        if let Some(v) = lookup("OLLAMA_BASE_URL") {
            self.llm.base_url = v;
        }
        if let Some(v) = lookup("OLLAMA_MODEL") {
            self.llm.model = v;
        }
        if let Some(v) = lookup("OLLAMA_TIMEOUT") {
            self.llm.timeout_secs = parsed("OLLAMA_TIMEOUT", v)?;
        }
        if let Some(v) = lookup("LLM_PROVIDER") {
            self.llm.provider = v.to_lowercase();
        }
        if let Some(v) = lookup("LLM_API_KEY") {
            self.llm.api_key = Some(v);
        }
        if let Some(v) = lookup("TEMPERATURE") {
            self.llm.temperature = parsed("TEMPERATURE", v)?;
        }
        if let Some(v) = lookup("DATA_DIR") {
            self.data_dir = expand_home(&v);
        }
        if let Some(v) = lookup("LOG_LEVEL") {
            self.log_level = v.to_lowercase();
        }
        if let Some(v) = lookup("API_RATE_LIMIT") {
            self.api_rate_limit = parsed("API_RATE_LIMIT", v)?;
        }
        if let Some(v) = lookup("WEB_RATE_LIMIT") {
            self.web_rate_limit = parsed("WEB_RATE_LIMIT", v)?;
        }
        if let Some(v) = lookup("USER_AGENT") {
            self.web.user_agent = v;
        }
        if let Some(v) = lookup("REQUEST_TIMEOUT") {
            self.web.request_timeout_secs = parsed("REQUEST_TIMEOUT", v)?;
        }
        if let Some(v) = lookup("SEARCH_PROVIDER") {
            self.web.search_provider = v.to_lowercase();
        }
        if let Some(v) = lookup("SEARCH_API_KEY") {
            self.web.search_api_key = Some(v);
        }
        if let Some(v) = lookup("CURRENT_DATE") {
            self.current_date = Some(v);
        }
        if let Some(v) = lookup("MAX_TOTAL_STEPS") {
            self.engine.max_total_steps = parsed("MAX_TOTAL_STEPS", v)?;
        }
        Ok(())
    }

    /// The date prompts treat as today
    pub fn current_date(&self) -> NaiveDate {
        self.current_date
            .as_deref()
            .and_then(|d| NaiveDate::parse_from_str(d, "%Y-%m-%d").ok())
            .unwrap_or_else(|| chrono::Local::now().date_naive())
    }

    pub fn provider_config(&self) -> AppResult<ProviderConfig> {
        let provider = self
            .llm
            .provider
            .parse::<ProviderType>()
            .map_err(AppError::config)?;
        // The Ollama default URL means nothing to other providers.
        let base_url = match provider {
            ProviderType::OpenAI if self.llm.base_url == LlmSettings::default().base_url => None,
            _ => Some(self.llm.base_url.clone()),
        };
        Ok(ProviderConfig {
            provider,
            api_key: self.llm.api_key.clone(),
            base_url,
            model: self.llm.model.clone(),
            max_tokens: self.llm.max_tokens,
            temperature: self.llm.temperature,
            timeout_secs: self.llm.timeout_secs,
        })
    }

    pub fn web_tool_config(&self) -> WebToolConfig {
        WebToolConfig {
            user_agent: self.web.user_agent.clone(),
            timeout_secs: self.web.request_timeout_secs,
            allowed_domains: self.web.allowed_domains.clone(),
            requests_per_minute: self.web_rate_limit,
            search_provider: self.web.search_provider.clone(),
            search_api_key: self.web.search_api_key.clone(),
            max_search_results: self.web.max_search_results,
        }
    }

    pub fn documents_dir(&self) -> PathBuf {
        documents_dir(&self.data_dir)
    }

    pub fn summaries_dir(&self) -> PathBuf {
        summaries_dir(&self.data_dir)
    }

    pub fn memory_db_path(&self) -> PathBuf {
        memory_db_path(&self.data_dir)
    }
}

// ============================================================================
// ConfigService
// ============================================================================

/// Configuration service for loading and saving agent settings
#[derive(Debug)]
pub struct ConfigService {
    config_path: PathBuf,
    config: AgentConfig,
}

impl ConfigService {
    /// Load configuration from `path` (or the default location), creating the
    /// file with defaults when it is missing, then apply `.env` and
    /// environment overrides.
    pub fn load(path: Option<&Path>) -> AppResult<Self> {
        if let Err(e) = dotenvy::dotenv() {
            if !e.not_found() {
                tracing::warn!(error = %e, "could not read .env file");
            }
        }
        Self::load_with(path, |key| std::env::var(key).ok())
    }

    /// Same as [`ConfigService::load`] with an explicit variable lookup.
    pub fn load_with<F>(path: Option<&Path>, lookup: F) -> AppResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let data_dir = match lookup("DATA_DIR") {
            Some(dir) => expand_home(&dir),
            None => default_data_dir()?,
        };
        let config_path = match path {
            Some(p) => p.to_path_buf(),
            None => config_path(&data_dir),
        };

        let mut config = if config_path.exists() {
            Self::load_from_file(&config_path)?
        } else {
            let default_config = AgentConfig {
                data_dir: data_dir.clone(),
                ..AgentConfig::default()
            };
            if let Some(parent) = config_path.parent() {
                ensure_dir(parent)?;
            }
            Self::save_to_file(&config_path, &default_config)?;
            tracing::info!(path = %config_path.display(), "created default configuration");
            default_config
        };

        config.apply_env_overrides(lookup)?;
        config.validate().map_err(AppError::validation)?;

        Ok(Self {
            config_path,
            config,
        })
    }

    /// Load configuration from a file
    fn load_from_file(path: &Path) -> AppResult<AgentConfig> {
        let content = fs::read_to_string(path)?;
        let config: AgentConfig = serde_json::from_str(&content)?;
        config.validate().map_err(AppError::validation)?;
        Ok(config)
    }

    /// Save configuration to a file with pretty formatting
    fn save_to_file(path: &Path, config: &AgentConfig) -> AppResult<()> {
        config.validate().map_err(AppError::validation)?;
        let content = serde_json::to_string_pretty(config)?;
        fs::write(path, content)?;
        Ok(())
    }

    pub fn get_config(&self) -> &AgentConfig {
        &self.config
    }

    pub fn config_path(&self) -> &Path {
        &self.config_path
    }

    /// Save the current configuration to disk
    pub fn save(&self) -> AppResult<()> {
        Self::save_to_file(&self.config_path, &self.config)
    }

    /// Create the data, documents and summaries directories
    pub fn ensure_data_dirs(&self) -> AppResult<()> {
        ensure_dir(&self.config.data_dir)?;
        ensure_dir(&self.config.documents_dir())?;
        ensure_dir(&self.config.summaries_dir())?;
        Ok(())
    }
}
