//! HTTP Web Tool
//!
//! Fetches pages over HTTP with caching, a domain allowlist, private-address
//! blocking, and a per-minute request ceiling.

use std::net::IpAddr;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use mini_moka::sync::Cache;
use scraper::Html;
use url::Url;

use research_agent_core::RateLimiter;

use crate::error::{ToolError, ToolResult};
use crate::html;
use crate::web::{Link, PageAnalysis, PageMetadata, SearchHit, WebPage, WebTool};
use crate::web_search::{create_search_provider, sanitize_query, SearchProvider};

/// Maximum download size (5MB)
const MAX_DOWNLOAD_SIZE: usize = 5 * 1024 * 1024;

/// Cache TTL (15 minutes)
const CACHE_TTL_SECS: u64 = 15 * 60;

/// Maximum cache entries
const MAX_CACHE_ENTRIES: u64 = 100;

/// Reference, news, academic, and developer sites the agent may read.
pub const DEFAULT_ALLOWED_DOMAINS: &[&str] = &[
    "wikipedia.org",
    "arxiv.org",
    "scholar.google.com",
    "researchgate.net",
    "semanticscholar.org",
    "sciencedirect.com",
    "ncbi.nlm.nih.gov",
    "news.google.com",
    "reuters.com",
    "apnews.com",
    "bbc.com",
    "nytimes.com",
    "washingtonpost.com",
    "theguardian.com",
    "aljazeera.com",
    "bloomberg.com",
    "github.com",
    "stackoverflow.com",
    "medium.com",
    "dev.to",
    "ieee.org",
    "acm.org",
    "reddit.com",
    "ycombinator.com",
    "nih.gov",
    "cdc.gov",
    "who.int",
    "un.org",
    "worldbank.org",
    "europa.eu",
    "nasa.gov",
    "space.com",
    "spacenews.com",
    "arstechnica.com",
    "techcrunch.com",
    "theverge.com",
    "wired.com",
];

/// Settings for [`HttpWebTool`].
#[derive(Debug, Clone)]
pub struct WebToolConfig {
    pub user_agent: String,
    pub timeout_secs: u64,
    /// Empty means every public host is allowed.
    pub allowed_domains: Vec<String>,
    pub requests_per_minute: u32,
    pub search_provider: String,
    pub search_api_key: Option<String>,
    pub max_search_results: u32,
}

impl Default for WebToolConfig {
    fn default() -> Self {
        Self {
            user_agent: concat!("research-agent/", env!("CARGO_PKG_VERSION")).to_string(),
            timeout_secs: 30,
            allowed_domains: DEFAULT_ALLOWED_DOMAINS.iter().map(|d| d.to_string()).collect(),
            requests_per_minute: 10,
            search_provider: "duckduckgo".to_string(),
            search_api_key: None,
            max_search_results: 5,
        }
    }
}

// ============================================================================
// Domain policy
// ============================================================================

/// Decides which URLs may be fetched.
#[derive(Debug, Clone)]
pub struct DomainPolicy {
    allowed: Vec<String>,
}

impl DomainPolicy {
    pub fn new(domains: &[String]) -> Self {
        let allowed = domains
            .iter()
            .map(|d| d.trim().trim_start_matches('.').to_ascii_lowercase())
            .filter(|d| !d.is_empty())
            .collect();
        Self { allowed }
    }

    /// Exact match or any parent domain in the allowlist.
    pub fn allows_host(&self, host: &str) -> bool {
        if self.allowed.is_empty() {
            return true;
        }
        let host = host.to_ascii_lowercase();
        self.allowed
            .iter()
            .any(|d| host == *d || host.ends_with(&format!(".{}", d)))
    }

    /// Parse an http(s) URL.
    pub fn parse(&self, raw: &str) -> ToolResult<Url> {
        let url = Url::parse(raw.trim()).map_err(|e| ToolError::InvalidUrl(format!("{}: {}", raw, e)))?;
        if !matches!(url.scheme(), "http" | "https") {
            return Err(ToolError::InvalidUrl(format!("unsupported scheme in {}", raw)));
        }
        Ok(url)
    }

    /// Why `url` may not be fetched, if it may not.
    pub fn blocked_reason(&self, url: &Url) -> Option<String> {
        let Some(host) = url.host_str() else {
            return Some("URL has no host".to_string());
        };
        if is_private_host(host) {
            return Some(format!("private/local address '{}'", host));
        }
        if !self.allows_host(host) {
            return Some(format!("domain not allowed: {}", host));
        }
        None
    }
}

/// Check if a hostname is a private/local address
fn is_private_host(host: &str) -> bool {
    let lower = host.trim_matches(|c| c == '[' || c == ']').to_lowercase();
    if lower == "localhost" || lower.ends_with(".local") || lower.ends_with(".internal") {
        return true;
    }

    if let Ok(ip) = lower.parse::<IpAddr>() {
        return match ip {
            IpAddr::V4(ipv4) => {
                ipv4.is_loopback()
                    || ipv4.is_private()
                    || ipv4.is_link_local()
                    || ipv4.is_unspecified()
                    || ipv4.is_broadcast()
            }
            IpAddr::V6(ipv6) => ipv6.is_loopback() || ipv6.is_unspecified(),
        };
    }

    false
}

// ============================================================================
// HttpWebTool
// ============================================================================

/// Web tool backed by reqwest and scraper.
pub struct HttpWebTool {
    client: reqwest::Client,
    cache: Cache<String, WebPage>,
    policy: DomainPolicy,
    limiter: Arc<RateLimiter>,
    search: Box<dyn SearchProvider>,
    max_search_results: u32,
}

impl HttpWebTool {
    pub fn new(config: WebToolConfig) -> ToolResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs.max(1)))
            .user_agent(config.user_agent.clone())
            .redirect(reqwest::redirect::Policy::limited(5))
            .build()?;

        let search = create_search_provider(
            &config.search_provider,
            config.search_api_key.as_deref(),
            client.clone(),
        )?;

        let cache = Cache::builder()
            .max_capacity(MAX_CACHE_ENTRIES)
            .time_to_live(Duration::from_secs(CACHE_TTL_SECS))
            .build();

        Ok(Self {
            client,
            cache,
            policy: DomainPolicy::new(&config.allowed_domains),
            limiter: Arc::new(RateLimiter::per_minute("web", config.requests_per_minute)),
            search,
            max_search_results: config.max_search_results,
        })
    }

    pub fn policy(&self) -> &DomainPolicy {
        &self.policy
    }

    async fn download(&self, url: &Url) -> ToolResult<Option<WebPage>> {
        self.limiter.acquire().await;

        let response = self.client.get(url.as_str()).send().await?;
        let status = response.status();
        if !status.is_success() {
            tracing::warn!(url = %url, status = status.as_u16(), "fetch returned non-success status");
            return Ok(None);
        }

        if let Some(length) = response.content_length() {
            if length > MAX_DOWNLOAD_SIZE as u64 {
                return Err(ToolError::TooLarge(length));
            }
        }

        let content_type = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or("")
            .to_lowercase();

        let bytes = response.bytes().await?;
        if bytes.len() > MAX_DOWNLOAD_SIZE {
            return Err(ToolError::TooLarge(bytes.len() as u64));
        }
        let body = String::from_utf8_lossy(&bytes).to_string();

        Ok(Some(build_page(url, status.as_u16(), content_type, body)))
    }
}

/// Assemble a page from a successful response body.
fn build_page(url: &Url, status_code: u16, content_type: String, body: String) -> WebPage {
    let is_html = content_type.is_empty()
        || content_type.contains("text/html")
        || content_type.contains("application/xhtml");
    let (title, content) = if is_html {
        let doc = Html::parse_document(&body);
        (html::page_title(&doc), html::visible_text(&doc))
    } else if content_type.starts_with("text/") || content_type.contains("json") || content_type.contains("xml") {
        (String::new(), body.clone())
    } else {
        (String::new(), String::new())
    };

    WebPage {
        url: url.to_string(),
        title,
        content,
        metadata: PageMetadata {
            status_code,
            content_type,
            content_length: body.len(),
        },
        html: body,
        timestamp: chrono::Utc::now().to_rfc3339(),
    }
}

#[async_trait]
impl WebTool for HttpWebTool {
    async fn search(&self, query: &str) -> ToolResult<Vec<SearchHit>> {
        let query = sanitize_query(query);
        if query.is_empty() {
            return Err(ToolError::Search("Search query cannot be empty".to_string()));
        }
        self.limiter.acquire().await;
        tracing::info!(provider = self.search.name(), query = %query, "searching the web");
        let hits = self.search.search(&query, self.max_search_results).await?;
        Ok(hits
            .into_iter()
            .filter(|hit| !hit.url.is_empty())
            .take(self.max_search_results as usize)
            .collect())
    }

    async fn fetch(&self, url: &str) -> ToolResult<Option<WebPage>> {
        let parsed = self.policy.parse(url)?;
        if let Some(reason) = self.policy.blocked_reason(&parsed) {
            tracing::warn!(url, reason = %reason, "fetch blocked");
            return Ok(None);
        }

        let key = parsed.to_string();
        if let Some(cached) = self.cache.get(&key) {
            tracing::debug!(url, "page served from cache");
            return Ok(Some(cached));
        }

        tracing::info!(url, "fetching page");
        let page = self.download(&parsed).await?;
        if let Some(page) = &page {
            self.cache.insert(key, page.clone());
        }
        Ok(page)
    }

    async fn extract_links(&self, url: &str) -> ToolResult<Vec<Link>> {
        let Some(page) = self.fetch(url).await? else {
            return Ok(Vec::new());
        };
        let base = self.policy.parse(&page.url)?;
        let doc = Html::parse_document(&page.html);
        Ok(html::links(&doc, &base))
    }

    async fn extract_selector(&self, url: &str, selector: &str) -> ToolResult<String> {
        let Some(page) = self.fetch(url).await? else {
            return Ok(String::new());
        };
        let doc = Html::parse_document(&page.html);
        html::select_text(&doc, selector)
    }

    async fn analyze(&self, url: &str) -> ToolResult<PageAnalysis> {
        let Some(page) = self.fetch(url).await? else {
            return Ok(PageAnalysis::failed(url));
        };
        let doc = Html::parse_document(&page.html);
        let main_content = html::main_content(&doc);
        let extracted_dates = html::extract_dates(&page.content);
        Ok(PageAnalysis {
            success: true,
            url: page.url.clone(),
            title: page.title.clone(),
            structure: html::structure(&doc),
            main_content,
            extracted_dates,
        })
    }
}
