//! Web Search Providers
//!
//! Pluggable search backends: Tavily, Brave Search, and DuckDuckGo.

use async_trait::async_trait;
use serde_json::Value;

use crate::error::{ToolError, ToolResult};
use crate::web::SearchHit;

/// Trait for pluggable search providers
#[async_trait]
pub trait SearchProvider: Send + Sync {
    /// Provider name for display
    fn name(&self) -> &str;

    /// Execute a search query
    async fn search(&self, query: &str, max_results: u32) -> ToolResult<Vec<SearchHit>>;
}

fn str_field(item: &Value, key: &str) -> String {
    item.get(key)
        .and_then(Value::as_str)
        .unwrap_or("")
        .to_string()
}

async fn read_json(response: reqwest::Response, provider: &str) -> ToolResult<Value> {
    let status = response.status();
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        return Err(ToolError::Search(format!(
            "{} API error ({}): {}",
            provider,
            status.as_u16(),
            body
        )));
    }
    response
        .json()
        .await
        .map_err(|e| ToolError::Search(format!("Failed to parse {} response: {}", provider, e)))
}

/// Tavily search provider (requires API key)
struct TavilyProvider {
    client: reqwest::Client,
    api_key: String,
}

#[async_trait]
impl SearchProvider for TavilyProvider {
    fn name(&self) -> &str {
        "Tavily"
    }

    async fn search(&self, query: &str, max_results: u32) -> ToolResult<Vec<SearchHit>> {
        let body = serde_json::json!({
            "api_key": self.api_key,
            "query": query,
            "max_results": max_results,
            "include_answer": false,
        });

        let response = self
            .client
            .post("https://api.tavily.com/search")
            .json(&body)
            .send()
            .await
            .map_err(|e| ToolError::network(format!("Tavily request failed: {}", e)))?;
        let data = read_json(response, "Tavily").await?;

        Ok(data
            .get("results")
            .and_then(Value::as_array)
            .map(|arr| {
                arr.iter()
                    .map(|item| SearchHit {
                        title: str_field(item, "title"),
                        url: str_field(item, "url"),
                        snippet: str_field(item, "content"),
                    })
                    .collect()
            })
            .unwrap_or_default())
    }
}

/// Brave Search provider (requires API key)
struct BraveSearchProvider {
    client: reqwest::Client,
    api_key: String,
}

#[async_trait]
impl SearchProvider for BraveSearchProvider {
    fn name(&self) -> &str {
        "Brave Search"
    }

    async fn search(&self, query: &str, max_results: u32) -> ToolResult<Vec<SearchHit>> {
        let response = self
            .client
            .get("https://api.search.brave.com/res/v1/web/search")
            .header("X-Subscription-Token", &self.api_key)
            .header("Accept", "application/json")
            .query(&[("q", query), ("count", &max_results.to_string())])
            .send()
            .await
            .map_err(|e| ToolError::network(format!("Brave Search request failed: {}", e)))?;
        let data = read_json(response, "Brave Search").await?;

        Ok(data
            .get("web")
            .and_then(|w| w.get("results"))
            .and_then(Value::as_array)
            .map(|arr| {
                arr.iter()
                    .map(|item| SearchHit {
                        title: str_field(item, "title"),
                        url: str_field(item, "url"),
                        snippet: str_field(item, "description"),
                    })
                    .collect()
            })
            .unwrap_or_default())
    }
}

/// DuckDuckGo instant answer provider (no API key required, limited results)
struct DuckDuckGoProvider {
    client: reqwest::Client,
}

#[async_trait]
impl SearchProvider for DuckDuckGoProvider {
    fn name(&self) -> &str {
        "DuckDuckGo"
    }

    async fn search(&self, query: &str, max_results: u32) -> ToolResult<Vec<SearchHit>> {
        let response = self
            .client
            .get("https://api.duckduckgo.com/")
            .query(&[("q", query), ("format", "json"), ("no_html", "1")])
            .send()
            .await
            .map_err(|e| ToolError::network(format!("DuckDuckGo request failed: {}", e)))?;
        let data = read_json(response, "DuckDuckGo").await?;
        Ok(parse_duckduckgo(&data, max_results as usize))
    }
}

/// Abstract first, then related topics that carry a URL.
fn parse_duckduckgo(data: &Value, max_results: usize) -> Vec<SearchHit> {
    let mut hits = Vec::new();

    let abstract_text = str_field(data, "AbstractText");
    let abstract_url = str_field(data, "AbstractURL");
    if !abstract_text.is_empty() && !abstract_url.is_empty() {
        let heading = str_field(data, "Heading");
        hits.push(SearchHit {
            title: if heading.is_empty() { "Result".to_string() } else { heading },
            url: abstract_url,
            snippet: abstract_text,
        });
    }

    if let Some(topics) = data.get("RelatedTopics").and_then(Value::as_array) {
        for topic in topics {
            if hits.len() >= max_results {
                break;
            }
            let text = str_field(topic, "Text");
            let url = str_field(topic, "FirstURL");
            if text.is_empty() || url.is_empty() {
                continue;
            }
            hits.push(SearchHit {
                title: text.chars().take(80).collect(),
                url,
                snippet: text,
            });
        }
    }

    hits.truncate(max_results);
    hits
}

/// Create the search provider named `provider_name`.
///
/// - `"tavily"` requires an API key
/// - `"brave"` requires an API key
/// - `"duckduckgo"` works without an API key (limited results)
pub fn create_search_provider(
    provider_name: &str,
    api_key: Option<&str>,
    client: reqwest::Client,
) -> ToolResult<Box<dyn SearchProvider>> {
    let key = || {
        api_key
            .filter(|k| !k.is_empty())
            .map(str::to_string)
            .ok_or_else(|| ToolError::Search(format!("{} requires an API key", provider_name)))
    };

    let provider: Box<dyn SearchProvider> = match provider_name.to_lowercase().as_str() {
        "tavily" => Box::new(TavilyProvider {
            client,
            api_key: key()?,
        }),
        "brave" | "brave_search" => Box::new(BraveSearchProvider {
            client,
            api_key: key()?,
        }),
        "duckduckgo" | "" => Box::new(DuckDuckGoProvider { client }),
        other => {
            return Err(ToolError::Search(format!(
                "Unknown search provider: '{}'. Supported: tavily, brave, duckduckgo",
                other
            )))
        }
    };
    Ok(provider)
}

/// Strip control characters from a query.
pub fn sanitize_query(query: &str) -> String {
    query
        .chars()
        .filter(|c| !c.is_control() || *c == ' ')
        .collect::<String>()
        .trim()
        .to_string()
}
