//! Web Tool Interface
//!
//! Types exchanged with the web retrieval tool and the trait the research
//! engine dispatches to.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::ToolResult;

/// A search result entry
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchHit {
    pub title: String,
    pub url: String,
    pub snippet: String,
}

/// HTTP details recorded with a fetched page
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PageMetadata {
    pub status_code: u16,
    pub content_type: String,
    pub content_length: usize,
}

/// A fetched web page
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WebPage {
    pub url: String,
    pub title: String,
    /// Visible text with markup removed
    pub content: String,
    pub html: String,
    /// RFC 3339 fetch time
    pub timestamp: String,
    pub metadata: PageMetadata,
}

/// A hyperlink found on a page
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Link {
    pub url: String,
    pub text: String,
}

/// Structural outline of a page
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PageStructure {
    pub headings: Vec<Heading>,
    pub lists: Vec<Vec<String>>,
    pub tables: Vec<Vec<Vec<String>>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Heading {
    pub level: u8,
    pub text: String,
}

/// Result of analyzing a page
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PageAnalysis {
    pub success: bool,
    pub url: String,
    pub title: String,
    pub main_content: String,
    pub structure: PageStructure,
    pub extracted_dates: Vec<String>,
}

impl PageAnalysis {
    /// Analysis of a page that could not be retrieved.
    pub fn failed(url: &str) -> Self {
        Self {
            success: false,
            url: url.to_string(),
            title: String::new(),
            main_content: String::new(),
            structure: PageStructure::default(),
            extracted_dates: Vec::new(),
        }
    }
}

/// Web retrieval operations.
///
/// `Err` means the call itself broke (transport failure, bad input).
/// Pages that are blocked by policy or answer with a non-success status
/// are `Ok(None)` from `fetch` and empty results from the other calls.
#[async_trait]
pub trait WebTool: Send + Sync {
    async fn search(&self, query: &str) -> ToolResult<Vec<SearchHit>>;

    async fn fetch(&self, url: &str) -> ToolResult<Option<WebPage>>;

    async fn extract_links(&self, url: &str) -> ToolResult<Vec<Link>>;

    async fn extract_selector(&self, url: &str, selector: &str) -> ToolResult<String>;

    async fn analyze(&self, url: &str) -> ToolResult<PageAnalysis>;
}
