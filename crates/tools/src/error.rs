//! Tool Error Types

use thiserror::Error;

/// Errors raised by web and document tools.
///
/// A tool error fails only the step that triggered it.
#[derive(Error, Debug)]
pub enum ToolError {
    /// Transport failure talking to a remote host
    #[error("Network error: {0}")]
    Network(String),

    /// Malformed URL
    #[error("Invalid URL: {0}")]
    InvalidUrl(String),

    /// Malformed CSS selector
    #[error("Invalid selector: {0}")]
    InvalidSelector(String),

    /// Response body over the download cap
    #[error("Content too large: {0} bytes")]
    TooLarge(u64),

    /// Search provider failure
    #[error("Search error: {0}")]
    Search(String),

    /// File type the document index cannot read
    #[error("Unsupported document type: {0}")]
    UnsupportedFormat(String),

    /// Document content could not be extracted
    #[error("Parse error: {0}")]
    Parse(String),

    /// Missing file or document
    #[error("Not found: {0}")]
    NotFound(String),

    /// File I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization errors
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Result type alias for tool operations
pub type ToolResult<T> = Result<T, ToolError>;

impl ToolError {
    pub fn network(msg: impl Into<String>) -> Self {
        Self::Network(msg.into())
    }

    pub fn parse(msg: impl Into<String>) -> Self {
        Self::Parse(msg.into())
    }

    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::NotFound(msg.into())
    }
}

impl From<reqwest::Error> for ToolError {
    fn from(err: reqwest::Error) -> Self {
        Self::Network(err.to_string())
    }
}
