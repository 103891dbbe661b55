//! Research Agent Tools
//!
//! External collaborators the research engine dispatches plan steps to:
//!
//! - `web` / `web_fetch` / `web_search` / `html` - web retrieval over HTTP
//! - `documents` / `document_index` / `file_parsers` / `chunker` - local
//!   document collection

pub mod chunker;
pub mod document_index;
pub mod documents;
pub mod error;
pub mod file_parsers;
pub mod html;
pub mod web;
pub mod web_fetch;
pub mod web_search;

// ── Errors ─────────────────────────────────────────────────────────────
pub use error::{ToolError, ToolResult};

// ── Web ────────────────────────────────────────────────────────────────
pub use web::{Heading, Link, PageAnalysis, PageMetadata, PageStructure, SearchHit, WebPage, WebTool};
pub use web_fetch::{DomainPolicy, HttpWebTool, WebToolConfig, DEFAULT_ALLOWED_DOMAINS};
pub use web_search::{create_search_provider, SearchProvider};

// ── Documents ──────────────────────────────────────────────────────────
pub use chunker::CharChunker;
pub use document_index::LocalDocumentIndex;
pub use documents::{ChunkMetadata, DocumentChunk, DocumentEntry, DocumentSummary, DocumentTool};
pub use file_parsers::DocType;
