//! Document Tool Interface

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::ToolResult;
use crate::file_parsers::DocType;

/// Where a search hit came from and how well it matched.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChunkMetadata {
    /// File name of the source document
    pub source: String,
    /// Match score in `0.0..=1.0`
    pub similarity: f64,
    pub document_id: String,
    pub chunk_index: usize,
}

/// A passage returned by document search
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DocumentChunk {
    pub text: String,
    pub metadata: ChunkMetadata,
}

/// An indexed document
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DocumentEntry {
    /// SHA-256 of the extracted text
    pub id: String,
    pub filename: String,
    pub path: PathBuf,
    pub doc_type: DocType,
    pub created_at: DateTime<Utc>,
    pub size_bytes: u64,
    pub char_count: usize,
    pub chunk_count: usize,
}

/// Leading excerpt of a document plus its index entry
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DocumentSummary {
    pub content: String,
    pub metadata: DocumentEntry,
}

/// Local document collection operations.
#[async_trait]
pub trait DocumentTool: Send + Sync {
    /// Index a file. `None` when the file is missing, unsupported, or empty.
    async fn index(&self, path: &Path) -> ToolResult<Option<String>>;

    /// Best-matching passages for `query`, at most `k`.
    async fn search(&self, query: &str, k: usize) -> ToolResult<Vec<DocumentChunk>>;

    /// Summary by full id, unique id prefix, file name, or path.
    async fn get_summary(&self, id_or_path: &str) -> ToolResult<Option<DocumentSummary>>;

    /// Path of an indexed document with this file name.
    async fn locate(&self, filename: &str) -> ToolResult<Option<PathBuf>>;

    async fn list(&self) -> ToolResult<Vec<DocumentEntry>>;
}
