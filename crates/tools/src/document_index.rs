//! Local Document Index
//!
//! Keyword-scored passage index persisted as `index.json` in the document
//! directory. Writes go through a single write lock, so concurrent `index`
//! calls never interleave on disk.

use std::cmp::Ordering;
use std::collections::HashSet;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tokio::sync::RwLock;

use crate::chunker::CharChunker;
use crate::documents::{ChunkMetadata, DocumentChunk, DocumentEntry, DocumentSummary, DocumentTool};
use crate::error::{ToolError, ToolResult};
use crate::file_parsers;

const INDEX_FILE: &str = "index.json";

/// Characters shown in a document summary.
const SUMMARY_CHARS: usize = 1000;

const STOPWORDS: &[&str] = &[
    "the", "and", "for", "are", "was", "what", "how", "who", "why", "with", "from", "that", "this",
    "into", "about", "of", "in", "on", "to", "is", "a", "an", "or", "by", "at", "be",
];

#[derive(Debug, Default, Serialize, Deserialize)]
struct IndexState {
    entries: Vec<DocumentEntry>,
    chunks: Vec<StoredChunk>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct StoredChunk {
    document_id: String,
    chunk_index: usize,
    text: String,
}

/// Document tool over a local directory.
pub struct LocalDocumentIndex {
    root: PathBuf,
    chunker: CharChunker,
    state: RwLock<IndexState>,
}

impl LocalDocumentIndex {
    /// Open (or create) the index rooted at `root`.
    pub async fn open(root: impl Into<PathBuf>) -> ToolResult<Self> {
        let root = root.into();
        tokio::fs::create_dir_all(&root).await?;

        let state = match tokio::fs::read(root.join(INDEX_FILE)).await {
            Ok(bytes) => match serde_json::from_slice(&bytes) {
                Ok(state) => state,
                Err(e) => {
                    tracing::warn!(error = %e, "document index unreadable, starting empty");
                    IndexState::default()
                }
            },
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => IndexState::default(),
            Err(e) => return Err(e.into()),
        };

        tracing::debug!(root = %root.display(), documents = state.entries.len(), "document index opened");
        Ok(Self {
            root,
            chunker: CharChunker::default(),
            state: RwLock::new(state),
        })
    }

    pub fn with_chunker(mut self, chunker: CharChunker) -> Self {
        self.chunker = chunker;
        self
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    async fn persist(&self, state: &IndexState) -> ToolResult<()> {
        let bytes = serde_json::to_vec_pretty(state)?;
        let tmp = self.root.join(format!("{}.tmp", INDEX_FILE));
        tokio::fs::write(&tmp, bytes).await?;
        tokio::fs::rename(&tmp, self.root.join(INDEX_FILE)).await?;
        Ok(())
    }
}

fn sha256_hex(text: &str) -> String {
    format!("{:x}", Sha256::digest(text.as_bytes()))
}

fn query_terms(query: &str) -> Vec<String> {
    let mut seen = HashSet::new();
    query
        .split(|c: char| !c.is_alphanumeric())
        .map(str::to_lowercase)
        .filter(|t| t.chars().count() >= 2 && !STOPWORDS.contains(&t.as_str()))
        .filter(|t| seen.insert(t.clone()))
        .collect()
}

/// Share of query terms that occur in `text`.
fn score(terms: &[String], text: &str) -> f64 {
    let words: HashSet<String> = text
        .split(|c: char| !c.is_alphanumeric())
        .filter(|w| !w.is_empty())
        .map(str::to_lowercase)
        .collect();
    let matched = terms.iter().filter(|t| words.contains(t.as_str())).count();
    matched as f64 / terms.len() as f64
}

fn find_entry<'a>(state: &'a IndexState, key: &str) -> Option<&'a DocumentEntry> {
    let key = key.trim().trim_end_matches("...");
    if key.is_empty() {
        return None;
    }

    if let Some(entry) = state.entries.iter().find(|e| e.id == key) {
        return Some(entry);
    }

    let by_prefix: Vec<&DocumentEntry> = state
        .entries
        .iter()
        .filter(|e| e.id.starts_with(key))
        .collect();
    if by_prefix.len() == 1 {
        return by_prefix.first().copied();
    }

    let key_path = Path::new(key);
    let filename = key_path
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or(key);
    state
        .entries
        .iter()
        .find(|e| e.path == key_path)
        .or_else(|| {
            state
                .entries
                .iter()
                .find(|e| e.filename.eq_ignore_ascii_case(filename))
        })
}

#[async_trait]
impl DocumentTool for LocalDocumentIndex {
    async fn index(&self, path: &Path) -> ToolResult<Option<String>> {
        let path = match tokio::fs::canonicalize(path).await {
            Ok(p) if p.is_file() => p,
            _ => {
                tracing::warn!(path = %path.display(), "document not found");
                return Ok(None);
            }
        };

        let extract_path = path.clone();
        let extracted = tokio::task::spawn_blocking(move || file_parsers::extract_text(&extract_path))
            .await
            .map_err(|e| ToolError::parse(format!("extraction task failed: {}", e)))?;
        let (doc_type, text) = match extracted {
            Ok(found) => found,
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "could not extract document text");
                return Ok(None);
            }
        };
        if text.trim().is_empty() {
            tracing::warn!(path = %path.display(), "document has no text");
            return Ok(None);
        }

        let id = sha256_hex(&text);
        let size_bytes = tokio::fs::metadata(&path).await.map(|m| m.len()).unwrap_or(0);

        let mut state = self.state.write().await;
        if state.entries.iter().any(|e| e.id == id && e.path == path) {
            return Ok(Some(id));
        }

        // Drop stale versions of the same file before adding the new one.
        let stale: HashSet<String> = state
            .entries
            .iter()
            .filter(|e| e.path == path || e.id == id)
            .map(|e| e.id.clone())
            .collect();
        state.entries.retain(|e| !stale.contains(&e.id));
        state.chunks.retain(|c| !stale.contains(&c.document_id));

        let chunks = self.chunker.chunk(&text);
        let filename = path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_default();

        state.chunks.extend(chunks.iter().enumerate().map(|(i, chunk)| StoredChunk {
            document_id: id.clone(),
            chunk_index: i,
            text: chunk.clone(),
        }));
        state.entries.push(DocumentEntry {
            id: id.clone(),
            filename: filename.clone(),
            path,
            doc_type,
            created_at: chrono::Utc::now(),
            size_bytes,
            char_count: text.chars().count(),
            chunk_count: chunks.len(),
        });

        self.persist(&state).await?;
        tracing::info!(filename = %filename, id = %id, chunks = chunks.len(), "document indexed");
        Ok(Some(id))
    }

    async fn search(&self, query: &str, k: usize) -> ToolResult<Vec<DocumentChunk>> {
        let terms = query_terms(query);
        if terms.is_empty() || k == 0 {
            return Ok(Vec::new());
        }

        let state = self.state.read().await;
        let mut scored: Vec<(f64, usize)> = state
            .chunks
            .iter()
            .enumerate()
            .filter_map(|(i, chunk)| {
                let s = score(&terms, &chunk.text);
                (s > 0.0).then_some((s, i))
            })
            .collect();
        scored.sort_by(|a, b| {
            b.0.partial_cmp(&a.0)
                .unwrap_or(Ordering::Equal)
                .then(a.1.cmp(&b.1))
        });

        Ok(scored
            .into_iter()
            .take(k)
            .map(|(similarity, i)| {
                let chunk = &state.chunks[i];
                let source = state
                    .entries
                    .iter()
                    .find(|e| e.id == chunk.document_id)
                    .map(|e| e.filename.clone())
                    .unwrap_or_default();
                DocumentChunk {
                    text: chunk.text.clone(),
                    metadata: ChunkMetadata {
                        source,
                        similarity,
                        document_id: chunk.document_id.clone(),
                        chunk_index: chunk.chunk_index,
                    },
                }
            })
            .collect())
    }

    async fn get_summary(&self, id_or_path: &str) -> ToolResult<Option<DocumentSummary>> {
        let state = self.state.read().await;
        let Some(entry) = find_entry(&state, id_or_path) else {
            tracing::warn!(key = id_or_path, "document not in index");
            return Ok(None);
        };

        let first = state
            .chunks
            .iter()
            .find(|c| c.document_id == entry.id && c.chunk_index == 0)
            .map(|c| c.text.as_str())
            .unwrap_or("");
        let mut content: String = first.chars().take(SUMMARY_CHARS).collect();
        if entry.char_count > SUMMARY_CHARS {
            content.push_str("...");
        }

        Ok(Some(DocumentSummary {
            content,
            metadata: entry.clone(),
        }))
    }

    async fn locate(&self, filename: &str) -> ToolResult<Option<PathBuf>> {
        let state = self.state.read().await;
        Ok(state
            .entries
            .iter()
            .find(|e| e.filename.eq_ignore_ascii_case(filename))
            .map(|e| e.path.clone()))
    }

    async fn list(&self) -> ToolResult<Vec<DocumentEntry>> {
        Ok(self.state.read().await.entries.clone())
    }
}
