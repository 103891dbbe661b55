//! Context/Memory Bridge
//!
//! Projects execution results into the memory store from a background task,
//! so the execution loop never waits on, or fails because of, a memory write.

use std::sync::Arc;

use serde_json::{json, Map, Value};
use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinHandle;

use crate::storage::{MemoryKind, MemoryStore};

/// Confidence recorded for document hits that carry no similarity score.
pub const DEFAULT_CONFIDENCE: f64 = 0.5;

enum BridgeMessage {
    Write(MemoryKind, Map<String, Value>),
    Shutdown,
}

/// Counts reported when the bridge closes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BridgeStats {
    pub written: usize,
    pub failed: usize,
}

/// Handle for queueing memory writes. Clones share the same writer task.
#[derive(Clone)]
pub struct MemoryBridge {
    tx: mpsc::UnboundedSender<BridgeMessage>,
    session_id: Arc<str>,
    worker: Arc<Mutex<Option<JoinHandle<BridgeStats>>>>,
}

impl MemoryBridge {
    /// Start the writer task. Must be called inside a tokio runtime.
    pub fn spawn(store: MemoryStore, session_id: impl Into<String>) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        let worker = tokio::spawn(run_writer(store, rx));
        Self {
            tx,
            session_id: Arc::from(session_id.into()),
            worker: Arc::new(Mutex::new(Some(worker))),
        }
    }

    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    fn send(&self, kind: MemoryKind, record: Map<String, Value>) {
        if self.tx.send(BridgeMessage::Write(kind, record)).is_err() {
            tracing::debug!(kind = %kind, "memory bridge closed, dropping write");
        }
    }

    /// Store a fetched page as a document.
    pub fn project_page(&self, page: &Value) {
        let content = page.get("content").and_then(Value::as_str).unwrap_or("");
        if content.trim().is_empty() {
            return;
        }
        let url = page.get("url").and_then(Value::as_str).unwrap_or("");
        let title = page
            .get("title")
            .and_then(Value::as_str)
            .filter(|t| !t.trim().is_empty())
            .unwrap_or(if url.is_empty() { "Untitled" } else { url });

        let mut record = Map::new();
        record.insert("title".into(), json!(title));
        record.insert("content".into(), json!(content));
        record.insert("url".into(), json!(url));
        record.insert(
            "metadata".into(),
            json!({
                "session_id": &*self.session_id,
                "fetched_at": page.get("timestamp").cloned().unwrap_or(Value::Null),
            }),
        );
        self.send(MemoryKind::Document, record);
    }

    /// Store each document-search hit as a fact, scored by its similarity.
    pub fn project_document_hits(&self, hits: &Value) {
        let Some(items) = hits.as_array() else {
            return;
        };
        for item in items {
            let Some(text) = item.get("text").and_then(Value::as_str) else {
                continue;
            };
            let metadata = item.get("metadata");
            let source = metadata
                .and_then(|m| m.get("source"))
                .and_then(Value::as_str)
                .filter(|s| !s.is_empty())
                .unwrap_or("unknown");
            let confidence = metadata
                .and_then(|m| m.get("similarity"))
                .and_then(Value::as_f64)
                .unwrap_or(DEFAULT_CONFIDENCE);

            let mut record = Map::new();
            record.insert("fact".into(), json!(text));
            record.insert("source".into(), json!(source));
            record.insert("confidence".into(), json!(confidence));
            record.insert(
                "metadata".into(),
                json!({ "session_id": &*self.session_id }),
            );
            self.send(MemoryKind::Fact, record);
        }
    }

    /// Append a conversation turn for this session.
    pub fn project_conversation(&self, role: &str, content: &str) {
        if content.trim().is_empty() {
            return;
        }
        let mut record = Map::new();
        record.insert("session_id".into(), json!(&*self.session_id));
        record.insert("role".into(), json!(role));
        record.insert("content".into(), json!(content));
        self.send(MemoryKind::Conversation, record);
    }

    /// Flush queued writes and stop the writer. Later calls return zeroes.
    pub async fn close(&self) -> BridgeStats {
        let Some(worker) = self.worker.lock().await.take() else {
            return BridgeStats::default();
        };
        let _ = self.tx.send(BridgeMessage::Shutdown);
        match worker.await {
            Ok(stats) => {
                tracing::debug!(written = stats.written, failed = stats.failed, "memory bridge closed");
                stats
            }
            Err(e) => {
                tracing::error!(error = %e, "memory writer task failed");
                BridgeStats::default()
            }
        }
    }
}

async fn run_writer(store: MemoryStore, mut rx: mpsc::UnboundedReceiver<BridgeMessage>) -> BridgeStats {
    let mut stats = BridgeStats::default();
    while let Some(message) = rx.recv().await {
        match message {
            BridgeMessage::Write(kind, record) => {
                let writer = store.clone();
                let written = tokio::task::spawn_blocking(move || writer.write(kind, &record)).await;
                match written {
                    Ok(Ok(_)) => stats.written += 1,
                    Ok(Err(e)) => {
                        stats.failed += 1;
                        tracing::warn!(kind = %kind, error = %e, "memory write failed");
                    }
                    Err(e) => {
                        stats.failed += 1;
                        tracing::warn!(kind = %kind, error = %e, "memory write task failed");
                    }
                }
            }
            BridgeMessage::Shutdown => break,
        }
    }
    stats
}
