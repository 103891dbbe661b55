//! Memory Store
//!
//! Append/query log of conversations, facts and documents kept in SQLite
//! using rusqlite with r2d2 connection pooling.

use std::path::Path;

use r2d2::Pool;
use r2d2_sqlite::SqliteConnectionManager;
use rusqlite::types::Value as SqlValue;
use rusqlite::{params, params_from_iter};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::utils::error::{AppError, AppResult};

/// Type alias for the connection pool
pub type DbPool = Pool<SqliteConnectionManager>;

/// The three memory logs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MemoryKind {
    Conversation,
    Fact,
    Document,
}

impl MemoryKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            MemoryKind::Conversation => "conversation",
            MemoryKind::Fact => "fact",
            MemoryKind::Document => "document",
        }
    }

    fn table(&self) -> &'static str {
        match self {
            MemoryKind::Conversation => "conversations",
            MemoryKind::Fact => "facts",
            MemoryKind::Document => "documents",
        }
    }

    /// Fields a record must carry as non-empty strings
    pub fn required_fields(&self) -> &'static [&'static str] {
        match self {
            MemoryKind::Conversation => &["session_id", "role", "content"],
            MemoryKind::Fact => &["fact", "source"],
            MemoryKind::Document => &["title", "content"],
        }
    }

    /// Stored columns other than `id` and `timestamp`, in table order
    fn columns(&self) -> &'static [&'static str] {
        match self {
            MemoryKind::Conversation => &["session_id", "role", "content", "metadata"],
            MemoryKind::Fact => &["fact", "source", "confidence", "metadata"],
            MemoryKind::Document => &["title", "content", "url", "metadata"],
        }
    }

    /// Columns matched by `search`
    fn searchable(&self) -> &'static [&'static str] {
        match self {
            MemoryKind::Conversation => &["content"],
            MemoryKind::Fact => &["fact", "source"],
            MemoryKind::Document => &["title", "content"],
        }
    }
}

impl std::fmt::Display for MemoryKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A stored memory entry
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MemoryRecord {
    pub id: i64,
    pub kind: MemoryKind,
    pub fields: Map<String, Value>,
    pub timestamp: String,
}

impl MemoryRecord {
    pub fn field_str(&self, key: &str) -> Option<&str> {
        self.fields.get(key).and_then(Value::as_str)
    }
}

/// SQLite-backed memory log
#[derive(Clone)]
pub struct MemoryStore {
    pool: DbPool,
}

impl MemoryStore {
    /// Open (or create) the store at `path`
    pub fn open(path: &Path) -> AppResult<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let manager = SqliteConnectionManager::file(path);
        let pool = Pool::builder()
            .max_size(4)
            .build(manager)
            .map_err(|e| AppError::database(format!("Failed to create connection pool: {}", e)))?;

        let store = Self { pool };
        store.init_schema()?;
        Ok(store)
    }

    /// Create an in-memory store for testing.
    pub fn new_in_memory() -> AppResult<Self> {
        let manager = SqliteConnectionManager::memory();
        let pool = Pool::builder()
            .max_size(1)
            .build(manager)
            .map_err(|e| AppError::database(format!("Failed to create connection pool: {}", e)))?;

        let store = Self { pool };
        store.init_schema()?;
        Ok(store)
    }

    fn init_schema(&self) -> AppResult<()> {
        let conn = self.get_connection()?;

        conn.execute(
            "CREATE TABLE IF NOT EXISTS conversations (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                session_id TEXT NOT NULL,
                role TEXT NOT NULL,
                content TEXT NOT NULL,
                metadata TEXT,
                timestamp TEXT DEFAULT CURRENT_TIMESTAMP
            )",
            [],
        )?;
        conn.execute(
            "CREATE INDEX IF NOT EXISTS idx_conversations_session ON conversations(session_id)",
            [],
        )?;

        conn.execute(
            "CREATE TABLE IF NOT EXISTS facts (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                fact TEXT NOT NULL,
                source TEXT NOT NULL,
                confidence REAL,
                metadata TEXT,
                timestamp TEXT DEFAULT CURRENT_TIMESTAMP
            )",
            [],
        )?;

        conn.execute(
            "CREATE TABLE IF NOT EXISTS documents (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                title TEXT NOT NULL,
                content TEXT NOT NULL,
                url TEXT,
                metadata TEXT,
                timestamp TEXT DEFAULT CURRENT_TIMESTAMP
            )",
            [],
        )?;

        Ok(())
    }

    /// Get a connection from the pool
    pub fn get_connection(&self) -> AppResult<r2d2::PooledConnection<SqliteConnectionManager>> {
        self.pool
            .get()
            .map_err(|e| AppError::database(format!("Failed to get connection: {}", e)))
    }

    /// Check if the database is healthy
    pub fn is_healthy(&self) -> bool {
        if let Ok(conn) = self.pool.get() {
            conn.query_row("SELECT 1", [], |_| Ok(())).is_ok()
        } else {
            false
        }
    }

    /// Append a record and return its id
    pub fn write(&self, kind: MemoryKind, record: &Map<String, Value>) -> AppResult<i64> {
        for field in kind.required_fields() {
            let present = record
                .get(*field)
                .and_then(Value::as_str)
                .is_some_and(|s| !s.trim().is_empty());
            if !present {
                return Err(AppError::validation(format!(
                    "{} record is missing required field '{}'",
                    kind, field
                )));
            }
        }

        let values: Vec<SqlValue> = kind
            .columns()
            .iter()
            .map(|col| column_value(col, record.get(*col)))
            .collect();

        let columns = kind.columns().join(", ");
        let placeholders = (1..=values.len())
            .map(|i| format!("?{}", i))
            .collect::<Vec<_>>()
            .join(", ");
        let sql = format!(
            "INSERT INTO {} ({}) VALUES ({})",
            kind.table(),
            columns,
            placeholders
        );

        let conn = self.get_connection()?;
        conn.execute(&sql, params_from_iter(values))?;
        Ok(conn.last_insert_rowid())
    }

    /// Get a record by id
    pub fn read(&self, kind: MemoryKind, id: i64) -> AppResult<Option<MemoryRecord>> {
        let conn = self.get_connection()?;
        let sql = format!("{} WHERE id = ?1", select_sql(kind));
        let result = conn.query_row(&sql, params![id], |row| row_to_record(kind, row));

        match result {
            Ok(record) => Ok(Some(record)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(AppError::database(e.to_string())),
        }
    }

    /// Records whose text contains `text`, newest first
    pub fn search(&self, kind: MemoryKind, text: &str, limit: usize) -> AppResult<Vec<MemoryRecord>> {
        let conn = self.get_connection()?;
        let clause = kind
            .searchable()
            .iter()
            .map(|col| format!("{} LIKE ?1", col))
            .collect::<Vec<_>>()
            .join(" OR ");
        let sql = format!(
            "{} WHERE {} ORDER BY id DESC LIMIT ?2",
            select_sql(kind),
            clause
        );
        let pattern = format!("%{}%", text);

        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt
            .query_map(params![pattern, limit as i64], |row| row_to_record(kind, row))?
            .filter_map(|r| r.ok())
            .collect();
        Ok(rows)
    }

    /// The last `limit` turns of a session, oldest first
    pub fn conversation_history(&self, session_id: &str, limit: usize) -> AppResult<Vec<MemoryRecord>> {
        let conn = self.get_connection()?;
        let sql = format!(
            "{} WHERE session_id = ?1 ORDER BY id DESC LIMIT ?2",
            select_sql(MemoryKind::Conversation)
        );

        let mut stmt = conn.prepare(&sql)?;
        let mut rows: Vec<MemoryRecord> = stmt
            .query_map(params![session_id, limit as i64], |row| {
                row_to_record(MemoryKind::Conversation, row)
            })?
            .filter_map(|r| r.ok())
            .collect();
        rows.reverse();
        Ok(rows)
    }

    /// Delete a record; returns whether it existed
    pub fn delete(&self, kind: MemoryKind, id: i64) -> AppResult<bool> {
        let conn = self.get_connection()?;
        let sql = format!("DELETE FROM {} WHERE id = ?1", kind.table());
        let changed = conn.execute(&sql, params![id])?;
        Ok(changed > 0)
    }
}

impl std::fmt::Debug for MemoryStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryStore").finish_non_exhaustive()
    }
}

fn select_sql(kind: MemoryKind) -> String {
    format!(
        "SELECT id, {}, timestamp FROM {}",
        kind.columns().join(", "),
        kind.table()
    )
}

fn column_value(column: &str, value: Option<&Value>) -> SqlValue {
    match (column, value) {
        (_, None) | (_, Some(Value::Null)) => SqlValue::Null,
        ("confidence", Some(v)) => v.as_f64().map(SqlValue::Real).unwrap_or(SqlValue::Null),
        ("metadata", Some(v)) => SqlValue::Text(v.to_string()),
        (_, Some(Value::String(s))) => SqlValue::Text(s.clone()),
        (_, Some(other)) => SqlValue::Text(other.to_string()),
    }
}

fn row_to_record(kind: MemoryKind, row: &rusqlite::Row) -> rusqlite::Result<MemoryRecord> {
    let columns = kind.columns();
    let mut fields = Map::new();
    for (i, column) in columns.iter().enumerate() {
        let idx = i + 1;
        let value = match *column {
            "confidence" => row
                .get::<_, Option<f64>>(idx)?
                .map(Value::from)
                .unwrap_or(Value::Null),
            "metadata" => row
                .get::<_, Option<String>>(idx)?
                .and_then(|raw| serde_json::from_str(&raw).ok())
                .unwrap_or(Value::Null),
            _ => row
                .get::<_, Option<String>>(idx)?
                .map(Value::String)
                .unwrap_or(Value::Null),
        };
        fields.insert(column.to_string(), value);
    }

    Ok(MemoryRecord {
        id: row.get(0)?,
        kind,
        fields,
        timestamp: row
            .get::<_, Option<String>>(columns.len() + 1)?
            .unwrap_or_default(),
    })
}
