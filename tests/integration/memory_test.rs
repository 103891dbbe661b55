//! Memory Store Integration Tests
//!
//! SQLite-backed memory on disk: required fields per kind, search, session
//! history, and writes arriving through the bridge.

use serde_json::{json, Map, Value};

use research_agent::services::research::MemoryBridge;
use research_agent::storage::{MemoryKind, MemoryStore};
use research_agent::AppError;

fn record(pairs: &[(&str, Value)]) -> Map<String, Value> {
    pairs
        .iter()
        .map(|(k, v)| (k.to_string(), v.clone()))
        .collect()
}

#[test]
fn test_required_fields_are_enforced_per_kind() {
    let store = MemoryStore::new_in_memory().unwrap();

    for kind in [MemoryKind::Conversation, MemoryKind::Fact, MemoryKind::Document] {
        let mut fields = Map::new();
        for key in kind.required_fields() {
            fields.insert(key.to_string(), json!(format!("{} value", key)));
        }
        assert!(store.write(kind, &fields).is_ok(), "{} should accept its fields", kind);

        let missing = kind.required_fields()[0];
        fields.insert(missing.to_string(), json!("  "));
        assert!(
            matches!(store.write(kind, &fields), Err(AppError::Validation(_))),
            "{} accepted a blank {}",
            kind,
            missing
        );
    }
}

#[test]
fn test_store_survives_reopen() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("memory.db");

    let id = {
        let store = MemoryStore::open(&path).unwrap();
        store
            .write(
                MemoryKind::Fact,
                &record(&[
                    ("fact", json!("Water boils at 100C at sea level")),
                    ("source", json!("physics.txt")),
                    ("confidence", json!(0.8)),
                ]),
            )
            .unwrap()
    };

    let store = MemoryStore::open(&path).unwrap();
    assert!(store.is_healthy());
    let fact = store.read(MemoryKind::Fact, id).unwrap().unwrap();
    assert_eq!(fact.field_str("source"), Some("physics.txt"));
    assert_eq!(fact.fields["confidence"], json!(0.8));

    assert!(store.delete(MemoryKind::Fact, id).unwrap());
    assert!(store.read(MemoryKind::Fact, id).unwrap().is_none());
}

#[test]
fn test_conversation_history_is_per_session_and_ordered() {
    let store = MemoryStore::new_in_memory().unwrap();
    for (session, role, content) in [
        ("a", "user", "first"),
        ("b", "user", "other session"),
        ("a", "assistant", "second"),
        ("a", "user", "third"),
    ] {
        store
            .write(
                MemoryKind::Conversation,
                &record(&[
                    ("session_id", json!(session)),
                    ("role", json!(role)),
                    ("content", json!(content)),
                ]),
            )
            .unwrap();
    }

    let history = store.conversation_history("a", 10).unwrap();
    let contents: Vec<&str> = history.iter().filter_map(|r| r.field_str("content")).collect();
    assert_eq!(contents, vec!["first", "second", "third"]);

    let recent = store.conversation_history("a", 2).unwrap();
    let contents: Vec<&str> = recent.iter().filter_map(|r| r.field_str("content")).collect();
    assert_eq!(contents, vec!["second", "third"]);
}

#[tokio::test]
async fn test_bridge_writes_land_in_the_store() {
    let dir = tempfile::tempdir().unwrap();
    let store = MemoryStore::open(&dir.path().join("memory.db")).unwrap();
    let bridge = MemoryBridge::spawn(store.clone(), "session-x");

    bridge.project_document_hits(&json!([
        {"text": "Glaciers store fresh water", "metadata": {"source": "ice.md", "similarity": 0.75}},
        {"text": "Sea ice reflects sunlight", "metadata": {"source": "ice.md"}}
    ]));
    bridge.project_conversation("user", "how do glaciers form?");

    let stats = bridge.close().await;
    assert_eq!(stats.written, 3);

    let facts = store.search(MemoryKind::Fact, "ice.md", 10).unwrap();
    assert_eq!(facts.len(), 2);
    let mut confidences: Vec<f64> = facts
        .iter()
        .filter_map(|f| f.fields["confidence"].as_f64())
        .collect();
    confidences.sort_by(|a, b| a.partial_cmp(b).unwrap());
    assert_eq!(confidences, vec![0.5, 0.75]);
}
