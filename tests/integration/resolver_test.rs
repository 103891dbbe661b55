//! Local-Resource Resolver Integration Tests
//!
//! Lookup order and determinism across candidate directories, subdirectories
//! and the document index.

use std::path::Path;
use std::sync::Arc;

use research_agent::services::research::{LocalResourceResolver, Resolution, ResourceClass};
use research_agent_tools::{DocumentTool, LocalDocumentIndex};

fn write(path: &Path, content: &str) {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).unwrap();
    }
    std::fs::write(path, content).unwrap();
}

#[tokio::test]
async fn test_higher_priority_directory_wins() {
    let root = tempfile::tempdir().unwrap();
    let first = root.path().join("first");
    let second = root.path().join("second");
    write(&second.join("paper.pdf"), "second");
    write(&first.join("paper.pdf"), "first");

    let resolver = LocalResourceResolver::new(vec![first.clone(), second.clone()]);
    for _ in 0..5 {
        assert_eq!(
            resolver.resolve("paper.pdf").await,
            Resolution::Found(first.join("paper.pdf"))
        );
    }

    let reversed = LocalResourceResolver::new(vec![second.clone(), first]);
    assert_eq!(
        reversed.resolve("https://host.example/files/paper.pdf").await,
        Resolution::Found(second.join("paper.pdf"))
    );
}

#[tokio::test]
async fn test_literal_path_beats_candidates() {
    let root = tempfile::tempdir().unwrap();
    let literal = root.path().join("elsewhere").join("notes.txt");
    let candidate = root.path().join("docs");
    write(&literal, "literal");
    write(&candidate.join("notes.txt"), "candidate");

    let resolver = LocalResourceResolver::new(vec![candidate]);
    let target = literal.to_string_lossy().to_string();
    assert_eq!(resolver.resolve(&target).await, Resolution::Found(literal.clone()));

    let file_url = format!("file://{}", target.replace(' ', "%20"));
    assert_eq!(resolver.resolve(&file_url).await, Resolution::Found(literal));
}

#[tokio::test]
async fn test_file_url_falls_back_to_candidate_by_name() {
    let root = tempfile::tempdir().unwrap();
    let docs = root.path().join("docs");
    write(&docs.join("My Report.md"), "report");

    let resolver = LocalResourceResolver::new(vec![docs.clone()]);
    assert_eq!(
        resolver.resolve("file:///no/such/dir/My%20Report.md").await,
        Resolution::Found(docs.join("My Report.md"))
    );
}

#[tokio::test]
async fn test_case_insensitive_match_and_subdirectories() {
    let root = tempfile::tempdir().unwrap();
    let docs = root.path().join("docs");
    write(&docs.join("Budget.CSV"), "a,b");
    write(&docs.join("b_sub").join("plan.txt"), "b");
    write(&docs.join("a_sub").join("plan.txt"), "a");

    let resolver = LocalResourceResolver::new(vec![docs.clone()]);
    assert_eq!(
        resolver.resolve("budget.csv").await,
        Resolution::Found(docs.join("Budget.CSV"))
    );
    assert_eq!(
        resolver.resolve("plan.txt").await,
        Resolution::Found(docs.join("a_sub").join("plan.txt"))
    );
}

#[tokio::test]
async fn test_document_index_is_the_last_lookup() {
    let root = tempfile::tempdir().unwrap();
    let deep = root.path().join("archive").join("2023").join("deep").join("minutes.txt");
    write(&deep, "Minutes of the annual meeting.");

    let index = Arc::new(LocalDocumentIndex::open(root.path().join("index")).await.unwrap());
    assert!(index.index(&deep).await.unwrap().is_some());

    let empty = root.path().join("empty");
    std::fs::create_dir_all(&empty).unwrap();
    let catalog: Arc<dyn DocumentTool> = index;

    let without = LocalResourceResolver::new(vec![empty.clone()]);
    assert_eq!(
        without.resolve("minutes.txt").await,
        Resolution::Unresolved("minutes.txt".to_string())
    );

    let with = LocalResourceResolver::new(vec![empty]).with_catalog(catalog);
    match with.resolve("minutes.txt").await {
        Resolution::Found(path) => assert!(path.ends_with("deep/minutes.txt")),
        other => panic!("expected a match, got {:?}", other),
    }
}

#[tokio::test]
async fn test_unresolved_returns_best_effort_name() {
    let resolver = LocalResourceResolver::new(vec![]);
    assert_eq!(
        resolver.resolve("https://host.example/a/missing.pdf").await,
        Resolution::Unresolved("missing.pdf".to_string())
    );
    assert_eq!(
        resolver.resolve("relative/dir/missing.docx").await,
        Resolution::Unresolved("missing.docx".to_string())
    );
}

#[test]
fn test_classification() {
    let root = tempfile::tempdir().unwrap();
    write(&root.path().join("data.json"), "{}");
    let resolver = LocalResourceResolver::new(vec![root.path().to_path_buf()]);

    assert_eq!(resolver.classify("https://api.example/data.json"), ResourceClass::Local);
    assert_eq!(resolver.classify("ftp://mirror.example/DATA.JSON"), ResourceClass::Local);
    assert_eq!(resolver.classify("https://api.example/other.json"), ResourceClass::Remote);
    assert_eq!(resolver.classify("https://api.example/data"), ResourceClass::Remote);
    assert_eq!(resolver.classify("https://api.example/"), ResourceClass::Remote);
    assert_eq!(resolver.classify("data.json"), ResourceClass::Local);
    assert_eq!(resolver.classify("anything-without-a-scheme"), ResourceClass::Local);
}
