//! Execution Engine Integration Tests
//!
//! Runs plans against scripted collaborators: failure isolation, plan growth
//! from search results, dry runs, the step cap, local-document handling and
//! memory projection.

use serde_json::{json, Map, Value};

use research_agent::services::research::{
    DRY_RUN_PLACEHOLDER, MemoryBridge, StepOutcome, StopReason,
};
use research_agent::storage::{MemoryKind, MemoryStore};
use research_agent_core::{error_key, result_key, ActionKind, Plan, Step, STEP_LIMIT_KEY};

use super::support::{Harness, RecordingWebTool, ScriptedBackend};

fn search(query: &str) -> Step {
    let mut params = Map::new();
    params.insert("query".into(), json!(query));
    Step::new(ActionKind::SearchWeb, params, "")
}

fn summarize() -> Step {
    Step::new(ActionKind::GenerateSummary, Map::new(), "")
}

fn doc_summary(file_path: &str) -> Step {
    let mut params = Map::new();
    params.insert("file_path".into(), json!(file_path));
    Step::new(ActionKind::GetDocumentSummary, params, "")
}

fn kinds(plan: &Plan) -> Vec<ActionKind> {
    plan.steps().iter().map(Step::kind).collect()
}

// ============================================================================
// Failure isolation
// ============================================================================

#[tokio::test]
async fn test_failed_step_does_not_stop_the_plan() {
    let web = RecordingWebTool::new().failing_on("http://down.example/page");
    let harness = Harness::new(ScriptedBackend::new(), web).await;

    let plan = Plan::new(
        "isolation",
        vec![
            Step::for_url(ActionKind::FetchPage, "http://down.example/page", ""),
            search("isolation"),
        ],
    );
    let outcome = harness.executor.execute(plan, false).await;

    let context = &outcome.plan.context;
    assert!(context.contains_key(&error_key(ActionKind::FetchPage, 0)));
    assert!(context.contains_key(&result_key(ActionKind::SearchWeb, 1)));
    assert!(!context.contains_key(&result_key(ActionKind::FetchPage, 0)));

    let outcomes: Vec<StepOutcome> = outcome.report.steps.iter().map(|s| s.outcome).collect();
    assert_eq!(outcomes, vec![StepOutcome::Error, StepOutcome::Ok]);
    assert_eq!(outcome.report.stop_reason, StopReason::Completed);
    assert_eq!(outcome.summary, "Scripted summary.");
}

#[tokio::test]
async fn test_error_message_is_recorded_in_context() {
    let web = RecordingWebTool::new().failing_on("broken query");
    let harness = Harness::new(ScriptedBackend::new(), web).await;

    let outcome = harness
        .executor
        .execute(Plan::new("q", vec![search("broken query"), summarize()]), false)
        .await;

    let message = outcome.plan.context[&error_key(ActionKind::SearchWeb, 0)]
        .as_str()
        .unwrap()
        .to_string();
    assert!(message.contains("connection refused"), "got {}", message);
    // The summary step still ran.
    assert_eq!(
        outcome.plan.context[&result_key(ActionKind::GenerateSummary, 1)],
        Value::Null
    );
}

// ============================================================================
// Plan growth
// ============================================================================

#[tokio::test]
async fn test_search_result_grows_plan_with_fetch_and_analyze() {
    let web = RecordingWebTool::new().with_results("quantum computing", &["http://x/y"]);
    let harness = Harness::new(ScriptedBackend::new(), web).await;

    let plan = Plan::new("quantum computing", vec![search("quantum computing"), summarize()]);
    let outcome = harness.executor.execute(plan, false).await;

    assert_eq!(
        kinds(&outcome.plan),
        vec![
            ActionKind::SearchWeb,
            ActionKind::FetchPage,
            ActionKind::AnalyzePage,
            ActionKind::GenerateSummary
        ]
    );
    assert!(outcome.plan.steps()[1].is_for_url(ActionKind::FetchPage, "http://x/y"));
    assert!(outcome.plan.steps()[2].is_for_url(ActionKind::AnalyzePage, "http://x/y"));
    assert_eq!(outcome.report.inserted_steps, 2);

    assert_eq!(
        harness.web.calls(),
        vec![
            "search quantum computing".to_string(),
            "fetch http://x/y".to_string(),
            "analyze http://x/y".to_string(),
        ]
    );
    for (index, kind) in kinds(&outcome.plan).into_iter().enumerate() {
        assert!(outcome.plan.context.contains_key(&result_key(kind, index)));
    }
}

#[tokio::test]
async fn test_follow_ups_are_capped_and_keep_result_order() {
    let web = RecordingWebTool::new().with_results("rust", &["http://a/1", "http://b/2", "http://c/3"]);
    let harness = Harness::new(ScriptedBackend::new(), web).await;

    let outcome = harness
        .executor
        .execute(Plan::new("rust", vec![search("rust")]), false)
        .await;

    let steps = outcome.plan.steps();
    assert_eq!(steps.len(), 5);
    assert!(steps[1].is_for_url(ActionKind::FetchPage, "http://a/1"));
    assert!(steps[2].is_for_url(ActionKind::AnalyzePage, "http://a/1"));
    assert!(steps[3].is_for_url(ActionKind::FetchPage, "http://b/2"));
    assert!(steps[4].is_for_url(ActionKind::AnalyzePage, "http://b/2"));
    assert!(!harness.web.calls().iter().any(|c| c.contains("http://c/3")));
}

#[tokio::test]
async fn test_standalone_fetch_gets_an_analysis() {
    let harness = Harness::new(ScriptedBackend::new(), RecordingWebTool::new()).await;
    let plan = Plan::new(
        "page",
        vec![Step::for_url(ActionKind::FetchPage, "https://site.example/article", "")],
    );

    let outcome = harness.executor.execute(plan, false).await;

    assert_eq!(kinds(&outcome.plan), vec![ActionKind::FetchPage, ActionKind::AnalyzePage]);
    let analysis = &outcome.plan.context[&result_key(ActionKind::AnalyzePage, 1)];
    assert_eq!(analysis["success"], json!(true));
}

// ============================================================================
// Dry run
// ============================================================================

#[tokio::test]
async fn test_dry_run_records_placeholders_without_tool_calls() {
    let web = RecordingWebTool::new().with_results("q", &["http://x/y"]);
    let model = ScriptedBackend::new().with_text("Preview of the plan.");
    let harness = Harness::new(model, web).await;

    let plan = Plan::new(
        "q",
        vec![search("q"), doc_summary("notes.txt"), summarize()],
    );
    let outcome = harness.executor.execute(plan, true).await;

    assert_eq!(outcome.plan.context.len(), 3);
    for value in outcome.plan.context.values() {
        assert_eq!(value, &json!(DRY_RUN_PLACEHOLDER));
    }
    assert_eq!(harness.web.call_count(), 0);
    assert_eq!(harness.docs.call_count(), 0);
    assert_eq!(outcome.plan.len(), 3, "dry runs never mutate");
    assert_eq!(outcome.report.count(StepOutcome::DryRun), 3);
    assert!(outcome.report.dry_run);

    let calls = harness.model.calls();
    assert_eq!(calls.len(), 1);
    assert_eq!(calls[0].temperature, Some(0.7));
    assert_eq!(outcome.summary, "Preview of the plan.");
}

#[tokio::test]
async fn test_dry_run_is_not_cut_by_step_limit() {
    let harness = Harness::with_limit(ScriptedBackend::new(), RecordingWebTool::new(), 2).await;
    let plan = Plan::new(
        "long",
        vec![search("a"), search("b"), search("c"), summarize()],
    );

    let outcome = harness.executor.execute(plan, true).await;

    assert_eq!(outcome.report.count(StepOutcome::DryRun), 4);
    assert_eq!(outcome.report.stop_reason, StopReason::Completed);
    assert!(!outcome.plan.context.contains_key(STEP_LIMIT_KEY));
}

// ============================================================================
// Step cap
// ============================================================================

#[tokio::test]
async fn test_step_limit_is_terminal() {
    let web = RecordingWebTool::new().with_results("grow", &["http://a/1", "http://b/2"]);
    let harness = Harness::with_limit(ScriptedBackend::new(), web, 3).await;

    let outcome = harness
        .executor
        .execute(Plan::new("grow", vec![search("grow"), summarize()]), false)
        .await;

    assert_eq!(outcome.plan.len(), 6);
    assert_eq!(outcome.report.stop_reason, StopReason::StepLimitReached);
    assert_eq!(outcome.report.count(StepOutcome::Ok), 3);
    assert_eq!(outcome.report.count(StepOutcome::Skipped), 3);
    assert!(outcome.plan.context[STEP_LIMIT_KEY]
        .as_str()
        .unwrap()
        .contains("step limit of 3"));
    assert!(!outcome.plan.context.contains_key(&result_key(ActionKind::FetchPage, 3)));

    // Synthesis still runs over what was gathered.
    let calls = harness.model.calls();
    assert_eq!(calls.len(), 1);
    assert_eq!(calls[0].temperature, Some(0.5));
}

#[tokio::test]
async fn test_plan_within_limit_completes() {
    let harness = Harness::with_limit(ScriptedBackend::new(), RecordingWebTool::new(), 2).await;
    let outcome = harness
        .executor
        .execute(Plan::new("q", vec![search("nothing"), summarize()]), false)
        .await;
    assert_eq!(outcome.report.stop_reason, StopReason::Completed);
    assert!(!outcome.plan.context.contains_key(STEP_LIMIT_KEY));
}

// ============================================================================
// Local documents
// ============================================================================

#[tokio::test]
async fn test_document_summary_indexes_local_file_on_demand() {
    let harness = Harness::new(ScriptedBackend::new(), RecordingWebTool::new()).await;
    harness.write_doc("notes.txt", "Photosynthesis converts light into chemical energy.");

    let outcome = harness
        .executor
        .execute(Plan::new("notes", vec![doc_summary("notes.txt")]), false)
        .await;

    let result = &outcome.plan.context[&result_key(ActionKind::GetDocumentSummary, 0)];
    assert_eq!(result["metadata"]["filename"], json!("notes.txt"));
    assert!(result["content"].as_str().unwrap().contains("Photosynthesis"));

    let prompt = &harness.model.calls()[0].prompt;
    assert!(prompt.contains("Photosynthesis"));
}

#[tokio::test]
async fn test_missing_document_yields_not_found_result() {
    let harness = Harness::new(ScriptedBackend::new(), RecordingWebTool::new()).await;

    let outcome = harness
        .executor
        .execute(Plan::new("missing", vec![doc_summary("ghost.pdf")]), false)
        .await;

    let result = &outcome.plan.context[&result_key(ActionKind::GetDocumentSummary, 0)];
    assert_eq!(result["status"], json!("not_found"));
    assert_eq!(result["resource"], json!("ghost.pdf"));
    assert!(!outcome.plan.context.contains_key(&error_key(ActionKind::GetDocumentSummary, 0)));
    assert_eq!(outcome.report.steps[0].outcome, StepOutcome::Ok);
}

#[tokio::test]
async fn test_web_url_naming_local_document_is_read_locally() {
    let harness = Harness::new(ScriptedBackend::new(), RecordingWebTool::new()).await;
    harness.write_doc("report.md", "# Findings\n\nLocal findings about tidal energy.");

    let plan = Plan::new(
        "report",
        vec![Step::for_url(ActionKind::FetchPage, "https://files.example/report.md", "")],
    );
    let outcome = harness.executor.execute(plan, false).await;

    assert_eq!(harness.web.call_count(), 0);
    let result = &outcome.plan.context[&result_key(ActionKind::FetchPage, 0)];
    assert_eq!(result["metadata"]["filename"], json!("report.md"));

    // The follow-up analysis reads the same file; the prompt quotes it once.
    assert_eq!(kinds(&outcome.plan), vec![ActionKind::FetchPage, ActionKind::AnalyzePage]);
    let prompt = &harness.model.calls()[0].prompt;
    assert_eq!(prompt.matches("Local findings about tidal energy").count(), 1);
}

#[tokio::test]
async fn test_existing_file_wins_over_indexed_namesake() {
    use research_agent_tools::DocumentTool;

    let harness = Harness::new(ScriptedBackend::new(), RecordingWebTool::new()).await;
    let elsewhere = tempfile::tempdir().unwrap();
    let stale = elsewhere.path().join("report.txt");
    std::fs::write(&stale, "Old copy kept in another folder.").unwrap();
    assert!(harness.docs.index(&stale).await.unwrap().is_some());
    let current = harness.write_doc("report.txt", "Current report from the document folder.");

    let literal = current.to_string_lossy().to_string();
    let plan = Plan::new("report", vec![doc_summary(&literal), doc_summary("report.txt")]);
    let outcome = harness.executor.execute(plan, false).await;

    for index in 0..2 {
        let result = &outcome.plan.context[&result_key(ActionKind::GetDocumentSummary, index)];
        let content = result["content"].as_str().unwrap();
        assert!(content.contains("Current report"), "step {} read {:?}", index, content);
    }
}

#[tokio::test]
async fn test_document_id_prefix_is_read_from_the_index() {
    use research_agent_tools::DocumentTool;

    let harness = Harness::new(ScriptedBackend::new(), RecordingWebTool::new()).await;
    let elsewhere = tempfile::tempdir().unwrap();
    let archived = elsewhere.path().join("minutes.txt");
    std::fs::write(&archived, "Archived minutes of the spring meeting.").unwrap();
    let id = harness.docs.index(&archived).await.unwrap().unwrap();

    let outcome = harness
        .executor
        .execute(Plan::new("minutes", vec![doc_summary(&id[..12])]), false)
        .await;

    let result = &outcome.plan.context[&result_key(ActionKind::GetDocumentSummary, 0)];
    assert!(result["content"].as_str().unwrap().contains("Archived minutes"));
}

#[tokio::test]
async fn test_search_documents_uses_requested_k() {
    let harness = Harness::new(ScriptedBackend::new(), RecordingWebTool::new()).await;
    let path = harness.write_doc("energy.txt", "Tidal energy is predictable. Tidal energy is renewable.");
    {
        use research_agent_tools::DocumentTool;
        assert!(harness.docs.index(&path).await.unwrap().is_some());
    }

    let mut params = Map::new();
    params.insert("query".into(), json!("tidal energy"));
    params.insert("k".into(), json!(1));
    let plan = Plan::new("tidal", vec![Step::new(ActionKind::SearchDocuments, params, "")]);

    let outcome = harness.executor.execute(plan, false).await;
    let hits = outcome.plan.context[&result_key(ActionKind::SearchDocuments, 0)]
        .as_array()
        .unwrap()
        .clone();
    assert_eq!(hits.len(), 1);
    assert_eq!(hits[0]["metadata"]["source"], json!("energy.txt"));
}

// ============================================================================
// Non-tool actions and synthesis
// ============================================================================

#[tokio::test]
async fn test_ask_user_and_summary_steps_do_not_call_tools() {
    let harness = Harness::new(ScriptedBackend::new(), RecordingWebTool::new()).await;
    let mut params = Map::new();
    params.insert("question".into(), json!("Which region?"));

    let plan = Plan::new(
        "ask",
        vec![Step::new(ActionKind::AskUser, params, ""), summarize()],
    );
    let outcome = harness.executor.execute(plan, false).await;

    assert_eq!(
        outcome.plan.context[&result_key(ActionKind::AskUser, 0)],
        json!("[User would be asked: Which region?]")
    );
    assert_eq!(outcome.plan.context[&result_key(ActionKind::GenerateSummary, 1)], Value::Null);
    assert_eq!(harness.web.call_count(), 0);
}

#[tokio::test]
async fn test_empty_model_answer_gets_fallback_text() {
    let model = ScriptedBackend::new().with_text("   ");
    let harness = Harness::new(model, RecordingWebTool::new()).await;

    let outcome = harness
        .executor
        .execute(Plan::new("q", vec![summarize()]), false)
        .await;

    assert!(outcome.summary.starts_with("Unable to generate a summary"));
}

#[tokio::test]
async fn test_synthesis_prompt_reports_failed_fetches() {
    let web = RecordingWebTool::new().failing_on("http://down.example/a");
    let harness = Harness::new(ScriptedBackend::new(), web).await;

    harness
        .executor
        .execute(
            Plan::new(
                "outage",
                vec![Step::for_url(ActionKind::FetchPage, "http://down.example/a", "")],
            ),
            false,
        )
        .await;

    let calls = harness.model.calls();
    assert_eq!(calls.len(), 1);
    assert!(calls[0].prompt.contains("outage"));
    assert!(calls[0].system.as_deref().unwrap().contains("May 1, 2024"));
}

// ============================================================================
// Memory projection
// ============================================================================

#[tokio::test]
async fn test_results_are_projected_into_memory() {
    let web = RecordingWebTool::new().with_results("solar", &["http://sun.example/facts"]);
    let Harness { executor, dir: _dir, .. } = Harness::new(ScriptedBackend::new(), web).await;

    let store = MemoryStore::new_in_memory().unwrap();
    let bridge = MemoryBridge::spawn(store.clone(), "session-42");
    let executor = executor.with_memory(bridge.clone());

    let outcome = executor
        .execute(Plan::new("solar", vec![search("solar"), summarize()]), false)
        .await;
    let stats = bridge.close().await;
    assert_eq!(stats.failed, 0);

    let history = store.conversation_history("session-42", 10).unwrap();
    assert_eq!(history.len(), 2);
    assert_eq!(history[0].field_str("role"), Some("user"));
    assert_eq!(history[0].field_str("content"), Some("solar"));
    assert_eq!(history[1].field_str("content"), Some(outcome.summary.as_str()));

    let pages = store.search(MemoryKind::Document, "sun.example", 10).unwrap();
    assert_eq!(pages.len(), 1);
    assert_eq!(pages[0].field_str("url"), Some("http://sun.example/facts"));
}

#[tokio::test]
async fn test_dry_run_writes_nothing_to_memory() {
    let Harness { executor, dir: _dir, .. } =
        Harness::new(ScriptedBackend::new(), RecordingWebTool::new()).await;

    let store = MemoryStore::new_in_memory().unwrap();
    let bridge = MemoryBridge::spawn(store.clone(), "dry");
    let executor = executor.with_memory(bridge.clone());

    executor
        .execute(Plan::new("q", vec![search("q"), summarize()]), true)
        .await;
    assert_eq!(bridge.close().await.written, 0);
    assert!(store.conversation_history("dry", 10).unwrap().is_empty());
}
