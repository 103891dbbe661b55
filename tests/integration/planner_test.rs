//! Planner Integration Tests
//!
//! Plan creation against a scripted model: the happy path, the repair
//! prompt, the failure report, and a full plan-then-execute round.

use std::sync::Arc;

use serde_json::json;

use research_agent::services::research::ResearchPlanner;
use research_agent::AppError;
use research_agent_core::ActionKind;

use super::support::{Harness, RecordingWebTool, ScriptedBackend};

#[tokio::test]
async fn test_plan_is_created_from_model_output() {
    let model = Arc::new(ScriptedBackend::new().with_json(json!({
        "steps": [
            {"action": "search_web", "parameters": {"query": "coral bleaching"}, "reasoning": "sources"},
            {"action": "generate_summary", "parameters": {}, "reasoning": "answer"}
        ]
    })));
    let planner = ResearchPlanner::new(model.clone(), 500);

    let plan = planner.create_plan("  coral bleaching  ").await.unwrap();

    assert_eq!(plan.query, "coral bleaching");
    assert_eq!(plan.len(), 2);
    let calls = model.calls();
    assert_eq!(calls.len(), 1);
    assert!(calls[0].json);
    assert_eq!(calls[0].temperature, Some(0.2));
    assert!(calls[0].prompt.contains("coral bleaching"));
    assert!(calls[0].prompt.contains("get_document_summary"));
}

#[tokio::test]
async fn test_empty_output_triggers_one_repair_prompt() {
    let model = Arc::new(
        ScriptedBackend::new()
            .with_json(json!({"thoughts": "no steps here"}))
            .with_json(json!([{"action": "search_web", "parameters": "retry worked"}])),
    );
    let planner = ResearchPlanner::new(model.clone(), 500);

    let plan = planner.create_plan("q").await.unwrap();

    assert_eq!(model.calls().len(), 2);
    assert!(model.calls()[1].prompt.contains("did not contain a usable plan"));
    assert_eq!(plan.step(0).unwrap().param_str("query"), Some("retry worked"));
}

#[tokio::test]
async fn test_no_steps_after_repair_is_a_planning_error() {
    let model = Arc::new(ScriptedBackend::new());
    let planner = ResearchPlanner::new(model.clone(), 500);

    let err = planner.create_plan("q").await.unwrap_err();

    assert!(matches!(err, AppError::Planning(_)));
    assert!(err.to_string().contains("failed to create a research plan"));
    assert_eq!(model.calls().len(), 2);
}

#[tokio::test]
async fn test_invalid_steps_fall_back_instead_of_failing() {
    let model = Arc::new(ScriptedBackend::new().with_json(json!({
        "steps": [{"action": "get_document_summary", "parameters": {"file_path": "http://example.com/a"}}]
    })));
    let planner = ResearchPlanner::new(model, 500);

    let plan = planner.create_plan("q").await.unwrap();

    assert_eq!(plan.len(), 1);
    assert_eq!(plan.step(0).unwrap().kind(), ActionKind::GenerateSummary);
}

#[tokio::test]
async fn test_long_query_is_truncated_and_empty_query_rejected() {
    let model = Arc::new(ScriptedBackend::new().with_json(json!({"steps": [{"action": "generate_summary"}]})));
    let planner = ResearchPlanner::new(model, 10);

    let plan = planner.create_plan(&"x".repeat(40)).await.unwrap();
    assert_eq!(plan.query.chars().count(), 10);

    assert!(matches!(planner.create_plan("   ").await, Err(AppError::Validation(_))));
}

#[tokio::test]
async fn test_plan_then_execute_round_trip() {
    let model = ScriptedBackend::new()
        .with_json(json!({"steps": [
            {"action": "search_web", "parameters": {"query": "quantum computing"}},
            {"action": "generate_summary"}
        ]}))
        .with_text("Quantum computers use qubits.");
    let web = RecordingWebTool::new().with_results("quantum computing", &["http://x/y"]);
    let harness = Harness::new(model, web).await;

    let planner = ResearchPlanner::new(harness.model.clone(), 500);
    let plan = planner.create_plan("quantum computing").await.unwrap();
    let outcome = harness.executor.execute(plan, false).await;

    assert_eq!(outcome.summary, "Quantum computers use qubits.");
    assert_eq!(outcome.plan.len(), 4);
    assert_eq!(harness.web.call_count(), 3);
    let calls = harness.model.calls();
    assert_eq!(calls.len(), 2);
    assert!(calls[1].prompt.contains("http://x/y"));
}
