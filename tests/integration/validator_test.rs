//! Plan Validator Integration Tests
//!
//! Properties of `validate_plan` over model output of varying quality:
//! surviving steps always satisfy the registry, empty plans fall back to a
//! single summary step, and re-validation is stable.

use serde_json::{json, Value};

use research_agent::services::research::validator::{fallback_step, FALLBACK_REASONING};
use research_agent::services::research::{validate_plan, validate_step};
use research_agent_core::{ActionKind, Plan};

fn assert_well_formed(plan: &Plan) {
    assert!(!plan.is_empty());
    for step in plan.steps() {
        for key in step.kind().required_params() {
            let value = step.parameters().get(*key);
            assert!(
                value.is_some_and(|v| !v.is_null() && v.as_str().map_or(true, |s| !s.trim().is_empty())),
                "{} missing {}",
                step.kind(),
                key
            );
        }
    }
}

// ============================================================================
// Surviving steps
// ============================================================================

#[test]
fn test_valid_plan_is_kept_in_order() {
    let raw = json!({
        "steps": [
            {"action": "search_web", "parameters": {"query": "tidal power"}, "reasoning": "find sources"},
            {"action": "fetch_webpage", "parameters": {"url": "https://a.org/tides"}, "reasoning": ""},
            {"action": "generate_summary", "parameters": {}, "reasoning": "answer"}
        ]
    });

    let plan = validate_plan("tidal power", &raw);

    assert_eq!(plan.query, "tidal power");
    assert_eq!(plan.len(), 3);
    assert_eq!(plan.step(0).unwrap().reasoning(), "find sources");
    assert_eq!(plan.step(1).unwrap().param_str("url"), Some("https://a.org/tides"));
    assert!(plan.context.is_empty());
    assert_well_formed(&plan);
}

#[test]
fn test_mixed_quality_plan_keeps_only_valid_steps() {
    let raw = json!({
        "steps": [
            "not a record",
            42,
            {"parameters": {"query": "no action"}},
            {"action": "teleport", "parameters": {}},
            {"action": "fetch_webpage", "parameters": {}},
            {"action": "fetch_webpage", "parameters": {"url": "   "}},
            {"action": "extract_text", "parameters": {"url": "https://a.org"}},
            {"action": "search_documents", "parameters": {"query": "contracts"}},
            {"action": "ask_user", "parameters": {"question": "Which year?"}, "extra": true}
        ]
    });

    let plan = validate_plan("q", &raw);

    let kinds: Vec<ActionKind> = plan.steps().iter().map(|s| s.kind()).collect();
    assert_eq!(kinds, vec![ActionKind::SearchDocuments, ActionKind::AskUser]);
    assert_well_formed(&plan);
}

#[test]
fn test_bare_string_search_parameters_are_repaired() {
    let plan = validate_plan(
        "q",
        &json!({"steps": [{"action": "search_web", "parameters": "ocean currents"}]}),
    );
    assert_eq!(plan.len(), 1);
    assert_eq!(plan.step(0).unwrap().param_str("query"), Some("ocean currents"));
}

#[test]
fn test_bare_string_parameters_are_not_repaired_for_other_actions() {
    let plan = validate_plan(
        "q",
        &json!({"steps": [{"action": "fetch_webpage", "parameters": "https://a.org"}]}),
    );
    assert_eq!(plan.steps(), &[fallback_step()]);
}

#[test]
fn test_remote_url_rejected_for_document_summary() {
    let raw = json!({"steps": [
        {"action": "get_document_summary", "parameters": {"file_path": "http://example.com/a"}},
        {"action": "get_document_summary", "parameters": {"file_path": "HTTPS://example.com/b.pdf"}},
        {"action": "get_document_summary", "parameters": {"file_path": "reports/q3.pdf"}}
    ]});

    let plan = validate_plan("q", &raw);

    assert_eq!(plan.len(), 1);
    assert_eq!(plan.step(0).unwrap().param_str("file_path"), Some("reports/q3.pdf"));
}

#[test]
fn test_aliases_and_case_are_accepted() {
    let raw = json!([
        {"kind": "Fetch_Page", "parameters": {"url": "https://a.org"}},
        {"action": " ANALYZE_PAGE ", "parameters": {"url": "https://a.org"}}
    ]);
    let plan = validate_plan("q", &raw);
    assert_eq!(plan.step(0).unwrap().kind(), ActionKind::FetchPage);
    assert_eq!(plan.step(1).unwrap().kind(), ActionKind::AnalyzePage);
}

#[test]
fn test_misplaced_summary_step_is_kept() {
    let raw = json!({"steps": [
        {"action": "generate_summary"},
        {"action": "search_web", "parameters": {"query": "late search"}}
    ]});
    let plan = validate_plan("q", &raw);
    assert_eq!(plan.len(), 2);
}

// ============================================================================
// Fallback
// ============================================================================

#[test]
fn test_zero_valid_steps_yield_exact_fallback() {
    let inputs: Vec<Value> = vec![
        json!({}),
        json!({"steps": []}),
        json!({"steps": "search_web"}),
        json!([]),
        json!(null),
        json!("plan"),
        json!({"steps": [{"action": "unknown"}, {"action": "search_web"}]}),
    ];

    for raw in inputs {
        let plan = validate_plan("q", &raw);
        assert_eq!(plan.len(), 1, "input {}", raw);
        let step = plan.step(0).unwrap();
        assert_eq!(step.kind(), ActionKind::GenerateSummary);
        assert!(step.parameters().is_empty());
        assert_eq!(step.reasoning(), FALLBACK_REASONING);
    }
}

// ============================================================================
// Idempotence
// ============================================================================

#[test]
fn test_revalidating_a_valid_plan_is_stable() {
    let raw = json!({"steps": [
        {"action": "search_web", "parameters": "bare string query"},
        {"action": "bogus"},
        {"action": "analyze_webpage", "parameters": {"url": "https://a.org"}, "reasoning": "look"},
        {"action": "generate_summary"}
    ]});
    let first = validate_plan("q", &raw);

    let reserialized = json!({ "steps": serde_json::to_value(first.steps()).unwrap() });
    let second = validate_plan("q", &reserialized);

    assert_eq!(first.steps(), second.steps());
}

#[test]
fn test_revalidating_fallback_does_not_duplicate_it() {
    let first = validate_plan("q", &json!({}));
    let reserialized = json!({ "steps": serde_json::to_value(first.steps()).unwrap() });
    let second = validate_plan("q", &reserialized);
    assert_eq!(second.steps(), &[fallback_step()]);
}

#[test]
fn test_validate_step_reports_reason() {
    let err = validate_step(&json!({"action": "extract_text", "parameters": {"url": "https://a.org"}}))
        .unwrap_err();
    assert!(err.contains("selector"), "got {}", err);
}
