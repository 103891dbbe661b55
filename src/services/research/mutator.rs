//! Plan Mutator
//!
//! Decides, from a completed step's result, which follow-up steps to splice
//! in directly after it. Insertion is deterministic and never calls the model.

use serde_json::Value;

use research_agent_core::{ActionKind, Step};

/// Search results followed up with a fetch and an analysis.
pub const MAX_FOLLOW_UP_URLS: usize = 2;

/// New step sequence with follow-ups inserted after `index`, or `None` when
/// the result calls for no change.
///
/// Steps up to and including `index` are kept as they are. A result of an
/// unexpected shape means no mutation.
pub fn mutate(steps: &[Step], index: usize, result: &Value) -> Option<Vec<Step>> {
    let step = steps.get(index)?;
    let follow_ups = match step.kind() {
        ActionKind::SearchWeb => after_search(steps, index, result)?,
        ActionKind::FetchPage => after_fetch(steps, index, step, result)?,
        _ => return None,
    };
    if follow_ups.is_empty() {
        return None;
    }

    tracing::debug!(step = index, inserted = follow_ups.len(), "inserting follow-up steps");
    let mut grown = Vec::with_capacity(steps.len() + follow_ups.len());
    grown.extend_from_slice(&steps[..=index]);
    grown.extend(follow_ups);
    grown.extend_from_slice(&steps[index + 1..]);
    Some(grown)
}

fn after_search(steps: &[Step], index: usize, result: &Value) -> Option<Vec<Step>> {
    let hits = result.as_array()?;

    let mut urls: Vec<&str> = Vec::new();
    for url in hits
        .iter()
        .filter_map(|hit| hit.get("url").and_then(Value::as_str))
        .map(str::trim)
        .filter(|url| !url.is_empty())
    {
        if !urls.contains(&url) {
            urls.push(url);
        }
        if urls.len() == MAX_FOLLOW_UP_URLS {
            break;
        }
    }

    let remaining = &steps[index + 1..];
    let mut follow_ups = Vec::new();
    for url in urls {
        if already_reads(remaining, url) {
            continue;
        }
        follow_ups.push(Step::for_url(
            ActionKind::FetchPage,
            url,
            "Read a top search result",
        ));
        follow_ups.push(Step::for_url(
            ActionKind::AnalyzePage,
            url,
            "Extract structure from the fetched result",
        ));
    }
    Some(follow_ups)
}

fn after_fetch(steps: &[Step], index: usize, step: &Step, result: &Value) -> Option<Vec<Step>> {
    if result.is_null() {
        return None;
    }
    let url = step.param_str("url")?;
    if steps
        .get(index + 1)
        .is_some_and(|next| next.is_for_url(ActionKind::AnalyzePage, url))
    {
        return None;
    }
    Some(vec![Step::for_url(
        ActionKind::AnalyzePage,
        url,
        "Analyze the fetched page",
    )])
}

/// Whether `steps` already fetch `url` with its analysis right behind.
fn already_reads(steps: &[Step], url: &str) -> bool {
    steps.windows(2).any(|pair| {
        pair[0].is_for_url(ActionKind::FetchPage, url)
            && pair[1].is_for_url(ActionKind::AnalyzePage, url)
    })
}
