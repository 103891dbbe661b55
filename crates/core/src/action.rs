//! Action Registry
//!
//! Static catalogue of the action kinds a research plan may contain, the
//! parameters each kind requires, and where in a plan it may appear.

use serde::{Deserialize, Serialize};

// ============================================================================
// ActionKind
// ============================================================================

/// Closed set of actions a plan step can perform.
///
/// The serialized form is the wire name the model emits in plan JSON.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ActionKind {
    #[serde(rename = "search_web")]
    SearchWeb,
    #[serde(rename = "fetch_webpage", alias = "fetch_page")]
    FetchPage,
    #[serde(rename = "extract_links")]
    ExtractLinks,
    #[serde(rename = "extract_text", alias = "extract_selector")]
    ExtractSelector,
    #[serde(rename = "analyze_webpage", alias = "analyze_page")]
    AnalyzePage,
    #[serde(rename = "search_documents")]
    SearchDocuments,
    #[serde(rename = "get_document_summary")]
    GetDocumentSummary,
    #[serde(rename = "generate_summary")]
    GenerateSummary,
    #[serde(rename = "ask_user")]
    AskUser,
}

/// Where a step of a given kind may sit inside a plan.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PositionConstraint {
    /// No restriction.
    Any,
    /// Expected to be the final step.
    Last,
}

impl ActionKind {
    /// Every action kind, in catalogue order.
    pub const ALL: [ActionKind; 9] = [
        ActionKind::SearchWeb,
        ActionKind::FetchPage,
        ActionKind::ExtractLinks,
        ActionKind::ExtractSelector,
        ActionKind::AnalyzePage,
        ActionKind::SearchDocuments,
        ActionKind::GetDocumentSummary,
        ActionKind::GenerateSummary,
        ActionKind::AskUser,
    ];

    /// Wire name used in plan JSON and execution context keys.
    pub fn as_str(&self) -> &'static str {
        match self {
            ActionKind::SearchWeb => "search_web",
            ActionKind::FetchPage => "fetch_webpage",
            ActionKind::ExtractLinks => "extract_links",
            ActionKind::ExtractSelector => "extract_text",
            ActionKind::AnalyzePage => "analyze_webpage",
            ActionKind::SearchDocuments => "search_documents",
            ActionKind::GetDocumentSummary => "get_document_summary",
            ActionKind::GenerateSummary => "generate_summary",
            ActionKind::AskUser => "ask_user",
        }
    }

    /// Look up an action by wire name or alias.
    ///
    /// Matching ignores ASCII case and surrounding whitespace. Unknown names
    /// yield `None`.
    pub fn parse(name: &str) -> Option<Self> {
        let normalized = name.trim().to_ascii_lowercase();
        let kind = match normalized.as_str() {
            "search_web" => ActionKind::SearchWeb,
            "fetch_webpage" | "fetch_page" => ActionKind::FetchPage,
            "extract_links" => ActionKind::ExtractLinks,
            "extract_text" | "extract_selector" => ActionKind::ExtractSelector,
            "analyze_webpage" | "analyze_page" => ActionKind::AnalyzePage,
            "search_documents" => ActionKind::SearchDocuments,
            "get_document_summary" => ActionKind::GetDocumentSummary,
            "generate_summary" => ActionKind::GenerateSummary,
            "ask_user" => ActionKind::AskUser,
            _ => return None,
        };
        Some(kind)
    }

    /// Whether `name` denotes a registered action.
    pub fn is_known(name: &str) -> bool {
        Self::parse(name).is_some()
    }

    /// Parameter keys that must be present and non-empty.
    pub fn required_params(&self) -> &'static [&'static str] {
        match self {
            ActionKind::SearchWeb | ActionKind::SearchDocuments => &["query"],
            ActionKind::FetchPage | ActionKind::ExtractLinks | ActionKind::AnalyzePage => {
                &["url"]
            }
            ActionKind::ExtractSelector => &["url", "selector"],
            ActionKind::GetDocumentSummary => &["file_path"],
            ActionKind::AskUser => &["question"],
            ActionKind::GenerateSummary => &[],
        }
    }

    pub fn position(&self) -> PositionConstraint {
        match self {
            ActionKind::GenerateSummary => PositionConstraint::Last,
            _ => PositionConstraint::Any,
        }
    }

    /// Whether the step's `url` parameter names the resource it operates on.
    pub fn targets_url(&self) -> bool {
        matches!(
            self,
            ActionKind::FetchPage
                | ActionKind::ExtractLinks
                | ActionKind::ExtractSelector
                | ActionKind::AnalyzePage
        )
    }

    /// One-line description used when prompting for plans.
    pub fn description(&self) -> &'static str {
        match self {
            ActionKind::SearchWeb => "Search the web for information",
            ActionKind::FetchPage => "Fetch and read the content of a webpage",
            ActionKind::ExtractLinks => "List the links found on a webpage",
            ActionKind::ExtractSelector => "Extract text matching a CSS selector from a webpage",
            ActionKind::AnalyzePage => {
                "Analyze a webpage's structure (headings, lists, tables, dates)"
            }
            ActionKind::SearchDocuments => "Search the local document collection",
            ActionKind::GetDocumentSummary => "Summarize a local document by id or path",
            ActionKind::GenerateSummary => "Write the final answer from gathered results",
            ActionKind::AskUser => "Ask the user a clarifying question",
        }
    }
}

impl std::fmt::Display for ActionKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
