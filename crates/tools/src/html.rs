//! HTML Extraction
//!
//! Title, visible text, links, selector text, and structural outline from a
//! parsed document.

use std::collections::HashSet;
use std::sync::OnceLock;

use regex::Regex;
use scraper::{ElementRef, Html, Node, Selector};
use url::Url;

use crate::error::{ToolError, ToolResult};
use crate::web::{Heading, Link, PageStructure};

/// Elements whose text never counts as page content.
const SKIPPED_TAGS: &[&str] = &[
    "script", "style", "noscript", "template", "svg", "nav", "header", "footer", "aside", "form",
];

const MAX_HEADINGS: usize = 50;
const MAX_LISTS: usize = 20;
const MAX_TABLES: usize = 10;

pub fn compact_ws(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn text_content(elem: ElementRef<'_>) -> String {
    compact_ws(&elem.text().collect::<Vec<_>>().join(" "))
}

fn first_match<'a>(doc: &'a Html, selector: &str) -> Option<ElementRef<'a>> {
    let sel = Selector::parse(selector).ok()?;
    doc.select(&sel).next()
}

pub fn page_title(doc: &Html) -> String {
    first_match(doc, "title")
        .or_else(|| first_match(doc, "h1"))
        .map(text_content)
        .unwrap_or_default()
}

/// Visible text of the document body, one fragment per line.
pub fn visible_text(doc: &Html) -> String {
    let root = first_match(doc, "body").unwrap_or_else(|| doc.root_element());
    let mut fragments = Vec::new();
    collect_visible(root, &mut fragments);
    fragments.join("\n")
}

fn collect_visible(elem: ElementRef<'_>, out: &mut Vec<String>) {
    for child in elem.children() {
        match child.value() {
            Node::Text(text) => {
                let compacted = compact_ws(text);
                if !compacted.is_empty() {
                    out.push(compacted);
                }
            }
            Node::Element(el) => {
                if SKIPPED_TAGS.contains(&el.name()) {
                    continue;
                }
                if let Some(child_elem) = ElementRef::wrap(child) {
                    collect_visible(child_elem, out);
                }
            }
            _ => {}
        }
    }
}

/// Paragraph and list-item text from the most content-like container.
pub fn main_content(doc: &Html) -> String {
    let root = first_match(doc, "article")
        .or_else(|| first_match(doc, "main"))
        .or_else(|| first_match(doc, "body"));
    let (Some(root), Ok(block_sel)) = (root, Selector::parse("p, li")) else {
        return visible_text(doc);
    };

    let blocks: Vec<String> = root
        .select(&block_sel)
        .map(text_content)
        .filter(|t| !t.is_empty())
        .collect();

    if blocks.is_empty() {
        visible_text(doc)
    } else {
        blocks.join("\n\n")
    }
}

/// Absolute http(s) links in document order.
pub fn links(doc: &Html, base: &Url) -> Vec<Link> {
    let Ok(anchor_sel) = Selector::parse("a[href]") else {
        return Vec::new();
    };

    doc.select(&anchor_sel)
        .filter_map(|anchor| {
            let href = anchor.value().attr("href")?.trim();
            let lower = href.to_ascii_lowercase();
            if href.is_empty()
                || href.starts_with('#')
                || lower.starts_with("javascript:")
                || lower.starts_with("mailto:")
            {
                return None;
            }
            let resolved = base.join(href).ok()?;
            if !matches!(resolved.scheme(), "http" | "https") {
                return None;
            }
            Some(Link {
                url: resolved.to_string(),
                text: text_content(anchor),
            })
        })
        .collect()
}

/// Text of every element matching `selector`, one per line.
pub fn select_text(doc: &Html, selector: &str) -> ToolResult<String> {
    let sel =
        Selector::parse(selector).map_err(|_| ToolError::InvalidSelector(selector.to_string()))?;
    let texts: Vec<String> = doc
        .select(&sel)
        .map(text_content)
        .filter(|t| !t.is_empty())
        .collect();
    Ok(texts.join("\n"))
}

pub fn structure(doc: &Html) -> PageStructure {
    let mut outline = PageStructure::default();

    if let Ok(sel) = Selector::parse("h1, h2, h3, h4, h5, h6") {
        outline.headings = doc
            .select(&sel)
            .filter_map(|h| {
                let level = h.value().name().get(1..)?.parse().ok()?;
                let text = text_content(h);
                (!text.is_empty()).then_some(Heading { level, text })
            })
            .take(MAX_HEADINGS)
            .collect();
    }

    if let Ok(sel) = Selector::parse("ul, ol") {
        outline.lists = doc
            .select(&sel)
            .map(|list| {
                list.children()
                    .filter_map(ElementRef::wrap)
                    .filter(|item| item.value().name() == "li")
                    .map(text_content)
                    .filter(|t| !t.is_empty())
                    .collect::<Vec<_>>()
            })
            .filter(|items| !items.is_empty())
            .take(MAX_LISTS)
            .collect();
    }

    if let (Ok(table_sel), Ok(row_sel), Ok(cell_sel)) = (
        Selector::parse("table"),
        Selector::parse("tr"),
        Selector::parse("th, td"),
    ) {
        outline.tables = doc
            .select(&table_sel)
            .map(|table| {
                table
                    .select(&row_sel)
                    .map(|row| row.select(&cell_sel).map(text_content).collect::<Vec<_>>())
                    .filter(|cells| !cells.is_empty())
                    .collect::<Vec<_>>()
            })
            .filter(|rows| !rows.is_empty())
            .take(MAX_TABLES)
            .collect();
    }

    outline
}

fn date_patterns() -> &'static [Regex] {
    static PATTERNS: OnceLock<Vec<Regex>> = OnceLock::new();
    PATTERNS.get_or_init(|| {
        const MONTHS: &str =
            "January|February|March|April|May|June|July|August|September|October|November|December";
        [
            r"\b\d{4}-\d{2}-\d{2}\b".to_string(),
            format!(r"\b(?:{MONTHS})\s+\d{{1,2}},\s+\d{{4}}\b"),
            format!(r"\b\d{{1,2}}\s+(?:{MONTHS})\s+\d{{4}}\b"),
        ]
        .iter()
        .filter_map(|p| Regex::new(p).ok())
        .collect()
    })
}

/// Dates mentioned in `text`, deduplicated in order of first appearance.
pub fn extract_dates(text: &str) -> Vec<String> {
    let mut found: Vec<(usize, String)> = Vec::new();
    for pattern in date_patterns() {
        for m in pattern.find_iter(text) {
            found.push((m.start(), m.as_str().to_string()));
        }
    }
    found.sort_by_key(|(pos, _)| *pos);

    let mut seen = HashSet::new();
    found
        .into_iter()
        .filter_map(|(_, date)| seen.insert(date.clone()).then_some(date))
        .collect()
}
