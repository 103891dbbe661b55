//! Document Text Extraction
//!
//! Turns supported local files into plain text for indexing.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{ToolError, ToolResult};

/// Maximum file size accepted for indexing (50MB)
const MAX_DOC_SIZE: u64 = 50 * 1024 * 1024;

const CODE_EXTENSIONS: &[&str] = &[
    "rs", "py", "js", "ts", "java", "c", "h", "cpp", "hpp", "go", "rb", "sh", "toml", "yaml", "yml",
];

/// Kinds of files the document index can read.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DocType {
    Text,
    Markdown,
    Csv,
    Json,
    Html,
    Pdf,
    Docx,
    Code,
}

impl DocType {
    pub fn from_path(path: &Path) -> Option<Self> {
        let ext = path.extension()?.to_str()?.to_ascii_lowercase();
        let doc_type = match ext.as_str() {
            "txt" | "text" | "log" => DocType::Text,
            "md" | "markdown" => DocType::Markdown,
            "csv" | "tsv" => DocType::Csv,
            "json" => DocType::Json,
            "html" | "htm" => DocType::Html,
            "pdf" => DocType::Pdf,
            "docx" => DocType::Docx,
            other if CODE_EXTENSIONS.contains(&other) => DocType::Code,
            _ => return None,
        };
        Some(doc_type)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            DocType::Text => "text",
            DocType::Markdown => "markdown",
            DocType::Csv => "csv",
            DocType::Json => "json",
            DocType::Html => "html",
            DocType::Pdf => "pdf",
            DocType::Docx => "docx",
            DocType::Code => "code",
        }
    }
}

fn check_file_size(path: &Path) -> ToolResult<()> {
    let size = std::fs::metadata(path)?.len();
    if size > MAX_DOC_SIZE {
        return Err(ToolError::TooLarge(size));
    }
    Ok(())
}

/// Extract the text of a supported file.
pub fn extract_text(path: &Path) -> ToolResult<(DocType, String)> {
    let doc_type = DocType::from_path(path)
        .ok_or_else(|| ToolError::UnsupportedFormat(path.display().to_string()))?;
    check_file_size(path)?;

    let text = match doc_type {
        DocType::Pdf => parse_pdf(path)?,
        DocType::Docx => parse_docx(path)?,
        DocType::Html => {
            let raw = std::fs::read_to_string(path)?;
            let doc = scraper::Html::parse_document(&raw);
            crate::html::visible_text(&doc)
        }
        DocType::Json => {
            let raw = std::fs::read_to_string(path)?;
            match serde_json::from_str::<serde_json::Value>(&raw) {
                Ok(value) => serde_json::to_string_pretty(&value)?,
                Err(_) => raw,
            }
        }
        DocType::Text | DocType::Markdown | DocType::Csv | DocType::Code => {
            let bytes = std::fs::read(path)?;
            String::from_utf8_lossy(&bytes).to_string()
        }
    };
    Ok((doc_type, text))
}

/// Extract PDF text; pages are separated by form feeds.
fn parse_pdf(path: &Path) -> ToolResult<String> {
    let text = pdf_extract::extract_text(path)
        .map_err(|e| ToolError::parse(format!("Failed to extract PDF text: {}", e)))?;
    let pages: Vec<&str> = text
        .split('\x0c')
        .map(str::trim)
        .filter(|p| !p.is_empty())
        .collect();
    Ok(pages.join("\n\n"))
}

/// Extract DOCX paragraphs from `word/document.xml` inside the archive.
fn parse_docx(path: &Path) -> ToolResult<String> {
    let file = std::fs::File::open(path)?;
    let mut archive = zip::ZipArchive::new(file)
        .map_err(|e| ToolError::parse(format!("Failed to read DOCX as ZIP: {}", e)))?;

    let mut doc_xml = String::new();
    {
        let mut entry = archive
            .by_name("word/document.xml")
            .map_err(|_| ToolError::parse("Invalid DOCX: missing word/document.xml"))?;
        std::io::Read::read_to_string(&mut entry, &mut doc_xml)?;
    }

    docx_xml_text(&doc_xml)
}

fn docx_xml_text(doc_xml: &str) -> ToolResult<String> {
    use quick_xml::events::Event;

    let mut reader = quick_xml::Reader::from_str(doc_xml);
    let mut paragraphs: Vec<String> = Vec::new();
    let mut current = String::new();
    let mut in_text = false;
    let mut buf = Vec::new();

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(ref e)) => {
                let local = e.local_name();
                match local.as_ref() {
                    b"p" => current.clear(),
                    b"t" => in_text = true,
                    _ => {}
                }
            }
            Ok(Event::End(ref e)) => {
                let local = e.local_name();
                match local.as_ref() {
                    b"p" => {
                        if !current.trim().is_empty() {
                            paragraphs.push(current.trim().to_string());
                        }
                        current.clear();
                    }
                    b"t" => in_text = false,
                    _ => {}
                }
            }
            Ok(Event::Text(ref e)) if in_text => {
                if let Ok(text) = e.unescape() {
                    current.push_str(&text);
                }
            }
            Ok(Event::Eof) => break,
            Err(e) => return Err(ToolError::parse(format!("XML parse error: {}", e))),
            _ => {}
        }
        buf.clear();
    }

    Ok(paragraphs.join("\n\n"))
}
