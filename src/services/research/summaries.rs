//! Summaries Archive
//!
//! Saves research answers as Markdown files named
//! `<YYYYmmdd_HHMMSS>_<slug>.md`.

use std::path::{Path, PathBuf};

use chrono::{DateTime, Local, TimeZone};

use crate::utils::error::{AppError, AppResult};
use crate::utils::paths::ensure_dir;

const SLUG_CHARS: usize = 50;

/// A saved summary file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SavedSummary {
    pub filename: String,
    pub path: PathBuf,
}

/// Markdown archive of research answers.
#[derive(Debug, Clone)]
pub struct SummaryArchive {
    dir: PathBuf,
}

impl SummaryArchive {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Save `summary` for `query`, stamped with the current local time.
    pub fn save(&self, query: &str, summary: &str) -> AppResult<PathBuf> {
        self.save_at(query, summary, Local::now())
    }

    pub fn save_at<Tz: TimeZone>(&self, query: &str, summary: &str, at: DateTime<Tz>) -> AppResult<PathBuf>
    where
        Tz::Offset: std::fmt::Display,
    {
        ensure_dir(&self.dir)?;
        let mut filename = format!("{}_{}.md", at.format("%Y%m%d_%H%M%S"), slugify(query));
        let mut path = self.dir.join(&filename);
        let mut n = 2;
        while path.exists() {
            filename = format!("{}_{}-{}.md", at.format("%Y%m%d_%H%M%S"), slugify(query), n);
            path = self.dir.join(&filename);
            n += 1;
        }

        let content = format!(
            "# Research: {}\n\n*Generated: {}*\n\n{}\n",
            query,
            at.format("%Y-%m-%d %H:%M:%S"),
            summary
        );
        std::fs::write(&path, content)?;
        tracing::info!(path = %path.display(), "summary saved");
        Ok(path)
    }

    /// Saved summaries, newest first.
    pub fn list(&self) -> AppResult<Vec<SavedSummary>> {
        if !self.dir.exists() {
            return Ok(Vec::new());
        }
        let mut summaries: Vec<SavedSummary> = std::fs::read_dir(&self.dir)?
            .filter_map(|entry| entry.ok())
            .map(|entry| entry.path())
            .filter(|path| path.is_file() && path.extension().is_some_and(|e| e == "md"))
            .filter_map(|path| {
                let filename = path.file_name()?.to_string_lossy().to_string();
                Some(SavedSummary { filename, path })
            })
            .collect();
        summaries.sort_by(|a, b| b.filename.cmp(&a.filename));
        Ok(summaries)
    }

    /// Content of a saved summary by file name.
    pub fn view(&self, filename: &str) -> AppResult<String> {
        if filename.contains('/') || filename.contains('\\') || filename.contains("..") {
            return Err(AppError::validation(format!(
                "summary name must be a plain file name: {}",
                filename
            )));
        }
        let path = self.dir.join(filename);
        if !path.is_file() {
            return Err(AppError::not_found(format!("summary {}", filename)));
        }
        Ok(std::fs::read_to_string(path)?)
    }
}

/// Lowercase file-name slug: alphanumerics kept, runs of anything else
/// become a single `-`.
pub fn slugify(query: &str) -> String {
    let mut slug = String::new();
    for c in query.chars().take(SLUG_CHARS) {
        if c.is_alphanumeric() {
            slug.extend(c.to_lowercase());
        } else if !slug.ends_with('-') {
            slug.push('-');
        }
    }
    let slug = slug.trim_matches('-').to_string();
    if slug.is_empty() {
        "research".to_string()
    } else {
        slug
    }
}
