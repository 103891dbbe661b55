//! Local-Resource Resolver
//!
//! A step's `url` may name a local document rather than a web page. This
//! module decides which, and finds the file through an ordered chain of
//! lookups. Resolution never fails; a miss comes back as
//! [`Resolution::Unresolved`].

use std::path::{Path, PathBuf};
use std::sync::Arc;

use research_agent_tools::DocumentTool;

/// File extensions that may denote a local document behind a web URL.
pub const DOCUMENT_EXTENSIONS: &[&str] = &["txt", "pdf", "md", "json", "csv", "docx"];

const WEB_SCHEMES: &[&str] = &["http://", "https://", "ftp://"];
const FILE_SCHEME: &str = "file://";

/// Where a resource lives.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResourceClass {
    Local,
    Remote,
}

/// Outcome of resolving a local resource.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution {
    Found(PathBuf),
    /// Best-effort name of what was looked for.
    Unresolved(String),
}

/// Resolves nominal URLs against an ordered list of candidate directories.
pub struct LocalResourceResolver {
    candidate_dirs: Vec<PathBuf>,
    catalog: Option<Arc<dyn DocumentTool>>,
}

impl LocalResourceResolver {
    /// `candidate_dirs` are searched in order; earlier directories win.
    pub fn new(candidate_dirs: Vec<PathBuf>) -> Self {
        Self {
            candidate_dirs,
            catalog: None,
        }
    }

    /// Fall back to the document index when the filesystem search misses.
    pub fn with_catalog(mut self, catalog: Arc<dyn DocumentTool>) -> Self {
        self.catalog = Some(catalog);
        self
    }

    /// Standard search order: the document store, then the working
    /// directory and its usual document folders, then the user's folders.
    pub fn default_dirs(documents_dir: &Path) -> Vec<PathBuf> {
        let mut candidates = vec![documents_dir.to_path_buf()];
        if let Ok(cwd) = std::env::current_dir() {
            candidates.push(cwd.join("documents"));
            candidates.push(cwd.join("docs"));
            candidates.push(cwd.join("data"));
            candidates.push(cwd);
        }
        if let Some(home) = dirs::home_dir() {
            candidates.push(home.join("Documents"));
            candidates.push(home.join("Downloads"));
        }
        candidates
    }

    pub fn candidate_dirs(&self) -> &[PathBuf] {
        &self.candidate_dirs
    }

    /// Classify a nominal URL.
    ///
    /// Web URLs are remote unless their path ends in a document extension
    /// and a file of that name exists in a candidate directory. URLs without
    /// such an extension are always remote. Non-web strings are local.
    pub fn classify(&self, url: &str) -> ResourceClass {
        let url = url.trim();
        if !has_web_scheme(url) {
            return ResourceClass::Local;
        }
        match web_document_name(url) {
            Some(name) if self.find_in_candidates(&name).is_some() => ResourceClass::Local,
            _ => ResourceClass::Remote,
        }
    }

    /// Find the file a nominal URL or path refers to.
    ///
    /// Order: literal path, candidate directories, their immediate
    /// subdirectories, then the document index. The first hit wins.
    pub async fn resolve(&self, target: &str) -> Resolution {
        let target = target.trim();

        let literal = match target.strip_prefix(FILE_SCHEME) {
            Some(rest) => Some(PathBuf::from(percent_decode(rest))),
            None if !has_web_scheme(target) => Some(PathBuf::from(target)),
            None => None,
        };
        if let Some(path) = literal.as_ref().filter(|p| p.is_file()) {
            return Resolution::Found(path.clone());
        }

        let name = match (&literal, has_web_scheme(target)) {
            (_, true) => web_file_name(target),
            (Some(path), false) => path
                .file_name()
                .map(|n| n.to_string_lossy().to_string()),
            (None, false) => None,
        };
        let Some(name) = name.filter(|n| !n.is_empty()) else {
            return Resolution::Unresolved(target.to_string());
        };

        if let Some(path) = self.find_in_candidates(&name) {
            return Resolution::Found(path);
        }
        if let Some(path) = self.find_in_subdirs(&name) {
            return Resolution::Found(path);
        }

        if let Some(catalog) = &self.catalog {
            match catalog.locate(&name).await {
                Ok(Some(path)) if path.is_file() => return Resolution::Found(path),
                Ok(_) => {}
                Err(e) => tracing::warn!(name = %name, error = %e, "document index lookup failed"),
            }
        }

        tracing::debug!(resource = target, name = %name, "local resource not found");
        Resolution::Unresolved(name)
    }

    fn find_in_candidates(&self, name: &str) -> Option<PathBuf> {
        self.candidate_dirs
            .iter()
            .find_map(|dir| find_in_dir(dir, name))
    }

    fn find_in_subdirs(&self, name: &str) -> Option<PathBuf> {
        self.candidate_dirs.iter().find_map(|dir| {
            sorted_subdirs(dir)
                .into_iter()
                .find_map(|sub| find_in_dir(&sub, name))
        })
    }
}

fn has_web_scheme(url: &str) -> bool {
    let lower = url.to_ascii_lowercase();
    WEB_SCHEMES.iter().any(|scheme| lower.starts_with(scheme))
}

fn percent_decode(raw: &str) -> String {
    urlencoding::decode(raw)
        .map(|s| s.into_owned())
        .unwrap_or_else(|_| raw.to_string())
}

/// Last path segment of a web URL, percent-decoded.
fn web_file_name(url: &str) -> Option<String> {
    let parsed = url::Url::parse(url).ok()?;
    let segment = parsed.path_segments()?.next_back()?;
    Some(percent_decode(segment))
}

/// Last path segment of a web URL when it carries a document extension.
fn web_document_name(url: &str) -> Option<String> {
    let name = web_file_name(url)?;
    let ext = Path::new(&name).extension()?.to_str()?.to_ascii_lowercase();
    DOCUMENT_EXTENSIONS
        .contains(&ext.as_str())
        .then_some(name)
}

/// `dir/name`, or the alphabetically first case-insensitive match.
fn find_in_dir(dir: &Path, name: &str) -> Option<PathBuf> {
    let exact = dir.join(name);
    if exact.is_file() {
        return Some(exact);
    }

    let entries = std::fs::read_dir(dir).ok()?;
    let mut matches: Vec<PathBuf> = entries
        .filter_map(|entry| entry.ok())
        .filter(|entry| entry.file_name().to_string_lossy().eq_ignore_ascii_case(name))
        .map(|entry| entry.path())
        .filter(|path| path.is_file())
        .collect();
    matches.sort();
    matches.into_iter().next()
}

fn sorted_subdirs(dir: &Path) -> Vec<PathBuf> {
    let Ok(entries) = std::fs::read_dir(dir) else {
        return Vec::new();
    };
    let mut subdirs: Vec<PathBuf> = entries
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.path())
        .filter(|path| path.is_dir())
        .collect();
    subdirs.sort();
    subdirs
}
