//! Cross-Platform Path Utilities
//!
//! Functions for resolving the agent's data directories.
//! Everything lives under `~/.research-agent/` unless `data_dir` is configured.

use std::path::{Path, PathBuf};

use crate::utils::error::{AppError, AppResult};

/// Get the user's home directory
pub fn home_dir() -> AppResult<PathBuf> {
    dirs::home_dir().ok_or_else(|| AppError::config("Could not determine home directory"))
}

/// Get the default data directory (~/.research-agent/)
pub fn default_data_dir() -> AppResult<PathBuf> {
    Ok(home_dir()?.join(".research-agent"))
}

/// Get the config file path inside a data directory
pub fn config_path(data_dir: &Path) -> PathBuf {
    data_dir.join("config.json")
}

/// Get the indexed documents directory
pub fn documents_dir(data_dir: &Path) -> PathBuf {
    data_dir.join("documents")
}

/// Get the saved summaries directory
pub fn summaries_dir(data_dir: &Path) -> PathBuf {
    data_dir.join("summaries")
}

/// Get the memory database path
pub fn memory_db_path(data_dir: &Path) -> PathBuf {
    data_dir.join("memory.db")
}

/// Expand a leading `~/` to the home directory
pub fn expand_home(path: &str) -> PathBuf {
    match path.strip_prefix("~/") {
        Some(rest) => match dirs::home_dir() {
            Some(home) => home.join(rest),
            None => PathBuf::from(path),
        },
        None => PathBuf::from(path),
    }
}

/// Ensure a directory exists, creating it if necessary
pub fn ensure_dir(path: &Path) -> AppResult<()> {
    if !path.exists() {
        std::fs::create_dir_all(path)?;
    }
    Ok(())
}
