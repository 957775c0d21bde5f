//! Path helpers for user-supplied file arguments

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};

/// Resolve `~`, `~/…` and relative paths against the home and working
/// directories. Absolute paths are returned as given; nothing is canonicalized.
pub fn expand_path(path: &str) -> PathBuf {
    let path = path.trim();
    let expanded = match path {
        "" => PathBuf::from("."),
        "~" => dirs::home_dir().unwrap_or_else(|| PathBuf::from(path)),
        _ => match (path.strip_prefix("~/"), dirs::home_dir()) {
            (Some(rest), Some(home)) => home.join(rest),
            _ => PathBuf::from(path),
        },
    };

    if expanded.is_absolute() {
        return expanded;
    }
    match std::env::current_dir() {
        Ok(cwd) => cwd.join(expanded),
        Err(_) => expanded,
    }
}

/// Read a UTF-8 text file named on the command line
pub fn read_text(path: &Path) -> Result<String> {
    let expanded = expand_path(&path.to_string_lossy());
    fs::read_to_string(&expanded)
        .with_context(|| format!("Failed to read file: {}", expanded.display()))
}
