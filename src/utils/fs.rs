//! File system utilities for the persisted shpm layout
//!
//! Every file shpm owns (`config.toml`, `state.toml`, `prelude.sh`) is written
//! with [`atomic_write`]: content goes to a temporary file in the same
//! directory, is flushed to disk, and is then renamed over the target. A crash
//! mid-write therefore leaves either the old or the new content, never a
//! truncated file.

use anyhow::{Context, Result};
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

/// Ensures a directory exists, creating it and its parents if necessary.
///
/// # Errors
///
/// Returns an error if the directory cannot be created or the path exists but
/// is not a directory.
pub fn ensure_dir(path: &Path) -> Result<()> {
    if !path.exists() {
        fs::create_dir_all(path).with_context(|| {
            format!(
                "Failed to create directory: {}\n\nCheck directory permissions and path validity",
                path.display()
            )
        })?;
    } else if !path.is_dir() {
        return Err(anyhow::anyhow!("Path exists but is not a directory: {}", path.display()));
    }
    Ok(())
}

/// Atomically writes `content` to `path`.
///
/// The parent directory is created when missing.
///
/// # Errors
///
/// Returns an error if the temporary file cannot be created, written, synced
/// or renamed into place.
pub fn atomic_write(path: &Path, content: &[u8]) -> Result<()> {
    let parent = path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));
    ensure_dir(parent)?;

    let mut temp = tempfile::NamedTempFile::new_in(parent)
        .with_context(|| format!("Failed to create temp file in: {}", parent.display()))?;

    temp.write_all(content)
        .with_context(|| format!("Failed to write to temp file for: {}", path.display()))?;
    temp.as_file().sync_all().context("Failed to sync file to disk")?;

    temp.persist(path)
        .map_err(|e| e.error)
        .with_context(|| format!("Failed to rename temp file to: {}", path.display()))?;

    Ok(())
}

/// Removes a directory tree if it exists.
///
/// # Errors
///
/// Returns an error if the directory exists but cannot be removed.
pub fn remove_dir_all(path: &Path) -> Result<()> {
    if path.exists() {
        fs::remove_dir_all(path)
            .with_context(|| format!("Failed to remove directory: {}", path.display()))?;
    }
    Ok(())
}

/// Lists the non-hidden subdirectories of `dir`, sorted by name.
///
/// Entries whose names start with `.` (such as `.git`) are skipped, as are
/// names that are not valid UTF-8.
///
/// # Errors
///
/// Returns an error if `dir` cannot be read.
pub fn list_subdirectories(dir: &Path) -> Result<Vec<(String, PathBuf)>> {
    let mut entries = Vec::new();

    for entry in fs::read_dir(dir)
        .with_context(|| format!("Failed to read directory: {}", dir.display()))?
    {
        let entry = entry?;
        let Ok(name) = entry.file_name().into_string() else {
            continue;
        };
        if name.starts_with('.') {
            continue;
        }
        if entry.file_type()?.is_dir() {
            entries.push((name, entry.path()));
        }
    }

    entries.sort_by(|a, b| a.0.cmp(&b.0));
    Ok(entries)
}
