//! Filesystem utilities.

use std::fs;
use std::path::Path;
use std::time::SystemTime;

use anyhow::{Context, Result};

/// Remove a file or directory tree, if it exists.
pub fn remove_path_if_exists(path: &Path) -> Result<()> {
    match fs::symlink_metadata(path) {
        Ok(meta) if meta.is_dir() => fs::remove_dir_all(path)
            .with_context(|| format!("failed to remove directory: {}", path.display())),
        Ok(_) => fs::remove_file(path)
            .with_context(|| format!("failed to remove file: {}", path.display())),
        Err(_) => Ok(()),
    }
}

/// Ensure a directory exists, creating it if necessary.
pub fn ensure_dir(path: &Path) -> Result<()> {
    if !path.exists() {
        fs::create_dir_all(path)
            .with_context(|| format!("failed to create directory: {}", path.display()))?;
    }
    Ok(())
}

/// Write a string to a file, creating parent directories if needed.
pub fn write_string(path: &Path, contents: &str) -> Result<()> {
    if let Some(parent) = path.parent() {
        ensure_dir(parent)?;
    }
    fs::write(path, contents).with_context(|| format!("failed to write file: {}", path.display()))
}

/// Set a file's modification time.
pub fn set_mtime(path: &Path, mtime: SystemTime) -> Result<()> {
    let file = fs::OpenOptions::new()
        .write(true)
        .open(path)
        .with_context(|| format!("failed to open file: {}", path.display()))?;
    file.set_modified(mtime)
        .with_context(|| format!("failed to set modification time: {}", path.display()))
}
