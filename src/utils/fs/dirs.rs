//! Directory operations for creating and removing directories.

use anyhow::{Context, Result};
use std::fs;
use std::path::Path;
use tracing::warn;

/// Create `path` and its parents if missing.
///
/// Fails when `path` exists but is not a directory.
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

/// Recursively remove `path` if it exists.
pub fn remove_dir_all(path: &Path) -> Result<()> {
    if path.exists() {
        fs::remove_dir_all(path)
            .with_context(|| format!("Failed to remove directory: {}", path.display()))?;
    }
    Ok(())
}

/// Remove `path` if it exists, logging instead of failing.
///
/// Returns whether the path is gone afterwards.
pub fn remove_dir_best_effort(path: &Path) -> bool {
    match remove_dir_all(path) {
        Ok(()) => true,
        Err(e) => {
            warn!("{e:#}");
            false
        }
    }
}
