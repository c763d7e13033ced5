//! Scratch workspace with RAII cleanup.
//!
//! Unlike a random temp directory, the scratch workspace lives at a fixed path
//! inside the install root so that downloads and extracted trees sit on the same
//! volume as the live application directory and can be renamed into place.

use crate::utils::fs::dirs::{ensure_dir, remove_dir_all, remove_dir_best_effort};
use anyhow::Result;
use std::path::{Path, PathBuf};
use tracing::debug;

/// A directory that is wiped on creation and removed on drop.
#[derive(Debug)]
pub struct ScratchDir {
    path: PathBuf,
}

impl ScratchDir {
    /// Remove whatever is at `path` and recreate it empty.
    pub fn recreate(path: &Path) -> Result<Self> {
        remove_dir_all(path)?;
        ensure_dir(path)?;
        debug!("Created scratch workspace at {}", path.display());

        Ok(Self {
            path: path.to_path_buf(),
        })
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for ScratchDir {
    fn drop(&mut self) {
        if remove_dir_best_effort(&self.path) {
            debug!("Removed scratch workspace at {}", self.path.display());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_scratch_dir_recreated_empty_and_removed_on_drop() {
        let temp = tempdir().unwrap();
        let path = temp.path().join(".update-scratch");
        std::fs::create_dir_all(path.join("stale")).unwrap();
        std::fs::write(path.join("stale/partial.zip"), "half").unwrap();

        let scratch = ScratchDir::recreate(&path).unwrap();
        assert!(scratch.path().is_dir());
        assert_eq!(std::fs::read_dir(scratch.path()).unwrap().count(), 0);

        std::fs::write(scratch.path().join("download.zip"), "bytes").unwrap();
        drop(scratch);
        assert!(!path.exists());
    }
}
