//! Cycle-wide advisory lock.
//!
//! Two updater processes running against the same install root would wipe each
//! other's scratch workspace and could observe the live directory mid-swap. A
//! cycle therefore holds an exclusive OS-level lock on `<root>/.update.lock`
//! from before the state is read until the last state write.
//!
//! The lock is advisory (fs4 `flock`/`LockFileEx`) and released automatically
//! when the handle is dropped or the process dies, so a crashed updater never
//! leaves a stale lock behind. A second invocation blocks until the first one
//! finishes, then meets the rate-limit gate and normally skips.

use crate::core::UpdateError;
use crate::utils::fs::ensure_dir;
use fs4::fs_std::FileExt;
use std::fs::{File, OpenOptions};
use std::path::{Path, PathBuf};
use tracing::debug;

/// Exclusive lock on the update cycle of one installation.
#[derive(Debug)]
pub struct UpdateLock {
    file: File,
    path: PathBuf,
}

impl UpdateLock {
    /// Acquire the lock at `lock_path`, waiting for any other holder.
    pub async fn acquire(lock_path: &Path) -> Result<Self, UpdateError> {
        let lock_error = |reason: String| UpdateError::Lock {
            path: lock_path.display().to_string(),
            reason,
        };

        if let Some(parent) = lock_path.parent() {
            ensure_dir(parent).map_err(|e| lock_error(format!("{e:#}")))?;
        }

        let path = lock_path.to_path_buf();
        let blocking_path = path.clone();

        // flock blocks the thread, keep it off the runtime workers
        let file = tokio::task::spawn_blocking(move || -> std::io::Result<File> {
            let file = OpenOptions::new()
                .create(true)
                .write(true)
                .truncate(false)
                .open(&blocking_path)?;
            FileExt::lock_exclusive(&file)?;
            Ok(file)
        })
        .await
        .map_err(|e| lock_error(e.to_string()))?
        .map_err(|e| lock_error(e.to_string()))?;

        debug!("Acquired update lock {}", path.display());
        Ok(Self {
            file,
            path,
        })
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for UpdateLock {
    fn drop(&mut self) {
        // Closing the handle releases the lock as well
        if let Err(e) = FileExt::unlock(&self.file) {
            debug!("Failed to unlock {}: {}", self.path.display(), e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_lock_acquire_and_release() {
        let temp = TempDir::new().unwrap();
        let lock_path = temp.path().join("root").join(".update.lock");

        let lock = UpdateLock::acquire(&lock_path).await.unwrap();
        assert!(lock_path.exists());
        assert_eq!(lock.path(), lock_path);
        drop(lock);

        // Reacquirable once released
        let _again = UpdateLock::acquire(&lock_path).await.unwrap();
    }

    #[tokio::test]
    async fn test_lock_is_exclusive() {
        use std::sync::Arc;
        use std::time::{Duration, Instant};
        use tokio::sync::Barrier;

        let temp = TempDir::new().unwrap();
        let lock_path = Arc::new(temp.path().join(".update.lock"));
        let barrier = Arc::new(Barrier::new(2));

        let holder_path = lock_path.clone();
        let holder_barrier = barrier.clone();
        let holder = tokio::spawn(async move {
            let _lock = UpdateLock::acquire(&holder_path).await.unwrap();
            holder_barrier.wait().await;
            tokio::time::sleep(Duration::from_millis(150)).await;
        });

        barrier.wait().await;
        let start = Instant::now();
        let _lock = UpdateLock::acquire(&lock_path).await.unwrap();
        assert!(start.elapsed() >= Duration::from_millis(100));

        holder.await.unwrap();
    }
}
