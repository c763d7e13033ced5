//! Rename-based replacement of the live application directory.
//!
//! A swap is a fixed sequence of renames inside the install root:
//!
//! ```text
//! 1. stage    <scratch>/<project>  ->  <root>/app.new
//! 2. backup   <root>/app           ->  <root>/app.old
//! 3. promote  <root>/app.new       ->  <root>/app
//! 4. cleanup  remove <root>/app.old
//! ```
//!
//! Every rename is atomic as long as source and destination are on the same
//! volume, which the installer guarantees by keeping the scratch workspace in
//! the install root. Between steps 2 and 3 the live path does not exist; a
//! [`RollbackGuard`] is armed for exactly that window and renames the backup
//! back into place on every abnormal exit, including a panic.

use crate::config::UpdaterConfig;
use crate::core::UpdateError;
use crate::utils::fs::{remove_dir_all, remove_dir_best_effort};
use std::fmt;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use tracing::{debug, error, info, warn};

/// Individual steps of a swap, used in errors and for fault injection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SwapStep {
    /// Move the candidate tree to the staging name.
    Stage,
    /// Move the live tree to the backup name.
    Backup,
    /// Move the staged tree to the live name.
    Promote,
    /// Delete the backup.
    Cleanup,
    /// Move the backup back to the live name after a failure.
    Restore,
}

impl fmt::Display for SwapStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Stage => "stage",
            Self::Backup => "backup",
            Self::Promote => "promote",
            Self::Cleanup => "cleanup",
            Self::Restore => "restore",
        };
        f.write_str(name)
    }
}

/// Performs the swap between a freshly extracted tree and the live directory.
#[derive(Debug, Clone)]
pub struct DirectorySwapper {
    staging: PathBuf,
    backup: PathBuf,
    #[cfg(any(test, feature = "test-utils"))]
    faults: Vec<SwapStep>,
}

impl DirectorySwapper {
    /// Swapper using the staging and backup names of `config`.
    pub fn new(config: &UpdaterConfig) -> Self {
        Self::with_paths(config.staging_dir(), config.backup_dir())
    }

    pub fn with_paths(staging: impl Into<PathBuf>, backup: impl Into<PathBuf>) -> Self {
        Self {
            staging: staging.into(),
            backup: backup.into(),
            #[cfg(any(test, feature = "test-utils"))]
            faults: Vec::new(),
        }
    }

    /// Make `step` fail with an injected I/O error.
    #[cfg(any(test, feature = "test-utils"))]
    #[must_use]
    pub fn fail_at(mut self, step: SwapStep) -> Self {
        self.faults.push(step);
        self
    }

    #[must_use]
    pub fn staging_dir(&self) -> &Path {
        &self.staging
    }

    #[must_use]
    pub fn backup_dir(&self) -> &Path {
        &self.backup
    }

    /// Replace `live_dir` with `new_dir`.
    ///
    /// On failure the previous installation is back at `live_dir`
    /// ([`UpdateError::Swap`]) unless restoring it failed as well
    /// ([`UpdateError::RollbackFailed`]).
    pub fn swap(&self, new_dir: &Path, live_dir: &Path) -> Result<(), UpdateError> {
        info!("Swapping {} into {}", new_dir.display(), live_dir.display());

        // 1. stage
        self.run_step(SwapStep::Stage, || {
            remove_dir_all(&self.staging).map_err(io::Error::other)?;
            fs::rename(new_dir, &self.staging)
        })
        .map_err(|e| swap_error(SwapStep::Stage, &e))?;
        debug!("Staged new version at {}", self.staging.display());

        // 2. backup
        let backed_up = self.run_step(SwapStep::Backup, || {
            remove_dir_all(&self.backup).map_err(io::Error::other)?;
            if live_dir.exists() {
                fs::rename(live_dir, &self.backup)?;
            }
            Ok(())
        });
        if let Err(e) = backed_up {
            remove_dir_best_effort(&self.staging);
            return Err(swap_error(SwapStep::Backup, &e));
        }
        debug!("Moved previous version to {}", self.backup.display());

        // 3. promote, guarded
        let guard = RollbackGuard::arm(self, live_dir);
        if let Err(e) = self.run_step(SwapStep::Promote, || fs::rename(&self.staging, live_dir)) {
            error!("Failed to promote {}: {e}", self.staging.display());
            let restored = guard.restore();
            remove_dir_best_effort(&self.staging);

            return Err(match restored {
                Ok(()) => swap_error(SwapStep::Promote, &e),
                Err(rollback) => UpdateError::RollbackFailed {
                    step: SwapStep::Promote.to_string(),
                    reason: e.to_string(),
                    rollback_reason: rollback.to_string(),
                    live_dir: live_dir.display().to_string(),
                },
            });
        }
        guard.disarm();

        // 4. cleanup; a leftover backup is removed at the start of the next cycle
        if let Err(e) = self.run_step(SwapStep::Cleanup, || {
            remove_dir_all(&self.backup).map_err(io::Error::other)
        }) {
            warn!("Could not remove {}: {e}; it will be removed on the next run", self.backup.display());
        }

        info!("Swap complete");
        Ok(())
    }

    /// Put the backup back at `live_dir` if the live directory is missing.
    ///
    /// Returns whether a rename happened. Used by the rollback guard and to
    /// recover from a process that died between steps 2 and 3.
    pub fn restore(&self, live_dir: &Path) -> io::Result<bool> {
        if live_dir.exists() || !self.backup.exists() {
            return Ok(false);
        }

        self.run_step(SwapStep::Restore, || fs::rename(&self.backup, live_dir))?;
        warn!("Restored previous version from {}", self.backup.display());
        Ok(true)
    }

    /// Recover from an interrupted swap and clear its leftovers.
    ///
    /// Restores the backup when the live directory is missing, then removes the
    /// staging directory and every `app.old*` sibling.
    pub fn recover(&self, live_dir: &Path) -> Result<(), UpdateError> {
        self.restore(live_dir).map_err(|e| UpdateError::RollbackFailed {
            step: "recovery".to_string(),
            reason: "live directory missing after an interrupted swap".to_string(),
            rollback_reason: e.to_string(),
            live_dir: live_dir.display().to_string(),
        })?;

        remove_dir_best_effort(&self.staging);

        let (Some(parent), Some(prefix)) = (self.backup.parent(), self.backup.file_name()) else {
            return Ok(());
        };
        let prefix = prefix.to_string_lossy().into_owned();
        let Ok(entries) = fs::read_dir(parent) else {
            return Ok(());
        };
        for entry in entries.flatten() {
            if entry.file_name().to_string_lossy().starts_with(&prefix) && entry.path() != live_dir {
                debug!("Removing leftover {}", entry.path().display());
                remove_dir_best_effort(&entry.path());
            }
        }
        Ok(())
    }

    #[cfg_attr(not(any(test, feature = "test-utils")), allow(unused_variables))]
    fn run_step<T>(&self, step: SwapStep, op: impl FnOnce() -> io::Result<T>) -> io::Result<T> {
        #[cfg(any(test, feature = "test-utils"))]
        if self.faults.contains(&step) {
            return Err(io::Error::other(format!("injected failure at {step}")));
        }
        op()
    }
}

fn swap_error(step: SwapStep, err: &io::Error) -> UpdateError {
    UpdateError::Swap {
        step: step.to_string(),
        reason: err.to_string(),
    }
}

/// Restores the backup unless disarmed.
///
/// Explicit failures call [`RollbackGuard::restore`] to learn whether the
/// restore worked; unwinding falls back to [`Drop`], which can only log.
struct RollbackGuard<'a> {
    swapper: &'a DirectorySwapper,
    live_dir: &'a Path,
    armed: bool,
}

impl<'a> RollbackGuard<'a> {
    fn arm(swapper: &'a DirectorySwapper, live_dir: &'a Path) -> Self {
        Self {
            swapper,
            live_dir,
            armed: true,
        }
    }

    fn restore(mut self) -> io::Result<()> {
        self.armed = false;
        self.swapper.restore(self.live_dir).map(|_| ())
    }

    fn disarm(mut self) {
        self.armed = false;
    }
}

impl Drop for RollbackGuard<'_> {
    fn drop(&mut self) {
        if self.armed
            && let Err(e) = self.swapper.restore(self.live_dir)
        {
            error!(
                "Rollback of {} failed: {e}; previous version remains at {}",
                self.live_dir.display(),
                self.swapper.backup.display()
            );
        }
    }
}
