//! One update cycle, from the rate-limit gate to the final state write.
//!
//! ```text
//! START -> gate -> CHECKING -> UP_TO_DATE
//!                           -> FETCHING -> SWAPPING -> DONE
//!                           -> FAILED
//! ```
//!
//! Every cycle error is converted into an [`UpdateOutcome`] at this boundary.
//! The persisted revision only changes after a completed swap, so a cycle that
//! fails after confirming a new revision is retried in full next time.

use super::checker::{CheckOutcome, RemoteRevision, RevisionChecker, RevisionSource};
use super::fetcher::{ArchiveFetcher, ArchiveSource};
use super::lock::UpdateLock;
use super::state::{StateStore, UpdateState};
use super::swap::DirectorySwapper;
use crate::config::{Track, UpdaterConfig};
use crate::core::UpdateError;
use crate::utils::fs::{ScratchDir, remove_dir_best_effort};
use chrono::{DateTime, Utc};
use std::fmt;
use std::time::Duration;
use tracing::{debug, error, info, warn};

/// Terminal result of one cycle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UpdateOutcome {
    /// The previous check is too recent; nothing was done.
    SkippedRateLimited {
        /// Time left until the next check is due.
        remaining: Duration,
    },
    /// The installed revision is current.
    UpToDate {
        /// Installed revision, empty if never recorded.
        revision: String,
    },
    /// A new revision was installed.
    Updated {
        revision: String,
    },
    /// The remote could not be queried; treated as "no update this cycle".
    CheckFailed {
        reason: String,
    },
    /// Fetching or swapping the new revision failed.
    UpdateFailed {
        error: UpdateError,
    },
}

impl UpdateOutcome {
    /// Stable tag for scripts and logs.
    #[must_use]
    pub const fn label(&self) -> &'static str {
        match self {
            Self::SkippedRateLimited {
                ..
            } => "skipped-rate-limited",
            Self::UpToDate {
                ..
            } => "up-to-date",
            Self::Updated {
                ..
            } => "updated",
            Self::CheckFailed {
                ..
            } => "check-failed",
            Self::UpdateFailed {
                ..
            } => "update-failed",
        }
    }

    /// Process exit code for this outcome.
    #[must_use]
    pub const fn exit_code(&self) -> i32 {
        match self {
            Self::SkippedRateLimited {
                ..
            }
            | Self::UpToDate {
                ..
            }
            | Self::Updated {
                ..
            } => 0,
            Self::CheckFailed {
                ..
            } => 3,
            Self::UpdateFailed {
                error,
            } => {
                if error.leaves_installation_inconsistent() {
                    4
                } else {
                    1
                }
            }
        }
    }

    #[must_use]
    pub const fn is_failure(&self) -> bool {
        self.exit_code() != 0
    }
}

impl fmt::Display for UpdateOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::SkippedRateLimited {
                remaining,
            } => write!(f, "{} (next check in {}s)", self.label(), remaining.as_secs().max(1)),
            Self::UpToDate {
                revision,
            } if revision.is_empty() => f.write_str(self.label()),
            Self::UpToDate {
                revision,
            }
            | Self::Updated {
                revision,
            } => write!(f, "{}({revision})", self.label()),
            Self::CheckFailed {
                reason,
            } => write!(f, "{}({reason})", self.label()),
            Self::UpdateFailed {
                error,
            } => write!(f, "{}({error})", self.label()),
        }
    }
}

/// Result of the rate-limit gate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GateDecision {
    /// A check is due.
    Proceed {
        /// The stored check time lay in the future and was treated as now.
        clock_skew: bool,
    },
    /// The last check is more recent than the minimum interval.
    Skip {
        remaining: Duration,
    },
}

/// Decide whether a check is due at `now`.
///
/// A `lastCheckUtc` in the future counts as "never checked": the stored value
/// is unusable, and waiting for the wall clock to catch up could block updates
/// for arbitrarily long.
#[must_use]
pub fn rate_limit_gate(state: &UpdateState, interval: Duration, now: DateTime<Utc>) -> GateDecision {
    let (elapsed, clamped) = state.since_last_check(now);
    if clamped {
        return GateDecision::Proceed {
            clock_skew: true,
        };
    }

    let elapsed = elapsed.to_std().unwrap_or_default();
    if elapsed < interval {
        GateDecision::Skip {
            remaining: interval - elapsed,
        }
    } else {
        GateDecision::Proceed {
            clock_skew: false,
        }
    }
}

/// Drives one update cycle for an installation.
///
/// Generic over the network seams so that tests can script the remote side.
#[derive(Debug)]
pub struct UpdateOrchestrator<C = RevisionChecker, F = ArchiveFetcher> {
    config: UpdaterConfig,
    store: StateStore,
    checker: C,
    fetcher: F,
    swapper: DirectorySwapper,
    force: bool,
}

impl UpdateOrchestrator {
    /// Orchestrator talking to the configured remote host.
    pub fn from_config(config: UpdaterConfig) -> Result<Self, UpdateError> {
        config.validate()?;
        let checker = RevisionChecker::new(&config)?;
        let fetcher = ArchiveFetcher::new(&config)?;
        Ok(Self::with_sources(config, checker, fetcher))
    }
}

impl<C, F> UpdateOrchestrator<C, F>
where
    C: RevisionSource + Sync,
    F: ArchiveSource + Sync,
{
    pub fn with_sources(config: UpdaterConfig, checker: C, fetcher: F) -> Self {
        Self {
            store: StateStore::new(config.state_path.clone()),
            swapper: DirectorySwapper::new(&config),
            config,
            checker,
            fetcher,
            force: false,
        }
    }

    /// Bypass the rate-limit gate.
    #[must_use]
    pub fn force(mut self, force: bool) -> Self {
        self.force = force;
        self
    }

    #[must_use]
    pub fn with_swapper(mut self, swapper: DirectorySwapper) -> Self {
        self.swapper = swapper;
        self
    }

    #[must_use]
    pub fn store(&self) -> &StateStore {
        &self.store
    }

    #[must_use]
    pub fn config(&self) -> &UpdaterConfig {
        &self.config
    }

    /// Run one cycle to completion.
    pub async fn run(&self) -> UpdateOutcome {
        let _lock = match UpdateLock::acquire(&self.config.lock_path()).await {
            Ok(lock) => lock,
            Err(e) => {
                error!("{e}");
                return UpdateOutcome::UpdateFailed {
                    error: e,
                };
            }
        };

        // A previous cycle may have died mid-swap
        if let Err(e) = self.swapper.recover(&self.config.app_dir) {
            error!("{e}");
            return UpdateOutcome::UpdateFailed {
                error: e,
            };
        }
        remove_dir_best_effort(&self.config.scratch_dir);

        let state = self.store.load();
        if let Some(outcome) = self.gate(&state) {
            return outcome;
        }

        match self.checker.check(&state.cache_validator).await {
            CheckOutcome::Failed(reason) => {
                warn!("Update check failed: {reason}");
                self.touch();
                UpdateOutcome::CheckFailed {
                    reason,
                }
            }
            CheckOutcome::Unchanged => {
                info!("No changes since the last check");
                self.touch();
                UpdateOutcome::UpToDate {
                    revision: state.revision,
                }
            }
            CheckOutcome::Found(remote) if remote.revision == state.revision => {
                info!("Revision {} is already installed", remote.revision);
                if let Err(e) = self.store.record_validator(&remote.cache_validator) {
                    warn!("{e}");
                }
                UpdateOutcome::UpToDate {
                    revision: state.revision,
                }
            }
            CheckOutcome::Found(remote) => self.apply(&state, remote).await,
        }
    }

    fn gate(&self, state: &UpdateState) -> Option<UpdateOutcome> {
        if self.force {
            debug!("Rate limit bypassed");
            return None;
        }

        let interval = self.config.min_check_interval;
        match rate_limit_gate(state, interval, Utc::now()) {
            GateDecision::Skip {
                remaining,
            } => {
                debug!(
                    "Last check at {} is within {}s, skipping",
                    state.last_checked_at.to_rfc3339(),
                    interval.as_secs()
                );
                Some(UpdateOutcome::SkippedRateLimited {
                    remaining,
                })
            }
            GateDecision::Proceed {
                clock_skew: true,
            } => {
                warn!(
                    "Last check time {} is in the future; treating it as now",
                    state.last_checked_at.to_rfc3339()
                );
                None
            }
            GateDecision::Proceed {
                clock_skew: false,
            } => None,
        }
    }

    async fn apply(&self, state: &UpdateState, remote: RemoteRevision) -> UpdateOutcome {
        let previous = if state.revision.is_empty() {
            "<none>"
        } else {
            state.revision.as_str()
        };
        info!("New revision {} (installed: {previous})", remote.revision);

        if let Err(e) = self.fetch_and_swap(&remote).await {
            error!("Update to {} failed: {e}", remote.revision);
            self.touch();
            return UpdateOutcome::UpdateFailed {
                error: e,
            };
        }

        // The new tree is live; a lost state write only costs a redundant fetch next time
        if let Err(e) = self.store.commit(&remote.revision, &remote.cache_validator) {
            warn!("{e}");
        }

        info!("Updated to {}", remote.revision);
        UpdateOutcome::Updated {
            revision: remote.revision,
        }
    }

    async fn fetch_and_swap(&self, remote: &RemoteRevision) -> Result<(), UpdateError> {
        let url = self.archive_url(remote)?;
        let scratch = ScratchDir::recreate(&self.config.scratch_dir).map_err(|e| UpdateError::Io {
            operation: "prepare scratch workspace".to_string(),
            path: self.config.scratch_dir.display().to_string(),
            reason: format!("{e:#}"),
        })?;

        let project_root = self.fetcher.fetch(&url, scratch.path()).await?;

        self.swapper.swap(&project_root, &self.config.app_dir)
    }

    /// Archive holding `remote`.
    ///
    /// Branch heads fall back to the branch archive. A release must name its
    /// own archive, since the branch head is not the tagged tree.
    fn archive_url(&self, remote: &RemoteRevision) -> Result<String, UpdateError> {
        match (&remote.archive_url, self.config.track) {
            (Some(url), _) => Ok(url.clone()),
            (None, Track::Branch) => Ok(self.config.default_archive_url()),
            (None, Track::Releases) => Err(UpdateError::Download {
                url: self.config.revision_url(),
                reason: format!("release {} does not name an archive", remote.revision),
            }),
        }
    }

    fn touch(&self) {
        if let Err(e) = self.store.touch_last_checked() {
            warn!("{e}");
        }
    }
}
