//! Durable update-check state.
//!
//! The record is a small pretty-printed JSON document. Field names match the
//! files written by earlier releases of the updater (`sha`, `etag`,
//! `updatedUtc`, `lastCheckUtc`); the descriptive names are accepted as
//! aliases. Unknown fields are ignored on read.

use crate::core::UpdateError;
use crate::utils::fs::atomic_write;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Persisted metadata about the last check and the last applied revision.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct UpdateState {
    /// Last applied revision; empty if the install was never updated.
    #[serde(rename = "sha", alias = "revision")]
    pub revision: String,

    /// Cache validator (ETag) from the last successful check; empty if none.
    #[serde(rename = "etag", alias = "cacheValidator")]
    pub cache_validator: String,

    /// When `revision` last changed.
    #[serde(rename = "updatedUtc", alias = "lastAppliedAt")]
    pub last_applied_at: DateTime<Utc>,

    /// When a check was last attempted, whatever its outcome.
    #[serde(rename = "lastCheckUtc", alias = "lastCheckedAt")]
    pub last_checked_at: DateTime<Utc>,
}

impl Default for UpdateState {
    fn default() -> Self {
        Self {
            revision: String::new(),
            cache_validator: String::new(),
            last_applied_at: DateTime::<Utc>::UNIX_EPOCH,
            last_checked_at: DateTime::<Utc>::UNIX_EPOCH,
        }
    }
}

impl UpdateState {
    /// Time elapsed since the last check, clamped to zero when the stored
    /// timestamp lies in the future.
    ///
    /// Returns the elapsed time and whether clamping happened.
    #[must_use]
    pub fn since_last_check(&self, now: DateTime<Utc>) -> (chrono::Duration, bool) {
        let delta = now - self.last_checked_at;
        if delta < chrono::Duration::zero() {
            (chrono::Duration::zero(), true)
        } else {
            (delta, false)
        }
    }
}

/// Reads and writes the [`UpdateState`] record at a fixed path.
///
/// Loading never fails; every write goes through a temp file and a rename so
/// a crash leaves either the previous or the new record on disk.
#[derive(Debug, Clone)]
pub struct StateStore {
    path: PathBuf,
}

impl StateStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
        }
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load the record, falling back to defaults when the file is missing,
    /// empty, unreadable or malformed.
    #[must_use]
    pub fn load(&self) -> UpdateState {
        let content = match std::fs::read_to_string(&self.path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!("No update state at {}", self.path.display());
                return UpdateState::default();
            }
            Err(e) => {
                warn!("Could not read update state {}: {e}; using defaults", self.path.display());
                return UpdateState::default();
            }
        };

        if content.trim().is_empty() {
            debug!("Update state {} is empty", self.path.display());
            return UpdateState::default();
        }

        match serde_json::from_str(&content) {
            Ok(state) => state,
            Err(e) => {
                warn!("Ignoring malformed update state {}: {e}", self.path.display());
                UpdateState::default()
            }
        }
    }

    /// Rewrite only `lastCheckUtc`, preserving every other field.
    ///
    /// Creates the file when absent.
    pub fn touch_last_checked(&self) -> Result<UpdateState, UpdateError> {
        let mut state = self.load();
        state.last_checked_at = Utc::now();
        self.write(&state)?;
        debug!("Recorded check time {}", state.last_checked_at.to_rfc3339());
        Ok(state)
    }

    /// Rewrite `lastCheckUtc` and the cache validator, leaving the revision
    /// and `updatedUtc` alone.
    ///
    /// Used when the remote reports the revision already installed. An empty
    /// `cache_validator` keeps the stored one.
    pub fn record_validator(&self, cache_validator: &str) -> Result<UpdateState, UpdateError> {
        let mut state = self.load();
        state.last_checked_at = Utc::now();
        if !cache_validator.is_empty() {
            state.cache_validator = cache_validator.to_string();
        }
        self.write(&state)?;
        Ok(state)
    }

    /// Replace the whole record after a successful swap.
    pub fn commit(&self, revision: &str, cache_validator: &str) -> Result<UpdateState, UpdateError> {
        let now = Utc::now();
        let state = UpdateState {
            revision: revision.to_string(),
            cache_validator: cache_validator.to_string(),
            last_applied_at: now,
            last_checked_at: now,
        };
        self.write(&state)?;
        debug!("Committed revision {revision}");
        Ok(state)
    }

    fn write(&self, state: &UpdateState) -> Result<(), UpdateError> {
        let state_write = |reason: String| UpdateError::StateWrite {
            path: self.path.display().to_string(),
            reason,
        };

        let content = serde_json::to_string_pretty(state).map_err(|e| state_write(e.to_string()))?;
        atomic_write(&self.path, content.as_bytes()).map_err(|e| state_write(format!("{e:#}")))
    }
}
