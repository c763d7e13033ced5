//! Error handling for the updater
//!
//! This module provides the error taxonomy of an update cycle and user-friendly
//! error reporting for the command-line front end. The design mirrors two needs:
//! 1. **Strongly-typed errors** so the orchestrator can decide, per failure, whether
//!    a cycle is recoverable and whether the installation is still consistent
//! 2. **User-friendly messages** with actionable suggestions for the launcher/CLI
//!
//! # Error Categories
//!
//! - **Configuration**: [`UpdateError::Config`] - fatal, raised before any network or disk activity
//! - **Revision check**: [`UpdateError::CheckFailure`] - recovered, the cycle counts as "no update"
//! - **Fetching**: [`UpdateError::Download`], [`UpdateError::Extract`],
//!   [`UpdateError::ProjectRootNotFound`] - fatal for the cycle, live directory untouched
//! - **Swapping**: [`UpdateError::Swap`] (previous install restored) and
//!   [`UpdateError::RollbackFailed`] (installation left inconsistent)
//! - **Persistence**: [`UpdateError::StateWrite`] - logged, never unwinds a completed swap
//!
//! # Examples
//!
//! ```rust,no_run
//! use annotator_updater::core::{UpdateError, user_friendly_error};
//!
//! let error = UpdateError::Config {
//!     setting: "owner".to_string(),
//!     reason: "required setting is missing".to_string(),
//! };
//! let ctx = user_friendly_error(anyhow::Error::from(error));
//! ctx.display();
//! ```

use colored::Colorize;
use std::fmt;
use thiserror::Error;

/// The error type for every failure an update cycle can hit.
///
/// Variants carry rendered strings rather than source errors so the value can be
/// cloned into the cycle outcome and into [`ErrorContext`] without losing detail.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum UpdateError {
    /// A required setting is absent or invalid.
    #[error("Configuration error in '{setting}': {reason}")]
    Config {
        /// Name of the offending setting
        setting: String,
        /// Why the value was rejected
        reason: String,
    },

    /// The revision endpoint could not be queried or returned something unusable.
    #[error("Revision check failed: {reason}")]
    CheckFailure {
        /// Network, status or parse failure description
        reason: String,
    },

    /// The version archive could not be downloaded.
    #[error("Failed to download archive from {url}: {reason}")]
    Download {
        /// Archive URL
        url: String,
        /// Underlying failure
        reason: String,
    },

    /// The downloaded archive could not be unpacked.
    #[error("Failed to extract archive {archive}: {reason}")]
    Extract {
        /// Path of the archive file
        archive: String,
        /// Underlying failure
        reason: String,
    },

    /// No directory of the extracted tree contains the project marker file.
    #[error("No directory containing '{marker}' found under {searched}")]
    ProjectRootNotFound {
        /// Marker file name that was searched for
        marker: String,
        /// Root of the search
        searched: String,
    },

    /// A swap step failed; the previous installation has been restored.
    #[error("Directory swap failed during {step}: {reason}")]
    Swap {
        /// Swap step that failed
        step: String,
        /// Underlying failure
        reason: String,
    },

    /// A swap step failed and restoring the previous installation failed too.
    #[error(
        "Directory swap failed during {step} ({reason}) and rollback failed ({rollback_reason}); installation at {live_dir} is inconsistent"
    )]
    RollbackFailed {
        /// Swap step that failed first
        step: String,
        /// Original failure
        reason: String,
        /// Failure while restoring the backup
        rollback_reason: String,
        /// Live application directory that may now be missing
        live_dir: String,
    },

    /// The state record could not be written.
    #[error("Failed to write update state to {path}: {reason}")]
    StateWrite {
        /// State file path
        path: String,
        /// Underlying failure
        reason: String,
    },

    /// The cycle-wide advisory lock could not be taken.
    #[error("Failed to acquire update lock at {path}: {reason}")]
    Lock {
        /// Lock file path
        path: String,
        /// Underlying failure
        reason: String,
    },

    /// Generic file system failure outside the swap critical section.
    #[error("File system error during {operation} on {path}: {reason}")]
    Io {
        /// What was being attempted
        operation: String,
        /// Path involved
        path: String,
        /// Underlying failure
        reason: String,
    },
}

impl UpdateError {
    /// Build an [`UpdateError::Config`] for a missing required setting.
    pub fn missing_setting(setting: &str) -> Self {
        Self::Config {
            setting: setting.to_string(),
            reason: "required setting is missing".to_string(),
        }
    }

    /// Whether the failure left the live application directory in an unknown state.
    ///
    /// Only a failed rollback does this; every other variant guarantees that either
    /// the old or the new installation is fully in place.
    #[must_use]
    pub const fn leaves_installation_inconsistent(&self) -> bool {
        matches!(self, Self::RollbackFailed { .. })
    }
}

/// Error wrapper carrying a suggestion and details for terminal display.
#[derive(Debug)]
pub struct ErrorContext {
    /// The underlying error, when it is one of ours
    pub error: Option<UpdateError>,
    /// Rendered message (used when `error` is `None`)
    pub message: String,
    /// Optional suggestion for resolving the error
    pub suggestion: Option<String>,
    /// Optional additional details about the error
    pub details: Option<String>,
}

impl ErrorContext {
    /// Create a new error context from an [`UpdateError`].
    #[must_use]
    pub fn new(error: UpdateError) -> Self {
        Self {
            message: error.to_string(),
            error: Some(error),
            suggestion: None,
            details: None,
        }
    }

    /// Create an error context from an arbitrary message.
    #[must_use]
    pub fn other(message: impl Into<String>) -> Self {
        Self {
            error: None,
            message: message.into(),
            suggestion: None,
            details: None,
        }
    }

    /// Add a suggestion for resolving the error.
    pub fn with_suggestion(mut self, suggestion: impl Into<String>) -> Self {
        self.suggestion = Some(suggestion.into());
        self
    }

    /// Add additional details explaining the error.
    pub fn with_details(mut self, details: impl Into<String>) -> Self {
        self.details = Some(details.into());
        self
    }

    /// Print the error, details and suggestion to stderr with terminal colors.
    pub fn display(&self) {
        eprintln!("{}: {}", "error".red().bold(), self.message);

        if let Some(details) = &self.details {
            eprintln!("{}: {}", "details".yellow(), details);
        }

        if let Some(suggestion) = &self.suggestion {
            eprintln!("{}: {}", "suggestion".green(), suggestion);
        }
    }
}

impl fmt::Display for ErrorContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)?;

        if let Some(details) = &self.details {
            write!(f, "\nDetails: {details}")?;
        }

        if let Some(suggestion) = &self.suggestion {
            write!(f, "\nSuggestion: {suggestion}")?;
        }

        Ok(())
    }
}

impl std::error::Error for ErrorContext {}

/// Convert any error into an [`ErrorContext`] with contextual suggestions.
///
/// Walks the error chain looking for an [`UpdateError`]; anything else is rendered
/// with its full cause chain.
pub fn user_friendly_error(error: anyhow::Error) -> ErrorContext {
    for cause in error.chain() {
        if let Some(update_error) = cause.downcast_ref::<UpdateError>() {
            return create_error_context(update_error.clone());
        }
    }

    let mut message = error.to_string();
    let chain: Vec<String> = error.chain().skip(1).map(ToString::to_string).collect();

    if !chain.is_empty() {
        message.push_str("\n\nCaused by:");
        for (i, cause) in chain.iter().enumerate() {
            message.push_str(&format!("\n  {}: {}", i + 1, cause));
        }
    }

    ErrorContext::other(message)
}

fn create_error_context(error: UpdateError) -> ErrorContext {
    match &error {
        UpdateError::Config { .. } => ErrorContext::new(error)
            .with_suggestion(
                "Set the value in updater.toml next to the installation, or pass it on the command line",
            )
            .with_details("The installer writes updater.toml; re-running it restores missing settings"),
        UpdateError::CheckFailure { .. } | UpdateError::Download { .. } => ErrorContext::new(error)
            .with_suggestion("Check your internet connection and try again later")
            .with_details("GitHub may also be rate limiting unauthenticated requests"),
        UpdateError::Extract { .. } | UpdateError::ProjectRootNotFound { .. } => {
            ErrorContext::new(error)
                .with_suggestion("Run the updater again; the archive is downloaded fresh each time")
                .with_details("The downloaded archive did not contain a usable application tree")
        }
        UpdateError::Swap { .. } => ErrorContext::new(error)
            .with_suggestion("Close the application and run the updater again")
            .with_details("The previous installation was restored and is still usable"),
        UpdateError::RollbackFailed { live_dir, .. } => {
            let details = format!(
                "The application directory {live_dir} may be missing. The previous version is kept in app.old next to it"
            );
            ErrorContext::new(error)
                .with_suggestion("Rename app.old back to app, or re-run the installer")
                .with_details(details)
        }
        UpdateError::StateWrite { .. } | UpdateError::Io { .. } | UpdateError::Lock { .. } => {
            ErrorContext::new(error).with_suggestion(
                "Check that the installation directory is writable by the current user",
            )
        }
    }
}
