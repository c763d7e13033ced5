//! Update-check-and-swap engine.
//!
//! This module keeps an installed copy of the application in step with the
//! tracked branch (or the latest release) of its repository.
//!
//! # Components
//!
//! - [`StateStore`] - durable record of the last check and the last applied revision
//! - [`RevisionChecker`] - conditional (`If-None-Match`) revision lookup
//! - [`ArchiveFetcher`] - archive download, extraction and project-root discovery
//! - [`DirectorySwapper`] - rename-based replacement of the live directory with rollback
//! - [`UpdateOrchestrator`] - one complete cycle, reported as an [`UpdateOutcome`]
//! - [`UpdateLock`] - advisory lock serializing cycles of the same installation
//!
//! # Cycle
//!
//! ```text
//! 1. Lock the install root and clear leftovers of interrupted cycles
//! 2. Rate-limit gate on lastCheckUtc (no network when too recent)
//! 3. Revision check with the cached validator
//!    ├── unchanged / failed / same revision -> record the check time, stop
//!    └── new revision
//! 4. Download and extract into the scratch workspace
//! 5. Swap: new -> app.new, app -> app.old, app.new -> app, remove app.old
//! 6. Commit revision and validator
//! ```
//!
//! # Example
//!
//! ```rust,no_run
//! use annotator_updater::config::UpdaterConfig;
//! use annotator_updater::update::UpdateOrchestrator;
//!
//! # async fn example() -> anyhow::Result<()> {
//! let config = UpdaterConfig::new("OrthoDriven", "2d-point-annotator", "main", "/opt/annotator");
//! let outcome = UpdateOrchestrator::from_config(config)?.run().await;
//! println!("{outcome}");
//! # Ok(())
//! # }
//! ```

pub mod checker;
pub mod fetcher;
pub mod lock;
pub mod orchestrator;
pub mod state;
pub mod swap;

#[cfg(test)]
mod tests;

pub use checker::{CheckOutcome, RemoteRevision, RevisionChecker, RevisionSource};
pub use fetcher::{ArchiveFetcher, ArchiveSource, find_project_root, unpack_archive};
pub use lock::UpdateLock;
pub use orchestrator::{GateDecision, UpdateOrchestrator, UpdateOutcome, rate_limit_gate};
pub use state::{StateStore, UpdateState};
pub use swap::{DirectorySwapper, SwapStep};
