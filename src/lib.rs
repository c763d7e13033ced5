//! Annotator Updater - self-update engine for the 2D Point Annotator
//!
//! Keeps a locally installed copy of the annotator in step with its source
//! repository. Each invocation runs one short cycle: decide whether a check is
//! due, ask the remote host for the latest revision with a cached validator,
//! and when a new revision exists download it, extract it and swap it into
//! place so that either the old or the new tree is always fully installed.
//!
//! # Core Modules
//!
//! - [`config`] - `updater.toml` loading and the validated [`config::UpdaterConfig`]
//! - [`core`] - error taxonomy and user-facing error rendering
//! - [`update`] - state store, revision checker, archive fetcher, directory swapper
//!   and the orchestrator composing them
//! - [`utils`] - atomic writes, scratch workspace and platform defaults
//! - [`cli`] - the `annotator-update` command line
//!
//! # Install Layout
//!
//! ```text
//! <install root>/
//! ├── app/                  live application tree
//! ├── app.new/              staging name during a swap
//! ├── app.old/              backup name during a swap
//! ├── .update-scratch/      download and extraction workspace
//! ├── .update.lock          advisory lock held for a whole cycle
//! ├── update_state.json     last check and last applied revision
//! └── updater.toml          settings written by the installer
//! ```
//!
//! # State File
//!
//! ```json
//! {
//!   "sha": "3f1c2e9",
//!   "etag": "W/\"5d0f...\"",
//!   "updatedUtc": "2025-03-01T10:00:00Z",
//!   "lastCheckUtc": "2025-03-01T10:00:00Z"
//! }
//! ```

pub mod cli;
pub mod config;
pub mod core;
pub mod update;
pub mod utils;

#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;
