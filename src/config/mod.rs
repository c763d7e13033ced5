//! Configuration for the updater
//!
//! The installer writes a small TOML file (`updater.toml`) into the install root.
//! It names the tracked repository and may override any of the install layout
//! paths, the client label, and the network and rate-limit timings.
//!
//! Loading happens in two stages:
//!
//! 1. [`ConfigFile`] - the raw document, every field optional. A missing file is
//!    an empty document; a file that is not valid TOML is an error.
//! 2. [`UpdaterConfig`] - the validated settings handed to every component
//!    constructor. Resolution fails fast with [`UpdateError::Config`] naming the
//!    first missing or invalid setting.
//!
//! # Example
//!
//! ```toml
//! owner = "OrthoDriven"
//! repository = "2d-point-annotator"
//! branch = "main"
//! track = "branch"
//! install_root = "~/2d-point-annotator"
//! min_check_interval_secs = 15
//! request_timeout_secs = 15
//! ```
//!
//! [`UpdateError::Config`]: crate::core::UpdateError::Config

mod updater;

pub use updater::{
    CONFIG_FILE_NAME, ConfigFile, DEFAULT_API_BASE_URL, DEFAULT_ARCHIVE_BASE_URL,
    DEFAULT_MARKER_FILE, DEFAULT_MIN_CHECK_INTERVAL_SECS, DEFAULT_REQUEST_TIMEOUT_SECS,
    DEFAULT_USER_AGENT, DOWNLOAD_TIMEOUT_FACTOR, MAX_REQUEST_TIMEOUT_SECS, Track,
    UpdaterConfig,
};
