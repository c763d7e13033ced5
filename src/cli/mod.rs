//! Command-line interface for the updater.
//!
//! The launcher runs `annotator-update` once per application start. Without a
//! subcommand it performs one update cycle, identical to `annotator-update run`.
//!
//! # Commands
//!
//! - `run` - run one update cycle (default)
//! - `status` - show the persisted state and whether a check is due; no network
//!
//! # Global Options
//!
//! - `--config <PATH>` - settings file (also `ANNOTATOR_UPDATER_CONFIG`)
//! - `--owner`, `--repository`, `--branch`, `--install-root` - override settings
//! - `--verbose` - debug logging
//! - `--quiet` - no logging or progress messages, errors only
//!
//! # Exit Codes
//!
//! | Code | Meaning |
//! |------|---------|
//! | 0 | skipped, up to date, or updated |
//! | 1 | update failed, previous version intact |
//! | 2 | configuration error |
//! | 3 | revision check failed |
//! | 4 | update failed and the installation could not be restored |
//!
//! # Examples
//!
//! ```bash
//! annotator-update                          # one cycle, honoring the rate limit
//! annotator-update run --force              # check now
//! annotator-update --verbose status         # inspect the state file
//! annotator-update -c ./updater.toml run    # explicit settings file
//! ```

mod run;
mod status;

pub use run::RunArgs;
pub use status::StatusArgs;

use crate::config::{ConfigFile, UpdaterConfig};
use crate::core::UpdateError;
use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing::debug;
use tracing_subscriber::EnvFilter;

/// Environment variable naming the settings file.
pub const CONFIG_ENV_VAR: &str = "ANNOTATOR_UPDATER_CONFIG";

/// Top-level command line of `annotator-update`.
#[derive(Parser, Debug)]
#[command(
    name = "annotator-update",
    about = "Keep the 2D Point Annotator installation up to date",
    version,
    long_about = "Checks the annotator's repository for a new revision and, when one exists, \
                  downloads it and swaps it into the installation directory."
)]
pub struct Cli {
    /// The subcommand to execute; defaults to `run`.
    #[command(subcommand)]
    command: Option<Commands>,

    /// Path to the settings file.
    ///
    /// Defaults to `updater.toml` in the default install root.
    #[arg(short, long, global = true, env = CONFIG_ENV_VAR)]
    config: Option<PathBuf>,

    /// Repository owner, overriding the settings file.
    #[arg(long, global = true)]
    owner: Option<String>,

    /// Repository name, overriding the settings file.
    #[arg(long, global = true)]
    repository: Option<String>,

    /// Tracked branch, overriding the settings file.
    #[arg(long, global = true)]
    branch: Option<String>,

    /// Install root, overriding the settings file.
    #[arg(long, global = true)]
    install_root: Option<String>,

    /// Enable debug logging.
    ///
    /// Equivalent to `RUST_LOG=debug`. Mutually exclusive with `--quiet`.
    #[arg(short, long, global = true, conflicts_with = "quiet")]
    verbose: bool,

    /// Suppress everything except errors.
    #[arg(short, long, global = true)]
    quiet: bool,
}

/// Available subcommands.
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run one update cycle.
    Run(RunArgs),

    /// Show the persisted update state without contacting the remote host.
    Status(StatusArgs),
}

impl Cli {
    /// Execute the parsed command, returning the process exit code.
    ///
    /// Configuration problems are returned as errors wrapping
    /// [`UpdateError::Config`]; cycle outcomes are mapped to exit codes.
    pub async fn execute(self) -> Result<i32> {
        self.init_logging();

        let config = self.load_config().await?;
        debug!(
            "Tracking {}/{}@{} in {}",
            config.owner,
            config.repository,
            config.branch,
            config.install_root.display()
        );

        match self.command {
            Some(Commands::Run(args)) => args.execute(config, self.quiet).await,
            Some(Commands::Status(args)) => args.execute(&config),
            None => RunArgs::default().execute(config, self.quiet).await,
        }
    }

    /// Log level implied by `--verbose`/`--quiet`; `None` disables logging.
    #[must_use]
    pub fn log_level(&self) -> Option<&'static str> {
        if self.verbose {
            Some("debug")
        } else if self.quiet {
            None
        } else {
            Some("info")
        }
    }

    fn init_logging(&self) {
        let Some(level) = self.log_level() else {
            return;
        };

        // RUST_LOG wins over the flags
        let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
        let _ = tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .with_target(false)
            .try_init();
    }

    /// Settings file path: `--config`, then the environment, then the default.
    fn config_path(&self) -> Result<PathBuf> {
        match &self.config {
            Some(path) => Ok(path.clone()),
            None => UpdaterConfig::default_config_path()
                .context("Cannot determine the default settings location; pass --config"),
        }
    }

    async fn load_config(&self) -> Result<UpdaterConfig> {
        let path = self.config_path()?;
        debug!("Loading settings from {}", path.display());

        let mut file = ConfigFile::load(&path).await.map_err(|e| UpdateError::Config {
            setting: path.display().to_string(),
            reason: format!("{e:#}"),
        })?;

        if let Some(owner) = &self.owner {
            file.owner = Some(owner.clone());
        }
        if let Some(repository) = &self.repository {
            file.repository = Some(repository.clone());
        }
        if let Some(branch) = &self.branch {
            file.branch = Some(branch.clone());
        }
        if let Some(root) = &self.install_root {
            file.install_root = Some(root.clone());
        }

        Ok(file.resolve()?)
    }
}
