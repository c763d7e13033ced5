//! Show the persisted update state.

use crate::config::UpdaterConfig;
use crate::update::{GateDecision, StateStore, UpdateState, rate_limit_gate};
use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use clap::Args;
use colored::Colorize;

/// Arguments of `annotator-update status`.
#[derive(Args, Debug, Default)]
pub struct StatusArgs {
    /// Print the state record as JSON.
    #[arg(long)]
    pub json: bool,
}

impl StatusArgs {
    pub fn execute(self, config: &UpdaterConfig) -> Result<i32> {
        let state = StateStore::new(config.state_path.clone()).load();

        if self.json {
            let rendered =
                serde_json::to_string_pretty(&state).context("Failed to render update state")?;
            println!("{rendered}");
            return Ok(0);
        }

        println!("{}", format_status(config, &state, Utc::now()));
        Ok(0)
    }
}

fn format_status(config: &UpdaterConfig, state: &UpdateState, now: DateTime<Utc>) -> String {
    let revision = if state.revision.is_empty() {
        "never updated".dimmed().to_string()
    } else {
        state.revision.bold().to_string()
    };
    let validator = if state.cache_validator.is_empty() {
        "none"
    } else {
        state.cache_validator.as_str()
    };

    let next_check = match rate_limit_gate(state, config.min_check_interval, now) {
        GateDecision::Skip {
            remaining,
        } => format!("in {}s", remaining.as_secs().max(1)),
        GateDecision::Proceed {
            clock_skew: true,
        } => "due (last check time is in the future)".yellow().to_string(),
        GateDecision::Proceed {
            clock_skew: false,
        } => "due".green().to_string(),
    };

    [
        format!("Repository:   {}/{}@{}", config.owner, config.repository, config.branch),
        format!("Installed at: {}", config.app_dir.display()),
        format!("Revision:     {revision}"),
        format!("Validator:    {validator}"),
        format!("Applied:      {}", format_time(state.last_applied_at)),
        format!("Last check:   {}", format_time(state.last_checked_at)),
        format!("Next check:   {next_check}"),
    ]
    .join("\n")
}

fn format_time(at: DateTime<Utc>) -> String {
    if at == DateTime::<Utc>::UNIX_EPOCH {
        "never".to_string()
    } else {
        at.to_rfc3339()
    }
}
