//! Run one update cycle.

use crate::config::UpdaterConfig;
use crate::core::user_friendly_error;
use crate::update::{UpdateOrchestrator, UpdateOutcome};
use anyhow::Result;
use clap::Args;
use colored::Colorize;

/// Arguments of `annotator-update run`.
#[derive(Args, Debug, Default)]
pub struct RunArgs {
    /// Check now, ignoring the minimum interval since the last check.
    #[arg(short, long)]
    pub force: bool,
}

impl RunArgs {
    /// Run the cycle and report its outcome, returning the exit code.
    pub async fn execute(self, config: UpdaterConfig, quiet: bool) -> Result<i32> {
        let orchestrator = UpdateOrchestrator::from_config(config)?.force(self.force);
        let outcome = orchestrator.run().await;
        report(&outcome, quiet);
        Ok(outcome.exit_code())
    }
}

fn report(outcome: &UpdateOutcome, quiet: bool) {
    match outcome {
        UpdateOutcome::UpdateFailed {
            error,
        } => user_friendly_error(anyhow::Error::from(error.clone())).display(),
        UpdateOutcome::CheckFailed {
            reason,
        } => {
            if !quiet {
                eprintln!("{} {reason}", "Could not check for updates:".yellow());
            }
        }
        _ if quiet => {}
        UpdateOutcome::SkippedRateLimited {
            remaining,
        } => {
            let message =
                format!("Checked recently, next check in {}s", remaining.as_secs().max(1));
            println!("{}", message.dimmed());
        }
        UpdateOutcome::UpToDate {
            revision,
        } => {
            if revision.is_empty() {
                println!("{}", "Already up to date".green());
            } else {
                println!("{}", format!("Already up to date ({revision})").green());
            }
        }
        UpdateOutcome::Updated {
            revision,
        } => println!("{}", format!("Updated to {revision}").green().bold()),
    }
}
