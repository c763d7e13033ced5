use annotator_updater::cli;
use annotator_updater::core::{UpdateError, user_friendly_error};
use clap::Parser;

/// Exit code for invalid or missing settings.
const EXIT_CONFIG_ERROR: i32 = 2;

#[tokio::main]
async fn main() {
    let cli = cli::Cli::parse();

    // Set up colored output for Windows
    #[cfg(windows)]
    colored::control::set_virtual_terminal(true).ok();

    let code = match cli.execute().await {
        Ok(code) => code,
        Err(e) => {
            let is_config_error = e.chain().any(|cause| {
                matches!(cause.downcast_ref::<UpdateError>(), Some(UpdateError::Config { .. }))
            });

            user_friendly_error(e).display();
            if is_config_error { EXIT_CONFIG_ERROR } else { 1 }
        }
    };

    std::process::exit(code);
}
