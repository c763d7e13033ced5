//! Platform-specific helpers for locating the installation.

use anyhow::{Context, Result};
use std::path::PathBuf;

/// Installation directory name used on Windows.
pub const APP_DIR_NAME_WINDOWS: &str = "2D-Point-Annotator";

/// Installation directory name used on macOS and Linux.
pub const APP_DIR_NAME_UNIX: &str = "2d-point-annotator";

/// Returns true if running on Windows.
#[must_use]
pub const fn is_windows() -> bool {
    cfg!(windows)
}

/// Default install root chosen by the installer for this platform.
///
/// Windows installs under the user's Documents folder; every other platform
/// installs directly under the home directory.
pub fn default_install_root() -> Result<PathBuf> {
    if is_windows() {
        let documents = dirs::document_dir()
            .or_else(dirs::home_dir)
            .context("Unable to determine the Documents directory")?;
        Ok(documents.join(APP_DIR_NAME_WINDOWS))
    } else {
        let home = dirs::home_dir().context("Unable to determine home directory")?;
        Ok(home.join(APP_DIR_NAME_UNIX))
    }
}

/// Resolve a configured path with tilde and environment variable expansion.
///
/// - `~/path` expands to `{home}/path`
/// - `$VAR/path` and `${VAR}/path` expand environment variables
pub fn resolve_path(path: &str) -> Result<PathBuf> {
    let expanded = shellexpand::full(path).with_context(|| {
        format!(
            "Failed to expand path: {path}\n\n\
            Common issues:\n\
            - Undefined environment variable (e.g., $UNDEFINED_VAR)\n\
            - Invalid variable syntax (use $VAR or ${{VAR}})"
        )
    })?;

    Ok(PathBuf::from(expanded.into_owned()))
}
