use crate::core::UpdateError;
use crate::utils::platform::{default_install_root, resolve_path};
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::fs;
use tracing::debug;

/// File name of the updater settings inside the install root.
pub const CONFIG_FILE_NAME: &str = "updater.toml";

/// GitHub REST API root.
pub const DEFAULT_API_BASE_URL: &str = "https://api.github.com";

/// Host serving branch archives.
pub const DEFAULT_ARCHIVE_BASE_URL: &str = "https://github.com";

/// Identifying client label sent with every request.
pub const DEFAULT_USER_AGENT: &str = "2d-point-annotator-updater";

/// File whose presence marks the project root inside an extracted archive.
pub const DEFAULT_MARKER_FILE: &str = "pixi.toml";

/// Timeout of the revision check, in seconds.
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 15;

/// Minimum number of seconds between two checks.
pub const DEFAULT_MIN_CHECK_INTERVAL_SECS: u64 = 15;

/// Archive downloads get this multiple of the check timeout.
pub const DOWNLOAD_TIMEOUT_FACTOR: u32 = 6;

/// Largest accepted check timeout, in seconds.
pub const MAX_REQUEST_TIMEOUT_SECS: u64 = 3600;

/// What the updater follows on the remote host.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Track {
    /// Head commit of a branch; the revision is the commit SHA.
    #[default]
    Branch,
    /// Latest published release; the revision is the release tag.
    Releases,
}

/// Raw settings document as written by the installer.
///
/// Every field is optional so that partially written files still parse;
/// [`ConfigFile::resolve`] decides what is actually required.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConfigFile {
    pub owner: Option<String>,
    pub repository: Option<String>,
    pub branch: Option<String>,
    pub track: Option<Track>,
    pub api_base_url: Option<String>,
    pub archive_base_url: Option<String>,
    pub install_root: Option<String>,
    pub app_dir: Option<String>,
    pub state_path: Option<String>,
    pub scratch_dir: Option<String>,
    pub user_agent: Option<String>,
    pub request_timeout_secs: Option<u64>,
    pub min_check_interval_secs: Option<u64>,
    pub marker_file: Option<String>,
}

impl ConfigFile {
    /// Read the settings file, treating a missing file as empty.
    pub async fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            debug!("No updater config at {}, using defaults", path.display());
            return Ok(Self::default());
        }

        let content = fs::read_to_string(path)
            .await
            .with_context(|| format!("Failed to read updater config from {}", path.display()))?;

        Self::parse(&content)
            .with_context(|| format!("Failed to parse updater config from {}", path.display()))
    }

    /// Parse a settings document.
    pub fn parse(content: &str) -> Result<Self> {
        Ok(toml::from_str(content)?)
    }

    /// Validate the document into an [`UpdaterConfig`].
    ///
    /// `owner`, `repository` and `branch` are required. The install root falls
    /// back to the platform default; the remaining paths are derived from it.
    pub fn resolve(self) -> Result<UpdaterConfig, UpdateError> {
        let owner = required(self.owner, "owner")?;
        let repository = required(self.repository, "repository")?;
        let branch = required(self.branch, "branch")?;

        let install_root = match non_empty(self.install_root) {
            Some(raw) => expand(&raw, "install_root")?,
            None => default_install_root().map_err(|e| UpdateError::Config {
                setting: "install_root".to_string(),
                reason: format!("{e:#}"),
            })?,
        };

        let mut config = UpdaterConfig::new(owner, repository, branch, install_root);

        if let Some(track) = self.track {
            config.track = track;
        }
        if let Some(url) = non_empty(self.api_base_url) {
            config.api_base_url = url.trim_end_matches('/').to_string();
        }
        if let Some(url) = non_empty(self.archive_base_url) {
            config.archive_base_url = url.trim_end_matches('/').to_string();
        }
        if let Some(raw) = non_empty(self.app_dir) {
            config.app_dir = expand(&raw, "app_dir")?;
        }
        if let Some(raw) = non_empty(self.state_path) {
            config.state_path = expand(&raw, "state_path")?;
        }
        if let Some(raw) = non_empty(self.scratch_dir) {
            config.scratch_dir = expand(&raw, "scratch_dir")?;
        }
        if let Some(agent) = non_empty(self.user_agent) {
            config.user_agent = agent;
        }
        if let Some(secs) = self.request_timeout_secs {
            config.request_timeout = Duration::from_secs(secs);
        }
        if let Some(secs) = self.min_check_interval_secs {
            config.min_check_interval = Duration::from_secs(secs);
        }
        if let Some(marker) = non_empty(self.marker_file) {
            config.marker_file = marker;
        }

        config.validate()?;
        Ok(config)
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.map(|v| v.trim().to_string()).filter(|v| !v.is_empty())
}

fn required(value: Option<String>, setting: &str) -> Result<String, UpdateError> {
    non_empty(value).ok_or_else(|| UpdateError::missing_setting(setting))
}

fn expand(raw: &str, setting: &str) -> Result<PathBuf, UpdateError> {
    resolve_path(raw).map_err(|e| UpdateError::Config {
        setting: setting.to_string(),
        reason: format!("{e:#}"),
    })
}

/// Validated settings for one installation.
///
/// Passed explicitly into every component; nothing in the crate reads install
/// paths from process-wide state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpdaterConfig {
    /// Repository owner on the remote host.
    pub owner: String,
    /// Repository name on the remote host.
    pub repository: String,
    /// Tracked branch.
    pub branch: String,
    /// Whether branch heads or releases are followed.
    pub track: Track,
    /// REST API root, without trailing slash.
    pub api_base_url: String,
    /// Archive host root, without trailing slash.
    pub archive_base_url: String,
    /// Directory holding the live app, its staging/backup siblings and the state.
    pub install_root: PathBuf,
    /// Live application directory.
    pub app_dir: PathBuf,
    /// Persisted update state record.
    pub state_path: PathBuf,
    /// Download and extraction workspace.
    pub scratch_dir: PathBuf,
    /// Client label sent as `User-Agent`.
    pub user_agent: String,
    /// Timeout of the revision check.
    pub request_timeout: Duration,
    /// Minimum time between two checks.
    pub min_check_interval: Duration,
    /// Marker file locating the project root inside an archive.
    pub marker_file: String,
}

impl UpdaterConfig {
    /// Settings for `owner/repository@branch` installed under `install_root`,
    /// with the default layout and timings.
    pub fn new(
        owner: impl Into<String>,
        repository: impl Into<String>,
        branch: impl Into<String>,
        install_root: impl Into<PathBuf>,
    ) -> Self {
        let install_root = install_root.into();
        Self {
            owner: owner.into(),
            repository: repository.into(),
            branch: branch.into(),
            track: Track::default(),
            api_base_url: DEFAULT_API_BASE_URL.to_string(),
            archive_base_url: DEFAULT_ARCHIVE_BASE_URL.to_string(),
            app_dir: install_root.join("app"),
            state_path: install_root.join("update_state.json"),
            scratch_dir: install_root.join(".update-scratch"),
            install_root,
            user_agent: DEFAULT_USER_AGENT.to_string(),
            request_timeout: Duration::from_secs(DEFAULT_REQUEST_TIMEOUT_SECS),
            min_check_interval: Duration::from_secs(DEFAULT_MIN_CHECK_INTERVAL_SECS),
            marker_file: DEFAULT_MARKER_FILE.to_string(),
        }
    }

    /// Load and validate the settings file at `path`.
    pub async fn load(path: &Path) -> Result<Self> {
        let file = ConfigFile::load(path).await?;
        Ok(file.resolve()?)
    }

    /// Default location of the settings file.
    pub fn default_config_path() -> Result<PathBuf> {
        Ok(default_install_root()?.join(CONFIG_FILE_NAME))
    }

    /// Check the invariants the swap and the network layer rely on.
    pub fn validate(&self) -> Result<(), UpdateError> {
        for (setting, value) in [
            ("owner", &self.owner),
            ("repository", &self.repository),
            ("branch", &self.branch),
            ("user_agent", &self.user_agent),
            ("marker_file", &self.marker_file),
            ("api_base_url", &self.api_base_url),
            ("archive_base_url", &self.archive_base_url),
        ] {
            if value.trim().is_empty() {
                return Err(UpdateError::missing_setting(setting));
            }
        }

        if self.request_timeout.is_zero() {
            return Err(UpdateError::Config {
                setting: "request_timeout_secs".to_string(),
                reason: "timeout must be greater than zero".to_string(),
            });
        }
        if self.request_timeout > Duration::from_secs(MAX_REQUEST_TIMEOUT_SECS) {
            return Err(UpdateError::Config {
                setting: "request_timeout_secs".to_string(),
                reason: format!("timeout must not exceed {MAX_REQUEST_TIMEOUT_SECS} seconds"),
            });
        }

        // Staging and backup are renamed next to the live directory
        if self.app_dir.parent() != Some(self.install_root.as_path()) {
            return Err(UpdateError::Config {
                setting: "app_dir".to_string(),
                reason: format!(
                    "{} must be a direct child of the install root {}",
                    self.app_dir.display(),
                    self.install_root.display()
                ),
            });
        }

        if self.scratch_dir == self.app_dir || self.scratch_dir.starts_with(&self.app_dir) {
            return Err(UpdateError::Config {
                setting: "scratch_dir".to_string(),
                reason: "scratch workspace must not live inside the application directory"
                    .to_string(),
            });
        }
        if self.install_root.starts_with(&self.scratch_dir) {
            return Err(UpdateError::Config {
                setting: "scratch_dir".to_string(),
                reason: "scratch workspace must not contain the install root".to_string(),
            });
        }

        // Renamed or deleted by the swap and its recovery
        let reserved = [
            ("staging directory", self.staging_dir()),
            ("backup directory", self.backup_dir()),
            ("update lock", self.lock_path()),
            ("state file", self.state_path.clone()),
        ];
        for (setting, path) in [("app_dir", &self.app_dir), ("scratch_dir", &self.scratch_dir)] {
            if let Some((name, reserved_path)) =
                reserved.iter().find(|(_, reserved_path)| path.starts_with(reserved_path))
            {
                return Err(UpdateError::Config {
                    setting: setting.to_string(),
                    reason: format!(
                        "{} collides with the {name} {}",
                        path.display(),
                        reserved_path.display()
                    ),
                });
            }
            if self.is_backup_leftover(path) {
                return Err(UpdateError::Config {
                    setting: setting.to_string(),
                    reason: format!(
                        "{} would be removed as a leftover backup; choose a name not starting with {}",
                        path.display(),
                        self.backup_dir().display()
                    ),
                });
            }
        }

        if self.state_path.starts_with(&self.app_dir) || self.state_path.starts_with(&self.scratch_dir)
        {
            return Err(UpdateError::Config {
                setting: "state_path".to_string(),
                reason: "state file must live outside the application and scratch directories"
                    .to_string(),
            });
        }

        Ok(())
    }

    /// Whether `path` is an `app.old*` sibling that recovery deletes.
    fn is_backup_leftover(&self, path: &Path) -> bool {
        let backup = self.backup_dir();
        let (Some(prefix), Some(name)) = (backup.file_name(), path.file_name()) else {
            return false;
        };
        path.parent() == backup.parent()
            && name.to_string_lossy().starts_with(prefix.to_string_lossy().as_ref())
    }

    /// Endpoint answering with the latest revision of the tracked branch.
    #[must_use]
    pub fn revision_url(&self) -> String {
        match self.track {
            Track::Branch => format!(
                "{}/repos/{}/{}/commits/{}",
                self.api_base_url, self.owner, self.repository, self.branch
            ),
            Track::Releases => {
                format!("{}/repos/{}/{}/releases", self.api_base_url, self.owner, self.repository)
            }
        }
    }

    /// Zip archive of the tracked branch, used when the revision response
    /// does not name one.
    #[must_use]
    pub fn default_archive_url(&self) -> String {
        format!(
            "{}/{}/{}/archive/refs/heads/{}.zip",
            self.archive_base_url, self.owner, self.repository, self.branch
        )
    }

    /// Timeout for archive downloads.
    #[must_use]
    pub fn download_timeout(&self) -> Duration {
        self.request_timeout.checked_mul(DOWNLOAD_TIMEOUT_FACTOR).unwrap_or(Duration::MAX)
    }

    /// Fixed staging name for the incoming tree.
    #[must_use]
    pub fn staging_dir(&self) -> PathBuf {
        self.install_root.join("app.new")
    }

    /// Fixed backup name for the outgoing tree.
    #[must_use]
    pub fn backup_dir(&self) -> PathBuf {
        self.install_root.join("app.old")
    }

    /// Lock file held for the duration of a cycle.
    #[must_use]
    pub fn lock_path(&self) -> PathBuf {
        self.install_root.join(".update.lock")
    }
}
