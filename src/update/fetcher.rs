//! Archive download, extraction and project-root discovery.
//!
//! Branch archives produced by the host wrap the tree in a generated top-level
//! folder (`<repo>-<sha>/`), and release zipballs use yet another prefix, so
//! after extraction the fetcher searches for the first directory holding the
//! project marker file instead of assuming a layout.

use super::checker::describe_request_error;
use crate::config::UpdaterConfig;
use crate::core::UpdateError;
use reqwest::Client;
use std::future::Future;
use std::path::{Path, PathBuf};
use tokio::io::AsyncWriteExt;
use tracing::{debug, info, warn};
use walkdir::WalkDir;

/// File name the archive is downloaded to inside the destination directory.
pub const ARCHIVE_FILE_NAME: &str = "download.zip";

/// Anything that can turn an archive URL into an extracted project tree.
pub trait ArchiveSource {
    /// Download `url` into `dest`, extract it there and return the project root.
    fn fetch(
        &self,
        url: &str,
        dest: &Path,
    ) -> impl Future<Output = Result<PathBuf, UpdateError>> + Send;
}

/// HTTP implementation of [`ArchiveSource`].
#[derive(Debug, Clone)]
pub struct ArchiveFetcher {
    client: Client,
    marker_file: String,
}

impl ArchiveFetcher {
    /// Build a fetcher using the download timeout derived from `config`.
    pub fn new(config: &UpdaterConfig) -> Result<Self, UpdateError> {
        let client = Client::builder()
            .user_agent(config.user_agent.clone())
            .timeout(config.download_timeout())
            .build()
            .map_err(|e| UpdateError::Config {
                setting: "user_agent".to_string(),
                reason: format!("failed to build HTTP client: {e}"),
            })?;

        Ok(Self {
            client,
            marker_file: config.marker_file.clone(),
        })
    }

    /// Stream `url` into `target`, returning the number of bytes written.
    pub async fn download(&self, url: &str, target: &Path) -> Result<u64, UpdateError> {
        let failure = |reason: String| UpdateError::Download {
            url: url.to_string(),
            reason,
        };

        info!("Downloading {url}");
        let mut response =
            self.client.get(url).send().await.map_err(|e| failure(describe_request_error(&e)))?;

        let status = response.status();
        if !status.is_success() {
            return Err(failure(format!("HTTP {status}")));
        }

        let mut file = tokio::fs::File::create(target)
            .await
            .map_err(|e| failure(format!("cannot create {}: {e}", target.display())))?;

        let mut written = 0u64;
        while let Some(chunk) =
            response.chunk().await.map_err(|e| failure(describe_request_error(&e)))?
        {
            file.write_all(&chunk).await.map_err(|e| failure(e.to_string()))?;
            written += chunk.len() as u64;
        }
        file.flush().await.map_err(|e| failure(e.to_string()))?;

        debug!("Downloaded {written} bytes to {}", target.display());
        Ok(written)
    }
}

impl ArchiveSource for ArchiveFetcher {
    async fn fetch(&self, url: &str, dest: &Path) -> Result<PathBuf, UpdateError> {
        let archive = dest.join(ARCHIVE_FILE_NAME);
        self.download(url, &archive).await?;
        unpack_archive(&archive, dest, &self.marker_file).await
    }
}

/// Extract `archive` into `dest`, delete the archive and locate the project root.
pub async fn unpack_archive(
    archive: &Path,
    dest: &Path,
    marker_file: &str,
) -> Result<PathBuf, UpdateError> {
    let archive_path = archive.to_path_buf();
    let dest_path = dest.to_path_buf();

    // Zip decoding is blocking I/O
    tokio::task::spawn_blocking(move || extract_archive(&archive_path, &dest_path))
        .await
        .map_err(|e| UpdateError::Extract {
            archive: archive.display().to_string(),
            reason: e.to_string(),
        })??;

    if let Err(e) = tokio::fs::remove_file(archive).await {
        warn!("Could not delete {}: {e}", archive.display());
    }

    let root = find_project_root(dest, marker_file)?;
    info!("Found project root at {}", root.display());
    Ok(root)
}

/// Extract every entry of the zip file `archive` into `dest`.
///
/// Entries whose names would escape `dest` are rejected by the zip reader.
pub fn extract_archive(archive: &Path, dest: &Path) -> Result<(), UpdateError> {
    let failure = |reason: String| UpdateError::Extract {
        archive: archive.display().to_string(),
        reason,
    };

    let file = std::fs::File::open(archive).map_err(|e| failure(e.to_string()))?;
    let mut zip = zip::ZipArchive::new(file).map_err(|e| failure(e.to_string()))?;
    debug!("Extracting {} entries into {}", zip.len(), dest.display());
    zip.extract(dest).map_err(|e| failure(e.to_string()))
}

/// First directory under `dir` (itself included) that contains `marker_file`.
///
/// Directories are visited depth-first in pre-order with siblings sorted by
/// name, so the result does not depend on the file system's listing order.
pub fn find_project_root(dir: &Path, marker_file: &str) -> Result<PathBuf, UpdateError> {
    let walker = WalkDir::new(dir)
        .follow_links(false)
        .sort_by_file_name()
        .into_iter()
        .filter_entry(|entry| entry.file_type().is_dir());

    for entry in walker {
        match entry {
            Ok(entry) if entry.path().join(marker_file).is_file() => {
                return Ok(entry.into_path());
            }
            Ok(_) => {}
            Err(e) => warn!("Skipping unreadable entry while searching for {marker_file}: {e}"),
        }
    }

    Err(UpdateError::ProjectRootNotFound {
        marker: marker_file.to_string(),
        searched: dir.display().to_string(),
    })
}
