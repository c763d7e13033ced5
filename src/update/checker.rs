//! Remote revision lookup with conditional requests.
//!
//! The checker asks the REST API for the newest revision of the tracked branch
//! (or the newest release) and sends the cache validator of the previous check
//! as `If-None-Match`. GitHub answers `304 Not Modified` for an unchanged
//! resource, which costs nothing against the rate limit and skips the body.

use crate::config::{Track, UpdaterConfig};
use crate::core::UpdateError;
use reqwest::header::{ACCEPT, ETAG, IF_NONE_MATCH};
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use std::future::Future;
use tracing::{debug, info, warn};

/// A revision reported by the remote host.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteRevision {
    /// Commit SHA (branch tracking) or release tag (release tracking).
    pub revision: String,
    /// Validator of this response, to send back on the next check. May be empty.
    pub cache_validator: String,
    /// Archive URL named by the response, if any.
    pub archive_url: Option<String>,
}

/// Result of one revision check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CheckOutcome {
    /// The remote confirmed the cached validator; nothing changed.
    Unchanged,
    /// The remote returned a revision. It may still equal the installed one.
    Found(RemoteRevision),
    /// The check could not be completed; treated as "no update this cycle".
    Failed(String),
}

/// Anything that can answer "what is the latest revision".
///
/// Implemented by [`RevisionChecker`] for the real API; tests substitute
/// scripted sources.
pub trait RevisionSource {
    /// Query the remote, sending `cache_validator` when non-empty.
    fn check(&self, cache_validator: &str) -> impl Future<Output = CheckOutcome> + Send;
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct RevisionPayload {
    sha: Option<String>,
    tag_name: Option<String>,
    zipball_url: Option<String>,
}

/// HTTP implementation of [`RevisionSource`].
#[derive(Debug, Clone)]
pub struct RevisionChecker {
    client: Client,
    url: String,
    track: Track,
}

impl RevisionChecker {
    /// Build a checker for the configured repository.
    ///
    /// The client carries the configured user agent and the check timeout.
    pub fn new(config: &UpdaterConfig) -> Result<Self, UpdateError> {
        let client = Client::builder()
            .user_agent(config.user_agent.clone())
            .timeout(config.request_timeout)
            .build()
            .map_err(|e| UpdateError::Config {
                setting: "user_agent".to_string(),
                reason: format!("failed to build HTTP client: {e}"),
            })?;

        Ok(Self {
            client,
            url: config.revision_url(),
            track: config.track,
        })
    }

    #[must_use]
    pub fn url(&self) -> &str {
        &self.url
    }

    async fn try_check(&self, cache_validator: &str) -> Result<CheckOutcome, UpdateError> {
        let failure = |reason: String| UpdateError::CheckFailure {
            reason,
        };

        let mut request = self.client.get(&self.url).header(ACCEPT, "application/vnd.github+json");
        if !cache_validator.is_empty() {
            request = request.header(IF_NONE_MATCH, cache_validator);
        }

        debug!("Checking {} for new revisions", self.url);
        let response = request.send().await.map_err(|e| failure(describe_request_error(&e)))?;

        let status = response.status();
        if status == StatusCode::NOT_MODIFIED {
            debug!("Remote reports no change for validator {cache_validator}");
            return Ok(CheckOutcome::Unchanged);
        }
        if !status.is_success() {
            return Err(failure(format!("HTTP {status} from {}", self.url)));
        }

        let cache_validator = response
            .headers()
            .get(ETAG)
            .and_then(|value| value.to_str().ok())
            .unwrap_or_default()
            .to_string();

        let body = response.bytes().await.map_err(|e| failure(describe_request_error(&e)))?;
        let payload = parse_revision_payload(&body)?;

        let revision = match self.track {
            Track::Branch => payload.sha.or(payload.tag_name),
            Track::Releases => payload.tag_name.or(payload.sha),
        }
        .filter(|revision| !revision.trim().is_empty())
        .ok_or_else(|| failure("response does not name a revision".to_string()))?;

        info!("Remote revision is {revision}");
        Ok(CheckOutcome::Found(RemoteRevision {
            revision,
            cache_validator,
            archive_url: payload.zipball_url.filter(|url| !url.is_empty()),
        }))
    }
}

impl RevisionSource for RevisionChecker {
    async fn check(&self, cache_validator: &str) -> CheckOutcome {
        match self.try_check(cache_validator).await {
            Ok(outcome) => outcome,
            Err(e) => {
                warn!("{e}");
                CheckOutcome::Failed(e.to_string())
            }
        }
    }
}

/// Parse the revision document, using the first element when the body is a list.
fn parse_revision_payload(body: &[u8]) -> Result<RevisionPayload, UpdateError> {
    let malformed = |reason: String| UpdateError::CheckFailure {
        reason: format!("malformed response: {reason}"),
    };

    let value: serde_json::Value = serde_json::from_slice(body).map_err(|e| malformed(e.to_string()))?;
    let entry = match value {
        serde_json::Value::Array(items) => {
            items.into_iter().next().ok_or_else(|| malformed("empty list".to_string()))?
        }
        other => other,
    };

    serde_json::from_value(entry).map_err(|e| malformed(e.to_string()))
}

pub(crate) fn describe_request_error(error: &reqwest::Error) -> String {
    if error.is_timeout() {
        format!("request timed out: {error}")
    } else if error.is_connect() {
        format!("connection failed: {error}")
    } else {
        error.to_string()
    }
}
