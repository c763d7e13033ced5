//! Test utilities for the updater
//!
//! Helpers shared by unit tests and the integration tests under `tests/`:
//!
//! - [`init_test_logging`] - one-time tracing setup
//! - [`build_zip`], [`write_tree`], [`snapshot_dir`] - archive and directory fixtures
//! - [`FakeRevisionSource`], [`FakeArchiveSource`] - scripted network seams
//! - [`StubServer`] - a loopback HTTP responder for exercising the real clients
//!
//! # Example
//!
//! ```rust,no_run
//! use annotator_updater::test_utils::{FakeArchiveSource, FakeRevisionSource};
//! use annotator_updater::update::{CheckOutcome, RemoteRevision};
//!
//! let checker = FakeRevisionSource::new([CheckOutcome::Found(RemoteRevision {
//!     revision: "abc123".to_string(),
//!     cache_validator: "etag1".to_string(),
//!     archive_url: None,
//! })]);
//! let fetcher = FakeArchiveSource::new([("repo-abc123/pixi.toml", "[project]")]);
//! ```

use crate::core::UpdateError;
use crate::update::{ArchiveSource, CheckOutcome, RevisionSource, unpack_archive};
use std::collections::{BTreeMap, VecDeque};
use std::io::{Cursor, Write};
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, Once};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;
use tracing::Level;
use tracing_subscriber::EnvFilter;

/// Global flag to ensure logging is only initialized once in tests
static INIT_LOGGING: Once = Once::new();

/// Initialize logging for tests.
///
/// Uses `level` when given, otherwise `RUST_LOG`; does nothing when neither is
/// set. Safe to call from every test.
///
/// ```bash
/// RUST_LOG=debug cargo test
/// ```
pub fn init_test_logging(level: Option<Level>) {
    INIT_LOGGING.call_once(|| {
        let filter = if let Some(level) = level {
            EnvFilter::new(level.to_string())
        } else if std::env::var("RUST_LOG").is_ok() {
            EnvFilter::from_default_env()
        } else {
            return;
        };

        let _ = tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_test_writer()
            .with_target(true)
            .with_thread_ids(false)
            .try_init();
    });
}

/// Build an in-memory zip archive from `(path, contents)` pairs.
pub fn build_zip<C: AsRef<[u8]>>(entries: &[(&str, C)]) -> Vec<u8> {
    let mut zip = zip::ZipWriter::new(Cursor::new(Vec::new()));
    for (name, contents) in entries {
        zip.start_file(*name, zip::write::SimpleFileOptions::default()).expect("start zip entry");
        zip.write_all(contents.as_ref()).expect("write zip entry");
    }
    zip.finish().expect("finish zip").into_inner()
}

/// Create `root` with the given `(relative path, contents)` files.
pub fn write_tree(root: &Path, files: &[(&str, &str)]) {
    std::fs::create_dir_all(root).expect("create tree root");
    for (relative, contents) in files {
        let path = root.join(relative);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).expect("create parent");
        }
        std::fs::write(&path, contents).expect("write fixture file");
    }
}

/// Every file under `root`, keyed by `/`-separated relative path.
///
/// Two snapshots are equal exactly when the trees hold the same files with the
/// same bytes.
pub fn snapshot_dir(root: &Path) -> BTreeMap<String, Vec<u8>> {
    walkdir::WalkDir::new(root)
        .into_iter()
        .filter_map(Result::ok)
        .filter(|entry| entry.file_type().is_file())
        .map(|entry| {
            let relative = entry
                .path()
                .strip_prefix(root)
                .expect("entry under root")
                .components()
                .map(|c| c.as_os_str().to_string_lossy().into_owned())
                .collect::<Vec<_>>()
                .join("/");
            let contents = std::fs::read(entry.path()).expect("read snapshot file");
            (relative, contents)
        })
        .collect()
}

/// Scripted [`RevisionSource`].
///
/// Returns the scripted outcomes in order and repeats the last one once the
/// script is exhausted. Clones share their script and counters.
#[derive(Debug, Clone)]
pub struct FakeRevisionSource {
    script: Arc<Mutex<VecDeque<CheckOutcome>>>,
    last: Arc<Mutex<CheckOutcome>>,
    calls: Arc<AtomicUsize>,
    validators: Arc<Mutex<Vec<String>>>,
}

impl FakeRevisionSource {
    pub fn new(outcomes: impl IntoIterator<Item = CheckOutcome>) -> Self {
        Self {
            script: Arc::new(Mutex::new(outcomes.into_iter().collect())),
            last: Arc::new(Mutex::new(CheckOutcome::Unchanged)),
            calls: Arc::new(AtomicUsize::new(0)),
            validators: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Number of checks performed.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Validators passed to each check, in order.
    pub fn validators(&self) -> Vec<String> {
        self.validators.lock().expect("validators lock").clone()
    }
}

impl RevisionSource for FakeRevisionSource {
    async fn check(&self, cache_validator: &str) -> CheckOutcome {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.validators.lock().expect("validators lock").push(cache_validator.to_string());

        let mut last = self.last.lock().expect("last lock");
        if let Some(next) = self.script.lock().expect("script lock").pop_front() {
            *last = next;
        }
        last.clone()
    }
}

/// [`ArchiveSource`] serving a fixed in-memory archive.
///
/// The archive goes through the real extraction and root discovery, so the
/// swap sees the same layout a download would produce.
#[derive(Debug, Clone)]
pub struct FakeArchiveSource {
    archive: Arc<Vec<u8>>,
    marker_file: String,
    failure: Option<UpdateError>,
    calls: Arc<AtomicUsize>,
    urls: Arc<Mutex<Vec<String>>>,
}

impl FakeArchiveSource {
    pub fn new<'a>(files: impl IntoIterator<Item = (&'a str, &'a str)>) -> Self {
        let entries: Vec<(&str, &[u8])> =
            files.into_iter().map(|(name, contents)| (name, contents.as_bytes())).collect();
        Self {
            archive: Arc::new(build_zip(&entries)),
            marker_file: crate::config::DEFAULT_MARKER_FILE.to_string(),
            failure: None,
            calls: Arc::new(AtomicUsize::new(0)),
            urls: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// A source whose every fetch fails with `error`.
    pub fn failing(error: UpdateError) -> Self {
        Self {
            failure: Some(error),
            ..Self::new(std::iter::empty())
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// URLs requested so far.
    pub fn urls(&self) -> Vec<String> {
        self.urls.lock().expect("urls lock").clone()
    }
}

impl ArchiveSource for FakeArchiveSource {
    async fn fetch(&self, url: &str, dest: &Path) -> Result<PathBuf, UpdateError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.urls.lock().expect("urls lock").push(url.to_string());

        if let Some(error) = &self.failure {
            return Err(error.clone());
        }

        let archive = dest.join(crate::update::fetcher::ARCHIVE_FILE_NAME);
        std::fs::write(&archive, self.archive.as_slice()).map_err(|e| UpdateError::Download {
            url: url.to_string(),
            reason: e.to_string(),
        })?;
        unpack_archive(&archive, dest, &self.marker_file).await
    }
}

/// One scripted HTTP response.
#[derive(Debug, Clone)]
pub struct StubResponse {
    pub status: u16,
    pub headers: Vec<(String, String)>,
    pub body: Vec<u8>,
}

impl StubResponse {
    pub fn new(status: u16) -> Self {
        Self {
            status,
            headers: Vec::new(),
            body: Vec::new(),
        }
    }

    pub fn json(body: &str) -> Self {
        Self::new(200).header("Content-Type", "application/json").body(body.as_bytes())
    }

    #[must_use]
    pub fn header(mut self, name: &str, value: &str) -> Self {
        self.headers.push((name.to_string(), value.to_string()));
        self
    }

    #[must_use]
    pub fn body(mut self, body: impl Into<Vec<u8>>) -> Self {
        self.body = body.into();
        self
    }
}

/// A request received by [`StubServer`].
#[derive(Debug, Clone)]
pub struct RecordedRequest {
    pub method: String,
    pub path: String,
    pub headers: Vec<(String, String)>,
}

impl RecordedRequest {
    /// Value of header `name`, compared case-insensitively.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }
}

/// Minimal HTTP/1.1 responder on a loopback port.
///
/// Answers each connection with the next scripted response (404 once the
/// script runs out) and closes it. Stops when dropped.
#[derive(Debug)]
pub struct StubServer {
    addr: SocketAddr,
    requests: Arc<Mutex<Vec<RecordedRequest>>>,
    task: tokio::task::JoinHandle<()>,
}

impl StubServer {
    pub async fn start(responses: impl IntoIterator<Item = StubResponse>) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind loopback");
        let addr = listener.local_addr().expect("local addr");
        let script: Arc<Mutex<VecDeque<StubResponse>>> =
            Arc::new(Mutex::new(responses.into_iter().collect()));
        let requests = Arc::new(Mutex::new(Vec::new()));

        let recorded = requests.clone();
        let task = tokio::spawn(async move {
            while let Ok((mut stream, _)) = listener.accept().await {
                let Some(request) = read_request(&mut stream).await else {
                    continue;
                };
                recorded.lock().expect("requests lock").push(request);

                let response = script
                    .lock()
                    .expect("script lock")
                    .pop_front()
                    .unwrap_or_else(|| StubResponse::new(404));
                let _ = stream.write_all(&encode_response(&response)).await;
                let _ = stream.shutdown().await;
            }
        });

        Self {
            addr,
            requests,
            task,
        }
    }

    /// Base URL of the server, without trailing slash.
    pub fn url(&self) -> String {
        format!("http://{}", self.addr)
    }

    pub fn requests(&self) -> Vec<RecordedRequest> {
        self.requests.lock().expect("requests lock").clone()
    }
}

impl Drop for StubServer {
    fn drop(&mut self) {
        self.task.abort();
    }
}

async fn read_request(stream: &mut tokio::net::TcpStream) -> Option<RecordedRequest> {
    let mut buffer = Vec::new();
    let mut chunk = [0u8; 1024];
    while !buffer.windows(4).any(|window| window == b"\r\n\r\n") {
        let read = stream.read(&mut chunk).await.ok()?;
        if read == 0 {
            return None;
        }
        buffer.extend_from_slice(&chunk[..read]);
    }

    let head = String::from_utf8_lossy(&buffer).into_owned();
    let mut lines = head.split("\r\n");
    let mut request_line = lines.next()?.split_whitespace();
    let method = request_line.next()?.to_string();
    let path = request_line.next()?.to_string();
    let headers = lines
        .take_while(|line| !line.is_empty())
        .filter_map(|line| line.split_once(':'))
        .map(|(name, value)| (name.trim().to_string(), value.trim().to_string()))
        .collect();

    Some(RecordedRequest {
        method,
        path,
        headers,
    })
}

fn encode_response(response: &StubResponse) -> Vec<u8> {
    let reason = reqwest::StatusCode::from_u16(response.status)
        .ok()
        .and_then(|status| status.canonical_reason())
        .unwrap_or("Unknown");

    let mut head = format!("HTTP/1.1 {} {reason}\r\n", response.status);
    for (name, value) in &response.headers {
        head.push_str(&format!("{name}: {value}\r\n"));
    }
    head.push_str(&format!("Content-Length: {}\r\nConnection: close\r\n\r\n", response.body.len()));

    let mut bytes = head.into_bytes();
    bytes.extend_from_slice(&response.body);
    bytes
}
