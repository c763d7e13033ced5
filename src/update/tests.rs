use super::*;
use crate::config::{Track, UpdaterConfig};
use crate::core::UpdateError;
use crate::test_utils::{
    FakeArchiveSource, FakeRevisionSource, StubResponse, StubServer, build_zip, init_test_logging,
    snapshot_dir, write_tree,
};
use chrono::{DateTime, Utc};
use std::time::Duration;
use tempfile::TempDir;

const NEW_TREE: [(&str, &str); 3] = [
    ("2d-point-annotator-abc123/pixi.toml", "[project]\nname = \"annotator\"\n"),
    ("2d-point-annotator-abc123/src/app.py", "VERSION = 2\n"),
    ("2d-point-annotator-abc123/README.md", "new\n"),
];

struct Install {
    _temp: TempDir,
    config: UpdaterConfig,
}

impl Install {
    fn new() -> Self {
        init_test_logging(None);
        let temp = TempDir::new().unwrap();
        let config = UpdaterConfig::new(
            "OrthoDriven",
            "2d-point-annotator",
            "main",
            temp.path().join("annotator"),
        );
        write_tree(&config.app_dir, &[("pixi.toml", "[project]\n"), ("src/app.py", "VERSION = 1\n")]);
        Self {
            _temp: temp,
            config,
        }
    }

    fn without_rate_limit(mut self) -> Self {
        self.config.min_check_interval = Duration::ZERO;
        self
    }

    fn store(&self) -> StateStore {
        StateStore::new(self.config.state_path.clone())
    }

    fn write_state(&self, state: &UpdateState) {
        std::fs::write(&self.config.state_path, serde_json::to_string_pretty(state).unwrap())
            .unwrap();
    }

    fn orchestrator(
        &self,
        checker: &FakeRevisionSource,
        fetcher: &FakeArchiveSource,
    ) -> UpdateOrchestrator<FakeRevisionSource, FakeArchiveSource> {
        UpdateOrchestrator::with_sources(self.config.clone(), checker.clone(), fetcher.clone())
    }
}

fn found(revision: &str, validator: &str) -> CheckOutcome {
    CheckOutcome::Found(RemoteRevision {
        revision: revision.to_string(),
        cache_validator: validator.to_string(),
        archive_url: None,
    })
}

fn applied(revision: &str, validator: &str, at: DateTime<Utc>) -> UpdateState {
    UpdateState {
        revision: revision.to_string(),
        cache_validator: validator.to_string(),
        last_applied_at: at,
        last_checked_at: at,
    }
}

fn long_ago() -> DateTime<Utc> {
    Utc::now() - chrono::Duration::hours(1)
}

#[tokio::test]
async fn test_fresh_install_applies_new_revision() {
    let install = Install::new();
    let checker = FakeRevisionSource::new([found("abc123", "etag1")]);
    let fetcher = FakeArchiveSource::new(NEW_TREE);

    let outcome = install.orchestrator(&checker, &fetcher).run().await;

    assert_eq!(
        outcome,
        UpdateOutcome::Updated {
            revision: "abc123".to_string()
        }
    );
    let state = install.store().load();
    assert_eq!(state.revision, "abc123");
    assert_eq!(state.cache_validator, "etag1");
    assert_eq!(state.last_applied_at, state.last_checked_at);

    let app = &install.config.app_dir;
    assert_eq!(std::fs::read_to_string(app.join("src/app.py")).unwrap(), "VERSION = 2\n");
    assert!(app.join("README.md").exists());

    assert_eq!(fetcher.urls(), vec![install.config.default_archive_url()]);
    assert_eq!(checker.validators(), vec![String::new()]);
    assert!(!install.config.scratch_dir.exists());
    assert!(!install.config.staging_dir().exists());
    assert!(!install.config.backup_dir().exists());
}

#[tokio::test]
async fn test_repeated_runs_without_remote_change_are_idempotent() {
    let install = Install::new().without_rate_limit();
    let applied_at = long_ago();
    install.write_state(&applied("abc123", "etag1", applied_at));
    let checker = FakeRevisionSource::new([CheckOutcome::Unchanged]);
    let fetcher = FakeArchiveSource::new(NEW_TREE);
    let orchestrator = install.orchestrator(&checker, &fetcher);

    for _ in 0..2 {
        let outcome = orchestrator.run().await;
        assert_eq!(
            outcome,
            UpdateOutcome::UpToDate {
                revision: "abc123".to_string()
            }
        );
    }

    let state = install.store().load();
    assert_eq!(state.revision, "abc123");
    assert_eq!(state.cache_validator, "etag1");
    assert_eq!(state.last_applied_at, applied_at);
    assert_eq!(checker.validators(), vec!["etag1".to_string(), "etag1".to_string()]);
    assert_eq!(fetcher.calls(), 0);
}

#[tokio::test]
async fn test_recent_check_skips_without_network() {
    let install = Install::new();
    let recent = Utc::now() - chrono::Duration::seconds(5);
    install.write_state(&applied("abc123", "etag1", recent));
    let before = std::fs::read(&install.config.state_path).unwrap();
    let checker = FakeRevisionSource::new([found("def456", "etag2")]);
    let fetcher = FakeArchiveSource::new(NEW_TREE);

    let outcome = install.orchestrator(&checker, &fetcher).run().await;

    match outcome {
        UpdateOutcome::SkippedRateLimited {
            remaining,
        } => assert!(remaining <= Duration::from_secs(10)),
        other => panic!("expected skip, got {other:?}"),
    }
    assert_eq!(checker.calls(), 0);
    assert_eq!(fetcher.calls(), 0);
    assert_eq!(std::fs::read(&install.config.state_path).unwrap(), before);
}

#[tokio::test]
async fn test_force_bypasses_rate_limit() {
    let install = Install::new();
    install.write_state(&applied("abc123", "etag1", Utc::now()));
    let checker = FakeRevisionSource::new([CheckOutcome::Unchanged]);
    let fetcher = FakeArchiveSource::new(NEW_TREE);

    let outcome = install.orchestrator(&checker, &fetcher).force(true).run().await;

    assert_eq!(outcome.label(), "up-to-date");
    assert_eq!(checker.calls(), 1);
}

#[tokio::test]
async fn test_future_check_time_is_reset_and_check_proceeds() {
    let install = Install::new();
    let future = Utc::now() + chrono::Duration::days(2);
    install.write_state(&UpdateState {
        last_checked_at: future,
        ..applied("abc123", "etag1", long_ago())
    });
    let checker = FakeRevisionSource::new([CheckOutcome::Unchanged]);
    let fetcher = FakeArchiveSource::new(NEW_TREE);

    let outcome = install.orchestrator(&checker, &fetcher).run().await;

    assert_eq!(outcome.label(), "up-to-date");
    assert_eq!(checker.calls(), 1);
    let state = install.store().load();
    assert!(state.last_checked_at <= Utc::now());
    assert!(state.last_checked_at < future);
}

#[tokio::test]
async fn test_matching_revision_skips_fetch_and_refreshes_validator() {
    let install = Install::new();
    let applied_at = long_ago();
    install.write_state(&applied("abc123", "etag1", applied_at));
    let before = snapshot_dir(&install.config.app_dir);
    let checker = FakeRevisionSource::new([found("abc123", "etag2")]);
    let fetcher = FakeArchiveSource::new(NEW_TREE);

    let outcome = install.orchestrator(&checker, &fetcher).run().await;

    assert_eq!(
        outcome,
        UpdateOutcome::UpToDate {
            revision: "abc123".to_string()
        }
    );
    assert_eq!(fetcher.calls(), 0);
    assert_eq!(snapshot_dir(&install.config.app_dir), before);

    let state = install.store().load();
    assert_eq!(state.revision, "abc123");
    assert_eq!(state.cache_validator, "etag2");
    assert_eq!(state.last_applied_at, applied_at);
    assert!(state.last_checked_at > applied_at);
}

#[tokio::test]
async fn test_matching_revision_without_etag_keeps_validator() {
    let install = Install::new().without_rate_limit();
    let applied_at = long_ago();
    install.write_state(&applied("abc123", "etag1", applied_at));
    let checker = FakeRevisionSource::new([found("abc123", ""), CheckOutcome::Unchanged]);
    let fetcher = FakeArchiveSource::new(NEW_TREE);

    let outcome = install.orchestrator(&checker, &fetcher).run().await;
    assert_eq!(outcome.label(), "up-to-date");

    let state = install.store().load();
    assert_eq!(state.cache_validator, "etag1");
    assert!(state.last_checked_at > applied_at);

    // The next check still sends the stored validator
    install.orchestrator(&checker, &fetcher).run().await;
    assert_eq!(checker.validators(), vec!["etag1".to_string(), "etag1".to_string()]);
    assert_eq!(fetcher.calls(), 0);
}

#[tokio::test]
async fn test_unchanged_touches_check_time_only() {
    let install = Install::new();
    let applied_at = long_ago();
    install.write_state(&applied("abc123", "etag1", applied_at));
    let before = snapshot_dir(&install.config.app_dir);
    let checker = FakeRevisionSource::new([CheckOutcome::Unchanged]);
    let fetcher = FakeArchiveSource::new(NEW_TREE);

    install.orchestrator(&checker, &fetcher).run().await;

    let state = install.store().load();
    assert!(state.last_checked_at > applied_at);
    assert_eq!(state.revision, "abc123");
    assert_eq!(state.cache_validator, "etag1");
    assert_eq!(state.last_applied_at, applied_at);
    assert_eq!(snapshot_dir(&install.config.app_dir), before);
    assert_eq!(fetcher.calls(), 0);
}

#[tokio::test]
async fn test_check_failure_touches_check_time_and_keeps_validator() {
    let install = Install::new();
    let applied_at = long_ago();
    install.write_state(&applied("abc123", "etag1", applied_at));
    let checker = FakeRevisionSource::new([CheckOutcome::Failed("request timed out".to_string())]);
    let fetcher = FakeArchiveSource::new(NEW_TREE);

    let outcome = install.orchestrator(&checker, &fetcher).run().await;

    assert_eq!(
        outcome,
        UpdateOutcome::CheckFailed {
            reason: "request timed out".to_string()
        }
    );
    assert_eq!(outcome.exit_code(), 3);
    let state = install.store().load();
    assert_eq!(state.cache_validator, "etag1");
    assert!(state.last_checked_at > applied_at);
}

#[tokio::test]
async fn test_swap_failure_restores_previous_installation() {
    let install = Install::new();
    let applied_at = long_ago();
    install.write_state(&applied("abc123", "etag1", applied_at));
    let before = snapshot_dir(&install.config.app_dir);
    let checker = FakeRevisionSource::new([found("def456", "etag2")]);
    let fetcher = FakeArchiveSource::new(NEW_TREE);
    let swapper = DirectorySwapper::new(&install.config).fail_at(SwapStep::Promote);

    let outcome = install.orchestrator(&checker, &fetcher).with_swapper(swapper).run().await;

    match &outcome {
        UpdateOutcome::UpdateFailed {
            error: UpdateError::Swap {
                step,
                ..
            },
        } => assert_eq!(step, "promote"),
        other => panic!("expected swap failure, got {other:?}"),
    }
    assert_eq!(outcome.exit_code(), 1);
    assert_eq!(snapshot_dir(&install.config.app_dir), before);

    let state = install.store().load();
    assert_eq!(state.revision, "abc123");
    assert_eq!(state.cache_validator, "etag1");
    assert!(state.last_checked_at > applied_at);
    assert!(!install.config.backup_dir().exists());
    assert!(!install.config.staging_dir().exists());
    assert!(!install.config.scratch_dir.exists());
}

#[tokio::test]
async fn test_every_swap_fault_leaves_live_directory_intact() {
    for step in [SwapStep::Stage, SwapStep::Backup, SwapStep::Promote] {
        let install = Install::new();
        let before = snapshot_dir(&install.config.app_dir);
        let checker = FakeRevisionSource::new([found("def456", "etag2")]);
        let fetcher = FakeArchiveSource::new(NEW_TREE);
        let swapper = DirectorySwapper::new(&install.config).fail_at(step);

        let outcome = install.orchestrator(&checker, &fetcher).with_swapper(swapper).run().await;

        assert_eq!(outcome.label(), "update-failed", "fault at {step}");
        assert_eq!(snapshot_dir(&install.config.app_dir), before, "fault at {step}");
        assert!(install.store().load().revision.is_empty(), "fault at {step}");
    }
}

#[tokio::test]
async fn test_failed_rollback_is_reported_and_recovered_next_cycle() {
    let install = Install::new().without_rate_limit();
    let before = snapshot_dir(&install.config.app_dir);
    let checker = FakeRevisionSource::new([found("def456", "etag2"), CheckOutcome::Unchanged]);
    let fetcher = FakeArchiveSource::new(NEW_TREE);
    let swapper = DirectorySwapper::new(&install.config)
        .fail_at(SwapStep::Promote)
        .fail_at(SwapStep::Restore);

    let outcome = install.orchestrator(&checker, &fetcher).with_swapper(swapper).run().await;

    assert_eq!(outcome.exit_code(), 4);
    assert!(!install.config.app_dir.exists());
    assert_eq!(snapshot_dir(&install.config.backup_dir()), before);

    // The next cycle restores the backup before doing anything else
    let outcome = install.orchestrator(&checker, &fetcher).run().await;
    assert_eq!(outcome.label(), "up-to-date");
    assert_eq!(snapshot_dir(&install.config.app_dir), before);
    assert!(!install.config.backup_dir().exists());
}

#[tokio::test]
async fn test_fetch_failure_leaves_installation_untouched() {
    let install = Install::new();
    let before = snapshot_dir(&install.config.app_dir);
    let checker = FakeRevisionSource::new([found("def456", "etag2")]);
    let fetcher = FakeArchiveSource::failing(UpdateError::Download {
        url: "https://github.com/x.zip".to_string(),
        reason: "HTTP 502 Bad Gateway".to_string(),
    });

    let outcome = install.orchestrator(&checker, &fetcher).run().await;

    assert!(matches!(
        outcome,
        UpdateOutcome::UpdateFailed {
            error: UpdateError::Download { .. }
        }
    ));
    assert_eq!(snapshot_dir(&install.config.app_dir), before);
    assert!(install.store().load().revision.is_empty());
    assert!(install.config.state_path.exists());
    assert!(!install.config.scratch_dir.exists());
}

#[tokio::test]
async fn test_archive_without_marker_is_rejected() {
    let install = Install::new();
    let before = snapshot_dir(&install.config.app_dir);
    let checker = FakeRevisionSource::new([found("def456", "etag2")]);
    let fetcher = FakeArchiveSource::new([("repo-def456/README.md", "no project here")]);

    let outcome = install.orchestrator(&checker, &fetcher).run().await;

    assert!(matches!(
        outcome,
        UpdateOutcome::UpdateFailed {
            error: UpdateError::ProjectRootNotFound { .. }
        }
    ));
    assert_eq!(snapshot_dir(&install.config.app_dir), before);
}

#[tokio::test]
async fn test_remote_archive_url_takes_precedence() {
    let install = Install::new();
    let checker = FakeRevisionSource::new([CheckOutcome::Found(RemoteRevision {
        revision: "v1.2.0".to_string(),
        cache_validator: String::new(),
        archive_url: Some("https://api.github.com/repos/o/r/zipball/v1.2.0".to_string()),
    })]);
    let fetcher = FakeArchiveSource::new(NEW_TREE);

    let outcome = install.orchestrator(&checker, &fetcher).run().await;

    assert_eq!(outcome.label(), "updated");
    assert_eq!(fetcher.urls(), vec!["https://api.github.com/repos/o/r/zipball/v1.2.0".to_string()]);
}

#[tokio::test]
async fn test_release_without_archive_is_not_installed_from_branch() {
    let mut install = Install::new();
    install.config.track = Track::Releases;
    let before = snapshot_dir(&install.config.app_dir);
    let checker = FakeRevisionSource::new([found("v1.3.0", "etag1")]);
    let fetcher = FakeArchiveSource::new(NEW_TREE);

    let outcome = install.orchestrator(&checker, &fetcher).run().await;

    match &outcome {
        UpdateOutcome::UpdateFailed {
            error: UpdateError::Download {
                url,
                reason,
            },
        } => {
            assert_eq!(url, &install.config.revision_url());
            assert!(reason.contains("v1.3.0"), "{reason}");
        }
        other => panic!("expected a failed update, got {other:?}"),
    }
    assert_eq!(outcome.exit_code(), 1);
    assert_eq!(fetcher.calls(), 0);
    assert_eq!(snapshot_dir(&install.config.app_dir), before);
    assert!(install.store().load().revision.is_empty());
}

#[tokio::test]
async fn test_leftovers_of_interrupted_cycle_are_removed() {
    let install = Install::new();
    let root = &install.config.install_root;
    write_tree(&install.config.staging_dir(), &[("pixi.toml", "half")]);
    write_tree(&install.config.backup_dir(), &[("pixi.toml", "stale")]);
    write_tree(&root.join("app.old2"), &[("pixi.toml", "older")]);
    write_tree(&install.config.scratch_dir, &[("download.zip", "partial")]);
    let checker = FakeRevisionSource::new([CheckOutcome::Unchanged]);
    let fetcher = FakeArchiveSource::new(NEW_TREE);

    install.orchestrator(&checker, &fetcher).run().await;

    assert!(!install.config.staging_dir().exists());
    assert!(!install.config.backup_dir().exists());
    assert!(!root.join("app.old2").exists());
    assert!(!install.config.scratch_dir.exists());
    assert!(install.config.app_dir.exists());
}

#[tokio::test]
async fn test_state_write_failure_does_not_undo_swap() {
    let install = Install::new();
    // A directory squatting on the state path makes every write fail
    std::fs::create_dir_all(&install.config.state_path).unwrap();
    let checker = FakeRevisionSource::new([found("abc123", "etag1")]);
    let fetcher = FakeArchiveSource::new(NEW_TREE);

    let outcome = install.orchestrator(&checker, &fetcher).run().await;

    assert_eq!(
        outcome,
        UpdateOutcome::Updated {
            revision: "abc123".to_string()
        }
    );
    assert_eq!(
        std::fs::read_to_string(install.config.app_dir.join("src/app.py")).unwrap(),
        "VERSION = 2\n"
    );
}

#[tokio::test]
async fn test_concurrent_cycles_are_serialized() {
    let install = Install::new();
    let checker = FakeRevisionSource::new([CheckOutcome::Unchanged]);
    let fetcher = FakeArchiveSource::new(NEW_TREE);
    let first = install.orchestrator(&checker, &fetcher);
    let second = install.orchestrator(&checker, &fetcher);

    let (a, b) = tokio::join!(first.run(), second.run());

    let mut labels = [a.label(), b.label()];
    labels.sort_unstable();
    assert_eq!(labels, ["skipped-rate-limited", "up-to-date"]);
    assert_eq!(checker.calls(), 1);
}

// HTTP clients against a loopback responder

fn http_config(install: &Install, server: &StubServer) -> UpdaterConfig {
    let mut config = install.config.clone();
    config.api_base_url = server.url();
    config.archive_base_url = server.url();
    config
}

#[tokio::test]
async fn test_checker_sends_validator_and_reads_not_modified() {
    let install = Install::new();
    let server = StubServer::start([StubResponse::new(304)]).await;
    let checker = RevisionChecker::new(&http_config(&install, &server)).unwrap();

    assert_eq!(checker.check("W/\"etag1\"").await, CheckOutcome::Unchanged);

    let requests = server.requests();
    assert_eq!(requests.len(), 1);
    assert_eq!(requests[0].method, "GET");
    assert_eq!(requests[0].path, "/repos/OrthoDriven/2d-point-annotator/commits/main");
    assert_eq!(requests[0].header("if-none-match"), Some("W/\"etag1\""));
    assert_eq!(requests[0].header("user-agent"), Some("2d-point-annotator-updater"));
}

#[tokio::test]
async fn test_checker_reads_revision_and_etag() {
    let install = Install::new();
    let server = StubServer::start([StubResponse::json(r#"{"sha": "abc123", "commit": {"message": "x"}}"#)
        .header("ETag", "W/\"etag1\"")])
    .await;
    let checker = RevisionChecker::new(&http_config(&install, &server)).unwrap();

    let outcome = checker.check("").await;

    assert_eq!(
        outcome,
        CheckOutcome::Found(RemoteRevision {
            revision: "abc123".to_string(),
            cache_validator: "W/\"etag1\"".to_string(),
            archive_url: None,
        })
    );
    // No validator yet, so no conditional header
    assert_eq!(server.requests()[0].header("if-none-match"), None);
}

#[tokio::test]
async fn test_checker_follows_latest_release() {
    let install = Install::new();
    let server = StubServer::start([StubResponse::json(
        r#"[{"tag_name": "v2.0.0", "zipball_url": "https://api.github.com/repos/o/r/zipball/v2.0.0"},
            {"tag_name": "v1.9.0", "zipball_url": "https://api.github.com/repos/o/r/zipball/v1.9.0"}]"#,
    )])
    .await;
    let mut config = http_config(&install, &server);
    config.track = Track::Releases;
    let checker = RevisionChecker::new(&config).unwrap();

    match checker.check("").await {
        CheckOutcome::Found(remote) => {
            assert_eq!(remote.revision, "v2.0.0");
            assert_eq!(
                remote.archive_url.as_deref(),
                Some("https://api.github.com/repos/o/r/zipball/v2.0.0")
            );
            assert!(remote.cache_validator.is_empty());
        }
        other => panic!("expected a release, got {other:?}"),
    }
    assert_eq!(server.requests()[0].path, "/repos/OrthoDriven/2d-point-annotator/releases");
}

#[tokio::test]
async fn test_checker_classifies_errors_as_failed() {
    let install = Install::new();
    let server = StubServer::start([
        StubResponse::new(500).body("boom"),
        StubResponse::json("<html>rate limited</html>"),
        StubResponse::json(r#"{"commit": {}}"#),
    ])
    .await;
    let checker = RevisionChecker::new(&http_config(&install, &server)).unwrap();

    for _ in 0..3 {
        assert!(matches!(checker.check("").await, CheckOutcome::Failed(_)));
    }
}

#[tokio::test]
async fn test_checker_unreachable_host_is_failed() {
    let install = Install::new();
    let mut config = install.config.clone();
    // Nothing listens on the discard port of the loopback interface
    config.api_base_url = "http://127.0.0.1:9".to_string();
    config.request_timeout = Duration::from_secs(2);
    let checker = RevisionChecker::new(&config).unwrap();

    assert!(matches!(checker.check("").await, CheckOutcome::Failed(_)));
}

#[tokio::test]
async fn test_fetcher_downloads_and_finds_project_root() {
    let install = Install::new();
    let archive = build_zip(&[
        ("2d-point-annotator-main/pixi.toml", b"[project]".as_slice()),
        ("2d-point-annotator-main/src/app.py", b"VERSION = 3".as_slice()),
    ]);
    let server = StubServer::start([StubResponse::new(200).body(archive)]).await;
    let fetcher = ArchiveFetcher::new(&http_config(&install, &server)).unwrap();
    let dest = TempDir::new().unwrap();

    let root = fetcher.fetch(&format!("{}/archive.zip", server.url()), dest.path()).await.unwrap();

    assert_eq!(root, dest.path().join("2d-point-annotator-main"));
    assert_eq!(std::fs::read_to_string(root.join("src/app.py")).unwrap(), "VERSION = 3");
    assert!(!dest.path().join(fetcher::ARCHIVE_FILE_NAME).exists());
}

#[tokio::test]
async fn test_fetcher_rejects_error_status() {
    let install = Install::new();
    let server = StubServer::start([StubResponse::new(404)]).await;
    let fetcher = ArchiveFetcher::new(&http_config(&install, &server)).unwrap();
    let dest = TempDir::new().unwrap();

    let err = fetcher.fetch(&format!("{}/missing.zip", server.url()), dest.path()).await.unwrap_err();
    assert!(matches!(err, UpdateError::Download { .. }));
}

#[tokio::test]
async fn test_full_cycle_over_http() {
    let install = Install::new();
    let archive = build_zip(&[
        ("2d-point-annotator-abc123/pixi.toml", b"[project]".as_slice()),
        ("2d-point-annotator-abc123/src/app.py", b"VERSION = 2\n".as_slice()),
    ]);
    let server = StubServer::start([
        StubResponse::json(r#"{"sha": "abc123"}"#).header("ETag", "\"etag1\""),
        StubResponse::new(200).header("Content-Type", "application/zip").body(archive),
    ])
    .await;

    let outcome = UpdateOrchestrator::from_config(http_config(&install, &server)).unwrap().run().await;

    assert_eq!(
        outcome,
        UpdateOutcome::Updated {
            revision: "abc123".to_string()
        }
    );
    let requests = server.requests();
    assert_eq!(requests.len(), 2);
    assert_eq!(requests[1].path, "/OrthoDriven/2d-point-annotator/archive/refs/heads/main.zip");

    let state = install.store().load();
    assert_eq!(state.revision, "abc123");
    assert_eq!(state.cache_validator, "\"etag1\"");
    assert_eq!(
        std::fs::read_to_string(install.config.app_dir.join("src/app.py")).unwrap(),
        "VERSION = 2\n"
    );
}
