//! Whole runs against the real catalog client and state file.
//!
//! Catalog checksums must be real digests, so the "AAA" and "BBB" builds
//! below are the SHA-1 digests of two different payloads.

use std::time::Duration;

use plex_updater::catalog::CatalogClient;
use plex_updater::core::UpdateError;
use plex_updater::engine::{RunOptions, RunOutcome, UpdateEngine};
use plex_updater::models::{Platform, PlatformRecord, RunMode};
use plex_updater::state::{StateStore, TomlStateStore};
use plex_updater::test_utils::{RecordingInstaller, ScriptedConfirm, init_test_logging, sha1_hex};
use tempfile::TempDir;

use crate::support::{Route, TestServer, catalog_json, platform_toml};

const OLD_PACKAGE: &[u8] = b"plexmediaserver 1.0";
const NEW_PACKAGE: &[u8] = b"plexmediaserver 1.1";

struct Scenario {
    server: TestServer,
    dir: TempDir,
    state: TomlStateStore,
}

impl Scenario {
    /// Stored record `1.0/AAA`; the catalog offers `1.1/BBB` for `offered`.
    async fn new(offered: Platform) -> Self {
        init_test_logging(None);
        let server = TestServer::start(vec![("/pkg.deb", Route::ok(NEW_PACKAGE))]).await;
        server.route(
            "/5.json",
            Route::ok(catalog_json(offered, "1.1", &server.url("/pkg.deb"), &Self::bbb())),
        );

        let dir = TempDir::new().unwrap();
        let state_path = dir.path().join("config.toml");
        std::fs::write(&state_path, platform_toml(Platform::Amd64, "1.0", &Self::aaa(), "http://x/old.deb"))
            .unwrap();

        Self {
            server,
            dir,
            state: TomlStateStore::new(state_path),
        }
    }

    fn aaa() -> String {
        sha1_hex(OLD_PACKAGE)
    }

    fn bbb() -> String {
        sha1_hex(NEW_PACKAGE)
    }

    fn old_record() -> PlatformRecord {
        PlatformRecord {
            version: "1.0".to_string(),
            checksum: Self::aaa(),
            url: "http://x/old.deb".to_string(),
        }
    }

    fn new_record(&self) -> PlatformRecord {
        PlatformRecord {
            version: "1.1".to_string(),
            checksum: Self::bbb(),
            url: self.server.url("/pkg.deb"),
        }
    }

    fn download_dir(&self) -> std::path::PathBuf {
        self.dir.path().join("downloads")
    }

    async fn run(&self, mode: RunMode, installer: RecordingInstaller) -> Result<RunOutcome, UpdateError> {
        let options = RunOptions {
            platform: Platform::Amd64,
            mode,
            download_dir: self.download_dir(),
        };
        let source = CatalogClient::new(self.server.url("/5.json"), Duration::from_secs(5)).unwrap();
        UpdateEngine::new(options, source, self.state.clone(), installer, ScriptedConfirm::approving())
            .run()
            .await
    }

    fn leftover_packages(&self) -> usize {
        std::fs::read_dir(self.download_dir()).map(|entries| entries.count()).unwrap_or(0)
    }
}

#[tokio::test]
async fn test_upgrade_with_successful_installer_records_new_build() {
    let scenario = Scenario::new(Platform::Amd64).await;
    let installer = RecordingInstaller::succeeding();

    let outcome = scenario.run(RunMode::Normal, installer.clone()).await.unwrap();

    assert_eq!(outcome, RunOutcome::Installed { record: scenario.new_record() });
    assert_eq!(scenario.state.load(Platform::Amd64).await.unwrap(), scenario.new_record());
    assert_eq!(installer.calls().len(), 1);
    assert_eq!(scenario.leftover_packages(), 0);
}

#[tokio::test]
async fn test_upgrade_with_failing_installer_keeps_old_build() {
    let scenario = Scenario::new(Platform::Amd64).await;

    let err = scenario.run(RunMode::Normal, RecordingInstaller::failing(1, "dpkg error")).await.unwrap_err();

    assert!(matches!(err, UpdateError::InstallFailure { exit_code: Some(1), .. }));
    assert_eq!(scenario.state.load(Platform::Amd64).await.unwrap(), Scenario::old_record());
    assert_eq!(scenario.leftover_packages(), 0);
}

#[tokio::test]
async fn test_second_run_after_install_is_a_no_op() {
    let scenario = Scenario::new(Platform::Amd64).await;
    scenario.run(RunMode::Normal, RecordingInstaller::succeeding()).await.unwrap();

    let installer = RecordingInstaller::succeeding();
    let outcome = scenario.run(RunMode::Normal, installer.clone()).await.unwrap();

    assert_eq!(outcome, RunOutcome::UpToDate { record: scenario.new_record() });
    assert!(installer.calls().is_empty());
    let package_downloads = scenario.server.hits().iter().filter(|p| *p == "/pkg.deb").count();
    assert_eq!(package_downloads, 1);
}

#[tokio::test]
async fn test_dry_run_leaves_state_file_byte_identical() {
    let scenario = Scenario::new(Platform::Amd64).await;
    let before = std::fs::read(scenario.state.path()).unwrap();

    let outcome = scenario.run(RunMode::DryRun, RecordingInstaller::succeeding()).await.unwrap();

    assert!(matches!(outcome, RunOutcome::WouldUpdate { .. }));
    assert_eq!(std::fs::read(scenario.state.path()).unwrap(), before);
    assert!(!scenario.server.hits().contains(&"/pkg.deb".to_string()));
}

#[tokio::test]
async fn test_download_only_keeps_verified_package() {
    let scenario = Scenario::new(Platform::Amd64).await;
    let installer = RecordingInstaller::succeeding();

    let outcome = scenario.run(RunMode::DownloadOnly, installer.clone()).await.unwrap();

    let (artifact, record) = match outcome {
        RunOutcome::Downloaded { artifact, record } => (artifact, record),
        other => panic!("expected Downloaded, got {other:?}"),
    };
    assert_eq!(std::fs::read(&artifact).unwrap(), NEW_PACKAGE);
    assert_eq!(artifact, scenario.download_dir().join("plexmediaserver_1.1_amd64.deb"));
    assert_eq!(record, scenario.new_record());
    assert_eq!(scenario.state.load(Platform::Amd64).await.unwrap(), scenario.new_record());
    assert!(installer.calls().is_empty());
}

#[tokio::test]
async fn test_corrupted_download_is_rejected() {
    let scenario = Scenario::new(Platform::Amd64).await;
    scenario.server.route("/pkg.deb", Route::ok(b"truncated".to_vec()));

    let err = scenario.run(RunMode::Normal, RecordingInstaller::succeeding()).await.unwrap_err();

    match err {
        UpdateError::ChecksumMismatch { expected, actual, .. } => {
            assert_eq!(expected, Scenario::bbb());
            assert_eq!(actual, sha1_hex(b"truncated"));
        }
        other => panic!("expected checksum mismatch, got {other:?}"),
    }
    assert_eq!(scenario.state.load(Platform::Amd64).await.unwrap(), Scenario::old_record());
    assert_eq!(scenario.leftover_packages(), 0);
}

#[tokio::test]
async fn test_platform_not_in_catalog_changes_nothing() {
    let scenario = Scenario::new(Platform::Armhf).await;
    let before = std::fs::read(scenario.state.path()).unwrap();

    let outcome = scenario.run(RunMode::Normal, RecordingInstaller::succeeding()).await.unwrap();

    assert_eq!(outcome, RunOutcome::NotFound { record: Scenario::old_record() });
    assert_eq!(std::fs::read(scenario.state.path()).unwrap(), before);
}
