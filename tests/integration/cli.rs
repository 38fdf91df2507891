use std::path::{Path, PathBuf};

use assert_cmd::Command;
use plex_updater::models::Platform;
use plex_updater::test_utils::sha1_hex;
use predicates::prelude::*;
use tempfile::TempDir;

use crate::support::{Route, TestServer, catalog_json, platform_toml, settings_toml};

const PACKAGE: &[u8] = b"plexmediaserver 1.41";

fn plex_update(config: &Path) -> Command {
    let mut cmd = Command::cargo_bin("plex-update").unwrap();
    cmd.env_remove("RUST_LOG")
        .env_remove("PLEX_UPDATE_CONFIG")
        .env("PLEX_UPDATE_NO_PROGRESS", "1")
        .arg("--config")
        .arg(config);
    cmd
}

/// A config file pointing at `server` with `installer` as the install program.
async fn setup(installer: &str, stored_checksum: Option<&str>) -> (TestServer, TempDir, PathBuf) {
    let server = TestServer::start(vec![("/pkg.deb", Route::ok(PACKAGE))]).await;
    server.route(
        "/5.json",
        Route::ok(catalog_json(Platform::Amd64, "1.41", &server.url("/pkg.deb"), &sha1_hex(PACKAGE))),
    );

    let dir = TempDir::new().unwrap();
    let config = dir.path().join("config.toml");
    let mut content = settings_toml(&server.url("/5.json"), &dir.path().join("downloads"), installer);
    if let Some(checksum) = stored_checksum {
        content.push_str(&platform_toml(Platform::Amd64, "1.40", checksum, "http://x/old.deb"));
    }
    std::fs::write(&config, content).unwrap();

    (server, dir, config)
}

async fn run_blocking<F>(f: F)
where
    F: FnOnce() + Send + 'static,
{
    tokio::task::spawn_blocking(f).await.unwrap();
}

#[test]
fn test_help_lists_platforms() {
    Command::cargo_bin("plex-update")
        .unwrap()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("amd64"))
        .stdout(predicate::str::contains("armhf"))
        .stdout(predicate::str::contains("--download-only"));
}

#[test]
fn test_unknown_platform_is_a_usage_error() {
    Command::cargo_bin("plex-update")
        .unwrap()
        .arg("sparc")
        .assert()
        .failure()
        .stderr(predicate::str::contains("sparc"));
}

#[test]
fn test_conflicting_modes_are_rejected() {
    Command::cargo_bin("plex-update")
        .unwrap()
        .args(["amd64", "--dry-run", "--download-only"])
        .assert()
        .failure();
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_up_to_date_exits_zero() {
    let checksum = sha1_hex(PACKAGE);
    let (_server, _dir, config) = setup("false", Some(&checksum)).await;

    run_blocking(move || {
        plex_update(&config)
            .arg("amd64")
            .assert()
            .success()
            .stdout(predicate::str::contains("is up to date"));
    })
    .await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_dry_run_reports_and_keeps_config() {
    let (_server, _dir, config) = setup("false", Some("aaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaa")).await;
    let before = std::fs::read_to_string(&config).unwrap();

    let config_clone = config.clone();
    run_blocking(move || {
        plex_update(&config_clone)
            .args(["AMD64", "--dry-run"])
            .assert()
            .success()
            .stdout(predicate::str::contains("Would update amd64 from 1.40 to 1.41"));
    })
    .await;

    assert_eq!(std::fs::read_to_string(&config).unwrap(), before);
}

#[cfg(unix)]
#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_install_records_new_build() {
    let (_server, dir, config) = setup("true", None).await;

    let config_clone = config.clone();
    run_blocking(move || {
        plex_update(&config_clone)
            .arg("amd64")
            .assert()
            .success()
            .stdout(predicate::str::contains("Installed Plex Media Server 1.41"));
    })
    .await;

    let content = std::fs::read_to_string(&config).unwrap();
    assert!(content.contains(&sha1_hex(PACKAGE)));
    assert!(content.contains("catalog_url"));
    assert!(!dir.path().join("downloads").join("plexmediaserver_1.41_amd64.deb").exists());
}

#[cfg(unix)]
#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_failed_install_exits_one_and_keeps_state() {
    let old = "aaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaa";
    let (_server, _dir, config) = setup("false", Some(old)).await;
    let before = std::fs::read_to_string(&config).unwrap();

    let config_clone = config.clone();
    run_blocking(move || {
        plex_update(&config_clone)
            .arg("amd64")
            .assert()
            .code(1)
            .stderr(predicate::str::contains("Installer failed with exit code 1"));
    })
    .await;

    assert_eq!(std::fs::read_to_string(&config).unwrap(), before);
}

#[cfg(unix)]
#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_escalation_without_terminal_is_declined() {
    if plex_updater::installer::is_elevated() {
        // Root never escalates, so there is nothing to decline.
        return;
    }
    let (_server, dir, config) = setup("false", None).await;
    let content = std::fs::read_to_string(&config)
        .unwrap()
        .replace("escalation_program = \"\"", "escalation_program = \"sudo\"");
    std::fs::write(&config, &content).unwrap();

    let config_clone = config.clone();
    run_blocking(move || {
        plex_update(&config_clone)
            .arg("amd64")
            .assert()
            .success()
            .stdout(predicate::str::contains("Installation of 1.41 cancelled"));
    })
    .await;

    assert_eq!(std::fs::read_to_string(&config).unwrap(), content);
    assert!(!dir.path().join("downloads").join("plexmediaserver_1.41_amd64.deb").exists());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_download_only_keeps_package() {
    let (_server, dir, config) = setup("false", None).await;

    run_blocking(move || {
        plex_update(&config).args(["amd64", "--download-only"]).assert().success();
    })
    .await;

    let package = dir.path().join("downloads").join("plexmediaserver_1.41_amd64.deb");
    assert_eq!(std::fs::read(package).unwrap(), PACKAGE);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_platform_without_build_exits_zero() {
    let (_server, _dir, config) = setup("false", None).await;

    run_blocking(move || {
        plex_update(&config)
            .arg("armhf")
            .assert()
            .success()
            .stdout(predicate::str::contains("No Debian build for armhf"));
    })
    .await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_catalog_failure_exits_one() {
    let (server, _dir, config) = setup("false", None).await;
    server.route("/5.json", Route::status(500));

    run_blocking(move || {
        plex_update(&config)
            .arg("amd64")
            .assert()
            .code(1)
            .stderr(predicate::str::contains("unexpected status"));
    })
    .await;
}

#[test]
fn test_broken_config_exits_one() {
    let dir = TempDir::new().unwrap();
    let config = dir.path().join("config.toml");
    std::fs::write(&config, "[settings\n").unwrap();

    plex_update(&config).arg("amd64").assert().code(1).stderr(predicate::str::contains("error"));
}
