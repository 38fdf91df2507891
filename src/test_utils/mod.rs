//! Test doubles for the engine's collaborators
//!
//! Available to unit tests and, through the `test-utils` feature, to the
//! integration tests. Every double is cheap to clone and clones share state,
//! so a test can hand one clone to the engine and inspect another.
//!
//! ```rust,ignore
//! let store = MemoryStateStore::new();
//! let engine = UpdateEngine::new(options, source, store.clone(), installer, confirm);
//! engine.run().await?;
//! assert_eq!(store.save_count(), 1);
//! ```

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, Once};

use sha1::{Digest, Sha1};
use tracing::Level;
use tracing_subscriber::EnvFilter;

use crate::catalog::{Catalog, CatalogEntry, ReleaseSource};
use crate::core::{FetchError, UpdateError};
use crate::installer::{Confirm, InstallOutcome, Installer};
use crate::models::{DEBIAN_DISTRO, Platform, PlatformRecord, Release};
use crate::state::StateStore;

static INIT_LOGGING: Once = Once::new();

/// Initialize a test-writer `tracing` subscriber once per process.
///
/// With `None`, logging is only enabled when `RUST_LOG` is set:
///
/// ```bash
/// RUST_LOG=plex_updater=debug cargo test
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

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(std::sync::PoisonError::into_inner)
}

/// Lowercase hex SHA-1 of `payload`, as the catalog would publish it.
#[must_use]
pub fn sha1_hex(payload: &[u8]) -> String {
    hex::encode(Sha1::digest(payload))
}

/// A single-build catalog for `platform`.
#[must_use]
pub fn catalog_for(platform: Platform, version: &str, checksum: &str, url: &str) -> Catalog {
    Catalog {
        version: version.to_string(),
        releases: vec![CatalogEntry {
            build: platform.build_id().to_string(),
            distro: DEBIAN_DISTRO.to_string(),
            url: url.to_string(),
            checksum: checksum.to_string(),
        }],
    }
}

/// In-memory [`StateStore`] that counts saves.
#[derive(Debug, Clone, Default)]
pub struct MemoryStateStore {
    records: Arc<Mutex<HashMap<Platform, PlatformRecord>>>,
    saves: Arc<AtomicUsize>,
}

impl MemoryStateStore {
    /// An empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// A store already holding `record` for `platform`.
    #[must_use]
    pub fn with_record(platform: Platform, record: PlatformRecord) -> Self {
        let store = Self::new();
        lock(&store.records).insert(platform, record);
        store
    }

    /// Current record for `platform`, empty when never saved.
    #[must_use]
    pub fn record(&self, platform: Platform) -> PlatformRecord {
        lock(&self.records).get(&platform).cloned().unwrap_or_default()
    }

    /// Number of successful `save` calls.
    #[must_use]
    pub fn save_count(&self) -> usize {
        self.saves.load(Ordering::SeqCst)
    }
}

impl StateStore for MemoryStateStore {
    async fn load(&self, platform: Platform) -> Result<PlatformRecord, UpdateError> {
        Ok(self.record(platform))
    }

    async fn save(&self, platform: Platform, record: &PlatformRecord) -> Result<(), UpdateError> {
        lock(&self.records).insert(platform, record.clone());
        self.saves.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

/// [`ReleaseSource`] serving a fixed catalog and payload.
#[derive(Debug, Clone)]
pub struct FakeReleaseSource {
    catalog: Result<Catalog, FetchError>,
    payload: Arc<Vec<u8>>,
    download_error: Option<FetchError>,
    downloads: Arc<Mutex<Vec<(String, PathBuf)>>>,
}

impl FakeReleaseSource {
    /// Serve `catalog`; downloads write `payload`.
    #[must_use]
    pub fn new(catalog: Catalog, payload: impl Into<Vec<u8>>) -> Self {
        Self {
            catalog: Ok(catalog),
            payload: Arc::new(payload.into()),
            download_error: None,
            downloads: Arc::default(),
        }
    }

    /// Serve a one-build catalog whose checksum matches `payload`.
    #[must_use]
    pub fn serving(platform: Platform, version: &str, payload: &[u8]) -> Self {
        let url = format!("https://downloads.example/pms_{version}_{platform}.deb");
        Self::new(catalog_for(platform, version, &sha1_hex(payload), &url), payload)
    }

    /// Every catalog fetch fails with `error`.
    #[must_use]
    pub fn failing(error: FetchError) -> Self {
        Self {
            catalog: Err(error),
            payload: Arc::default(),
            download_error: None,
            downloads: Arc::default(),
        }
    }

    /// Downloads fail with `error` after writing half of the payload.
    #[must_use]
    pub fn with_download_error(mut self, error: FetchError) -> Self {
        self.download_error = Some(error);
        self
    }

    /// The checksum the served catalog publishes for its first build.
    #[must_use]
    pub fn published_checksum(&self) -> String {
        self.catalog
            .as_ref()
            .ok()
            .and_then(|c| c.releases.first())
            .map(|e| e.checksum.clone())
            .unwrap_or_default()
    }

    /// `(url, destination)` of every download attempted so far.
    #[must_use]
    pub fn downloads(&self) -> Vec<(String, PathBuf)> {
        lock(&self.downloads).clone()
    }
}

impl ReleaseSource for FakeReleaseSource {
    async fn fetch_catalog(&self) -> Result<Catalog, FetchError> {
        self.catalog.clone()
    }

    async fn download(&self, release: &Release, dest: &Path) -> Result<(), UpdateError> {
        lock(&self.downloads).push((release.url.clone(), dest.to_path_buf()));

        if let Some(error) = &self.download_error {
            let partial = &self.payload[..self.payload.len() / 2];
            tokio::fs::write(dest, partial).await.map_err(|e| UpdateError::io("write package file", dest, e))?;
            return Err(error.clone().into());
        }

        tokio::fs::write(dest, self.payload.as_slice())
            .await
            .map_err(|e| UpdateError::io("write package file", dest, e))
    }
}

/// One recorded installer invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstallCall {
    /// Package passed to the installer
    pub artifact: PathBuf,
    /// Whether escalation was requested
    pub escalate: bool,
    /// Whether the package existed when the installer ran
    pub artifact_existed: bool,
}

/// [`Installer`] that records calls and returns a scripted outcome.
#[derive(Debug, Clone)]
pub struct RecordingInstaller {
    needs_escalation: bool,
    outcome: InstallOutcome,
    calls: Arc<Mutex<Vec<InstallCall>>>,
}

impl RecordingInstaller {
    /// An installer that always succeeds without escalation.
    #[must_use]
    pub fn succeeding() -> Self {
        Self {
            needs_escalation: false,
            outcome: InstallOutcome::Success,
            calls: Arc::default(),
        }
    }

    /// An installer that always fails with `exit_code`.
    #[must_use]
    pub fn failing(exit_code: i32, stderr: &str) -> Self {
        Self {
            outcome: InstallOutcome::Failure {
                exit_code: Some(exit_code),
                stderr: stderr.to_string(),
            },
            ..Self::succeeding()
        }
    }

    /// Report that escalation is needed.
    #[must_use]
    pub fn needing_escalation(mut self) -> Self {
        self.needs_escalation = true;
        self
    }

    /// Recorded invocations.
    #[must_use]
    pub fn calls(&self) -> Vec<InstallCall> {
        lock(&self.calls).clone()
    }
}

impl Installer for RecordingInstaller {
    fn needs_escalation(&self) -> bool {
        self.needs_escalation
    }

    async fn install(&self, artifact: &Path, escalate: bool) -> Result<InstallOutcome, UpdateError> {
        lock(&self.calls).push(InstallCall {
            artifact: artifact.to_path_buf(),
            escalate,
            artifact_existed: artifact.exists(),
        });
        Ok(self.outcome.clone())
    }
}

/// [`Confirm`] with a fixed answer that records the prompts it saw.
#[derive(Debug, Clone)]
pub struct ScriptedConfirm {
    answer: bool,
    prompts: Arc<Mutex<Vec<String>>>,
}

impl ScriptedConfirm {
    /// Always approve.
    #[must_use]
    pub fn approving() -> Self {
        Self {
            answer: true,
            prompts: Arc::default(),
        }
    }

    /// Always decline.
    #[must_use]
    pub fn declining() -> Self {
        Self {
            answer: false,
            prompts: Arc::default(),
        }
    }

    /// Prompts presented so far.
    #[must_use]
    pub fn prompts(&self) -> Vec<String> {
        lock(&self.prompts).clone()
    }
}

impl Confirm for ScriptedConfirm {
    async fn confirm(&self, prompt: &str) -> bool {
        lock(&self.prompts).push(prompt.to_string());
        self.answer
    }
}
