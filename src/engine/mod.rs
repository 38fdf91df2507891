//! The update decision engine
//!
//! One run of the engine takes a platform from "whatever is recorded" to
//! "the catalog's current build is installed and recorded", doing as little
//! as possible along the way:
//!
//! 1. Load the stored [`PlatformRecord`] and fetch the catalog.
//! 2. Select the Debian build for the platform. No build means
//!    [`RunOutcome::NotFound`]; nothing is written.
//! 3. Compare checksums. Version strings are never compared. A match means
//!    [`RunOutcome::UpToDate`], and the record is rewritten with any missing
//!    fields filled in (except in dry-run mode).
//! 4. Otherwise download the package, verify it, and depending on the
//!    [`RunMode`] stop, keep the package, or install it.
//!
//! The record is only saved after every step it describes has succeeded, so
//! a failed run leaves the previous state for the next attempt. The
//! downloaded package is deleted on every path except a successful
//! download-only run.
//!
//! # Example
//!
//! ```rust,no_run
//! use plex_updater::catalog::CatalogClient;
//! use plex_updater::engine::{RunOptions, UpdateEngine};
//! use plex_updater::installer::CommandInstaller;
//! use plex_updater::models::{Platform, RunMode};
//! use plex_updater::state::TomlStateStore;
//! # use plex_updater::installer::Confirm;
//! # struct Yes;
//! # impl Confirm for Yes { async fn confirm(&self, _: &str) -> bool { true } }
//!
//! # async fn example() -> anyhow::Result<()> {
//! let options = RunOptions {
//!     platform: Platform::Amd64,
//!     mode: RunMode::Normal,
//!     download_dir: std::env::temp_dir(),
//! };
//! let engine = UpdateEngine::new(
//!     options,
//!     CatalogClient::new("https://plex.tv/api/downloads/5.json", std::time::Duration::from_secs(30))?,
//!     TomlStateStore::new("/root/.plex-update/config.toml"),
//!     CommandInstaller::new("gdebi", vec!["--n".into()], Some("sudo".into())),
//!     Yes,
//! );
//! let outcome = engine.run().await?;
//! println!("{outcome:?}");
//! # Ok(())
//! # }
//! ```

pub mod artifact;


pub use artifact::ArtifactGuard;

use std::path::PathBuf;

use tracing::{Instrument, Span, debug, info, info_span, warn};

use crate::catalog::ReleaseSource;
use crate::checksum;
use crate::core::UpdateError;
use crate::installer::{Confirm, InstallOutcome, Installer};
use crate::models::{Platform, PlatformRecord, Release, RunMode};
use crate::state::StateStore;

/// Fixed parameters of one run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunOptions {
    /// Platform to update
    pub platform: Platform,
    /// How far the run may go
    pub mode: RunMode,
    /// Directory the package is downloaded into
    pub download_dir: PathBuf,
}

/// How a run ended, when it did not fail.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunOutcome {
    /// The catalog has no usable build for the platform; state untouched
    NotFound {
        /// The stored record, unchanged
        record: PlatformRecord,
    },
    /// The recorded build is the current one
    UpToDate {
        /// The record, with missing fields filled from the catalog
        record: PlatformRecord,
    },
    /// Dry run found an update and stopped
    WouldUpdate {
        /// The stored record
        current: PlatformRecord,
        /// The build that would be installed
        release: Release,
    },
    /// Download-only run fetched and verified the package and kept it
    Downloaded {
        /// Location of the kept package
        artifact: PathBuf,
        /// The newly saved record
        record: PlatformRecord,
    },
    /// The user refused privilege escalation; nothing installed or saved
    Declined {
        /// The build that was not installed
        release: Release,
    },
    /// The new build was installed and recorded
    Installed {
        /// The newly saved record
        record: PlatformRecord,
    },
}

/// Drives one update run against its four collaborators.
pub struct UpdateEngine<R, S, I, P> {
    options: RunOptions,
    source: R,
    store: S,
    installer: I,
    confirm: P,
    span: Span,
}

impl<R, S, I, P> UpdateEngine<R, S, I, P>
where
    R: ReleaseSource,
    S: StateStore,
    I: Installer,
    P: Confirm,
{
    /// Create an engine for one run.
    ///
    /// Events are emitted under an `update` span carrying the platform and
    /// mode; see [`with_span`](Self::with_span) to supply another.
    pub fn new(options: RunOptions, source: R, store: S, installer: I, confirm: P) -> Self {
        let span = info_span!("update", platform = %options.platform, mode = %options.mode);
        Self {
            options,
            source,
            store,
            installer,
            confirm,
            span,
        }
    }

    /// Emit the run's events under `span`.
    #[must_use]
    pub fn with_span(mut self, span: Span) -> Self {
        self.span = span;
        self
    }

    /// The options this engine was built with.
    #[must_use]
    pub fn options(&self) -> &RunOptions {
        &self.options
    }

    /// Execute the run.
    ///
    /// # Errors
    ///
    /// Any [`UpdateError`] aborts the run. The stored record is unchanged and
    /// the downloaded package, if any, has been deleted.
    pub async fn run(&self) -> Result<RunOutcome, UpdateError> {
        self.run_steps().instrument(self.span.clone()).await
    }

    async fn run_steps(&self) -> Result<RunOutcome, UpdateError> {
        let platform = self.options.platform;
        let mode = self.options.mode;

        let stored = self.store.load(platform).await?;
        debug!("Stored record: {:?}", stored);

        let catalog = self.source.fetch_catalog().await?;
        let Some(release) = catalog.select_release(platform) else {
            warn!("Catalog has no Debian build {} for {}", platform.build_id(), platform);
            return Ok(RunOutcome::NotFound {
                record: stored,
            });
        };

        if stored.matches(&release) {
            let record = stored.normalized_with(&release);
            if mode == RunMode::DryRun {
                info!("Already up to date at {}", record.version);
            } else {
                self.store.save(platform, &record).await?;
                info!("Already up to date at {}, state refreshed", record.version);
            }
            return Ok(RunOutcome::UpToDate {
                record,
            });
        }

        info!(
            "Update available: {} -> {} ({})",
            display_version(&stored.version),
            release.version,
            release.checksum
        );

        if mode == RunMode::DryRun {
            info!("Dry run: would download {} and install it", release.url);
            return Ok(RunOutcome::WouldUpdate {
                current: stored,
                release,
            });
        }

        let artifact = ArtifactGuard::new(
            self.options.download_dir.join(release.artifact_file_name(platform)),
        );
        self.source.download(&release, artifact.path()).await?;
        checksum::verify(artifact.path(), &release.checksum).await?;

        let record = PlatformRecord::from(&release);

        if mode == RunMode::DownloadOnly {
            self.store.save(platform, &record).await?;
            let artifact = artifact.retain();
            info!("Downloaded {} to {}", release.version, artifact.display());
            return Ok(RunOutcome::Downloaded {
                artifact,
                record,
            });
        }

        let escalate = self.installer.needs_escalation();
        if escalate {
            let prompt = format!(
                "Install Plex Media Server {} for {} with elevated privileges?",
                release.version, platform
            );
            if !self.confirm.confirm(&prompt).await {
                info!("Privilege escalation declined, nothing installed");
                return Ok(RunOutcome::Declined {
                    release,
                });
            }
        }

        match self.installer.install(artifact.path(), escalate).await? {
            InstallOutcome::Success => {
                self.store.save(platform, &record).await?;
                drop(artifact);
                info!("Installed Plex Media Server {}", record.version);
                Ok(RunOutcome::Installed {
                    record,
                })
            }
            InstallOutcome::Failure {
                exit_code,
                stderr,
            } => Err(UpdateError::InstallFailure {
                exit_code,
                stderr,
            }),
        }
    }
}

fn display_version(version: &str) -> &str {
    if version.is_empty() { "<none>" } else { version }
}
