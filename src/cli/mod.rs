//! Command-line interface for plex-update
//!
//! ```text
//! plex-update <PLATFORM> [-v|--verbose] [-q|--quiet] [-n|--dry-run]
//!             [-d|--download-only] [-y|--yes] [-c|--config PATH]
//! ```
//!
//! One invocation updates one platform. The process exits 0 when the run
//! ends without error, which includes "already up to date", "no build for
//! this platform" and a declined escalation prompt. Any error exits 1 after
//! printing a description and a suggestion.
//!
//! # Examples
//!
//! ```bash
//! # Typical cron entry on a Raspberry Pi
//! plex-update armhf --quiet --yes
//!
//! # See what would happen
//! plex-update amd64 --dry-run --verbose
//!
//! # Fetch and verify the package for a manual install
//! plex-update arm64 --download-only
//! ```

pub mod common;

pub use common::TerminalConfirm;

use anyhow::{Context, Result};
use clap::Parser;
use colored::Colorize;
use std::io::IsTerminal;
use std::path::PathBuf;
use tracing::{debug, info_span};
use tracing_subscriber::EnvFilter;

use crate::catalog::CatalogClient;
use crate::config::Settings;
use crate::engine::{RunOptions, RunOutcome, UpdateEngine};
use crate::installer::CommandInstaller;
use crate::models::{Platform, RunMode};
use crate::state::TomlStateStore;
use crate::utils::RunLock;

/// Keep a Plex Media Server installation up to date.
#[derive(Parser, Debug)]
#[command(
    name = "plex-update",
    about = "Keep Plex Media Server up to date on Debian-based systems",
    version,
    long_about = "Checks the Plex release catalog for a newer build for PLATFORM, downloads and \
                  verifies it, and installs it with gdebi. Does nothing when the recorded build \
                  is already current."
)]
pub struct Cli {
    /// Platform to update
    #[arg(value_enum, ignore_case = true)]
    pub platform: Platform,

    /// Log every step of the run
    #[arg(short, long, conflicts_with = "quiet")]
    pub verbose: bool,

    /// Only print errors
    #[arg(short, long)]
    pub quiet: bool,

    /// Report what would happen without downloading, installing or saving
    #[arg(short = 'n', long, conflicts_with = "download_only")]
    pub dry_run: bool,

    /// Download and verify the package, record it, but do not install it
    #[arg(short = 'd', long)]
    pub download_only: bool,

    /// Approve privilege escalation without asking
    #[arg(short, long)]
    pub yes: bool,

    /// Configuration and state file [default: ~/.plex-update/config.toml]
    #[arg(short, long, env = "PLEX_UPDATE_CONFIG", value_name = "PATH")]
    pub config: Option<PathBuf>,
}

impl Cli {
    /// The run mode selected by the flags.
    #[must_use]
    pub const fn mode(&self) -> RunMode {
        RunMode::from_flags(self.dry_run, self.download_only)
    }

    /// Log filter for these flags; `RUST_LOG` wins when set.
    #[must_use]
    pub fn log_filter(&self) -> EnvFilter {
        let default = if self.verbose {
            "plex_updater=debug"
        } else if self.quiet {
            "warn"
        } else {
            "plex_updater=info"
        };
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default))
    }

    /// Install the global `tracing` subscriber, writing to stderr.
    pub fn init_logging(&self) {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(self.log_filter())
            .with_writer(std::io::stderr)
            .with_target(false)
            .try_init();
    }

    /// Run the update and print a summary of the outcome.
    ///
    /// # Errors
    ///
    /// Returns configuration, locking and [`crate::core::UpdateError`]
    /// failures; the caller is expected to display them with
    /// [`crate::core::user_friendly_error`].
    pub async fn execute(self) -> Result<RunOutcome> {
        let config_path = Settings::resolve_path(self.config.clone())?;
        let settings = Settings::load(&config_path).await?;
        debug!("Using config {}", config_path.display());

        let _lock = RunLock::acquire(&config_path)
            .await
            .with_context(|| format!("Failed to lock {}", config_path.display()))?;

        let show_progress = !self.quiet && std::io::stderr().is_terminal();
        let source = CatalogClient::new(settings.catalog_url.clone(), settings.timeout())?
            .with_progress(show_progress);

        let options = RunOptions {
            platform: self.platform,
            mode: self.mode(),
            download_dir: settings.download_dir()?,
        };
        let span = info_span!(
            "update",
            platform = %options.platform,
            mode = %options.mode,
            config = %config_path.display()
        );
        let engine = UpdateEngine::new(
            options,
            source,
            TomlStateStore::new(&config_path),
            CommandInstaller::from_settings(&settings),
            TerminalConfirm::new(self.yes),
        )
        .with_span(span);

        let outcome = engine.run().await?;
        if !self.quiet {
            print_outcome(self.platform, &outcome);
        }
        Ok(outcome)
    }
}

fn print_outcome(platform: Platform, outcome: &RunOutcome) {
    match outcome {
        RunOutcome::NotFound {
            ..
        } => println!(
            "{}",
            format!("No Debian build for {platform} ({}) in the catalog", platform.build_id()).yellow()
        ),
        RunOutcome::UpToDate {
            record,
        } => println!("{}", format!("Plex Media Server {} is up to date", record.version).green()),
        RunOutcome::WouldUpdate {
            current,
            release,
        } => {
            let from = if current.version.is_empty() { "nothing" } else { current.version.as_str() };
            println!("{}", format!("Would update {platform} from {from} to {}", release.version).cyan());
            println!("  {}", release.url);
        }
        RunOutcome::Downloaded {
            artifact,
            record,
        } => println!(
            "{}",
            format!("Downloaded Plex Media Server {} to {}", record.version, artifact.display()).green()
        ),
        RunOutcome::Declined {
            release,
        } => println!("{}", format!("Installation of {} cancelled", release.version).yellow()),
        RunOutcome::Installed {
            record,
        } => println!("{}", format!("Installed Plex Media Server {}", record.version).green().bold()),
    }
}
