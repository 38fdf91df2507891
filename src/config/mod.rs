//! Configuration for plex-update
//!
//! Settings live in the `[settings]` table of the same TOML file that holds
//! the per-platform state. Every key is optional:
//!
//! ```toml
//! [settings]
//! catalog_url = "https://plex.tv/api/downloads/5.json"
//! timeout_secs = 30
//! download_dir = "~/Downloads"
//! installer_program = "gdebi"
//! installer_args = ["--n"]
//! escalation_program = "sudo"
//!
//! [amd64]
//! version = "1.40.0.7998-c29d4c0c8"
//! checksum = "..."
//! url = "https://downloads.plex.tv/..."
//! ```
//!
//! The file is found at `--config PATH` or, by default,
//! `~/.plex-update/config.toml`. A missing file means all defaults.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::fs;
use tracing::debug;

/// Catalog endpoint published by Plex.
pub const DEFAULT_CATALOG_URL: &str = "https://plex.tv/api/downloads/5.json";

const fn default_timeout_secs() -> u64 {
    30
}

fn default_catalog_url() -> String {
    DEFAULT_CATALOG_URL.to_string()
}

fn default_installer_program() -> String {
    "gdebi".to_string()
}

fn default_installer_args() -> Vec<String> {
    vec!["--n".to_string()]
}

fn default_escalation_program() -> String {
    "sudo".to_string()
}

/// The `[settings]` table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Settings {
    /// URL of the release catalog JSON
    #[serde(default = "default_catalog_url")]
    pub catalog_url: String,

    /// Network timeout in seconds
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    /// Where packages are downloaded; `~` and `$VARS` are expanded.
    /// Defaults to the system temp directory.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub download_dir: Option<String>,

    /// Installer program, run non-interactively against the package
    #[serde(default = "default_installer_program")]
    pub installer_program: String,

    /// Arguments passed before the package path
    #[serde(default = "default_installer_args")]
    pub installer_args: Vec<String>,

    /// Prefix used when not running as root; empty disables escalation
    #[serde(default = "default_escalation_program")]
    pub escalation_program: String,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            catalog_url: default_catalog_url(),
            timeout_secs: default_timeout_secs(),
            download_dir: None,
            installer_program: default_installer_program(),
            installer_args: default_installer_args(),
            escalation_program: default_escalation_program(),
        }
    }
}

#[derive(Debug, Default, Deserialize)]
struct ConfigDocument {
    #[serde(default)]
    settings: Settings,
}

impl Settings {
    /// Default location of the configuration file.
    ///
    /// # Errors
    ///
    /// Fails when the home directory cannot be determined.
    pub fn default_path() -> Result<PathBuf> {
        let home = dirs::home_dir().ok_or_else(|| anyhow::anyhow!("Unable to determine home directory"))?;
        Ok(home.join(".plex-update").join("config.toml"))
    }

    /// The explicit path if given, else [`Settings::default_path`].
    ///
    /// # Errors
    ///
    /// Fails when no path is given and the home directory is unknown.
    pub fn resolve_path(explicit: Option<PathBuf>) -> Result<PathBuf> {
        match explicit {
            Some(path) => Ok(path),
            None => Self::default_path(),
        }
    }

    /// Load settings from `path`, falling back to defaults when it does not exist.
    ///
    /// Tables other than `[settings]` are ignored here; they belong to the
    /// state store.
    ///
    /// # Errors
    ///
    /// Fails when the file exists but cannot be read, is not valid TOML, or
    /// the `[settings]` table contains unknown keys or wrong types.
    pub async fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            debug!("No config file at {}, using defaults", path.display());
            return Ok(Self::default());
        }

        let content = fs::read_to_string(path)
            .await
            .with_context(|| format!("Failed to read config from {}", path.display()))?;

        let document: ConfigDocument = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config from {}", path.display()))?;

        Ok(document.settings)
    }

    /// Network timeout as a [`Duration`], at least one second.
    #[must_use]
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs.max(1))
    }

    /// Directory packages are downloaded into, with `~` and variables expanded.
    ///
    /// # Errors
    ///
    /// Fails when the configured path references an undefined variable.
    pub fn download_dir(&self) -> Result<PathBuf> {
        match self.download_dir.as_deref().map(str::trim).filter(|d| !d.is_empty()) {
            Some(dir) => {
                let expanded = shellexpand::full(dir)
                    .with_context(|| format!("Failed to expand download_dir '{dir}'"))?;
                Ok(PathBuf::from(expanded.into_owned()))
            }
            None => Ok(std::env::temp_dir()),
        }
    }
}
