//! Shared data models for update runs
//!
//! These types flow between the catalog client, the state store and the
//! update engine. None of them perform I/O.

use clap::ValueEnum;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Distribution tag the catalog uses for Debian packages.
pub const DEBIAN_DISTRO: &str = "debian";

/// Target platform selected on the command line.
///
/// Each platform maps to exactly one build identifier in the catalog through
/// [`Platform::build_id`]. The lowercase [`Platform::name`] is also the key of
/// the platform's section in the state file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, ValueEnum, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Platform {
    /// 64-bit x86 (`linux-x86_64`)
    Amd64,
    /// 32-bit ARMv7 hard-float, e.g. Raspberry Pi (`linux-armv7neon`)
    Armhf,
    /// 64-bit ARM (`linux-aarch64`)
    Arm64,
    /// 32-bit x86 (`linux-x86`)
    I386,
}

impl Platform {
    /// Every recognized platform, in state-file order.
    pub const ALL: [Platform; 4] = [Platform::Amd64, Platform::Armhf, Platform::Arm64, Platform::I386];

    /// Canonical identifier, as accepted on the command line.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Platform::Amd64 => "amd64",
            Platform::Armhf => "armhf",
            Platform::Arm64 => "arm64",
            Platform::I386 => "i386",
        }
    }

    /// Build identifier the catalog uses for this platform.
    #[must_use]
    pub const fn build_id(self) -> &'static str {
        match self {
            Platform::Amd64 => "linux-x86_64",
            Platform::Armhf => "linux-armv7neon",
            Platform::Arm64 => "linux-aarch64",
            Platform::I386 => "linux-x86",
        }
    }
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl std::str::FromStr for Platform {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Platform::ALL
            .into_iter()
            .find(|p| p.name().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| {
                let known: Vec<&str> = Platform::ALL.iter().map(|p| p.name()).collect();
                format!("unknown platform '{s}' (expected one of: {})", known.join(", "))
            })
    }
}

/// One installable build from the catalog.
///
/// Built fresh from every catalog fetch and never persisted. `version` is the
/// catalog's overall version string, shared by all builds of a release.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Release {
    /// Catalog build identifier (e.g. `linux-x86_64`)
    pub build_id: String,
    /// Packaging family (e.g. `debian`)
    pub distro: String,
    /// Version string of the release
    pub version: String,
    /// Download URL of the package
    pub url: String,
    /// Expected checksum of the package, as published by the catalog
    pub checksum: String,
}

impl Release {
    /// File name the downloaded package is stored under.
    #[must_use]
    pub fn artifact_file_name(&self, platform: Platform) -> String {
        let version: String = self
            .version
            .chars()
            .map(|c| if c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_') { c } else { '_' })
            .collect();
        format!("plexmediaserver_{version}_{platform}.deb")
    }
}

/// Last known installed state for one platform.
///
/// A platform that has never been recorded is represented by the default
/// value, with all three fields empty.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlatformRecord {
    /// Version string of the recorded build
    #[serde(default)]
    pub version: String,
    /// Checksum of the recorded build
    #[serde(default)]
    pub checksum: String,
    /// Download URL of the recorded build
    #[serde(default)]
    pub url: String,
}

impl PlatformRecord {
    /// Returns true when the record has never been written.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.version.is_empty() && self.checksum.is_empty() && self.url.is_empty()
    }

    /// Whether this record describes the same build as `release`.
    ///
    /// Builds are identified by checksum only; version strings can repeat
    /// across re-releases.
    #[must_use]
    pub fn matches(&self, release: &Release) -> bool {
        !self.checksum.is_empty() && self.checksum.eq_ignore_ascii_case(&release.checksum)
    }

    /// Copy of this record with empty fields filled in from `release`.
    #[must_use]
    pub fn normalized_with(&self, release: &Release) -> Self {
        let fill = |own: &str, other: &str| {
            if own.is_empty() { other.to_string() } else { own.to_string() }
        };
        Self {
            version: fill(&self.version, &release.version),
            checksum: fill(&self.checksum, &release.checksum),
            url: fill(&self.url, &release.url),
        }
    }
}

impl From<&Release> for PlatformRecord {
    fn from(release: &Release) -> Self {
        Self {
            version: release.version.clone(),
            checksum: release.checksum.clone(),
            url: release.url.clone(),
        }
    }
}

/// How far a run is allowed to go once an update is found.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RunMode {
    /// Download, verify, install and record
    #[default]
    Normal,
    /// Report what would happen; never touch the network artifact or the state file
    DryRun,
    /// Download, verify and record, but keep the package instead of installing it
    DownloadOnly,
}

impl RunMode {
    /// Derive the mode from the two command line modifiers.
    #[must_use]
    pub const fn from_flags(dry_run: bool, download_only: bool) -> Self {
        if dry_run {
            RunMode::DryRun
        } else if download_only {
            RunMode::DownloadOnly
        } else {
            RunMode::Normal
        }
    }
}

impl fmt::Display for RunMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RunMode::Normal => write!(f, "normal"),
            RunMode::DryRun => write!(f, "dry-run"),
            RunMode::DownloadOnly => write!(f, "download-only"),
        }
    }
}
