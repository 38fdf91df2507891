//! Remote release catalog
//!
//! The catalog is a JSON document listing every current Plex Media Server
//! build. Only the Linux section matters here:
//!
//! ```json
//! {
//!   "computer": {
//!     "Linux": {
//!       "version": "1.40.0.7998-c29d4c0c8",
//!       "releases": [
//!         { "build": "linux-x86_64", "distro": "debian", "url": "https://...", "checksum": "..." }
//!       ]
//!     }
//!   }
//! }
//! ```
//!
//! [`Catalog::parse`] validates the document and [`Catalog::select_release`]
//! picks the build for one platform. Fetching lives in [`client`].

pub mod client;

pub use client::{CatalogClient, ReleaseSource};

use serde::Deserialize;
use tracing::debug;

use crate::core::{FetchError, FetchErrorKind};
use crate::models::{DEBIAN_DISTRO, Platform, Release};

#[derive(Debug, Deserialize)]
struct RawDocument {
    computer: RawComputer,
}

#[derive(Debug, Deserialize)]
struct RawComputer {
    #[serde(rename = "Linux")]
    linux: RawLinux,
}

#[derive(Debug, Deserialize)]
struct RawLinux {
    #[serde(default)]
    version: String,
    #[serde(default)]
    releases: Vec<CatalogEntry>,
}

/// One build listed in the catalog, before platform selection.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct CatalogEntry {
    /// Build identifier, e.g. `linux-x86_64`
    #[serde(default)]
    pub build: String,
    /// Packaging family, e.g. `debian` or `redhat`
    #[serde(default)]
    pub distro: String,
    /// Download URL
    #[serde(default)]
    pub url: String,
    /// Published checksum
    #[serde(default)]
    pub checksum: String,
}

/// The Linux section of the release catalog.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Catalog {
    /// Version shared by every build in the catalog
    pub version: String,
    /// Builds in catalog order
    pub releases: Vec<CatalogEntry>,
}

impl Catalog {
    /// Parse a catalog document fetched from `url`.
    ///
    /// # Errors
    ///
    /// Returns a [`FetchErrorKind::MalformedResponse`] error when the body is
    /// not JSON, lacks `computer.Linux`, has an empty version, or lists no
    /// releases.
    pub fn parse(body: &str, url: &str) -> Result<Self, FetchError> {
        let malformed = |message: String| FetchError::new(FetchErrorKind::MalformedResponse, url, message);

        let document: RawDocument =
            serde_json::from_str(body).map_err(|e| malformed(format!("invalid catalog JSON: {e}")))?;
        let linux = document.computer.linux;

        if linux.version.trim().is_empty() {
            return Err(malformed("catalog has no Linux version".to_string()));
        }
        if linux.releases.is_empty() {
            return Err(malformed("catalog lists no Linux releases".to_string()));
        }

        debug!("Catalog version {} with {} Linux builds", linux.version, linux.releases.len());
        Ok(Self {
            version: linux.version.trim().to_string(),
            releases: linux.releases,
        })
    }

    /// Select the Debian build for `platform`.
    ///
    /// The first entry whose build id matches the platform, whose distro is
    /// `debian`, and which carries both a URL and a checksum wins. `None`
    /// means the catalog has no usable build for this platform.
    #[must_use]
    pub fn select_release(&self, platform: Platform) -> Option<Release> {
        let build_id = platform.build_id();
        self.releases
            .iter()
            .find(|entry| {
                entry.build == build_id
                    && entry.distro == DEBIAN_DISTRO
                    && !entry.url.is_empty()
                    && !entry.checksum.is_empty()
            })
            .map(|entry| Release {
                build_id: entry.build.clone(),
                distro: entry.distro.clone(),
                version: self.version.clone(),
                url: entry.url.clone(),
                checksum: entry.checksum.clone(),
            })
    }
}
