//! plex-updater - keep Plex Media Server current on Debian-based systems
//!
//! Each run checks the Plex release catalog for the platform's current
//! Debian build, compares its checksum with the one recorded after the last
//! successful run, and only when they differ downloads, verifies and installs
//! the package. State is recorded only after every step succeeded, so running
//! from cron as often as desired is safe.
//!
//! # Modules
//!
//! - [`models`] - platforms, releases, per-platform records, run modes
//! - [`catalog`] - catalog parsing, release selection, HTTP client
//! - [`checksum`] - streaming package verification
//! - [`installer`] - the installer subprocess and the escalation prompt seam
//! - [`state`] - the per-platform TOML state store
//! - [`engine`] - the update decision engine
//! - [`config`] - the `[settings]` table
//! - [`core`] - error types
//! - [`cli`] - the `plex-update` command
//! - [`utils`] - atomic writes, run lock, progress bars

pub mod catalog;
pub mod checksum;
pub mod cli;
pub mod config;
pub mod core;
pub mod engine;
pub mod installer;
pub mod models;
pub mod state;
pub mod utils;

#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;
