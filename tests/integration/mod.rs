//! Integration test suite for plex-updater
//!
//! ```bash
//! cargo test --test integration
//! ```
//!
//! - **catalog_http**: catalog fetch and package download against a local HTTP server
//! - **engine_scenarios**: full runs with the TOML state store and the HTTP client
//! - **state_store**: the state file shared with the `[settings]` table
//! - **cli**: the `plex-update` binary end to end

mod cli;
mod engine_scenarios;
mod support;
