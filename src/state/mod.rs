//! Persisted per-platform state
//!
//! The state file is the same TOML document as the configuration. Each
//! platform owns one table keyed by its canonical name:
//!
//! ```toml
//! [amd64]
//! version = "1.40.0.7998-c29d4c0c8"
//! checksum = "0a0a9f2a6772942557ab5355d76af442f8f65e01"
//! url = "https://downloads.plex.tv/plex-media-server-new/..."
//! ```
//!
//! [`TomlStateStore`] edits the document in place with `toml_edit`, so the
//! `[settings]` table, other platforms and comments are preserved on save.

use std::future::Future;
use std::path::{Path, PathBuf};

use toml_edit::{DocumentMut, Item, Table, TableLike, value};
use tracing::debug;

use crate::core::UpdateError;
use crate::models::{Platform, PlatformRecord};
use crate::utils::atomic_write;

const FIELDS: [&str; 3] = ["version", "checksum", "url"];

/// Storage of the last known state of each platform.
pub trait StateStore {
    /// Load the record for `platform`; an absent record is the empty default.
    fn load(&self, platform: Platform) -> impl Future<Output = Result<PlatformRecord, UpdateError>> + Send;

    /// Replace the record for `platform`.
    fn save(
        &self,
        platform: Platform,
        record: &PlatformRecord,
    ) -> impl Future<Output = Result<(), UpdateError>> + Send;
}

/// [`StateStore`] backed by a TOML file.
///
/// Reads parse the whole document on every call; the file is small and may
/// be edited by hand between runs. Saves rewrite the document atomically
/// from the blocking thread pool and keep the file's permissions.
///
/// # Errors
///
/// Both operations return [`UpdateError::State`] when the document is not
/// valid TOML, a platform entry is not a table, or a field is not a string.
/// File system failures are [`UpdateError::Io`].
///
/// # Examples
///
/// ```no_run
/// use plex_updater::models::{Platform, PlatformRecord};
/// use plex_updater::state::{StateStore, TomlStateStore};
///
/// # async fn example() -> Result<(), plex_updater::core::UpdateError> {
/// let store = TomlStateStore::new("/root/.plex-update/config.toml");
/// let mut record = store.load(Platform::Amd64).await?;
/// record.version = "1.41.0.8992".to_string();
/// store.save(Platform::Amd64, &record).await?;
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct TomlStateStore {
    path: PathBuf,
}

impl TomlStateStore {
    /// Store state in the file at `path`.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
        }
    }

    /// Path of the backing file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn read_document(&self) -> Result<DocumentMut, UpdateError> {
        let content = match tokio::fs::read_to_string(&self.path).await {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(DocumentMut::new()),
            Err(e) => return Err(UpdateError::io("read state file", &self.path, e)),
        };

        content.parse::<DocumentMut>().map_err(|e| self.invalid(e.to_string()))
    }

    fn invalid(&self, reason: impl Into<String>) -> UpdateError {
        UpdateError::State {
            path: self.path.clone(),
            reason: reason.into(),
        }
    }

    fn read_field(&self, table: &dyn TableLike, section: &str, field: &str) -> Result<String, UpdateError> {
        match table.get(field) {
            None => Ok(String::new()),
            Some(item) => item
                .as_str()
                .map(str::to_string)
                .ok_or_else(|| self.invalid(format!("[{section}].{field} must be a string"))),
        }
    }
}

fn empty_platform_table() -> Table {
    let mut table = Table::new();
    for field in FIELDS {
        table.insert(field, value(""));
    }
    table
}

impl StateStore for TomlStateStore {
    async fn load(&self, platform: Platform) -> Result<PlatformRecord, UpdateError> {
        let document = self.read_document().await?;
        let section = platform.name();

        let Some(item) = document.get(section) else {
            debug!("No recorded state for {}", section);
            return Ok(PlatformRecord::default());
        };
        let table = item
            .as_table_like()
            .ok_or_else(|| self.invalid(format!("[{section}] must be a table")))?;

        Ok(PlatformRecord {
            version: self.read_field(table, section, "version")?,
            checksum: self.read_field(table, section, "checksum")?,
            url: self.read_field(table, section, "url")?,
        })
    }

    async fn save(&self, platform: Platform, record: &PlatformRecord) -> Result<(), UpdateError> {
        let mut document = self.read_document().await?;

        for known in Platform::ALL {
            if !document.contains_key(known.name()) {
                document.insert(known.name(), Item::Table(empty_platform_table()));
            }
        }

        let section = platform.name();
        let table = document
            .get_mut(section)
            .and_then(Item::as_table_like_mut)
            .ok_or_else(|| self.invalid(format!("[{section}] must be a table")))?;
        table.insert("version", value(record.version.as_str()));
        table.insert("checksum", value(record.checksum.as_str()));
        table.insert("url", value(record.url.as_str()));

        let rendered = document.to_string();
        let path = self.path.clone();
        tokio::task::spawn_blocking(move || atomic_write(&path, rendered.as_bytes()))
            .await
            .map_err(std::io::Error::other)
            .and_then(|written| written)
            .map_err(|e| UpdateError::io("write state file", &self.path, e))?;

        debug!("Saved state for {} to {}", section, self.path.display());
        Ok(())
    }
}
