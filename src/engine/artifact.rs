//! Ownership of the downloaded package file.

use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Deletes the downloaded package when dropped, unless [`retain`](Self::retain)ed.
///
/// Created before the download starts so a partial file is removed as well.
#[derive(Debug)]
pub struct ArtifactGuard {
    path: PathBuf,
    retained: bool,
}

impl ArtifactGuard {
    /// Take ownership of the file at `path`, which need not exist yet.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            retained: false,
        }
    }

    /// Path of the owned file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Keep the file on disk and return its path.
    #[must_use]
    pub fn retain(mut self) -> PathBuf {
        self.retained = true;
        std::mem::take(&mut self.path)
    }
}

impl Drop for ArtifactGuard {
    fn drop(&mut self) {
        if self.retained {
            return;
        }
        match std::fs::remove_file(&self.path) {
            Ok(()) => debug!("Removed {}", self.path.display()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => warn!("Failed to remove {}: {}", self.path.display(), e),
        }
    }
}
