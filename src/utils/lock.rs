//! Process-wide run lock.
//!
//! Two cron-triggered runs against the same state file must not interleave
//! their read-decide-write cycles. [`RunLock`] serializes them with an
//! advisory exclusive lock on a sibling `<state file>.lock`, released when
//! the guard is dropped.

use anyhow::{Context, Result};
use fs4::fs_std::FileExt;
use std::fs::{File, OpenOptions};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// An exclusive lock held for the duration of one update run.
#[derive(Debug)]
pub struct RunLock {
    file: File,
    path: PathBuf,
}

impl RunLock {
    /// Path of the lock file guarding `state_path`.
    #[must_use]
    pub fn lock_path(state_path: &Path) -> PathBuf {
        let mut name = state_path.file_name().map(|n| n.to_os_string()).unwrap_or_default();
        name.push(".lock");
        state_path.with_file_name(name)
    }

    /// Acquire the lock for `state_path`, waiting for any other holder.
    ///
    /// The parent directory is created if needed. Locking blocks, so it runs
    /// on the blocking thread pool.
    ///
    /// # Errors
    ///
    /// Fails when the lock file cannot be created or the file system does
    /// not support locking.
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use plex_updater::utils::RunLock;
    /// use std::path::Path;
    ///
    /// # async fn example() -> anyhow::Result<()> {
    /// let state = Path::new("/root/.plex-update/config.toml");
    /// let lock = RunLock::acquire(state).await?;
    /// assert!(lock.path().ends_with("config.toml.lock"));
    /// // The update run happens here; the lock is released on drop.
    /// # Ok(())
    /// # }
    /// ```
    pub async fn acquire(state_path: &Path) -> Result<Self> {
        let lock_path = Self::lock_path(state_path);
        if let Some(parent) = lock_path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent)
                .await
                .with_context(|| format!("Failed to create directory {}", parent.display()))?;
        }

        let lock_path_clone = lock_path.clone();
        let file = tokio::task::spawn_blocking(move || -> Result<File> {
            let file = OpenOptions::new()
                .create(true)
                .write(true)
                .truncate(true)
                .open(&lock_path_clone)
                .with_context(|| format!("Failed to open lock file: {}", lock_path_clone.display()))?;

            FileExt::lock_exclusive(&file)
                .with_context(|| format!("Failed to acquire lock: {}", lock_path_clone.display()))?;

            Ok(file)
        })
        .await
        .context("Failed to spawn blocking task for lock acquisition")??;

        debug!("Acquired run lock {}", lock_path.display());
        Ok(Self {
            file,
            path: lock_path,
        })
    }

    /// Path of the held lock file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for RunLock {
    fn drop(&mut self) {
        if let Err(e) = FileExt::unlock(&self.file) {
            warn!("Failed to unlock {}: {}", self.path.display(), e);
        }
    }
}
