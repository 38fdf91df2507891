//! Streaming checksum computation for downloaded packages.
//!
//! The catalog publishes SHA-1 checksums; SHA-256 is accepted as well so a
//! mirror or a future catalog revision can use it. The algorithm is picked
//! from the shape of the expected value, see [`DigestAlgorithm::detect`].

use sha1::Sha1;
use sha2::{Digest, Sha256};
use std::path::Path;
use tokio::fs::File;
use tokio::io::AsyncReadExt;
use tracing::{debug, info};

use crate::core::UpdateError;

/// Size of the read buffer used while hashing.
const CHUNK_SIZE: usize = 64 * 1024;

/// Digest algorithms understood by the verifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DigestAlgorithm {
    /// SHA-1, 40 hex characters
    Sha1,
    /// SHA-256, 64 hex characters
    Sha256,
}

impl DigestAlgorithm {
    /// Pick the algorithm matching an expected checksum.
    ///
    /// An explicit `sha1:` or `sha256:` prefix wins; otherwise the length of
    /// the hex string decides. Returns `None` for values that cannot be a
    /// checksum of either kind.
    #[must_use]
    pub fn detect(expected: &str) -> Option<Self> {
        let expected = expected.trim();
        if let Some(hex) = expected.strip_prefix("sha256:") {
            return is_hex(hex, 64).then_some(DigestAlgorithm::Sha256);
        }
        if let Some(hex) = expected.strip_prefix("sha1:") {
            return is_hex(hex, 40).then_some(DigestAlgorithm::Sha1);
        }
        if is_hex(expected, 40) {
            Some(DigestAlgorithm::Sha1)
        } else if is_hex(expected, 64) {
            Some(DigestAlgorithm::Sha256)
        } else {
            None
        }
    }
}

fn is_hex(value: &str, len: usize) -> bool {
    value.len() == len && value.bytes().all(|b| b.is_ascii_hexdigit())
}

/// Strip an algorithm prefix and lowercase a checksum for comparison.
#[must_use]
pub fn normalize(checksum: &str) -> String {
    let checksum = checksum.trim();
    let bare = checksum
        .strip_prefix("sha256:")
        .or_else(|| checksum.strip_prefix("sha1:"))
        .unwrap_or(checksum);
    bare.to_ascii_lowercase()
}

/// Stream `path` through `algorithm` and return the lowercase hex digest.
///
/// The file is read in fixed-size chunks and never held in memory as a
/// whole, so the result does not depend on the file size or the chunk size.
///
/// # Errors
///
/// Returns [`UpdateError::Io`] when the file cannot be opened or read.
pub async fn digest(path: &Path, algorithm: DigestAlgorithm) -> Result<String, UpdateError> {
    debug!("Computing {:?} checksum for {}", algorithm, path.display());

    let file = File::open(path).await.map_err(|e| UpdateError::io("open package", path, e))?;

    match algorithm {
        DigestAlgorithm::Sha1 => hash_stream::<Sha1>(file, path).await,
        DigestAlgorithm::Sha256 => hash_stream::<Sha256>(file, path).await,
    }
}

async fn hash_stream<D: Digest>(mut file: File, path: &Path) -> Result<String, UpdateError> {
    let mut hasher = D::new();
    let mut buffer = vec![0u8; CHUNK_SIZE];

    loop {
        let read = file
            .read(&mut buffer)
            .await
            .map_err(|e| UpdateError::io("read package", path, e))?;
        if read == 0 {
            break;
        }
        hasher.update(&buffer[..read]);
    }

    Ok(hex::encode(hasher.finalize()))
}

/// Verify a file against the checksum published for it.
///
/// Returns the computed digest on success. Comparison is case-insensitive and
/// ignores an algorithm prefix on the expected value.
///
/// # Errors
///
/// - [`UpdateError::ChecksumMismatch`] when the digests differ, or when the
///   expected value is not a checksum this module can compute
/// - [`UpdateError::Io`] when the file cannot be read
pub async fn verify(path: &Path, expected: &str) -> Result<String, UpdateError> {
    info!("Verifying checksum of {}", path.display());

    let Some(algorithm) = DigestAlgorithm::detect(expected) else {
        return Err(UpdateError::ChecksumMismatch {
            expected: expected.to_string(),
            actual: "<unsupported checksum format>".to_string(),
            path: path.to_path_buf(),
        });
    };

    let actual = digest(path, algorithm).await?;
    if actual != normalize(expected) {
        return Err(UpdateError::ChecksumMismatch {
            expected: expected.to_string(),
            actual,
            path: path.to_path_buf(),
        });
    }

    info!("Checksum verification successful");
    Ok(actual)
}
