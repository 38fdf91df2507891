//! HTTP access to the catalog and the package downloads.

use std::future::Future;
use std::path::Path;
use std::time::Duration;

use reqwest::Client;
use tokio::fs::File;
use tokio::io::AsyncWriteExt;
use tracing::{debug, info};

use super::Catalog;
use crate::core::{FetchError, FetchErrorKind, UpdateError};
use crate::models::Release;
use crate::utils::progress::download_bar;

const USER_AGENT: &str = concat!("plex-update/", env!("CARGO_PKG_VERSION"));

/// Where releases come from.
///
/// The engine only talks to this trait so runs can be driven from an
/// in-memory catalog in tests.
pub trait ReleaseSource {
    /// Fetch and parse the release catalog. Never retries.
    fn fetch_catalog(&self) -> impl Future<Output = Result<Catalog, FetchError>> + Send;

    /// Stream the package for `release` into `dest`, replacing any existing file.
    fn download(
        &self,
        release: &Release,
        dest: &Path,
    ) -> impl Future<Output = Result<(), UpdateError>> + Send;
}

/// [`ReleaseSource`] backed by the Plex download API.
#[derive(Debug, Clone)]
pub struct CatalogClient {
    client: Client,
    catalog_url: String,
    timeout: Duration,
    show_progress: bool,
}

impl CatalogClient {
    /// Create a client for `catalog_url`.
    ///
    /// `timeout` bounds the whole catalog request, the connection setup of a
    /// download, and each wait for the next chunk of a download body.
    ///
    /// # Errors
    ///
    /// Fails when the HTTP client cannot be initialized (e.g. no TLS backend).
    pub fn new(catalog_url: impl Into<String>, timeout: Duration) -> Result<Self, FetchError> {
        let catalog_url = catalog_url.into();
        let client = Client::builder()
            .user_agent(USER_AGENT)
            .connect_timeout(timeout)
            .build()
            .map_err(|e| FetchError::from_reqwest(&catalog_url, &e))?;

        Ok(Self {
            client,
            catalog_url,
            timeout,
            show_progress: false,
        })
    }

    /// Draw a progress bar while downloading.
    #[must_use]
    pub fn with_progress(mut self, show_progress: bool) -> Self {
        self.show_progress = show_progress;
        self
    }

    /// The configured catalog URL.
    #[must_use]
    pub fn catalog_url(&self) -> &str {
        &self.catalog_url
    }

    fn stalled(&self, url: &str, waiting_for: &str) -> FetchError {
        FetchError::new(
            FetchErrorKind::Timeout,
            url,
            format!("no {waiting_for} received for {} seconds", self.timeout.as_secs()),
        )
    }

    /// Send a GET and check the status.
    ///
    /// With `whole_request_timeout` the timeout covers the request including
    /// its body. Without it only the wait for the response headers is bounded
    /// here and the caller bounds each body chunk.
    async fn get(&self, url: &str, whole_request_timeout: bool) -> Result<reqwest::Response, FetchError> {
        let mut request = self.client.get(url);
        if whole_request_timeout {
            request = request.timeout(self.timeout);
        }

        let response = tokio::time::timeout(self.timeout, request.send())
            .await
            .map_err(|_| self.stalled(url, "response"))?
            .map_err(|e| FetchError::from_reqwest(url, &e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::new(
                FetchErrorKind::UnexpectedStatus,
                url,
                format!("server answered HTTP {status}"),
            ));
        }
        Ok(response)
    }
}

impl ReleaseSource for CatalogClient {
    async fn fetch_catalog(&self) -> Result<Catalog, FetchError> {
        info!("Fetching release catalog from {}", self.catalog_url);

        let response = self.get(&self.catalog_url, true).await?;
        let body = response.text().await.map_err(|e| FetchError::from_reqwest(&self.catalog_url, &e))?;

        Catalog::parse(&body, &self.catalog_url)
    }

    /// Stream `release.url` into `dest`.
    ///
    /// The parent directory of `dest` is created if needed and an existing
    /// file is truncated. The body is written chunk by chunk and synced before
    /// returning, so the checksum step reads what reached the disk.
    ///
    /// # Errors
    ///
    /// - [`UpdateError::Fetch`] with [`FetchErrorKind::Timeout`] when the
    ///   server sends no headers, or no next chunk, within the timeout
    /// - [`UpdateError::Fetch`] for a non-2xx status or a broken connection
    /// - [`UpdateError::Io`] when the file cannot be created or written
    ///
    /// A partially written file is left in place; the engine's artifact
    /// guard removes it.
    async fn download(&self, release: &Release, dest: &Path) -> Result<(), UpdateError> {
        info!("Downloading {} to {}", release.url, dest.display());

        let mut response = self.get(&release.url, false).await?;

        if let Some(parent) = dest.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| UpdateError::io("create download directory", parent, e))?;
        }
        let mut file =
            File::create(dest).await.map_err(|e| UpdateError::io("create package file", dest, e))?;

        let label = dest.file_name().map(|n| n.to_string_lossy().into_owned()).unwrap_or_default();
        let bar = download_bar(response.content_length(), &label, self.show_progress);

        let mut written: u64 = 0;
        loop {
            let chunk = tokio::time::timeout(self.timeout, response.chunk())
                .await
                .map_err(|_| self.stalled(&release.url, "data"))?
                .map_err(|e| FetchError::from_reqwest(&release.url, &e))?;

            let Some(chunk) = chunk else {
                break;
            };

            file.write_all(&chunk).await.map_err(|e| UpdateError::io("write package file", dest, e))?;
            written += chunk.len() as u64;
            bar.inc(chunk.len() as u64);
        }

        file.flush().await.map_err(|e| UpdateError::io("write package file", dest, e))?;
        file.sync_all().await.map_err(|e| UpdateError::io("sync package file", dest, e))?;
        bar.finish_and_clear();

        debug!("Downloaded {} bytes", written);
        Ok(())
    }
}
