//! Error handling for plex-updater
//!
//! Library code reports failures through two typed errors:
//! - [`FetchError`] - anything that went wrong talking to the catalog or
//!   download server, classified by [`FetchErrorKind`]
//! - [`UpdateError`] - every fatal condition of an update run
//!
//! "No build for this platform" and "the user declined privilege escalation"
//! are not errors; they are reported as run outcomes by the engine.
//!
//! The CLI wraps errors in [`anyhow::Error`] and turns them into an
//! [`ErrorContext`] via [`user_friendly_error`] for display.
//!
//! # Examples
//!
//! ```rust,no_run
//! use plex_updater::core::{UpdateError, user_friendly_error};
//!
//! let error = UpdateError::ChecksumMismatch {
//!     expected: "aaa".to_string(),
//!     actual: "bbb".to_string(),
//!     path: "/tmp/pms.deb".into(),
//! };
//! user_friendly_error(anyhow::Error::from(error)).display();
//! ```

use colored::Colorize;
use std::fmt;
use std::path::PathBuf;
use thiserror::Error;

/// Classification of a failed catalog or download request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchErrorKind {
    /// The request did not complete within the configured timeout
    Timeout,
    /// Connection, TLS or transport failure
    NetworkError,
    /// The body could not be parsed or lacks required fields
    MalformedResponse,
    /// The server answered with a non-success HTTP status
    UnexpectedStatus,
}

impl fmt::Display for FetchErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FetchErrorKind::Timeout => write!(f, "timed out"),
            FetchErrorKind::NetworkError => write!(f, "network error"),
            FetchErrorKind::MalformedResponse => write!(f, "malformed response"),
            FetchErrorKind::UnexpectedStatus => write!(f, "unexpected status"),
        }
    }
}

/// A failed request against the catalog endpoint or the download server.
#[derive(Error, Debug, Clone)]
#[error("{kind} while fetching {url}: {message}")]
pub struct FetchError {
    /// What went wrong
    pub kind: FetchErrorKind,
    /// The URL being requested
    pub url: String,
    /// Human readable detail
    pub message: String,
}

impl FetchError {
    /// Create a new fetch error.
    pub fn new(kind: FetchErrorKind, url: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            kind,
            url: url.into(),
            message: message.into(),
        }
    }

    /// Classify a transport error from `reqwest`.
    pub fn from_reqwest(url: &str, error: &reqwest::Error) -> Self {
        let kind = if error.is_timeout() {
            FetchErrorKind::Timeout
        } else if error.is_decode() {
            FetchErrorKind::MalformedResponse
        } else if error.is_status() {
            FetchErrorKind::UnexpectedStatus
        } else {
            FetchErrorKind::NetworkError
        };
        Self::new(kind, url, error.to_string())
    }
}

/// Fatal failures of an update run.
///
/// Every variant aborts the run before the state file is touched, so the
/// next run starts over from the previously recorded state.
#[derive(Error, Debug)]
pub enum UpdateError {
    /// The catalog or the package could not be fetched
    #[error(transparent)]
    Fetch(#[from] FetchError),

    /// The downloaded package does not hash to the published checksum
    #[error("Checksum mismatch for {}: expected {expected}, got {actual}", .path.display())]
    ChecksumMismatch {
        /// Checksum published by the catalog
        expected: String,
        /// Checksum computed from the downloaded file
        actual: String,
        /// The downloaded file (already removed when this error is seen)
        path: PathBuf,
    },

    /// The installer ran and reported failure
    #[error("Installer failed with {}", describe_exit(.exit_code))]
    InstallFailure {
        /// Exit code of the installer, `None` if it was killed by a signal
        exit_code: Option<i32>,
        /// Captured standard error of the installer
        stderr: String,
    },

    /// Local file system or process I/O failed
    #[error("Failed to {operation}: {}", .path.display())]
    Io {
        /// What was being attempted (e.g. "read package")
        operation: String,
        /// File involved
        path: PathBuf,
        /// Underlying I/O error
        #[source]
        source: std::io::Error,
    },

    /// The state file exists but cannot be interpreted
    #[error("Invalid state file {}: {reason}", .path.display())]
    State {
        /// Path of the state file
        path: PathBuf,
        /// Parse or structure problem
        reason: String,
    },
}

impl UpdateError {
    /// Shorthand for building an [`UpdateError::Io`].
    pub fn io(operation: impl Into<String>, path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            operation: operation.into(),
            path: path.into(),
            source,
        }
    }
}

fn describe_exit(code: &Option<i32>) -> String {
    match *code {
        Some(code) => format!("exit code {code}"),
        None => "termination by signal".to_string(),
    }
}

/// An error prepared for terminal display, with optional details and a
/// suggestion for the user.
#[derive(Debug)]
pub struct ErrorContext {
    /// Main error message
    pub message: String,
    /// Optional suggestion for resolving the error
    pub suggestion: Option<String>,
    /// Optional additional details about the error
    pub details: Option<String>,
}

impl ErrorContext {
    /// Create a context with no suggestion or details.
    #[must_use]
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            suggestion: None,
            details: None,
        }
    }

    /// Add a suggestion for resolving the error.
    pub fn with_suggestion(mut self, suggestion: impl Into<String>) -> Self {
        self.suggestion = Some(suggestion.into());
        self
    }

    /// Add details explaining the error.
    pub fn with_details(mut self, details: impl Into<String>) -> Self {
        self.details = Some(details.into());
        self
    }

    /// Print the error to stderr: message in red, details in yellow,
    /// suggestion in green.
    pub fn display(&self) {
        eprintln!("{}: {}", "error".red().bold(), self.message);

        if let Some(details) = &self.details {
            eprintln!("{}: {}", "details".yellow(), details);
        }

        if let Some(suggestion) = &self.suggestion {
            eprintln!("{}: {}", "suggestion".green(), suggestion);
        }
    }
}

impl fmt::Display for ErrorContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)?;

        if let Some(details) = &self.details {
            write!(f, "\nDetails: {details}")?;
        }

        if let Some(suggestion) = &self.suggestion {
            write!(f, "\nSuggestion: {suggestion}")?;
        }

        Ok(())
    }
}

impl std::error::Error for ErrorContext {}

/// Convert any error to a user-friendly [`ErrorContext`].
///
/// [`UpdateError`] and [`FetchError`] get tailored suggestions; anything else
/// is shown with its full cause chain.
#[must_use]
pub fn user_friendly_error(error: anyhow::Error) -> ErrorContext {
    if let Some(update_error) = error.downcast_ref::<UpdateError>() {
        return create_error_context(update_error);
    }

    if let Some(fetch_error) = error.downcast_ref::<FetchError>() {
        return fetch_error_context(fetch_error);
    }

    if let Some(toml_error) = error.downcast_ref::<toml::de::Error>() {
        return ErrorContext::new(format!("Invalid configuration file: {toml_error}"))
            .with_suggestion("Check the TOML syntax of the configuration file");
    }

    let mut message = error.to_string();
    let chain: Vec<String> = error.chain().skip(1).map(ToString::to_string).collect();

    if !chain.is_empty() {
        message.push_str("\n\nCaused by:");
        for (i, cause) in chain.iter().enumerate() {
            message.push_str(&format!("\n  {}: {}", i + 1, cause));
        }
    }

    ErrorContext::new(message)
}

fn create_error_context(error: &UpdateError) -> ErrorContext {
    match error {
        UpdateError::Fetch(fetch_error) => fetch_error_context(fetch_error),
        UpdateError::ChecksumMismatch {
            ..
        } => ErrorContext::new(error.to_string())
            .with_details("The downloaded package was deleted and nothing was recorded")
            .with_suggestion("Run again later; the next run retries the download from scratch"),
        UpdateError::InstallFailure {
            stderr,
            ..
        } => {
            let context = ErrorContext::new(error.to_string())
                .with_suggestion("Fix the installer problem and run again; the previous state was kept");
            if stderr.trim().is_empty() {
                context
            } else {
                context.with_details(stderr.trim().to_string())
            }
        }
        UpdateError::Io {
            source,
            ..
        } => {
            let context = ErrorContext::new(error.to_string()).with_details(source.to_string());
            match source.kind() {
                std::io::ErrorKind::PermissionDenied => context
                    .with_suggestion("Check the permissions of the download directory and config file"),
                std::io::ErrorKind::NotFound => context.with_suggestion(
                    "Check that the installer program is installed and the paths in the config exist",
                ),
                _ => context,
            }
        }
        UpdateError::State {
            ..
        } => ErrorContext::new(error.to_string())
            .with_suggestion("Fix or remove the broken section of the config file"),
    }
}

fn fetch_error_context(error: &FetchError) -> ErrorContext {
    let context = ErrorContext::new(error.to_string());
    match error.kind {
        FetchErrorKind::Timeout => {
            context.with_suggestion("Increase `timeout_secs` in the [settings] table or retry later")
        }
        FetchErrorKind::NetworkError => context.with_suggestion("Check your network connection"),
        FetchErrorKind::MalformedResponse => context
            .with_details("The catalog did not contain a version and a list of releases")
            .with_suggestion("Check `catalog_url` in the [settings] table"),
        FetchErrorKind::UnexpectedStatus => {
            context.with_suggestion("Check `catalog_url` in the [settings] table or retry later")
        }
    }
}
