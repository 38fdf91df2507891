//! Package installation
//!
//! Installing a `.deb` means running an external installer (by default
//! `gdebi --n <package>`), usually through `sudo`. The engine sees this as
//! two capabilities:
//!
//! - [`Installer`] - knows whether escalation is needed and runs the install
//! - [`Confirm`] - asks the user before anything runs with elevated rights
//!
//! [`CommandInstaller`] is the real implementation. The terminal prompt lives
//! in the CLI layer.

use std::future::Future;
use std::path::Path;
use std::process::Stdio;

use tokio::process::Command;
use tracing::{debug, info, warn};

use crate::config::Settings;
use crate::core::UpdateError;

/// Result of one installer invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InstallOutcome {
    /// The installer exited with status 0
    Success,
    /// The installer ran but reported failure
    Failure {
        /// Exit code, `None` when terminated by a signal
        exit_code: Option<i32>,
        /// Captured standard error
        stderr: String,
    },
}

/// Installs a verified package.
pub trait Installer {
    /// Whether installing requires running through the escalation program.
    fn needs_escalation(&self) -> bool;

    /// Install `artifact`, through the escalation program when `escalate` is set.
    ///
    /// Returns `Err` only when the installer could not be started at all.
    fn install(
        &self,
        artifact: &Path,
        escalate: bool,
    ) -> impl Future<Output = Result<InstallOutcome, UpdateError>> + Send;
}

/// Asks the user to approve running the installer with elevated privileges.
pub trait Confirm {
    /// Present `prompt` and return whether the user approved.
    fn confirm(&self, prompt: &str) -> impl Future<Output = bool> + Send;
}

/// Returns true when the process already runs as root.
#[cfg(unix)]
#[must_use]
pub fn is_elevated() -> bool {
    // SAFETY: geteuid has no preconditions and cannot fail.
    unsafe { libc::geteuid() == 0 }
}

/// Returns true when the process already runs as root.
#[cfg(not(unix))]
#[must_use]
pub fn is_elevated() -> bool {
    false
}

/// [`Installer`] that runs an external program.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandInstaller {
    program: String,
    args: Vec<String>,
    escalation_program: Option<String>,
}

impl CommandInstaller {
    /// Create an installer running `program args.. <artifact>`.
    ///
    /// `escalation_program` (usually `sudo`) is prepended when escalation is
    /// needed; `None` disables escalation entirely.
    pub fn new(
        program: impl Into<String>,
        args: Vec<String>,
        escalation_program: Option<String>,
    ) -> Self {
        Self {
            program: program.into(),
            args,
            escalation_program: escalation_program.filter(|p| !p.trim().is_empty()),
        }
    }

    /// Build from the `[settings]` table.
    #[must_use]
    pub fn from_settings(settings: &Settings) -> Self {
        Self::new(
            settings.installer_program.clone(),
            settings.installer_args.clone(),
            Some(settings.escalation_program.clone()),
        )
    }

    /// Full command line for installing `artifact`.
    #[must_use]
    pub fn command_line(&self, artifact: &Path, escalate: bool) -> Vec<String> {
        let mut line = Vec::with_capacity(self.args.len() + 3);
        if let Some(escalation) = self.escalation_program.as_ref().filter(|_| escalate) {
            line.push(escalation.clone());
        }
        line.push(self.program.clone());
        line.extend(self.args.iter().cloned());
        line.push(artifact.display().to_string());
        line
    }
}

impl Installer for CommandInstaller {
    fn needs_escalation(&self) -> bool {
        self.escalation_program.is_some() && !is_elevated()
    }

    async fn install(&self, artifact: &Path, escalate: bool) -> Result<InstallOutcome, UpdateError> {
        let line = self.command_line(artifact, escalate);
        let Some((program, args)) = line.split_first() else {
            return Ok(InstallOutcome::Failure {
                exit_code: None,
                stderr: "empty installer command".to_string(),
            });
        };

        let resolved = which::which(program).map_err(|e| {
            UpdateError::io(
                format!("locate installer program '{program}'"),
                program.as_str(),
                std::io::Error::new(std::io::ErrorKind::NotFound, e.to_string()),
            )
        })?;

        info!("Running installer: {}", line.join(" "));

        let output = Command::new(&resolved)
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .output()
            .await
            .map_err(|e| UpdateError::io(format!("run installer '{program}'"), &resolved, e))?;

        let stdout = String::from_utf8_lossy(&output.stdout);
        for line in stdout.lines().filter(|l| !l.trim().is_empty()) {
            debug!("installer: {}", line);
        }

        if output.status.success() {
            info!("Installer finished successfully");
            return Ok(InstallOutcome::Success);
        }

        let stderr = String::from_utf8_lossy(&output.stderr).into_owned();
        warn!("Installer exited with {:?}", output.status.code());
        Ok(InstallOutcome::Failure {
            exit_code: output.status.code(),
            stderr,
        })
    }
}
