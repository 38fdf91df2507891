//! Interactive helpers shared by the command line front end.

use colored::Colorize;
use std::io::{self, IsTerminal, Write};
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{info, warn};

use crate::installer::Confirm;

/// [`Confirm`] that asks on the terminal.
///
/// With `assume_yes` every prompt is approved without asking. Without a
/// terminal on stdin (cron, pipes) every prompt is declined.
#[derive(Debug, Clone, Copy, Default)]
pub struct TerminalConfirm {
    assume_yes: bool,
    interactive: bool,
}

impl TerminalConfirm {
    /// Create a prompt, approving everything when `assume_yes` is set.
    ///
    /// Whether a prompt can be shown is decided from stdin at creation.
    #[must_use]
    pub fn new(assume_yes: bool) -> Self {
        Self {
            assume_yes,
            interactive: io::stdin().is_terminal(),
        }
    }

    /// Override whether a user is there to answer.
    #[must_use]
    pub const fn interactive(mut self, interactive: bool) -> Self {
        self.interactive = interactive;
        self
    }
}

/// Interpret a typed answer. Only an explicit yes approves.
#[must_use]
pub fn is_affirmative(answer: &str) -> bool {
    matches!(answer.trim().to_ascii_lowercase().as_str(), "y" | "yes")
}

impl Confirm for TerminalConfirm {
    async fn confirm(&self, prompt: &str) -> bool {
        if self.assume_yes {
            info!("Escalation approved by --yes");
            return true;
        }

        if !self.interactive {
            warn!("Cannot ask for confirmation without a terminal; pass --yes to allow escalation");
            return false;
        }

        print!("{} ", format!("{prompt} [y/N]:").green());
        if let Err(e) = io::stdout().flush() {
            warn!("Failed to flush prompt: {}", e);
        }

        let mut reader = BufReader::new(tokio::io::stdin());
        let mut response = String::new();
        match reader.read_line(&mut response).await {
            Ok(_) => is_affirmative(&response),
            Err(e) => {
                warn!("Failed to read answer: {}", e);
                false
            }
        }
    }
}
