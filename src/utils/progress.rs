//! Download progress display
//!
//! A thin layer over `indicatif` so every download looks the same. Bars are
//! hidden when the caller asks for it (quiet mode, non-TTY stderr) or when
//! `PLEX_UPDATE_NO_PROGRESS` is set, which keeps cron mail and CI logs clean.

use indicatif::{ProgressBar, ProgressStyle};

/// Environment variable that disables all progress bars.
pub const NO_PROGRESS_ENV: &str = "PLEX_UPDATE_NO_PROGRESS";

fn is_progress_disabled() -> bool {
    std::env::var_os(NO_PROGRESS_ENV).is_some()
}

/// Style for byte-counting download bars.
///
/// ```text
/// plexmediaserver_1.40.0_amd64.deb [━━━━━━━━━━━━━━━━━━━━╸━━━━━━━━━━━━━━━━━━━] 48.2MiB/96.1MiB (00:05)
/// ```
#[must_use]
pub fn download_style() -> ProgressStyle {
    ProgressStyle::default_bar()
        .template("{prefix:.bold.cyan} [{bar:40.cyan/blue}] {bytes}/{total_bytes} ({eta})")
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("━╸━")
}

/// Style for downloads whose size the server did not announce.
#[must_use]
pub fn unknown_length_style() -> ProgressStyle {
    ProgressStyle::default_spinner()
        .template("{prefix:.bold.cyan} {spinner:.cyan} {bytes} ({bytes_per_sec})")
        .unwrap_or_else(|_| ProgressStyle::default_spinner())
        .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"])
}

/// Create a bar for a download of `total` bytes labelled with `label`.
///
/// Returns a hidden bar when `enabled` is false or progress is disabled via
/// the environment; a hidden bar accepts every call and draws nothing.
#[must_use]
pub fn download_bar(total: Option<u64>, label: &str, enabled: bool) -> ProgressBar {
    if !enabled || is_progress_disabled() {
        return ProgressBar::hidden();
    }

    let bar = match total {
        Some(len) => {
            let bar = ProgressBar::new(len);
            bar.set_style(download_style());
            bar
        }
        None => {
            let bar = ProgressBar::new_spinner();
            bar.set_style(unknown_length_style());
            bar
        }
    };
    bar.set_prefix(label.to_string());
    bar
}
