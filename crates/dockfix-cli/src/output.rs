//! Formatted output helpers for CLI commands.

use std::time::Duration;

pub const BOLD: &str = "\x1b[1m";
pub const DIM: &str = "\x1b[2m";
pub const GREEN: &str = "\x1b[32m";
pub const CYAN: &str = "\x1b[36m";
pub const YELLOW: &str = "\x1b[33m";
pub const RESET: &str = "\x1b[0m";

/// Formats an elapsed time: milliseconds below one second, otherwise
/// seconds with one decimal.
#[must_use]
pub fn format_elapsed(elapsed: Duration) -> String {
    if elapsed < Duration::from_secs(1) {
        format!("{} ms", elapsed.as_millis())
    } else {
        format!("{:.1}s", elapsed.as_secs_f64())
    }
}

/// Prints the application banner to stderr.
pub fn print_header() {
    eprintln!();
    eprintln!(
        "  {BOLD}{}{RESET} {DIM}v{}{RESET}",
        dockfix_common::constants::APP_NAME,
        env!("CARGO_PKG_VERSION")
    );
    eprintln!();
}
