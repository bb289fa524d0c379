//! ui::output
//!
//! User-facing output of the CLI.
//!
//! Diagnostics go through `tracing`; this module only prints what the
//! operator asked for: usage text and the summary of a finished attempt.

use std::fmt::Display;

use crate::engine::SyncReport;

/// Output verbosity level.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verbosity {
    /// Quiet mode - errors only
    Quiet,
    /// Normal mode - standard output
    Normal,
    /// Debug mode - verbose output
    Debug,
}

impl Verbosity {
    /// Create verbosity from flags. `quiet` wins over `debug`.
    pub fn from_flags(quiet: bool, debug: bool) -> Self {
        if quiet {
            Verbosity::Quiet
        } else if debug {
            Verbosity::Debug
        } else {
            Verbosity::Normal
        }
    }
}

/// Print a message (respects quiet mode).
pub fn print(message: impl Display, verbosity: Verbosity) {
    if verbosity != Verbosity::Quiet {
        println!("{}", message);
    }
}

/// Print an error message (always shown).
pub fn error(message: impl Display) {
    eprintln!("error: {}", message);
}

/// One-line summary of a finished attempt.
pub fn format_report(report: &SyncReport) -> String {
    format!(
        "mirror {}: {} branches, {} new commits, {} branch diffs, delivered (HTTP {})",
        report.mirror, report.branches, report.commits, report.branch_diffs, report.receipt.status
    )
}
