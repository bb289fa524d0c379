//! cli
//!
//! Command-line interface layer.
//!
//! # Responsibilities
//!
//! - Parse command-line arguments and global flags
//! - Install logging and load the configuration
//! - Run one sync attempt, or start the webhook listener
//!
//! The CLI layer is thin: everything it triggers goes through
//! [`crate::engine::run_sync`] or [`crate::server::serve`].

pub mod args;

pub use args::{Cli, Command};

use anyhow::{Context, Result};

use crate::core::config::Config;
use crate::core::types::RepoName;
use crate::engine::{run_sync, RunError};
use crate::server;
use crate::ui::logging;
use crate::ui::output::{self, Verbosity};

/// Printed when there is nothing to sync.
pub const USAGE: &str = "Usage: naforo-agent git@github.com:user/repo.git";

/// Run the CLI application.
///
/// This is the main entry point called from `main.rs`.
pub fn run() -> Result<()> {
    let cli = Cli::parse_args();
    let verbosity = Verbosity::from_flags(cli.quiet, cli.debug);
    logging::init(verbosity);

    let config = Config::load().context("failed to load configuration")?;
    tracing::debug!(?config, "configuration loaded");

    match cli.command {
        Some(Command::Serve { bind }) => serve(config, bind),
        None => sync_once(&config, cli.repo_url.as_deref(), verbosity),
    }
}

fn runtime() -> Result<tokio::runtime::Runtime> {
    tokio::runtime::Runtime::new().context("failed to start async runtime")
}

fn sync_once(config: &Config, url: Option<&str>, verbosity: Verbosity) -> Result<()> {
    if url.is_none() && !config.manual_refresh {
        println!("{}", USAGE);
        return Ok(());
    }

    match runtime()?.block_on(run_sync(config, &RepoName::default_name(), url)) {
        Ok(report) => {
            output::print(output::format_report(&report), verbosity);
            Ok(())
        }
        Err(RunError::Busy) => {
            tracing::warn!("another instance is already running");
            Ok(())
        }
        Err(e) => Err(e).context("sync failed"),
    }
}

fn serve(config: Config, bind: Option<String>) -> Result<()> {
    let bind = bind.unwrap_or_else(|| config.bind.clone());
    runtime()?
        .block_on(server::serve(config, &bind))
        .with_context(|| format!("webhook listener on {bind} failed"))
}
