//! cli::args
//!
//! Command-line argument definitions using clap derive.
//!
//! # Global Flags
//!
//! - `--debug`: Enable debug logging
//! - `--quiet` / `-q`: Errors only

use clap::{Parser, Subcommand};

/// Naforo agent - reports new commits and branch divergence to Naforo
#[derive(Parser, Debug)]
#[command(name = "naforo-agent")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Enable debug logging
    #[arg(long, global = true)]
    pub debug: bool,

    /// Errors only
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Repository to clone on first run (e.g. git@github.com:user/repo.git)
    #[arg(value_name = "REPO_URL")]
    pub repo_url: Option<String>,

    #[command(subcommand)]
    pub command: Option<Command>,
}

impl Cli {
    /// Parse command-line arguments.
    pub fn parse_args() -> Self {
        Parser::parse()
    }
}

/// Available commands.
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Listen for repository webhooks and sync on each one
    #[command(after_help = "\
EXAMPLES:
    # Sync the configured repository on every push notification
    REPOSITORY_URL=git@github.com:acme/api.git naforo-agent serve

    # Take the repository from GitHub or Bitbucket payloads
    REPOSITORY_URL=auto naforo-agent serve --bind 0.0.0.0:9292")]
    Serve {
        /// Listen address (overrides the configured one)
        #[arg(long, value_name = "ADDR")]
        bind: Option<String>,
    },
}
