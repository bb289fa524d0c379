//! engine::runner
//!
//! The single entry point for production sync attempts.
//!
//! # Architecture
//!
//! Both triggers (the CLI and the webhook listener) go through
//! [`run_sync`], which:
//!
//! ```text
//! Lock -> Wire backend and uplink -> SyncDriver::run -> Unlock
//! ```
//!
//! The lock is taken without waiting. If another attempt holds it,
//! [`RunError::Busy`] is returned and nothing else happens; how that is
//! reported is up to the trigger.
//!
//! # Example
//!
//! ```ignore
//! use naforo_agent::core::config::Config;
//! use naforo_agent::core::types::RepoName;
//! use naforo_agent::engine::runner::run_sync;
//!
//! let config = Config::load()?;
//! let report = run_sync(&config, &RepoName::default_name(), Some("git@github.com:org/app.git")).await?;
//! println!("{} commits delivered", report.commits);
//! ```

use thiserror::Error;
use tracing::Instrument;

use crate::core::config::Config;
use crate::core::lock::{AgentLock, LockError};
use crate::core::paths::AgentPaths;
use crate::core::types::RepoName;
use crate::git::GitBackend;
use crate::uplink::HttpUplink;

use super::driver::{SyncDriver, SyncError, SyncOptions, SyncReport};

/// Errors from a production sync attempt.
#[derive(Debug, Error)]
pub enum RunError {
    /// Another attempt holds the lock.
    #[error("another instance is already running")]
    Busy,

    #[error(transparent)]
    Lock(#[from] LockError),

    #[error(transparent)]
    Sync(#[from] SyncError),
}

impl RunError {
    /// Check if the attempt was skipped because another one is running.
    pub fn is_busy(&self) -> bool {
        matches!(self, RunError::Busy)
    }
}

/// Run one locked sync attempt of `repo` with the configured endpoint.
///
/// `url` is cloned from if the repository has no mirror yet.
pub async fn run_sync(
    config: &Config,
    repo: &RepoName,
    url: Option<&str>,
) -> Result<SyncReport, RunError> {
    let paths = AgentPaths::new(config.data_dir.clone());
    let _lock = AgentLock::try_acquire(&paths)?.ok_or(RunError::Busy)?;

    let span = tracing::info_span!("sync", repository = %repo);
    attempt(config, &paths, repo, url).instrument(span).await
}

async fn attempt(
    config: &Config,
    paths: &AgentPaths,
    repo: &RepoName,
    url: Option<&str>,
) -> Result<SyncReport, RunError> {
    let backend = GitBackend::new(paths.mirror_path(repo));
    let uplink = HttpUplink::from_config(config).map_err(SyncError::Delivery)?;
    let options = SyncOptions::from_config(config);

    tracing::info!(mirror = %backend.path().display(), "sync started");
    let report = SyncDriver::new(&backend, &uplink, &options)
        .run(url, &paths.cache_path(repo))
        .await?;
    tracing::info!(
        commits = report.commits,
        branch_diffs = report.branch_diffs,
        "sync finished"
    );
    Ok(report)
}
