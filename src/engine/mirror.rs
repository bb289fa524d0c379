//! engine::mirror
//!
//! Bootstrap or refresh of the local mirror, and the traversal cap that
//! follows from which one ran.
//!
//! A freshly cloned mirror has no cache to bound the walk, so it walks at
//! most [`INITIAL_CAP`] commits per branch. A refreshed mirror walks up to
//! [`UPDATE_CAP`]; the cache normally stops it much earlier.

use std::fmt;
use std::time::Duration;

use crate::git::{GitError, VersionControlBackend};

use super::driver::{SyncError, SyncOptions};

/// Deadline for cloning a repository that has no mirror yet.
pub const CLONE_DEADLINE: Duration = Duration::from_secs(30 * 60);

/// Deadline for fetching into an existing mirror.
pub const FETCH_DEADLINE: Duration = Duration::from_secs(15 * 60);

/// Commits inspected per branch right after a clone.
pub const INITIAL_CAP: usize = 10;

/// Commits inspected per branch on an existing mirror.
pub const UPDATE_CAP: usize = 50;

/// What was done to bring the mirror up to date.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MirrorAction {
    /// No mirror existed; the repository was cloned.
    Cloned,
    /// The existing mirror was fetched.
    Fetched,
    /// The existing mirror was used as is (manual refresh mode).
    Reused,
}

impl MirrorAction {
    /// Per-branch traversal cap for a walk following this action.
    pub fn cap(self, options: &SyncOptions) -> usize {
        match self {
            MirrorAction::Cloned => options.initial_cap,
            MirrorAction::Fetched | MirrorAction::Reused => options.update_cap,
        }
    }
}

impl fmt::Display for MirrorAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            MirrorAction::Cloned => "cloned",
            MirrorAction::Fetched => "fetched",
            MirrorAction::Reused => "reused",
        };
        write!(f, "{}", s)
    }
}

/// The local mirror of one remote repository.
pub struct RepositoryMirror<'a, B: VersionControlBackend + ?Sized> {
    backend: &'a B,
    options: &'a SyncOptions,
}

impl<'a, B: VersionControlBackend + ?Sized> RepositoryMirror<'a, B> {
    pub fn new(backend: &'a B, options: &'a SyncOptions) -> Self {
        Self { backend, options }
    }

    /// Decide how the mirror will be brought up to date.
    pub fn plan(&self) -> MirrorAction {
        match (self.backend.mirror_exists(), self.options.manual_refresh) {
            (false, _) => MirrorAction::Cloned,
            (true, false) => MirrorAction::Fetched,
            (true, true) => MirrorAction::Reused,
        }
    }

    /// Carry out `action`. `url` is only needed to clone.
    pub async fn apply(&self, action: MirrorAction, url: Option<&str>) -> Result<(), SyncError> {
        match action {
            MirrorAction::Cloned => {
                let url = url.ok_or(SyncError::NoRepositoryUrl)?;
                self.bootstrap(url).await
            }
            MirrorAction::Fetched => self.refresh().await,
            MirrorAction::Reused => {
                tracing::info!("manual refresh: using mirror as is");
                Ok(())
            }
        }
    }

    /// Clone `url` into the mirror location.
    ///
    /// # Errors
    ///
    /// [`SyncError::Clone`] if the clone fails, runs past its deadline, or
    /// finishes without leaving a repository behind.
    pub async fn bootstrap(&self, url: &str) -> Result<(), SyncError> {
        tracing::info!("cloning repository");
        self.backend
            .clone_from(url, self.options.clone_deadline)
            .await
            .map_err(SyncError::Clone)?;

        if !self.backend.mirror_exists() {
            return Err(SyncError::Clone(GitError::CommandFailed {
                command: "git clone".to_string(),
                message: "finished without creating a repository".to_string(),
            }));
        }
        Ok(())
    }

    /// Fetch remote updates into the existing mirror.
    pub async fn refresh(&self) -> Result<(), SyncError> {
        tracing::info!("fetching updates");
        self.backend
            .fetch(self.options.fetch_deadline)
            .await
            .map_err(SyncError::Fetch)
    }
}
