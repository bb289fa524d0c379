//! engine::driver
//!
//! One sync attempt for one repository.
//!
//! # States
//!
//! ```text
//! Idle -> Bootstrapping | Refreshing -> Enumerating -> PerBranchProcessing
//!      -> Assembling -> Delivering -> Persisting -> Done
//! ```
//!
//! A reused mirror (manual refresh) goes from `Idle` straight to
//! `Enumerating`. Any fatal error moves the attempt to `Failed`.
//!
//! # Failure Semantics
//!
//! Fatal: clone, fetch, branch enumeration, delivery, reading the new
//! branch tips, writing the cache. Everything inside `PerBranchProcessing`
//! is per-branch: a branch whose history cannot be listed contributes no
//! commits, a branch whose summary cannot be computed contributes no
//! summary, and the attempt goes on.
//!
//! The cache file is only written in `Persisting`, after delivery
//! succeeded. Any earlier failure leaves it untouched, so the next attempt
//! reports at least the same changes again.

use std::fmt;
use std::path::Path;
use std::time::Duration;

use thiserror::Error;

use crate::core::cache::{CacheError, SyncCache};
use crate::core::config::Config;
use crate::core::types::BranchName;
use crate::git::{GitError, VersionControlBackend};
use crate::uplink::{DeliveryReceipt, Uplink, UplinkError};

use super::branches;
use super::divergence::BranchDivergenceAnalyzer;
use super::history::{self, WalkBounds};
use super::mirror::{
    MirrorAction, RepositoryMirror, CLONE_DEADLINE, FETCH_DEADLINE, INITIAL_CAP, UPDATE_CAP,
};
use super::payload::SyncPayload;

/// Errors that abort a sync attempt.
#[derive(Debug, Error)]
pub enum SyncError {
    #[error("no local mirror and no repository URL to clone")]
    NoRepositoryUrl,

    #[error("clone failed: {0}")]
    Clone(#[source] GitError),

    #[error("fetch failed: {0}")]
    Fetch(#[source] GitError),

    #[error("failed to list branches: {0}")]
    Enumerate(#[source] GitError),

    #[error("delivery failed: {0}")]
    Delivery(#[source] UplinkError),

    #[error("failed to read branch tips: {0}")]
    Tips(#[source] GitError),

    #[error(transparent)]
    Cache(#[from] CacheError),
}

/// Tunables of a sync attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncOptions {
    /// Branch every other branch is compared against
    pub base_branch: BranchName,
    /// Use an existing mirror without fetching
    pub manual_refresh: bool,
    pub clone_deadline: Duration,
    pub fetch_deadline: Duration,
    /// Traversal cap right after a clone
    pub initial_cap: usize,
    /// Traversal cap on an existing mirror
    pub update_cap: usize,
}

impl SyncOptions {
    /// Default deadlines and caps with the given base branch.
    pub fn new(base_branch: BranchName) -> Self {
        Self {
            base_branch,
            manual_refresh: false,
            clone_deadline: CLONE_DEADLINE,
            fetch_deadline: FETCH_DEADLINE,
            initial_cap: INITIAL_CAP,
            update_cap: UPDATE_CAP,
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self {
            manual_refresh: config.manual_refresh,
            ..Self::new(config.base_branch.clone())
        }
    }
}

/// Where an attempt is.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncState {
    Idle,
    Bootstrapping,
    Refreshing,
    Enumerating,
    PerBranchProcessing,
    Assembling,
    Delivering,
    Persisting,
    Done,
    Failed,
}

impl fmt::Display for SyncState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            SyncState::Idle => "idle",
            SyncState::Bootstrapping => "bootstrapping",
            SyncState::Refreshing => "refreshing",
            SyncState::Enumerating => "enumerating",
            SyncState::PerBranchProcessing => "per-branch processing",
            SyncState::Assembling => "assembling",
            SyncState::Delivering => "delivering",
            SyncState::Persisting => "persisting",
            SyncState::Done => "done",
            SyncState::Failed => "failed",
        };
        write!(f, "{}", s)
    }
}

/// Outcome of a successful attempt.
#[derive(Debug, Clone)]
pub struct SyncReport {
    /// What was done to the mirror
    pub mirror: MirrorAction,
    /// Per-branch traversal cap that applied
    pub cap: usize,
    /// Branches looked at
    pub branches: usize,
    /// Commit records delivered
    pub commits: usize,
    /// Branch summaries delivered
    pub branch_diffs: usize,
    pub receipt: DeliveryReceipt,
    /// Cache as persisted at the end of the attempt
    pub cache: SyncCache,
    /// Every state the attempt went through, `Idle` first
    pub transitions: Vec<SyncState>,
}

/// Runs sync attempts against a backend and an uplink.
pub struct SyncDriver<'a, B: VersionControlBackend + ?Sized, U: Uplink + ?Sized> {
    backend: &'a B,
    uplink: &'a U,
    options: &'a SyncOptions,
    transitions: Vec<SyncState>,
}

impl<'a, B, U> SyncDriver<'a, B, U>
where
    B: VersionControlBackend + ?Sized,
    U: Uplink + ?Sized,
{
    pub fn new(backend: &'a B, uplink: &'a U, options: &'a SyncOptions) -> Self {
        Self {
            backend,
            uplink,
            options,
            transitions: vec![SyncState::Idle],
        }
    }

    /// Current state.
    pub fn state(&self) -> SyncState {
        self.transitions
            .last()
            .copied()
            .unwrap_or(SyncState::Idle)
    }

    fn enter(&mut self, state: SyncState) {
        tracing::debug!(from = %self.state(), to = %state, "sync state");
        self.transitions.push(state);
    }

    fn fail(&mut self, err: SyncError) -> SyncError {
        tracing::debug!(state = %self.state(), error = %err, "sync attempt failed");
        self.transitions.push(SyncState::Failed);
        err
    }

    /// Run one attempt.
    ///
    /// `url` is only used when no mirror exists yet. `cache_path` is read
    /// at the start and rewritten only after a successful delivery.
    pub async fn run(
        &mut self,
        url: Option<&str>,
        cache_path: &Path,
    ) -> Result<SyncReport, SyncError> {
        match self.attempt(url, cache_path).await {
            Ok(report) => Ok(report),
            Err(e) => Err(self.fail(e)),
        }
    }

    async fn attempt(
        &mut self,
        url: Option<&str>,
        cache_path: &Path,
    ) -> Result<SyncReport, SyncError> {
        let previous = load_cache(cache_path)?;

        let mirror = RepositoryMirror::new(self.backend, self.options);
        let action = mirror.plan();
        match action {
            MirrorAction::Cloned => self.enter(SyncState::Bootstrapping),
            MirrorAction::Fetched => self.enter(SyncState::Refreshing),
            MirrorAction::Reused => {}
        }
        mirror.apply(action, url).await?;
        let cap = action.cap(self.options);

        self.enter(SyncState::Enumerating);
        let branches = branches::enumerate(self.backend).map_err(SyncError::Enumerate)?;

        self.enter(SyncState::PerBranchProcessing);
        let mut payload = SyncPayload::new();
        self.process_branches(&branches, &previous, cap, &mut payload);

        self.enter(SyncState::Assembling);
        let commits = payload.commit_count();
        let branch_diffs = payload.branch_diffs.len();
        tracing::info!(
            mirror = %action,
            branches = branches.len(),
            commits,
            branch_diffs,
            "payload assembled"
        );

        self.enter(SyncState::Delivering);
        let receipt = self
            .uplink
            .deliver(&payload)
            .await
            .map_err(SyncError::Delivery)?;
        tracing::info!(uplink = self.uplink.name(), status = receipt.status, "payload delivered");

        self.enter(SyncState::Persisting);
        let cache = self.current_tips(&branches)?;
        cache.persist(cache_path)?;

        self.enter(SyncState::Done);
        Ok(SyncReport {
            mirror: action,
            cap,
            branches: branches.len(),
            commits,
            branch_diffs,
            receipt,
            cache,
            transitions: self.transitions.clone(),
        })
    }

    fn process_branches(
        &self,
        branches: &[BranchName],
        previous: &SyncCache,
        cap: usize,
        payload: &mut SyncPayload,
    ) {
        let base = &self.options.base_branch;
        let analyzer = BranchDivergenceAnalyzer::new(self.backend, base);

        for branch in branches {
            let cached = previous.get(branch);
            let bounds = WalkBounds {
                cap,
                boundary: if branch == base {
                    None
                } else {
                    analyzer.merge_base(branch)
                },
                stop_at: cached.cloned(),
            };

            match history::walk(self.backend, branch, bounds).collect::<Result<Vec<_>, _>>() {
                Ok(records) => payload.add_commits(branch.clone(), records),
                Err(e) => {
                    tracing::warn!(%branch, error = %e, "cannot list history; skipping branch commits")
                }
            }

            match analyzer.compute_summary(branch, cached) {
                Ok(Some(summary)) => payload.add_branch_diff(summary),
                Ok(None) => {}
                Err(e) => {
                    tracing::warn!(%branch, error = %e, "cannot summarize branch; skipping")
                }
            }
        }
    }

    /// Cache contents reflecting the branch tips right now.
    fn current_tips(&self, branches: &[BranchName]) -> Result<SyncCache, SyncError> {
        let mut cache = SyncCache::new();
        for branch in branches {
            if let Some(tip) = self.backend.branch_tip(branch).map_err(SyncError::Tips)? {
                cache.insert(branch.clone(), tip);
            }
        }
        Ok(cache)
    }
}

/// Read the cache, treating an unparseable file as empty.
fn load_cache(path: &Path) -> Result<SyncCache, SyncError> {
    match SyncCache::load(path) {
        Ok(cache) => Ok(cache),
        Err(e @ CacheError::ParseError { .. }) => {
            tracing::warn!(error = %e, "ignoring unreadable cache");
            Ok(SyncCache::new())
        }
        Err(e) => Err(e.into()),
    }
}
