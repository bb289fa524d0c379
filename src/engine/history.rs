//! engine::history
//!
//! Bounded, newest-first history walk of one branch.
//!
//! # Stop Conditions
//!
//! Checked before each commit, in this order:
//!
//! 1. `cap` commits have been inspected
//! 2. the commit is the boundary (merge base with the base branch)
//! 3. the commit is the one cached for this branch at the last delivery
//! 4. history is exhausted
//!
//! Every inspected commit counts toward the cap, including root commits,
//! which never produce a record because they have no parent to diff
//! against. A commit whose diff cannot be computed is skipped.
//!
//! The walk is lazy: history is listed one page at a time and a page never
//! extends past the remaining cap.

use std::collections::VecDeque;

use crate::core::types::{BranchName, Oid};
use crate::git::{CommitMeta, GitError, Rev, VersionControlBackend};

use super::payload::CommitRecord;

/// Commits listed per history call.
const PAGE_SIZE: usize = 16;

/// Where a walk must stop.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WalkBounds {
    /// Maximum number of commits inspected
    pub cap: usize,
    /// Merge base with the base branch; `None` on the base branch itself
    pub boundary: Option<Oid>,
    /// Commit cached for the branch at the last successful delivery
    pub stop_at: Option<Oid>,
}

/// Start a walk of `branch` from its current tip.
pub fn walk<'a, B: VersionControlBackend + ?Sized>(
    backend: &'a B,
    branch: &'a BranchName,
    bounds: WalkBounds,
) -> HistoryWalk<'a, B> {
    HistoryWalk {
        backend,
        branch,
        bounds,
        page: VecDeque::new(),
        listed: 0,
        inspected: 0,
        exhausted: false,
        done: false,
    }
}

/// Iterator over the commit records of one branch.
///
/// Yields at most one `Err`, after which it is finished.
pub struct HistoryWalk<'a, B: VersionControlBackend + ?Sized> {
    backend: &'a B,
    branch: &'a BranchName,
    bounds: WalkBounds,
    page: VecDeque<CommitMeta>,
    listed: usize,
    inspected: usize,
    exhausted: bool,
    done: bool,
}

impl<B: VersionControlBackend + ?Sized> HistoryWalk<'_, B> {
    /// Number of commits inspected so far.
    pub fn inspected(&self) -> usize {
        self.inspected
    }

    fn next_commit(&mut self) -> Result<Option<CommitMeta>, GitError> {
        if self.page.is_empty() && !self.exhausted {
            let limit = (self.bounds.cap - self.inspected).min(PAGE_SIZE);
            let page = self
                .backend
                .log_from(Rev::Branch(self.branch), self.listed, limit)?;
            if page.len() < limit {
                self.exhausted = true;
            }
            self.listed += page.len();
            self.page.extend(page);
        }
        Ok(self.page.pop_front())
    }

    fn is_stop(&self, oid: &Oid) -> bool {
        self.bounds.boundary.as_ref() == Some(oid) || self.bounds.stop_at.as_ref() == Some(oid)
    }
}

impl<B: VersionControlBackend + ?Sized> Iterator for HistoryWalk<'_, B> {
    type Item = Result<CommitRecord, GitError>;

    fn next(&mut self) -> Option<Self::Item> {
        while !self.done {
            if self.inspected >= self.bounds.cap {
                self.done = true;
                break;
            }

            let commit = match self.next_commit() {
                Ok(Some(commit)) => commit,
                Ok(None) => {
                    self.done = true;
                    break;
                }
                Err(e) => {
                    self.done = true;
                    return Some(Err(e));
                }
            };

            if self.is_stop(&commit.oid) {
                self.done = true;
                break;
            }
            self.inspected += 1;

            let Some(parent) = commit.first_parent().cloned() else {
                continue;
            };
            match self
                .backend
                .diff(Rev::Commit(&parent), Rev::Commit(&commit.oid))
            {
                Ok(diff) => return Some(Ok(CommitRecord::new(commit, diff))),
                Err(e) => {
                    tracing::debug!(
                        branch = %self.branch,
                        commit = %commit.oid.short(10),
                        error = %e,
                        "skipping commit with unreadable diff"
                    );
                }
            }
        }
        None
    }
}
