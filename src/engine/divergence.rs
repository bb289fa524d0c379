//! engine::divergence
//!
//! How far a branch has moved away from the base branch.
//!
//! The summary diffs the branch tip against its merge point with the base
//! branch, so it covers everything the branch would bring in if merged now.
//! Lookups that only refine the summary degrade instead of failing:
//!
//! - no merge base: the base branch tip is used as the merge point
//! - no divergence point: the summary carries no author or start date

use crate::core::types::{BranchName, Oid};
use crate::git::{GitError, Rev, VersionControlBackend};

use super::payload::{BranchDiffSummary, DiffEntry, DivergencePoint};

/// Compares branches against one base branch.
pub struct BranchDivergenceAnalyzer<'a, B: VersionControlBackend + ?Sized> {
    backend: &'a B,
    base: &'a BranchName,
}

impl<'a, B: VersionControlBackend + ?Sized> BranchDivergenceAnalyzer<'a, B> {
    pub fn new(backend: &'a B, base: &'a BranchName) -> Self {
        Self { backend, base }
    }

    /// Most recent commit shared by `branch` and the base branch.
    ///
    /// Lookup failures are logged and reported as `None`.
    pub fn merge_base(&self, branch: &BranchName) -> Option<Oid> {
        match self
            .backend
            .merge_base(Rev::Branch(branch), Rev::Branch(self.base))
        {
            Ok(oid) => oid,
            Err(e) => {
                tracing::debug!(%branch, error = %e, "merge base lookup failed");
                None
            }
        }
    }

    /// Author and date of the first commit `branch` made off the base
    /// branch's first-parent line.
    pub fn divergence_point(&self, branch: &BranchName) -> Option<DivergencePoint> {
        let oid = match self
            .backend
            .first_divergent_commit(Rev::Branch(self.base), Rev::Branch(branch))
        {
            Ok(Some(oid)) => oid,
            Ok(None) => return None,
            Err(e) => {
                tracing::debug!(%branch, error = %e, "divergence lookup failed");
                return None;
            }
        };

        match self.backend.commit(&oid) {
            Ok(commit) => Some(commit.author.into()),
            Err(e) => {
                tracing::debug!(%branch, commit = %oid.short(10), error = %e, "divergent commit unreadable");
                None
            }
        }
    }

    /// Summary of `branch` against the base branch.
    ///
    /// Returns `Ok(None)` when there is nothing to report: `branch` is the
    /// base branch, its tip equals `cached`, no merge point can be found,
    /// or it changes no files relative to the merge point.
    ///
    /// # Errors
    ///
    /// Failure to read the branch tip or to compute the diff.
    pub fn compute_summary(
        &self,
        branch: &BranchName,
        cached: Option<&Oid>,
    ) -> Result<Option<BranchDiffSummary>, GitError> {
        if branch == self.base {
            return Ok(None);
        }

        let Some(tip) = self.backend.branch_tip(branch)? else {
            return Ok(None);
        };
        if cached == Some(&tip) {
            return Ok(None);
        }

        let merge_point = match self.merge_base(branch) {
            Some(oid) => oid,
            None => match self.backend.branch_tip(self.base)? {
                Some(oid) => oid,
                None => return Ok(None),
            },
        };

        let diff = self
            .backend
            .diff(Rev::Commit(&merge_point), Rev::Commit(&tip))?;
        if diff.is_empty() {
            tracing::debug!(%branch, "no changes against base branch");
            return Ok(None);
        }

        Ok(Some(BranchDiffSummary {
            divergence: self.divergence_point(branch),
            base_branch: self.base.clone(),
            base_branch_sha: merge_point,
            branch: branch.clone(),
            branch_sha: tip,
            additions: diff.insertions,
            deletions: diff.deletions,
            diffs: diff.files.into_iter().map(DiffEntry::from).collect(),
        }))
    }
}
