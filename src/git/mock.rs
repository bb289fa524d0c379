//! git::mock
//!
//! In-memory [`VersionControlBackend`] for deterministic testing.
//!
//! # Design
//!
//! Commits are built up by hand: each one names its parents and the files
//! it writes. Its tree is the union of its parents' trees (the first
//! parent wins on conflicting paths) with its own writes on top. Commit ids are
//! sequential, and so are commit timestamps, so "newest first" is simply
//! descending creation order.
//!
//! Every failure the sync engine must survive can be switched on: clone,
//! fetch, branch listing, history listing of one branch, diff into one
//! commit, merge-base lookup and divergence lookup.
//!
//! # Example
//!
//! ```
//! use naforo_agent::core::types::BranchName;
//! use naforo_agent::git::mock::MockBackend;
//! use naforo_agent::git::{Rev, VersionControlBackend};
//!
//! let backend = MockBackend::new().with_mirror();
//! let c1 = backend.add_commit(&[], &[("a.txt", "one\n")], "root");
//! let c2 = backend.add_commit(&[&c1], &[("a.txt", "two\n")], "second");
//! let master = BranchName::new("master").unwrap();
//! backend.set_branch(&master, &c2);
//!
//! let log = backend.log_from(Rev::Branch(&master), 0, 10).unwrap();
//! assert_eq!(log.len(), 2);
//! assert_eq!(log[0].oid, c2);
//! ```

use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Duration as ChronoDuration};

use super::backend::{
    CommitMeta, DiffSummary, FileDiff, GitError, Rev, Signature, VersionControlBackend,
};
use crate::core::types::{BranchName, Oid};

const EPOCH: &str = "2024-01-01T09:00:00+00:00";

/// Mock backend for testing.
///
/// Thread-safe via internal `Arc<Mutex<...>>` wrapping; clones share state.
#[derive(Debug, Clone, Default)]
pub struct MockBackend {
    inner: Arc<Mutex<MockBackendInner>>,
}

#[derive(Debug, Default)]
struct MockBackendInner {
    mirror: bool,
    next_seq: u64,
    commits: HashMap<Oid, MockCommit>,
    branches: BTreeMap<BranchName, Oid>,
    failures: Failures,
    clones: Vec<String>,
    fetches: usize,
}

#[derive(Debug, Clone)]
struct MockCommit {
    seq: u64,
    meta: CommitMeta,
    tree: BTreeMap<String, String>,
}

#[derive(Debug, Default)]
struct Failures {
    clone: bool,
    clone_leaves_nothing: bool,
    fetch: bool,
    branches: bool,
    log: HashSet<BranchName>,
    diff_into: HashSet<Oid>,
    merge_base: bool,
    divergence: bool,
}

fn failure(what: &str) -> GitError {
    GitError::Internal {
        message: format!("mock: {} failed", what),
    }
}

impl MockBackend {
    pub fn new() -> Self {
        Self::default()
    }

    fn inner(&self) -> std::sync::MutexGuard<'_, MockBackendInner> {
        self.inner.lock().unwrap()
    }

    /// Start with a mirror present, as after an earlier clone.
    pub fn with_mirror(self) -> Self {
        self.inner().mirror = true;
        self
    }

    pub fn fail_clone(self) -> Self {
        self.inner().failures.clone = true;
        self
    }

    /// Make clone report success without producing a mirror.
    pub fn clone_leaves_nothing(self) -> Self {
        self.inner().failures.clone_leaves_nothing = true;
        self
    }

    pub fn fail_fetch(self) -> Self {
        self.inner().failures.fetch = true;
        self
    }

    pub fn fail_branch_listing(self) -> Self {
        self.inner().failures.branches = true;
        self
    }

    pub fn fail_merge_base(self) -> Self {
        self.inner().failures.merge_base = true;
        self
    }

    pub fn fail_divergence(self) -> Self {
        self.inner().failures.divergence = true;
        self
    }

    /// Make history listing fail for `branch`.
    pub fn fail_log(&self, branch: &BranchName) {
        self.inner().failures.log.insert(branch.clone());
    }

    /// Make any diff ending at `oid` fail.
    pub fn fail_diff_into(&self, oid: &Oid) {
        self.inner().failures.diff_into.insert(oid.clone());
    }

    /// Create a commit with `parents`, writing `files` on top of the
    /// parents' trees.
    pub fn add_commit(&self, parents: &[&Oid], files: &[(&str, &str)], message: &str) -> Oid {
        self.add_commit_as("Mock Author", "author@example.com", parents, files, message)
    }

    /// Like [`add_commit`](Self::add_commit) with an explicit author.
    pub fn add_commit_as(
        &self,
        author_name: &str,
        author_email: &str,
        parents: &[&Oid],
        files: &[(&str, &str)],
        message: &str,
    ) -> Oid {
        let mut inner = self.inner();
        inner.next_seq += 1;
        let seq = inner.next_seq;
        let oid = Oid::new(format!("{:040x}", seq)).unwrap();

        let mut tree = BTreeMap::new();
        for parent in parents.iter().rev() {
            if let Some(commit) = inner.commits.get(*parent) {
                tree.extend(commit.tree.clone());
            }
        }
        for (path, contents) in files {
            tree.insert(path.to_string(), contents.to_string());
        }

        let time = DateTime::parse_from_rfc3339(EPOCH).unwrap()
            + ChronoDuration::minutes(seq as i64);
        let meta = CommitMeta {
            oid: oid.clone(),
            parents: parents.iter().map(|p| (*p).clone()).collect(),
            message: message.to_string(),
            author: Signature {
                name: author_name.to_string(),
                email: author_email.to_string(),
                time,
            },
            committer: Signature {
                name: "Mock Committer".to_string(),
                email: "committer@example.com".to_string(),
                time,
            },
        };

        inner
            .commits
            .insert(oid.clone(), MockCommit { seq, meta, tree });
        oid
    }

    /// Point the remote-tracking branch `branch` at `oid`.
    pub fn set_branch(&self, branch: &BranchName, oid: &Oid) {
        self.inner().branches.insert(branch.clone(), oid.clone());
    }

    pub fn delete_branch(&self, branch: &BranchName) {
        self.inner().branches.remove(branch);
    }

    /// URLs passed to `clone_from`, in order.
    pub fn clones(&self) -> Vec<String> {
        self.inner().clones.clone()
    }

    /// Number of `fetch` calls.
    pub fn fetches(&self) -> usize {
        self.inner().fetches
    }
}

impl MockBackendInner {
    fn resolve(&self, rev: Rev<'_>) -> Result<&MockCommit, GitError> {
        let oid = match rev {
            Rev::Branch(branch) => self.branches.get(branch).ok_or_else(|| GitError::RefNotFound {
                refname: branch.remote_ref("origin"),
            })?,
            Rev::Commit(oid) => oid,
        };
        self.commits.get(oid).ok_or_else(|| GitError::ObjectNotFound {
            oid: oid.to_string(),
        })
    }

    fn ancestors(&self, start: &Oid) -> HashSet<Oid> {
        let mut seen = HashSet::new();
        let mut stack = vec![start.clone()];
        while let Some(oid) = stack.pop() {
            if !seen.insert(oid.clone()) {
                continue;
            }
            if let Some(commit) = self.commits.get(&oid) {
                stack.extend(commit.meta.parents.iter().cloned());
            }
        }
        seen
    }

    fn first_parent_line(&self, start: &Oid) -> Vec<Oid> {
        let mut line = Vec::new();
        let mut current = Some(start.clone());
        while let Some(oid) = current {
            current = self
                .commits
                .get(&oid)
                .and_then(|c| c.meta.first_parent().cloned());
            line.push(oid);
        }
        line
    }
}

fn tree_diff(from: &BTreeMap<String, String>, to: &BTreeMap<String, String>) -> DiffSummary {
    let paths: BTreeSet<&String> = from.keys().chain(to.keys()).collect();
    let mut summary = DiffSummary::default();

    for path in paths {
        let old = from.get(path);
        let new = to.get(path);
        if old == new {
            continue;
        }

        let mut patch = format!("diff --git a/{0} b/{0}\n--- a/{0}\n+++ b/{0}\n", path);
        for line in old.map(|s| s.lines()).into_iter().flatten() {
            summary.deletions += 1;
            patch.push_str(&format!("-{}\n", line));
        }
        for line in new.map(|s| s.lines()).into_iter().flatten() {
            summary.insertions += 1;
            patch.push_str(&format!("+{}\n", line));
        }
        summary.files.push(FileDiff {
            patch,
            binary: false,
        });
    }
    summary
}

#[async_trait]
impl VersionControlBackend for MockBackend {
    fn mirror_exists(&self) -> bool {
        self.inner().mirror
    }

    async fn clone_from(&self, url: &str, _deadline: Duration) -> Result<(), GitError> {
        let mut inner = self.inner();
        inner.clones.push(url.to_string());
        if inner.failures.clone {
            return Err(GitError::CommandFailed {
                command: format!("git clone {}", url),
                message: "mock: clone failed".to_string(),
            });
        }
        if !inner.failures.clone_leaves_nothing {
            inner.mirror = true;
        }
        Ok(())
    }

    async fn fetch(&self, _deadline: Duration) -> Result<(), GitError> {
        let mut inner = self.inner();
        inner.fetches += 1;
        if inner.failures.fetch {
            return Err(GitError::CommandFailed {
                command: "git fetch --prune origin".to_string(),
                message: "mock: fetch failed".to_string(),
            });
        }
        Ok(())
    }

    fn remote_branches(&self) -> Result<Vec<BranchName>, GitError> {
        let inner = self.inner();
        if inner.failures.branches {
            return Err(failure("branch listing"));
        }
        Ok(inner.branches.keys().cloned().collect())
    }

    fn branch_tip(&self, branch: &BranchName) -> Result<Option<Oid>, GitError> {
        Ok(self.inner().branches.get(branch).cloned())
    }

    fn log_from(
        &self,
        rev: Rev<'_>,
        skip: usize,
        limit: usize,
    ) -> Result<Vec<CommitMeta>, GitError> {
        let inner = self.inner();
        if let Rev::Branch(branch) = rev {
            if inner.failures.log.contains(branch) {
                return Err(failure("log"));
            }
        }
        let start = inner.resolve(rev)?.meta.oid.clone();

        let mut reachable: Vec<&MockCommit> = inner
            .ancestors(&start)
            .iter()
            .filter_map(|oid| inner.commits.get(oid))
            .collect();
        reachable.sort_by(|a, b| b.seq.cmp(&a.seq));

        Ok(reachable
            .into_iter()
            .skip(skip)
            .take(limit)
            .map(|c| c.meta.clone())
            .collect())
    }

    fn commit(&self, oid: &Oid) -> Result<CommitMeta, GitError> {
        Ok(self.inner().resolve(Rev::Commit(oid))?.meta.clone())
    }

    fn diff(&self, from: Rev<'_>, to: Rev<'_>) -> Result<DiffSummary, GitError> {
        let inner = self.inner();
        let to = inner.resolve(to)?;
        if inner.failures.diff_into.contains(&to.meta.oid) {
            return Err(failure("diff"));
        }
        let from = inner.resolve(from)?;
        Ok(tree_diff(&from.tree, &to.tree))
    }

    fn merge_base(&self, a: Rev<'_>, b: Rev<'_>) -> Result<Option<Oid>, GitError> {
        let inner = self.inner();
        if inner.failures.merge_base {
            return Err(failure("merge-base"));
        }
        let a = inner.resolve(a)?.meta.oid.clone();
        let b = inner.resolve(b)?.meta.oid.clone();

        let from_a = inner.ancestors(&a);
        Ok(inner
            .ancestors(&b)
            .into_iter()
            .filter(|oid| from_a.contains(oid))
            .filter_map(|oid| inner.commits.get(&oid))
            .max_by_key(|c| c.seq)
            .map(|c| c.meta.oid.clone()))
    }

    fn first_divergent_commit(
        &self,
        base: Rev<'_>,
        branch: Rev<'_>,
    ) -> Result<Option<Oid>, GitError> {
        let inner = self.inner();
        if inner.failures.divergence {
            return Err(failure("divergence"));
        }
        let base = inner.resolve(base)?.meta.oid.clone();
        let branch = inner.resolve(branch)?.meta.oid.clone();

        let base_line: HashSet<Oid> = inner.first_parent_line(&base).into_iter().collect();
        Ok(inner
            .first_parent_line(&branch)
            .into_iter()
            .take_while(|oid| !base_line.contains(oid))
            .last())
    }
}
