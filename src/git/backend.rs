//! git::backend
//!
//! The narrow capability interface the sync engine uses to talk to a
//! repository mirror.
//!
//! # Design
//!
//! The engine never assumes how these operations are carried out: the
//! production [`GitBackend`](super::GitBackend) reads through libgit2 and
//! shells out to the `git` binary for network operations, and tests drive
//! the engine with in-memory implementations. Revisions are passed as
//! [`Rev`] so that the engine never has to know the name of the remote
//! the mirror tracks.
//!
//! Clone and fetch are async because they are bounded by deadlines and may
//! run for many minutes. Everything else is a local, blocking read.

use std::path::PathBuf;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, FixedOffset};
use thiserror::Error;

use crate::core::types::{BranchName, Oid, TypeError};

/// Errors from version-control operations.
#[derive(Debug, Error)]
pub enum GitError {
    /// No repository at the mirror path.
    #[error("not a git repository: {path}")]
    NotARepo {
        /// The path that was opened
        path: PathBuf,
    },

    /// The mirror has no remote to fetch from.
    #[error("repository has no remote configured")]
    NoRemote,

    /// Requested ref does not exist.
    #[error("ref not found: {refname}")]
    RefNotFound {
        /// The ref that was not found
        refname: String,
    },

    /// Object not found in repository.
    #[error("object not found: {oid}")]
    ObjectNotFound {
        /// The OID that was not found
        oid: String,
    },

    /// Invalid object id format.
    #[error("invalid object id: {oid}")]
    InvalidOid {
        /// The invalid OID string
        oid: String,
    },

    /// An external git command could not be spawned or exited non-zero.
    #[error("`{command}` failed: {message}")]
    CommandFailed {
        /// The command line, without credentials
        command: String,
        /// Exit status and trimmed stderr
        message: String,
    },

    /// An external git command ran past its deadline and was killed.
    #[error("`{command}` timed out after {}s", .after.as_secs())]
    Timeout {
        /// The command line, without credentials
        command: String,
        /// The deadline that was exceeded
        after: Duration,
    },

    /// Internal libgit2 error.
    #[error("git error: {message}")]
    Internal {
        /// The error message
        message: String,
    },
}

impl From<TypeError> for GitError {
    fn from(err: TypeError) -> Self {
        match err {
            TypeError::InvalidOid(msg) => GitError::InvalidOid { oid: msg },
            other => GitError::Internal {
                message: other.to_string(),
            },
        }
    }
}

/// A revision as the engine names it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rev<'a> {
    /// Tip of a remote-tracking branch.
    Branch(&'a BranchName),
    /// A specific commit.
    Commit(&'a Oid),
}

impl std::fmt::Display for Rev<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Rev::Branch(name) => write!(f, "{}", name),
            Rev::Commit(oid) => write!(f, "{}", oid.short(10)),
        }
    }
}

/// Name, email and timestamp of an author or committer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Signature {
    pub name: String,
    pub email: String,
    /// Timestamp in the signer's own UTC offset
    pub time: DateTime<FixedOffset>,
}

/// Metadata of a single commit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommitMeta {
    pub oid: Oid,
    /// Parent ids in order; empty for a root commit
    pub parents: Vec<Oid>,
    /// Full commit message
    pub message: String,
    pub author: Signature,
    pub committer: Signature,
}

impl CommitMeta {
    /// The parent a commit is diffed against, if it has one.
    pub fn first_parent(&self) -> Option<&Oid> {
        self.parents.first()
    }
}

/// Diff of a single file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileDiff {
    /// Patch text including the `diff --git` header
    pub patch: String,
    pub binary: bool,
}

/// Diff between two revisions.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DiffSummary {
    pub insertions: usize,
    pub deletions: usize,
    pub files: Vec<FileDiff>,
}

impl DiffSummary {
    /// Whether no file changed between the two revisions.
    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }
}

/// Operations the sync engine needs from a repository mirror.
#[async_trait]
pub trait VersionControlBackend: Send + Sync {
    /// Whether a local mirror is present.
    fn mirror_exists(&self) -> bool;

    /// Clone `url` into the mirror location, killing the clone once
    /// `deadline` has elapsed.
    async fn clone_from(&self, url: &str, deadline: Duration) -> Result<(), GitError>;

    /// Fetch all updates from the mirror's remote within `deadline`.
    async fn fetch(&self, deadline: Duration) -> Result<(), GitError>;

    /// Remote-tracking branch names, symbolic aliases excluded.
    fn remote_branches(&self) -> Result<Vec<BranchName>, GitError>;

    /// Current tip of a remote-tracking branch, `None` if it does not exist.
    fn branch_tip(&self, branch: &BranchName) -> Result<Option<Oid>, GitError>;

    /// Up to `limit` commits reachable from `rev`, newest first, after
    /// skipping the first `skip`.
    fn log_from(&self, rev: Rev<'_>, skip: usize, limit: usize)
        -> Result<Vec<CommitMeta>, GitError>;

    /// Metadata of a single commit.
    fn commit(&self, oid: &Oid) -> Result<CommitMeta, GitError>;

    /// Diff from `from` to `to`.
    fn diff(&self, from: Rev<'_>, to: Rev<'_>) -> Result<DiffSummary, GitError>;

    /// Most recent commit reachable from both revisions.
    fn merge_base(&self, a: Rev<'_>, b: Rev<'_>) -> Result<Option<Oid>, GitError>;

    /// Oldest commit on `branch`'s first-parent line that is not on
    /// `base`'s first-parent line.
    fn first_divergent_commit(&self, base: Rev<'_>, branch: Rev<'_>)
        -> Result<Option<Oid>, GitError>;
}
