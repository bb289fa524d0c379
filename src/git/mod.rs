//! git
//!
//! Everything the agent knows about Git.
//!
//! # Architecture
//!
//! The sync engine is written against the [`VersionControlBackend`] trait
//! and never imports `git2`. [`GitBackend`] is the production
//! implementation:
//!
//! - Reads (branch listing, history, diffs, merge bases) go through `git2`
//!   against the local mirror.
//! - Clone and fetch shell out to the `git` binary under a deadline, so
//!   that SSH keys and credential helpers configured for the service user
//!   work without extra setup.
//!
//! [`mock::MockBackend`] is an in-memory implementation for tests.
//!
//! # Example
//!
//! ```ignore
//! use naforo_agent::core::types::BranchName;
//! use naforo_agent::git::{GitBackend, Rev, VersionControlBackend};
//!
//! let backend = GitBackend::new("/var/lib/naforo/repository");
//! let master = BranchName::new("master")?;
//! for commit in backend.log_from(Rev::Branch(&master), 0, 10)? {
//!     println!("{} {}", commit.oid.short(7), commit.message.lines().next().unwrap_or(""));
//! }
//! ```

mod backend;
mod interface;
pub mod mock;
mod process;

pub use backend::{
    CommitMeta, DiffSummary, FileDiff, GitError, Rev, Signature, VersionControlBackend,
};
pub use interface::GitBackend;
