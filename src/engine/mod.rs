//! engine
//!
//! Incremental synchronization: mirror, walk, summarize, deliver, persist.
//!
//! # Architecture
//!
//! One sync attempt runs through these steps, each in its own module:
//!
//! 1. [`mirror`]: clone or fetch the local mirror under a deadline, which
//!    also fixes the per-branch traversal cap
//! 2. [`branches`]: list the remote-tracking branches
//! 3. [`history`]: walk each branch newest-first until the cap, the merge
//!    base, or the last reported commit
//! 4. [`divergence`]: summarize each non-base branch against the base
//! 5. [`payload`]: the records that are delivered
//! 6. [`driver`]: the state machine tying the steps together, delivering
//!    through an [`Uplink`](crate::uplink::Uplink) and persisting the cache
//!
//! [`runner`] wires the production backend and uplink to the driver under
//! the process-wide lock.
//!
//! # Invariants
//!
//! - Root commits never produce a record
//! - The base branch is never summarized against itself
//! - The cache is only written after a successful delivery, and then from
//!   the current branch tips, never merged with its previous contents
//! - The engine talks to git only through
//!   [`VersionControlBackend`](crate::git::VersionControlBackend)
//!
//! # Example
//!
//! ```ignore
//! use naforo_agent::engine::{SyncDriver, SyncOptions};
//! use naforo_agent::git::GitBackend;
//! use naforo_agent::uplink::HttpUplink;
//!
//! let backend = GitBackend::new("/var/lib/naforo/repository");
//! let uplink = HttpUplink::new(endpoint, token)?;
//! let options = SyncOptions::new(BranchName::new("master")?);
//!
//! let report = SyncDriver::new(&backend, &uplink, &options)
//!     .run(Some("git@github.com:org/app.git"), Path::new("/var/lib/naforo/repository.json"))
//!     .await?;
//! ```

pub mod branches;
pub mod divergence;
pub mod driver;
pub mod history;
pub mod mirror;
pub mod payload;
pub mod runner;

pub use divergence::BranchDivergenceAnalyzer;
pub use driver::{SyncDriver, SyncError, SyncOptions, SyncReport, SyncState};
pub use history::{HistoryWalk, WalkBounds};
pub use mirror::{MirrorAction, RepositoryMirror};
pub use payload::{
    BranchDiffSummary, CommitRecord, DeliveryDocument, DiffEntry, DivergencePoint, SyncPayload,
};
pub use runner::{run_sync, RunError};
