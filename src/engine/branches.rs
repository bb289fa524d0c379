//! engine::branches
//!
//! Which branches a sync attempt looks at.

use crate::core::types::BranchName;
use crate::git::{GitError, VersionControlBackend};

/// Remote-tracking branches of the mirror, sorted by name.
///
/// Symbolic aliases such as `origin/HEAD` are not branches and never
/// appear. The base branch is not treated specially here; callers know it
/// by name.
pub fn enumerate<B: VersionControlBackend + ?Sized>(
    backend: &B,
) -> Result<Vec<BranchName>, GitError> {
    let mut branches = backend.remote_branches()?;
    branches.sort();
    branches.dedup();
    tracing::debug!(count = branches.len(), "enumerated branches");
    Ok(branches)
}
