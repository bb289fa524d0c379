//! core::paths
//!
//! Centralized path routing for agent storage locations.
//!
//! # Storage Layout
//!
//! Everything the agent owns lives under a single data directory:
//! - `naforo-agent.lock` - Exclusive lock file (one running attempt at a time)
//! - `<repo>/` - Local mirror of a tracked repository
//! - `<repo>.json` - Sync cache for that repository
//!
//! No code outside this module should compute these paths by hand.
//!
//! # Example
//!
//! ```
//! use naforo_agent::core::paths::AgentPaths;
//! use naforo_agent::core::types::RepoName;
//! use std::path::PathBuf;
//!
//! let paths = AgentPaths::new(PathBuf::from("/var/lib/naforo"));
//! let repo = RepoName::new("web").unwrap();
//!
//! assert_eq!(paths.mirror_path(&repo), PathBuf::from("/var/lib/naforo/web"));
//! assert_eq!(paths.cache_path(&repo), PathBuf::from("/var/lib/naforo/web.json"));
//! ```

use std::path::{Path, PathBuf};

use crate::core::types::RepoName;

/// Name of the lock file inside the data directory.
const LOCK_FILE_NAME: &str = "naforo-agent.lock";

/// Centralized path routing for agent storage.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AgentPaths {
    /// Root directory holding mirrors, caches and the lock file.
    pub data_dir: PathBuf,
}

impl AgentPaths {
    /// Create paths rooted at `data_dir`.
    pub fn new(data_dir: PathBuf) -> Self {
        Self { data_dir }
    }

    /// Get the data directory as a Path reference.
    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    /// Path of the local mirror for `repo`.
    pub fn mirror_path(&self, repo: &RepoName) -> PathBuf {
        self.data_dir.join(repo.as_str())
    }

    /// Path of the sync cache for `repo`.
    ///
    /// The cache sits next to the mirror, never inside it, so that deleting
    /// a broken mirror does not silently drop the sync state.
    pub fn cache_path(&self, repo: &RepoName) -> PathBuf {
        self.data_dir.join(format!("{}.json", repo.as_str()))
    }

    /// Path of the process-wide lock file.
    pub fn lock_path(&self) -> PathBuf {
        self.data_dir.join(LOCK_FILE_NAME)
    }

    /// Ensure the data directory exists.
    ///
    /// # Errors
    ///
    /// Returns an IO error if directory creation fails.
    pub fn ensure_dirs(&self) -> std::io::Result<()> {
        std::fs::create_dir_all(&self.data_dir)
    }
}
