//! core::cache
//!
//! Persisted sync state: the last commit seen on each branch as of the last
//! successful delivery.
//!
//! # Protocol
//!
//! - Read once, at the start of an attempt. The walker only uses it as an
//!   early-stop condition, never as a diff basis.
//! - Rewritten wholesale from the current branch tips, and only after the
//!   payload was delivered. A failed or interrupted attempt leaves the file
//!   exactly as it was, so the next attempt reprocesses at least the same
//!   commits (at-least-once delivery).
//! - Writes are atomic (temp file + rename): a crash mid-write leaves either
//!   the old or the new cache, never a torn one.
//!
//! # Format
//!
//! A single JSON object mapping branch name to a hex commit id:
//!
//! ```json
//! {"feature":"1f3c…","master":"9ab0…"}
//! ```

use std::collections::BTreeMap;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::core::types::{BranchName, Oid};

/// Errors from cache persistence.
#[derive(Debug, Error)]
pub enum CacheError {
    #[error("failed to read cache '{path}': {source}")]
    ReadError {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to parse cache '{path}': {message}")]
    ParseError { path: PathBuf, message: String },

    #[error("failed to write cache '{path}': {source}")]
    WriteError {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to serialize cache: {0}")]
    SerializeError(String),
}

/// Mapping from branch name to the last commit reported for it.
///
/// Backed by a `BTreeMap` so that identical state always serializes to
/// identical bytes.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SyncCache {
    branches: BTreeMap<BranchName, Oid>,
}

impl SyncCache {
    /// Create an empty cache.
    pub fn new() -> Self {
        Self::default()
    }

    /// Load the cache at `path`.
    ///
    /// A missing file is an empty cache (first sync).
    ///
    /// # Errors
    ///
    /// - [`CacheError::ReadError`] if the file exists but cannot be read
    /// - [`CacheError::ParseError`] if the contents are not a valid cache
    pub fn load(path: &Path) -> Result<Self, CacheError> {
        let contents = match fs::read_to_string(path) {
            Ok(contents) => contents,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Self::new()),
            Err(e) => {
                return Err(CacheError::ReadError {
                    path: path.to_path_buf(),
                    source: e,
                })
            }
        };

        serde_json::from_str(&contents).map_err(|e| CacheError::ParseError {
            path: path.to_path_buf(),
            message: e.to_string(),
        })
    }

    /// Write the cache to `path` atomically, replacing any previous content.
    pub fn persist(&self, path: &Path) -> Result<(), CacheError> {
        let contents =
            serde_json::to_string(self).map_err(|e| CacheError::SerializeError(e.to_string()))?;

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|e| CacheError::WriteError {
                path: path.to_path_buf(),
                source: e,
            })?;
        }

        let temp_path = path.with_extension("json.tmp");
        let write_err = |source: std::io::Error| CacheError::WriteError {
            path: temp_path.clone(),
            source,
        };

        let mut file = fs::File::create(&temp_path).map_err(write_err)?;
        file.write_all(contents.as_bytes()).map_err(write_err)?;
        file.sync_all().map_err(write_err)?;

        fs::rename(&temp_path, path).map_err(|e| CacheError::WriteError {
            path: path.to_path_buf(),
            source: e,
        })
    }

    /// Last reported commit for `branch`, if any.
    pub fn get(&self, branch: &BranchName) -> Option<&Oid> {
        self.branches.get(branch)
    }

    /// Record `oid` as the last reported commit for `branch`.
    pub fn insert(&mut self, branch: BranchName, oid: Oid) {
        self.branches.insert(branch, oid);
    }

    /// Number of branches in the cache.
    pub fn len(&self) -> usize {
        self.branches.len()
    }

    /// Whether the cache has no entries.
    pub fn is_empty(&self) -> bool {
        self.branches.is_empty()
    }

    /// Iterate entries in branch-name order.
    pub fn iter(&self) -> impl Iterator<Item = (&BranchName, &Oid)> {
        self.branches.iter()
    }
}

impl FromIterator<(BranchName, Oid)> for SyncCache {
    fn from_iter<I: IntoIterator<Item = (BranchName, Oid)>>(iter: I) -> Self {
        Self {
            branches: iter.into_iter().collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn branch(name: &str) -> BranchName {
        BranchName::new(name).unwrap()
    }

    fn oid(c: char) -> Oid {
        Oid::new(c.to_string().repeat(40)).unwrap()
    }

    #[test]
    fn missing_file_is_empty() {
        let temp = TempDir::new().unwrap();
        let cache = SyncCache::load(&temp.path().join("absent.json")).unwrap();
        assert!(cache.is_empty());
    }

    #[test]
    fn persist_then_load() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("repository.json");

        let cache: SyncCache = [(branch("master"), oid('a')), (branch("feature"), oid('b'))]
            .into_iter()
            .collect();
        cache.persist(&path).unwrap();

        let loaded = SyncCache::load(&path).unwrap();
        assert_eq!(loaded, cache);
        assert_eq!(loaded.get(&branch("feature")), Some(&oid('b')));
        assert!(!path.with_extension("json.tmp").exists());
    }

    #[test]
    fn serializes_as_flat_sorted_object() {
        let cache: SyncCache = [(branch("master"), oid('a')), (branch("feature"), oid('b'))]
            .into_iter()
            .collect();
        let json = serde_json::to_string(&cache).unwrap();
        assert_eq!(
            json,
            format!(
                "{{\"feature\":\"{}\",\"master\":\"{}\"}}",
                oid('b'),
                oid('a')
            )
        );
    }

    #[test]
    fn persist_replaces_wholesale() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("repository.json");

        let old: SyncCache = [(branch("gone"), oid('a'))].into_iter().collect();
        old.persist(&path).unwrap();

        let new: SyncCache = [(branch("master"), oid('c'))].into_iter().collect();
        new.persist(&path).unwrap();

        let loaded = SyncCache::load(&path).unwrap();
        assert_eq!(loaded.get(&branch("gone")), None);
        assert_eq!(loaded.len(), 1);
    }

    #[test]
    fn identical_state_writes_identical_bytes() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("repository.json");

        let cache: SyncCache = [(branch("b"), oid('1')), (branch("a"), oid('2'))]
            .into_iter()
            .collect();
        cache.persist(&path).unwrap();
        let first = fs::read(&path).unwrap();
        cache.persist(&path).unwrap();
        assert_eq!(fs::read(&path).unwrap(), first);
    }

    #[test]
    fn corrupt_file_is_parse_error() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("repository.json");
        fs::write(&path, "{not json").unwrap();

        assert!(matches!(
            SyncCache::load(&path),
            Err(CacheError::ParseError { .. })
        ));
    }

    #[test]
    fn invalid_sha_is_parse_error() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("repository.json");
        fs::write(&path, "{\"master\":\"nope\"}").unwrap();

        assert!(matches!(
            SyncCache::load(&path),
            Err(CacheError::ParseError { .. })
        ));
    }
}
