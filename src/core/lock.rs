//! core::lock
//!
//! Process-wide exclusive lock for sync attempts.
//!
//! # Architecture
//!
//! Only one sync attempt may run against the data directory at a time: the
//! mirror and the cache files are mutated without any transactional
//! discipline, which is only sound under a single writer. A second
//! invocation (a webhook firing during a timer-driven sync, say) must not
//! queue behind the first. It observes the lock held and gives up
//! immediately; the next trigger picks up whatever it would have reported.
//!
//! # Invariants
//!
//! - Acquisition is non-blocking (fails fast if locked)
//! - Lock is released on drop (RAII)
//! - The lock is advisory and OS-level, so it also covers separate processes
//!
//! # Example
//!
//! ```ignore
//! use naforo_agent::core::lock::AgentLock;
//!
//! match AgentLock::try_acquire(&paths)? {
//!     Some(_guard) => run_sync(),
//!     None => tracing::warn!("another instance is already running"),
//! }
//! ```

use std::fs::{self, File, OpenOptions};
use std::path::{Path, PathBuf};

use fs2::FileExt;
use thiserror::Error;

use crate::core::paths::AgentPaths;

/// Errors from locking operations.
#[derive(Debug, Error)]
pub enum LockError {
    /// Another process already holds the lock.
    #[error("another instance is already running")]
    AlreadyLocked,

    /// Failed to create lock file or directory.
    #[error("failed to create lock: {0}")]
    CreateFailed(String),

    /// Failed to acquire the OS lock.
    #[error("failed to acquire lock: {0}")]
    AcquireFailed(String),

    /// Failed to release the lock.
    #[error("failed to release lock: {0}")]
    ReleaseFailed(String),
}

/// An exclusive lock on the agent's data directory.
///
/// The lock is released when this guard is dropped, even if the attempt
/// panics.
#[derive(Debug)]
pub struct AgentLock {
    path: PathBuf,
    /// Some while the lock is held.
    file: Option<File>,
}

impl AgentLock {
    /// Attempt to acquire the lock.
    ///
    /// # Errors
    ///
    /// - [`LockError::AlreadyLocked`] if another process holds the lock
    /// - [`LockError::CreateFailed`] if the lock file cannot be created
    /// - [`LockError::AcquireFailed`] if the OS lock cannot be acquired
    pub fn acquire(paths: &AgentPaths) -> Result<Self, LockError> {
        fs::create_dir_all(paths.data_dir()).map_err(|e| {
            LockError::CreateFailed(format!(
                "cannot create {}: {}",
                paths.data_dir().display(),
                e
            ))
        })?;

        let path = paths.lock_path();
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(&path)
            .map_err(|e| {
                LockError::CreateFailed(format!("cannot open {}: {}", path.display(), e))
            })?;

        match file.try_lock_exclusive() {
            Ok(()) => Ok(Self {
                path,
                file: Some(file),
            }),
            Err(e) if e.kind() == std::io::ErrorKind::WouldBlock => Err(LockError::AlreadyLocked),
            Err(e) => Err(LockError::AcquireFailed(e.to_string())),
        }
    }

    /// Try to acquire the lock, returning `None` if it is already held.
    pub fn try_acquire(paths: &AgentPaths) -> Result<Option<Self>, LockError> {
        match Self::acquire(paths) {
            Ok(lock) => Ok(Some(lock)),
            Err(LockError::AlreadyLocked) => Ok(None),
            Err(e) => Err(e),
        }
    }

    /// Check if this guard still holds the lock.
    pub fn is_held(&self) -> bool {
        self.file.is_some()
    }

    /// Get the path to the lock file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Release the lock before the guard goes out of scope.
    pub fn release(&mut self) -> Result<(), LockError> {
        if let Some(file) = self.file.take() {
            file.unlock()
                .map_err(|e| LockError::ReleaseFailed(e.to_string()))?;
        }
        Ok(())
    }
}

impl Drop for AgentLock {
    fn drop(&mut self) {
        if let Some(file) = self.file.take() {
            let _ = file.unlock();
        }
    }
}
