//! core
//!
//! Domain types and the agent's on-disk state.
//!
//! # Modules
//!
//! - [`types`] - Strong types: BranchName, Oid, RepoName
//! - [`cache`] - Persisted branch → last-reported-commit mapping
//! - [`config`] - Configuration schema, loading and environment override
//! - [`lock`] - Process-wide exclusive lock
//! - [`paths`] - Centralized path routing for agent storage

pub mod cache;
pub mod config;
pub mod lock;
pub mod paths;
pub mod types;
