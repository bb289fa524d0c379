//! Naforo agent - incremental git sync for Naforo
//!
//! An unattended agent that keeps a local mirror of a remote repository and
//! reports, on every trigger, exactly what changed since the last successful
//! report: new commits with their diffs, and a summary of how each branch
//! diverges from the base branch.
//!
//! # Architecture
//!
//! - [`cli`] - Command-line interface (one attempt, or the listener)
//! - [`server`] - Webhook listener mapping push notifications to attempts
//! - [`engine`] - Mirror, walk, summarize, deliver, persist
//! - [`git`] - Single interface for all Git operations
//! - [`uplink`] - Delivery of payloads to the Naforo endpoint
//! - [`core`] - Domain types, configuration, cache, lock and paths
//! - [`ui`] - Logging setup and operator output
//!
//! # Delivery Guarantees
//!
//! 1. Changes are reported at least once: the cache only advances after a
//!    delivery succeeded, so a failed attempt is repeated in full next time
//! 2. Only one attempt runs at a time per data directory
//! 3. The remote repository is never written to

pub mod cli;
pub mod core;
pub mod engine;
pub mod git;
pub mod server;
pub mod ui;
pub mod uplink;
