//! ui
//!
//! Operator-facing output.
//!
//! # Modules
//!
//! - [`output`] - Verbosity, usage text and attempt summaries
//! - [`logging`] - `tracing` subscriber setup

pub mod logging;
pub mod output;
