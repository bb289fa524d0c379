//! core::config::schema
//!
//! On-disk configuration schema.
//!
//! Every field is optional in the file: the environment may supply any of
//! them, and required values are only enforced once both sources have been
//! merged (see [`super::Config::resolve`]).

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Configuration file contents.
///
/// # Example
///
/// ```toml
/// access_token = "0123456789abcdef"
/// naforo_url = "https://naforo.example.com/api/push"
/// manual_refresh = false
/// repository_url = "auto"
/// data_dir = "/var/lib/naforo"
/// base_branch = "master"
/// bind = "0.0.0.0:9292"
/// ```
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct FileConfig {
    /// Credential sent with every delivery
    pub access_token: Option<String>,

    /// Delivery endpoint
    pub naforo_url: Option<String>,

    /// Skip fetching when the mirror already exists
    pub manual_refresh: Option<bool>,

    /// Repository synced by the webhook listener, or `auto` to take it from
    /// the webhook payload
    pub repository_url: Option<String>,

    /// Treat non-2xx delivery responses as failures
    pub require_success_status: Option<bool>,

    /// Directory holding mirrors, caches and the lock file
    pub data_dir: Option<PathBuf>,

    /// Branch every other branch is diffed against
    pub base_branch: Option<String>,

    /// Listen address for the webhook listener
    pub bind: Option<String>,
}
