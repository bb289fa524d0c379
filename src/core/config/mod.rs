//! core::config
//!
//! Configuration loading and resolution.
//!
//! # Precedence
//!
//! Each value is resolved in this order (later overrides earlier):
//! 1. Built-in default (where one exists)
//! 2. Config file
//! 3. Environment variable
//!
//! The result is resolved once at startup into a [`Config`] and passed by
//! reference to whatever needs it. Nothing below the CLI and server layers
//! reads the environment.
//!
//! # Config File Locations
//!
//! Searched in order, first existing file wins:
//! 1. `$NAFORO_CONFIG`
//! 2. `$XDG_CONFIG_HOME/naforo/config.toml`
//! 3. `~/.naforo/config.toml`
//!
//! A missing file is not an error.
//!
//! # Environment Variables
//!
//! | File key                 | Variable                        |
//! |--------------------------|---------------------------------|
//! | `access_token`           | `ACCESS_TOKEN`                  |
//! | `naforo_url`             | `NAFORO_URL`                    |
//! | `manual_refresh`         | `MANUAL_REFRESH`                |
//! | `repository_url`         | `REPOSITORY_URL`                |
//! | `require_success_status` | `NAFORO_REQUIRE_SUCCESS_STATUS` |
//! | `data_dir`               | `NAFORO_DATA_DIR`               |
//! | `base_branch`            | `NAFORO_BASE_BRANCH`            |
//! | `bind`                   | `NAFORO_BIND`                   |

pub mod schema;

pub use schema::FileConfig;

use std::fs;
use std::path::{Path, PathBuf};

use reqwest::Url;
use thiserror::Error;

use crate::core::types::BranchName;

/// Value shipped in example configs; refusing it catches unedited setups.
pub const PLACEHOLDER_TOKEN: &str = "change-me";

/// `repository_url` value that makes the webhook listener read the
/// repository from the payload.
pub const AUTO_REPOSITORY: &str = "auto";

const DEFAULT_BASE_BRANCH: &str = "master";
const DEFAULT_BIND: &str = "127.0.0.1:9292";

/// Errors from configuration operations.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file '{path}': {source}")]
    ReadError {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to parse config file '{path}': {message}")]
    ParseError { path: PathBuf, message: String },

    #[error("{0} is not set")]
    Missing(&'static str),

    #[error("please set ACCESS_TOKEN to the token issued by Naforo")]
    PlaceholderToken,

    #[error("invalid value for {key}: {message}")]
    InvalidValue { key: &'static str, message: String },

    #[error("home directory not found")]
    NoHomeDir,
}

/// Source of environment variables.
///
/// Production passes [`process_env`]; tests pass a closure over a map.
pub type EnvLookup<'a> = &'a dyn Fn(&str) -> Option<String>;

/// Read a variable from the process environment.
pub fn process_env(key: &str) -> Option<String> {
    std::env::var(key).ok()
}

/// Resolved configuration.
#[derive(Clone)]
pub struct Config {
    /// Credential sent with every delivery
    pub access_token: String,
    /// Delivery endpoint
    pub naforo_url: Url,
    /// Skip fetching when the mirror already exists
    pub manual_refresh: bool,
    /// Repository URL for the webhook listener (`auto` or a git URL)
    pub repository_url: Option<String>,
    /// Treat non-2xx delivery responses as failures
    pub require_success_status: bool,
    /// Directory holding mirrors, caches and the lock file
    pub data_dir: PathBuf,
    /// Branch every other branch is diffed against
    pub base_branch: BranchName,
    /// Listen address for the webhook listener
    pub bind: String,
    /// Config file the values were read from, if any
    pub source: Option<PathBuf>,
}

// Custom Debug to avoid exposing access_token
impl std::fmt::Debug for Config {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Config")
            .field("naforo_url", &self.naforo_url.as_str())
            .field("manual_refresh", &self.manual_refresh)
            .field("repository_url", &self.repository_url)
            .field("require_success_status", &self.require_success_status)
            .field("data_dir", &self.data_dir)
            .field("base_branch", &self.base_branch)
            .field("bind", &self.bind)
            .field("source", &self.source)
            .finish()
    }
}

impl Config {
    /// Load the config file from the standard locations and resolve it
    /// against the process environment.
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_with(&process_env)
    }

    /// Like [`Config::load`], reading variables through `env`.
    pub fn load_with(env: EnvLookup<'_>) -> Result<Self, ConfigError> {
        let (file, source) = match Self::find_config_file(env) {
            Some(path) => (Self::read_file(&path)?, Some(path)),
            None => (FileConfig::default(), None),
        };

        let mut config = Self::resolve(file, env)?;
        config.source = source;
        Ok(config)
    }

    /// Merge file values with environment overrides and validate the result.
    ///
    /// # Errors
    ///
    /// - [`ConfigError::Missing`] if the token or endpoint is absent
    /// - [`ConfigError::PlaceholderToken`] if the token was never edited
    /// - [`ConfigError::InvalidValue`] for malformed URLs, booleans or
    ///   branch names
    pub fn resolve(file: FileConfig, env: EnvLookup<'_>) -> Result<Self, ConfigError> {
        let access_token = env("ACCESS_TOKEN")
            .or(file.access_token)
            .filter(|t| !t.is_empty())
            .ok_or(ConfigError::Missing("ACCESS_TOKEN"))?;
        if access_token == PLACEHOLDER_TOKEN {
            return Err(ConfigError::PlaceholderToken);
        }

        let raw_url = env("NAFORO_URL")
            .or(file.naforo_url)
            .ok_or(ConfigError::Missing("NAFORO_URL"))?;
        let naforo_url = parse_endpoint(&raw_url)?;

        let manual_refresh = match env("MANUAL_REFRESH") {
            Some(raw) => parse_bool("MANUAL_REFRESH", &raw)?,
            None => file.manual_refresh.unwrap_or(false),
        };

        let require_success_status = match env("NAFORO_REQUIRE_SUCCESS_STATUS") {
            Some(raw) => parse_bool("NAFORO_REQUIRE_SUCCESS_STATUS", &raw)?,
            None => file.require_success_status.unwrap_or(false),
        };

        let repository_url = env("REPOSITORY_URL")
            .or(file.repository_url)
            .filter(|u| !u.trim().is_empty());

        let data_dir = match env("NAFORO_DATA_DIR").map(PathBuf::from).or(file.data_dir) {
            Some(dir) => dir,
            None => dirs::home_dir()
                .ok_or(ConfigError::NoHomeDir)?
                .join(".naforo/data"),
        };

        let raw_branch = env("NAFORO_BASE_BRANCH")
            .or(file.base_branch)
            .unwrap_or_else(|| DEFAULT_BASE_BRANCH.to_string());
        let base_branch =
            BranchName::new(raw_branch).map_err(|e| ConfigError::InvalidValue {
                key: "NAFORO_BASE_BRANCH",
                message: e.to_string(),
            })?;

        let bind = env("NAFORO_BIND")
            .or(file.bind)
            .unwrap_or_else(|| DEFAULT_BIND.to_string());

        Ok(Self {
            access_token,
            naforo_url,
            manual_refresh,
            repository_url,
            require_success_status,
            data_dir,
            base_branch,
            bind,
            source: None,
        })
    }

    /// Whether the webhook listener takes the repository from the payload.
    pub fn auto_repository(&self) -> bool {
        self.repository_url.as_deref() == Some(AUTO_REPOSITORY)
    }

    fn find_config_file(env: EnvLookup<'_>) -> Option<PathBuf> {
        let mut candidates = Vec::new();
        if let Some(path) = env("NAFORO_CONFIG") {
            candidates.push(PathBuf::from(path));
        }
        if let Some(xdg_home) = env("XDG_CONFIG_HOME") {
            candidates.push(PathBuf::from(xdg_home).join("naforo/config.toml"));
        }
        if let Some(home) = dirs::home_dir() {
            candidates.push(home.join(".naforo/config.toml"));
        }
        candidates.into_iter().find(|p| p.exists())
    }

    fn read_file(path: &Path) -> Result<FileConfig, ConfigError> {
        let contents = fs::read_to_string(path).map_err(|e| ConfigError::ReadError {
            path: path.to_path_buf(),
            source: e,
        })?;

        toml::from_str(&contents).map_err(|e| ConfigError::ParseError {
            path: path.to_path_buf(),
            message: e.to_string(),
        })
    }
}

fn parse_endpoint(raw: &str) -> Result<Url, ConfigError> {
    let url = Url::parse(raw).map_err(|e| ConfigError::InvalidValue {
        key: "NAFORO_URL",
        message: e.to_string(),
    })?;
    match url.scheme() {
        "http" | "https" => Ok(url),
        other => Err(ConfigError::InvalidValue {
            key: "NAFORO_URL",
            message: format!("unsupported scheme '{other}'"),
        }),
    }
}

fn parse_bool(key: &'static str, raw: &str) -> Result<bool, ConfigError> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "" | "0" | "false" | "no" | "off" => Ok(false),
        other => Err(ConfigError::InvalidValue {
            key,
            message: format!("expected a boolean, got '{other}'"),
        }),
    }
}
