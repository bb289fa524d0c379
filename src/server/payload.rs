//! server::payload
//!
//! Mapping of hosting-provider webhook payloads to the repository to sync.
//!
//! Two payload shapes are recognized:
//!
//! - Bitbucket: `canon_url` and `repository.absolute_url` are present. The
//!   absolute URL is a path like `/owner/name/`.
//! - GitHub: `repository.owner` is an object and `repository.name` is
//!   present. The owner is read from `owner.name`, falling back to
//!   `owner.login`.
//!
//! Bitbucket is checked first.

use serde_json::Value;
use thiserror::Error;

use crate::core::types::{RepoName, TypeError};

/// Repository a webhook asks to sync.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RepositoryTarget {
    pub name: RepoName,
    pub url: String,
}

/// Reasons a payload does not name a repository.
#[derive(Debug, Error)]
pub enum PayloadError {
    #[error("payload is not valid JSON: {0}")]
    InvalidJson(String),

    #[error("payload matches neither GitHub nor Bitbucket")]
    Unrecognized,

    #[error("payload names an invalid repository: {0}")]
    InvalidName(#[from] TypeError),
}

/// Resolve the repository named by a webhook `payload` form field.
pub fn target_from_payload(payload: &str) -> Result<RepositoryTarget, PayloadError> {
    let data: Value =
        serde_json::from_str(payload).map_err(|e| PayloadError::InvalidJson(e.to_string()))?;

    if let Some(target) = bitbucket(&data)? {
        return Ok(target);
    }
    if let Some(target) = github(&data)? {
        return Ok(target);
    }
    Err(PayloadError::Unrecognized)
}

fn bitbucket(data: &Value) -> Result<Option<RepositoryTarget>, PayloadError> {
    if data.get("canon_url").map_or(true, Value::is_null) {
        return Ok(None);
    }
    let Some(absolute_url) = data
        .get("repository")
        .and_then(|r| r.get("absolute_url"))
        .and_then(Value::as_str)
    else {
        return Ok(None);
    };

    let path = absolute_url.trim_matches('/');
    let Some(name) = path.split('/').nth(1).filter(|s| !s.is_empty()) else {
        return Ok(None);
    };

    Ok(Some(RepositoryTarget {
        name: RepoName::new(name)?,
        url: format!("git@bitbucket.org:{path}.git"),
    }))
}

fn github(data: &Value) -> Result<Option<RepositoryTarget>, PayloadError> {
    let Some(repository) = data.get("repository") else {
        return Ok(None);
    };
    let Some(owner) = repository.get("owner").filter(|o| o.is_object()) else {
        return Ok(None);
    };
    let Some(name) = repository.get("name").and_then(Value::as_str) else {
        return Ok(None);
    };
    let Some(owner) = ["name", "login"]
        .iter()
        .find_map(|key| owner.get(*key).and_then(Value::as_str))
    else {
        return Ok(None);
    };

    Ok(Some(RepositoryTarget {
        name: RepoName::new(name)?,
        url: format!("git@github.com:{owner}/{name}.git"),
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    mod bitbucket {
        use super::*;

        #[test]
        fn path_and_name_from_absolute_url() {
            let target = target_from_payload(
                r#"{"canon_url": "https://bitbucket.org",
                    "repository": {"absolute_url": "/acme/web-app/", "name": "Web App"}}"#,
            )
            .unwrap();
            assert_eq!(target.name.as_str(), "web-app");
            assert_eq!(target.url, "git@bitbucket.org:acme/web-app.git");
        }

        #[test]
        fn missing_canon_url_is_not_bitbucket() {
            let result = target_from_payload(r#"{"repository": {"absolute_url": "/acme/web/"}}"#);
            assert!(matches!(result, Err(PayloadError::Unrecognized)));
        }
    }

    mod github {
        use super::*;

        #[test]
        fn owner_name_preferred() {
            let target = target_from_payload(
                r#"{"repository": {"name": "api", "owner": {"name": "acme", "login": "acme-bot"}}}"#,
            )
            .unwrap();
            assert_eq!(target.name.as_str(), "api");
            assert_eq!(target.url, "git@github.com:acme/api.git");
        }

        #[test]
        fn owner_login_fallback() {
            let target =
                target_from_payload(r#"{"repository": {"name": "api", "owner": {"login": "acme"}}}"#)
                    .unwrap();
            assert_eq!(target.url, "git@github.com:acme/api.git");
        }

        #[test]
        fn string_owner_is_not_github() {
            let result =
                target_from_payload(r#"{"repository": {"name": "api", "owner": "acme"}}"#);
            assert!(matches!(result, Err(PayloadError::Unrecognized)));
        }
    }

    #[test]
    fn invalid_json_rejected() {
        assert!(matches!(
            target_from_payload("payload=oops"),
            Err(PayloadError::InvalidJson(_))
        ));
    }

    #[test]
    fn unsafe_repository_name_rejected() {
        let result = target_from_payload(
            r#"{"repository": {"name": "../etc", "owner": {"name": "acme"}}}"#,
        );
        assert!(matches!(result, Err(PayloadError::InvalidName(_))));
    }
}
