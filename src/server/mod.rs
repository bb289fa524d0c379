//! server
//!
//! Webhook listener that triggers a sync attempt per request.
//!
//! # Routes
//!
//! | Method | Path      | Response                                     |
//! |--------|-----------|----------------------------------------------|
//! | POST   | `/`       | 200 `OK` after a successful sync, 422 otherwise |
//! | GET    | `/health` | 200 `OK`                                     |
//!
//! With `repository_url = "auto"` the repository comes from the `payload`
//! form field (see [`payload`]); otherwise the configured URL is synced
//! under the default repository name. Requests that arrive while another
//! attempt holds the lock get 422 and are not queued.

pub mod payload;

use std::sync::Arc;

use axum::extract::rejection::FormRejection;
use axum::extract::{Form, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::Router;
use serde::Deserialize;
use tokio::runtime::Handle;

use crate::core::config::Config;
use crate::core::types::RepoName;
use crate::engine::runner::run_sync;

pub use payload::{target_from_payload, PayloadError, RepositoryTarget};

struct AppState {
    config: Config,
}

#[derive(Debug, Deserialize)]
struct WebhookForm {
    payload: Option<String>,
}

/// Build the router. Exposed for tests.
pub fn router(config: Config) -> Router {
    let state = Arc::new(AppState { config });
    Router::new()
        .route("/", post(webhook))
        .route("/health", get(health))
        .with_state(state)
}

/// Listen on `bind` until the process exits.
pub async fn serve(config: Config, bind: &str) -> std::io::Result<()> {
    let listener = tokio::net::TcpListener::bind(bind).await?;
    tracing::info!(addr = %listener.local_addr()?, "webhook listener started");
    axum::serve(listener, router(config)).await
}

async fn health() -> &'static str {
    "OK"
}

async fn webhook(
    State(state): State<Arc<AppState>>,
    form: Result<Form<WebhookForm>, FormRejection>,
) -> Response {
    let payload = match form {
        Ok(Form(form)) => form.payload,
        Err(e) => {
            tracing::debug!(error = %e, "request carries no form body");
            None
        }
    };

    let Some(target) = resolve_target(&state.config, payload.as_deref()) else {
        return unprocessable();
    };

    // git2 reads block; the attempt runs on the blocking pool.
    let handle = Handle::current();
    let job = target.clone();
    let outcome = tokio::task::spawn_blocking(move || {
        handle.block_on(run_sync(&state.config, &job.name, Some(&job.url)))
    })
    .await;
    let result = match outcome {
        Ok(result) => result,
        Err(e) => {
            tracing::error!(repository = %target.name, error = %e, "sync task aborted");
            return unprocessable();
        }
    };

    match result {
        Ok(_) => (StatusCode::OK, "OK").into_response(),
        Err(e) if e.is_busy() => {
            tracing::warn!(repository = %target.name, "sync already running, request dropped");
            unprocessable()
        }
        Err(e) => {
            tracing::warn!(repository = %target.name, error = %e, "webhook sync failed");
            unprocessable()
        }
    }
}

fn resolve_target(config: &Config, payload: Option<&str>) -> Option<RepositoryTarget> {
    if !config.auto_repository() {
        return config.repository_url.as_ref().map(|url| RepositoryTarget {
            name: RepoName::default_name(),
            url: url.clone(),
        });
    }

    let Some(payload) = payload else {
        tracing::warn!("webhook request without payload field");
        return None;
    };
    match target_from_payload(payload) {
        Ok(target) => Some(target),
        Err(e) => {
            tracing::warn!(error = %e, body = %payload, "invalid webhook request");
            None
        }
    }
}

fn unprocessable() -> Response {
    (StatusCode::UNPROCESSABLE_ENTITY, "Unprocessable Entity").into_response()
}
