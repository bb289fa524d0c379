//! uplink::http
//!
//! Delivery over HTTP: one gzip-compressed JSON POST per sync attempt.
//!
//! # Status Codes
//!
//! By default the response status is logged but not inspected: any request
//! that completes counts as delivered, and the cache advances. Endpoints
//! that answer 4xx/5xx for payloads they did not store will therefore lose
//! those changes. [`HttpUplink::require_success_status`] turns non-2xx
//! answers into [`UplinkError::Rejected`] so the next attempt resends.

use std::io::Write;
use std::time::Duration;

use async_trait::async_trait;
use flate2::write::GzEncoder;
use flate2::Compression;
use reqwest::header::{
    HeaderValue, CONTENT_ENCODING, CONTENT_LENGTH, CONTENT_TYPE, USER_AGENT,
};
use reqwest::{Client, Url};

use super::traits::{DeliveryReceipt, Uplink, UplinkError};
use crate::core::config::Config;
use crate::engine::payload::{DeliveryDocument, SyncPayload};

/// How long the endpoint may take to answer.
pub const DELIVERY_TIMEOUT: Duration = Duration::from_secs(600);

const USER_AGENT_VALUE: &str = concat!("naforo-agent/", env!("CARGO_PKG_VERSION"));

/// Longest response body excerpt carried in a rejection.
const BODY_EXCERPT: usize = 500;

/// Posts payloads to a Naforo endpoint.
pub struct HttpUplink {
    client: Client,
    endpoint: Url,
    access_token: String,
    require_success_status: bool,
}

// Custom Debug to avoid exposing access_token
impl std::fmt::Debug for HttpUplink {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpUplink")
            .field("endpoint", &self.endpoint.as_str())
            .field("require_success_status", &self.require_success_status)
            .finish()
    }
}

impl HttpUplink {
    /// Uplink posting to `endpoint` with the default delivery timeout.
    pub fn new(endpoint: Url, access_token: impl Into<String>) -> Result<Self, UplinkError> {
        Self::with_timeout(endpoint, access_token, DELIVERY_TIMEOUT)
    }

    /// Uplink with a custom delivery timeout.
    pub fn with_timeout(
        endpoint: Url,
        access_token: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self, UplinkError> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| UplinkError::Transport(e.to_string()))?;

        Ok(Self {
            client,
            endpoint,
            access_token: access_token.into(),
            require_success_status: false,
        })
    }

    /// Uplink for the configured endpoint and credential.
    pub fn from_config(config: &Config) -> Result<Self, UplinkError> {
        Ok(Self::new(config.naforo_url.clone(), config.access_token.clone())?
            .require_success_status(config.require_success_status))
    }

    /// Treat non-2xx responses as delivery failures.
    pub fn require_success_status(mut self, require: bool) -> Self {
        self.require_success_status = require;
        self
    }

    /// The endpoint payloads are posted to.
    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }

    /// Serialize and gzip the delivery document for `payload`.
    fn encode(&self, payload: &SyncPayload) -> Result<Vec<u8>, UplinkError> {
        let document = DeliveryDocument::new(payload, &self.access_token);
        let json =
            serde_json::to_vec(&document).map_err(|e| UplinkError::Encode(e.to_string()))?;

        let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
        encoder
            .write_all(&json)
            .map_err(|e| UplinkError::Encode(e.to_string()))?;
        encoder
            .finish()
            .map_err(|e| UplinkError::Encode(e.to_string()))
    }
}

#[async_trait]
impl Uplink for HttpUplink {
    fn name(&self) -> &'static str {
        "http"
    }

    async fn deliver(&self, payload: &SyncPayload) -> Result<DeliveryReceipt, UplinkError> {
        let body = self.encode(payload)?;
        tracing::debug!(
            endpoint = %self.endpoint,
            bytes = body.len(),
            commits = payload.commit_count(),
            branch_diffs = payload.branch_diffs.len(),
            "posting payload"
        );

        let response = self
            .client
            .post(self.endpoint.clone())
            .header(USER_AGENT, HeaderValue::from_static(USER_AGENT_VALUE))
            .header(CONTENT_ENCODING, HeaderValue::from_static("gzip"))
            .header(CONTENT_TYPE, HeaderValue::from_static("application/json"))
            .header(CONTENT_LENGTH, body.len())
            .body(body)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    UplinkError::Timeout
                } else {
                    UplinkError::Transport(e.to_string())
                }
            })?;

        let receipt = DeliveryReceipt {
            status: response.status().as_u16(),
        };
        if receipt.is_success() {
            return Ok(receipt);
        }

        let text = response.text().await.unwrap_or_default();
        let message: String = text.trim().chars().take(BODY_EXCERPT).collect();

        if self.require_success_status {
            return Err(UplinkError::Rejected {
                status: receipt.status,
                message,
            });
        }

        tracing::warn!(
            status = receipt.status,
            body = %message,
            "endpoint answered with an error status; counting the payload as delivered"
        );
        Ok(receipt)
    }
}
