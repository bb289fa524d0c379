//! uplink::traits
//!
//! Delivery of a sync payload to the aggregation endpoint.
//!
//! # Design
//!
//! `deliver` is the single commit point of a sync attempt: the cache only
//! advances after it returns `Ok`. Implementations must therefore return
//! `Err` for anything that may have prevented the endpoint from receiving
//! the payload.
//!
//! # Example
//!
//! ```ignore
//! use naforo_agent::uplink::{Uplink, UplinkError};
//! use naforo_agent::engine::SyncPayload;
//!
//! async fn send(uplink: &dyn Uplink, payload: &SyncPayload) -> Result<(), UplinkError> {
//!     let receipt = uplink.deliver(payload).await?;
//!     println!("endpoint answered {}", receipt.status);
//!     Ok(())
//! }
//! ```

use async_trait::async_trait;
use thiserror::Error;

use crate::engine::payload::SyncPayload;

/// Errors from delivery.
#[derive(Debug, Clone, Error)]
pub enum UplinkError {
    /// The payload could not be serialized or compressed.
    #[error("failed to encode payload: {0}")]
    Encode(String),

    /// The request did not complete (connection, TLS, read error).
    #[error("network error: {0}")]
    Transport(String),

    /// No response before the delivery deadline.
    #[error("delivery timed out")]
    Timeout,

    /// The endpoint answered with a non-success status and the uplink is
    /// configured to treat that as a failure.
    #[error("endpoint rejected delivery: {status} - {message}")]
    Rejected {
        /// HTTP status code
        status: u16,
        /// Response body, truncated
        message: String,
    },
}

/// Outcome of a completed delivery.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeliveryReceipt {
    /// Status code the endpoint answered with
    pub status: u16,
}

impl DeliveryReceipt {
    /// Whether the status is in the 2xx range.
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// A destination for sync payloads.
#[async_trait]
pub trait Uplink: Send + Sync {
    /// Short name for logs.
    fn name(&self) -> &'static str;

    /// Deliver `payload`. `Ok` means the endpoint received it.
    async fn deliver(&self, payload: &SyncPayload) -> Result<DeliveryReceipt, UplinkError>;
}
