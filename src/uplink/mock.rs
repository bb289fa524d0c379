//! uplink::mock
//!
//! In-memory uplink for deterministic testing.
//!
//! Records every payload it is handed and can be told to fail, so tests
//! can check what a sync attempt delivered and what it does when delivery
//! breaks.
//!
//! # Example
//!
//! ```
//! use naforo_agent::engine::SyncPayload;
//! use naforo_agent::uplink::mock::MockUplink;
//! use naforo_agent::uplink::{Uplink, UplinkError};
//!
//! # tokio::runtime::Runtime::new().unwrap().block_on(async {
//! let uplink = MockUplink::new();
//! uplink.deliver(&SyncPayload::new()).await.unwrap();
//! assert_eq!(uplink.deliveries().len(), 1);
//!
//! let broken = MockUplink::new().fail_with(UplinkError::Timeout);
//! assert!(broken.deliver(&SyncPayload::new()).await.is_err());
//! assert!(broken.deliveries().is_empty());
//! # });
//! ```

use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use super::traits::{DeliveryReceipt, Uplink, UplinkError};
use crate::engine::payload::SyncPayload;

/// Mock uplink for testing.
///
/// Thread-safe via internal `Arc<Mutex<...>>` wrapping; clones share state.
#[derive(Debug, Clone, Default)]
pub struct MockUplink {
    inner: Arc<Mutex<MockUplinkInner>>,
}

#[derive(Debug, Default)]
struct MockUplinkInner {
    fail_with: Option<UplinkError>,
    status: Option<u16>,
    deliveries: Vec<SyncPayload>,
    attempts: usize,
}

impl MockUplink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fail every delivery with `err` until cleared.
    pub fn fail_with(self, err: UplinkError) -> Self {
        self.inner.lock().unwrap().fail_with = Some(err);
        self
    }

    /// Answer successful deliveries with `status` instead of 200.
    pub fn respond_with(self, status: u16) -> Self {
        self.inner.lock().unwrap().status = Some(status);
        self
    }

    pub fn clear_failure(&self) {
        self.inner.lock().unwrap().fail_with = None;
    }

    /// Payloads delivered successfully, in order.
    pub fn deliveries(&self) -> Vec<SyncPayload> {
        self.inner.lock().unwrap().deliveries.clone()
    }

    /// Number of delivery attempts, failed ones included.
    pub fn attempts(&self) -> usize {
        self.inner.lock().unwrap().attempts
    }
}

#[async_trait]
impl Uplink for MockUplink {
    fn name(&self) -> &'static str {
        "mock"
    }

    async fn deliver(&self, payload: &SyncPayload) -> Result<DeliveryReceipt, UplinkError> {
        let mut inner = self.inner.lock().unwrap();
        inner.attempts += 1;
        if let Some(err) = &inner.fail_with {
            return Err(err.clone());
        }
        inner.deliveries.push(payload.clone());
        Ok(DeliveryReceipt {
            status: inner.status.unwrap_or(200),
        })
    }
}
