//! uplink
//!
//! Where sync payloads go.
//!
//! # Modules
//!
//! - `traits`: The [`Uplink`] trait, [`UplinkError`] and [`DeliveryReceipt`]
//! - [`http`]: Gzip JSON POST to a Naforo endpoint
//! - [`mock`]: In-memory implementation for tests

pub mod http;
pub mod mock;
mod traits;

pub use http::HttpUplink;
pub use traits::*;
