//! Session with the upstream blockchain indexer.
//!
//! [`IndexerTransport`] is the seam between the gateway and the wire. The
//! production implementation is [`ElectrumTransport`]; tests substitute an
//! in-memory mock.

mod electrum;
#[cfg(test)]
pub(crate) mod mock;

pub use electrum::{ElectrumTransport, ElectrumTransportConfig};

use async_trait::async_trait;
use serde_json::Value;

use crate::error::UpstreamError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportStatus {
    Connected,
    Disconnected,
}

/// A single JSON-RPC session with an indexer.
///
/// Lifecycle methods are only called by the connection manager, which
/// serializes them; `request` may be called concurrently.
#[async_trait]
pub trait IndexerTransport: Send + Sync {
    /// Opens the session. Replaces any previous one.
    async fn connect(&self) -> Result<(), UpstreamError>;

    async fn disconnect(&self);

    fn status(&self) -> TransportStatus;

    async fn request(&self, method: &str, params: Vec<Value>) -> Result<Value, UpstreamError>;
}
