//! Error types shared by the gateway core.
//!
//! Failures from the indexer are converted once, where they are received,
//! into [`UpstreamError`]. Everything a gateway operation can fail with is a
//! [`GatewayError`], and [`classify`] turns that into the category, message
//! and HTTP status the caller sees.

mod classifier;

pub use classifier::{ClassifiedError, ErrorCategory, classify};

use thiserror::Error;

use crate::address::AddressError;

/// Errors that can occur while talking to the indexer.
///
/// Each variant keeps only what the classifier needs, so no code outside the
/// transport has to probe raw payloads.
///
/// # Error Categories
///
/// - **Protocol errors**: [`Rpc`](UpstreamError::Rpc)
/// - **Status-carrying payloads**: [`Response`](UpstreamError::Response)
/// - **Network errors**: [`Io`](UpstreamError::Io)
/// - **Plain text replies**: [`Relayed`](UpstreamError::Relayed),
///   [`Malformed`](UpstreamError::Malformed)
/// - **Anything else**: [`Unrecognized`](UpstreamError::Unrecognized)
#[derive(Debug, Error)]
pub enum UpstreamError {
    /// The indexer answered with a JSON-RPC error object.
    ///
    /// `message` is what the indexer said, e.g. `Invalid tx hash`.
    #[error("{message}")]
    Rpc { code: i64, message: String },

    /// A payload that carries its own status, typically an HTTP error page
    /// from a proxy sitting in front of the indexer.
    #[error("Upstream responded with status {status}: {body}")]
    Response { status: u16, body: String },

    /// The connection could not be established or was lost.
    #[error("{0}")]
    Io(#[from] std::io::Error),

    /// A non-JSON line relayed by the indexer or a proxy.
    #[error("{0}")]
    Relayed(String),

    /// The indexer answered but the result did not have the expected shape.
    #[error("{0}")]
    Malformed(String),

    /// An error payload with no usable message.
    #[error("Unrecognized upstream error: {0}")]
    Unrecognized(serde_json::Value),
}

#[derive(Debug, Error)]
pub enum GatewayError {
    /// A single address failed to parse.
    #[error(transparent)]
    AddressFormat(#[from] AddressError),

    /// One item of a bulk request failed to parse.
    #[error("Invalid BCH address. Double check your address is valid: {item}")]
    InvalidBulkItem {
        item: String,
        #[source]
        source: AddressError,
    },

    #[error("{}", network_mismatch_message(.address))]
    NetworkMismatch { address: Option<String> },

    #[error("Array too large")]
    ArraySize { len: usize, max: usize },

    #[error("{0}")]
    InvalidInput(String),

    #[error("Indexer connection is not ready. Call connect() first.")]
    NotReady,

    #[error(transparent)]
    Upstream(#[from] UpstreamError),
}

impl GatewayError {
    pub fn invalid_input(message: impl Into<String>) -> Self {
        Self::InvalidInput(message.into())
    }
}

fn network_mismatch_message(address: &Option<String>) -> String {
    match address {
        Some(address) => format!(
            "Invalid network for address {address}. Trying to use a testnet address on mainnet, or vice versa."
        ),
        None => "Invalid network. Trying to use a testnet address on mainnet, or vice versa.".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_messages() {
        assert_eq!(
            GatewayError::NetworkMismatch { address: None }.to_string(),
            "Invalid network. Trying to use a testnet address on mainnet, or vice versa."
        );
        assert_eq!(
            GatewayError::NetworkMismatch {
                address: Some("bchtest:qq89kjkeqz9mngp8kl3dpmu43y2wztdjqu500gn4c4".to_string())
            }
            .to_string(),
            "Invalid network for address bchtest:qq89kjkeqz9mngp8kl3dpmu43y2wztdjqu500gn4c4. \
             Trying to use a testnet address on mainnet, or vice versa."
        );
        assert_eq!(
            GatewayError::AddressFormat(AddressError::UnsupportedFormat("abc".to_string())).to_string(),
            "Unsupported address format: abc"
        );
        assert_eq!(GatewayError::ArraySize { len: 25, max: 20 }.to_string(), "Array too large");
    }
}
