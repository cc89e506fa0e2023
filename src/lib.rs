pub mod address;
pub mod api;
pub mod cli;
pub mod config;
pub mod connection;
pub mod daemon;
pub mod dispatcher;
pub mod error;
pub mod gateway;
pub mod log;
pub mod transport;

pub use crate::address::{AddressCodec, LookupKey, Network, NetworkGuard};
pub use crate::api::ApiDoc;
pub use crate::connection::{ConnectionManager, ConnectionState};
pub use crate::dispatcher::{BulkEntry, QueryDispatcher};
pub use crate::error::{ClassifiedError, ErrorCategory, GatewayError, UpstreamError, classify};
pub use crate::gateway::Gateway;
