//! Address parsing and lookup-key derivation.
//!
//! The indexer does not know about addresses. It indexes outputs by the
//! SHA-256 of their locking script, byte-reversed and hex-encoded (the
//! "scripthash"). This module turns the address encodings callers send us into
//! that key:
//!
//! - [`AddressCodec`] parses legacy base58check and cashaddr text (with or
//!   without a network prefix) and derives the [`LookupKey`].
//! - [`NetworkGuard`] rejects addresses that belong to a different network than
//!   the one the gateway is configured for.
//!
//! Everything here is pure: no I/O, no shared state.

mod cashaddr;
mod codec;
mod guard;
mod legacy;

use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};
use thiserror::Error;

pub use codec::{Address, AddressCodec, LookupKey};
pub use guard::NetworkGuard;

/// Chain a gateway serves, and the chain an address belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Network {
    #[serde(alias = "main")]
    Mainnet,
    #[serde(alias = "test")]
    Testnet,
    Regtest,
}

impl fmt::Display for Network {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Network::Mainnet => write!(f, "mainnet"),
            Network::Testnet => write!(f, "testnet"),
            Network::Regtest => write!(f, "regtest"),
        }
    }
}

impl FromStr for Network {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "mainnet" | "main" => Ok(Network::Mainnet),
            "testnet" | "test" => Ok(Network::Testnet),
            "regtest" => Ok(Network::Regtest),
            other => Err(format!("Unknown network '{other}'. Expected mainnet, testnet or regtest")),
        }
    }
}

/// Locking script template an address commits to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AddressKind {
    /// Pay to public key hash.
    P2pkh,
    /// Pay to script hash.
    P2sh,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AddressError {
    /// The text is not any address encoding we understand.
    #[error("Unsupported address format: {0}")]
    UnsupportedFormat(String),

    /// The text decodes, but its checksum does not match.
    #[error("Invalid checksum: {0}")]
    InvalidChecksum(String),
}
