//! Gateway configuration.
//!
//! Values come from a TOML file layered with `GATEWAY_*` environment
//! variables (see [`loader::load_configuration`]). Every section has defaults,
//! so a partial file is fine.

pub mod loader;

use std::time::Duration;

use serde::{Deserialize, Deserializer, Serialize};

use crate::address::Network;

pub const DEFAULT_INDEXER_PORT: u16 = 50001;
pub const DEFAULT_HEALTH_CHECK_INTERVAL_SECS: u64 = 30;
pub const DEFAULT_API_PORT: u16 = 3000;
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 60 * 5;
pub const DEFAULT_BULK_LIMIT: usize = 20;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct GatewayConfig {
    /// `None` means network validation rejects every address.
    #[serde(deserialize_with = "deserialize_network")]
    pub network: Option<Network>,
    pub indexer: IndexerConfig,
    pub api: ApiConfig,
    pub limits: BulkLimits,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct IndexerConfig {
    pub host: String,
    pub port: u16,
    /// Sent in the `server.version` handshake.
    pub client_name: String,
    pub protocol_version: String,
    pub health_check_interval_secs: u64,
}

impl IndexerConfig {
    pub fn health_check_interval(&self) -> Duration {
        Duration::from_secs(self.health_check_interval_secs.max(1))
    }
}

impl Default for IndexerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: DEFAULT_INDEXER_PORT,
            client_name: env!("CARGO_PKG_NAME").to_string(),
            protocol_version: "1.4.1".to_string(),
            health_check_interval_secs: DEFAULT_HEALTH_CHECK_INTERVAL_SECS,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ApiConfig {
    pub listen_address: String,
    pub port: u16,
    pub request_timeout_secs: u64,
}

impl ApiConfig {
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.listen_address, self.port)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            listen_address: "0.0.0.0".to_string(),
            port: DEFAULT_API_PORT,
            request_timeout_secs: DEFAULT_REQUEST_TIMEOUT_SECS,
        }
    }
}

/// Caller tier; selects which bulk bound applies.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum RequestTier {
    #[default]
    Standard,
    Elevated,
}

/// Maximum item count per bulk request, per tier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BulkLimits {
    pub standard: usize,
    pub elevated: usize,
}

impl BulkLimits {
    pub fn for_tier(&self, tier: RequestTier) -> usize {
        match tier {
            RequestTier::Standard => self.standard,
            RequestTier::Elevated => self.elevated,
        }
    }
}

impl Default for BulkLimits {
    fn default() -> Self {
        Self {
            standard: DEFAULT_BULK_LIMIT,
            elevated: DEFAULT_BULK_LIMIT,
        }
    }
}

/// Treats a missing or blank `network` as unconfigured instead of an error.
fn deserialize_network<'de, D>(deserializer: D) -> Result<Option<Network>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw: Option<String> = Option::deserialize(deserializer)?;
    match raw.as_deref().map(str::trim) {
        None | Some("") => Ok(None),
        Some(s) => s.parse().map(Some).map_err(serde::de::Error::custom),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bulk_limits_per_tier() {
        let limits = BulkLimits {
            standard: 20,
            elevated: 50,
        };
        assert_eq!(limits.for_tier(RequestTier::Standard), 20);
        assert_eq!(limits.for_tier(RequestTier::Elevated), 50);
        assert_eq!(BulkLimits::default().for_tier(RequestTier::default()), DEFAULT_BULK_LIMIT);
    }

    #[test]
    fn test_health_check_interval_never_zero() {
        let indexer = IndexerConfig {
            health_check_interval_secs: 0,
            ..IndexerConfig::default()
        };
        assert_eq!(indexer.health_check_interval(), Duration::from_secs(1));
    }
}
