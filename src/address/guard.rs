use log::{error, warn};

use super::{Address, AddressCodec, Network};
use crate::log::mask_address;

/// Rejects addresses that do not belong to the configured network.
///
/// An unconfigured guard rejects everything: a gateway that does not know
/// which network it serves cannot vouch for any address.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NetworkGuard {
    network: Option<Network>,
}

impl NetworkGuard {
    pub fn new(network: Option<Network>) -> Self {
        Self { network }
    }

    pub fn network(&self) -> Option<Network> {
        self.network
    }

    /// Parses `address` and checks its network tag. Unparseable input is
    /// rejected.
    pub fn validate(&self, address: &str) -> bool {
        match AddressCodec::parse(address) {
            Ok(parsed) => self.matches(&parsed),
            Err(e) => {
                error!(address:% = mask_address(address), error:% = e; "Network validation failed to parse address");
                false
            },
        }
    }

    pub fn matches(&self, address: &Address) -> bool {
        match self.network {
            Some(network) => address.belongs_to(network),
            None => {
                warn!("Network is not configured; rejecting address");
                false
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const MAINNET: &str = "bitcoincash:qpr270a5sxphltdmggtj07v4nskn9gmg9yx4m5h7s4";
    const TESTNET: &str = "bchtest:qq89kjkeqz9mngp8kl3dpmu43y2wztdjqu500gn4c4";

    #[test]
    fn test_accepts_matching_network() {
        assert!(NetworkGuard::new(Some(Network::Mainnet)).validate(MAINNET));
        assert!(NetworkGuard::new(Some(Network::Testnet)).validate(TESTNET));
        assert!(NetworkGuard::new(Some(Network::Testnet)).validate("mmxhXz7kS72BGVTAQJ4oYT7jBNYTSo2QZH"));
    }

    #[test]
    fn test_rejects_mismatched_network() {
        assert!(!NetworkGuard::new(Some(Network::Mainnet)).validate(TESTNET));
        assert!(!NetworkGuard::new(Some(Network::Testnet)).validate(MAINNET));
        assert!(!NetworkGuard::new(Some(Network::Regtest)).validate(TESTNET));
        assert!(!NetworkGuard::new(Some(Network::Mainnet)).validate("mmxhXz7kS72BGVTAQJ4oYT7jBNYTSo2QZH"));
    }

    #[test]
    fn test_regtest_accepts_legacy_testnet_version_bytes() {
        let guard = NetworkGuard::new(Some(Network::Regtest));
        assert!(guard.validate("mmxhXz7kS72BGVTAQJ4oYT7jBNYTSo2QZH"));
        assert!(guard.validate("2N7fdan9uide2UzvS5p7ZnjfagTUCZwZ85K"));
        assert!(!guard.validate("17SkEw2md5avVNyYgj6RiXuQKNwkXaxFyQ"));
    }

    #[test]
    fn test_unconfigured_guard_rejects_everything() {
        let guard = NetworkGuard::new(None);
        for address in [MAINNET, TESTNET, "17SkEw2md5avVNyYgj6RiXuQKNwkXaxFyQ"] {
            assert!(!guard.validate(address), "{address} should be rejected");
        }
    }

    #[test]
    fn test_rejects_unparseable_address() {
        assert!(!NetworkGuard::new(Some(Network::Mainnet)).validate("not-an-address"));
    }
}
