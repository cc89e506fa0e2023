//! Legacy base58check addresses: `version byte || hash160 || checksum`.

use super::{AddressError, AddressKind, Network};

const HASH_LEN: usize = 20;

#[derive(Debug, Clone, PartialEq, Eq)]
pub(super) struct Decoded {
    pub network: Network,
    pub kind: AddressKind,
    pub hash: [u8; HASH_LEN],
}

/// Testnet and regtest share version bytes; legacy text cannot tell them
/// apart, so both decode as testnet and `Address::belongs_to` lets regtest accept them.
fn classify_version(version: u8) -> Option<(Network, AddressKind)> {
    match version {
        0x00 => Some((Network::Mainnet, AddressKind::P2pkh)),
        0x05 => Some((Network::Mainnet, AddressKind::P2sh)),
        0x6f => Some((Network::Testnet, AddressKind::P2pkh)),
        0xc4 => Some((Network::Testnet, AddressKind::P2sh)),
        _ => None,
    }
}

pub(super) fn decode(address: &str) -> Result<Decoded, AddressError> {
    let bytes = bs58::decode(address).with_check(None).into_vec().map_err(|e| match e {
        bs58::decode::Error::InvalidChecksum { .. } => AddressError::InvalidChecksum(address.to_string()),
        _ => AddressError::UnsupportedFormat(address.to_string()),
    })?;

    let (&version, hash) = bytes
        .split_first()
        .ok_or_else(|| AddressError::UnsupportedFormat(address.to_string()))?;
    if hash.len() != HASH_LEN {
        return Err(AddressError::UnsupportedFormat(address.to_string()));
    }
    let (network, kind) =
        classify_version(version).ok_or_else(|| AddressError::UnsupportedFormat(address.to_string()))?;

    let mut out = [0u8; HASH_LEN];
    out.copy_from_slice(hash);
    Ok(Decoded {
        network,
        kind,
        hash: out,
    })
}
