use std::fmt;

use serde::{Serialize, Serializer};
use sha2::{Digest, Sha256};

use super::{AddressError, AddressKind, Network, cashaddr, legacy};

const OP_DUP: u8 = 0x76;
const OP_HASH160: u8 = 0xa9;
const OP_EQUALVERIFY: u8 = 0x88;
const OP_CHECKSIG: u8 = 0xac;
const OP_EQUAL: u8 = 0x87;
const PUSH_20: u8 = 0x14;

/// A parsed address, independent of the text encoding it arrived in.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Address {
    network: Network,
    kind: AddressKind,
    hash: [u8; 20],
    legacy: bool,
}

impl Address {
    pub fn network(&self) -> Network {
        self.network
    }

    pub fn kind(&self) -> AddressKind {
        self.kind
    }

    /// True when parsed from base58check text.
    pub fn is_legacy(&self) -> bool {
        self.legacy
    }

    /// Whether this address can be used on `network`. Legacy testnet and
    /// regtest share version bytes, so a legacy address tagged testnet is
    /// also accepted on regtest.
    pub fn belongs_to(&self, network: Network) -> bool {
        self.network == network || (self.legacy && self.network == Network::Testnet && network == Network::Regtest)
    }

    pub fn hash160(&self) -> &[u8; 20] {
        &self.hash
    }

    /// The locking script this address pays to.
    pub fn output_script(&self) -> Vec<u8> {
        match self.kind {
            AddressKind::P2pkh => {
                let mut script = Vec::with_capacity(25);
                script.extend_from_slice(&[OP_DUP, OP_HASH160, PUSH_20]);
                script.extend_from_slice(&self.hash);
                script.extend_from_slice(&[OP_EQUALVERIFY, OP_CHECKSIG]);
                script
            },
            AddressKind::P2sh => {
                let mut script = Vec::with_capacity(23);
                script.extend_from_slice(&[OP_HASH160, PUSH_20]);
                script.extend_from_slice(&self.hash);
                script.push(OP_EQUAL);
                script
            },
        }
    }

    /// Canonical prefixed cashaddr form, e.g. `bitcoincash:q...`.
    pub fn to_cash_address(&self) -> String {
        cashaddr::encode(cashaddr::network_prefix(self.network), self.kind, &self.hash)
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_cash_address())
    }
}

/// The indexer's per-script identifier: SHA-256 of the output script with the
/// byte order reversed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct LookupKey([u8; 32]);

impl LookupKey {
    pub fn from_script(script: &[u8]) -> Self {
        let mut digest: [u8; 32] = Sha256::digest(script).into();
        digest.reverse();
        Self(digest)
    }

    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }
}

impl fmt::Display for LookupKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl Serialize for LookupKey {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&self.to_hex())
    }
}

/// Stateless conversion from address text to [`Address`] and [`LookupKey`].
#[derive(Debug, Clone, Copy, Default)]
pub struct AddressCodec;

impl AddressCodec {
    /// Parses any supported encoding: legacy base58check, prefixed cashaddr
    /// (`bitcoincash:`, `bchtest:`, `bchreg:`, `ecash:`, `ectest:`,
    /// `ecregtest:`) or cashaddr with the prefix left off.
    pub fn parse(address: &str) -> Result<Address, AddressError> {
        let address = address.trim();
        if address.is_empty() {
            return Err(AddressError::UnsupportedFormat(String::new()));
        }

        // Cashaddr text is single-case and never a valid base58check string of
        // the right length, so try legacy first and fall back on format errors.
        match legacy::decode(address) {
            Ok(d) => {
                return Ok(Address {
                    network: d.network,
                    kind: d.kind,
                    hash: d.hash,
                    legacy: true,
                });
            },
            Err(AddressError::InvalidChecksum(_)) if !address.contains(':') && looks_like_legacy(address) => {
                return Err(AddressError::InvalidChecksum(address.to_string()));
            },
            Err(_) => {},
        }

        let d = cashaddr::decode(address)?;
        Ok(Address {
            network: d.network,
            kind: d.kind,
            hash: d.hash,
            legacy: false,
        })
    }

    /// Derives the indexer lookup key for `address`.
    pub fn derive_lookup_key(address: &str) -> Result<LookupKey, AddressError> {
        Self::parse(address).map(|a| LookupKey::from_script(&a.output_script()))
    }
}

/// Legacy addresses start with `1`, `3`, `m`, `n` or `2` and are 26 to 35
/// characters long.
fn looks_like_legacy(address: &str) -> bool {
    (26..=35).contains(&address.len()) && matches!(address.as_bytes()[0], b'1' | b'3' | b'm' | b'n' | b'2')
}
