//! CashAddr encoding: a BCH polymod checksum over a human readable prefix and
//! a base32 payload of `version byte || hash`.

use super::{AddressError, AddressKind, Network};

const CHARSET: &[u8; 32] = b"qpzry9x8gf2tvdw0s3jn54khce6mua7l";
const CHECKSUM_LEN: usize = 8;
const HASH_LEN: usize = 20;

const GENERATORS: [u64; 5] = [
    0x98_f2bc_8e61,
    0x79_b76d_99e2,
    0xf3_3e5f_b3c4,
    0xae_2eab_e2a8,
    0x1e_4f43_e470,
];

/// Prefixes tried, in order, when the caller leaves the prefix off.
pub(super) const KNOWN_PREFIXES: [&str; 6] = ["bitcoincash", "bchtest", "bchreg", "ecash", "ectest", "ecregtest"];

pub(super) fn prefix_network(prefix: &str) -> Option<Network> {
    match prefix {
        "bitcoincash" | "ecash" => Some(Network::Mainnet),
        "bchtest" | "ectest" => Some(Network::Testnet),
        "bchreg" | "ecregtest" => Some(Network::Regtest),
        _ => None,
    }
}

pub(super) fn network_prefix(network: Network) -> &'static str {
    match network {
        Network::Mainnet => "bitcoincash",
        Network::Testnet => "bchtest",
        Network::Regtest => "bchreg",
    }
}

/// Payload of a successfully decoded cashaddr.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(super) struct Decoded {
    pub network: Network,
    pub kind: AddressKind,
    pub hash: [u8; HASH_LEN],
}

fn polymod(values: impl IntoIterator<Item = u8>) -> u64 {
    let mut c: u64 = 1;
    for d in values {
        let c0 = (c >> 35) as u8;
        c = ((c & 0x07_ffff_ffff) << 5) ^ u64::from(d);
        for (i, generator) in GENERATORS.iter().enumerate() {
            if (c0 >> i) & 1 == 1 {
                c ^= generator;
            }
        }
    }
    c ^ 1
}

fn expand_prefix(prefix: &str) -> impl Iterator<Item = u8> + '_ {
    prefix.bytes().map(|b| b & 0x1f).chain(std::iter::once(0))
}

fn convert_bits(data: &[u8], from: u32, to: u32, pad: bool) -> Option<Vec<u8>> {
    let mut acc: u32 = 0;
    let mut bits: u32 = 0;
    let max = (1u32 << to) - 1;
    let max_acc = (1u32 << (from + to - 1)) - 1;
    let mut out = Vec::with_capacity(data.len() * from as usize / to as usize + 1);
    for &value in data {
        let value = u32::from(value);
        if value >> from != 0 {
            return None;
        }
        acc = ((acc << from) | value) & max_acc;
        bits += from;
        while bits >= to {
            bits -= to;
            out.push(((acc >> bits) & max) as u8);
        }
    }
    if pad {
        if bits > 0 {
            out.push(((acc << (to - bits)) & max) as u8);
        }
    } else if bits >= from || ((acc << (to - bits)) & max) != 0 {
        return None;
    }
    Some(out)
}

/// Decodes `payload` under `prefix`. Both must already be lowercase.
fn decode_with_prefix(original: &str, prefix: &str, payload: &str) -> Result<Decoded, AddressError> {
    let unsupported = || AddressError::UnsupportedFormat(original.to_string());

    let network = prefix_network(prefix).ok_or_else(unsupported)?;

    let values = payload
        .bytes()
        .map(|b| CHARSET.iter().position(|&c| c == b).map(|p| p as u8))
        .collect::<Option<Vec<u8>>>()
        .ok_or_else(unsupported)?;

    if values.len() <= CHECKSUM_LEN {
        return Err(unsupported());
    }

    if polymod(expand_prefix(prefix).chain(values.iter().copied())) != 0 {
        return Err(AddressError::InvalidChecksum(original.to_string()));
    }

    let data = &values[..values.len() - CHECKSUM_LEN];
    let bytes = convert_bits(data, 5, 8, false).ok_or_else(unsupported)?;
    let (&version, hash) = bytes.split_first().ok_or_else(unsupported)?;

    // Only 160-bit hashes (size bits 0) are valid for the two script templates.
    if version & 0x07 != 0 || hash.len() != HASH_LEN {
        return Err(unsupported());
    }
    let kind = match (version >> 3) & 0x0f {
        0 => AddressKind::P2pkh,
        1 => AddressKind::P2sh,
        _ => return Err(unsupported()),
    };

    let mut out = [0u8; HASH_LEN];
    out.copy_from_slice(hash);
    Ok(Decoded {
        network,
        kind,
        hash: out,
    })
}

/// Decodes a cashaddr string, with or without its prefix.
///
/// Without a prefix every known prefix is tried; the checksum commits to the
/// prefix, so at most one of them can validate. When none does the text is
/// reported as an unsupported format rather than a checksum failure.
pub(super) fn decode(address: &str) -> Result<Decoded, AddressError> {
    let has_lower = address.bytes().any(|b| b.is_ascii_lowercase());
    let has_upper = address.bytes().any(|b| b.is_ascii_uppercase());
    if has_lower && has_upper {
        return Err(AddressError::UnsupportedFormat(address.to_string()));
    }
    let lowered = address.to_ascii_lowercase();

    if let Some((prefix, payload)) = lowered.split_once(':') {
        return decode_with_prefix(address, prefix, payload);
    }

    KNOWN_PREFIXES
        .iter()
        .find_map(|prefix| decode_with_prefix(address, prefix, &lowered).ok())
        .ok_or_else(|| AddressError::UnsupportedFormat(address.to_string()))
}

pub(super) fn encode(prefix: &str, kind: AddressKind, hash: &[u8; HASH_LEN]) -> String {
    let version: u8 = match kind {
        AddressKind::P2pkh => 0,
        AddressKind::P2sh => 1 << 3,
    };
    let mut payload = Vec::with_capacity(HASH_LEN + 1);
    payload.push(version);
    payload.extend_from_slice(hash);

    // 8 -> 5 bit conversion with padding cannot fail.
    let data = convert_bits(&payload, 8, 5, true).unwrap_or_default();

    let checksum = polymod(
        expand_prefix(prefix)
            .chain(data.iter().copied())
            .chain(std::iter::repeat_n(0, CHECKSUM_LEN)),
    );

    let mut out = String::with_capacity(prefix.len() + 1 + data.len() + CHECKSUM_LEN);
    out.push_str(prefix);
    out.push(':');
    for d in data {
        out.push(CHARSET[d as usize] as char);
    }
    for i in 0..CHECKSUM_LEN {
        let d = (checksum >> (5 * (CHECKSUM_LEN - 1 - i))) & 0x1f;
        out.push(CHARSET[d as usize] as char);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_p2pkh_mainnet() {
        let decoded = decode("bitcoincash:qpr270a5sxphltdmggtj07v4nskn9gmg9yx4m5h7s4").unwrap();
        assert_eq!(decoded.network, Network::Mainnet);
        assert_eq!(decoded.kind, AddressKind::P2pkh);
        assert_eq!(hex::encode(decoded.hash), "46af3fb481837fadbb421727f9959c2d32a36829");
    }

    #[test]
    fn test_decode_p2sh_and_testnet() {
        let p2sh = decode("bitcoincash:pz0z7u9p96h2p6hfychxdrmwgdlzpk5luc5yks2wxq").unwrap();
        assert_eq!(p2sh.kind, AddressKind::P2sh);

        let test = decode("bchtest:qq89kjkeqz9mngp8kl3dpmu43y2wztdjqu500gn4c4").unwrap();
        assert_eq!(test.network, Network::Testnet);
    }

    #[test]
    fn test_decode_without_prefix_and_uppercase() {
        let bare = decode("qpr270a5sxphltdmggtj07v4nskn9gmg9yx4m5h7s4").unwrap();
        assert_eq!(bare.network, Network::Mainnet);

        let upper = decode("BITCOINCASH:QPR270A5SXPHLTDMGGTJ07V4NSKN9GMG9YX4M5H7S4").unwrap();
        assert_eq!(upper, bare);
    }

    #[test]
    fn test_decode_rejects_bad_checksum() {
        let err = decode("bitcoincash:qr69kyzha07dcecrsvjwsj4s6slnlq4r8c30lxnur2").unwrap_err();
        assert!(matches!(err, AddressError::InvalidChecksum(_)));
    }

    #[test]
    fn test_decode_rejects_mixed_case_and_unknown_prefix() {
        assert!(matches!(
            decode("bitcoincash:QPR270a5sxphltdmggtj07v4nskn9gmg9yx4m5h7s4"),
            Err(AddressError::UnsupportedFormat(_))
        ));
        assert!(matches!(
            decode("dogecoin:qpr270a5sxphltdmggtj07v4nskn9gmg9yx4m5h7s4"),
            Err(AddressError::UnsupportedFormat(_))
        ));
    }

    #[test]
    fn test_encode_matches_known_addresses() {
        let decoded = decode("bitcoincash:qpr270a5sxphltdmggtj07v4nskn9gmg9yx4m5h7s4").unwrap();
        assert_eq!(
            encode("ecash", decoded.kind, &decoded.hash),
            "ecash:qpr270a5sxphltdmggtj07v4nskn9gmg9ylc0lvykz"
        );
        assert_eq!(
            encode("bitcoincash", decoded.kind, &decoded.hash),
            "bitcoincash:qpr270a5sxphltdmggtj07v4nskn9gmg9yx4m5h7s4"
        );
    }
}
