use serde::{Deserialize, Serialize};
use serde_json::Value;
use utoipa::ToSchema;

use crate::error::{GatewayError, UpstreamError};

/// Hex characters per serialized block header (80 bytes).
pub const HEADER_HEX_LEN: usize = 80 * 2;

/// Address balance in satoshis. `unconfirmed` can be negative.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct Balance {
    pub confirmed: i64,
    pub unconfirmed: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct Utxo {
    /// Zero while the funding transaction is unconfirmed.
    pub height: u64,
    pub tx_hash: String,
    pub tx_pos: u32,
    pub value: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[schema(value_type = Option<Object>)]
    pub token_data: Option<Value>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct MempoolEntry {
    pub tx_hash: String,
    /// 0, or -1 when the transaction spends unconfirmed outputs.
    pub height: i64,
    pub fee: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct HistoryEntry {
    pub tx_hash: String,
    pub height: i64,
    /// Only present for mempool transactions.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fee: Option<u64>,
}

/// A run of `count` headers starting at `height`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct HeaderRange {
    pub height: u64,
    #[serde(default = "default_header_count")]
    pub count: u64,
}

fn default_header_count() -> u64 {
    1
}

#[derive(Debug, Deserialize)]
pub(crate) struct HeadersResult {
    pub hex: String,
}

/// Splits concatenated headers into one hex string per header.
pub fn split_headers(hex: &str) -> Result<Vec<String>, GatewayError> {
    if !hex.is_ascii() || !hex.bytes().all(|b| b.is_ascii_hexdigit()) {
        return Err(UpstreamError::Malformed("Block headers are not valid hex".to_string()).into());
    }
    Ok(hex
        .as_bytes()
        .chunks(HEADER_HEX_LEN)
        .map(|chunk| String::from_utf8_lossy(chunk).into_owned())
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_split_headers() {
        let first = "01".repeat(80);
        let second = "ab".repeat(80);
        let headers = split_headers(&format!("{first}{second}")).unwrap();
        assert_eq!(headers, vec![first, second]);

        assert!(split_headers("").unwrap().is_empty());
        assert!(split_headers("zz").is_err());
    }

    #[test]
    fn test_header_range_count_defaults_to_one() {
        let range: HeaderRange = serde_json::from_value(json!({ "height": 42 })).unwrap();
        assert_eq!(range, HeaderRange { height: 42, count: 1 });
    }

    #[test]
    fn test_utxo_keeps_token_data() {
        let utxo: Utxo = serde_json::from_value(json!({
            "height": 800000,
            "tx_hash": "a1075db55d416d3ca199f55b6084e2115b9345e16c5cf302fc80e9d5fbf5d48d",
            "tx_pos": 1,
            "value": 1000,
            "token_data": { "amount": "10" },
        }))
        .unwrap();
        assert_eq!(utxo.token_data, Some(json!({ "amount": "10" })));

        let plain = serde_json::to_value(Utxo { token_data: None, ..utxo }).unwrap();
        assert!(plain.get("token_data").is_none());
    }
}
