//! Request and response bodies of the HTTP API.
//!
//! Bulk request bodies are read as raw JSON so that a missing or mistyped
//! field gets the same message whichever way it is wrong.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use utoipa::{IntoParams, ToSchema};

use crate::{
    dispatcher::BulkEntry,
    gateway::{Balance, HeaderRange, HistoryEntry, MempoolEntry, Utxo},
};

#[derive(Debug, Serialize, ToSchema)]
pub struct ErrorBody {
    pub success: bool,
    pub error: String,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct StatusResponse {
    pub status: String,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct AddressesRequest {
    /// Cashaddr (with or without prefix) or legacy addresses.
    pub addresses: Vec<String>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct TxidsRequest {
    pub txids: Vec<String>,
    pub verbose: Option<bool>,
}

#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct BroadcastRequest {
    /// Serialized transaction, hex encoded.
    pub tx_hex: String,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct HeightsRequest {
    pub heights: Vec<HeaderRange>,
}

#[derive(Debug, Deserialize, IntoParams)]
pub struct VerboseQuery {
    /// Decoded transaction when true (default), raw hex otherwise.
    pub verbose: Option<bool>,
}

#[derive(Debug, Deserialize, IntoParams)]
pub struct CountQuery {
    /// Number of headers to return, starting at `height`. Defaults to 1.
    pub count: Option<String>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct UtxosResponse {
    pub success: bool,
    pub utxos: Vec<Utxo>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct AddressUtxos {
    pub utxos: Vec<Utxo>,
    pub address: String,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct UtxosBulkResponse {
    pub success: bool,
    pub utxos: Vec<AddressUtxos>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct MempoolResponse {
    pub success: bool,
    pub utxos: Vec<MempoolEntry>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct AddressMempool {
    pub utxos: Vec<MempoolEntry>,
    pub address: String,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct MempoolBulkResponse {
    pub success: bool,
    pub utxos: Vec<AddressMempool>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct BalanceResponse {
    pub success: bool,
    pub balance: Balance,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct AddressBalance {
    pub balance: Balance,
    pub address: String,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct BalanceBulkResponse {
    pub success: bool,
    pub balances: Vec<AddressBalance>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct TransactionsResponse {
    pub success: bool,
    pub transactions: Vec<HistoryEntry>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct AddressTransactions {
    pub transactions: Vec<HistoryEntry>,
    pub address: String,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct TransactionsBulkResponse {
    pub success: bool,
    pub transactions: Vec<AddressTransactions>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct DetailsResponse {
    pub success: bool,
    #[schema(value_type = Object)]
    pub details: Value,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct TxidDetails {
    #[schema(value_type = Object)]
    pub details: Value,
    pub txid: String,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct DetailsBulkResponse {
    pub success: bool,
    pub transactions: Vec<TxidDetails>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct BroadcastResponse {
    pub success: bool,
    pub txid: String,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct HeadersResponse {
    pub success: bool,
    pub headers: Vec<String>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct RangeHeaders {
    pub height: u64,
    pub count: u64,
    pub headers: Vec<String>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct HeadersBulkResponse {
    pub success: bool,
    pub headers: Vec<RangeHeaders>,
}

impl From<BulkEntry<String, Vec<Utxo>>> for AddressUtxos {
    fn from(entry: BulkEntry<String, Vec<Utxo>>) -> Self {
        Self {
            utxos: entry.output,
            address: entry.input,
        }
    }
}

impl From<BulkEntry<String, Vec<MempoolEntry>>> for AddressMempool {
    fn from(entry: BulkEntry<String, Vec<MempoolEntry>>) -> Self {
        Self {
            utxos: entry.output,
            address: entry.input,
        }
    }
}

impl From<BulkEntry<String, Balance>> for AddressBalance {
    fn from(entry: BulkEntry<String, Balance>) -> Self {
        Self {
            balance: entry.output,
            address: entry.input,
        }
    }
}

impl From<BulkEntry<String, Vec<HistoryEntry>>> for AddressTransactions {
    fn from(entry: BulkEntry<String, Vec<HistoryEntry>>) -> Self {
        Self {
            transactions: entry.output,
            address: entry.input,
        }
    }
}

impl From<BulkEntry<String, Value>> for TxidDetails {
    fn from(entry: BulkEntry<String, Value>) -> Self {
        Self {
            details: entry.output,
            txid: entry.input,
        }
    }
}

impl From<BulkEntry<HeaderRange, Vec<String>>> for RangeHeaders {
    fn from(entry: BulkEntry<HeaderRange, Vec<String>>) -> Self {
        Self {
            height: entry.input.height,
            count: entry.input.count,
            headers: entry.output,
        }
    }
}
