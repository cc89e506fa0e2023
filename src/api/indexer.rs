//! Indexer query endpoint handlers.
//!
//! | Method | Path | Description |
//! |--------|------|-------------|
//! | GET | `/utxos/{address}` | Unspent outputs of an address |
//! | POST | `/utxos` | Unspent outputs of many addresses |
//! | GET | `/tx/data/{txid}` | Transaction details |
//! | POST | `/tx/data` | Details of many transactions |
//! | POST | `/tx/broadcast` | Broadcast a raw transaction |
//! | GET | `/block/headers/{height}` | Headers starting at a height |
//! | POST | `/block/headers` | Headers for many height ranges |
//! | GET | `/balance/{address}` | Balance of an address |
//! | POST | `/balance` | Balances of many addresses |
//! | GET | `/transactions/{address}` | Transaction history of an address |
//! | POST | `/transactions` | Histories of many addresses |
//! | GET | `/unconfirmed/{address}` | Mempool transactions of an address |
//! | POST | `/unconfirmed` | Mempool transactions of many addresses |
//!
//! ```bash
//! curl -X POST http://localhost:3000/balance \
//!   -H "Content-Type: application/json" \
//!   -d '{"addresses":["bitcoincash:qpr270a5sxphltdmggtj07v4nskn9gmg9yx4m5h7s4"]}'
//! ```

use axum::{
    Json,
    extract::{
        Path, Query, State,
        rejection::{JsonRejection, QueryRejection},
    },
};
use log::debug;
use serde_json::Value;

use super::{
    AppState, Tier,
    types::{
        AddressesRequest, BalanceBulkResponse, BalanceResponse, BroadcastRequest, BroadcastResponse, CountQuery,
        DetailsBulkResponse, DetailsResponse, ErrorBody, HeadersBulkResponse, HeadersResponse, HeightsRequest,
        MempoolBulkResponse, MempoolResponse, StatusResponse, TransactionsBulkResponse, TransactionsResponse,
        TxidsRequest, UtxosBulkResponse, UtxosResponse, VerboseQuery,
    },
};
use crate::{error::GatewayError, gateway::HeaderRange, log::mask_address};

const ADDRESSES_NOT_ARRAY: &str = "addresses needs to be an array. Use GET for single address.";

fn json_body(body: Result<Json<Value>, JsonRejection>) -> Result<Value, GatewayError> {
    body.map(|Json(value)| value)
        .map_err(|rejection| GatewayError::invalid_input(rejection.body_text()))
}

/// Reads `field` as an array. Non-string items are kept as their JSON text so
/// they fail address validation with their own value in the message.
fn string_array(body: &Value, field: &str, message: &str) -> Result<Vec<String>, GatewayError> {
    let items = body
        .get(field)
        .and_then(Value::as_array)
        .ok_or_else(|| GatewayError::invalid_input(message))?;
    Ok(items
        .iter()
        .map(|item| match item {
            Value::String(s) => s.clone(),
            other => other.to_string(),
        })
        .collect())
}

fn parse_count(raw: &str, message: &str) -> Result<u64, GatewayError> {
    raw.trim().parse::<u64>().map_err(|_| GatewayError::invalid_input(message))
}

#[utoipa::path(
    get,
    path = "/",
    responses((status = 200, description = "Service is up", body = StatusResponse))
)]
pub async fn root() -> Json<StatusResponse> {
    Json(StatusResponse {
        status: "electrumx".to_string(),
    })
}

#[utoipa::path(
    get,
    path = "/utxos/{address}",
    responses(
        (status = 200, description = "Unspent outputs of the address", body = UtxosResponse),
        (status = 400, description = "Address is for another network", body = ErrorBody),
        (status = 422, description = "Address could not be parsed", body = ErrorBody),
        (status = 503, description = "Indexer unavailable", body = ErrorBody),
    ),
    params(("address" = String, Path, description = "Cashaddr or legacy address"))
)]
pub async fn get_utxos(
    State(state): State<AppState>,
    Path(address): Path<String>,
) -> Result<Json<UtxosResponse>, GatewayError> {
    debug!(address:% = mask_address(&address); "Fetching utxos");
    let utxos = state.gateway.utxos(&address).await?;
    Ok(Json(UtxosResponse { success: true, utxos }))
}

#[utoipa::path(
    post,
    path = "/utxos",
    request_body = AddressesRequest,
    responses(
        (status = 200, description = "Unspent outputs per address, in request order", body = UtxosBulkResponse),
        (status = 400, description = "Invalid request or array too large", body = ErrorBody),
    )
)]
pub async fn utxos_bulk(
    State(state): State<AppState>,
    Tier(tier): Tier,
    body: Result<Json<Value>, JsonRejection>,
) -> Result<Json<UtxosBulkResponse>, GatewayError> {
    let addresses = string_array(&json_body(body)?, "addresses", ADDRESSES_NOT_ARRAY)?;
    let entries = state.gateway.utxos_bulk(addresses, tier).await?;
    Ok(Json(UtxosBulkResponse {
        success: true,
        utxos: entries.into_iter().map(Into::into).collect(),
    }))
}

#[utoipa::path(
    get,
    path = "/tx/data/{txid}",
    responses(
        (status = 200, description = "Transaction details", body = DetailsResponse),
        (status = 400, description = "Rejected by the indexer", body = ErrorBody),
    ),
    params(
        ("txid" = String, Path, description = "Transaction id"),
        VerboseQuery,
    )
)]
pub async fn get_transaction_details(
    State(state): State<AppState>,
    Path(txid): Path<String>,
    query: Result<Query<VerboseQuery>, QueryRejection>,
) -> Result<Json<DetailsResponse>, GatewayError> {
    let Query(query) = query.map_err(|rejection| GatewayError::invalid_input(rejection.body_text()))?;
    let details = state
        .gateway
        .transaction_details(&txid, query.verbose.unwrap_or(true))
        .await?;
    Ok(Json(DetailsResponse { success: true, details }))
}

#[utoipa::path(
    post,
    path = "/tx/data",
    request_body = TxidsRequest,
    responses(
        (status = 200, description = "Details per txid, in request order", body = DetailsBulkResponse),
        (status = 400, description = "Invalid request or array too large", body = ErrorBody),
    )
)]
pub async fn transaction_details_bulk(
    State(state): State<AppState>,
    Tier(tier): Tier,
    body: Result<Json<Value>, JsonRejection>,
) -> Result<Json<DetailsBulkResponse>, GatewayError> {
    let body = json_body(body)?;
    let txids = string_array(&body, "txids", "txids needs to be an array. Use GET for single txid.")?;
    let verbose = body.get("verbose").and_then(Value::as_bool).unwrap_or(true);

    let entries = state.gateway.transaction_details_bulk(txids, verbose, tier).await?;
    Ok(Json(DetailsBulkResponse {
        success: true,
        transactions: entries.into_iter().map(Into::into).collect(),
    }))
}

#[utoipa::path(
    post,
    path = "/tx/broadcast",
    request_body = BroadcastRequest,
    responses(
        (status = 200, description = "Transaction accepted", body = BroadcastResponse),
        (status = 400, description = "Rejected by the indexer", body = ErrorBody),
    )
)]
pub async fn broadcast_transaction(
    State(state): State<AppState>,
    body: Result<Json<Value>, JsonRejection>,
) -> Result<Json<BroadcastResponse>, GatewayError> {
    let body = json_body(body)?;
    let tx_hex = body
        .get("txHex")
        .and_then(Value::as_str)
        .ok_or_else(|| GatewayError::invalid_input("request body must be a string."))?;

    let txid = state.gateway.broadcast(tx_hex).await?;
    Ok(Json(BroadcastResponse { success: true, txid }))
}

#[utoipa::path(
    get,
    path = "/block/headers/{height}",
    responses(
        (status = 200, description = "One hex string per header", body = HeadersResponse),
        (status = 400, description = "Invalid height or count", body = ErrorBody),
    ),
    params(
        ("height" = u64, Path, description = "First block height"),
        CountQuery,
    )
)]
pub async fn get_block_headers(
    State(state): State<AppState>,
    Path(height): Path<String>,
    Query(query): Query<CountQuery>,
) -> Result<Json<HeadersResponse>, GatewayError> {
    let height = parse_count(&height, "height must be a positive number")?;
    let count = match query.count.as_deref() {
        Some(raw) => parse_count(raw, "count must be a positive number")?,
        None => 1,
    };

    let headers = state.gateway.block_headers(height, count).await?;
    Ok(Json(HeadersResponse { success: true, headers }))
}

#[utoipa::path(
    post,
    path = "/block/headers",
    request_body = HeightsRequest,
    responses(
        (status = 200, description = "Headers per range, in request order", body = HeadersBulkResponse),
        (status = 400, description = "Invalid request or array too large", body = ErrorBody),
    )
)]
pub async fn block_headers_bulk(
    State(state): State<AppState>,
    Tier(tier): Tier,
    body: Result<Json<Value>, JsonRejection>,
) -> Result<Json<HeadersBulkResponse>, GatewayError> {
    let body = json_body(body)?;
    let heights = body
        .get("heights")
        .and_then(Value::as_array)
        .ok_or_else(|| GatewayError::invalid_input("heights needs to be an array. Use GET for single height."))?;
    state.gateway.ensure_bulk_size(heights.len(), tier)?;
    let ranges = heights
        .iter()
        .map(|item| {
            serde_json::from_value::<HeaderRange>(item.clone())
                .map_err(|e| GatewayError::invalid_input(format!("Invalid height range {item}: {e}")))
        })
        .collect::<Result<Vec<_>, _>>()?;

    let entries = state.gateway.block_headers_bulk(ranges, tier).await?;
    Ok(Json(HeadersBulkResponse {
        success: true,
        headers: entries.into_iter().map(Into::into).collect(),
    }))
}

#[utoipa::path(
    get,
    path = "/balance/{address}",
    responses(
        (status = 200, description = "Confirmed and unconfirmed balance", body = BalanceResponse),
        (status = 400, description = "Address is for another network", body = ErrorBody),
        (status = 422, description = "Address could not be parsed", body = ErrorBody),
        (status = 503, description = "Indexer unavailable", body = ErrorBody),
    ),
    params(("address" = String, Path, description = "Cashaddr or legacy address"))
)]
pub async fn get_balance(
    State(state): State<AppState>,
    Path(address): Path<String>,
) -> Result<Json<BalanceResponse>, GatewayError> {
    debug!(address:% = mask_address(&address); "Fetching balance");
    let balance = state.gateway.balance(&address).await?;
    Ok(Json(BalanceResponse { success: true, balance }))
}

#[utoipa::path(
    post,
    path = "/balance",
    request_body = AddressesRequest,
    responses(
        (status = 200, description = "Balance per address, in request order", body = BalanceBulkResponse),
        (status = 400, description = "Invalid request or array too large", body = ErrorBody),
    )
)]
pub async fn balance_bulk(
    State(state): State<AppState>,
    Tier(tier): Tier,
    body: Result<Json<Value>, JsonRejection>,
) -> Result<Json<BalanceBulkResponse>, GatewayError> {
    let addresses = string_array(&json_body(body)?, "addresses", ADDRESSES_NOT_ARRAY)?;
    let entries = state.gateway.balances(addresses, tier).await?;
    Ok(Json(BalanceBulkResponse {
        success: true,
        balances: entries.into_iter().map(Into::into).collect(),
    }))
}

#[utoipa::path(
    get,
    path = "/transactions/{address}",
    responses(
        (status = 200, description = "Confirmed and mempool history", body = TransactionsResponse),
        (status = 400, description = "Address is for another network", body = ErrorBody),
        (status = 422, description = "Address could not be parsed", body = ErrorBody),
    ),
    params(("address" = String, Path, description = "Cashaddr or legacy address"))
)]
pub async fn get_transactions(
    State(state): State<AppState>,
    Path(address): Path<String>,
) -> Result<Json<TransactionsResponse>, GatewayError> {
    let transactions = state.gateway.transactions(&address).await?;
    Ok(Json(TransactionsResponse {
        success: true,
        transactions,
    }))
}

#[utoipa::path(
    post,
    path = "/transactions",
    request_body = AddressesRequest,
    responses(
        (status = 200, description = "History per address, in request order", body = TransactionsBulkResponse),
        (status = 400, description = "Invalid request or array too large", body = ErrorBody),
    )
)]
pub async fn transactions_bulk(
    State(state): State<AppState>,
    Tier(tier): Tier,
    body: Result<Json<Value>, JsonRejection>,
) -> Result<Json<TransactionsBulkResponse>, GatewayError> {
    let addresses = string_array(&json_body(body)?, "addresses", ADDRESSES_NOT_ARRAY)?;
    let entries = state.gateway.transactions_bulk(addresses, tier).await?;
    Ok(Json(TransactionsBulkResponse {
        success: true,
        transactions: entries.into_iter().map(Into::into).collect(),
    }))
}

#[utoipa::path(
    get,
    path = "/unconfirmed/{address}",
    responses(
        (status = 200, description = "Mempool transactions of the address", body = MempoolResponse),
        (status = 400, description = "Address is for another network", body = ErrorBody),
        (status = 422, description = "Address could not be parsed", body = ErrorBody),
    ),
    params(("address" = String, Path, description = "Cashaddr or legacy address"))
)]
pub async fn get_mempool(
    State(state): State<AppState>,
    Path(address): Path<String>,
) -> Result<Json<MempoolResponse>, GatewayError> {
    let utxos = state.gateway.mempool(&address).await?;
    Ok(Json(MempoolResponse { success: true, utxos }))
}

#[utoipa::path(
    post,
    path = "/unconfirmed",
    request_body = AddressesRequest,
    responses(
        (status = 200, description = "Mempool transactions per address, in request order", body = MempoolBulkResponse),
        (status = 400, description = "Invalid request or array too large", body = ErrorBody),
    )
)]
pub async fn mempool_bulk(
    State(state): State<AppState>,
    Tier(tier): Tier,
    body: Result<Json<Value>, JsonRejection>,
) -> Result<Json<MempoolBulkResponse>, GatewayError> {
    let addresses = string_array(&json_body(body)?, "addresses", ADDRESSES_NOT_ARRAY)?;
    let entries = state.gateway.mempool_bulk(addresses, tier).await?;
    Ok(Json(MempoolBulkResponse {
        success: true,
        utxos: entries.into_iter().map(Into::into).collect(),
    }))
}
