//! The downstream surface: one method per operation, single and bulk.
//!
//! Every address is parsed and checked against the configured network before
//! anything is sent upstream.

mod types;

pub use types::{Balance, HEADER_HEX_LEN, HeaderRange, HistoryEntry, MempoolEntry, Utxo, split_headers};

use std::{sync::Arc, time::Duration};

use log::debug;
use serde::de::DeserializeOwned;
use serde_json::{Value, json};

use crate::{
    address::{AddressCodec, LookupKey, Network, NetworkGuard},
    config::{BulkLimits, GatewayConfig, RequestTier},
    connection::{ConnectionManager, DEFAULT_HEALTH_CHECK_INTERVAL},
    dispatcher::{BulkEntry, IndexerMethod, QueryDispatcher, ensure_within_limit},
    error::GatewayError,
    log::mask_address,
    transport::IndexerTransport,
};
use types::HeadersResult;

pub struct Gateway {
    connection: Arc<ConnectionManager>,
    dispatcher: QueryDispatcher,
    guard: NetworkGuard,
    limits: BulkLimits,
}

impl Gateway {
    pub fn new(
        transport: Arc<dyn IndexerTransport>,
        network: Option<Network>,
        limits: BulkLimits,
        health_check_interval: Duration,
    ) -> Self {
        let connection = Arc::new(ConnectionManager::with_interval(transport, health_check_interval));
        Self {
            dispatcher: QueryDispatcher::new(connection.clone()),
            connection,
            guard: NetworkGuard::new(network),
            limits,
        }
    }

    pub fn from_config(transport: Arc<dyn IndexerTransport>, config: &GatewayConfig) -> Self {
        Self::new(
            transport,
            config.network,
            config.limits,
            config.indexer.health_check_interval(),
        )
    }

    /// A gateway with default limits and health-check interval.
    pub fn with_network(transport: Arc<dyn IndexerTransport>, network: Option<Network>) -> Self {
        Self::new(transport, network, BulkLimits::default(), DEFAULT_HEALTH_CHECK_INTERVAL)
    }

    pub async fn connect(&self) -> Result<(), GatewayError> {
        self.connection.connect().await
    }

    pub async fn disconnect(&self) {
        self.connection.disconnect().await
    }

    pub fn connection(&self) -> &Arc<ConnectionManager> {
        &self.connection
    }

    pub fn guard(&self) -> &NetworkGuard {
        &self.guard
    }

    pub fn bulk_limit(&self, tier: RequestTier) -> usize {
        self.limits.for_tier(tier)
    }

    /// Fails with [`GatewayError::ArraySize`] when `len` items exceed the
    /// tier's bound.
    pub fn ensure_bulk_size(&self, len: usize, tier: RequestTier) -> Result<(), GatewayError> {
        ensure_within_limit(len, self.bulk_limit(tier))
    }

    fn lookup_key(&self, address: &str) -> Result<LookupKey, GatewayError> {
        let parsed = AddressCodec::parse(address)?;
        if !self.guard.matches(&parsed) {
            return Err(GatewayError::NetworkMismatch { address: None });
        }
        debug!(address:% = mask_address(&parsed.to_cash_address()); "Resolved lookup key");
        Ok(LookupKey::from_script(&parsed.output_script()))
    }

    fn bulk_lookup_key(&self, address: &str) -> Result<LookupKey, GatewayError> {
        let parsed = AddressCodec::parse(address).map_err(|source| GatewayError::InvalidBulkItem {
            item: address.to_string(),
            source,
        })?;
        if !self.guard.matches(&parsed) {
            return Err(GatewayError::NetworkMismatch {
                address: Some(address.to_string()),
            });
        }
        Ok(LookupKey::from_script(&parsed.output_script()))
    }

    async fn by_key<T: DeserializeOwned>(&self, method: IndexerMethod, key: LookupKey) -> Result<T, GatewayError> {
        self.dispatcher.single_as(method, vec![Value::String(key.to_hex())]).await
    }

    async fn by_address<T: DeserializeOwned>(&self, method: IndexerMethod, address: &str) -> Result<T, GatewayError> {
        let key = self.lookup_key(address)?;
        self.by_key(method, key).await
    }

    async fn by_addresses<T: DeserializeOwned>(
        &self,
        method: IndexerMethod,
        addresses: Vec<String>,
        tier: RequestTier,
    ) -> Result<Vec<BulkEntry<String, T>>, GatewayError> {
        self.dispatcher
            .bulk(
                addresses,
                self.limits.for_tier(tier),
                |address| self.bulk_lookup_key(address),
                |key| self.by_key(method, key),
            )
            .await
    }

    pub async fn balance(&self, address: &str) -> Result<Balance, GatewayError> {
        self.by_address(IndexerMethod::GetBalance, address).await
    }

    pub async fn balances(
        &self,
        addresses: Vec<String>,
        tier: RequestTier,
    ) -> Result<Vec<BulkEntry<String, Balance>>, GatewayError> {
        self.by_addresses(IndexerMethod::GetBalance, addresses, tier).await
    }

    pub async fn utxos(&self, address: &str) -> Result<Vec<Utxo>, GatewayError> {
        self.by_address(IndexerMethod::ListUnspent, address).await
    }

    pub async fn utxos_bulk(
        &self,
        addresses: Vec<String>,
        tier: RequestTier,
    ) -> Result<Vec<BulkEntry<String, Vec<Utxo>>>, GatewayError> {
        self.by_addresses(IndexerMethod::ListUnspent, addresses, tier).await
    }

    pub async fn mempool(&self, address: &str) -> Result<Vec<MempoolEntry>, GatewayError> {
        self.by_address(IndexerMethod::GetMempool, address).await
    }

    pub async fn mempool_bulk(
        &self,
        addresses: Vec<String>,
        tier: RequestTier,
    ) -> Result<Vec<BulkEntry<String, Vec<MempoolEntry>>>, GatewayError> {
        self.by_addresses(IndexerMethod::GetMempool, addresses, tier).await
    }

    pub async fn transactions(&self, address: &str) -> Result<Vec<HistoryEntry>, GatewayError> {
        self.by_address(IndexerMethod::GetHistory, address).await
    }

    pub async fn transactions_bulk(
        &self,
        addresses: Vec<String>,
        tier: RequestTier,
    ) -> Result<Vec<BulkEntry<String, Vec<HistoryEntry>>>, GatewayError> {
        self.by_addresses(IndexerMethod::GetHistory, addresses, tier).await
    }

    /// Decoded transaction when `verbose`, raw hex otherwise.
    pub async fn transaction_details(&self, txid: &str, verbose: bool) -> Result<Value, GatewayError> {
        self.dispatcher
            .single(IndexerMethod::GetTransaction, vec![json!(txid), json!(verbose)])
            .await
    }

    pub async fn transaction_details_bulk(
        &self,
        txids: Vec<String>,
        verbose: bool,
        tier: RequestTier,
    ) -> Result<Vec<BulkEntry<String, Value>>, GatewayError> {
        self.dispatcher
            .bulk(
                txids,
                self.limits.for_tier(tier),
                |txid| Ok(txid.clone()),
                |txid| self.transaction_details_owned(txid, verbose),
            )
            .await
    }

    async fn transaction_details_owned(&self, txid: String, verbose: bool) -> Result<Value, GatewayError> {
        self.transaction_details(&txid, verbose).await
    }

    /// Returns the txid on acceptance. A rejection keeps the indexer's own
    /// message.
    pub async fn broadcast(&self, tx_hex: &str) -> Result<String, GatewayError> {
        let tx_hex = tx_hex.trim();
        if tx_hex.is_empty() {
            return Err(GatewayError::invalid_input("Transaction hex must not be empty."));
        }
        self.dispatcher
            .single_as(IndexerMethod::Broadcast, vec![Value::String(tx_hex.to_string())])
            .await
    }

    pub async fn block_headers(&self, height: u64, count: u64) -> Result<Vec<String>, GatewayError> {
        let result: HeadersResult = self
            .dispatcher
            .single_as(IndexerMethod::BlockHeaders, vec![json!(height), json!(count)])
            .await?;
        split_headers(&result.hex)
    }

    pub async fn block_headers_bulk(
        &self,
        ranges: Vec<HeaderRange>,
        tier: RequestTier,
    ) -> Result<Vec<BulkEntry<HeaderRange, Vec<String>>>, GatewayError> {
        self.dispatcher
            .bulk(
                ranges,
                self.limits.for_tier(tier),
                |range| Ok(*range),
                |range| self.block_headers(range.height, range.count),
            )
            .await
    }
}
