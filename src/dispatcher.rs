//! Single and bulk query execution against the indexer.

use std::{fmt, future::Future, sync::Arc};

use futures::future::try_join_all;
use log::debug;
use serde::{Serialize, de::DeserializeOwned};
use serde_json::Value;

use crate::{
    connection::ConnectionManager,
    error::{GatewayError, UpstreamError},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IndexerMethod {
    GetBalance,
    ListUnspent,
    GetMempool,
    GetHistory,
    GetTransaction,
    Broadcast,
    BlockHeaders,
}

impl IndexerMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            IndexerMethod::GetBalance => "blockchain.scripthash.get_balance",
            IndexerMethod::ListUnspent => "blockchain.scripthash.listunspent",
            IndexerMethod::GetMempool => "blockchain.scripthash.get_mempool",
            IndexerMethod::GetHistory => "blockchain.scripthash.get_history",
            IndexerMethod::GetTransaction => "blockchain.transaction.get",
            IndexerMethod::Broadcast => "blockchain.transaction.broadcast",
            IndexerMethod::BlockHeaders => "blockchain.block.headers",
        }
    }
}

impl fmt::Display for IndexerMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One item of a bulk request paired with its result.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BulkEntry<I, T> {
    pub input: I,
    pub output: T,
}

pub struct QueryDispatcher {
    connection: Arc<ConnectionManager>,
}

impl QueryDispatcher {
    pub fn new(connection: Arc<ConnectionManager>) -> Self {
        Self { connection }
    }

    /// Fails with [`GatewayError::NotReady`] without touching the transport
    /// when the session is not up.
    pub async fn single(&self, method: IndexerMethod, params: Vec<Value>) -> Result<Value, GatewayError> {
        self.connection.ensure_ready()?;
        debug!(method = method.as_str(); "Dispatching query");
        Ok(self.connection.transport().request(method.as_str(), params).await?)
    }

    pub async fn single_as<T: DeserializeOwned>(
        &self,
        method: IndexerMethod,
        params: Vec<Value>,
    ) -> Result<T, GatewayError> {
        let value = self.single(method, params).await?;
        serde_json::from_value(value).map_err(|e| {
            UpstreamError::Malformed(format!("Unexpected response to {}: {}", method.as_str(), e)).into()
        })
    }

    /// Runs `call` once per item, concurrently, after checking the size bound
    /// and preparing every item. Results keep input order; the first failure
    /// fails the whole batch.
    pub async fn bulk<I, P, T, Prep, Call, Fut>(
        &self,
        items: Vec<I>,
        max_size: usize,
        prepare: Prep,
        call: Call,
    ) -> Result<Vec<BulkEntry<I, T>>, GatewayError>
    where
        Prep: Fn(&I) -> Result<P, GatewayError>,
        Call: Fn(P) -> Fut,
        Fut: Future<Output = Result<T, GatewayError>>,
    {
        ensure_within_limit(items.len(), max_size)?;

        let prepared = items.iter().map(prepare).collect::<Result<Vec<_>, _>>()?;
        self.connection.ensure_ready()?;

        debug!(items = items.len(); "Dispatching bulk query");
        let outputs = try_join_all(prepared.into_iter().map(call)).await?;

        Ok(items
            .into_iter()
            .zip(outputs)
            .map(|(input, output)| BulkEntry { input, output })
            .collect())
    }
}

/// Size bound shared by every bulk request. Callers that decode items
/// themselves run it before decoding.
pub fn ensure_within_limit(len: usize, max_size: usize) -> Result<(), GatewayError> {
    if len > max_size {
        return Err(GatewayError::ArraySize { len, max: max_size });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::mock::MockTransport;
    use serde_json::json;

    async fn connected(transport: &Arc<MockTransport>) -> QueryDispatcher {
        let connection = Arc::new(ConnectionManager::new(transport.clone()));
        connection.connect().await.unwrap();
        QueryDispatcher::new(connection)
    }

    fn echo() -> Arc<MockTransport> {
        MockTransport::new(|method, params| match method {
            "blockchain.scripthash.get_balance" => match params[0].as_str() {
                Some("boom") => Err(UpstreamError::Rpc {
                    code: 1,
                    message: "bad scripthash".to_string(),
                }),
                Some(key) => Ok(json!({ "confirmed": key.len(), "unconfirmed": 0 })),
                None => Ok(Value::Null),
            },
            _ => Ok(json!(params)),
        })
    }

    fn parse_item(item: &String) -> Result<String, GatewayError> {
        if item.starts_with("bad") {
            Err(GatewayError::invalid_input(format!("invalid item {item}")))
        } else {
            Ok(item.clone())
        }
    }

    #[tokio::test]
    async fn test_single_requires_connection() {
        let transport = echo();
        let dispatcher = QueryDispatcher::new(Arc::new(ConnectionManager::new(transport.clone())));

        let err = dispatcher.single(IndexerMethod::GetHistory, vec![]).await.unwrap_err();
        assert!(matches!(err, GatewayError::NotReady));
        assert_eq!(transport.request_count(), 0);
    }

    #[tokio::test]
    async fn test_single_as_rejects_unexpected_shape() {
        let transport = echo();
        let dispatcher = connected(&transport).await;

        let err = dispatcher
            .single_as::<u64>(IndexerMethod::GetHistory, vec![json!("abc")])
            .await
            .unwrap_err();
        assert!(matches!(err, GatewayError::Upstream(UpstreamError::Malformed(_))));
    }

    #[tokio::test]
    async fn test_bulk_over_limit_makes_no_calls() {
        let transport = echo();
        let dispatcher = connected(&transport).await;
        let items: Vec<String> = (0..25).map(|i| format!("key{i}")).collect();

        let err = dispatcher
            .bulk(items, 20, parse_item, |key| {
                dispatcher.single(IndexerMethod::GetBalance, vec![Value::String(key)])
            })
            .await
            .unwrap_err();

        assert!(matches!(err, GatewayError::ArraySize { len: 25, max: 20 }));
        assert_eq!(transport.request_count(), 0);
    }

    #[tokio::test]
    async fn test_bulk_invalid_item_aborts_before_calls() {
        let transport = echo();
        let dispatcher = connected(&transport).await;
        let items = vec!["aa".to_string(), "bad-one".to_string(), "cc".to_string()];

        let err = dispatcher
            .bulk(items, 20, parse_item, |key| {
                dispatcher.single(IndexerMethod::GetBalance, vec![Value::String(key)])
            })
            .await
            .unwrap_err();

        assert_eq!(err.to_string(), "invalid item bad-one");
        assert_eq!(transport.request_count(), 0);
    }

    #[tokio::test]
    async fn test_bulk_keeps_input_order() {
        let transport = echo();
        let dispatcher = connected(&transport).await;
        let items = vec!["a".to_string(), "abc".to_string(), "ab".to_string(), "a".to_string()];

        let entries = dispatcher
            .bulk(items.clone(), 20, parse_item, |key| {
                dispatcher.single(IndexerMethod::GetBalance, vec![Value::String(key)])
            })
            .await
            .unwrap();

        assert_eq!(entries.len(), 4);
        for (entry, item) in entries.iter().zip(&items) {
            assert_eq!(&entry.input, item);
            assert_eq!(entry.output["confirmed"], item.len());
        }
        assert_eq!(transport.request_count(), 4);
    }

    #[tokio::test]
    async fn test_bulk_fails_fast() {
        let transport = echo();
        let dispatcher = connected(&transport).await;
        let items = vec!["a".to_string(), "boom".to_string()];

        let err = dispatcher
            .bulk(items, 20, parse_item, |key| {
                dispatcher.single(IndexerMethod::GetBalance, vec![Value::String(key)])
            })
            .await
            .unwrap_err();

        assert_eq!(err.to_string(), "bad scripthash");
    }

    #[tokio::test]
    async fn test_bulk_not_ready_after_validation() {
        let transport = echo();
        let dispatcher = QueryDispatcher::new(Arc::new(ConnectionManager::new(transport.clone())));

        let err = dispatcher
            .bulk(vec!["bad".to_string()], 20, parse_item, |key| {
                dispatcher.single(IndexerMethod::GetBalance, vec![Value::String(key)])
            })
            .await
            .unwrap_err();
        assert!(matches!(err, GatewayError::InvalidInput(_)));

        let err = dispatcher
            .bulk(vec!["ok".to_string()], 20, parse_item, |key| {
                dispatcher.single(IndexerMethod::GetBalance, vec![Value::String(key)])
            })
            .await
            .unwrap_err();
        assert!(matches!(err, GatewayError::NotReady));
        assert_eq!(transport.request_count(), 0);
    }
}
