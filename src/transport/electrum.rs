//! Electrum protocol client over plain TCP.
//!
//! Requests are newline-delimited JSON-RPC 2.0 objects. A background reader
//! task routes each response to its waiting caller by id, so any number of
//! requests can be in flight on one session.

use std::{
    collections::HashMap,
    io,
    sync::{
        Arc, PoisonError, RwLock,
        atomic::{AtomicBool, AtomicU64, Ordering},
    },
};

use async_trait::async_trait;
use log::{debug, info, warn};
use serde_json::{Value, json};
use tokio::{
    io::{AsyncBufReadExt, AsyncWriteExt, BufReader},
    net::{
        TcpStream,
        tcp::{OwnedReadHalf, OwnedWriteHalf},
    },
    sync::{Mutex, oneshot},
    task::JoinHandle,
};

use super::{IndexerTransport, TransportStatus};
use crate::{config::IndexerConfig, error::UpstreamError};

const HANDSHAKE_METHOD: &str = "server.version";

type Reply = Result<Value, UpstreamError>;
type PendingMap = Arc<Mutex<HashMap<u64, oneshot::Sender<Reply>>>>;

#[derive(Debug, Clone)]
pub struct ElectrumTransportConfig {
    pub host: String,
    pub port: u16,
    pub client_name: String,
    pub protocol_version: String,
}

impl From<&IndexerConfig> for ElectrumTransportConfig {
    fn from(config: &IndexerConfig) -> Self {
        Self {
            host: config.host.clone(),
            port: config.port,
            client_name: config.client_name.clone(),
            protocol_version: config.protocol_version.clone(),
        }
    }
}

pub struct ElectrumTransport {
    config: ElectrumTransportConfig,
    next_id: AtomicU64,
    session: RwLock<Option<Arc<Session>>>,
}

struct Session {
    writer: Mutex<OwnedWriteHalf>,
    pending: PendingMap,
    alive: Arc<AtomicBool>,
    reader: JoinHandle<()>,
}

impl Session {
    fn is_alive(&self) -> bool {
        self.alive.load(Ordering::Acquire)
    }

    async fn close(&self) {
        self.alive.store(false, Ordering::Release);
        self.reader.abort();
        let _ = self.writer.lock().await.shutdown().await;
        fail_pending(&self.pending, "connection closed").await;
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        self.reader.abort();
    }
}

impl ElectrumTransport {
    pub fn new(config: ElectrumTransportConfig) -> Self {
        Self {
            config,
            next_id: AtomicU64::new(0),
            session: RwLock::new(None),
        }
    }

    pub fn endpoint(&self) -> String {
        format!("{}:{}", self.config.host, self.config.port)
    }

    fn current_session(&self) -> Option<Arc<Session>> {
        self.session.read().unwrap_or_else(PoisonError::into_inner).clone()
    }

    fn replace_session(&self, session: Option<Arc<Session>>) -> Option<Arc<Session>> {
        let mut guard = self.session.write().unwrap_or_else(PoisonError::into_inner);
        std::mem::replace(&mut *guard, session)
    }

    async fn call(&self, session: &Session, method: &str, params: Vec<Value>) -> Reply {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let (tx, rx) = oneshot::channel();
        session.pending.lock().await.insert(id, tx);

        let mut line = json!({
            "jsonrpc": "2.0",
            "id": id,
            "method": method,
            "params": params,
        })
        .to_string();
        line.push('\n');

        let written = {
            let mut writer = session.writer.lock().await;
            match writer.write_all(line.as_bytes()).await {
                Ok(()) => writer.flush().await,
                Err(e) => Err(e),
            }
        };
        if let Err(e) = written {
            session.pending.lock().await.remove(&id);
            session.alive.store(false, Ordering::Release);
            return Err(UpstreamError::Io(e));
        }

        rx.await.unwrap_or_else(|_| {
            Err(UpstreamError::Io(io::Error::new(
                io::ErrorKind::ConnectionAborted,
                "connection closed before the indexer replied",
            )))
        })
    }
}

#[async_trait]
impl IndexerTransport for ElectrumTransport {
    async fn connect(&self) -> Result<(), UpstreamError> {
        if let Some(previous) = self.replace_session(None) {
            previous.close().await;
        }

        let stream = TcpStream::connect((self.config.host.as_str(), self.config.port)).await?;
        let _ = stream.set_nodelay(true);
        let (read_half, write_half) = stream.into_split();

        let pending: PendingMap = Arc::new(Mutex::new(HashMap::new()));
        let alive = Arc::new(AtomicBool::new(true));
        let reader = tokio::spawn(read_responses(read_half, pending.clone(), alive.clone()));
        let session = Arc::new(Session {
            writer: Mutex::new(write_half),
            pending,
            alive,
            reader,
        });

        let handshake = self
            .call(
                &session,
                HANDSHAKE_METHOD,
                vec![
                    Value::String(self.config.client_name.clone()),
                    Value::String(self.config.protocol_version.clone()),
                ],
            )
            .await;

        match handshake {
            Ok(version) => {
                info!(
                    endpoint = &*self.endpoint(),
                    server_version:% = version;
                    "Connected to indexer"
                );
                self.replace_session(Some(session));
                Ok(())
            },
            Err(e) => {
                session.close().await;
                Err(e)
            },
        }
    }

    async fn disconnect(&self) {
        if let Some(session) = self.replace_session(None) {
            session.close().await;
            info!(endpoint = &*self.endpoint(); "Disconnected from indexer");
        }
    }

    fn status(&self) -> TransportStatus {
        match self.current_session() {
            Some(session) if session.is_alive() => TransportStatus::Connected,
            _ => TransportStatus::Disconnected,
        }
    }

    async fn request(&self, method: &str, params: Vec<Value>) -> Result<Value, UpstreamError> {
        let session = self
            .current_session()
            .filter(|s| s.is_alive())
            .ok_or_else(|| UpstreamError::Io(io::Error::new(io::ErrorKind::NotConnected, "not connected to indexer")))?;

        debug!(method = method; "Indexer request");
        self.call(&session, method, params).await
    }
}

async fn read_responses(read_half: OwnedReadHalf, pending: PendingMap, alive: Arc<AtomicBool>) {
    let mut lines = BufReader::new(read_half).lines();
    let reason = loop {
        match lines.next_line().await {
            Ok(Some(line)) => {
                let line = line.trim();
                if line.is_empty() {
                    continue;
                }
                match serde_json::from_str::<Value>(line) {
                    Ok(message) => dispatch(message, &pending).await,
                    // No id to route on. Replies arrive in request order, so
                    // the text answers the oldest outstanding request.
                    Err(_) => fail_oldest(&pending, relayed_error(line)).await,
                }
            },
            Ok(None) => break "connection closed by indexer".to_string(),
            Err(e) => break e.to_string(),
        }
    };

    alive.store(false, Ordering::Release);
    warn!(reason = &*reason; "Indexer session ended");
    fail_pending(&pending, &reason).await;
}

async fn dispatch(message: Value, pending: &PendingMap) {
    let Some(id) = message.get("id").and_then(Value::as_u64) else {
        debug!(message:% = message; "Ignoring indexer message without id");
        return;
    };
    let Some(tx) = pending.lock().await.remove(&id) else {
        debug!(id = id; "Reply for unknown request id");
        return;
    };

    let reply = match message.get("error") {
        Some(error) if !error.is_null() => Err(rpc_error(error)),
        _ => Ok(message.get("result").cloned().unwrap_or(Value::Null)),
    };
    let _ = tx.send(reply);
}

fn rpc_error(error: &Value) -> UpstreamError {
    match error {
        Value::Object(fields) => match fields.get("message").and_then(Value::as_str) {
            Some(message) if !message.is_empty() => UpstreamError::Rpc {
                code: fields.get("code").and_then(Value::as_i64).unwrap_or_default(),
                message: message.to_string(),
            },
            _ => UpstreamError::Unrecognized(error.clone()),
        },
        Value::String(message) => UpstreamError::Relayed(message.clone()),
        other => UpstreamError::Unrecognized(other.clone()),
    }
}

/// Text that is not JSON: an HTTP status line from a proxy, or a plain
/// message such as a rate-limit notice.
fn relayed_error(line: &str) -> UpstreamError {
    if let Some(rest) = line.strip_prefix("HTTP/") {
        let status = rest.split_whitespace().nth(1).and_then(|s| s.parse::<u16>().ok());
        if let Some(status) = status {
            return UpstreamError::Response {
                status,
                body: line.to_string(),
            };
        }
    }
    UpstreamError::Relayed(line.to_string())
}

async fn fail_oldest(pending: &PendingMap, error: UpstreamError) {
    let mut pending = pending.lock().await;
    let Some(id) = pending.keys().min().copied() else {
        debug!(error:% = error; "Unsolicited non-JSON line from indexer");
        return;
    };
    if let Some(tx) = pending.remove(&id) {
        let _ = tx.send(Err(error));
    }
}

async fn fail_pending(pending: &PendingMap, reason: &str) {
    fail_pending_with(pending, || {
        UpstreamError::Io(io::Error::new(io::ErrorKind::ConnectionAborted, reason.to_string()))
    })
    .await;
}

async fn fail_pending_with(pending: &PendingMap, error: impl Fn() -> UpstreamError) {
    for (_, tx) in pending.lock().await.drain() {
        let _ = tx.send(Err(error()));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::net::TcpListener;

    /// Serves one connection; `reply` maps each request to the raw line
    /// written back (or nothing).
    async fn spawn_indexer<F>(reply: F) -> u16
    where
        F: Fn(&Value) -> Option<String> + Send + 'static,
    {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        tokio::spawn(async move {
            let (stream, _) = listener.accept().await.unwrap();
            let (read_half, mut write_half) = stream.into_split();
            let mut lines = BufReader::new(read_half).lines();
            while let Ok(Some(line)) = lines.next_line().await {
                let request: Value = serde_json::from_str(&line).unwrap();
                match reply(&request) {
                    Some(response) => {
                        write_half.write_all(response.as_bytes()).await.unwrap();
                        write_half.write_all(b"\n").await.unwrap();
                    },
                    None => break,
                }
            }
        });
        port
    }

    fn result(request: &Value, result: Value) -> Option<String> {
        Some(json!({ "jsonrpc": "2.0", "id": request["id"], "result": result }).to_string())
    }

    fn transport(port: u16) -> ElectrumTransport {
        ElectrumTransport::new(ElectrumTransportConfig {
            host: "127.0.0.1".to_string(),
            port,
            client_name: "gateway-test".to_string(),
            protocol_version: "1.4.1".to_string(),
        })
    }

    #[tokio::test]
    async fn test_handshake_then_request() {
        let port = spawn_indexer(|request| match request["method"].as_str() {
            Some("server.version") => {
                assert_eq!(request["params"], json!(["gateway-test", "1.4.1"]));
                result(request, json!(["Fulcrum 1.9.8", "1.4"]))
            },
            Some("blockchain.scripthash.get_balance") => {
                result(request, json!({ "confirmed": 1000, "unconfirmed": -5 }))
            },
            _ => None,
        })
        .await;

        let transport = transport(port);
        assert_eq!(transport.status(), TransportStatus::Disconnected);
        transport.connect().await.unwrap();
        assert_eq!(transport.status(), TransportStatus::Connected);

        let balance = transport
            .request("blockchain.scripthash.get_balance", vec![json!("abcd")])
            .await
            .unwrap();
        assert_eq!(balance["confirmed"], 1000);
        assert_eq!(balance["unconfirmed"], -5);

        transport.disconnect().await;
        assert_eq!(transport.status(), TransportStatus::Disconnected);
    }

    #[tokio::test]
    async fn test_rpc_error_object() {
        let port = spawn_indexer(|request| match request["method"].as_str() {
            Some("server.version") => result(request, json!(["Fulcrum 1.9.8", "1.4"])),
            _ => Some(
                json!({
                    "jsonrpc": "2.0",
                    "id": request["id"],
                    "error": { "code": 1, "message": "Invalid tx hash" },
                })
                .to_string(),
            ),
        })
        .await;

        let transport = transport(port);
        transport.connect().await.unwrap();
        let err = transport
            .request("blockchain.transaction.get", vec![json!("00"), json!(true)])
            .await
            .unwrap_err();
        match err {
            UpstreamError::Rpc { code, message } => {
                assert_eq!(code, 1);
                assert_eq!(message, "Invalid tx hash");
            },
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_plain_text_reply_is_relayed() {
        let port = spawn_indexer(|request| match request["method"].as_str() {
            Some("server.version") => result(request, json!(["Fulcrum 1.9.8", "1.4"])),
            _ => Some("Too many requests".to_string()),
        })
        .await;

        let transport = transport(port);
        transport.connect().await.unwrap();
        let err = transport
            .request("blockchain.scripthash.listunspent", vec![json!("abcd")])
            .await
            .unwrap_err();
        assert!(matches!(err, UpstreamError::Relayed(ref m) if m == "Too many requests"));
    }

    #[tokio::test]
    async fn test_plain_text_fails_only_the_oldest_request() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        tokio::spawn(async move {
            let (stream, _) = listener.accept().await.unwrap();
            let (read_half, mut write_half) = stream.into_split();
            let mut lines = BufReader::new(read_half).lines();
            let mut held = None;
            while let Ok(Some(line)) = lines.next_line().await {
                let request: Value = serde_json::from_str(&line).unwrap();
                let out = match request["method"].as_str() {
                    Some("server.version") => result(&request, json!(["Fulcrum 1.9.8", "1.4"])).unwrap(),
                    Some("blockchain.scripthash.listunspent") => {
                        held = Some(request);
                        continue;
                    },
                    _ => {
                        assert!(held.is_some());
                        format!(
                            "Too many requests\n{}",
                            result(&request, json!({ "confirmed": 7, "unconfirmed": 0 })).unwrap()
                        )
                    },
                };
                write_half.write_all(out.as_bytes()).await.unwrap();
                write_half.write_all(b"\n").await.unwrap();
            }
        });

        let transport = Arc::new(transport(port));
        transport.connect().await.unwrap();

        let first = transport.clone();
        let utxos =
            tokio::spawn(async move { first.request("blockchain.scripthash.listunspent", vec![json!("aa")]).await });
        tokio::time::sleep(std::time::Duration::from_millis(50)).await;

        let balance = transport
            .request("blockchain.scripthash.get_balance", vec![json!("bb")])
            .await
            .unwrap();
        assert_eq!(balance["confirmed"], 7);

        let err = utxos.await.unwrap().unwrap_err();
        assert!(matches!(err, UpstreamError::Relayed(ref m) if m == "Too many requests"));
    }

    #[tokio::test]
    async fn test_http_status_line_becomes_response() {
        let port = spawn_indexer(|_| Some("HTTP/1.1 503 Service Unavailable".to_string())).await;

        let transport = transport(port);
        let err = transport.connect().await.unwrap_err();
        assert!(matches!(err, UpstreamError::Response { status: 503, .. }));
        assert_eq!(transport.status(), TransportStatus::Disconnected);
    }

    #[tokio::test]
    async fn test_closed_connection_fails_pending_request() {
        let port = spawn_indexer(|request| match request["method"].as_str() {
            Some("server.version") => result(request, json!(["Fulcrum 1.9.8", "1.4"])),
            _ => None,
        })
        .await;

        let transport = transport(port);
        transport.connect().await.unwrap();
        let err = transport
            .request("blockchain.scripthash.get_history", vec![json!("abcd")])
            .await
            .unwrap_err();
        assert!(matches!(err, UpstreamError::Io(ref e) if e.kind() == io::ErrorKind::ConnectionAborted));

        // Reader notices EOF shortly after.
        for _ in 0..50 {
            if transport.status() == TransportStatus::Disconnected {
                break;
            }
            tokio::time::sleep(std::time::Duration::from_millis(10)).await;
        }
        assert_eq!(transport.status(), TransportStatus::Disconnected);
    }

    #[tokio::test]
    async fn test_request_without_session() {
        let transport = transport(1);
        let err = transport.request("blockchain.block.headers", vec![]).await.unwrap_err();
        assert!(matches!(err, UpstreamError::Io(ref e) if e.kind() == io::ErrorKind::NotConnected));
    }

    #[tokio::test]
    async fn test_connect_refused() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        drop(listener);

        let err = transport(port).connect().await.unwrap_err();
        assert!(matches!(err, UpstreamError::Io(_)));
    }
}
