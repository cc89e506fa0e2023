use std::sync::{
    Arc, Mutex,
    atomic::{AtomicBool, AtomicUsize, Ordering},
};

use async_trait::async_trait;
use serde_json::Value;

use super::{IndexerTransport, TransportStatus};
use crate::error::UpstreamError;

type Handler = dyn Fn(&str, &[Value]) -> Result<Value, UpstreamError> + Send + Sync;

/// In-memory transport that answers through a closure and counts calls.
pub(crate) struct MockTransport {
    handler: Box<Handler>,
    connected: AtomicBool,
    fail_connect: AtomicBool,
    hang_connect: AtomicBool,
    connects: AtomicUsize,
    disconnects: AtomicUsize,
    requests: AtomicUsize,
    calls: Mutex<Vec<(String, Vec<Value>)>>,
}

impl MockTransport {
    pub fn new<F>(handler: F) -> Arc<Self>
    where
        F: Fn(&str, &[Value]) -> Result<Value, UpstreamError> + Send + Sync + 'static,
    {
        Arc::new(Self {
            handler: Box::new(handler),
            connected: AtomicBool::new(false),
            fail_connect: AtomicBool::new(false),
            hang_connect: AtomicBool::new(false),
            connects: AtomicUsize::new(0),
            disconnects: AtomicUsize::new(0),
            requests: AtomicUsize::new(0),
            calls: Mutex::new(Vec::new()),
        })
    }

    pub fn connect_count(&self) -> usize {
        self.connects.load(Ordering::SeqCst)
    }

    pub fn disconnect_count(&self) -> usize {
        self.disconnects.load(Ordering::SeqCst)
    }

    pub fn request_count(&self) -> usize {
        self.requests.load(Ordering::SeqCst)
    }

    pub fn calls(&self) -> Vec<(String, Vec<Value>)> {
        self.calls.lock().unwrap().clone()
    }

    /// Simulates the session dropping underneath the gateway.
    pub fn drop_session(&self) {
        self.connected.store(false, Ordering::SeqCst);
    }

    pub fn set_fail_connect(&self, fail: bool) {
        self.fail_connect.store(fail, Ordering::SeqCst);
    }

    /// Makes `connect` accept the call and never finish, like an indexer
    /// that takes the TCP connection but never answers the handshake.
    pub fn set_hang_connect(&self, hang: bool) {
        self.hang_connect.store(hang, Ordering::SeqCst);
    }
}

#[async_trait]
impl IndexerTransport for MockTransport {
    async fn connect(&self) -> Result<(), UpstreamError> {
        self.connects.fetch_add(1, Ordering::SeqCst);
        if self.hang_connect.load(Ordering::SeqCst) {
            std::future::pending::<()>().await;
        }
        if self.fail_connect.load(Ordering::SeqCst) {
            return Err(UpstreamError::Io(std::io::Error::from(std::io::ErrorKind::ConnectionRefused)));
        }
        self.connected.store(true, Ordering::SeqCst);
        Ok(())
    }

    async fn disconnect(&self) {
        self.disconnects.fetch_add(1, Ordering::SeqCst);
        self.connected.store(false, Ordering::SeqCst);
    }

    fn status(&self) -> TransportStatus {
        if self.connected.load(Ordering::SeqCst) {
            TransportStatus::Connected
        } else {
            TransportStatus::Disconnected
        }
    }

    async fn request(&self, method: &str, params: Vec<Value>) -> Result<Value, UpstreamError> {
        self.requests.fetch_add(1, Ordering::SeqCst);
        self.calls.lock().unwrap().push((method.to_string(), params.clone()));
        (self.handler)(method, &params)
    }
}
