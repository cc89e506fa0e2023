//! Lifecycle of the shared indexer session.
//!
//! [`ConnectionManager`] is the only owner of transport lifecycle calls. It
//! serializes connect and disconnect, publishes the [`ConnectionState`] on a
//! watch channel and supervises one background health check that reconnects
//! a dropped session.

use std::{io, sync::Arc, time::Duration};

use log::{info, warn};
use tokio::{
    sync::{Mutex, watch},
    task::JoinHandle,
    time::{Instant, MissedTickBehavior, interval_at, timeout},
};
use tokio_util::sync::CancellationToken;

use crate::{
    error::{GatewayError, UpstreamError},
    transport::{IndexerTransport, TransportStatus},
};

pub const DEFAULT_HEALTH_CHECK_INTERVAL: Duration = Duration::from_secs(30);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Connected,
    Reconnecting,
}

struct Shared {
    transport: Arc<dyn IndexerTransport>,
    state: watch::Sender<ConnectionState>,
    lifecycle: Mutex<()>,
}

impl Shared {
    fn is_connected(&self) -> bool {
        *self.state.borrow() == ConnectionState::Connected && self.transport.status() == TransportStatus::Connected
    }

    /// Opens a session unless one is already up. `transition` is the state
    /// published while the attempt runs.
    async fn establish(&self, transition: ConnectionState) -> Result<(), UpstreamError> {
        let _guard = self.lifecycle.lock().await;
        if self.is_connected() {
            return Ok(());
        }

        self.state.send_replace(transition);
        match self.transport.connect().await {
            Ok(()) => {
                self.state.send_replace(ConnectionState::Connected);
                Ok(())
            },
            Err(e) => {
                self.state.send_replace(ConnectionState::Disconnected);
                Err(e)
            },
        }
    }

    /// Moves a state left behind by an abandoned attempt back to
    /// Disconnected.
    fn reset_stalled(&self, transition: ConnectionState) {
        self.state.send_if_modified(|state| {
            let stalled = *state == transition;
            if stalled {
                *state = ConnectionState::Disconnected;
            }
            stalled
        });
    }
}

struct HealthCheck {
    cancel: CancellationToken,
    handle: JoinHandle<()>,
}

pub struct ConnectionManager {
    shared: Arc<Shared>,
    interval: Duration,
    health: Mutex<Option<HealthCheck>>,
}

impl ConnectionManager {
    pub fn new(transport: Arc<dyn IndexerTransport>) -> Self {
        Self::with_interval(transport, DEFAULT_HEALTH_CHECK_INTERVAL)
    }

    pub fn with_interval(transport: Arc<dyn IndexerTransport>, interval: Duration) -> Self {
        let (state, _) = watch::channel(ConnectionState::Disconnected);
        Self {
            shared: Arc::new(Shared {
                transport,
                state,
                lifecycle: Mutex::new(()),
            }),
            interval,
            health: Mutex::new(None),
        }
    }

    /// Connects and starts the health check. Does nothing when already
    /// connected. An attempt that does not finish within one health-check
    /// interval fails with a timed-out error.
    pub async fn connect(&self) -> Result<(), GatewayError> {
        match timeout(self.interval, self.shared.establish(ConnectionState::Connecting)).await {
            Ok(result) => result?,
            Err(_) => {
                self.shared.reset_stalled(ConnectionState::Connecting);
                warn!(timeout_secs = self.interval.as_secs(); "Indexer connection attempt timed out");
                return Err(UpstreamError::Io(io::Error::new(
                    io::ErrorKind::TimedOut,
                    format!("indexer did not answer within {}s", self.interval.as_secs()),
                ))
                .into());
            },
        }

        let mut health = self.health.lock().await;
        // A disconnect may have closed the session since it was opened.
        if !self.shared.is_connected() {
            return Err(GatewayError::NotReady);
        }
        if health.is_none() {
            *health = Some(self.spawn_health_check());
            info!(interval_secs = self.interval.as_secs(); "Indexer connection ready");
        }
        Ok(())
    }

    /// Stops the health check and closes the session.
    pub async fn disconnect(&self) {
        let mut health = self.health.lock().await;
        if let Some(check) = health.take() {
            check.cancel.cancel();
            let _ = check.handle.await;
        }

        let _guard = self.shared.lifecycle.lock().await;
        self.shared.transport.disconnect().await;
        self.shared.state.send_replace(ConnectionState::Disconnected);
    }

    pub fn is_ready(&self) -> bool {
        self.shared.is_connected()
    }

    pub fn ensure_ready(&self) -> Result<(), GatewayError> {
        if self.is_ready() {
            Ok(())
        } else {
            Err(GatewayError::NotReady)
        }
    }

    pub fn state(&self) -> ConnectionState {
        *self.shared.state.borrow()
    }

    pub fn subscribe(&self) -> watch::Receiver<ConnectionState> {
        self.shared.state.subscribe()
    }

    pub async fn health_check_running(&self) -> bool {
        self.health
            .lock()
            .await
            .as_ref()
            .is_some_and(|check| !check.handle.is_finished())
    }

    pub(crate) fn transport(&self) -> &Arc<dyn IndexerTransport> {
        &self.shared.transport
    }

    fn spawn_health_check(&self) -> HealthCheck {
        let cancel = CancellationToken::new();
        let handle = tokio::spawn(run_health_check(self.shared.clone(), self.interval, cancel.clone()));
        HealthCheck { cancel, handle }
    }
}

impl Drop for ConnectionManager {
    fn drop(&mut self) {
        if let Some(check) = self.health.get_mut().take() {
            check.cancel.cancel();
        }
    }
}

async fn run_health_check(shared: Arc<Shared>, period: Duration, cancel: CancellationToken) {
    let mut ticker = interval_at(Instant::now() + period, period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            _ = cancel.cancelled() => break,
            _ = ticker.tick() => {
                if shared.transport.status() == TransportStatus::Connected {
                    continue;
                }
                warn!("Indexer session lost, reconnecting");

                tokio::select! {
                    _ = cancel.cancelled() => break,
                    attempt = timeout(period, shared.establish(ConnectionState::Reconnecting)) => match attempt {
                        Ok(Ok(())) => info!("Reconnected to indexer"),
                        Ok(Err(e)) => warn!(error:% = e; "Reconnect attempt failed"),
                        Err(_) => {
                            shared.reset_stalled(ConnectionState::Reconnecting);
                            warn!(timeout_secs = period.as_secs(); "Reconnect attempt timed out");
                        },
                    },
                }
            }
        }
    }
}
