//! Long-running gateway process.
//!
//! The [`Daemon`] builds the Electrum transport and the [`Gateway`], keeps
//! retrying the first indexer connection until it succeeds, then serves the
//! HTTP API until Ctrl+C. From there on the connection manager's health check
//! owns reconnects.
//!
//! ```ignore
//! use indexer_gateway::{config::GatewayConfig, daemon::Daemon};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! Daemon::new(GatewayConfig::default()).run().await?;
//! # Ok(())
//! # }
//! ```

use std::{sync::Arc, time::Duration};

use anyhow::anyhow;
use log::{error, info, warn};
use thiserror::Error;
use tokio::{
    signal,
    sync::broadcast,
    time::sleep,
};

use crate::{
    api,
    config::GatewayConfig,
    gateway::Gateway,
    transport::{ElectrumTransport, IndexerTransport},
};

#[derive(Debug, Error)]
pub enum DaemonError {
    #[error("Fatal error: {0}")]
    Fatal(#[from] anyhow::Error),
}

pub struct Daemon {
    config: GatewayConfig,
    transport: Arc<dyn IndexerTransport>,
}

impl Daemon {
    pub fn new(config: GatewayConfig) -> Self {
        let transport = Arc::new(ElectrumTransport::new((&config.indexer).into()));
        Self::with_transport(config, transport)
    }

    pub fn with_transport(config: GatewayConfig, transport: Arc<dyn IndexerTransport>) -> Self {
        Self { config, transport }
    }

    /// Runs until Ctrl+C or a fatal error.
    pub async fn run(&self) -> Result<(), DaemonError> {
        info!("Daemon started. Press Ctrl+C to stop.");
        match self.config.network {
            Some(network) => info!(network:% = network; "Serving network"),
            None => warn!("No network configured; every address will be rejected"),
        }

        let (shutdown_tx, _) = broadcast::channel(1);
        let shutdown_tx_clone = shutdown_tx.clone();
        let ctrlc_handle = tokio::spawn(async move {
            match signal::ctrl_c().await {
                Ok(()) => info!("Received shutdown signal, stopping all tasks..."),
                Err(e) => error!(error:% = e; "Failed to listen for ctrl_c, shutting down"),
            }
            let _ = shutdown_tx_clone.send(());
        });

        let result = self.serve(&shutdown_tx).await;
        ctrlc_handle.abort();
        result
    }

    /// Connects, serves the API and returns once `shutdown_tx` fires.
    pub async fn serve(&self, shutdown_tx: &broadcast::Sender<()>) -> Result<(), DaemonError> {
        let gateway = Arc::new(Gateway::from_config(self.transport.clone(), &self.config));

        let mut shutdown_rx = shutdown_tx.subscribe();
        let retry = self.config.indexer.health_check_interval();
        if !connect_until_ready(&gateway, retry, &mut shutdown_rx).await {
            gateway.disconnect().await;
            info!("Daemon stopped before the indexer connection was established.");
            return Ok(());
        }

        let router = api::create_router(gateway.clone(), self.config.api.request_timeout());
        let addr = self.config.api.bind_address();
        let listener = match tokio::net::TcpListener::bind(&addr).await {
            Ok(listener) => listener,
            Err(e) => {
                gateway.disconnect().await;
                return Err(DaemonError::Fatal(anyhow!("Failed to bind API server to {}: {}", addr, e)));
            },
        };

        info!(address = &*addr; "API server listening");

        let mut shutdown_rx_api = shutdown_tx.subscribe();
        let served = axum::serve(listener, router)
            .with_graceful_shutdown(async move {
                shutdown_rx_api.recv().await.ok();
            })
            .await;

        gateway.disconnect().await;
        served.map_err(|e| DaemonError::Fatal(anyhow!("API server failed: {}", e)))?;

        info!("Daemon stopped gracefully.");
        Ok(())
    }
}

/// Retries `connect` every `retry` until it succeeds (true) or shutdown is
/// requested (false). Each attempt is bounded by the gateway's health-check
/// interval.
pub async fn connect_until_ready(
    gateway: &Gateway,
    retry: Duration,
    shutdown_rx: &mut broadcast::Receiver<()>,
) -> bool {
    let mut attempt: u64 = 0;
    loop {
        attempt += 1;
        tokio::select! {
            _ = shutdown_rx.recv() => {
                info!("Shutdown requested while connecting to the indexer");
                return false;
            }
            res = gateway.connect() => match res {
                Ok(()) => return true,
                Err(e) => warn!(attempt = attempt, error:% = e; "Could not connect to indexer"),
            },
        }

        tokio::select! {
            _ = shutdown_rx.recv() => {
                info!("Shutdown requested while connecting to the indexer");
                return false;
            }
            _ = sleep(retry) => {}
        }
    }
}
