//! Gateway server module
//!
//! This module owns the listening socket, spawns one task per accepted
//! connection and coordinates shutdown.

use log::{debug, error, info, warn};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::sync::watch;
use tokio::task::{JoinHandle, JoinSet};
use tokio::time::timeout;

use crate::common::{GatewayError, Result};
use crate::config::GatewayConfig;
use super::handler::{handle_connection, ConnectionContext, GatewaySettings};
use super::relay::RelayStats;

/// What a connection task hands back to the accept loop
type TaskOutput = (u64, Result<Option<RelayStats>>);

/// How long outstanding connections may run after shutdown is requested
pub const DRAIN_TIMEOUT: Duration = Duration::from_secs(30);

/// WebSocket gateway
///
/// Accepts WebSocket clients (plain or TLS) and relays each one to the
/// configured TCP target.
pub struct Gateway {
    /// Bound listening socket
    listener: TcpListener,
    /// Settings shared with every connection
    settings: Arc<GatewaySettings>,
}

impl Gateway {
    /// Bind the listen address and prepare the shared settings
    ///
    /// # Errors
    ///
    /// Returns an error if the listen socket cannot be bound or the TLS
    /// material or recording file cannot be loaded.
    pub async fn bind(config: &GatewayConfig) -> Result<Self> {
        let settings = GatewaySettings::from_config(config).await?;
        let listener = TcpListener::bind(config.listen()).await?;

        info!("Listening on {}", listener.local_addr()?);
        info!("Forwarding to {}", settings.target);
        match (&settings.tls, settings.ssl_only) {
            (Some(_), true) => info!("SSL/TLS only (wss://)"),
            (Some(_), false) => info!("SSL/TLS (wss://) and plain (ws://) clients"),
            (None, _) => info!("No certificate, plain (ws://) clients only"),
        }

        Ok(Self {
            listener,
            settings: Arc::new(settings),
        })
    }

    /// Address the gateway is listening on
    pub fn local_addr(&self) -> Result<SocketAddr> {
        Ok(self.listener.local_addr()?)
    }

    /// Accept connections until `shutdown` flips to `true`
    ///
    /// Outstanding connections are then given up to 30 seconds to finish;
    /// each relay notices the flag within one second.
    pub async fn run(self, mut shutdown: watch::Receiver<bool>) -> Result<()> {
        let mut tasks: JoinSet<TaskOutput> = JoinSet::new();
        let mut next_id: u64 = 0;

        loop {
            // Reap finished connections
            while let Some(result) = tasks.try_join_next() {
                log_task_result(result);
            }

            if *shutdown.borrow() {
                break;
            }

            tokio::select! {
                accepted = self.listener.accept() => {
                    let (stream, peer) = match accepted {
                        Ok(accepted) => accepted,
                        Err(e) => {
                            error!("Error accepting connection: {}", e);
                            continue;
                        }
                    };

                    next_id += 1;
                    debug!("{}: accepted connection from {}", next_id, peer);

                    let ctx = ConnectionContext {
                        id: next_id,
                        peer,
                        settings: Arc::clone(&self.settings),
                        shutdown: shutdown.clone(),
                    };
                    tasks.spawn(async move {
                        let id = ctx.id;
                        (id, handle_connection(stream, ctx).await)
                    });
                }

                changed = shutdown.changed() => {
                    if changed.is_err() {
                        // Every handle is gone, nobody can stop us any more
                        debug!("Shutdown channel closed");
                        break;
                    }
                }
            }
        }

        info!("Shutting down, waiting for {} connection(s)", tasks.len());
        drop(self.listener);

        let drained = timeout(DRAIN_TIMEOUT, async {
            while let Some(result) = tasks.join_next().await {
                log_task_result(result);
            }
        })
        .await;

        if drained.is_err() {
            warn!("Aborting {} connection(s) still running", tasks.len());
            tasks.abort_all();
        }

        info!("Gateway stopped");
        Ok(())
    }

    /// Run the accept loop on its own task
    pub fn start(self) -> GatewayHandle {
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let task = tokio::spawn(self.run(shutdown_rx));
        GatewayHandle { shutdown_tx, task }
    }
}

/// Handle to a running gateway
pub struct GatewayHandle {
    shutdown_tx: watch::Sender<bool>,
    task: JoinHandle<Result<()>>,
}

impl GatewayHandle {
    /// Ask the gateway to stop accepting and wind down its connections
    pub fn shutdown(&self) {
        self.shutdown_tx.send_replace(true);
    }

    /// Wait for the accept loop and the connection drain to finish
    pub async fn join(self) -> Result<()> {
        self.task
            .await
            .map_err(|e| GatewayError::Other(format!("Gateway task failed: {}", e)))?
    }
}

fn log_task_result(result: std::result::Result<TaskOutput, tokio::task::JoinError>) {
    match result {
        Ok((_, Ok(_))) => {}
        Ok((id, Err(GatewayError::Handshake(e)))) => warn!("{}: handshake failed: {}", id, e),
        Ok((id, Err(e))) if e.is_connection_scoped() => warn!("{}: connection aborted: {}", id, e),
        Ok((id, Err(e))) => error!("{}: connection failed: {}", id, e),
        Err(e) => error!("Connection task failed: {}", e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{ConfigValues, ValueSource};

    fn test_config() -> GatewayConfig {
        let dir = std::env::temp_dir();
        GatewayConfig::default().merge(
            &ConfigValues {
                listen: Some("127.0.0.1:0".parse().unwrap()),
                cert: Some(dir.join("wsgate-no-such-cert.pem")),
                ..Default::default()
            },
            ValueSource::CommandLine,
        )
    }

    #[tokio::test]
    async fn test_bind_ephemeral_port() {
        let gateway = Gateway::bind(&test_config()).await.unwrap();
        let addr = gateway.local_addr().unwrap();
        assert_ne!(addr.port(), 0);
        assert!(gateway.settings.tls.is_none());
    }

    #[tokio::test]
    async fn test_shutdown_stops_accept_loop() {
        let gateway = Gateway::bind(&test_config()).await.unwrap();
        let addr = gateway.local_addr().unwrap();
        let handle = gateway.start();

        handle.shutdown();
        timeout(Duration::from_secs(5), handle.join()).await.unwrap().unwrap();

        // The listener is closed once the loop returns
        assert!(tokio::net::TcpStream::connect(addr).await.is_err());
    }

    #[tokio::test]
    async fn test_bind_fails_on_used_port() {
        let first = Gateway::bind(&test_config()).await.unwrap();
        let mut config = test_config();
        config.values.listen = Some(first.local_addr().unwrap());

        assert!(matches!(Gateway::bind(&config).await, Err(GatewayError::Io(_))));
    }
}
