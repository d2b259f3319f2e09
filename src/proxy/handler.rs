//! Connection handler module
//!
//! This module handles individual client connections: classify the first
//! bytes, settle the transport, negotiate the WebSocket handshake, connect to
//! the target and relay until the session ends.

use log::{debug, info, warn};
use openssl::ssl::SslAcceptor;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::sync::watch;
use tokio::time::timeout;

use crate::common::{GatewayError, Result};
use crate::config::GatewayConfig;
use crate::protocol::{
    negotiate, DetectionResult, HandshakeDetector, HandshakeError, ProtocolDetector, POLICY_RESPONSE,
};
use crate::tls::create_tls_acceptor;
use crate::transport::TransportChannel;
use super::record::RecordSink;
use super::relay::{ProxyRelay, RelayStats};

/// Read-only settings shared by every connection
pub struct GatewaySettings {
    /// Target address, resolved on each connect
    pub target: String,
    /// Certificate path, for diagnostics
    pub cert: PathBuf,
    /// Refuse plaintext clients
    pub ssl_only: bool,
    /// Capacity of each relay buffer
    pub buffer_size: usize,
    /// Wait for the first bytes and for the full handshake
    pub handshake_timeout: Duration,
    /// Wait for the target to accept
    pub connection_timeout: Duration,
    /// Present iff the certificate was loaded at startup
    pub tls: Option<Arc<SslAcceptor>>,
    /// Shared recording file
    pub recorder: Option<RecordSink>,
}

impl GatewaySettings {
    /// Build the settings from a validated configuration
    ///
    /// Loads the certificate when it exists and opens the recording file.
    ///
    /// # Errors
    ///
    /// Returns `GatewayError::Config` if the certificate exists but cannot
    /// be loaded, or the recording file cannot be opened.
    pub async fn from_config(config: &GatewayConfig) -> Result<Self> {
        let tls = if config.tls_enabled() {
            let acceptor = create_tls_acceptor(config.cert(), config.key()).map_err(|e| {
                GatewayError::Config(format!("Failed to load certificate {}: {}", config.cert().display(), e))
            })?;
            Some(Arc::new(acceptor))
        } else {
            None
        };

        let recorder = match config.record() {
            Some(path) => Some(RecordSink::open(path).await.map_err(|e| {
                GatewayError::Config(format!("Failed to open recording file {}: {}", path.display(), e))
            })?),
            None => None,
        };

        Ok(Self {
            target: config.target().to_string(),
            cert: config.cert().to_path_buf(),
            ssl_only: config.ssl_only(),
            buffer_size: config.buffer_size(),
            handshake_timeout: config.handshake_timeout(),
            connection_timeout: config.connection_timeout(),
            tls,
            recorder,
        })
    }
}

/// Everything one connection task needs
pub struct ConnectionContext {
    /// Sequential connection number, for log lines
    pub id: u64,
    /// Client address
    pub peer: SocketAddr,
    /// Shared settings
    pub settings: Arc<GatewaySettings>,
    /// Gateway shutdown flag
    pub shutdown: watch::Receiver<bool>,
}

/// Handle a single client connection
///
/// # Parameters
///
/// * `stream` - Accepted client TCP stream
/// * `ctx` - Per-connection context
///
/// # Returns
///
/// Returns the relay totals, `None` when the connection ended before a
/// relay was started (empty connection or policy probe), or the error that
/// aborted the connection.
pub async fn handle_connection(stream: TcpStream, ctx: ConnectionContext) -> Result<Option<RelayStats>> {
    let settings = Arc::clone(&ctx.settings);
    let detector = HandshakeDetector::default();

    let mut channel = match detector.detect(&stream, settings.handshake_timeout).await? {
        DetectionResult::Empty => {
            debug!("{}: ignoring empty connection", ctx.id);
            return Ok(None);
        }
        DetectionResult::FlashPolicy => {
            info!("{}: sending flash policy response", ctx.id);
            serve_policy(stream).await?;
            return Ok(None);
        }
        DetectionResult::Tls => {
            let acceptor = settings.tls.as_ref().ok_or_else(|| {
                HandshakeError::TlsUnavailable(format!("{} not found", settings.cert.display()))
            })?;
            TransportChannel::accept_tls(stream, acceptor).await?
        }
        DetectionResult::Plain => {
            if settings.ssl_only {
                return Err(HandshakeError::PlaintextDisallowed.into());
            }
            TransportChannel::plain(stream)
        }
    };

    let scheme = channel.scheme();
    info!("{}: {} WebSocket connection from {}", ctx.id, scheme, ctx.peer);

    let negotiated = match negotiate(&mut channel, scheme, settings.handshake_timeout).await {
        Ok(negotiated) => negotiated,
        Err(e) => {
            channel.close().await;
            return Err(e);
        }
    };
    info!(
        "{}: version hixie-{}, {} framing, path {}",
        ctx.id,
        negotiated.version,
        negotiated.options.dialect(),
        negotiated.request.path
    );

    let target = match connect_target(&settings.target, settings.connection_timeout).await {
        Ok(target) => target,
        Err(e) => {
            warn!("{}: failed to connect to target {}: {}", ctx.id, settings.target, e);
            channel.close().await;
            return Err(e);
        }
    };
    debug!("{}: connected to target {}", ctx.id, settings.target);

    let relay = ProxyRelay::new(negotiated.options.codec(), settings.buffer_size, ctx.shutdown.clone())
        .with_recorder(settings.recorder.clone());
    let stats = relay.run(channel, target).await?;

    debug!(
        "{}: {} ({} bytes / {} frames to target, {} bytes / {} frames to client)",
        ctx.id,
        stats.close,
        stats.to_target_bytes,
        stats.frames_from_client,
        stats.to_client_bytes,
        stats.frames_to_client
    );
    Ok(Some(stats))
}

/// Consume the policy probe, answer it and close
async fn serve_policy(mut stream: TcpStream) -> Result<()> {
    let mut probe = [0u8; 1024];
    let n = stream.read(&mut probe).await?;
    debug!("Consumed {} byte policy request", n);

    stream.write_all(POLICY_RESPONSE).await?;
    stream.shutdown().await?;
    Ok(())
}

/// Connect to the target with a timeout
async fn connect_target(target: &str, wait: Duration) -> Result<TcpStream> {
    let stream = timeout(wait, TcpStream::connect(target))
        .await
        .map_err(|_| {
            GatewayError::Io(std::io::Error::new(std::io::ErrorKind::TimedOut, "Connection timed out"))
        })??;

    stream.set_nodelay(true)?;
    Ok(stream)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::net::TcpListener;

    fn settings(ssl_only: bool, target: String) -> Arc<GatewaySettings> {
        Arc::new(GatewaySettings {
            target,
            cert: PathBuf::from("self.pem"),
            ssl_only,
            buffer_size: 4096,
            handshake_timeout: Duration::from_secs(2),
            connection_timeout: Duration::from_secs(2),
            tls: None,
            recorder: None,
        })
    }

    async fn accept_one(settings: Arc<GatewaySettings>) -> (TcpStream, tokio::task::JoinHandle<Result<Option<RelayStats>>>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let client = TcpStream::connect(addr).await.unwrap();
        let (stream, peer) = listener.accept().await.unwrap();

        let (_tx, shutdown) = watch::channel(false);
        let ctx = ConnectionContext { id: 1, peer, settings, shutdown };
        (client, tokio::spawn(handle_connection(stream, ctx)))
    }

    #[tokio::test]
    async fn test_flash_policy() {
        let (mut client, task) = accept_one(settings(false, "127.0.0.1:1".into())).await;
        client.write_all(b"<policy-file-request/>\0").await.unwrap();

        let mut response = Vec::new();
        client.read_to_end(&mut response).await.unwrap();
        assert_eq!(response, POLICY_RESPONSE);
        assert!(task.await.unwrap().unwrap().is_none());
    }

    #[tokio::test]
    async fn test_ssl_only_rejects_plaintext() {
        let (mut client, task) = accept_one(settings(true, "127.0.0.1:1".into())).await;
        client.write_all(b"GET / HTTP/1.1\r\n").await.unwrap();

        let err = task.await.unwrap().unwrap_err();
        assert!(matches!(err, GatewayError::Handshake(HandshakeError::PlaintextDisallowed)));
    }

    #[tokio::test]
    async fn test_tls_without_certificate() {
        let (mut client, task) = accept_one(settings(false, "127.0.0.1:1".into())).await;
        client.write_all(&[0x16, 0x03, 0x01, 0x00, 0x05]).await.unwrap();

        let err = task.await.unwrap().unwrap_err();
        assert!(matches!(err, GatewayError::Handshake(HandshakeError::TlsUnavailable(_))));
    }

    #[tokio::test]
    async fn test_empty_connection() {
        let (client, task) = accept_one(settings(false, "127.0.0.1:1".into())).await;
        drop(client);
        assert!(task.await.unwrap().unwrap().is_none());
    }

    #[tokio::test]
    async fn test_target_refused() {
        // Reserve a port, then free it so nothing listens there
        let unused = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let target = unused.local_addr().unwrap().to_string();
        drop(unused);

        let (mut client, task) = accept_one(settings(false, target)).await;
        client
            .write_all(b"GET /?b64encode HTTP/1.1\r\nHost: localhost\r\nOrigin: http://localhost\r\n\r\n")
            .await
            .unwrap();

        let err = task.await.unwrap().unwrap_err();
        assert!(matches!(err, GatewayError::Io(_)));
    }
}
