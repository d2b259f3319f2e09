//! Client transport
//!
//! A `TransportChannel` is the client leg of a connection, either the raw TCP
//! stream or a TLS session layered on it. Everything above this module reads
//! and writes through `AsyncRead`/`AsyncWrite` and never cares which.

use std::io;
use std::net::SocketAddr;
use std::pin::Pin;
use std::task::{Context, Poll};

use log::{debug, warn};
use openssl::ssl::{Ssl, SslAcceptor};
use tokio::io::{AsyncRead, AsyncWrite, AsyncWriteExt, ReadBuf};
use tokio::net::TcpStream;
use tokio_openssl::SslStream;

use crate::common::{GatewayError, Result};

enum Inner {
    Plain(TcpStream),
    Tls(Box<SslStream<TcpStream>>),
}

/// Bidirectional client byte stream, plain or TLS
pub struct TransportChannel {
    inner: Inner,
    peer: Option<SocketAddr>,
    closed: bool,
}

impl TransportChannel {
    /// Wrap an accepted TCP stream without encryption
    pub fn plain(stream: TcpStream) -> Self {
        let peer = stream.peer_addr().ok();
        Self {
            inner: Inner::Plain(stream),
            peer,
            closed: false,
        }
    }

    /// Run the server side of a TLS handshake over `stream`
    ///
    /// # Parameters
    ///
    /// * `stream` - Accepted TCP stream whose first byte announced TLS
    /// * `acceptor` - Acceptor built from the configured certificate
    ///
    /// # Errors
    ///
    /// Returns `GatewayError::TlsHandshake` if the client aborts or the
    /// negotiation fails.
    pub async fn accept_tls(stream: TcpStream, acceptor: &SslAcceptor) -> Result<Self> {
        let peer = stream.peer_addr().ok();
        let ssl = Ssl::new(acceptor.context())?;
        let mut tls = SslStream::new(ssl, stream)?;

        Pin::new(&mut tls)
            .accept()
            .await
            .map_err(|e| GatewayError::TlsHandshake(e.to_string()))?;

        debug!(
            "TLS session established with {} ({})",
            peer.map_or_else(|| "unknown peer".to_string(), |p| p.to_string()),
            tls.ssl().version_str()
        );

        Ok(Self {
            inner: Inner::Tls(Box::new(tls)),
            peer,
            closed: false,
        })
    }

    /// Whether this channel is encrypted
    pub fn is_tls(&self) -> bool {
        matches!(self.inner, Inner::Tls(_))
    }

    /// URL scheme matching the transport
    pub fn scheme(&self) -> &'static str {
        if self.is_tls() {
            "wss"
        } else {
            "ws"
        }
    }

    /// Remote address, when the socket still reports one
    pub fn peer_addr(&self) -> Option<SocketAddr> {
        self.peer
    }

    /// Shut the channel down
    ///
    /// Calling this more than once is harmless.
    pub async fn close(&mut self) {
        if let Err(e) = self.shutdown().await {
            debug!("Error closing client channel: {}", e);
        }
    }
}

impl std::fmt::Debug for TransportChannel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TransportChannel")
            .field("scheme", &self.scheme())
            .field("peer", &self.peer)
            .field("closed", &self.closed)
            .finish()
    }
}

impl AsyncRead for TransportChannel {
    fn poll_read(self: Pin<&mut Self>, cx: &mut Context<'_>, buf: &mut ReadBuf<'_>) -> Poll<io::Result<()>> {
        let this = self.get_mut();
        match &mut this.inner {
            Inner::Plain(s) => Pin::new(s).poll_read(cx, buf),
            Inner::Tls(s) => Pin::new(s.as_mut()).poll_read(cx, buf),
        }
    }
}

impl AsyncWrite for TransportChannel {
    fn poll_write(self: Pin<&mut Self>, cx: &mut Context<'_>, buf: &[u8]) -> Poll<io::Result<usize>> {
        let this = self.get_mut();
        if this.closed {
            return Poll::Ready(Err(io::Error::new(io::ErrorKind::NotConnected, "channel closed")));
        }
        match &mut this.inner {
            Inner::Plain(s) => Pin::new(s).poll_write(cx, buf),
            Inner::Tls(s) => Pin::new(s.as_mut()).poll_write(cx, buf),
        }
    }

    fn poll_flush(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        let this = self.get_mut();
        match &mut this.inner {
            Inner::Plain(s) => Pin::new(s).poll_flush(cx),
            Inner::Tls(s) => Pin::new(s.as_mut()).poll_flush(cx),
        }
    }

    fn poll_shutdown(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        let this = self.get_mut();
        if this.closed {
            return Poll::Ready(Ok(()));
        }

        let result = match &mut this.inner {
            Inner::Plain(s) => Pin::new(s).poll_shutdown(cx),
            Inner::Tls(s) => Pin::new(s.as_mut()).poll_shutdown(cx),
        };

        match result {
            Poll::Pending => Poll::Pending,
            Poll::Ready(result) => {
                this.closed = true;
                if let Err(e) = &result {
                    // Peer already gone; the channel is closed either way
                    if e.kind() == io::ErrorKind::NotConnected {
                        return Poll::Ready(Ok(()));
                    }
                    warn!("Client channel shutdown failed: {}", e);
                }
                Poll::Ready(result)
            }
        }
    }
}
