//! Connection classifier
//!
//! This module inspects the first bytes of a new connection without
//! consuming them, so that a TLS session can still be layered on top of the
//! socket afterwards.

use std::time::Duration;
use tokio::net::TcpStream;
use tokio::time::timeout;
use log::{debug, trace};

use crate::common::{GatewayError, Result};
use super::HandshakeError;

/// Flash cross-domain policy probe
pub const POLICY_REQUEST: &[u8] = b"<policy-file-request/>";

/// Fixed answer to a Flash policy probe
pub const POLICY_RESPONSE: &[u8] =
    b"<cross-domain-policy><allow-access-from domain=\"*\" to-ports=\"*\" /></cross-domain-policy>\n";

/// Protocol detection result
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DetectionResult {
    /// Peer closed before sending anything
    Empty,
    /// Flash policy file request
    FlashPolicy,
    /// TLS ClientHello (SSLv2-compatible or TLS record)
    Tls,
    /// Anything else; treated as a plaintext WebSocket upgrade
    Plain,
}

/// Protocol detector trait
pub trait ProtocolDetector: Send + Sync {
    /// Classify a connection from its first bytes
    ///
    /// The bytes stay in the socket's receive queue.
    ///
    /// # Parameters
    ///
    /// * `stream` - Freshly accepted TCP stream
    /// * `wait` - How long to wait for the first bytes
    ///
    /// # Returns
    ///
    /// Returns the detection result, or `HandshakeError::Timeout` if the
    /// client stays silent.
    #[allow(async_fn_in_trait)]
    async fn detect(&self, stream: &TcpStream, wait: Duration) -> Result<DetectionResult>;
}

/// Detector for the gateway's handshake entry point
#[derive(Debug, Clone)]
pub struct HandshakeDetector {
    /// Maximum bytes to peek
    max_bytes: usize,
}

impl Default for HandshakeDetector {
    fn default() -> Self {
        Self { max_bytes: 1024 }
    }
}

impl HandshakeDetector {
    /// Classify peeked bytes
    pub fn classify(&self, data: &[u8]) -> DetectionResult {
        match data.first() {
            None => DetectionResult::Empty,
            Some(_) if data.starts_with(POLICY_REQUEST) => DetectionResult::FlashPolicy,
            Some(0x16) | Some(0x80) => {
                debug!("TLS ClientHello detected ({})", Self::tls_version(data).unwrap_or("unknown version"));
                DetectionResult::Tls
            }
            Some(_) => DetectionResult::Plain,
        }
    }

    /// Record-layer version of a TLS ClientHello, for diagnostics
    fn tls_version(data: &[u8]) -> Option<&'static str> {
        if data.first() == Some(&0x80) {
            return Some("SSLv2-compatible hello");
        }
        match (data.get(1)?, data.get(2)?) {
            (0x03, 0x00) => Some("SSLv3"),
            (0x03, 0x01) => Some("TLSv1.0"),
            (0x03, 0x02) => Some("TLSv1.1"),
            (0x03, 0x03) => Some("TLSv1.2"),
            (0x03, 0x04) => Some("TLSv1.3"),
            _ => None,
        }
    }
}

impl ProtocolDetector for HandshakeDetector {
    async fn detect(&self, stream: &TcpStream, wait: Duration) -> Result<DetectionResult> {
        let mut peek_buf = vec![0u8; self.max_bytes];

        match timeout(wait, stream.peek(&mut peek_buf)).await {
            Ok(Ok(size)) => {
                trace!("Peeked {} bytes: {:02X?}", size, &peek_buf[..size.min(16)]);
                Ok(self.classify(&peek_buf[..size]))
            }
            Ok(Err(e)) => {
                debug!("Error peeking data: {}", e);
                Err(GatewayError::Io(e))
            }
            Err(_) => {
                debug!("Timeout waiting for first bytes");
                Err(HandshakeError::Timeout.into())
            }
        }
    }
}
