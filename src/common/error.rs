//! Error handling module
//!
//! This module defines the error types and result type aliases used in the application.

use thiserror::Error;
use std::io;

use crate::codec::FrameError;
use crate::protocol::HandshakeError;

/// Gateway error type
///
/// Only `Config` (and a failure to bind the listen socket, reported as `Io`)
/// is fatal to the process. Everything else ends a single connection.
#[derive(Error, Debug)]
pub enum GatewayError {
    /// IO error (peer reset, broken pipe, read/write failure)
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    /// OpenSSL error
    #[error("OpenSSL error: {0}")]
    Ssl(#[from] openssl::error::ErrorStack),

    /// TLS handshake error
    #[error("TLS handshake error: {0}")]
    TlsHandshake(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// WebSocket handshake error
    #[error("Handshake error: {0}")]
    Handshake(#[from] HandshakeError),

    /// WebSocket framing error
    #[error("Framing error: {0}")]
    Framing(#[from] FrameError),

    /// A payload did not fit the buffer reserved for it
    #[error("Resource error: {0}")]
    Resource(String),

    /// Other error
    #[error("Other error: {0}")]
    Other(String),
}

impl GatewayError {
    /// Whether this error ends only the current connection
    pub fn is_connection_scoped(&self) -> bool {
        !matches!(self, GatewayError::Config(_))
    }
}

/// Result type alias
///
/// This is a `Result` type alias that uses our custom `GatewayError`.
pub type Result<T> = std::result::Result<T, GatewayError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_conversion() {
        // Test IO error conversion
        let io_err = io::Error::new(io::ErrorKind::BrokenPipe, "pipe closed");
        let gateway_err: GatewayError = io_err.into();

        match gateway_err {
            GatewayError::Io(e) => assert_eq!(e.kind(), io::ErrorKind::BrokenPipe),
            _ => panic!("Should convert to IO error"),
        }

        let frame_err: GatewayError = FrameError::MissingStartMarker.into();
        assert!(matches!(frame_err, GatewayError::Framing(_)));

        let hs_err: GatewayError = HandshakeError::MissingHeader("Origin").into();
        assert!(matches!(hs_err, GatewayError::Handshake(_)));
    }

    #[test]
    fn test_error_display() {
        let err = GatewayError::Config("Invalid configuration".to_string());
        let err_str = format!("{}", err);
        assert!(err_str.contains("Invalid configuration"));

        let err = GatewayError::Handshake(HandshakeError::MissingHeader("Host"));
        assert!(err.to_string().contains("Host"));
    }

    #[test]
    fn test_connection_scope() {
        assert!(!GatewayError::Config("bad".into()).is_connection_scoped());
        assert!(GatewayError::Resource("full".into()).is_connection_scoped());
        assert!(GatewayError::Framing(FrameError::MissingEndMarker).is_connection_scoped());
    }
}
