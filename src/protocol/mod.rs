//! Protocol detection and WebSocket handshake module
//!
//! A new connection is first classified from its peeked bytes (empty, Flash
//! policy probe, TLS ClientHello, or plain text). Once the transport is
//! settled, the handshake negotiator reads the upgrade request, picks the
//! hixie-75 or hixie-76 dialect, and answers it.

mod detector;
mod handshake;
mod query;

pub use detector::{
    DetectionResult, HandshakeDetector, ProtocolDetector, POLICY_REQUEST, POLICY_RESPONSE,
};
pub use handshake::{
    build_response, gen_challenge, is_complete, negotiate, ChallengeKeys, HandshakeRequest,
    Negotiated, ProtocolVersion, MAX_HANDSHAKE_LEN,
};
pub use query::ClientOptions;

use thiserror::Error;

/// WebSocket handshake errors
///
/// Every variant aborts the connection it occurred on and nothing else.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum HandshakeError {
    /// No data arrived in time
    #[error("timed out waiting for client data")]
    Timeout,

    /// Client closed the connection before completing the handshake
    #[error("client closed during handshake")]
    ClientClosed,

    /// Request is not a well-formed upgrade request
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    /// A required header is absent
    #[error("missing header: {0}")]
    MissingHeader(&'static str),

    /// A hixie-76 challenge key cannot be turned into a number
    #[error("invalid challenge key: {0}")]
    InvalidKey(String),

    /// Plaintext client while only TLS is allowed
    #[error("non-TLS connection received but disallowed")]
    PlaintextDisallowed,

    /// TLS client while no certificate is configured
    #[error("TLS connection but no certificate available: {0}")]
    TlsUnavailable(String),

    /// Request did not fit the handshake buffer
    #[error("handshake exceeds 4096 bytes")]
    RequestTooLarge,
}
