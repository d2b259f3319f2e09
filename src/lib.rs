//! wsgate: WebSocket to TCP gateway
//!
//! This library lets a browser WebSocket client talk to a plain TCP service
//! (a VNC server, for example) that knows nothing about WebSockets. It
//! terminates the hixie-75/hixie-76 handshake and the `0x00 ... 0xFF`
//! framing on the client side and relays raw bytes to the target.
//!
//! # Main Features
//!
//! - hixie-75 and hixie-76 handshakes, including the MD5 challenge
//! - base64 and legacy escaped frame payloads, optional sequence numbers
//! - optional TLS on the client leg, auto-detected per connection
//! - Flash cross-domain policy responder
//! - frame recording for later replay
//!
//! # Example
//!
//! ```no_run
//! use wsgate::{Gateway, GatewayConfig, Result};
//!
//! #[tokio::main]
//! async fn main() -> Result<()> {
//!     let config = GatewayConfig::default();
//!     let gateway = Gateway::bind(&config).await?;
//!
//!     let handle = gateway.start();
//!     tokio::signal::ctrl_c().await?;
//!     handle.shutdown();
//!     handle.join().await
//! }
//! ```

// Public modules
pub mod codec;
pub mod common;
pub mod config;
pub mod protocol;
pub mod proxy;
pub mod tls;
pub mod transport;

// Re-export commonly used structures and functions for convenience
pub use codec::{FrameCodec, FrameDialect, FrameError};
pub use common::{GatewayError, Result, parse_socket_addr};
pub use config::GatewayConfig;
pub use protocol::HandshakeError;
pub use proxy::{Gateway, GatewayHandle, ProxyRelay};
pub use tls::create_tls_acceptor;
pub use transport::TransportChannel;

/// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Application name
pub const APP_NAME: &str = env!("CARGO_PKG_NAME");
