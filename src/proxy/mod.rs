//! Gateway service module
//!
//! The server accepts connections and hands each one to the handler, which
//! negotiates the WebSocket handshake and then runs a relay between the
//! client and the target until either side goes away.

mod handler;
mod record;
mod relay;
mod server;

pub use handler::{handle_connection, ConnectionContext, GatewaySettings};
pub use record::{Direction, RecordSink};
pub use relay::{CloseReason, ProxyRelay, RelayStats, RELAY_TICK};
pub use server::{Gateway, GatewayHandle, DRAIN_TIMEOUT};
