//! Default configuration values
//!
//! Single source of truth for defaults, shared by the config types and the
//! command line.

use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::path::PathBuf;

/// Environment variable prefix for all configuration options
pub const ENV_PREFIX: &str = "WSGATE_";

/// Default listen port
pub const LISTEN_PORT: u16 = 8080;

/// Default target address as a string
pub const TARGET_STR: &str = "127.0.0.1:5900";

/// Default certificate path as string
pub const CERT_PATH_STR: &str = "self.pem";

/// Default log level as string
pub const LOG_LEVEL_STR: &str = "info";

/// Default relay buffer size (64KB)
pub const BUFFER_SIZE: usize = 65536;

/// Smallest accepted relay buffer
pub const MIN_BUFFER_SIZE: usize = 1024;

/// Default handshake timeout in seconds
pub const HANDSHAKE_TIMEOUT: u64 = 3;

/// Default target connect timeout in seconds
pub const CONNECTION_TIMEOUT: u64 = 30;

/// Default listen address, all interfaces
pub fn listen() -> SocketAddr {
    SocketAddr::new(IpAddr::V4(Ipv4Addr::UNSPECIFIED), LISTEN_PORT)
}

/// Default target address
pub fn target() -> String {
    TARGET_STR.to_string()
}

/// Default certificate path
pub fn cert_path() -> PathBuf {
    PathBuf::from(CERT_PATH_STR)
}

/// Default log level
pub fn log_level() -> String {
    LOG_LEVEL_STR.to_string()
}
