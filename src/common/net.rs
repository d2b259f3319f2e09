//! Network utility functions
//!
//! This module provides address parsing for the listen and target settings.

use std::net::{IpAddr, Ipv4Addr, SocketAddr, ToSocketAddrs};
use std::str::FromStr;

use super::error::{GatewayError, Result};

/// Parse a socket address
///
/// Accepts `ip:port`, `hostname:port`, or a bare port, which binds on all
/// interfaces.
///
/// # Arguments
///
/// * `addr` - The address string to parse
///
/// # Returns
///
/// The parsed `SocketAddr`
pub fn parse_socket_addr(addr: &str) -> Result<SocketAddr> {
    let addr = addr.trim();

    // Bare port
    if !addr.is_empty() && addr.bytes().all(|b| b.is_ascii_digit()) {
        let port = u16::from_str(addr)
            .map_err(|e| GatewayError::Config(format!("Invalid port {}: {}", addr, e)))?;
        return Ok(SocketAddr::new(IpAddr::V4(Ipv4Addr::UNSPECIFIED), port));
    }

    // Try direct parsing first
    if let Ok(socket_addr) = SocketAddr::from_str(addr) {
        return Ok(socket_addr);
    }

    // Try using ToSocketAddrs trait
    match addr.to_socket_addrs() {
        Ok(mut addrs) => {
            if let Some(addr) = addrs.next() {
                Ok(addr)
            } else {
                Err(GatewayError::Config(format!("Failed to parse address: {}", addr)))
            }
        }
        Err(e) => Err(GatewayError::Config(format!("Failed to parse address {}: {}", addr, e))),
    }
}

/// Split a `host:port` target into its parts without resolving it
///
/// Resolution happens per connection so that a target which comes up after
/// the gateway starts is still reachable.
pub fn split_host_port(addr: &str) -> Result<(&str, u16)> {
    let (host, port) = addr
        .trim()
        .rsplit_once(':')
        .ok_or_else(|| GatewayError::Config(format!("Target must be host:port, got {}", addr)))?;

    let host = host.trim_start_matches('[').trim_end_matches(']');
    if host.is_empty() {
        return Err(GatewayError::Config(format!("Missing target host in {}", addr)));
    }

    let port = u16::from_str(port)
        .map_err(|e| GatewayError::Config(format!("Invalid target port in {}: {}", addr, e)))?;

    Ok((host, port))
}
