//! Configuration validator
//!
//! This module provides functionality for validating configuration.

use crate::common::split_host_port;
use crate::config::defaults::MIN_BUFFER_SIZE;
use crate::config::error::{ConfigError, Result};
use crate::config::types::GatewayConfig;

/// Validate the configuration
pub fn validate_config(config: &GatewayConfig) -> Result<()> {
    validate_network_settings(config)?;
    validate_tls_settings(config)?;
    validate_general_settings(config)?;

    Ok(())
}

/// Validate network settings
fn validate_network_settings(config: &GatewayConfig) -> Result<()> {
    split_host_port(config.target())
        .map_err(|e| ConfigError::InvalidValue("target".to_string(), e.to_string()))?;

    Ok(())
}

/// Validate certificate settings
fn validate_tls_settings(config: &GatewayConfig) -> Result<()> {
    if config.ssl_only() && !config.tls_enabled() {
        return Err(ConfigError::InvalidCombination(format!(
            "ssl_only requires the certificate {} to exist",
            config.cert().display()
        )));
    }

    if let Some(key) = config.key() {
        if !key.is_file() {
            return Err(ConfigError::FileNotFound(key.to_path_buf()));
        }
    }

    Ok(())
}

/// Validate general settings
fn validate_general_settings(config: &GatewayConfig) -> Result<()> {
    if config.buffer_size() < MIN_BUFFER_SIZE {
        return Err(ConfigError::InvalidValue(
            "buffer_size".to_string(),
            format!("Buffer size must be at least {} bytes", MIN_BUFFER_SIZE),
        ));
    }

    if config.handshake_timeout().is_zero() {
        return Err(ConfigError::InvalidValue(
            "handshake_timeout".to_string(),
            "Handshake timeout must be greater than 0".to_string(),
        ));
    }

    if config.connection_timeout().is_zero() {
        return Err(ConfigError::InvalidValue(
            "connection_timeout".to_string(),
            "Connection timeout must be greater than 0".to_string(),
        ));
    }

    Ok(())
}

/// Check configuration for non-fatal problems
pub fn check_warnings(config: &GatewayConfig) -> Vec<String> {
    let mut warnings = Vec::new();

    match config.log_level() {
        "error" | "warn" | "info" | "debug" | "trace" => {}
        level => {
            warnings.push(format!("Invalid log level '{}', using default 'info'", level));
        }
    }

    if !config.tls_enabled() {
        warnings.push(format!(
            "Certificate {} not found, wss:// clients will be refused",
            config.cert().display()
        ));
    }

    warnings
}
