//! Configuration types
//!
//! This module contains the main configuration types used throughout the application.

use std::collections::HashMap;
use std::net::SocketAddr;
use std::ops::Deref;
use std::path::{Path, PathBuf};
use std::time::Duration;

use log::debug;
use serde::{Deserialize, Deserializer, Serialize};

use crate::common::parse_socket_addr;
use crate::config::defaults;

/// Source of a configuration value
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ValueSource {
    /// Default value
    Default,
    /// From configuration file
    File,
    /// From environment variable
    Environment,
    /// From command line argument
    CommandLine,
}

impl std::fmt::Display for ValueSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ValueSource::Default => write!(f, "default"),
            ValueSource::File => write!(f, "file"),
            ValueSource::Environment => write!(f, "environment"),
            ValueSource::CommandLine => write!(f, "command line"),
        }
    }
}

/// Custom deserializer for `[host:]port` listen addresses
fn deserialize_socket_addr<'de, D>(deserializer: D) -> std::result::Result<Option<SocketAddr>, D::Error>
where
    D: Deserializer<'de>,
{
    let s = Option::<String>::deserialize(deserializer)?;
    match s {
        Some(addr_str) => parse_socket_addr(&addr_str)
            .map(Some)
            .map_err(serde::de::Error::custom),
        None => Ok(None),
    }
}

/// One configuration layer
///
/// Every field is optional; a layer only overrides what it sets.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ConfigValues {
    // --- Network settings ---

    /// Listen address (`[host:]port`)
    #[serde(default, deserialize_with = "deserialize_socket_addr")]
    pub listen: Option<SocketAddr>,

    /// Target address (`host:port`), resolved per connection
    #[serde(default)]
    pub target: Option<String>,

    // --- TLS settings ---

    /// PEM certificate, may also hold the private key
    #[serde(default)]
    pub cert: Option<PathBuf>,

    /// Separate PEM private key
    #[serde(default)]
    pub key: Option<PathBuf>,

    /// Refuse plaintext clients
    #[serde(default)]
    pub ssl_only: Option<bool>,

    // --- General settings ---

    /// Frame recording file
    #[serde(default)]
    pub record: Option<PathBuf>,

    /// Log level (error, warn, info, debug, trace)
    #[serde(default)]
    pub log_level: Option<String>,

    /// Capacity of each relay buffer in bytes
    #[serde(default)]
    pub buffer_size: Option<usize>,

    /// Seconds to wait for handshake data
    #[serde(default)]
    pub handshake_timeout: Option<u64>,

    /// Seconds to wait for the target to accept
    #[serde(default)]
    pub connection_timeout: Option<u64>,

    /// Stay in the foreground
    #[serde(default)]
    pub foreground: Option<bool>,
}

/// Gateway configuration
///
/// The merged result of every layer, with the source of each value tracked
/// for logging.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GatewayConfig {
    /// Configuration values
    pub values: ConfigValues,

    /// Configuration file path
    pub config_file: Option<PathBuf>,

    /// Source tracking for configuration values
    pub sources: HashMap<String, ValueSource>,
}

impl Deref for GatewayConfig {
    type Target = ConfigValues;

    fn deref(&self) -> &Self::Target {
        &self.values
    }
}

impl Default for GatewayConfig {
    fn default() -> Self {
        let mut config = Self {
            values: ConfigValues::default(),
            config_file: None,
            sources: HashMap::new(),
        };

        // Apply default values and track their source
        config.set_default_values();

        config
    }
}

impl GatewayConfig {
    /// Fill every unset value with its default
    pub fn set_default_values(&mut self) {
        macro_rules! default_field {
            ($name:ident, $value:expr) => {
                if self.values.$name.is_none() {
                    self.values.$name = Some($value);
                    self.sources.insert(stringify!($name).to_string(), ValueSource::Default);
                }
            };
        }

        default_field!(listen, defaults::listen());
        default_field!(target, defaults::target());
        default_field!(cert, defaults::cert_path());
        default_field!(ssl_only, false);
        default_field!(log_level, defaults::log_level());
        default_field!(buffer_size, defaults::BUFFER_SIZE);
        default_field!(handshake_timeout, defaults::HANDSHAKE_TIMEOUT);
        default_field!(connection_timeout, defaults::CONNECTION_TIMEOUT);
        default_field!(foreground, false);
    }

    /// Get the source of a configuration value
    pub fn source(&self, name: &str) -> String {
        self.sources
            .get(name)
            .map_or_else(|| "unknown".to_string(), |source| source.to_string())
    }

    /// Get the listen address
    pub fn listen(&self) -> SocketAddr {
        self.values.listen.unwrap_or_else(defaults::listen)
    }

    /// Get the target address
    pub fn target(&self) -> &str {
        self.values.target.as_deref().unwrap_or(defaults::TARGET_STR)
    }

    /// Get the certificate path
    pub fn cert(&self) -> &Path {
        self.values.cert.as_deref().unwrap_or_else(|| Path::new(defaults::CERT_PATH_STR))
    }

    /// Get the separate private key path
    pub fn key(&self) -> Option<&Path> {
        self.values.key.as_deref()
    }

    /// Whether plaintext clients are refused
    pub fn ssl_only(&self) -> bool {
        self.values.ssl_only.unwrap_or(false)
    }

    /// Get the recording file path
    pub fn record(&self) -> Option<&Path> {
        self.values.record.as_deref()
    }

    /// Get the log level
    pub fn log_level(&self) -> &str {
        self.values.log_level.as_deref().unwrap_or(defaults::LOG_LEVEL_STR)
    }

    /// Get the relay buffer size
    pub fn buffer_size(&self) -> usize {
        self.values.buffer_size.unwrap_or(defaults::BUFFER_SIZE)
    }

    /// Get the handshake timeout
    pub fn handshake_timeout(&self) -> Duration {
        Duration::from_secs(self.values.handshake_timeout.unwrap_or(defaults::HANDSHAKE_TIMEOUT))
    }

    /// Get the target connect timeout
    pub fn connection_timeout(&self) -> Duration {
        Duration::from_secs(self.values.connection_timeout.unwrap_or(defaults::CONNECTION_TIMEOUT))
    }

    /// Whether the foreground flag was given
    pub fn foreground(&self) -> bool {
        self.values.foreground.unwrap_or(false)
    }

    /// TLS is offered iff the certificate file exists
    pub fn tls_enabled(&self) -> bool {
        self.cert().is_file()
    }

    /// Get the configuration file path
    pub fn config_file(&self) -> Option<&Path> {
        self.config_file.as_deref()
    }

    /// Merge a layer on top of this configuration
    ///
    /// Values set in `other` win.
    pub fn merge(&self, other: &ConfigValues, source: ValueSource) -> Self {
        let mut result = self.clone();

        macro_rules! merge_field {
            ($name:ident) => {
                if other.$name.is_some() {
                    result.values.$name = other.$name.clone();
                    result.sources.insert(stringify!($name).to_string(), source);
                }
            };
        }

        merge_field!(listen);
        merge_field!(target);
        merge_field!(cert);
        merge_field!(key);
        merge_field!(ssl_only);
        merge_field!(record);
        merge_field!(log_level);
        merge_field!(buffer_size);
        merge_field!(handshake_timeout);
        merge_field!(connection_timeout);
        merge_field!(foreground);

        result
    }

    /// Log the configuration
    pub fn log(&self) {
        debug!("=== Configuration ===");
        debug!("  Listen address: {} (from {})", self.listen(), self.source("listen"));
        debug!("  Target address: {} (from {})", self.target(), self.source("target"));
        debug!("  Certificate: {} (from {})", self.cert().display(), self.source("cert"));
        if let Some(key) = self.key() {
            debug!("  Private key: {} (from {})", key.display(), self.source("key"));
        }
        debug!("  SSL only: {} (from {})", self.ssl_only(), self.source("ssl_only"));
        if let Some(record) = self.record() {
            debug!("  Recording: {} (from {})", record.display(), self.source("record"));
        }
        debug!("  Log level: {} (from {})", self.log_level(), self.source("log_level"));
        debug!("  Buffer size: {} bytes (from {})", self.buffer_size(), self.source("buffer_size"));
        debug!("  Handshake timeout: {:?} (from {})", self.handshake_timeout(), self.source("handshake_timeout"));
        debug!("  Connection timeout: {:?} (from {})", self.connection_timeout(), self.source("connection_timeout"));

        if let Some(file) = self.config_file() {
            debug!("  Configuration file: {}", file.display());
        }

        debug!("=====================");
    }
}
