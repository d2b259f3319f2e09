//! Configuration errors
//!
//! This module defines error types for the configuration module.

use std::error::Error;
use std::fmt;
use std::path::PathBuf;

/// Configuration error type
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    /// File not found
    FileNotFound(PathBuf),

    /// Error reading file
    FileReadError(PathBuf, String),

    /// Error parsing configuration
    ParseError(String),

    /// Invalid value for configuration option
    InvalidValue(String, String),

    /// Invalid combination of configuration options
    InvalidCombination(String),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::FileNotFound(path) =>
                write!(f, "File not found: {}", path.display()),

            ConfigError::FileReadError(path, err) =>
                write!(f, "Error reading configuration file {}: {}", path.display(), err),

            ConfigError::ParseError(msg) =>
                write!(f, "Error parsing configuration: {}", msg),

            ConfigError::InvalidValue(name, msg) =>
                write!(f, "Invalid value for '{}': {}", name, msg),

            ConfigError::InvalidCombination(msg) =>
                write!(f, "Invalid combination of configuration options: {}", msg),
        }
    }
}

impl Error for ConfigError {}

/// Result type alias for configuration operations
pub type Result<T> = std::result::Result<T, ConfigError>;

impl From<serde_json::Error> for ConfigError {
    fn from(err: serde_json::Error) -> Self {
        ConfigError::ParseError(err.to_string())
    }
}

// Convert to crate's common error type
impl From<ConfigError> for crate::common::GatewayError {
    fn from(err: ConfigError) -> Self {
        crate::common::GatewayError::Config(err.to_string())
    }
}
