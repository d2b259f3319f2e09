//! Configuration loading functionality
//!
//! Layers are applied lowest priority first:
//! defaults, JSON file, `WSGATE_*` environment, command line.

use std::env;
use std::fs;
use std::path::Path;
use std::str::FromStr;

use log::{debug, info};

use crate::common::parse_socket_addr;
use crate::config::defaults::ENV_PREFIX;
use crate::config::error::{ConfigError, Result};
use crate::config::types::{ConfigValues, GatewayConfig, ValueSource};
use crate::config::validator::validate_config;

impl ConfigValues {
    /// Load a layer from a JSON file
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::FileNotFound` if the file is missing, and a
    /// read or parse error otherwise.
    pub fn from_file(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Err(ConfigError::FileNotFound(path.to_path_buf()));
        }

        let content = fs::read_to_string(path)
            .map_err(|e| ConfigError::FileReadError(path.to_path_buf(), e.to_string()))?;

        serde_json::from_str(&content).map_err(|e| {
            ConfigError::ParseError(format!("Failed to parse JSON config file {}: {}", path.display(), e))
        })
    }

    /// Load a layer from `WSGATE_*` environment variables
    ///
    /// Unset variables leave the field unset. A variable that is set but
    /// cannot be parsed is an error.
    pub fn from_env() -> Result<Self> {
        let get_env = |name: &str| -> Option<String> {
            env::var(format!("{}{}", ENV_PREFIX, name)).ok()
        };

        fn parse<T: FromStr>(name: &str, value: String) -> Result<T> {
            value.trim().parse::<T>().map_err(|_| {
                ConfigError::InvalidValue(name.to_lowercase(), format!("cannot parse '{}'", value))
            })
        }

        let listen = get_env("LISTEN")
            .map(|value| {
                parse_socket_addr(&value)
                    .map_err(|e| ConfigError::InvalidValue("listen".to_string(), e.to_string()))
            })
            .transpose()?;

        Ok(Self {
            listen,
            target: get_env("TARGET"),
            cert: get_env("CERT").map(Into::into),
            key: get_env("KEY").map(Into::into),
            ssl_only: get_env("SSL_ONLY").map(|v| parse("SSL_ONLY", v)).transpose()?,
            record: get_env("RECORD").map(Into::into),
            log_level: get_env("LOG_LEVEL"),
            buffer_size: get_env("BUFFER_SIZE").map(|v| parse("BUFFER_SIZE", v)).transpose()?,
            handshake_timeout: get_env("HANDSHAKE_TIMEOUT")
                .map(|v| parse("HANDSHAKE_TIMEOUT", v))
                .transpose()?,
            connection_timeout: get_env("CONNECTION_TIMEOUT")
                .map(|v| parse("CONNECTION_TIMEOUT", v))
                .transpose()?,
            foreground: get_env("FOREGROUND").map(|v| parse("FOREGROUND", v)).transpose()?,
        })
    }
}

impl GatewayConfig {
    /// Build the final configuration from every layer and validate it
    ///
    /// # Parameters
    ///
    /// * `config_file` - Optional JSON file layer
    /// * `use_env` - Apply the `WSGATE_*` environment layer
    /// * `cli` - Values given on the command line
    pub fn load(config_file: Option<&Path>, use_env: bool, cli: &ConfigValues) -> Result<Self> {
        let mut config = GatewayConfig::default();
        debug!("Starting with default configuration");

        if let Some(path) = config_file {
            info!("Loading configuration from {}", path.display());
            let file_values = ConfigValues::from_file(path)?;
            config = config.merge(&file_values, ValueSource::File);
            config.config_file = Some(path.to_path_buf());
        }

        if use_env {
            let env_values = ConfigValues::from_env()?;
            if env_values != ConfigValues::default() {
                info!("Applying configuration from environment variables");
                config = config.merge(&env_values, ValueSource::Environment);
            } else {
                debug!("No {}* environment variables set", ENV_PREFIX);
            }
        }

        config = config.merge(cli, ValueSource::CommandLine);

        validate_config(&config)?;
        Ok(config)
    }
}
