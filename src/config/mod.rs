//! Configuration module
//!
//! This module handles gateway configuration, including loading from
//! different sources (files, environment variables, command line arguments)
//! and validating the result.

mod defaults;
mod error;
mod loader;
mod types;
mod validator;

pub use defaults::{ENV_PREFIX, CERT_PATH_STR, LOG_LEVEL_STR, TARGET_STR, MIN_BUFFER_SIZE};
pub use error::ConfigError;
pub use types::{ConfigValues, GatewayConfig, ValueSource};
pub use validator::{check_warnings, validate_config};
