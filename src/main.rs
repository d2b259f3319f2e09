//! wsgate command line tool
//!
//! This binary is the command-line interface for the wsgate WebSocket to
//! TCP gateway.

use clap::Parser;
use log::{info, warn};
use std::path::PathBuf;

use wsgate::common::{init_logger, parse_socket_addr, GatewayError, Result};
use wsgate::config::{check_warnings, ConfigValues};
use wsgate::tls::{get_cert_fingerprint, get_cert_subject};
use wsgate::{Gateway, GatewayConfig, APP_NAME, VERSION};

/// wsgate: relay WebSocket clients to a plain TCP service
#[derive(Parser, Debug)]
#[clap(author, version = VERSION, about, long_about = None)]
struct Args {
    /// Listen address, `[host:]port`
    listen: Option<String>,

    /// Target service address, `host:port`
    target: Option<String>,

    /// Record frames to this file
    #[clap(long)]
    record: Option<PathBuf>,

    /// SSL certificate file (may also contain the key)
    #[clap(long)]
    cert: Option<PathBuf>,

    /// SSL private key file, if not part of the certificate file
    #[clap(long)]
    key: Option<PathBuf>,

    /// Refuse non-SSL (ws://) clients
    #[clap(long)]
    ssl_only: bool,

    /// Stay in the foreground
    #[clap(short, long)]
    foreground: bool,

    /// Load configuration from a JSON file
    #[clap(long)]
    config_file: Option<PathBuf>,

    /// Load configuration from WSGATE_* environment variables
    #[clap(long)]
    from_env: bool,

    /// Log level
    #[clap(long)]
    log_level: Option<String>,

    /// Capacity of each relay buffer in bytes
    #[clap(long)]
    buffer_size: Option<usize>,

    /// Seconds to wait for the client handshake
    #[clap(long)]
    handshake_timeout: Option<u64>,

    /// Seconds to wait for the target to accept
    #[clap(long)]
    connection_timeout: Option<u64>,
}

impl Args {
    /// Command line layer: only what was actually given
    fn values(&self) -> Result<ConfigValues> {
        let listen = self.listen.as_deref().map(parse_socket_addr).transpose()?;

        Ok(ConfigValues {
            listen,
            target: self.target.clone(),
            cert: self.cert.clone(),
            key: self.key.clone(),
            ssl_only: self.ssl_only.then_some(true),
            record: self.record.clone(),
            log_level: self.log_level.clone(),
            buffer_size: self.buffer_size,
            handshake_timeout: self.handshake_timeout,
            connection_timeout: self.connection_timeout,
            foreground: self.foreground.then_some(true),
        })
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // Parse command line arguments
    let args = Args::parse();
    let cli = args.values()?;

    let config = GatewayConfig::load(args.config_file.as_deref(), args.from_env, &cli)
        .map_err(GatewayError::from)?;

    init_logger(config.log_level());
    info!("Starting {} v{}", APP_NAME, VERSION);
    config.log();

    for warning in check_warnings(&config) {
        warn!("{}", warning);
    }

    if !config.foreground() {
        info!("Daemonizing is not supported, staying in the foreground");
    }

    if config.tls_enabled() {
        info!("Using certificate: {}", config.cert().display());

        match get_cert_subject(config.cert()) {
            Ok(subject) => info!("Certificate subject: {}", subject),
            Err(e) => warn!("Unable to get certificate subject: {}", e),
        }

        match get_cert_fingerprint(config.cert()) {
            Ok(fingerprint) => info!("Certificate fingerprint: {}", fingerprint),
            Err(e) => warn!("Unable to get certificate fingerprint: {}", e),
        }
    }

    let gateway = Gateway::bind(&config).await?;
    let handle = gateway.start();

    info!("Gateway ready, press Ctrl+C to stop");
    tokio::signal::ctrl_c().await?;

    info!("Received Ctrl+C, shutting down");
    handle.shutdown();
    handle.join().await
}
