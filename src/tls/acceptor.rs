//! TLS acceptor creation

use log::{debug, info};
use openssl::ssl::{SslAcceptor, SslFiletype, SslMethod, SslVerifyMode, SslVersion};
use std::path::Path;

use crate::common::Result;

/// Create the TLS acceptor for `wss://` clients
///
/// The certificate file may also carry the private key, in which case `key_path`
/// can be omitted. Client certificates are never requested.
///
/// # Parameters
///
/// * `cert_path` - PEM certificate (optionally followed by its key)
/// * `key_path` - Separate PEM private key, if any
///
/// # Example
///
/// ```no_run
/// # use std::path::Path;
/// # use wsgate::tls::create_tls_acceptor;
/// # fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let acceptor = create_tls_acceptor(Path::new("self.pem"), None)?;
/// # Ok(())
/// # }
/// ```
pub fn create_tls_acceptor(cert_path: &Path, key_path: Option<&Path>) -> Result<SslAcceptor> {
    let mut acceptor = SslAcceptor::mozilla_intermediate_v5(SslMethod::tls_server())?;

    // Browsers of the hixie era may still speak TLS 1.0
    acceptor.set_min_proto_version(Some(SslVersion::TLS1))?;

    let key_path = key_path.unwrap_or(cert_path);
    debug!("Loading certificate {} and key {}", cert_path.display(), key_path.display());

    acceptor.set_certificate_file(cert_path, SslFiletype::PEM)?;
    acceptor.set_private_key_file(key_path, SslFiletype::PEM)?;
    acceptor.check_private_key()?;

    acceptor.set_verify(SslVerifyMode::NONE);
    info!("TLS enabled with certificate {}", cert_path.display());

    Ok(acceptor.build())
}
