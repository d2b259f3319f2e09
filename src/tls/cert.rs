//! Certificate inspection
//!
//! Used to log what the gateway will present to `wss://` clients.

use openssl::hash::MessageDigest;
use openssl::x509::X509;
use std::path::Path;

use crate::common::{GatewayError, Result};

/// Load the first certificate from a PEM file
///
/// # Errors
///
/// Returns an error if the file cannot be read or holds no certificate.
pub fn load_cert(cert_path: &Path) -> Result<X509> {
    let cert_data = std::fs::read(cert_path).map_err(|e| {
        GatewayError::Config(format!("Failed to read certificate {}: {}", cert_path.display(), e))
    })?;

    X509::from_pem(&cert_data)
        .map_err(|e| GatewayError::Config(format!("Failed to parse certificate: {}", e)))
}

/// Get certificate subject as `key=value` pairs
///
/// # Parameters
///
/// * `cert_path` - Path to the certificate file
///
/// # Returns
///
/// Returns the subject, e.g. `CN=localhost`
pub fn get_cert_subject(cert_path: &Path) -> Result<String> {
    let cert = load_cert(cert_path)?;

    let entries = cert
        .subject_name()
        .entries()
        .map(|entry| {
            let key = entry.object().nid().short_name().unwrap_or("?");
            let value = entry
                .data()
                .as_utf8()
                .map(|s| s.to_string())
                .unwrap_or_default();
            format!("{}={}", key, value)
        })
        .collect::<Vec<String>>();

    Ok(entries.join(", "))
}

/// Get the SHA-256 fingerprint as colon-separated hex
pub fn get_cert_fingerprint(cert_path: &Path) -> Result<String> {
    let cert = load_cert(cert_path)?;

    let fingerprint = cert.digest(MessageDigest::sha256())?;

    Ok(fingerprint
        .iter()
        .map(|b| format!("{:02x}", b))
        .collect::<Vec<String>>()
        .join(":"))
}
