//! TLS handling module
//!
//! This module builds the server-side acceptor used for `wss://` clients and
//! reads the certificate details logged at startup.

mod acceptor;
mod cert;

pub use acceptor::create_tls_acceptor;
pub use cert::{get_cert_fingerprint, get_cert_subject, load_cert};
