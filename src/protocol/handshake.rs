//! WebSocket upgrade negotiation (hixie-75 and hixie-76)
//!
//! ```text
//! GET /websockify?b64encode HTTP/1.1
//! Host: example.com:6080
//! Origin: http://example.com
//! Sec-WebSocket-Key1: 4 @1  46546xW%0l 1 5
//! Sec-WebSocket-Key2: 12998 5 Y3 1  .P00
//!
//! ^n:ds[4U
//! ```
//!
//! A request carrying exactly eight bytes after the blank line is hixie-76
//! and must be answered with the MD5 challenge digest; anything else is
//! hixie-75. When a `Sec-WebSocket-Key1` header is present the negotiator
//! waits up to [`KEY3_WAIT`] after the headers for the challenge bytes, then
//! parses whatever it has.

use std::time::Duration;

use log::{debug, info};
use openssl::hash::{hash, MessageDigest};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::time::timeout;

use crate::common::Result;
use super::{ClientOptions, HandshakeError};

/// Largest handshake the negotiator will buffer
pub const MAX_HANDSHAKE_LEN: usize = 4096;

/// How long to wait for the hixie-76 challenge bytes once the headers are in
pub const KEY3_WAIT: Duration = Duration::from_millis(250);

const HEADER_END: &[u8] = b"\r\n\r\n";
const KEY1_HEADER: &str = "Sec-WebSocket-Key1";
const KEY2_HEADER: &str = "Sec-WebSocket-Key2";

/// Handshake dialect
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProtocolVersion {
    /// No challenge, unprefixed response headers
    Hixie75,
    /// MD5 challenge, `Sec-` prefixed response headers
    Hixie76,
}

impl ProtocolVersion {
    fn header_prefix(self) -> &'static str {
        match self {
            ProtocolVersion::Hixie75 => "",
            ProtocolVersion::Hixie76 => "Sec-",
        }
    }
}

impl std::fmt::Display for ProtocolVersion {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ProtocolVersion::Hixie75 => write!(f, "75"),
            ProtocolVersion::Hixie76 => write!(f, "76"),
        }
    }
}

/// hixie-76 challenge material
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChallengeKeys {
    pub key1: String,
    pub key2: String,
    pub key3: [u8; 8],
}

/// Parsed upgrade request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HandshakeRequest {
    pub path: String,
    pub host: String,
    pub origin: String,
    /// Present iff the request is hixie-76
    pub keys: Option<ChallengeKeys>,
}

impl HandshakeRequest {
    /// Parse a raw upgrade request
    ///
    /// # Errors
    ///
    /// Returns a `HandshakeError` describing the first problem found.
    pub fn parse(raw: &[u8]) -> std::result::Result<Self, HandshakeError> {
        if !raw.starts_with(b"GET ") {
            return Err(HandshakeError::InvalidRequest("no GET request line".into()));
        }

        let header_end = find(raw, HEADER_END)
            .ok_or_else(|| HandshakeError::InvalidRequest("headers not terminated".into()))?;

        // Keep the CRLF of the last header so every value is CRLF-terminated
        let head = std::str::from_utf8(&raw[..header_end + 2])
            .map_err(|_| HandshakeError::InvalidRequest("headers are not valid UTF-8".into()))?;
        let body = &raw[header_end + HEADER_END.len()..];

        let (request_line, _) = head.split_once("\r\n").unwrap_or((head, ""));
        let path = request_line
            .strip_prefix("GET ")
            .and_then(|rest| rest.strip_suffix(" HTTP/1.1"))
            .ok_or_else(|| HandshakeError::InvalidRequest("request line is not GET <path> HTTP/1.1".into()))?;
        if path.is_empty() || path.contains(' ') {
            return Err(HandshakeError::InvalidRequest(format!("bad request path {:?}", path)));
        }
        let path = path.to_string();

        let host = header_value(head, "Host").ok_or(HandshakeError::MissingHeader("Host"))?;
        let origin = header_value(head, "Origin").ok_or(HandshakeError::MissingHeader("Origin"))?;

        let keys = match <[u8; 8]>::try_from(body) {
            Ok(key3) => {
                let key1 = header_value(head, KEY1_HEADER)
                    .ok_or(HandshakeError::MissingHeader(KEY1_HEADER))?;
                let key2 = header_value(head, KEY2_HEADER)
                    .ok_or(HandshakeError::MissingHeader(KEY2_HEADER))?;
                Some(ChallengeKeys {
                    key1: key1.to_string(),
                    key2: key2.to_string(),
                    key3,
                })
            }
            Err(_) => None,
        };

        Ok(Self {
            path,
            host: host.to_string(),
            origin: origin.to_string(),
            keys,
        })
    }

    /// Dialect of this request
    pub fn version(&self) -> ProtocolVersion {
        if self.keys.is_some() {
            ProtocolVersion::Hixie76
        } else {
            ProtocolVersion::Hixie75
        }
    }

    /// Client options selected by the request path
    pub fn options(&self) -> ClientOptions {
        ClientOptions::from_path(&self.path)
    }
}

fn find(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    haystack.windows(needle.len()).position(|w| w == needle)
}

/// Value of header `name`, matched case-sensitively
fn header_value<'a>(head: &'a str, name: &str) -> Option<&'a str> {
    let marker = format!("\r\n{}: ", name);
    let start = head.find(&marker)? + marker.len();
    let len = head[start..].find("\r\n")?;
    Some(&head[start..start + len])
}

/// Whether `buf` holds a full request
///
/// The headers must be terminated; if the client sent a hixie-76 key header,
/// the eight challenge bytes must have arrived as well.
pub fn is_complete(buf: &[u8]) -> bool {
    let Some(header_end) = find(buf, HEADER_END) else {
        return false;
    };
    let body_len = buf.len() - header_end - HEADER_END.len();
    let expects_key3 = find(&buf[..header_end + 2], format!("\r\n{}: ", KEY1_HEADER).as_bytes()).is_some();

    !expects_key3 || body_len >= 8
}

/// Turn one challenge key into its number: digits / spaces
fn key_number(key: &str) -> std::result::Result<u32, HandshakeError> {
    let spaces = key.bytes().filter(|&b| b == b' ').count() as u64;
    if spaces == 0 {
        return Err(HandshakeError::InvalidKey(format!("no spaces in {:?}", key)));
    }

    let mut digits = key.bytes().filter(u8::is_ascii_digit).peekable();
    if digits.peek().is_none() {
        return Err(HandshakeError::InvalidKey(format!("no digits in {:?}", key)));
    }

    let numeric = digits.try_fold(0u64, |acc, d| {
        acc.checked_mul(10)?.checked_add(u64::from(d - b'0'))
    });
    let numeric = numeric.ok_or_else(|| HandshakeError::InvalidKey(format!("{:?} overflows", key)))?;

    u32::try_from(numeric / spaces)
        .map_err(|_| HandshakeError::InvalidKey(format!("{:?} exceeds 32 bits", key)))
}

/// Compute the hixie-76 challenge response
///
/// MD5 over `num1 (BE u32) || num2 (BE u32) || key3`.
///
/// # Errors
///
/// Returns `HandshakeError::InvalidKey` when a key has no spaces, no digits,
/// or a quotient that does not fit 32 bits.
pub fn gen_challenge(key1: &str, key2: &str, key3: &[u8; 8]) -> std::result::Result<[u8; 16], HandshakeError> {
    let num1 = key_number(key1)?;
    let num2 = key_number(key2)?;

    let mut input = [0u8; 16];
    input[..4].copy_from_slice(&num1.to_be_bytes());
    input[4..8].copy_from_slice(&num2.to_be_bytes());
    input[8..].copy_from_slice(key3);

    let digest = hash(MessageDigest::md5(), &input)
        .map_err(|e| HandshakeError::InvalidKey(format!("MD5 unavailable: {}", e)))?;

    let mut challenge = [0u8; 16];
    challenge.copy_from_slice(&digest);
    Ok(challenge)
}

/// Build the server's upgrade response
///
/// `Location` echoes `scheme://host path` exactly as received.
pub fn build_response(request: &HandshakeRequest, scheme: &str) -> std::result::Result<Vec<u8>, HandshakeError> {
    let version = request.version();
    let pre = version.header_prefix();

    let mut response = format!(
        "HTTP/1.1 101 Web Socket Protocol Handshake\r\n\
         Upgrade: WebSocket\r\n\
         Connection: Upgrade\r\n\
         {pre}WebSocket-Origin: {origin}\r\n\
         {pre}WebSocket-Location: {scheme}://{host}{path}\r\n\
         {pre}WebSocket-Protocol: sample\r\n\
         \r\n",
        pre = pre,
        origin = request.origin,
        scheme = scheme,
        host = request.host,
        path = request.path,
    )
    .into_bytes();

    if let Some(keys) = &request.keys {
        response.extend_from_slice(&gen_challenge(&keys.key1, &keys.key2, &keys.key3)?);
    }

    Ok(response)
}

/// Outcome of a successful negotiation
#[derive(Debug, Clone)]
pub struct Negotiated {
    pub request: HandshakeRequest,
    pub version: ProtocolVersion,
    pub options: ClientOptions,
}

/// Read the upgrade request from `channel`, answer it, and report the result
///
/// # Parameters
///
/// * `channel` - Client transport (plain or TLS)
/// * `scheme` - `ws` or `wss`, echoed in the `Location` header
/// * `wait` - Upper bound on the time spent gathering the request
pub async fn negotiate<S>(channel: &mut S, scheme: &str, wait: Duration) -> Result<Negotiated>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let raw = timeout(wait, read_request(channel))
        .await
        .map_err(|_| HandshakeError::Timeout)??;

    let request = HandshakeRequest::parse(&raw)?;
    let version = request.version();
    let options = request.options();
    let response = build_response(&request, scheme)?;

    info!("  using protocol version {}", version);
    if options.b64encode {
        info!("  b64encode=1");
    }
    if options.seq_num {
        info!("  seq_num=1");
    }

    channel.write_all(&response).await?;
    channel.flush().await?;

    Ok(Negotiated { request, version, options })
}

async fn read_request<S>(channel: &mut S) -> Result<Vec<u8>>
where
    S: AsyncRead + Unpin,
{
    let mut raw = Vec::with_capacity(1024);
    let mut chunk = [0u8; MAX_HANDSHAKE_LEN];

    loop {
        let room = MAX_HANDSHAKE_LEN - raw.len();
        let n = if find(&raw, HEADER_END).is_some() {
            match timeout(KEY3_WAIT, channel.read(&mut chunk[..room])).await {
                Ok(read) => read?,
                Err(_) => {
                    debug!("No challenge bytes after the headers, treating as hixie-75");
                    return Ok(raw);
                }
            }
        } else {
            channel.read(&mut chunk[..room]).await?
        };
        if n == 0 {
            if raw.is_empty() {
                return Err(HandshakeError::ClientClosed.into());
            }
            debug!("Client stopped sending after {} handshake bytes", raw.len());
            return Ok(raw);
        }

        raw.extend_from_slice(&chunk[..n]);
        if is_complete(&raw) {
            return Ok(raw);
        }
        if raw.len() == MAX_HANDSHAKE_LEN {
            return Err(HandshakeError::RequestTooLarge.into());
        }
    }
}
