//! WebSocket frame codec
//!
//! Converts between raw bytes and hixie-era WebSocket frames: a `0x00`
//! start marker, a text payload, and a `0xFF` end marker. The payload is
//! either base64 text or the legacy escaped form where every byte is made
//! UTF-8 safe.

mod escaped;
mod frame;

pub use frame::{DecodeSummary, FrameCodec, FRAME_END, FRAME_START};

use std::fmt;
use thiserror::Error;

/// `u64::MAX` in decimal plus the colon
const MAX_SEQ_PREFIX: usize = 21;

/// Payload transformation used inside each frame
///
/// Fixed for the lifetime of a connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameDialect {
    /// Payload is base64 text
    Base64,
    /// Payload bytes are escaped into two-byte UTF-8 sequences when needed
    LegacyEscaped,
}

impl FrameDialect {
    /// Largest raw chunk whose encoded frame fits `buffer_size` bytes
    ///
    /// Leaves 20 bytes for the frame markers and a sequence number prefix.
    pub fn max_payload(self, buffer_size: usize) -> usize {
        let usable = match self {
            FrameDialect::Base64 => buffer_size * 3 / 4,
            FrameDialect::LegacyEscaped => buffer_size / 2,
        };
        usable.saturating_sub(20)
    }

    /// Upper bound on the encoded size of `len` raw bytes
    ///
    /// Includes both markers and the longest possible `"<seq>:"` prefix.
    pub fn encoded_len_bound(self, len: usize) -> usize {
        let body = match self {
            FrameDialect::Base64 => len.div_ceil(3) * 4,
            FrameDialect::LegacyEscaped => len * 2,
        };
        body + 2 + MAX_SEQ_PREFIX
    }
}

impl fmt::Display for FrameDialect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FrameDialect::Base64 => write!(f, "base64"),
            FrameDialect::LegacyEscaped => write!(f, "escaped"),
        }
    }
}

/// Frame decoding errors
///
/// Any of these ends the connection; decoded output is discarded.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FrameError {
    /// Buffer does not begin with `0x00`
    #[error("frame does not start with 0x00")]
    MissingStartMarker,

    /// Buffer does not end with `0xFF`
    #[error("frame does not end with 0xff")]
    MissingEndMarker,

    /// A frame was followed by something other than another frame
    #[error("expected frame start at offset {0}")]
    MissingTerminator(usize),

    /// Base64 payload could not be decoded
    #[error("invalid base64 payload: {0}")]
    Base64(String),

    /// Escaped payload contains a byte that is not a known escape
    #[error("invalid escape byte {0:#04x}")]
    InvalidEscape(u8),

    /// Escaped payload ends in the middle of an escape
    #[error("escape sequence truncated")]
    TruncatedEscape,
}
