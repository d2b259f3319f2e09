//! Frame encoder/decoder

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use bytes::{BufMut, BytesMut};
use log::trace;

use super::escaped::{escape, unescape};
use super::{FrameDialect, FrameError};

/// First byte of every frame
pub const FRAME_START: u8 = 0x00;

/// Last byte of every frame
pub const FRAME_END: u8 = 0xFF;

/// Result of decoding one buffer of concatenated frames
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DecodeSummary {
    /// Number of raw bytes appended to the output
    pub bytes: usize,
    /// Number of frames the buffer contained
    pub frames: usize,
}

/// Per-connection frame codec
///
/// Holds the negotiated dialect and, when the client asked for it, the
/// outbound sequence counter.
#[derive(Debug, Clone)]
pub struct FrameCodec {
    dialect: FrameDialect,
    seq_num: Option<u64>,
}

impl FrameCodec {
    /// Create a codec for `dialect`
    ///
    /// # Parameters
    ///
    /// * `dialect` - Payload transformation
    /// * `sequence` - Prefix every outbound payload with `"<n>:"`, counting from 0
    pub fn new(dialect: FrameDialect, sequence: bool) -> Self {
        Self {
            dialect,
            seq_num: sequence.then_some(0),
        }
    }

    /// The negotiated dialect
    pub fn dialect(&self) -> FrameDialect {
        self.dialect
    }

    /// Encode `payload` as a single frame appended to `dst`
    ///
    /// Returns the number of bytes appended.
    pub fn encode(&mut self, payload: &[u8], dst: &mut BytesMut) -> usize {
        let before = dst.len();
        dst.reserve(self.dialect.encoded_len_bound(payload.len()));

        dst.put_u8(FRAME_START);
        if let Some(seq) = self.seq_num.as_mut() {
            dst.put_slice(format!("{}:", seq).as_bytes());
            *seq += 1;
        }

        match self.dialect {
            FrameDialect::Base64 => dst.put_slice(STANDARD.encode(payload).as_bytes()),
            FrameDialect::LegacyEscaped => escape(payload, dst),
        }

        dst.put_u8(FRAME_END);
        dst.len() - before
    }

    /// Decode every frame in `src`, appending the raw payloads to `dst`
    ///
    /// `src` must start with `0x00`, end with `0xFF`, and consist only of
    /// back-to-back frames. On error nothing is appended to `dst`.
    pub fn decode(&self, src: &[u8], dst: &mut BytesMut) -> Result<DecodeSummary, FrameError> {
        let before = dst.len();
        let result = self.decode_frames(src, dst);
        if result.is_err() {
            dst.truncate(before);
        }
        result.map(|frames| DecodeSummary {
            bytes: dst.len() - before,
            frames,
        })
    }

    fn decode_frames(&self, src: &[u8], dst: &mut BytesMut) -> Result<usize, FrameError> {
        if src.first() != Some(&FRAME_START) {
            return Err(FrameError::MissingStartMarker);
        }
        if src.len() < 2 || src.last() != Some(&FRAME_END) {
            return Err(FrameError::MissingEndMarker);
        }

        let last = src.len() - 1;
        let mut start = 1;
        let mut frames = 0;

        loop {
            let end = src[start..]
                .iter()
                .position(|&b| b == FRAME_END)
                .map(|offset| start + offset)
                .ok_or(FrameError::MissingEndMarker)?;

            self.decode_payload(&src[start..end], dst)?;
            frames += 1;

            if end == last {
                break;
            }

            // Another frame must follow immediately
            if src[end + 1] != FRAME_START {
                return Err(FrameError::MissingTerminator(end + 1));
            }
            start = end + 2;
        }

        if frames > 1 {
            trace!("Decoded {} coalesced frames", frames);
        }
        Ok(frames)
    }

    fn decode_payload(&self, payload: &[u8], dst: &mut BytesMut) -> Result<(), FrameError> {
        match self.dialect {
            FrameDialect::Base64 => {
                let decoded = STANDARD
                    .decode(payload)
                    .map_err(|e| FrameError::Base64(e.to_string()))?;
                dst.extend_from_slice(&decoded);
                Ok(())
            }
            FrameDialect::LegacyEscaped => unescape(payload, dst),
        }
    }
}
