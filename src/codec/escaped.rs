//! Legacy escaped payload form
//!
//! | raw byte | encoded |
//! | --- | --- |
//! | `0x00` | `0xC4 0x80` |
//! | `0x01..=0x7F` | unchanged |
//! | `0x80..=0xBF` | `0xC2 b` |
//! | `0xC0..=0xFF` | `0xC3 (b - 64)` |
//!
//! The encoded form never contains `0x00` or `0xFF`, so it can sit between
//! frame markers unmodified.

use bytes::{BufMut, BytesMut};

use super::FrameError;

pub(crate) fn escape(src: &[u8], dst: &mut BytesMut) {
    dst.reserve(src.len() * 2);
    for &b in src {
        match b {
            0x00 => dst.put_slice(&[0xC4, 0x80]),
            0x01..=0x7F => dst.put_u8(b),
            0x80..=0xBF => dst.put_slice(&[0xC2, b]),
            0xC0..=0xFF => dst.put_slice(&[0xC3, b - 64]),
        }
    }
}

pub(crate) fn unescape(src: &[u8], dst: &mut BytesMut) -> Result<(), FrameError> {
    dst.reserve(src.len());
    let mut bytes = src.iter().copied();

    while let Some(b) = bytes.next() {
        if b < 0x80 {
            dst.put_u8(b);
            continue;
        }

        let next = bytes.next().ok_or(FrameError::TruncatedEscape)?;
        match b {
            0xC2 | 0xC3 | 0xC4 => {}
            other => return Err(FrameError::InvalidEscape(other)),
        }
        // Every escape is a two-byte UTF-8 sequence
        if !(0x80..=0xBF).contains(&next) {
            return Err(FrameError::InvalidEscape(next));
        }

        match b {
            0xC2 => dst.put_u8(next),
            0xC3 => dst.put_u8(next + 64),
            _ if next == 0x80 => dst.put_u8(0),
            _ => return Err(FrameError::InvalidEscape(next)),
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_escape_table() {
        let mut out = BytesMut::new();
        escape(&[0x00, 0x41, 0x80, 0xBF, 0xC0, 0xFF], &mut out);
        assert_eq!(
            &out[..],
            &[0xC4, 0x80, 0x41, 0xC2, 0x80, 0xC2, 0xBF, 0xC3, 0x80, 0xC3, 0xBF]
        );
        assert!(!out.contains(&0x00));
        assert!(!out.contains(&0xFF));
    }

    #[test]
    fn test_unescape_every_byte() {
        let raw: Vec<u8> = (0..=255u8).collect();
        let mut escaped = BytesMut::new();
        escape(&raw, &mut escaped);

        let mut out = BytesMut::new();
        unescape(&escaped, &mut out).unwrap();
        assert_eq!(&out[..], &raw[..]);
    }

    #[test]
    fn test_unescape_rejects_garbage() {
        let mut out = BytesMut::new();
        assert_eq!(unescape(&[0x41, 0xC2], &mut out), Err(FrameError::TruncatedEscape));
        assert_eq!(unescape(&[0xE0, 0x80], &mut out), Err(FrameError::InvalidEscape(0xE0)));
        assert_eq!(unescape(&[0xC3, 0xF0], &mut out), Err(FrameError::InvalidEscape(0xF0)));
    }

    #[test]
    fn test_unescape_null_needs_exact_pair() {
        let mut out = BytesMut::new();
        unescape(&[0x41, 0xC4, 0x80], &mut out).unwrap();
        assert_eq!(&out[..], &[0x41, 0x00]);

        let mut out = BytesMut::new();
        assert_eq!(unescape(&[0xC4, 0x81], &mut out), Err(FrameError::InvalidEscape(0x81)));
        assert_eq!(unescape(&[0xC4, 0x41], &mut out), Err(FrameError::InvalidEscape(0x41)));
        assert_eq!(unescape(&[0xC2, 0x41], &mut out), Err(FrameError::InvalidEscape(0x41)));
        assert!(out.is_empty());
    }
}
