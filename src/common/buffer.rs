//! Relay buffer with an explicit cursor pair
//!
//! A `RelayBuffer` holds bytes that have been queued for one direction of a
//! relay but not yet written out. The active region is `start..end`; it is
//! empty iff `start == end`, at which point both cursors return to zero so
//! the next payload starts at the front of the allocation.
//!
//! Invariant: `0 <= start <= end <= capacity`.

use super::error::{GatewayError, Result};

/// Bounded byte queue used by the relay loop
#[derive(Debug)]
pub struct RelayBuffer {
    data: Vec<u8>,
    start: usize,
    capacity: usize,
}

impl RelayBuffer {
    /// Create an empty buffer that will never hold more than `capacity` bytes
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            data: Vec::with_capacity(capacity),
            start: 0,
            capacity,
        }
    }

    /// Maximum number of bytes the buffer accepts
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Whether there is nothing left to send
    pub fn is_empty(&self) -> bool {
        self.start == self.data.len()
    }

    /// Number of bytes still waiting to be sent
    pub fn len(&self) -> usize {
        self.data.len() - self.start
    }

    /// Bytes still waiting to be sent
    pub fn pending(&self) -> &[u8] {
        &self.data[self.start..]
    }

    /// Every byte loaded since the last reset, sent or not
    pub fn loaded(&self) -> &[u8] {
        &self.data
    }

    /// Replace the (fully sent) contents with `bytes`
    ///
    /// # Errors
    ///
    /// Returns `GatewayError::Resource` if `bytes` does not fit, and
    /// `GatewayError::Other` if unsent bytes would be overwritten.
    pub fn load(&mut self, bytes: &[u8]) -> Result<()> {
        if !self.is_empty() {
            return Err(GatewayError::Other(format!(
                "Refusing to overwrite {} unsent bytes", self.len()
            )));
        }
        if bytes.len() > self.capacity {
            return Err(GatewayError::Resource(format!(
                "{} bytes do not fit a {} byte relay buffer", bytes.len(), self.capacity
            )));
        }

        self.data.clear();
        self.data.extend_from_slice(bytes);
        self.start = 0;
        Ok(())
    }

    /// Mark `n` bytes from the front of the active region as sent
    ///
    /// Returns `true` when the buffer became empty (and was reset).
    pub fn consume(&mut self, n: usize) -> bool {
        debug_assert!(n <= self.len(), "consumed more than was pending");
        self.start = (self.start + n).min(self.data.len());

        if self.is_empty() {
            self.data.clear();
            self.start = 0;
            true
        } else {
            false
        }
    }

    /// Cursor pair `(start, end)` of the active region
    pub fn cursors(&self) -> (usize, usize) {
        (self.start, self.data.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_consume_resumes_at_offset() {
        let mut buffer = RelayBuffer::with_capacity(16);
        buffer.load(b"abcdefgh").unwrap();

        assert!(!buffer.consume(3));
        assert_eq!(buffer.pending(), b"defgh");
        assert_eq!(buffer.cursors(), (3, 8));

        assert!(!buffer.consume(4));
        assert_eq!(buffer.pending(), b"h");

        assert!(buffer.consume(1));
        assert!(buffer.is_empty());
        assert_eq!(buffer.cursors(), (0, 0));
    }

    #[test]
    fn test_load_rejects_oversized_payload() {
        let mut buffer = RelayBuffer::with_capacity(4);
        let err = buffer.load(b"12345").unwrap_err();
        assert!(matches!(err, GatewayError::Resource(_)));
        assert!(buffer.is_empty());
    }

    #[test]
    fn test_load_refuses_to_drop_unsent_bytes() {
        let mut buffer = RelayBuffer::with_capacity(8);
        buffer.load(b"abc").unwrap();
        buffer.consume(1);

        assert!(buffer.load(b"xyz").is_err());
        assert_eq!(buffer.pending(), b"bc");
    }

    #[test]
    fn test_loaded_keeps_sent_prefix_until_reset() {
        let mut buffer = RelayBuffer::with_capacity(8);
        buffer.load(b"frame").unwrap();
        buffer.consume(2);
        assert_eq!(buffer.loaded(), b"frame");
        assert_eq!(buffer.capacity(), 8);
    }
}
