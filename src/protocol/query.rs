//! Client options carried in the request path's query string

use crate::codec::{FrameCodec, FrameDialect};

/// Options a client selects through its request path
///
/// A token counts when it appears anywhere between the `?` and an optional
/// `#`, so `?b64encode`, `?b64encode=1` and `?mode=b64encode` all select
/// base64 framing.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ClientOptions {
    /// Frames carry base64 payloads
    pub b64encode: bool,
    /// Outbound payloads carry an ascending `"<n>:"` prefix
    pub seq_num: bool,
}

impl ClientOptions {
    /// Extract the options from a request path such as `/websockify?b64encode`
    pub fn from_path(path: &str) -> Self {
        let Some(query) = Self::query(path) else {
            return Self::default();
        };

        Self {
            b64encode: query.contains("b64encode"),
            seq_num: query.contains("seq_num"),
        }
    }

    /// Query part of `path`: after the first `?`, up to the first `#` after it
    fn query(path: &str) -> Option<&str> {
        let (_, rest) = path.split_once('?')?;
        Some(rest.split_once('#').map_or(rest, |(query, _)| query))
    }

    /// Frame dialect the options select
    pub fn dialect(&self) -> FrameDialect {
        if self.b64encode {
            FrameDialect::Base64
        } else {
            FrameDialect::LegacyEscaped
        }
    }

    /// Build the codec for a connection using these options
    pub fn codec(&self) -> FrameCodec {
        FrameCodec::new(self.dialect(), self.seq_num)
    }
}
