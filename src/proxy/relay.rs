//! Frame relay between a WebSocket client and a raw TCP target
//!
//! One `ProxyRelay` owns both legs of a connection. Each loop iteration waits
//! on at most one operation per direction and leg:
//!
//! - client read only when nothing is queued for the target, otherwise a
//!   target write
//! - target read only when nothing is queued for the client, otherwise a
//!   client write
//!
//! so a queued payload is always fully written before the next read in the
//! same direction. Partial writes resume from the exact unwritten offset.

use std::io;
use std::time::Duration;

use bytes::BytesMut;
use log::{debug, trace, warn};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::sync::watch;
use tokio::time::{sleep, Instant};

use crate::codec::{FrameCodec, FrameError, FRAME_END, FRAME_START};
use crate::common::{GatewayError, RelayBuffer, Result};
use super::record::{Direction, RecordSink};

/// Upper bound on a single readiness wait
pub const RELAY_TICK: Duration = Duration::from_secs(1);

/// Orderly close frame sent by hixie-era clients
const CLOSE_FRAME: [u8; 2] = [FRAME_END, FRAME_START];

/// Why a relay stopped
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CloseReason {
    /// Client socket reached end of stream
    ClientClosed,
    /// Target socket reached end of stream
    TargetClosed,
    /// Client sent the `FF 00` close frame
    OrderlyClose,
    /// The gateway is shutting down
    Shutdown,
}

impl std::fmt::Display for CloseReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CloseReason::ClientClosed => write!(f, "client closed"),
            CloseReason::TargetClosed => write!(f, "target closed"),
            CloseReason::OrderlyClose => write!(f, "client sent close frame"),
            CloseReason::Shutdown => write!(f, "gateway shutdown"),
        }
    }
}

/// Totals reported when a relay ends cleanly
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RelayStats {
    pub close: CloseReason,
    /// Raw bytes written to the target
    pub to_target_bytes: u64,
    /// Framed bytes written to the client
    pub to_client_bytes: u64,
    /// Frames decoded from the client
    pub frames_from_client: u64,
    /// Frames encoded for the client
    pub frames_to_client: u64,
}

/// Per-connection relay
pub struct ProxyRelay {
    codec: FrameCodec,
    buffer_size: usize,
    recorder: Option<RecordSink>,
    shutdown: watch::Receiver<bool>,
    started: Instant,
    to_target_bytes: u64,
    to_client_bytes: u64,
    frames_from_client: u64,
    frames_to_client: u64,
}

impl ProxyRelay {
    /// Create a relay
    ///
    /// # Parameters
    ///
    /// * `codec` - Codec negotiated during the handshake
    /// * `buffer_size` - Capacity of every relay buffer
    /// * `shutdown` - Flips to `true` when the gateway stops
    pub fn new(codec: FrameCodec, buffer_size: usize, shutdown: watch::Receiver<bool>) -> Self {
        Self {
            codec,
            buffer_size,
            recorder: None,
            shutdown,
            started: Instant::now(),
            to_target_bytes: 0,
            to_client_bytes: 0,
            frames_from_client: 0,
            frames_to_client: 0,
        }
    }

    /// Record every frame to `recorder`
    pub fn with_recorder(mut self, recorder: Option<RecordSink>) -> Self {
        self.recorder = recorder;
        self
    }

    /// Relay until either side closes, an error occurs, or shutdown is requested
    ///
    /// Both legs are shut down before this returns, whatever the outcome.
    ///
    /// # Parameters
    ///
    /// * `client` - Client channel, already past the handshake
    /// * `target` - Connected target stream
    ///
    /// # Returns
    ///
    /// Returns the relay totals, or the error that ended the session.
    pub async fn run<C, T>(mut self, client: C, target: T) -> Result<RelayStats>
    where
        C: AsyncRead + AsyncWrite + Unpin + Send,
        T: AsyncRead + AsyncWrite + Unpin + Send,
    {
        self.started = Instant::now();

        let (mut client_r, mut client_w) = tokio::io::split(client);
        let (mut target_r, mut target_w) = tokio::io::split(target);

        let result = self
            .pump(&mut client_r, &mut client_w, &mut target_r, &mut target_w)
            .await;

        let mut client = client_r.unsplit(client_w);
        let mut target = target_r.unsplit(target_w);
        if let Err(e) = client.shutdown().await {
            debug!("Error shutting down client leg: {}", e);
        }
        if let Err(e) = target.shutdown().await {
            debug!("Error shutting down target leg: {}", e);
        }

        let close = result?;
        Ok(RelayStats {
            close,
            to_target_bytes: self.to_target_bytes,
            to_client_bytes: self.to_client_bytes,
            frames_from_client: self.frames_from_client,
            frames_to_client: self.frames_to_client,
        })
    }

    async fn pump<CR, CW, TR, TW>(
        &mut self,
        client_r: &mut CR,
        client_w: &mut CW,
        target_r: &mut TR,
        target_w: &mut TW,
    ) -> Result<CloseReason>
    where
        CR: AsyncRead + Unpin,
        CW: AsyncWrite + Unpin,
        TR: AsyncRead + Unpin,
        TW: AsyncWrite + Unpin,
    {
        let mut to_target = RelayBuffer::with_capacity(self.buffer_size);
        let mut to_client = RelayBuffer::with_capacity(self.buffer_size);
        let mut partial: Vec<u8> = Vec::new();

        // Target reads are capped so the encoded frame always fits `to_client`
        let mut target_buf = vec![0u8; self.codec.dialect().max_payload(self.buffer_size).max(1)];
        let mut client_buf = vec![0u8; self.buffer_size];
        let mut encoded = BytesMut::with_capacity(self.buffer_size);
        let mut decoded = BytesMut::with_capacity(self.buffer_size);

        loop {
            if *self.shutdown.borrow() {
                return Ok(CloseReason::Shutdown);
            }

            tokio::select! {
                res = target_w.write(to_target.pending()), if !to_target.is_empty() => {
                    let n = accepted(res)?;
                    self.to_target_bytes += n as u64;
                    if to_target.consume(n) {
                        trace!("Target send: {} bytes", n);
                    } else {
                        trace!("Target send partial: {} bytes, {} left", n, to_target.len());
                    }
                }

                res = client_w.write(to_client.pending()), if !to_client.is_empty() => {
                    let n = accepted(res)?;
                    self.to_client_bytes += n as u64;
                    if n == to_client.len() {
                        self.record(Direction::ToClient, frame_body(to_client.loaded())).await;
                    }
                    if to_client.consume(n) {
                        trace!("Client send: {} bytes", n);
                    } else {
                        trace!("Client send partial: {} bytes, {} left", n, to_client.len());
                    }
                }

                res = target_r.read(&mut target_buf), if to_client.is_empty() => {
                    let n = res?;
                    if n == 0 {
                        return Ok(CloseReason::TargetClosed);
                    }
                    trace!("Target receive: {} bytes", n);

                    encoded.clear();
                    self.codec.encode(&target_buf[..n], &mut encoded);
                    to_client.load(&encoded)?;
                    self.frames_to_client += 1;
                }

                res = client_r.read(&mut client_buf), if to_target.is_empty() => {
                    let n = res?;
                    if n == 0 {
                        return Ok(CloseReason::ClientClosed);
                    }
                    let chunk = &client_buf[..n];
                    if partial.is_empty() && chunk == CLOSE_FRAME {
                        return Ok(CloseReason::OrderlyClose);
                    }
                    trace!("Client receive: {} bytes", n);

                    self.client_data(chunk, &mut partial, &mut decoded, &mut to_target).await?;
                }

                _ = sleep(RELAY_TICK) => {}
            }
        }
    }

    /// Join `chunk` onto any pending partial frame and decode once complete
    async fn client_data(
        &mut self,
        chunk: &[u8],
        partial: &mut Vec<u8>,
        decoded: &mut BytesMut,
        to_target: &mut RelayBuffer,
    ) -> Result<()> {
        if partial.is_empty() && chunk.first() != Some(&FRAME_START) {
            return Err(FrameError::MissingStartMarker.into());
        }

        partial.extend_from_slice(chunk);
        if partial.len() > self.buffer_size {
            return Err(GatewayError::Resource(format!(
                "partial client frame of {} bytes exceeds {} byte buffer",
                partial.len(),
                self.buffer_size
            )));
        }
        if partial.last() != Some(&FRAME_END) {
            trace!("Client receive partial: {} bytes pending", partial.len());
            return Ok(());
        }

        self.record(Direction::FromClient, frame_body(partial)).await;

        decoded.clear();
        let summary = self.codec.decode(partial, decoded)?;
        partial.clear();

        if summary.frames > 1 {
            trace!("Client receive: {} frames in one read", summary.frames);
        }
        self.frames_from_client += summary.frames as u64;

        if !decoded.is_empty() {
            to_target.load(decoded)?;
        }
        Ok(())
    }

    async fn record(&self, direction: Direction, payload: &[u8]) {
        let Some(recorder) = &self.recorder else {
            return;
        };
        if let Err(e) = recorder.record(direction, self.started.elapsed(), payload).await {
            warn!("Failed to write to {}: {}", recorder.path().display(), e);
        }
    }
}

/// Bytes written, treating a zero-length write as a dead peer
fn accepted(res: io::Result<usize>) -> Result<usize> {
    match res? {
        0 => Err(io::Error::new(io::ErrorKind::WriteZero, "peer accepted no bytes").into()),
        n => Ok(n),
    }
}

/// Frame contents without the outer markers
fn frame_body(frame: &[u8]) -> &[u8] {
    frame.get(1..frame.len().saturating_sub(1)).unwrap_or_default()
}
