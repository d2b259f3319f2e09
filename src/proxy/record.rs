//! Session recording
//!
//! Every frame exchanged with a client can be appended to a shared file, one
//! quoted line per frame:
//!
//! ```text
//! "{12{ZnJvbSB0YXJnZXQ=",
//! "}40}ZnJvbSBjbGllbnQ=",
//! ```
//!
//! `{` lines were sent to the client, `}` lines were received from it. The
//! number is milliseconds since the relay started; the payload is the frame
//! without its markers.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use log::info;
use tokio::fs::{File, OpenOptions};
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;

use crate::common::Result;

/// Which way a recorded frame travelled
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    /// Gateway to client
    ToClient,
    /// Client to gateway
    FromClient,
}

impl Direction {
    fn marker(self) -> char {
        match self {
            Direction::ToClient => '{',
            Direction::FromClient => '}',
        }
    }
}

/// Append-only recording file shared by all connections
#[derive(Debug, Clone)]
pub struct RecordSink {
    path: PathBuf,
    file: Arc<Mutex<File>>,
}

impl RecordSink {
    /// Open (or create) the recording file in append mode
    pub async fn open(path: &Path) -> Result<Self> {
        let file = OpenOptions::new().create(true).append(true).open(path).await?;
        info!("Recording frames to {}", path.display());

        Ok(Self {
            path: path.to_path_buf(),
            file: Arc::new(Mutex::new(file)),
        })
    }

    /// Path of the recording file
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Append one frame payload
    pub async fn record(&self, direction: Direction, elapsed: Duration, payload: &[u8]) -> Result<()> {
        let line = format_line(direction, elapsed, payload);

        let mut file = self.file.lock().await;
        file.write_all(line.as_bytes()).await?;
        file.flush().await?;
        Ok(())
    }
}

fn format_line(direction: Direction, elapsed: Duration, payload: &[u8]) -> String {
    let marker = direction.marker();
    let text = format!(
        "{}{}{}{}",
        marker,
        elapsed.as_millis(),
        marker,
        String::from_utf8_lossy(payload)
    );
    format!("{:?},\n", text)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_line() {
        assert_eq!(
            format_line(Direction::ToClient, Duration::from_millis(12), b"d29ybGQ="),
            "\"{12{d29ybGQ=\",\n"
        );
        assert_eq!(
            format_line(Direction::FromClient, Duration::from_millis(40), b"aGVsbG8="),
            "\"}40}aGVsbG8=\",\n"
        );
    }

    #[test]
    fn test_format_line_escapes_quotes() {
        assert_eq!(
            format_line(Direction::FromClient, Duration::ZERO, b"a\"b"),
            "\"}0}a\\\"b\",\n"
        );
    }

    #[tokio::test]
    async fn test_record_appends() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("session.rec");
        std::fs::write(&path, "\"existing\",\n").unwrap();

        let sink = RecordSink::open(&path).await.unwrap();
        assert_eq!(sink.path(), path.as_path());

        let shared = sink.clone();
        sink.record(Direction::FromClient, Duration::from_millis(1), b"aGVsbG8=").await.unwrap();
        shared.record(Direction::ToClient, Duration::from_millis(2), b"d29ybGQ=").await.unwrap();

        let contents = std::fs::read_to_string(&path).unwrap();
        assert_eq!(contents, "\"existing\",\n\"}1}aGVsbG8=\",\n\"{2{d29ybGQ=\",\n");
    }
}
