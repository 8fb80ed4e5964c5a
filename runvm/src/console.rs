//! Console bridge from the guest's app console socket to host output.
//!
//! One reader task turns the console byte stream into lines and pushes them
//! through a bounded channel; the caller drains the channel into a writer.
//! The channel closes when the stream hits EOF or a read error.

use std::path::Path;
use std::time::Duration;

use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::net::UnixStream;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::errors::{RunvmError, RunvmResult};

const READ_BUFFER_SIZE: usize = 256;

/// CR/LF line splitter.
///
/// `\n` ends a line unless it directly follows `\r`; a bare `\r` ends a line
/// too, so `\r\n` yields a single line.
#[derive(Debug, Default)]
pub struct LineSplitter {
    line: Vec<u8>,
    after_cr: bool,
}

impl LineSplitter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed one byte, returning a completed line if this byte ended one.
    pub fn push(&mut self, byte: u8) -> Option<String> {
        let emit = match byte {
            b'\n' => !std::mem::replace(&mut self.after_cr, false),
            b'\r' => {
                self.after_cr = true;
                true
            }
            other => {
                self.after_cr = false;
                self.line.push(other);
                false
            }
        };

        if emit {
            let line = String::from_utf8_lossy(&self.line).into_owned();
            self.line.clear();
            Some(line)
        } else {
            None
        }
    }

    /// Take a trailing unterminated line, if any.
    pub fn finish(&mut self) -> Option<String> {
        if self.line.is_empty() {
            return None;
        }
        let line = String::from_utf8_lossy(&self.line).into_owned();
        self.line.clear();
        Some(line)
    }
}

/// Split a complete byte buffer into lines.
pub fn split_lines(bytes: &[u8]) -> Vec<String> {
    let mut splitter = LineSplitter::new();
    let mut lines: Vec<String> = bytes.iter().filter_map(|b| splitter.push(*b)).collect();
    lines.extend(splitter.finish());
    lines
}

/// Spawn a task reading `reader` into a bounded line channel.
///
/// The sender is dropped when the stream ends or fails, closing the channel.
pub fn spawn_console_reader<R>(reader: R, capacity: usize) -> (mpsc::Receiver<String>, JoinHandle<()>)
where
    R: AsyncRead + Unpin + Send + 'static,
{
    let (tx, rx) = mpsc::channel(capacity.max(1));

    let handle = tokio::spawn(async move {
        let mut reader = BufReader::with_capacity(READ_BUFFER_SIZE, reader);
        let mut splitter = LineSplitter::new();
        let mut buf = [0u8; READ_BUFFER_SIZE];

        loop {
            let n = match reader.read(&mut buf).await {
                Ok(0) => break,
                Ok(n) => n,
                Err(e) => {
                    tracing::debug!(error = %e, "Console read failed, closing stream");
                    break;
                }
            };

            for byte in &buf[..n] {
                if let Some(line) = splitter.push(*byte)
                    && tx.send(line).await.is_err()
                {
                    tracing::debug!("Console consumer gone, stopping reader");
                    return;
                }
            }
        }

        if let Some(line) = splitter.finish() {
            let _ = tx.send(line).await;
        }
        tracing::debug!("Console stream closed");
    });

    (rx, handle)
}

/// Connect to a console socket, giving up after `timeout`.
///
/// Failure is logged and returns `None`; a slow boot is not fatal.
pub async fn dial_console(path: &Path, timeout: Duration) -> Option<UnixStream> {
    match tokio::time::timeout(timeout, UnixStream::connect(path)).await {
        Ok(Ok(stream)) => {
            tracing::debug!(socket = %path.display(), "Connected to console");
            Some(stream)
        }
        Ok(Err(e)) => {
            tracing::warn!(socket = %path.display(), error = %e, "Failed to connect to console");
            None
        }
        Err(_) => {
            tracing::warn!(
                socket = %path.display(),
                timeout_secs = timeout.as_secs(),
                "Timed out connecting to console"
            );
            None
        }
    }
}

/// Write every line from `rx` to `writer` until the channel closes.
///
/// Returns the number of lines written.
pub async fn drain_lines<W>(mut rx: mpsc::Receiver<String>, writer: &mut W) -> RunvmResult<u64>
where
    W: AsyncWrite + Unpin,
{
    let mut count = 0;
    while let Some(line) = rx.recv().await {
        writer.write_all(line.as_bytes()).await.map_err(write_error)?;
        writer.write_all(b"\n").await.map_err(write_error)?;
        writer.flush().await.map_err(write_error)?;
        count += 1;
    }
    Ok(count)
}

fn write_error(e: std::io::Error) -> RunvmError {
    RunvmError::Storage(format!("failed to write console output: {e}"))
}
