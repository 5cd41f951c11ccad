//! PTY channel: the write / settle / read-until-prompt loop.

use std::time::{Duration, Instant};

use bytes::BytesMut;
use log::{debug, trace, warn};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio_util::sync::CancellationToken;

use super::buffer::PatternBuffer;
use super::normalize::{command_key, truncate_output};
use super::patterns::CompletionPattern;
use crate::driver::CommandOutput;
use crate::error::{ChannelError, Result};

/// Size of each read from the underlying stream.
const READ_CHUNK_SIZE: usize = 8192;

/// A duplex byte stream to a device (SSH channel, Telnet socket, test pipe).
pub trait DeviceStream: AsyncRead + AsyncWrite + Send + Unpin {}

impl<T: AsyncRead + AsyncWrite + Send + Unpin> DeviceStream for T {}

/// Configuration for PTY channel behavior.
#[derive(Debug, Clone)]
pub struct PtyConfig {
    /// Search depth for pattern matching.
    pub search_depth: usize,

    /// Pause between writing a command and reading its response, so the
    /// device's own echo is not raced.
    pub settle_delay: Duration,

    /// Line terminator appended to every command.
    pub line_ending: &'static str,
}

impl Default for PtyConfig {
    fn default() -> Self {
        Self {
            search_depth: 1000,
            settle_delay: Duration::from_millis(3),
            line_ending: "\r",
        }
    }
}

/// High-level PTY channel for interactive device sessions.
///
/// Wraps a raw byte stream and turns "write a command, wait for the prompt"
/// into one bounded operation.
pub struct PtyChannel {
    /// The underlying byte stream.
    stream: Box<dyn DeviceStream>,

    /// Configuration for this channel.
    config: PtyConfig,

    /// Pattern buffer for accumulating output.
    buffer: PatternBuffer,

    /// Whether the channel is open.
    is_open: bool,
}

enum Outcome {
    Matched(Result<Vec<u8>>),
    TimedOut,
    Cancelled,
}

impl PtyChannel {
    /// Create a new PTY channel over a stream.
    pub fn new(stream: Box<dyn DeviceStream>, config: PtyConfig) -> Self {
        Self {
            stream,
            buffer: PatternBuffer::new(config.search_depth),
            config,
            is_open: true,
        }
    }

    /// Check if the channel is open.
    pub fn is_open(&self) -> bool {
        self.is_open
    }

    /// Write one line of input followed by the line terminator.
    pub async fn send(&mut self, input: &str) -> Result<()> {
        self.write_line(input, false).await
    }

    /// Write a line without logging its contents (passwords).
    pub async fn send_hidden(&mut self, input: &str) -> Result<()> {
        self.write_line(input, true).await
    }

    async fn write_line(&mut self, input: &str, hidden: bool) -> Result<()> {
        if !self.is_open {
            return Err(ChannelError::Closed.into());
        }
        if !self.buffer.is_empty() {
            trace!("discarding {} stale bytes before write", self.buffer.len());
            self.buffer.clear();
        }

        debug!("send: {:?}", if hidden { "<hidden>" } else { input });

        let line = format!("{input}{}", self.config.line_ending);
        self.stream
            .write_all(line.as_bytes())
            .await
            .map_err(ChannelError::Io)?;
        self.stream.flush().await.map_err(ChannelError::Io)?;

        tokio::time::sleep(self.config.settle_delay).await;
        Ok(())
    }

    /// Read until `pattern` completes the output, `timeout` elapses, or the
    /// job is cancelled.
    ///
    /// On timeout or cancellation the partially captured output is discarded.
    pub async fn read_until(
        &mut self,
        pattern: &CompletionPattern,
        timeout: Duration,
        cancel: &CancellationToken,
    ) -> Result<String> {
        let outcome = {
            let read = read_until_match(&mut self.stream, &mut self.buffer, pattern);
            tokio::select! {
                biased;
                _ = cancel.cancelled() => Outcome::Cancelled,
                res = read => Outcome::Matched(res),
                _ = tokio::time::sleep(timeout) => Outcome::TimedOut,
            }
        };

        match outcome {
            Outcome::Matched(Ok(data)) => Ok(String::from_utf8_lossy(&data).into_owned()),
            Outcome::Matched(Err(e)) => {
                self.is_open = false;
                Err(e)
            }
            Outcome::TimedOut => {
                warn!(
                    "waiting for '{}' took longer than {:?} ({} bytes discarded)",
                    pattern,
                    timeout,
                    self.buffer.len()
                );
                self.buffer.clear();
                Err(ChannelError::PatternTimeout(timeout).into())
            }
            Outcome::Cancelled => {
                self.buffer.clear();
                Err(ChannelError::Cancelled.into())
            }
        }
    }

    /// Send a command and wait for `pattern`, returning the normalized output.
    pub async fn send_command(
        &mut self,
        command: &str,
        pattern: &CompletionPattern,
        timeout: Duration,
        cancel: &CancellationToken,
    ) -> Result<CommandOutput> {
        let start = Instant::now();
        self.send(command).await?;
        let raw = self.read_until(pattern, timeout, cancel).await?;
        let elapsed = start.elapsed();

        debug!("'{}' completed in {:?} ({} bytes)", command, elapsed, raw.len());

        Ok(CommandOutput {
            command: command.to_string(),
            key: command_key(command),
            output: truncate_output(&raw),
            elapsed,
        })
    }

    /// Shut down the write side of the stream.
    pub async fn shutdown(&mut self) -> Result<()> {
        if !self.is_open {
            return Ok(());
        }
        self.is_open = false;
        self.stream.shutdown().await.map_err(ChannelError::Io)?;
        Ok(())
    }
}

/// Read chunks into `buffer` until `pattern` completes.
///
/// Runs as one arm of a `select!`; dropping it mid-read cancels the read
/// without losing the stream.
async fn read_until_match(
    stream: &mut Box<dyn DeviceStream>,
    buffer: &mut PatternBuffer,
    pattern: &CompletionPattern,
) -> Result<Vec<u8>> {
    let mut chunk = BytesMut::with_capacity(READ_CHUNK_SIZE);
    loop {
        chunk.clear();
        chunk.reserve(READ_CHUNK_SIZE);

        let n = stream.read_buf(&mut chunk).await.map_err(ChannelError::Io)?;
        if n == 0 {
            return Err(ChannelError::Closed.into());
        }

        let fresh_from = buffer.len();
        buffer.extend(&chunk);
        trace!("read {} bytes, buffer {} bytes", n, buffer.len());

        if let Some(end) = pattern.find_end(buffer, fresh_from) {
            return Ok(buffer.take_through(end));
        }
    }
}
