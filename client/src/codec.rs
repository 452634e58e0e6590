//! Line-delimited JSON framing for the analysis server.
//!
//! Every message is one UTF-8 line holding a single JSON value. This module
//! provides [`LineReader`] and [`LineWriter`] for async reading and writing
//! of those frames over the subprocess pipes.

use anyhow::{Context, Result, bail};
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt, BufReader};

/// Maximum line size (4 MiB) to prevent unbounded memory allocation.
const MAX_LINE_BYTES: usize = 4 * 1024 * 1024;

/// Reads newline-terminated JSON frames from an async reader.
pub struct LineReader<R> {
    reader: BufReader<R>,
}

impl<R: AsyncRead + Unpin> LineReader<R> {
    pub fn new(reader: R) -> Self {
        Self {
            reader: BufReader::new(reader),
        }
    }

    /// Read the next JSON frame.
    ///
    /// Returns `Ok(None)` on EOF (the server closed its stdout).
    /// Returns `Err` on oversized lines, a truncated final line, or invalid JSON.
    pub async fn read_frame(&mut self) -> Result<Option<serde_json::Value>> {
        let mut line = String::new();
        let limit = (MAX_LINE_BYTES + 1) as u64;
        let bytes_read = (&mut self.reader)
            .take(limit)
            .read_line(&mut line)
            .await
            .context("reading frame line")?;

        if bytes_read == 0 {
            return Ok(None);
        }
        if bytes_read > MAX_LINE_BYTES {
            bail!("frame exceeds maximum {MAX_LINE_BYTES} bytes");
        }
        if !line.ends_with('\n') {
            bail!("unexpected EOF in the middle of a frame");
        }

        let value = serde_json::from_str(line.trim_end()).context("parsing JSON frame")?;
        Ok(Some(value))
    }
}

/// Writes newline-terminated JSON frames to an async writer.
pub struct LineWriter<W> {
    writer: W,
}

impl<W: AsyncWrite + Unpin> LineWriter<W> {
    pub fn new(writer: W) -> Self {
        Self { writer }
    }

    /// Write one frame and flush, so the server sees the whole line at once.
    pub async fn write_frame(&mut self, msg: &serde_json::Value) -> Result<()> {
        // serde_json escapes control characters, so the body never contains a raw newline.
        let mut body = serde_json::to_string(msg).context("serializing JSON frame")?;
        body.push('\n');

        self.writer
            .write_all(body.as_bytes())
            .await
            .context("writing frame")?;
        self.writer.flush().await.context("flushing frame")?;

        Ok(())
    }
}
