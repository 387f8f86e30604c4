//! Newline framing for the worker's stdout.
//!
//! Reads arrive in arbitrary chunks. [`LineBuffer`] keeps the unterminated
//! tail between reads so a message split across two reads is reassembled
//! rather than lost. Lines that are not protocol messages (the worker
//! sometimes prints plain diagnostics) are dropped at `debug`.

use log::debug;
use tokio::io::{AsyncRead, AsyncReadExt};

use super::message::Inbound;

/// Longest line kept while waiting for its newline.
pub const MAX_LINE_BYTES: usize = 16 * 1024 * 1024;

const READ_CHUNK: usize = 8 * 1024;

#[derive(Debug, Default)]
pub struct LineBuffer {
    buf: Vec<u8>,
    /// Set after an overlong line was thrown away; cleared at its newline.
    discarding: bool,
}

impl LineBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append `chunk` and return every line it completed, without the
    /// terminator. A trailing `\r` is stripped.
    pub fn push(&mut self, chunk: &[u8]) -> Vec<String> {
        let mut lines = Vec::new();
        let mut rest = chunk;
        while let Some(pos) = rest.iter().position(|b| *b == b'\n') {
            let (head, tail) = rest.split_at(pos);
            rest = &tail[1..];
            if self.discarding {
                self.discarding = false;
                self.buf.clear();
                continue;
            }
            self.buf.extend_from_slice(head);
            if self.buf.last() == Some(&b'\r') {
                self.buf.pop();
            }
            if self.buf.len() > MAX_LINE_BYTES {
                debug!("Dropping overlong worker line ({} bytes)", self.buf.len());
                self.buf.clear();
                continue;
            }
            lines.push(String::from_utf8_lossy(&self.buf).into_owned());
            self.buf.clear();
        }
        if !self.discarding {
            self.buf.extend_from_slice(rest);
            if self.buf.len() > MAX_LINE_BYTES {
                debug!("Dropping overlong worker line ({} bytes so far)", self.buf.len());
                self.buf.clear();
                self.discarding = true;
            }
        }
        lines
    }

    /// Bytes held for an unterminated line.
    pub fn pending(&self) -> usize {
        self.buf.len()
    }
}

/// Decode one framed line. Blank and malformed lines yield `None`.
pub fn decode_line(line: &str) -> Option<Inbound> {
    let line = line.trim();
    if line.is_empty() {
        return None;
    }
    match Inbound::from_json(line) {
        Ok(message) => Some(message),
        Err(e) => {
            debug!("Dropping non-protocol line ({e}): {line}");
            None
        }
    }
}

/// Read `reader` to EOF, handing each decoded message to `sink`.
///
/// Stops early when `sink` returns `false`. A partial line left at EOF is
/// discarded.
pub async fn pump<R, F>(mut reader: R, mut sink: F) -> std::io::Result<()>
where
    R: AsyncRead + Unpin,
    F: FnMut(Inbound) -> bool,
{
    let mut framing = LineBuffer::new();
    let mut chunk = vec![0u8; READ_CHUNK];
    loop {
        let n = reader.read(&mut chunk).await?;
        if n == 0 {
            if framing.pending() > 0 {
                debug!("Worker stdout closed with {} unterminated bytes", framing.pending());
            }
            return Ok(());
        }
        for line in framing.push(&chunk[..n]) {
            if let Some(message) = decode_line(&line)
                && !sink(message)
            {
                return Ok(());
            }
        }
    }
}
