//! `basalt-wire`: the TCP framing contract.
//!
//! On the wire a quote stream is a sequence of single-line JSON objects, each
//! followed by exactly one `\n` byte. No length prefix, no other framing.
//! A receiver recovers messages by buffering bytes and splitting at `\n`;
//! partial trailing bytes are retained across reads, so any chunking of the
//! byte stream (including one byte at a time) reassembles the same message
//! sequence.
//!
//! Empty lines are tolerated by callers (skip); malformed lines are counted
//! and skipped without closing the connection.

use basalt_events::{CodecError, QuoteTick};

#[derive(Debug, thiserror::Error)]
pub enum WireError {
    #[error("line is not valid utf-8")]
    Utf8(#[from] std::str::Utf8Error),

    #[error(transparent)]
    Codec(#[from] CodecError),
}

/// Serialises one quote as its wire frame: JSON line plus trailing `\n`.
pub fn encode_line(tick: &QuoteTick) -> Result<Vec<u8>, CodecError> {
    let mut bytes = tick.to_json()?.into_bytes();
    bytes.push(b'\n');
    Ok(bytes)
}

/// Parses one complete line (without its `\n`) back into a quote.
pub fn decode_line(line: &[u8]) -> Result<QuoteTick, WireError> {
    let text = std::str::from_utf8(line)?;
    Ok(QuoteTick::from_json(text)?)
}

/// Incremental splitter for a newline-delimited byte stream.
///
/// Feed arbitrary chunks with [`extend`](LineDecoder::extend), then drain
/// complete lines with [`next_line`](LineDecoder::next_line). Bytes after
/// the last `\n` stay buffered until their terminator arrives.
#[derive(Debug, Default)]
pub struct LineDecoder {
    buf: Vec<u8>,
    // Everything before `scanned` is known to contain no '\n'.
    scanned: usize,
}

impl LineDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn extend(&mut self, bytes: &[u8]) {
        self.buf.extend_from_slice(bytes);
    }

    /// Returns the next complete line, without its terminator. `None` when
    /// no full line is buffered. May return empty lines; the caller decides
    /// whether to skip them.
    pub fn next_line(&mut self) -> Option<Vec<u8>> {
        let nl = self.buf[self.scanned..]
            .iter()
            .position(|&b| b == b'\n')
            .map(|i| self.scanned + i);

        match nl {
            Some(end) => {
                let line = self.buf[..end].to_vec();
                self.buf.drain(..=end);
                self.scanned = 0;
                Some(line)
            }
            None => {
                self.scanned = self.buf.len();
                None
            }
        }
    }

    /// Bytes buffered but not yet returned as a line.
    pub fn pending(&self) -> usize {
        self.buf.len()
    }
}
