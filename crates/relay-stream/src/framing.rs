//! # Framing
//!
//! Bytes are buffered raw and split on `\n`, so a multi-byte character or a
//! JSON document cut across chunk boundaries is only decoded once its line is
//! complete. A trailing fragment without a newline stays buffered.
//!
//! Lines are capped at [`MAX_LINE_BYTES`]. A longer line is discarded whole,
//! so it never reaches classification.

use bytes::BytesMut;
use tracing::{debug, warn};

/// SSE field names that carry no payload for relay.
const IGNORED_FIELDS: [&str; 3] = ["event:", "id:", "retry:"];

/// Longest line kept, in bytes, terminator excluded.
pub const MAX_LINE_BYTES: usize = 1024 * 1024;

/// Accumulates chunks and yields complete lines.
#[derive(Debug)]
pub struct LineBuffer {
    buffer: BytesMut,
    /// Bytes of `buffer` already known to hold no newline.
    scanned: usize,
    /// Inside an overlong line; drop everything up to its newline.
    discarding: bool,
    max_line: usize,
}

impl Default for LineBuffer {
    fn default() -> Self {
        Self::new()
    }
}

impl LineBuffer {
    /// Create an empty buffer.
    pub fn new() -> Self {
        Self::with_max_line(MAX_LINE_BYTES)
    }

    /// Create an empty buffer with a custom line cap.
    pub fn with_max_line(max_line: usize) -> Self {
        Self {
            buffer: BytesMut::with_capacity(8192),
            scanned: 0,
            discarding: false,
            max_line,
        }
    }

    /// Append a chunk.
    pub fn push(&mut self, chunk: &[u8]) {
        self.buffer.extend_from_slice(chunk);
    }

    /// Pop the next complete line, without its terminator.
    ///
    /// Lines that are not valid UTF-8 or exceed the cap are skipped.
    pub fn next_line(&mut self) -> Option<String> {
        loop {
            let Some(offset) = self.buffer[self.scanned..].iter().position(|&b| b == b'\n') else {
                self.scanned = self.buffer.len();
                if self.scanned > self.max_line {
                    if !self.discarding {
                        warn!(max_line = self.max_line, "stream line exceeds cap, discarding it");
                        self.discarding = true;
                    }
                    self.buffer.clear();
                    self.scanned = 0;
                }
                return None;
            };

            let newline_pos = self.scanned + offset;
            let mut line_bytes = self.buffer.split_to(newline_pos + 1);
            self.scanned = 0;
            if std::mem::take(&mut self.discarding) || newline_pos > self.max_line {
                debug!(len = newline_pos, "dropping overlong line");
                continue;
            }
            line_bytes.truncate(line_bytes.len() - 1);
            if line_bytes.last() == Some(&b'\r') {
                line_bytes.truncate(line_bytes.len() - 1);
            }
            match std::str::from_utf8(&line_bytes) {
                Ok(line) => return Some(line.to_owned()),
                Err(e) => debug!(error = %e, "skipping non UTF-8 line"),
            }
        }
    }

    /// Take whatever is left after the source ended.
    pub fn take_remaining(&mut self) -> Option<String> {
        self.scanned = 0;
        if std::mem::take(&mut self.discarding) || self.buffer.is_empty() {
            self.buffer.clear();
            return None;
        }
        let rest = self.buffer.split();
        std::str::from_utf8(&rest).ok().map(str::to_owned)
    }

    /// Bytes currently buffered.
    pub fn len(&self) -> usize {
        self.buffer.len()
    }

    /// Whether nothing is buffered.
    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }
}

/// Extract the frame payload from one line.
///
/// Strips a `data:` label and surrounding whitespace. Returns `None` for
/// blank lines, SSE comments, and SSE fields other than `data`.
pub fn frame_payload(line: &str) -> Option<&str> {
    let trimmed = line.trim();
    if trimmed.is_empty() || trimmed.starts_with(':') {
        return None;
    }
    if IGNORED_FIELDS.iter().any(|f| trimmed.starts_with(f)) {
        return None;
    }
    let payload = trimmed.strip_prefix("data:").map_or(trimmed, str::trim);
    (!payload.is_empty()).then_some(payload)
}
