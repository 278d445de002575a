//! Incremental `text/event-stream` decoding.
//!
//! Bytes arrive in arbitrary chunks; [`SseDecoder`] buffers them and yields one
//! [`SseFrame`] per blank-line-terminated block. Comment lines (the backend's
//! `: heartbeat`) and frames without a `data` field produce nothing.

use std::fmt;

use crate::error::ChannelError;

/// Upper bound on bytes buffered while waiting for a frame boundary.
pub const MAX_FRAME_BUFFER_BYTES: usize = 4 * 1024 * 1024;

const DEFAULT_EVENT: &str = "message";

/// One dispatched server-sent event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SseFrame {
    pub event: String,
    pub data: String,
}

/// A frame that arrived but could not be read as text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FrameError {
    pub len: usize,
}

impl fmt::Display for FrameError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "frame of {} bytes is not valid UTF-8", self.len)
    }
}

impl std::error::Error for FrameError {}

#[derive(Debug)]
pub struct SseDecoder {
    buffer: Vec<u8>,
    limit: usize,
}

impl Default for SseDecoder {
    fn default() -> Self {
        Self::new()
    }
}

impl SseDecoder {
    #[must_use]
    pub fn new() -> Self {
        Self::with_limit(MAX_FRAME_BUFFER_BYTES)
    }

    #[must_use]
    pub fn with_limit(limit: usize) -> Self {
        Self {
            buffer: Vec::new(),
            limit,
        }
    }

    /// Append a chunk. Fails once the undelivered remainder exceeds the limit.
    pub fn extend(&mut self, chunk: &[u8]) -> Result<(), ChannelError> {
        self.buffer.extend_from_slice(chunk);
        if self.buffer.len() > self.limit && find_frame_boundary(&self.buffer).is_none() {
            return Err(ChannelError::BufferOverflow(self.limit));
        }
        Ok(())
    }

    /// Next complete frame, skipping blocks that carry no data.
    pub fn next_frame(&mut self) -> Option<Result<SseFrame, FrameError>> {
        loop {
            let raw = drain_next_frame(&mut self.buffer)?;
            let Ok(text) = std::str::from_utf8(&raw) else {
                return Some(Err(FrameError { len: raw.len() }));
            };
            if let Some(frame) = parse_frame(text) {
                return Some(Ok(frame));
            }
        }
    }

    #[must_use]
    pub fn buffered(&self) -> usize {
        self.buffer.len()
    }
}

fn find_frame_boundary(buffer: &[u8]) -> Option<(usize, usize)> {
    let lf = buffer.windows(2).position(|w| w == b"\n\n");
    let crlf = buffer.windows(4).position(|w| w == b"\r\n\r\n");
    match (lf, crlf) {
        (Some(a), Some(b)) if b < a => Some((b, 4)),
        (Some(a), _) => Some((a, 2)),
        (None, Some(b)) => Some((b, 4)),
        (None, None) => None,
    }
}

fn drain_next_frame(buffer: &mut Vec<u8>) -> Option<Vec<u8>> {
    let (pos, delim_len) = find_frame_boundary(buffer)?;
    let frame = buffer[..pos].to_vec();
    buffer.drain(..pos + delim_len);
    Some(frame)
}

fn parse_frame(block: &str) -> Option<SseFrame> {
    let mut event = None;
    let mut data = String::new();
    let mut has_data = false;

    for line in block.lines() {
        let line = line.strip_suffix('\r').unwrap_or(line);
        if line.is_empty() || line.starts_with(':') {
            continue;
        }
        let (field, value) = match line.split_once(':') {
            Some((field, value)) => (field, value.strip_prefix(' ').unwrap_or(value)),
            None => (line, ""),
        };
        match field {
            "event" => event = Some(value.to_string()),
            "data" => {
                if has_data {
                    data.push('\n');
                }
                data.push_str(value);
                has_data = true;
            }
            _ => {}
        }
    }

    has_data.then(|| SseFrame {
        event: event
            .filter(|name| !name.is_empty())
            .unwrap_or_else(|| DEFAULT_EVENT.to_string()),
        data,
    })
}
