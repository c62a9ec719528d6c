//! Server-Sent Events framing.
//!
//! Splits a raw byte stream into [`SseFrame`]s. Chunk boundaries may fall
//! anywhere, including inside a multi-byte character; bytes are held until a
//! full line is available.

use bytes::{Buf, BytesMut};

use crate::config::DEFAULT_MAX_RECORD_BYTES;
use crate::error::StreamError;

/// Raw SSE frame with optional event type, data payload and id
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SseFrame {
    /// Event type (from `event:` line)
    pub event: Option<String>,
    /// Data payload (from `data:` lines, may be multiline)
    pub data: String,
    /// Event id (from `id:` line)
    pub id: Option<String>,
}

/// SSE decoder that parses raw bytes into frames
///
/// Handles:
/// - Multi-line data (multiple `data:` lines)
/// - Chunk boundaries splitting lines, or characters
/// - Comments (`:` prefix) and unknown fields, which are ignored
/// - Records without any `data:` line, which are dropped
/// - Records larger than the configured limit, which are dropped with a
///   framing error
///
/// A record's size is the byte length of its lines, excluding line
/// terminators. The same bytes give the same frames and errors however they
/// are split into chunks.
#[derive(Debug)]
pub struct SSEDecoder {
    buffer: BytesMut,
    current: SseFrame,
    has_data: bool,
    record_bytes: usize,
    discarding: bool,
    skip_line: bool,
    max_record_bytes: usize,
    errors: Vec<StreamError>,
}

impl Default for SSEDecoder {
    fn default() -> Self {
        Self::with_limit(DEFAULT_MAX_RECORD_BYTES)
    }
}

impl SSEDecoder {
    /// Create a new decoder
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a decoder that drops records larger than `max_record_bytes`
    #[must_use]
    pub fn with_limit(max_record_bytes: usize) -> Self {
        Self {
            buffer: BytesMut::new(),
            current: SseFrame::default(),
            has_data: false,
            record_bytes: 0,
            discarding: false,
            skip_line: false,
            max_record_bytes,
            errors: Vec::new(),
        }
    }

    /// Push a chunk of bytes and return any complete frames
    ///
    /// Framing errors are kept for [`take_errors`](Self::take_errors).
    pub fn push(&mut self, chunk: &[u8]) -> Vec<SseFrame> {
        let mut frames = Vec::new();
        for item in self.decode(chunk) {
            match item {
                Ok(frame) => frames.push(frame),
                Err(err) => self.errors.push(err),
            }
        }
        frames
    }

    /// Push a chunk of bytes and return frames and framing errors in the
    /// order they occur in the stream
    pub fn decode(&mut self, chunk: &[u8]) -> Vec<Result<SseFrame, StreamError>> {
        self.buffer.extend_from_slice(chunk);

        let mut items = Vec::new();
        while let Some(newline_pos) = self.buffer.iter().position(|&b| b == b'\n') {
            let raw = self.buffer.split_to(newline_pos);
            self.buffer.advance(1);
            // Remainder of a line that was already cut short
            if std::mem::take(&mut self.skip_line) {
                continue;
            }
            let content = raw.strip_suffix(b"\r").unwrap_or(&raw[..]);
            let frame = self.process_line(&String::from_utf8_lossy(content), content.len());
            items.extend(self.errors.drain(..).map(Err));
            if let Some(frame) = frame {
                items.push(Ok(frame));
            }
        }

        self.bound_partial_line();
        items.extend(self.errors.drain(..).map(Err));
        items
    }

    /// Flush any remaining data as a final frame
    ///
    /// Processes an incomplete trailing line, then emits the pending record
    /// if it has data.
    pub fn flush(&mut self) -> Option<SseFrame> {
        if std::mem::take(&mut self.skip_line) {
            self.buffer.clear();
        }
        if !self.buffer.is_empty() {
            let raw = self.buffer.split();
            let content = raw.strip_suffix(b"\r").unwrap_or(&raw[..]);
            if let Some(frame) = self.process_line(&String::from_utf8_lossy(content), content.len())
            {
                return Some(frame);
            }
        }
        self.process_line("", 0)
    }

    /// Take the framing errors recorded since the last call
    pub fn take_errors(&mut self) -> Vec<StreamError> {
        std::mem::take(&mut self.errors)
    }

    /// Drops an unterminated line once it is known to be discarded, so a
    /// peer that never sends a newline cannot grow the buffer without bound.
    fn bound_partial_line(&mut self) {
        if self.skip_line {
            self.buffer.clear();
            return;
        }
        // A lone trailing CR may still turn out to be a blank line
        let pending = self.buffer.len() - usize::from(self.buffer.last() == Some(&b'\r'));
        if pending == 0 {
            return;
        }
        if self.discarding {
            self.buffer.clear();
            self.skip_line = true;
        } else if self.record_bytes + pending > self.max_record_bytes {
            self.buffer.clear();
            self.skip_line = true;
            self.overflow();
        }
    }

    fn process_line(&mut self, line: &str, len: usize) -> Option<SseFrame> {
        if line.is_empty() {
            // Blank line = end of record
            self.discarding = false;
            self.record_bytes = 0;
            let frame = std::mem::take(&mut self.current);
            if std::mem::take(&mut self.has_data) {
                return Some(frame);
            }
            return None;
        }
        if self.discarding {
            return None;
        }
        self.record_bytes += len;
        if self.record_bytes > self.max_record_bytes {
            self.overflow();
            return None;
        }
        if line.starts_with(':') {
            return None;
        }

        let (field, value) = match line.split_once(':') {
            Some((field, value)) => (field, value.strip_prefix(' ').unwrap_or(value)),
            None => (line, ""),
        };
        match field {
            "event" => self.current.event = Some(value.trim().to_string()),
            "data" => {
                if self.has_data {
                    self.current.data.push('\n');
                }
                self.current.data.push_str(value);
                self.has_data = true;
            }
            "id" => self.current.id = Some(value.to_string()),
            // retry: and unknown fields are ignored
            _ => {}
        }
        None
    }

    fn overflow(&mut self) {
        tracing::warn!(
            limit = self.max_record_bytes,
            "SSE record exceeds size limit, discarding"
        );
        self.current = SseFrame::default();
        self.has_data = false;
        self.discarding = true;
        self.errors.push(StreamError::Framing {
            reason: format!("record exceeds {} bytes", self.max_record_bytes),
        });
    }
}
