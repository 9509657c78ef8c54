// src/core/protocol/codec.rs

//! A `tokio_util::codec` implementation that turns the inbound byte stream into
//! batches of parsed messages and writes replies as CRLF-terminated lines.

use super::message::{FramingPolicy, Message, parse_buffer};
use crate::core::LineWireError;
use bytes::BytesMut;
use tokio_util::codec::{Decoder, Encoder};

/// The line terminator appended to every outbound reply.
const CRLF: &[u8] = b"\r\n";

/// The largest single receive the whole-buffer policy will treat as one message.
pub const MAX_READ_CHUNK: usize = 512;

/// Default limit for an unterminated line buffered under the lines policy.
pub const DEFAULT_MAX_LINE: usize = 64 * 1024;

/// Decodes inbound bytes into message batches according to a [`FramingPolicy`].
///
/// Each decoded item is the batch of messages carried by one chunk of text,
/// in the order they appear. A batch may be empty when the chunk held only
/// whitespace.
#[derive(Debug, Clone)]
pub struct CommandCodec {
    policy: FramingPolicy,
    read_chunk: usize,
    max_line: usize,
}

impl CommandCodec {
    /// Creates a codec for `policy`. `read_chunk` is clamped to `1..=512`.
    pub fn new(policy: FramingPolicy, read_chunk: usize, max_line: usize) -> Self {
        let read_chunk = read_chunk.clamp(1, MAX_READ_CHUNK);
        Self {
            policy,
            read_chunk,
            max_line: max_line.max(1),
        }
    }

    pub fn policy(&self) -> FramingPolicy {
        self.policy
    }

    /// The buffer capacity a `Framed` wrapping this codec should start with.
    pub fn read_chunk(&self) -> usize {
        self.read_chunk
    }

    fn decode_chunk(&self, src: &mut BytesMut) -> Result<Option<Vec<Message>>, LineWireError> {
        let Some(len) = utf8_prefix_len(src, self.read_chunk)? else {
            return Ok(None);
        };
        let chunk = src.split_to(len);
        let text = std::str::from_utf8(&chunk)?;
        Ok(Some(parse_buffer(text, FramingPolicy::WholeBuffer)))
    }

    fn decode_lines(&self, src: &mut BytesMut) -> Result<Option<Vec<Message>>, LineWireError> {
        let Some(last_newline) = src.iter().rposition(|b| *b == b'\n') else {
            if src.len() > self.max_line {
                return Err(LineWireError::LineTooLong(self.max_line));
            }
            return Ok(None);
        };
        let lines = src.split_to(last_newline + 1);
        let text = std::str::from_utf8(&lines)?;
        Ok(Some(parse_buffer(text, FramingPolicy::Lines)))
    }
}

impl Decoder for CommandCodec {
    type Item = Vec<Message>;
    type Error = LineWireError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        if src.is_empty() {
            return Ok(None);
        }
        match self.policy {
            FramingPolicy::WholeBuffer => self.decode_chunk(src),
            FramingPolicy::Lines => self.decode_lines(src),
        }
    }

    /// At end of stream any complete data is decoded as usual. What remains is
    /// either an unterminated final line, which is parsed as-is, or a truncated
    /// UTF-8 sequence, which is a decoding fault.
    fn decode_eof(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        if let Some(batch) = self.decode(src)? {
            return Ok(Some(batch));
        }
        if src.is_empty() {
            return Ok(None);
        }
        let rest = src.split();
        let text = std::str::from_utf8(&rest)?;
        Ok(Some(parse_buffer(text, self.policy)))
    }
}

impl Encoder<String> for CommandCodec {
    type Error = LineWireError;

    fn encode(&mut self, item: String, dst: &mut BytesMut) -> Result<(), Self::Error> {
        dst.reserve(item.len() + CRLF.len());
        dst.extend_from_slice(item.as_bytes());
        dst.extend_from_slice(CRLF);
        Ok(())
    }
}

/// Returns the length of the longest valid UTF-8 prefix of `buf` no longer than
/// `limit`, never splitting a character. `Ok(None)` means more bytes are needed.
fn utf8_prefix_len(buf: &[u8], limit: usize) -> Result<Option<usize>, LineWireError> {
    let take = buf.len().min(limit);
    match std::str::from_utf8(&buf[..take]) {
        Ok(_) => Ok(Some(take)),
        Err(e) if e.error_len().is_some() => Err(LineWireError::Decoding),
        Err(e) if e.valid_up_to() > 0 => Ok(Some(e.valid_up_to())),
        // The first character alone is wider than `limit`, or not yet complete.
        Err(_) => {
            let width = utf8_char_width(buf[0]);
            if buf.len() < width {
                return Ok(None);
            }
            std::str::from_utf8(&buf[..width])?;
            Ok(Some(width))
        }
    }
}

fn utf8_char_width(lead: u8) -> usize {
    match lead {
        0x00..=0x7F => 1,
        0xC0..=0xDF => 2,
        0xE0..=0xEF => 3,
        _ => 4,
    }
}
