//! Stream framing for the stdio binding.
//!
//! Two framings are supported:
//!
//! - **Newline**: one message per line, `\r\n` tolerated, blank lines skipped.
//!   An oversized line is reported as [`Frame::Oversized`] and discarded up to
//!   the next newline so the stream stays usable.
//! - **Content-Length**: an LSP style header block (`Content-Length: N`,
//!   terminated by an empty line) followed by exactly `N` bytes. A bad header or
//!   an oversized body is a hard error since the stream can no longer be
//!   resynchronised.

use std::io;

use bytes::{Buf, BufMut, Bytes, BytesMut};
use gitmcp_transport_traits::{MAX_MESSAGE_SIZE, StdioFraming};
use tokio_util::codec::{Decoder, Encoder};

/// Header blocks larger than this are treated as garbage.
const MAX_HEADER_SIZE: usize = 8 * 1024;

/// A decoded unit from the input stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Frame {
    /// A complete message payload.
    Message(Bytes),
    /// A newline-framed message that exceeded the size limit and was dropped.
    Oversized(usize),
}

/// Codec for both stdio framings.
#[derive(Debug, Clone)]
pub struct StdioCodec {
    framing: StdioFraming,
    max_size: usize,
    // newline state
    next_index: usize,
    discarding: Option<usize>,
    // content-length state
    pending_body: Option<usize>,
}

impl StdioCodec {
    /// Codec for `framing` with the default 10 MiB limit.
    pub fn new(framing: StdioFraming) -> Self {
        Self::with_max_size(framing, MAX_MESSAGE_SIZE)
    }

    /// Codec with a custom message size limit.
    pub fn with_max_size(framing: StdioFraming, max_size: usize) -> Self {
        Self {
            framing,
            max_size,
            next_index: 0,
            discarding: None,
            pending_body: None,
        }
    }

    /// Framing this codec speaks.
    pub const fn framing(&self) -> StdioFraming {
        self.framing
    }

    /// Whether `payload` can be written as one frame.
    ///
    /// Newline framing cannot carry a payload with an embedded line break;
    /// Content-Length framing carries anything.
    pub fn check_encodable(&self, payload: &[u8]) -> io::Result<()> {
        match self.framing {
            StdioFraming::Newline => line_body(payload).map(|_| ()),
            StdioFraming::ContentLength => Ok(()),
        }
    }

    fn decode_line(&mut self, buf: &mut BytesMut) -> io::Result<Option<Frame>> {
        loop {
            if let Some(dropped) = self.discarding {
                match buf.iter().position(|b| *b == b'\n') {
                    Some(offset) => {
                        buf.advance(offset + 1);
                        self.discarding = None;
                        return Ok(Some(Frame::Oversized(dropped + offset)));
                    }
                    None => {
                        self.discarding = Some(dropped + buf.len());
                        buf.clear();
                        return Ok(None);
                    }
                }
            }

            let read_to = buf.len().min(self.max_size.saturating_add(1));
            let newline = buf[self.next_index..read_to]
                .iter()
                .position(|b| *b == b'\n');

            match newline {
                Some(offset) => {
                    let end = self.next_index + offset;
                    self.next_index = 0;
                    let line = buf.split_to(end + 1);
                    if let Some(payload) = trim_line(&line[..end]) {
                        return Ok(Some(Frame::Message(payload)));
                    }
                    // blank line, keep going
                }
                None if buf.len() > self.max_size => {
                    self.next_index = 0;
                    self.discarding = Some(0);
                }
                None => {
                    self.next_index = read_to;
                    return Ok(None);
                }
            }
        }
    }

    fn decode_content_length(&mut self, buf: &mut BytesMut) -> io::Result<Option<Frame>> {
        let body_len = match self.pending_body {
            Some(len) => len,
            None => {
                let Some((header_end, terminator)) = find_header_end(buf) else {
                    if buf.len() > MAX_HEADER_SIZE {
                        return Err(invalid_data("header block exceeds 8 KiB"));
                    }
                    return Ok(None);
                };
                let header = buf.split_to(header_end + terminator);
                let len = parse_content_length(&header[..header_end])?;
                if len > self.max_size {
                    return Err(invalid_data(format!(
                        "frame of {len} bytes exceeds the {} byte limit",
                        self.max_size
                    )));
                }
                self.pending_body = Some(len);
                len
            }
        };

        if buf.len() < body_len {
            buf.reserve(body_len - buf.len());
            return Ok(None);
        }
        self.pending_body = None;
        Ok(Some(Frame::Message(buf.split_to(body_len).freeze())))
    }
}

impl Decoder for StdioCodec {
    type Item = Frame;
    type Error = io::Error;

    fn decode(&mut self, buf: &mut BytesMut) -> io::Result<Option<Frame>> {
        match self.framing {
            StdioFraming::Newline => self.decode_line(buf),
            StdioFraming::ContentLength => self.decode_content_length(buf),
        }
    }

    fn decode_eof(&mut self, buf: &mut BytesMut) -> io::Result<Option<Frame>> {
        if let Some(frame) = self.decode(buf)? {
            return Ok(Some(frame));
        }
        match self.framing {
            // A final line without a trailing newline still counts.
            StdioFraming::Newline => {
                self.next_index = 0;
                if self.discarding.take().is_some() || buf.is_empty() {
                    buf.clear();
                    return Ok(None);
                }
                let rest = buf.split();
                Ok(trim_line(&rest).map(Frame::Message))
            }
            StdioFraming::ContentLength => {
                if buf.is_empty() && self.pending_body.is_none() {
                    Ok(None)
                } else {
                    Err(io::Error::new(
                        io::ErrorKind::UnexpectedEof,
                        "stream ended inside a Content-Length frame",
                    ))
                }
            }
        }
    }
}

impl Encoder<Bytes> for StdioCodec {
    type Error = io::Error;

    fn encode(&mut self, payload: Bytes, dst: &mut BytesMut) -> io::Result<()> {
        match self.framing {
            StdioFraming::Newline => {
                let body = line_body(&payload)?;
                dst.reserve(body.len() + 1);
                dst.put_slice(body);
                dst.put_u8(b'\n');
            }
            StdioFraming::ContentLength => {
                let header = format!("Content-Length: {}\r\n\r\n", payload.len());
                dst.reserve(header.len() + payload.len());
                dst.put_slice(header.as_bytes());
                dst.put_slice(&payload);
            }
        }
        Ok(())
    }
}

/// The part of `payload` written before the newline terminator.
fn line_body(payload: &[u8]) -> io::Result<&[u8]> {
    let body = payload
        .strip_suffix(b"\n")
        .map_or(payload, |b| b.strip_suffix(b"\r").unwrap_or(b));
    if body.contains(&b'\n') {
        return Err(invalid_data("newline-framed message contains an embedded newline"));
    }
    Ok(body)
}

fn trim_line(line: &[u8]) -> Option<Bytes> {
    let trimmed = line.trim_ascii();
    if trimmed.is_empty() {
        None
    } else {
        Some(Bytes::copy_from_slice(trimmed))
    }
}

/// Position of the blank line ending a header block, and the terminator length.
fn find_header_end(buf: &[u8]) -> Option<(usize, usize)> {
    let crlf = buf.windows(4).position(|w| w == b"\r\n\r\n").map(|i| (i, 4));
    let lf = buf.windows(2).position(|w| w == b"\n\n").map(|i| (i, 2));
    match (crlf, lf) {
        (Some(a), Some(b)) => Some(if a.0 <= b.0 { a } else { b }),
        (a, b) => a.or(b),
    }
}

fn parse_content_length(header: &[u8]) -> io::Result<usize> {
    let header =
        std::str::from_utf8(header).map_err(|_| invalid_data("header block is not UTF-8"))?;
    for line in header.lines() {
        let Some((name, value)) = line.split_once(':') else {
            continue;
        };
        if name.trim().eq_ignore_ascii_case("content-length") {
            return value
                .trim()
                .parse()
                .map_err(|_| invalid_data(format!("invalid Content-Length value {:?}", value.trim())));
        }
    }
    Err(invalid_data("missing Content-Length header"))
}

fn invalid_data(msg: impl Into<String>) -> io::Error {
    io::Error::new(io::ErrorKind::InvalidData, msg.into())
}
