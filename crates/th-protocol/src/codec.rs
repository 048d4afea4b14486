//! Tokio codec for the Asterisk Manager Interface
//!
//! AMI is a CRLF line protocol. The server greets with a single banner line
//! (`Asterisk Call Manager/5.0.1`), after which every message is a block of
//! `Key: Value` lines terminated by an empty line.

use bytes::{BufMut, BytesMut};
use tokio_util::codec::{Decoder, Encoder};

use crate::error::ProtocolError;

/// Maximum length of a single AMI line in bytes
pub const MAX_LINE_LENGTH: usize = 64 * 1024;

/// AMI line terminator
pub const LINE_TERMINATOR: &str = "\r\n";

/// A unit decoded from the AMI byte stream
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AmiFrame {
    /// The greeting line sent once per connection
    Banner(String),
    /// Trimmed non-empty lines up to a blank line, each suffixed with CRLF.
    /// Empty when a blank line arrives with nothing accumulated.
    Block(String),
}

/// An action sent to the manager interface
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AmiAction {
    name: String,
    headers: Vec<(String, String)>,
}

impl AmiAction {
    /// Create an action with no headers
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            headers: Vec::new(),
        }
    }

    /// Append a header line
    pub fn header(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((key.into(), value.into()));
        self
    }

    /// The `Login` action
    pub fn login(username: &str, secret: &str) -> Self {
        Self::new("Login")
            .header("Username", username)
            .header("Secret", secret)
    }
}

/// Codec splitting the AMI stream into banner and blocks, and encoding actions
#[derive(Debug)]
pub struct AmiCodec {
    /// Whether the next line is the server banner
    banner_pending: bool,
    /// Block accumulated so far
    block: String,
    /// Offset already scanned for a newline
    next_index: usize,
}

impl Default for AmiCodec {
    fn default() -> Self {
        Self::new()
    }
}

impl AmiCodec {
    /// Create a codec for a fresh connection (expects the banner first)
    pub fn new() -> Self {
        Self {
            banner_pending: true,
            block: String::new(),
            next_index: 0,
        }
    }

    /// Create a codec for a stream that carries no banner
    pub fn without_banner() -> Self {
        Self {
            banner_pending: false,
            ..Self::new()
        }
    }
}

impl Decoder for AmiCodec {
    type Item = AmiFrame;
    type Error = ProtocolError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        loop {
            let newline = src[self.next_index..].iter().position(|b| *b == b'\n');

            let Some(offset) = newline else {
                if src.len() > MAX_LINE_LENGTH {
                    return Err(ProtocolError::LineTooLong {
                        size: src.len(),
                        max: MAX_LINE_LENGTH,
                    });
                }
                // Need more data
                self.next_index = src.len();
                return Ok(None);
            };

            let line_len = self.next_index + offset;
            self.next_index = 0;
            if line_len > MAX_LINE_LENGTH {
                return Err(ProtocolError::LineTooLong {
                    size: line_len,
                    max: MAX_LINE_LENGTH,
                });
            }

            let raw = src.split_to(line_len + 1);
            let text = String::from_utf8_lossy(&raw[..line_len]);
            let line = text.trim();

            if self.banner_pending {
                self.banner_pending = false;
                return Ok(Some(AmiFrame::Banner(line.to_string())));
            }

            if line.is_empty() {
                return Ok(Some(AmiFrame::Block(std::mem::take(&mut self.block))));
            }

            self.block.push_str(line);
            self.block.push_str(LINE_TERMINATOR);
        }
    }

    fn decode_eof(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        match self.decode(src)? {
            Some(frame) => Ok(Some(frame)),
            None => {
                // An unterminated block is never surfaced
                if !src.is_empty() || !self.block.is_empty() {
                    tracing::debug!(
                        pending_bytes = src.len() + self.block.len(),
                        "Dropping partial AMI block at end of stream"
                    );
                }
                src.clear();
                self.block.clear();
                self.next_index = 0;
                Ok(None)
            }
        }
    }
}

impl Encoder<AmiAction> for AmiCodec {
    type Error = ProtocolError;

    fn encode(&mut self, action: AmiAction, dst: &mut BytesMut) -> Result<(), Self::Error> {
        let lines = std::iter::once(("Action", action.name.as_str()))
            .chain(action.headers.iter().map(|(k, v)| (k.as_str(), v.as_str())));

        for (key, value) in lines {
            if [key, value].iter().any(|s| s.contains(['\r', '\n'])) {
                return Err(ProtocolError::InvalidAction(format!(
                    "line break in header {key:?}"
                )));
            }
            dst.reserve(key.len() + value.len() + 4);
            dst.put_slice(key.as_bytes());
            dst.put_slice(b": ");
            dst.put_slice(value.as_bytes());
            dst.put_slice(LINE_TERMINATOR.as_bytes());
        }
        dst.put_slice(LINE_TERMINATOR.as_bytes());

        Ok(())
    }
}
