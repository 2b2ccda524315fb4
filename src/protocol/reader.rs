//! Line and Request Reader
//!
//! Turns a byte stream into CRLF-terminated lines and lines into requests.
//!
//! ## Line Rules
//!
//! - The terminator is strictly `\r\n`. A lone `\n` is ordinary content.
//! - Empty lines are skipped; `read_line` never returns one.
//! - End of stream with nothing buffered is a clean close (`Ok(None)`).
//!   End of stream in the middle of a line is an error.
//! - A line longer than [`MAX_LINE_LENGTH`] fails as soon as the limit is
//!   crossed, whether or not a terminator ever arrives.
//!
//! ## Request Framing
//!
//! ```text
//! *<N>\r\n              header: element count
//! $<len>\r\n            size line, read and ignored
//! <content>\r\n         element
//! ... N times
//! ```
//!
//! The advertised count is trusted and the size lines are not checked against
//! the content: every element is exactly two lines.

use bytes::Bytes;
use std::io;
use thiserror::Error;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncReadExt};
use tracing::trace;

use crate::protocol::reply::{prefix, CRLF};

/// Maximum length of a single line, excluding the terminator (64 KB)
pub const MAX_LINE_LENGTH: usize = 64 * 1024;

/// Errors that can occur while reading requests.
#[derive(Debug, Error)]
pub enum ProtocolError {
    /// I/O error on the underlying stream
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// The stream ended before a line or request was complete
    #[error("unexpected end of stream")]
    UnexpectedEof,

    /// A line grew past the size limit without a terminator
    #[error("line exceeds {max} bytes")]
    LineTooLong { max: usize },

    /// A request line that does not start with `*`
    #[error("unknown line command '{0}'")]
    NotAnArray(String),

    /// The array header's count is not a non-negative integer
    #[error("invalid array size '{0}'")]
    InvalidArraySize(String),
}

impl ProtocolError {
    /// Returns true if the connection can keep reading after this error.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            ProtocolError::NotAnArray(_) | ProtocolError::InvalidArraySize(_)
        )
    }
}

/// A decoded request: the elements of one array, command name first.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Request {
    parts: Vec<Bytes>,
}

impl Request {
    pub fn new(parts: Vec<Bytes>) -> Self {
        Self { parts }
    }

    /// The command name, if the array was not empty.
    pub fn name(&self) -> Option<&Bytes> {
        self.parts.first()
    }

    /// The elements after the command name.
    pub fn args(&self) -> &[Bytes] {
        self.parts.get(1..).unwrap_or_default()
    }

    /// Number of elements the array declared, command name included.
    pub fn len(&self) -> usize {
        self.parts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.parts.is_empty()
    }
}

impl<S: Into<Bytes>> FromIterator<S> for Request {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        Self::new(iter.into_iter().map(Into::into).collect())
    }
}

/// Reads lines and requests from a buffered async stream.
///
/// # Example
///
/// ```
/// # tokio_test::block_on(async {
/// use snapkv::protocol::LineReader;
///
/// let mut reader = LineReader::new(&b"*1\r\n$4\r\nPING\r\n"[..]);
/// let request = reader.read_request().await.unwrap().unwrap();
/// assert_eq!(request.name().unwrap(), "PING");
/// # })
/// ```
#[derive(Debug)]
pub struct LineReader<R> {
    reader: R,
}

impl<R: AsyncBufRead + Unpin> LineReader<R> {
    pub fn new(reader: R) -> Self {
        Self { reader }
    }

    /// Reads the next non-empty CRLF-terminated line, without the terminator.
    ///
    /// Returns `Ok(None)` if the stream ends cleanly between lines.
    pub async fn read_line(&mut self) -> Result<Option<Bytes>, ProtocolError> {
        let mut line = Vec::new();

        loop {
            // One byte past the limit is enough to detect an overlong line.
            let budget = (MAX_LINE_LENGTH + CRLF.len() + 1 - line.len()) as u64;
            let n = (&mut self.reader)
                .take(budget)
                .read_until(b'\n', &mut line)
                .await?;
            if n == 0 {
                return if line.is_empty() {
                    Ok(None)
                } else {
                    Err(ProtocolError::UnexpectedEof)
                };
            }

            if line.len() > MAX_LINE_LENGTH + CRLF.len() {
                return Err(ProtocolError::LineTooLong {
                    max: MAX_LINE_LENGTH,
                });
            }

            if line.ends_with(CRLF) {
                line.truncate(line.len() - CRLF.len());
                if line.is_empty() {
                    continue;
                }
                trace!(line = %String::from_utf8_lossy(&line), "Read line");
                return Ok(Some(Bytes::from(line)));
            }
            // A bare LF is content; keep reading into the same line.
        }
    }

    /// Reads a line that must be present.
    async fn expect_line(&mut self) -> Result<Bytes, ProtocolError> {
        self.read_line().await?.ok_or(ProtocolError::UnexpectedEof)
    }

    /// Reads one array request.
    ///
    /// Returns `Ok(None)` if the stream ends cleanly before a header line.
    pub async fn read_request(&mut self) -> Result<Option<Request>, ProtocolError> {
        let Some(header) = self.read_line().await? else {
            return Ok(None);
        };

        let Some(count) = header.strip_prefix(&[prefix::ARRAY]) else {
            return Err(ProtocolError::NotAnArray(
                String::from_utf8_lossy(&header).into_owned(),
            ));
        };

        let count: usize = std::str::from_utf8(count)
            .ok()
            .and_then(|s| s.parse().ok())
            .ok_or_else(|| {
                ProtocolError::InvalidArraySize(String::from_utf8_lossy(count).into_owned())
            })?;

        let mut parts = Vec::with_capacity(count.min(16));
        for _ in 0..count {
            // Size line: framing only
            self.expect_line().await?;
            parts.push(self.expect_line().await?);
        }

        Ok(Some(Request::new(parts)))
    }
}
