//! Framed I/O for the MRP wire.
//!
//! Every wire unit is a CRLF-terminated text line: plaintext in `PLAIN`
//! mode, base64 ciphertext otherwise. This module provides buffered
//! reading and writing of those units; the cipher layer sits above it.

#![allow(clippy::missing_errors_doc)]

use std::io;

use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWrite, AsyncWriteExt, BufReader};

use crate::Result;

/// Default buffer size for reading.
const DEFAULT_BUFFER_SIZE: usize = 8192;

/// Maximum unit length to prevent memory exhaustion.
const MAX_LINE_LENGTH: usize = 1024 * 1024; // 1 MB

/// The protocol's line terminator.
pub(crate) const LINE_TERMINATOR: &str = "\r\n";

/// Framed connection carrying CRLF-terminated units.
pub struct FramedStream<S> {
    reader: BufReader<S>,
}

impl<S> FramedStream<S>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    /// Creates a new framed stream.
    pub fn new(stream: S) -> Self {
        Self {
            reader: BufReader::with_capacity(DEFAULT_BUFFER_SIZE, stream),
        }
    }

    /// Reads one full unit, blocking until its terminator arrives.
    ///
    /// The terminator is stripped; the unit must be valid UTF-8 (always
    /// true on a conforming wire, where ciphertext travels as base64).
    pub async fn read_unit(&mut self) -> Result<String> {
        let mut unit = Vec::new();

        loop {
            let buf = self.reader.fill_buf().await?;
            if buf.is_empty() {
                return Err(crate::Error::Io(io::Error::new(
                    io::ErrorKind::UnexpectedEof,
                    "connection closed",
                )));
            }

            // Terminator split across reads: the CR was accumulated in an
            // earlier pass and the LF leads this one.
            if unit.last() == Some(&b'\r') && buf[0] == b'\n' {
                unit.pop();
                self.reader.consume(1);
                break;
            }

            if let Some(pos) = find_crlf(buf) {
                unit.extend_from_slice(&buf[..pos]);
                self.reader.consume(pos + 2);
                break;
            }

            let len = buf.len();
            unit.extend_from_slice(buf);
            self.reader.consume(len);

            if unit.len() > MAX_LINE_LENGTH {
                return Err(crate::Error::Protocol("line too long".to_owned()));
            }
        }

        Ok(String::from_utf8(unit)?)
    }

    /// Writes one unit plus the terminator, then flushes.
    pub async fn write_unit(&mut self, unit: &str) -> Result<()> {
        let stream = self.reader.get_mut();
        stream.write_all(unit.as_bytes()).await?;
        stream.write_all(LINE_TERMINATOR.as_bytes()).await?;
        stream.flush().await?;
        Ok(())
    }

    /// Gets a reference to the underlying stream.
    pub fn get_ref(&self) -> &S {
        self.reader.get_ref()
    }

    /// Gets a mutable reference to the underlying stream.
    pub fn get_mut(&mut self) -> &mut S {
        self.reader.get_mut()
    }

    /// Consumes the framed stream and returns the inner stream.
    ///
    /// Note: Any buffered data will be lost.
    pub fn into_inner(self) -> S {
        self.reader.into_inner()
    }
}

/// Finds the position of CRLF in a buffer.
fn find_crlf(buf: &[u8]) -> Option<usize> {
    buf.windows(2).position(|w| w == b"\r\n")
}

#[cfg(test)]
#[allow(
    clippy::unwrap_used,
    clippy::redundant_clone,
    clippy::manual_string_new,
    clippy::needless_collect,
    clippy::unreadable_literal,
    clippy::used_underscore_items,
    clippy::similar_names
)]
mod tests {
    use super::*;

    #[test]
    fn test_find_crlf() {
        assert_eq!(find_crlf(b"hello\r\nx"), Some(5));
        assert_eq!(find_crlf(b"\r\n"), Some(0));
        assert_eq!(find_crlf(b"no newline"), None);
        assert_eq!(find_crlf(b"just\n"), None);
        assert_eq!(find_crlf(b"just\r"), None);
    }

    #[tokio::test]
    async fn test_read_simple_unit() {
        use tokio_test::io::Builder;

        let mock = Builder::new().read(b"OK MRS ready\r\n").build();
        let mut framed = FramedStream::new(mock);

        assert_eq!(framed.read_unit().await.unwrap(), "OK MRS ready");
    }

    #[tokio::test]
    async fn test_read_unit_split_across_reads() {
        use tokio_test::io::Builder;

        let mock = Builder::new()
            .read(b"OK par")
            .read(b"tial\r")
            .read(b"\nnext\r\n")
            .build();
        let mut framed = FramedStream::new(mock);

        assert_eq!(framed.read_unit().await.unwrap(), "OK partial");
        assert_eq!(framed.read_unit().await.unwrap(), "next");
    }

    #[tokio::test]
    async fn test_read_two_units_from_one_chunk() {
        use tokio_test::io::Builder;

        let mock = Builder::new().read(b"first\r\nsecond\r\n").build();
        let mut framed = FramedStream::new(mock);

        assert_eq!(framed.read_unit().await.unwrap(), "first");
        assert_eq!(framed.read_unit().await.unwrap(), "second");
    }

    #[tokio::test]
    async fn test_eof_is_an_error() {
        use tokio::io::AsyncWriteExt;

        let (client, mut server) = tokio::io::duplex(64);
        server.write_all(b"half a line").await.unwrap();
        drop(server);

        let mut framed = FramedStream::new(client);
        assert!(framed.read_unit().await.is_err());
    }

    #[tokio::test]
    async fn test_write_unit_appends_terminator() {
        use tokio_test::io::Builder;

        let mock = Builder::new().write(b"FETCH 1").write(b"\r\n").build();
        let mut framed = FramedStream::new(mock);

        framed.write_unit("FETCH 1").await.unwrap();
    }
}
