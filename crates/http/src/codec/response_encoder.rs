//! HTTP response encoder
//!
//! Serializes a complete `http::Response<Bytes>` into raw bytes: status line,
//! headers with an automatically managed Content-Length, and the body. Only
//! HTTP/1.1 responses are supported.

use bytes::{BufMut, Bytes, BytesMut};
use http::{header, HeaderValue, Response, Version};
use std::io;
use std::io::Write;
use tokio_util::codec::Encoder;
use tracing::error;

use crate::protocol::SendError;

/// Initial buffer size reserved for header serialization
const INIT_HEADER_SIZE: usize = 4 * 1024;

/// Encoder for complete HTTP responses implementing the [`Encoder`] trait.
#[derive(Debug, Default)]
pub struct ResponseEncoder;

impl ResponseEncoder {
    /// Creates a new `ResponseEncoder` instance
    pub fn new() -> Self {
        Default::default()
    }
}

impl Encoder<Response<Bytes>> for ResponseEncoder {
    type Error = SendError;

    /// Encodes a response into the provided bytes buffer.
    ///
    /// The Content-Length header is always set to the body length,
    /// overwriting any value a handler may have put there.
    ///
    /// # Errors
    ///
    /// Returns an error if the response version is not HTTP/1.1 or writing to
    /// the buffer fails
    fn encode(&mut self, response: Response<Bytes>, dst: &mut BytesMut) -> Result<(), Self::Error> {
        let (mut parts, body) = response.into_parts();

        dst.reserve(INIT_HEADER_SIZE + body.len());
        match parts.version {
            Version::HTTP_11 => {
                write!(
                    FastWrite(dst),
                    "HTTP/1.1 {} {}\r\n",
                    parts.status.as_str(),
                    parts.status.canonical_reason().unwrap_or("Unknown")
                )
                .map_err(SendError::io)?;
            }
            v => {
                error!(http_version = ?v, "unsupported http version");
                return Err(SendError::UnsupportedVersion(v));
            }
        }

        let content_length = HeaderValue::from(body.len());
        match parts.headers.get_mut(header::CONTENT_LENGTH) {
            Some(value) => *value = content_length,
            None => {
                parts.headers.insert(header::CONTENT_LENGTH, content_length);
            }
        }

        for (header_name, header_value) in parts.headers.iter() {
            dst.put_slice(header_name.as_ref());
            dst.put_slice(b": ");
            dst.put_slice(header_value.as_ref());
            dst.put_slice(b"\r\n");
        }
        dst.put_slice(b"\r\n");

        dst.put_slice(&body);
        Ok(())
    }
}

/// Fast writer implementation for writing to BytesMut.
///
/// Avoids unnecessary bounds checking when writing to the bytes buffer, since
/// we've already reserved enough space.
struct FastWrite<'a>(&'a mut BytesMut);

impl Write for FastWrite<'_> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.put_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}
