//! HTTP request decoder
//!
//! Decodes HTTP/1.x requests from a byte stream in two phases:
//!
//! 1. Head parsing with `httparse` (method, uri, version, headers)
//! 2. Body buffering by Content-Length
//!
//! The decoder yields a request only once its body has been fully buffered,
//! so downstream handlers always see a complete `http::Request<Bytes>`.
//! Chunked request bodies are not supported and fail decoding.
//!
//! # Limits
//!
//! - Maximum number of headers: 64
//! - Maximum header size: 8KB
//! - Only HTTP/1.0 and HTTP/1.1

use bytes::{Buf, Bytes, BytesMut};
use http::header::{CONTENT_LENGTH, TRANSFER_ENCODING};
use http::request::Parts;
use http::{HeaderName, HeaderValue, Method, Request, Uri, Version};
use httparse::Status;
use tokio_util::codec::Decoder;
use tracing::trace;

use crate::protocol::ParseError;
use crate::utils::ensure;

/// Maximum number of headers allowed in a request
const MAX_HEADER_NUM: usize = 64;

/// Maximum size in bytes allowed for the entire header section
const MAX_HEADER_BYTES: usize = 8 * 1024;

/// Decoder for complete HTTP requests implementing the [`Decoder`] trait.
///
/// State is tracked through the `pending` field: `None` while parsing a head,
/// `Some((parts, remaining))` while buffering the body announced by
/// Content-Length.
pub struct RequestDecoder {
    pending: Option<(Parts, usize)>,
}

impl RequestDecoder {
    /// Creates a new `RequestDecoder` instance
    pub fn new() -> Self {
        Default::default()
    }
}

impl Default for RequestDecoder {
    fn default() -> Self {
        Self { pending: None }
    }
}

impl Decoder for RequestDecoder {
    type Item = Request<Bytes>;
    type Error = ParseError;

    /// Attempts to decode a complete request from the provided buffer
    ///
    /// # Returns
    ///
    /// - `Ok(Some(request))`: a head and its full body have been consumed
    /// - `Ok(None)`: need more data to proceed
    /// - `Err(_)`: encountered a parsing error
    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        loop {
            match self.pending.take() {
                Some((parts, body_size)) => {
                    if src.len() < body_size {
                        src.reserve(body_size - src.len());
                        self.pending = Some((parts, body_size));
                        return Ok(None);
                    }
                    let body = src.split_to(body_size).freeze();
                    return Ok(Some(Request::from_parts(parts, body)));
                }

                None => match decode_head(src)? {
                    Some((parts, body_size)) => {
                        self.pending = Some((parts, body_size));
                    }
                    None => return Ok(None),
                },
            }
        }
    }
}

/// Parses a request head from the buffer, returning the typed head and the
/// announced body size, and advancing the buffer past the head section.
fn decode_head(src: &mut BytesMut) -> Result<Option<(Parts, usize)>, ParseError> {
    // Minimum valid request is "GET / HTTP/1.1\r\n\r\n"; don't bother parsing less
    if src.len() < 14 {
        return Ok(None);
    }

    let (parts, body_offset) = {
        let mut headers = [httparse::EMPTY_HEADER; MAX_HEADER_NUM];
        let mut req = httparse::Request::new(&mut headers);

        let parsed_result = req.parse(src).map_err(|e| match e {
            httparse::Error::TooManyHeaders => ParseError::too_many_headers(MAX_HEADER_NUM),
            e => ParseError::invalid_header(e.to_string()),
        });

        let body_offset = match parsed_result? {
            Status::Complete(body_offset) => body_offset,
            Status::Partial => {
                // a head that is incomplete at the size limit will never complete
                ensure!(src.len() <= MAX_HEADER_BYTES, ParseError::too_large_header(src.len(), MAX_HEADER_BYTES));
                return Ok(None);
            }
        };
        trace!(body_offset, "parsed request head");

        ensure!(body_offset <= MAX_HEADER_BYTES, ParseError::too_large_header(body_offset, MAX_HEADER_BYTES));

        let version = match req.version {
            Some(0) => Version::HTTP_10,
            Some(1) => Version::HTTP_11,
            // HTTP/2 and HTTP/3 not supported
            v => return Err(ParseError::InvalidVersion(v)),
        };

        let method =
            Method::from_bytes(req.method.ok_or(ParseError::InvalidMethod)?.as_bytes()).map_err(|_| ParseError::InvalidMethod)?;
        let uri = req.path.ok_or(ParseError::InvalidUri)?.parse::<Uri>().map_err(|_| ParseError::InvalidUri)?;

        let mut builder = Request::builder().method(method).uri(uri).version(version);
        // Safe to unwrap: method, uri and version have been validated above
        let header_map = builder.headers_mut().unwrap();
        header_map.reserve(req.headers.len());

        for header in req.headers.iter() {
            let name = HeaderName::from_bytes(header.name.as_bytes()).map_err(ParseError::invalid_header)?;
            let value = HeaderValue::from_bytes(header.value).map_err(ParseError::invalid_header)?;
            header_map.append(name, value);
        }

        let parts = builder.body(()).unwrap().into_parts().0;
        (parts, body_offset)
    };

    if parts.headers.contains_key(TRANSFER_ENCODING) {
        return Err(ParseError::invalid_body("chunked request bodies are not supported"));
    }
    let body_size = content_length(&parts.headers)?;

    src.advance(body_offset);
    Ok(Some((parts, body_size)))
}

fn content_length(headers: &http::HeaderMap) -> Result<usize, ParseError> {
    match headers.get(CONTENT_LENGTH) {
        None => Ok(0),
        Some(value) => value
            .to_str()
            .map_err(ParseError::invalid_content_length)?
            .trim()
            .parse::<usize>()
            .map_err(ParseError::invalid_content_length),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn buffer(raw: &str) -> BytesMut {
        BytesMut::from(raw)
    }

    #[test]
    fn decode_request_without_body() {
        let mut decoder = RequestDecoder::new();
        let mut src = buffer("GET /api/user HTTP/1.1\r\nhost: example.com\r\n\r\n");

        let request = decoder.decode(&mut src).unwrap().unwrap();

        assert_eq!(request.method(), Method::GET);
        assert_eq!(request.uri().path(), "/api/user");
        assert_eq!(request.version(), Version::HTTP_11);
        assert_eq!(request.headers().get("host").unwrap(), "example.com");
        assert!(request.body().is_empty());
        assert!(src.is_empty());
    }

    #[test]
    fn decode_request_with_body() {
        let mut decoder = RequestDecoder::new();
        let mut src = buffer("POST / HTTP/1.1\r\ncontent-length: 10\r\n\r\n{\"test\":1}");

        let request = decoder.decode(&mut src).unwrap().unwrap();

        assert_eq!(request.method(), Method::POST);
        assert_eq!(request.body().as_ref(), b"{\"test\":1}");
    }

    #[test]
    fn decode_waits_for_complete_head() {
        let mut decoder = RequestDecoder::new();
        let mut src = buffer("GET /api/user HTTP/1.1\r\nhost: exam");

        assert!(decoder.decode(&mut src).unwrap().is_none());

        src.extend_from_slice(b"ple.com\r\n\r\n");
        let request = decoder.decode(&mut src).unwrap().unwrap();
        assert_eq!(request.uri().path(), "/api/user");
    }

    #[test]
    fn decode_waits_for_complete_body() {
        let mut decoder = RequestDecoder::new();
        let mut src = buffer("POST / HTTP/1.1\r\ncontent-length: 10\r\n\r\n{\"tes");

        assert!(decoder.decode(&mut src).unwrap().is_none());

        src.extend_from_slice(b"t\":1}");
        let request = decoder.decode(&mut src).unwrap().unwrap();
        assert_eq!(request.body().as_ref(), b"{\"test\":1}");
    }

    #[test]
    fn decode_pipelined_requests() {
        let mut decoder = RequestDecoder::new();
        let mut src = buffer("GET /a HTTP/1.1\r\n\r\nGET /b HTTP/1.1\r\n\r\n");

        let first = decoder.decode(&mut src).unwrap().unwrap();
        let second = decoder.decode(&mut src).unwrap().unwrap();

        assert_eq!(first.uri().path(), "/a");
        assert_eq!(second.uri().path(), "/b");
    }

    #[test]
    fn decode_rejects_invalid_content_length() {
        let mut decoder = RequestDecoder::new();
        let mut src = buffer("POST / HTTP/1.1\r\ncontent-length: banana\r\n\r\n");

        let error = decoder.decode(&mut src).unwrap_err();
        assert!(matches!(error, ParseError::InvalidContentLength { .. }));
    }

    #[test]
    fn decode_rejects_chunked_body() {
        let mut decoder = RequestDecoder::new();
        let mut src = buffer("POST / HTTP/1.1\r\ntransfer-encoding: chunked\r\n\r\n");

        let error = decoder.decode(&mut src).unwrap_err();
        assert!(matches!(error, ParseError::InvalidBody { .. }));
    }

    #[test]
    fn decode_rejects_oversized_head() {
        let mut decoder = RequestDecoder::new();
        let mut raw = String::from("GET / HTTP/1.1\r\n");
        raw.push_str("x-filler: ");
        raw.push_str(&"a".repeat(MAX_HEADER_BYTES));

        let error = decoder.decode(&mut buffer(&raw)).unwrap_err();
        assert!(matches!(error, ParseError::TooLargeHeader { .. }));
    }
}
