//! Protocol encoding/decoding implementation
//!
//! The codec layer converts between raw bytes and typed messages:
//!
//! - [`RequestDecoder`]: parses request heads with `httparse` and buffers the
//!   complete request body, yielding `http::Request<Bytes>` values
//! - [`ResponseEncoder`]: serializes `http::Response<Bytes>` values, managing
//!   the Content-Length header

mod request_decoder;
mod response_encoder;

pub use request_decoder::RequestDecoder;
pub use response_encoder::ResponseEncoder;
