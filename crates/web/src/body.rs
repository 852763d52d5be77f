//! Request body readers
//!
//! The transport buffers the complete body before a request enters the
//! pipeline; these readers interpret those bytes. Malformed JSON yields an
//! empty object rather than an error: handlers echoing a parsed body never
//! see a parse failure, and callers that need to distinguish must read the
//! text form.

use bytes::Bytes;
use serde_json::{Map, Value};

use crate::context;

/// Reader over one request's buffered body bytes.
#[derive(Debug, Clone)]
pub struct RequestBody {
    bytes: Bytes,
}

impl RequestBody {
    /// The raw buffered bytes.
    pub fn bytes(&self) -> Bytes {
        self.bytes.clone()
    }

    /// Parses the body as JSON; malformed input yields an empty object.
    pub fn json(&self) -> Value {
        serde_json::from_slice(&self.bytes).unwrap_or_else(|_| Value::Object(Map::new()))
    }

    /// Decodes the body as text, replacing invalid UTF-8 sequences.
    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.bytes).into_owned()
    }
}

/// Returns the body reader for the ambient request.
///
/// Outside a request scope (or before a request is bound) the reader is
/// empty, consistent with the context's no-op behavior.
pub fn request_body() -> RequestBody {
    let bytes = context::request().map(|request| request.body().clone()).unwrap_or_default();
    RequestBody { bytes }
}
