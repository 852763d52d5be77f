//! The inbound request handle bound into the context for each request.

use bytes::Bytes;
use http::request::Parts;
use http::{HeaderMap, Method, Request, Uri, Version};

/// An inbound request with its fully buffered body.
///
/// One handle is created per request by the lifecycle controller and shared
/// through the context; middleware, the router and the body readers all read
/// from it.
#[derive(Debug)]
pub struct RequestHandle {
    parts: Parts,
    body: Bytes,
}

impl RequestHandle {
    pub fn method(&self) -> &Method {
        &self.parts.method
    }

    pub fn uri(&self) -> &Uri {
        &self.parts.uri
    }

    pub fn path(&self) -> &str {
        self.parts.uri.path()
    }

    pub fn version(&self) -> Version {
        self.parts.version
    }

    pub fn headers(&self) -> &HeaderMap {
        &self.parts.headers
    }

    /// The buffered request body bytes.
    pub fn body(&self) -> &Bytes {
        &self.body
    }
}

impl From<Request<Bytes>> for RequestHandle {
    fn from(request: Request<Bytes>) -> Self {
        let (parts, body) = request.into_parts();
        Self { parts, body }
    }
}
