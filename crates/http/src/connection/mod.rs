//! Core connection handling and lifecycle management

use std::sync::Arc;

use bytes::Bytes;
use futures::{SinkExt, StreamExt};
use http::{header, HeaderValue, Request, Response, StatusCode, Version};
use tokio::io::{AsyncRead, AsyncWrite};
use tokio_util::codec::{FramedRead, FramedWrite};
use tracing::{error, info};

use crate::codec::{RequestDecoder, ResponseEncoder};
use crate::handler::Handler;
use crate::protocol::HttpError;

/// An HTTP connection that manages request processing and response writing
///
/// `HttpConnection` handles the full lifecycle of a connection:
/// - Reading and decoding buffered requests
/// - Dispatching each request to a [`Handler`]
/// - Writing the response and keeping the connection alive for the next
///   request, until the peer disconnects or asks to close
///
/// # Type Parameters
///
/// * `R`: The async readable stream type
/// * `W`: The async writable stream type
pub struct HttpConnection<R, W> {
    framed_read: FramedRead<R, RequestDecoder>,
    framed_write: FramedWrite<W, ResponseEncoder>,
}

impl<R, W> HttpConnection<R, W>
where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin,
{
    pub fn new(reader: R, writer: W) -> Self {
        Self {
            framed_read: FramedRead::with_capacity(reader, RequestDecoder::new(), 8 * 1024),
            framed_write: FramedWrite::new(writer, ResponseEncoder::new()),
        }
    }

    /// Serves requests from this connection until it is closed.
    ///
    /// A request that fails to parse receives a 400 response and closes the
    /// connection. A handler error receives a 500 response; the connection
    /// stays usable, the error stays isolated to that request.
    pub async fn process<H>(mut self, handler: Arc<H>) -> Result<(), HttpError>
    where
        H: Handler,
    {
        loop {
            match self.framed_read.next().await {
                Some(Ok(request)) => {
                    let close_requested = wants_close(&request);

                    let response = match handler.call(request).await {
                        Ok(response) => response,
                        Err(e) => {
                            let e = e.into();
                            error!(cause = %e, "handler error, responding 500");
                            build_error_response(StatusCode::INTERNAL_SERVER_ERROR)
                        }
                    };

                    self.framed_write.send(response).await?;

                    if close_requested {
                        info!("client requested connection close");
                        return Ok(());
                    }
                }

                Some(Err(e)) => {
                    error!("can't parse next request, cause {}", e);
                    self.framed_write.send(build_error_response(StatusCode::BAD_REQUEST)).await?;
                    return Err(e.into());
                }

                None => {
                    info!("can't read more requests, closing connection");
                    return Ok(());
                }
            }
        }
    }
}

/// Whether the request asks for the connection to be closed after the
/// response: explicit `Connection: close`, or HTTP/1.0 without an explicit
/// keep-alive.
fn wants_close(request: &Request<Bytes>) -> bool {
    let connection = request.headers().get(header::CONNECTION).and_then(|value| value.to_str().ok());
    match request.version() {
        Version::HTTP_10 => !connection.is_some_and(|value| value.eq_ignore_ascii_case("keep-alive")),
        _ => connection.is_some_and(|value| value.eq_ignore_ascii_case("close")),
    }
}

fn build_error_response(status: StatusCode) -> Response<Bytes> {
    let mut response = Response::new(Bytes::new());
    *response.status_mut() = status;
    response.headers_mut().insert(header::CONTENT_LENGTH, HeaderValue::from(0));
    response
}
