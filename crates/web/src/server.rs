use std::convert::Infallible;
use std::future::Future;
use std::net::{SocketAddr, ToSocketAddrs};
use std::pin::Pin;
use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use http::{HeaderName, HeaderValue, Request, Response, StatusCode};
use serde_json::json;
use thiserror::Error;
use tokio::net::TcpListener;
use tracing::{error, info, warn, Level};
use tracing_subscriber::FmtSubscriber;
use uuid::Uuid;

use weft_http::connection::HttpConnection;
use weft_http::handler::Handler;

use crate::context;
use crate::middleware::{self, Middleware};
use crate::request::RequestHandle;
use crate::router::Router;
use crate::BoxError;

type ErrorHookFuture = Pin<Box<dyn Future<Output = Result<(), BoxError>> + Send>>;
type ErrorHook = dyn Fn(BoxError) -> ErrorHookFuture + Send + Sync;

pub struct ServerBuilder {
    middlewares: Vec<Arc<dyn Middleware>>,
    on_error: Option<Arc<ErrorHook>>,
    address: Option<Vec<SocketAddr>>,
}

impl ServerBuilder {
    fn new() -> Self {
        Self { middlewares: Vec::new(), on_error: None, address: None }
    }

    pub fn address<A: ToSocketAddrs>(mut self, address: A) -> Self {
        self.address = Some(address.to_socket_addrs().unwrap().collect::<Vec<_>>());
        self
    }

    /// Appends one middleware; the chain runs in registration order.
    pub fn middleware(mut self, middleware: impl Middleware + 'static) -> Self {
        self.middlewares.push(Arc::new(middleware));
        self
    }

    /// Appends the router as one chain entry.
    pub fn router(self, router: Router) -> Self {
        self.middleware(router.into_middleware())
    }

    /// Installs the error hook. It runs inside the failing request's scope,
    /// so it may use the respond helpers; if it returns an error itself, the
    /// default 500 handling takes over with that error.
    pub fn on_error<F, Fut>(mut self, hook: F) -> Self
    where
        F: Fn(BoxError) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<(), BoxError>> + Send + 'static,
    {
        self.on_error = Some(Arc::new(move |e| -> ErrorHookFuture { Box::pin(hook(e)) }));
        self
    }

    pub fn build(self) -> Result<Server, ServerBuildError> {
        let address = self.address.ok_or(ServerBuildError::MissingAddress)?;
        Ok(Server { middlewares: self.middlewares.into(), on_error: self.on_error, address })
    }
}

/// The request lifecycle controller.
///
/// Per request it opens a context scope, assigns a request id, binds the
/// request handle, runs the middleware chain, applies the error and
/// not-found policies, and builds the response from the context slots
/// exactly once.
pub struct Server {
    middlewares: Arc<[Arc<dyn Middleware>]>,
    on_error: Option<Arc<ErrorHook>>,
    address: Vec<SocketAddr>,
}

#[derive(Error, Debug)]
pub enum ServerBuildError {
    #[error("address must be set")]
    MissingAddress,
}

impl Server {
    pub fn builder() -> ServerBuilder {
        ServerBuilder::new()
    }

    pub async fn start(self) {
        let subscriber = FmtSubscriber::builder().with_max_level(Level::INFO).finish();
        tracing::subscriber::set_global_default(subscriber).expect("setting default subscriber failed");

        info!("start listening at {:?}", self.address);
        let tcp_listener = match TcpListener::bind(self.address.as_slice()).await {
            Ok(tcp_listener) => tcp_listener,
            Err(e) => {
                error!(cause = %e, "bind server error");
                return;
            }
        };

        let handler = Arc::new(self);
        loop {
            let (tcp_stream, _remote_addr) = match tcp_listener.accept().await {
                Ok(stream_and_addr) => stream_and_addr,
                Err(e) => {
                    warn!(cause = %e, "failed to accept");
                    continue;
                }
            };

            let handler = Arc::clone(&handler);

            tokio::spawn(async move {
                let (reader, writer) = tcp_stream.into_split();
                let connection = HttpConnection::new(reader, writer);
                match connection.process(handler).await {
                    Ok(()) => {
                        info!("finished process, connection shutdown");
                    }
                    Err(e) => {
                        error!("service has error, cause {}, connection shutdown", e);
                    }
                }
            });
        }
    }

    /// Runs the full lifecycle for one request and returns the response.
    pub async fn dispatch(&self, request: Request<Bytes>) -> Response<Bytes> {
        context::run_scoped(async {
            context::set_request_id(Uuid::new_v4());
            context::set_request(Arc::new(RequestHandle::from(request)));

            if let Err(error) = middleware::execute(Arc::clone(&self.middlewares)).await {
                let unhandled = match &self.on_error {
                    Some(hook) => hook(error).await.err(),
                    None => Some(error),
                };
                if let Some(error) = unhandled {
                    warn!(cause = %error, "request handler failed");
                    if context::status_code().is_none() {
                        context::set_status_code(StatusCode::INTERNAL_SERVER_ERROR);
                    }
                    if context::response_body().is_none() {
                        let message = error.to_string();
                        let message = if message.is_empty() { "Internal server error".to_string() } else { message };
                        context::respond_json(&json!({ "message": message }), None);
                    }
                }
            }

            finalize()
        })
        .await
    }
}

/// Computes the response from the context slots: the not-found default when
/// nothing was written, status 200 when only a body was, and the accumulated
/// headers in insertion order.
fn finalize() -> Response<Bytes> {
    if context::response_body().is_none() && context::status_code().is_none() {
        context::respond_json(&json!({ "message": "Not found" }), Some(StatusCode::NOT_FOUND));
    }

    let mut response = Response::new(context::response_body().unwrap_or_default());
    *response.status_mut() = context::status_code().unwrap_or(StatusCode::OK);

    let headers = response.headers_mut();
    for (name, values) in context::response_headers() {
        let Ok(header_name) = HeaderName::try_from(name.as_str()) else {
            warn!(header = %name, "skipping invalid response header name");
            continue;
        };
        for value in values {
            match HeaderValue::try_from(value.as_str()) {
                Ok(header_value) => {
                    headers.append(header_name.clone(), header_value);
                }
                Err(_) => warn!(header = %name, "skipping invalid response header value"),
            }
        }
    }
    response
}

#[async_trait]
impl Handler for Server {
    type Error = Infallible;

    async fn call(&self, request: Request<Bytes>) -> Result<Response<Bytes>, Self::Error> {
        Ok(self.dispatch(request).await)
    }
}
