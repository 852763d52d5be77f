use async_trait::async_trait;
use std::error::Error;
use std::future::Future;

use bytes::Bytes;
use http::{Request, Response};

/// A request handler driven by [`HttpConnection`](crate::connection::HttpConnection).
///
/// The transport hands the handler a fully buffered request and writes back
/// whatever response it returns.
#[async_trait]
pub trait Handler: Send + Sync {
    type Error: Into<Box<dyn Error + Send + Sync>> + Send;

    async fn call(&self, request: Request<Bytes>) -> Result<Response<Bytes>, Self::Error>;
}

#[derive(Debug)]
pub struct HandlerFn<F> {
    f: F,
}

#[async_trait]
impl<F, Fut, Err> Handler for HandlerFn<F>
where
    F: Fn(Request<Bytes>) -> Fut + Send + Sync,
    Err: Into<Box<dyn Error + Send + Sync>> + Send,
    Fut: Future<Output = Result<Response<Bytes>, Err>> + Send,
{
    type Error = Err;

    async fn call(&self, request: Request<Bytes>) -> Result<Response<Bytes>, Self::Error> {
        (self.f)(request).await
    }
}

pub fn make_handler<F, Fut, Err>(f: F) -> HandlerFn<F>
where
    F: Fn(Request<Bytes>) -> Fut + Send + Sync,
    Err: Into<Box<dyn Error + Send + Sync>> + Send,
    Fut: Future<Output = Result<Response<Bytes>, Err>> + Send,
{
    HandlerFn { f }
}
