//! The middleware chain executor
//!
//! A chain is an ordered, immutable sequence of handlers. Each handler
//! receives a [`Next`] continuation owning the chain and the position after
//! it; running the continuation enters the next handler, not running it halts
//! the chain there. The cursor travels by value inside each `Next`, so no
//! shared mutable state crosses task or suspension boundaries.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use crate::BoxError;

/// The boxed future type returned by middleware.
pub type HandlerFuture = Pin<Box<dyn Future<Output = Result<(), BoxError>> + Send>>;

/// One entry in the request-processing chain.
///
/// Middleware reads and writes request state through the [`context`](crate::context)
/// module and decides whether the rest of the chain runs by invoking (or
/// dropping) the given continuation.
pub trait Middleware: Send + Sync {
    fn handle(&self, next: Next) -> HandlerFuture;
}

/// Holder that lets a plain async closure act as [`Middleware`].
pub struct FnMiddleware<F> {
    f: F,
}

impl<F, Fut> Middleware for FnMiddleware<F>
where
    F: Fn(Next) -> Fut + Send + Sync,
    Fut: Future<Output = Result<(), BoxError>> + Send + 'static,
{
    fn handle(&self, next: Next) -> HandlerFuture {
        Box::pin((self.f)(next))
    }
}

pub fn middleware_fn<F, Fut>(f: F) -> FnMiddleware<F>
where
    F: Fn(Next) -> Fut + Send + Sync,
    Fut: Future<Output = Result<(), BoxError>> + Send + 'static,
{
    FnMiddleware { f }
}

/// The continuation handed to each middleware.
///
/// `run` consumes the value, which makes the expected single forward
/// traversal the natural usage; cloning first allows a handler to re-enter
/// the remainder of the chain deliberately.
#[derive(Clone)]
pub struct Next {
    chain: Arc<[Arc<dyn Middleware>]>,
    cursor: usize,
}

impl Next {
    /// Invokes the handler this continuation points at, handing it a new
    /// continuation bound one position further. Past the end of the chain it
    /// resolves without doing anything.
    pub async fn run(self) -> Result<(), BoxError> {
        match self.chain.get(self.cursor) {
            Some(middleware) => {
                let next = Next { chain: Arc::clone(&self.chain), cursor: self.cursor + 1 };
                middleware.handle(next).await
            }
            None => Ok(()),
        }
    }
}

impl std::fmt::Debug for Next {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Next").field("cursor", &self.cursor).field("chain_len", &self.chain.len()).finish()
    }
}

/// Runs a chain from its first handler; resolves once the traversal the
/// handlers chose to perform has completed.
pub async fn execute(chain: Arc<[Arc<dyn Middleware>]>) -> Result<(), BoxError> {
    Next { chain, cursor: 0 }.run().await
}
