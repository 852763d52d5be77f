//! An ambient-context middleware pipeline for buffered HTTP services
//!
//! weft-web wires four pieces together on top of the [`weft_http`] transport:
//!
//! - [`context`]: per-request state reachable from anywhere inside that
//!   request's execution, isolated between concurrent requests
//! - [`router`]: exact and parametric path routing, exposed as one
//!   middleware entry in the chain
//! - [`middleware`]: an ordered handler chain driven by an explicit
//!   continuation value
//! - [`adapter`]: runs middleware written against a callback contract
//!   (request handle, response handle, done) by recording its effects
//!   through proxies and replaying them onto the context
//!
//! [`Server`] ties them to the transport: per request it opens a context
//! scope, runs the chain, applies the error and not-found policies, and
//! flushes the response exactly once.

mod body;
mod request;
mod server;

pub mod adapter;
pub mod context;
pub mod middleware;
pub mod proxy;
pub mod router;

pub use body::request_body;
pub use body::RequestBody;
pub use middleware::middleware_fn;
pub use middleware::FnMiddleware;
pub use middleware::Middleware;
pub use middleware::Next;
pub use request::RequestHandle;
pub use router::handler_fn;
pub use router::FnHandler;
pub use router::Router;
pub use server::Server;
pub use server::ServerBuildError;
pub use server::ServerBuilder;

/// The error type produced by middleware and route handlers.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;
