//! Exact and parametric path routing
//!
//! Routes are registered per HTTP method under a normalized pattern (leading
//! and trailing `/` stripped). Patterns without parameter segments live in a
//! flat table; patterns with `:name` segments live in a per-method trie where
//! every node holds literal children plus at most one shared parameter child.
//!
//! Conflicts are positional: the parameter child is shared regardless of the
//! parameter name, so `/user/:id/:status` and `/user/:status/:id` register
//! the same terminal position and the second registration fails. The name
//! recorded when a parameter node is created is the one used for extraction.
//! This is deliberate; parameter names are not part of the matching key.
//!
//! Matching prefers a literal child over the parameter child at every step
//! and never backtracks: a literal dead end is a miss even if the parameter
//! branch would have matched. A miss is not an error — the router is one
//! middleware entry, and a miss simply passes control down the chain.

use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;

use async_trait::async_trait;
use http::Method;
use thiserror::Error;
use tracing::debug;

use crate::context;
use crate::middleware::{HandlerFuture, Middleware, Next};
use crate::BoxError;

/// A handler attached to a route.
///
/// Route handlers take no arguments: the request, its parameters and the
/// response slots are all reached through the [`context`] module.
#[async_trait]
pub trait RouteHandler: Send + Sync {
    async fn invoke(&self) -> Result<(), BoxError>;
}

/// Holder that lets a plain async closure act as a [`RouteHandler`].
pub struct FnHandler<F> {
    f: F,
}

#[async_trait]
impl<F, Fut> RouteHandler for FnHandler<F>
where
    F: Fn() -> Fut + Send + Sync,
    Fut: Future<Output = Result<(), BoxError>> + Send,
{
    async fn invoke(&self) -> Result<(), BoxError> {
        (self.f)().await
    }
}

pub fn handler_fn<F, Fut>(f: F) -> FnHandler<F>
where
    F: Fn() -> Fut + Send + Sync,
    Fut: Future<Output = Result<(), BoxError>> + Send,
{
    FnHandler { f }
}

/// Raised synchronously at registration time; never during request handling.
#[derive(Debug, Error)]
pub enum RouteConflict {
    #[error("route already registered: {method} /{path}")]
    ExactRoute { method: Method, path: String },

    #[error("handler already registered at this position: {method} /{pattern}")]
    ParametricRoute { method: Method, pattern: String },
}

#[derive(Hash, PartialEq, Eq)]
struct ExactKey {
    method: Method,
    path: String,
}

#[derive(Default)]
struct Node {
    literals: HashMap<String, Node>,
    param: Option<Box<ParamChild>>,
    handler: Option<Arc<dyn RouteHandler>>,
}

struct ParamChild {
    name: String,
    node: Node,
}

/// The route registry. Populate it fully, then hand it to the server as one
/// middleware entry via [`Router::into_middleware`]; the built middleware is
/// immutable, so registration can never race matching.
#[derive(Default)]
pub struct Router {
    exact: HashMap<ExactKey, Arc<dyn RouteHandler>>,
    trees: HashMap<Method, Node>,
}

impl Router {
    pub fn new() -> Self {
        Default::default()
    }

    /// Registers `handler` for `method` and `pattern`.
    ///
    /// A segment starting with `:` is a named parameter. Registering a
    /// pattern that collides with an existing one fails with
    /// [`RouteConflict`]; see the module docs for the positional conflict
    /// rules on parametric patterns.
    pub fn handle(
        &mut self,
        method: Method,
        pattern: &str,
        handler: impl RouteHandler + 'static,
    ) -> Result<(), RouteConflict> {
        let normalized = normalize(pattern);
        let handler: Arc<dyn RouteHandler> = Arc::new(handler);

        if !normalized.split('/').any(|segment| segment.starts_with(':')) {
            let key = ExactKey { method, path: normalized };
            if self.exact.contains_key(&key) {
                return Err(RouteConflict::ExactRoute { method: key.method, path: key.path });
            }
            self.exact.insert(key, handler);
            return Ok(());
        }

        let segments = normalized.split('/').collect::<Vec<_>>();
        let last = segments.len() - 1;
        let mut node = self.trees.entry(method.clone()).or_default();
        for (position, segment) in segments.iter().enumerate() {
            node = match segment.strip_prefix(':') {
                Some(name) => {
                    let param = node
                        .param
                        .get_or_insert_with(|| Box::new(ParamChild { name: name.to_string(), node: Node::default() }));
                    &mut param.node
                }
                None => node.literals.entry((*segment).to_string()).or_default(),
            };
            if position == last {
                if node.handler.is_some() {
                    return Err(RouteConflict::ParametricRoute { method, pattern: normalized.clone() });
                }
                node.handler = Some(Arc::clone(&handler));
            }
        }
        Ok(())
    }

    pub fn get(&mut self, pattern: &str, handler: impl RouteHandler + 'static) -> Result<(), RouteConflict> {
        self.handle(Method::GET, pattern, handler)
    }

    pub fn post(&mut self, pattern: &str, handler: impl RouteHandler + 'static) -> Result<(), RouteConflict> {
        self.handle(Method::POST, pattern, handler)
    }

    pub fn put(&mut self, pattern: &str, handler: impl RouteHandler + 'static) -> Result<(), RouteConflict> {
        self.handle(Method::PUT, pattern, handler)
    }

    pub fn patch(&mut self, pattern: &str, handler: impl RouteHandler + 'static) -> Result<(), RouteConflict> {
        self.handle(Method::PATCH, pattern, handler)
    }

    pub fn delete(&mut self, pattern: &str, handler: impl RouteHandler + 'static) -> Result<(), RouteConflict> {
        self.handle(Method::DELETE, pattern, handler)
    }

    /// Looks up a handler for `method` and `path`.
    ///
    /// The exact table is probed first; on a miss the trie is walked with the
    /// extracted parameter values accumulated under the names stored on the
    /// parameter nodes. `None` means "not handled", not an error.
    pub fn lookup(&self, method: &Method, path: &str) -> Option<(Arc<dyn RouteHandler>, HashMap<String, String>)> {
        let key = ExactKey { method: method.clone(), path: normalize(path) };
        if let Some(handler) = self.exact.get(&key) {
            return Some((Arc::clone(handler), HashMap::new()));
        }

        let ExactKey { method, path } = key;
        let mut node = self.trees.get(&method)?;
        let mut params = HashMap::new();
        for segment in path.split('/') {
            node = match node.literals.get(segment) {
                Some(literal) => literal,
                None => {
                    let param = node.param.as_deref()?;
                    params.insert(param.name.clone(), segment.to_string());
                    &param.node
                }
            };
        }

        let handler = node.handler.as_ref()?;
        Some((Arc::clone(handler), params))
    }

    /// Wraps the router into a chain entry: on a hit it writes the route
    /// params and invokes the handler, on a miss it passes control on.
    pub fn into_middleware(self) -> RouterMiddleware {
        RouterMiddleware { router: Arc::new(self) }
    }
}

/// The router exposed as one entry of the middleware chain.
pub struct RouterMiddleware {
    router: Arc<Router>,
}

impl Middleware for RouterMiddleware {
    fn handle(&self, next: Next) -> HandlerFuture {
        let router = Arc::clone(&self.router);
        Box::pin(async move {
            let Some(request) = context::request() else {
                return next.run().await;
            };
            match router.lookup(request.method(), request.path()) {
                Some((handler, params)) => {
                    debug!(path = request.path(), "route matched");
                    context::set_route_params(params);
                    handler.invoke().await
                }
                None => next.run().await,
            }
        })
    }
}

fn normalize(path: &str) -> String {
    path.trim_start_matches('/').trim_end_matches('/').to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::middleware::{execute, middleware_fn};
    use crate::request::RequestHandle;
    use bytes::Bytes;
    use serde_json::json;
    use std::sync::atomic::{AtomicBool, Ordering};

    fn flag_handler(flag: &Arc<AtomicBool>) -> FnHandler<impl Fn() -> std::future::Ready<Result<(), BoxError>> + Send + Sync + use<>> {
        let flag = Arc::clone(flag);
        handler_fn(move || {
            flag.store(true, Ordering::SeqCst);
            std::future::ready(Ok(()))
        })
    }

    /// Runs the router as the only chain entry against one request,
    /// returning whether the chain fell through past it.
    async fn dispatch(router: Router, method: Method, path: &str) -> bool {
        let request = http::Request::builder().method(method).uri(path).body(Bytes::new()).unwrap();
        let fell_through = Arc::new(AtomicBool::new(false));
        let sentinel = {
            let fell_through = Arc::clone(&fell_through);
            middleware_fn(move |_next: Next| {
                let fell_through = Arc::clone(&fell_through);
                async move {
                    fell_through.store(true, Ordering::SeqCst);
                    Ok(())
                }
            })
        };
        let chain: Arc<[Arc<dyn Middleware>]> = vec![
            Arc::new(router.into_middleware()) as Arc<dyn Middleware>,
            Arc::new(sentinel) as Arc<dyn Middleware>,
        ]
        .into();

        context::run_scoped(async move {
            context::set_request(Arc::new(RequestHandle::from(request)));
            execute(chain).await.unwrap();
        })
        .await;
        fell_through.load(Ordering::SeqCst)
    }

    #[tokio::test]
    async fn supports_simple_routes() {
        let called = Arc::new(AtomicBool::new(false));
        let mut router = Router::new();
        router.get("/api/user", flag_handler(&called)).unwrap();

        let fell_through = dispatch(router, Method::GET, "/api/user").await;

        assert!(called.load(Ordering::SeqCst));
        assert!(!fell_through);
    }

    #[tokio::test]
    async fn supports_parametric_routes() {
        let called = Arc::new(AtomicBool::new(false));
        let mut router = Router::new();
        router.get("/api/user/:id/:age/status", flag_handler(&called)).unwrap();

        dispatch(router, Method::GET, "/api/user/234412/12/status").await;

        assert!(called.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn does_not_mix_up_simple_and_parametric_routes() {
        let simple = Arc::new(AtomicBool::new(false));
        let parametric = Arc::new(AtomicBool::new(false));
        let mut router = Router::new();
        router.get("/api/user/info", flag_handler(&simple)).unwrap();
        router.get("/api/user/:id/:age/status", flag_handler(&parametric)).unwrap();

        dispatch(router, Method::GET, "/api/user/info").await;

        assert!(simple.load(Ordering::SeqCst));
        assert!(!parametric.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn rejects_duplicate_simple_routes() {
        let mut router = Router::new();
        router.get("/api/user/info", handler_fn(|| std::future::ready(Ok(())))).unwrap();
        let error = router.get("/api/user/info", handler_fn(|| std::future::ready(Ok(())))).unwrap_err();

        assert!(matches!(error, RouteConflict::ExactRoute { .. }));
    }

    #[tokio::test]
    async fn rejects_parametric_routes_colliding_on_position() {
        let mut router = Router::new();
        router.get("/api/user/:id/:status", handler_fn(|| std::future::ready(Ok(())))).unwrap();
        // different parameter names, same trie position
        let error = router.get("/api/user/:status/:id", handler_fn(|| std::future::ready(Ok(())))).unwrap_err();

        assert!(matches!(error, RouteConflict::ParametricRoute { .. }));
    }

    #[tokio::test]
    async fn respects_the_request_method() {
        let get_simple = Arc::new(AtomicBool::new(false));
        let post_simple = Arc::new(AtomicBool::new(false));
        let get_parametric = Arc::new(AtomicBool::new(false));
        let post_parametric = Arc::new(AtomicBool::new(false));

        let mut router = Router::new();
        router.get("/api/user/info", flag_handler(&get_simple)).unwrap();
        router.post("/api/user/info", flag_handler(&post_simple)).unwrap();
        router.get("/api/user/:age/:id", flag_handler(&get_parametric)).unwrap();
        router.post("/api/user/:age/:id", flag_handler(&post_parametric)).unwrap();

        dispatch(router, Method::POST, "/api/user/info").await;

        assert!(post_simple.load(Ordering::SeqCst));
        assert!(!get_simple.load(Ordering::SeqCst));

        let mut router = Router::new();
        router.get("/api/user/:age/:id", flag_handler(&get_parametric)).unwrap();
        router.post("/api/user/:age/:id", flag_handler(&post_parametric)).unwrap();

        dispatch(router, Method::POST, "/api/user/22/12222").await;

        assert!(post_parametric.load(Ordering::SeqCst));
        assert!(!get_parametric.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn extracts_route_params_by_name() {
        let mut router = Router::new();
        router
            .get(
                "/api/user/:id/:name/:age",
                handler_fn(|| async {
                    context::respond_json(&json!(context::route_params()), Some(http::StatusCode::OK));
                    Ok(())
                }),
            )
            .unwrap();

        let request = http::Request::builder().method(Method::GET).uri("/api/user/666/bob/22").body(Bytes::new()).unwrap();
        let chain: Arc<[Arc<dyn Middleware>]> = vec![Arc::new(router.into_middleware()) as Arc<dyn Middleware>].into();

        let body = context::run_scoped(async move {
            context::set_request(Arc::new(RequestHandle::from(request)));
            execute(chain).await.unwrap();
            context::response_body()
        })
        .await;

        let parsed: serde_json::Value = serde_json::from_slice(&body.unwrap()).unwrap();
        assert_eq!(parsed, json!({"id": "666", "name": "bob", "age": "22"}));
    }

    #[tokio::test]
    async fn unmatched_path_falls_through_the_chain() {
        let router = Router::new();
        let fell_through = dispatch(router, Method::GET, "/api/missing").await;
        assert!(fell_through);
    }

    #[tokio::test]
    async fn literal_dead_end_is_not_rescued_by_the_parameter_branch() {
        let parametric = Arc::new(AtomicBool::new(false));
        let mut router = Router::new();
        router.get("/api/:id", flag_handler(&parametric)).unwrap();
        router.get("/api/info/:rest", handler_fn(|| std::future::ready(Ok(())))).unwrap();

        // "/api/info" walks into the literal "info" node, which has no
        // handler at this depth; the parameter branch is not revisited
        let fell_through = dispatch(router, Method::GET, "/api/info").await;

        assert!(!parametric.load(Ordering::SeqCst));
        assert!(fell_through);
    }
}
