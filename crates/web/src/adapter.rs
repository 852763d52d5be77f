//! Adapter for callback-contract middleware
//!
//! Some middleware is written against a different integration contract: it
//! receives a readable request handle and a mutable response handle plus a
//! completion callback, and communicates entirely by mutating the handles.
//! The adapter runs such middleware unmodified against the ambient request:
//! the request handle is a [`ReadonlyProxy`] over a snapshot (`method`,
//! `url`, `headers`, `body` text), the response handle is a fresh
//! [`RecordingProxy`], and completion is a consumed [`Completion`] handle.
//!
//! The adapter resolves once the middleware signals completion, yielding
//! both change sets. Replaying the recorded effects onto the context is the
//! caller's job; [`MiddlewareChanges::apply_header_calls`] covers the common
//! `setHeader(name, value)` case.

use std::collections::HashMap;

use serde_json::{json, Map, Value};
use tokio::sync::oneshot;

use crate::context;
use crate::proxy::{ChangeSet, ReadonlyProxy, RecordingProxy};
use crate::BoxError;

/// One-shot completion handle passed to callback middleware.
///
/// Dropping it without signalling fails the adapter invocation; a middleware
/// that never completes must not wedge the request silently.
#[derive(Debug)]
pub struct Completion {
    tx: oneshot::Sender<Result<(), BoxError>>,
}

impl Completion {
    /// Signals successful completion.
    pub fn done(self) {
        let _ = self.tx.send(Ok(()));
    }

    /// Signals completion with an error; the adapter invocation fails with it.
    pub fn fail(self, error: impl Into<BoxError>) {
        let _ = self.tx.send(Err(error.into()));
    }
}

/// Everything a callback middleware did to its two handles.
#[derive(Debug)]
pub struct MiddlewareChanges {
    /// Properties written to the request handle, by name.
    pub request_changes: HashMap<String, Value>,
    /// Assignments and invocations recorded on the response handle.
    pub response_changes: ChangeSet,
}

impl MiddlewareChanges {
    /// Replays recorded `setHeader(name, value)` invocations onto the
    /// ambient response headers. Calls with non-string arguments are
    /// skipped.
    pub fn apply_header_calls(&self) {
        let Some(calls) = self.response_changes.calls.get("setHeader") else {
            return;
        };
        for args in calls {
            let name = args.first().and_then(Value::as_str);
            let value = args.get(1).and_then(Value::as_str);
            if let (Some(name), Some(value)) = (name, value) {
                context::set_response_header(name, value);
            }
        }
    }
}

/// Runs `middleware` against the ambient request and resolves with its
/// recorded changes once the completion handle is signalled.
pub async fn execute_callback_middleware<M>(middleware: M) -> Result<MiddlewareChanges, BoxError>
where
    M: FnOnce(ReadonlyProxy, RecordingProxy, Completion),
{
    let request = ReadonlyProxy::new(snapshot_request());
    let response = RecordingProxy::new();
    let (tx, rx) = oneshot::channel();

    middleware(request.clone(), response.clone(), Completion { tx });

    match rx.await {
        Ok(Ok(())) => {
            Ok(MiddlewareChanges { request_changes: request.changes(), response_changes: response.changes() })
        }
        Ok(Err(error)) => Err(error),
        Err(_) => Err("completion handle dropped without being signalled".into()),
    }
}

/// Snapshots the ambient request into the flat object shape callback
/// middleware expects. Without an ambient request the snapshot is empty.
fn snapshot_request() -> Value {
    let Some(request) = context::request() else {
        return json!({});
    };

    let mut headers = Map::new();
    for (name, value) in request.headers() {
        headers.insert(name.as_str().to_string(), json!(String::from_utf8_lossy(value.as_bytes())));
    }
    json!({
        "method": request.method().as_str(),
        "url": request.uri().to_string(),
        "headers": headers,
        "body": String::from_utf8_lossy(request.body()),
    })
}
