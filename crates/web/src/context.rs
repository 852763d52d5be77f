//! Per-request ambient state
//!
//! Every request is served inside a scope opened by [`run_scoped`]. Code
//! running within that scope — however deeply nested, and across `.await`
//! suspension points — reads and writes the same set of slots through the
//! free functions in this module, without threading a context value through
//! every signature. Scopes are carried by a tokio task-local, so two
//! concurrently served requests never observe each other's state.
//!
//! Reads outside any open scope resolve to defaults and writes are dropped;
//! neither panics. Background tasks calling in here by accident must not
//! bring a server down.

use std::cell::RefCell;
use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;

use bytes::Bytes;
use http::StatusCode;
use serde_json::Value;
use uuid::Uuid;

use crate::request::RequestHandle;

tokio::task_local! {
    static SCOPE: RequestScope;
}

#[derive(Default)]
struct RequestScope {
    slots: RefCell<Slots>,
}

#[derive(Default)]
struct Slots {
    request: Option<Arc<RequestHandle>>,
    request_id: Option<Uuid>,
    status_code: Option<StatusCode>,
    response_body: Option<Bytes>,
    // insertion order is emission order
    response_headers: Vec<(String, Vec<String>)>,
    route_params: HashMap<String, String>,
}

/// Opens a fresh, empty request scope and drives `future` inside it.
///
/// All context reads and writes performed during the execution of `future`
/// resolve against this scope and this scope only. The scope is dropped when
/// the future completes.
pub async fn run_scoped<F>(future: F) -> F::Output
where
    F: Future,
{
    SCOPE.scope(RequestScope::default(), future).await
}

fn read<T>(f: impl FnOnce(&Slots) -> T) -> Option<T> {
    SCOPE.try_with(|scope| f(&scope.slots.borrow())).ok()
}

fn write(f: impl FnOnce(&mut Slots)) {
    let _ = SCOPE.try_with(|scope| f(&mut scope.slots.borrow_mut()));
}

pub fn request() -> Option<Arc<RequestHandle>> {
    read(|slots| slots.request.clone()).flatten()
}

pub fn set_request(request: Arc<RequestHandle>) {
    write(|slots| slots.request = Some(request));
}

pub fn request_id() -> Option<Uuid> {
    read(|slots| slots.request_id).flatten()
}

pub fn set_request_id(id: Uuid) {
    write(|slots| slots.request_id = Some(id));
}

pub fn status_code() -> Option<StatusCode> {
    read(|slots| slots.status_code).flatten()
}

pub fn set_status_code(status: StatusCode) {
    write(|slots| slots.status_code = Some(status));
}

pub fn response_body() -> Option<Bytes> {
    read(|slots| slots.response_body.clone()).flatten()
}

pub fn set_response_body(body: impl Into<Bytes>) {
    let body = body.into();
    write(|slots| slots.response_body = Some(body));
}

/// Returns the accumulated response headers in insertion order.
pub fn response_headers() -> Vec<(String, Vec<String>)> {
    read(|slots| slots.response_headers.clone()).unwrap_or_default()
}

/// Sets a response header, replacing any previous values for the same name
/// while keeping its original position in the emission order.
pub fn set_response_header(name: impl Into<String>, value: impl Into<String>) {
    set_response_header_list(name, vec![value.into()]);
}

/// List-valued variant of [`set_response_header`]; each value is emitted as
/// its own header line.
pub fn set_response_header_list(name: impl Into<String>, values: Vec<String>) {
    let name = name.into();
    write(|slots| {
        match slots.response_headers.iter_mut().find(|(existing, _)| existing.eq_ignore_ascii_case(&name)) {
            Some((_, existing_values)) => *existing_values = values,
            None => slots.response_headers.push((name, values)),
        }
    });
}

pub fn route_params() -> HashMap<String, String> {
    read(|slots| slots.route_params.clone()).unwrap_or_default()
}

pub fn set_route_params(params: HashMap<String, String>) {
    write(|slots| slots.route_params = params);
}

/// Serializes `value` as the JSON response body, optionally sets the status
/// code, and sets `Content-Type: application/json`.
pub fn respond_json(value: &Value, status: Option<StatusCode>) {
    let body = serde_json::to_vec(value).unwrap_or_default();
    set_response_body(body);
    if let Some(status) = status {
        set_status_code(status);
    }
    set_response_header("Content-Type", mime::APPLICATION_JSON.as_ref());
}

/// Sets a plain-text response body and optionally the status code.
pub fn respond_text(text: impl Into<String>, status: Option<StatusCode>) {
    set_response_body(text.into());
    if let Some(status) = status {
        set_status_code(status);
    }
    set_response_header("Content-Type", "plain/text");
}
