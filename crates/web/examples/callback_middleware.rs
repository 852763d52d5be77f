use http::StatusCode;
use serde_json::json;
use weft_web::adapter::{execute_callback_middleware, Completion};
use weft_web::middleware::Next;
use weft_web::proxy::{ReadonlyProxy, RecordingProxy};
use weft_web::{context, middleware_fn, Server};

/// Middleware written against the callback contract: it never touches the
/// native context, only the handles it is given.
fn allow_any_origin(_request: ReadonlyProxy, response: RecordingProxy, done: Completion) {
    response.prop("setHeader").call(vec![json!("Access-Control-Allow-Origin"), json!("*")]);
    done.done();
}

// curl -v -d '{"some":"data"}' http://127.0.0.1:8080/
#[tokio::main]
async fn main() {
    Server::builder()
        .address("127.0.0.1:8080")
        .middleware(middleware_fn(|next: Next| async move {
            let changes = execute_callback_middleware(allow_any_origin).await?;
            changes.apply_header_calls();
            next.run().await
        }))
        .middleware(middleware_fn(|_next: Next| async {
            context::respond_json(&json!({"success": true}), Some(StatusCode::CREATED));
            Ok(())
        }))
        .build()
        .unwrap()
        .start()
        .await;
}
