use http::StatusCode;
use serde_json::json;
use weft_web::middleware::Next;
use weft_web::{context, middleware_fn, Server};

// curl -v http://127.0.0.1:8080/
#[tokio::main]
async fn main() {
    Server::builder()
        .address("127.0.0.1:8080")
        .middleware(middleware_fn(|_next: Next| async {
            context::respond_json(&json!({"hello": "world"}), Some(StatusCode::OK));
            Ok(())
        }))
        .build()
        .unwrap()
        .start()
        .await;
}
