use http::StatusCode;
use serde_json::json;
use tracing::info;
use weft_web::middleware::Next;
use weft_web::{context, handler_fn, middleware_fn, request_body, BoxError, Router, Server};

// curl -v http://127.0.0.1:8080/api/user/666
async fn get_user() -> Result<(), BoxError> {
    let params = context::route_params();
    context::respond_json(&json!({ "id": params.get("id") }), Some(StatusCode::OK));
    Ok(())
}

// curl -v -H 'Content-Type: application/json' -d '{"name":"bob"}' http://127.0.0.1:8080/api/user
async fn create_user() -> Result<(), BoxError> {
    let body = request_body().json();
    context::respond_json(&body, Some(StatusCode::CREATED));
    Ok(())
}

#[tokio::main]
async fn main() {
    let mut router = Router::new();
    router.get("/api/user/:id", handler_fn(get_user)).unwrap();
    router.post("/api/user", handler_fn(create_user)).unwrap();

    Server::builder()
        .address("127.0.0.1:8080")
        .middleware(middleware_fn(|next: Next| async move {
            info!(request_id = ?context::request_id(), "incoming request");
            next.run().await
        }))
        .router(router)
        .on_error(|error| async move {
            context::respond_json(&json!({ "error": error.to_string() }), Some(StatusCode::INTERNAL_SERVER_ERROR));
            Ok(())
        })
        .build()
        .unwrap()
        .start()
        .await;
}
