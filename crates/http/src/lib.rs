//! A buffered-body asynchronous HTTP/1.1 transport
//!
//! This crate provides the thin transport layer underneath the weft pipeline:
//! it reads HTTP/1.1 requests from a socket, buffers the complete request body,
//! hands the typed request to a [`handler::Handler`], and writes the response
//! back. It deliberately stays small:
//!
//! - HTTP/1.1 (and HTTP/1.0) with keep-alive connections
//! - Request bodies are fully buffered before the handler runs; chunked
//!   request bodies are rejected at decode time
//! - Asynchronous I/O using tokio, framing via tokio-util codecs
//! - Clean error handling via [`protocol::ParseError`] and
//!   [`protocol::SendError`]
//!
//! TLS, HTTP/2 and streaming bodies are out of scope.
//!
//! # Example
//!
//! ```no_run
//! use bytes::Bytes;
//! use http::{Request, Response, StatusCode};
//! use std::error::Error;
//! use std::sync::Arc;
//! use tokio::net::TcpListener;
//! use weft_http::connection::HttpConnection;
//! use weft_http::handler::make_handler;
//!
//! #[tokio::main]
//! async fn main() {
//!     let tcp_listener = TcpListener::bind("127.0.0.1:8080").await.unwrap();
//!     let handler = Arc::new(make_handler(hello_world));
//!
//!     loop {
//!         let (tcp_stream, _remote_addr) = match tcp_listener.accept().await {
//!             Ok(stream_and_addr) => stream_and_addr,
//!             Err(_) => continue,
//!         };
//!
//!         let handler = Arc::clone(&handler);
//!
//!         tokio::spawn(async move {
//!             let (reader, writer) = tcp_stream.into_split();
//!             let connection = HttpConnection::new(reader, writer);
//!             let _ = connection.process(handler).await;
//!         });
//!     }
//! }
//!
//! async fn hello_world(
//!     _request: Request<Bytes>,
//! ) -> Result<Response<Bytes>, Box<dyn Error + Send + Sync>> {
//!     let response = Response::builder()
//!         .status(StatusCode::OK)
//!         .body(Bytes::from_static(b"Hello World!\r\n"))
//!         .unwrap();
//!     Ok(response)
//! }
//! ```

pub mod codec;
pub mod connection;
pub mod handler;
pub mod protocol;

mod utils;
