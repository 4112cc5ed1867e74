//! # servez
//!
//! A thin router over hyper: register handlers per verb, and every handler
//! gets the same ordered middleware around it.
//!
//! ## The contract
//!
//! For pre-middleware `[p1, p2]` and post-middleware `[q1, q2]`, a request
//! to any route runs
//!
//! ```text
//! p1 → p2 → handler → q1 → q2
//! ```
//!
//! Both lists run in the order they were configured. Middleware cannot stop
//! the chain; they observe the request and adjust response headers.
//!
//! What servez deliberately leaves to others:
//!
//! - **Pattern matching** — [`matchit`] decides what `/users/{id}` means
//! - **Connection handling** — hyper, one tokio task per connection
//! - **Panic recovery** — a panicking handler takes down its connection, nothing else
//!
//! ## Quick start
//!
//! ```rust,no_run
//! use servez::{PartialConfig, Request, Response, Router, StatusCode};
//!
//! #[tokio::main]
//! async fn main() {
//!     let err = Router::new(Some(PartialConfig::new().addr("0.0.0.0:3000")))
//!         .get("/users/{id}", get_user)
//!         .post("/users",     create_user)
//!         .start()
//!         .await
//!         .unwrap_err();
//!     eprintln!("server stopped: {err}");
//! }
//!
//! async fn get_user(req: Request) -> Response {
//!     let id = req.param("id").unwrap_or("unknown");
//!     Response::json(format!(r#"{{"id":"{id}"}}"#).into_bytes())
//! }
//!
//! async fn create_user(req: Request) -> Response {
//!     if req.body().is_empty() {
//!         return Response::status(StatusCode::BAD_REQUEST);
//!     }
//!     Response::status(StatusCode::CREATED)
//! }
//! ```

mod chain;
mod config;
mod error;
mod handler;
mod method;
mod mux;
mod request;
mod response;
mod router;
mod server;

pub mod middleware;

pub use config::{DEFAULT_ADDR, PartialConfig, RouterConfig, resolve};
pub use error::Error;
pub use handler::Handler;
pub use http::{StatusCode, header};
pub use method::Method;
pub use middleware::{BoxedMiddleware, Middleware};
pub use mux::Mux;
pub use request::Request;
pub use response::{IntoResponse, Response, ResponseBuilder};
pub use router::{Router, endpoint};
pub use server::Server;
