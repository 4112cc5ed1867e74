//! Minimal servez example — CRUD-style JSON endpoints with logging and header middleware.
//!
//! Run with:
//!   RUST_LOG=info cargo run --example basic
//!
//! Try:
//!   curl -i http://localhost:3000/users/42
//!   curl -i -X POST http://localhost:3000/users -d '{"name":"alice"}'
//!   curl -i -X PUT http://localhost:3000/users/42 -d '{"name":"bob"}'
//!   curl -i -X DELETE http://localhost:3000/users/42

use servez::middleware::{LogRequest, LogResponse};
use servez::{PartialConfig, Request, Response, Router, StatusCode, header};

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt::init();

    let config = PartialConfig::new()
        .addr("0.0.0.0:3000")
        .pre(LogRequest)
        .pre(no_sniff)
        .post(LogResponse);

    let err = Router::new(Some(config))
        .get("/users/{id}",    get_user)
        .post("/users",        create_user)
        .put("/users/{id}",    update_user)
        .delete("/users/{id}", delete_user)
        .start()
        .await
        .unwrap_err();

    eprintln!("server stopped: {err}");
}

// Staged before the handler runs; survives unless a handler sets it too.
fn no_sniff(_req: &Request, res: &mut Response) {
    res.headers_mut().insert(
        header::X_CONTENT_TYPE_OPTIONS,
        header::HeaderValue::from_static("nosniff"),
    );
}

// GET /users/{id}
async fn get_user(req: Request) -> Response {
    let id = req.param("id").unwrap_or("unknown");
    Response::json(format!(r#"{{"id":"{id}","name":"alice"}}"#).into_bytes())
}

// POST /users
async fn create_user(req: Request) -> Response {
    if req.body().is_empty() {
        return Response::status(StatusCode::BAD_REQUEST);
    }

    Response::builder()
        .status(StatusCode::CREATED)
        .header(header::LOCATION, header::HeaderValue::from_static("/users/99"))
        .json(r#"{"id":"99","name":"new_user"}"#.to_owned().into_bytes())
}

// PUT /users/{id}
async fn update_user(req: Request) -> Response {
    match req.param("id") {
        Some(_) if !req.body().is_empty() => Response::json(req.body().to_vec()),
        _ => Response::status(StatusCode::BAD_REQUEST),
    }
}

// DELETE /users/{id} → 204 No Content
async fn delete_user(_req: Request) -> StatusCode {
    StatusCode::NO_CONTENT
}
