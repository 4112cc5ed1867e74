//! Middleware layer.
//!
//! A middleware is anything with a `handle(&Request, &mut Response)` method.
//! It observes the request and may touch response headers; it cannot stop
//! the chain. The router runs every configured pre-middleware before the
//! handler and every post-middleware after it:
//!
//! ```text
//! pre[0] → pre[1] → … → handler → post[0] → post[1] → …
//! ```
//!
//! Plain functions and closures with the right signature are middleware
//! already:
//!
//! ```rust
//! use servez::{PartialConfig, Request, Response, header};
//!
//! fn powered_by(_req: &Request, res: &mut Response) {
//!     res.headers_mut().insert(header::SERVER, header::HeaderValue::from_static("servez"));
//! }
//!
//! let cfg = PartialConfig::new().pre(powered_by);
//! ```
//!
//! Built-in:
//! - [`LogRequest`] — one `info` line per request with method, path, peer
//! - [`LogResponse`] — one `info` line per response with its status

use std::sync::Arc;

use crate::request::Request;
use crate::response::Response;

mod log;

pub use log::{LogRequest, LogResponse};

/// A single step run before or after a route handler.
///
/// Pre-middleware receive the staged response for the request; headers they
/// insert survive unless the handler sets the same header itself.
/// Post-middleware receive the handler's response just before it is written.
pub trait Middleware: Send + Sync + 'static {
    fn handle(&self, req: &Request, res: &mut Response);
}

/// A middleware shared between every route it wraps.
pub type BoxedMiddleware = Arc<dyn Middleware>;

impl<F> Middleware for F
where
    F: Fn(&Request, &mut Response) + Send + Sync + 'static,
{
    fn handle(&self, req: &Request, res: &mut Response) {
        self(req, res)
    }
}
