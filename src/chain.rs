//! Wraps a route handler in its pre- and post-middleware.
//!
//! Wrapping happens once, at registration. Each layer is its own value
//! holding the middleware and the handler it wraps:
//!
//! ```text
//! pre  = [p1, p2]      post = [q1, q2]
//!
//! wrap pre in reverse:   Pre(p1, Pre(p2, H))
//! then post forwards:    Post(Post(Pre(p1, Pre(p2, H)), q1), q2)
//!
//! call order:            p1, p2, H, q1, q2
//! ```
//!
//! Panics inside a middleware or handler are not caught here.

use std::sync::Arc;

use crate::handler::{BoxFuture, BoxedHandler, ErasedHandler};
use crate::middleware::BoxedMiddleware;
use crate::request::Request;
use crate::response::Response;

/// Runs `middleware` to completion, then hands the request to `inner`.
struct Pre {
    middleware: BoxedMiddleware,
    inner: BoxedHandler,
}

impl ErasedHandler for Pre {
    fn call(&self, req: Request, mut staged: Response) -> BoxFuture {
        self.middleware.handle(&req, &mut staged);
        self.inner.call(req, staged)
    }
}

/// Awaits `inner`, then runs `middleware` against its response.
///
/// The outermost post layer copies the request once; the layers inside it
/// share that copy through `call_seen`.
struct Post {
    inner: BoxedHandler,
    middleware: BoxedMiddleware,
}

impl ErasedHandler for Post {
    fn call(&self, req: Request, staged: Response) -> BoxFuture {
        let seen = Arc::new(req.clone());
        self.call_seen(req, staged, seen)
    }

    fn call_seen(&self, req: Request, staged: Response, seen: Arc<Request>) -> BoxFuture {
        let fut = self.inner.call_seen(req, staged, Arc::clone(&seen));
        let middleware = Arc::clone(&self.middleware);
        Box::pin(async move {
            let mut res = fut.await;
            middleware.handle(&seen, &mut res);
            res
        })
    }
}

/// Composes `pre`, `handler` and `post` into one handler.
///
/// With both lists empty the base handler is returned as is.
pub(crate) fn build(
    pre: &[BoxedMiddleware],
    post: &[BoxedMiddleware],
    handler: BoxedHandler,
) -> BoxedHandler {
    let mut handler = handler;

    for middleware in pre.iter().rev() {
        handler = Arc::new(Pre { middleware: Arc::clone(middleware), inner: handler });
    }

    for middleware in post {
        handler = Arc::new(Post { inner: handler, middleware: Arc::clone(middleware) });
    }

    handler
}

#[cfg(test)]
mod tests {
    use std::net::SocketAddr;
    use std::sync::Mutex;

    use http::StatusCode;
    use http::header::{HeaderValue, SERVER, X_CONTENT_TYPE_OPTIONS};

    use super::*;
    use crate::handler::Handler;
    use crate::method::Method;

    type Trace = Arc<Mutex<Vec<&'static str>>>;

    fn record(trace: &Trace, name: &'static str) -> BoxedMiddleware {
        let trace = Arc::clone(trace);
        Arc::new(move |_req: &Request, _res: &mut Response| trace.lock().unwrap().push(name))
    }

    fn base(trace: &Trace) -> BoxedHandler {
        let trace = Arc::clone(trace);
        let h = move |_req: Request| {
            trace.lock().unwrap().push("H");
            async { Response::text("ok") }
        };
        h.into_boxed_handler()
    }

    fn request() -> Request {
        Request::new(Method::Get, "/").with_remote_addr(SocketAddr::from(([127, 0, 0, 1], 4000)))
    }

    #[tokio::test]
    async fn runs_pre_then_handler_then_post_in_registration_order() {
        let trace = Trace::default();
        let pre = [record(&trace, "p1"), record(&trace, "p2"), record(&trace, "p3")];
        let post = [record(&trace, "q1"), record(&trace, "q2")];

        let chain = build(&pre, &post, base(&trace));
        chain.call(request(), Response::new()).await;

        assert_eq!(*trace.lock().unwrap(), ["p1", "p2", "p3", "H", "q1", "q2"]);
    }

    #[tokio::test]
    async fn building_twice_gives_the_same_order() {
        let trace = Trace::default();
        let pre = [record(&trace, "p1"), record(&trace, "p2")];
        let post = [record(&trace, "q1")];

        let first = build(&pre, &post, base(&trace));
        let second = build(&pre, &post, base(&trace));
        first.call(request(), Response::new()).await;
        let once = trace.lock().unwrap().split_off(0);
        second.call(request(), Response::new()).await;

        assert_eq!(once, ["p1", "p2", "H", "q1"]);
        assert_eq!(*trace.lock().unwrap(), once);
    }

    #[tokio::test]
    async fn empty_lists_leave_the_handler_untouched() {
        let trace = Trace::default();
        let handler = base(&trace);

        let chain = build(&[], &[], Arc::clone(&handler));
        assert!(Arc::ptr_eq(&chain, &handler));

        let res = chain.call(request(), Response::new()).await;
        assert_eq!(res.status_code(), StatusCode::OK);
        assert_eq!(res.body(), b"ok");
        assert_eq!(*trace.lock().unwrap(), ["H"]);
    }

    #[tokio::test]
    async fn pre_headers_are_staged_and_post_sees_final_response() {
        let stage: BoxedMiddleware = Arc::new(|_req: &Request, res: &mut Response| {
            res.headers_mut().insert(SERVER, HeaderValue::from_static("servez"));
        });
        let harden: BoxedMiddleware = Arc::new(|_req: &Request, res: &mut Response| {
            assert_eq!(res.body(), b"created");
            res.headers_mut().insert(X_CONTENT_TYPE_OPTIONS, HeaderValue::from_static("nosniff"));
        });
        let handler = |_req: Request| async {
            Response::builder().status(StatusCode::CREATED).text("created")
        };

        let chain = build(&[stage], &[harden], handler.into_boxed_handler());
        let res = chain.call(request(), Response::new()).await;

        assert_eq!(res.status_code(), StatusCode::CREATED);
        assert_eq!(res.headers()[SERVER], "servez");
        assert_eq!(res.headers()[X_CONTENT_TYPE_OPTIONS], "nosniff");
    }

    #[tokio::test]
    async fn post_middleware_sees_the_request() {
        let paths = Arc::new(Mutex::new(Vec::new()));
        let seen = Arc::clone(&paths);
        let post: BoxedMiddleware = Arc::new(move |req: &Request, _res: &mut Response| {
            seen.lock().unwrap().push(req.path().to_owned());
        });
        let handler = |req: Request| async move { req.body().len().to_string() };

        let chain = build(&[], &[post], handler.into_boxed_handler());
        let res = chain.call(request().with_body("abc"), Response::new()).await;

        assert_eq!(res.body(), b"3");
        assert_eq!(*paths.lock().unwrap(), ["/"]);
    }

    #[tokio::test]
    async fn post_layers_share_one_copy_of_the_request() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let post: Vec<BoxedMiddleware> = (0..3)
            .map(|_| {
                let seen = Arc::clone(&seen);
                Arc::new(move |req: &Request, _res: &mut Response| {
                    seen.lock().unwrap().push(req as *const Request as usize);
                }) as BoxedMiddleware
            })
            .collect();
        let handler = |_req: Request| async { "ok" };

        let chain = build(&[], &post, handler.into_boxed_handler());
        chain.call(request(), Response::new()).await;

        let seen = seen.lock().unwrap();
        assert_eq!(seen.len(), 3);
        assert!(seen.iter().all(|addr| *addr == seen[0]));
    }
}
