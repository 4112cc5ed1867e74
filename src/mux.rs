//! Request multiplexer.
//!
//! Routes are registered under an endpoint key, `"<VERB> <pattern>"`, and
//! stored in one radix tree per method. Pattern syntax is whatever
//! [`matchit`] accepts: `/users/{id}` for a named segment,
//! `/static/{*path}` for a catch-all.
//!
//! A `HEAD` request with no `HEAD` route of its own is served by the `GET`
//! route for the same path. If the path is known under other methods only,
//! the answer is `405` with an `Allow` header instead of `404`.

use std::collections::HashMap;
use std::sync::Arc;

use http::StatusCode;
use http::header::{ALLOW, HeaderValue};
use matchit::Router as MatchitRouter;

use crate::error::Error;
use crate::handler::BoxedHandler;
use crate::method::Method;
use crate::request::Request;
use crate::response::Response;

/// Maps endpoint keys to handlers and dispatches requests to them.
///
/// Write-once: every route is added before the mux is handed to the server,
/// after which it is only ever read.
#[derive(Default)]
pub struct Mux {
    routes: HashMap<Method, MatchitRouter<BoxedHandler>>,
}

/// Result of matching a method and path against the registered routes.
pub(crate) enum Lookup {
    Found(BoxedHandler, HashMap<String, String>),
    /// The path exists, but not for this method. Methods are sorted.
    MethodNotAllowed(Vec<Method>),
    NotFound,
}

impl Mux {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `handler` under an endpoint key such as `"GET /items/{id}"`.
    ///
    /// Fails if the key has no verb or no pattern, if the verb is unknown,
    /// or if the pattern is malformed or conflicts with an existing route.
    pub fn handle(&mut self, endpoint: &str, handler: BoxedHandler) -> Result<(), Error> {
        let (verb, pattern) = endpoint
            .split_once(' ')
            .filter(|(_, pattern)| !pattern.is_empty())
            .ok_or_else(|| Error::Pattern(endpoint.to_owned()))?;
        let method: Method = verb.parse().map_err(|()| Error::Pattern(endpoint.to_owned()))?;

        self.routes
            .entry(method)
            .or_default()
            .insert(pattern, handler)
            .map_err(|source| Error::Route { endpoint: endpoint.to_owned(), source })
    }

    pub(crate) fn lookup(&self, method: Method, path: &str) -> Lookup {
        if let Some(found) = self.find(method, path) {
            return found;
        }
        if method == Method::Head {
            if let Some(found) = self.find(Method::Get, path) {
                return found;
            }
        }

        let allowed = self.allowed(path);
        if allowed.is_empty() {
            return Lookup::NotFound;
        }
        Lookup::MethodNotAllowed(allowed)
    }

    /// Every method `path` is routable under, sorted. `HEAD` is implied by `GET`.
    fn allowed(&self, path: &str) -> Vec<Method> {
        let mut allowed: Vec<Method> = self.routes.iter()
            .filter(|(_, tree)| tree.at(path).is_ok())
            .map(|(m, _)| *m)
            .collect();
        if allowed.contains(&Method::Get) && !allowed.contains(&Method::Head) {
            allowed.push(Method::Head);
        }
        allowed.sort();
        allowed
    }

    fn find(&self, method: Method, path: &str) -> Option<Lookup> {
        let matched = self.routes.get(&method)?.at(path).ok()?;
        let handler = Arc::clone(matched.value);
        let params = matched.params.iter()
            .map(|(k, v)| (k.to_owned(), v.to_owned()))
            .collect();
        Some(Lookup::Found(handler, params))
    }

    /// Routes one request through its handler chain.
    pub(crate) async fn dispatch(&self, mut req: Request) -> Response {
        match self.lookup(req.method(), req.path()) {
            Lookup::Found(handler, params) => {
                req.set_params(params);
                handler.call(req, Response::new()).await
            }
            Lookup::MethodNotAllowed(allowed) => method_not_allowed(&allowed),
            Lookup::NotFound => Response::status(StatusCode::NOT_FOUND),
        }
    }

    /// Answer for a method no route can be registered under: `404` if the
    /// path is unknown, otherwise `405` listing what the path does accept.
    pub(crate) fn reject_method(&self, path: &str) -> Response {
        let allowed = self.allowed(path);
        if allowed.is_empty() {
            return Response::status(StatusCode::NOT_FOUND);
        }
        method_not_allowed(&allowed)
    }
}

fn method_not_allowed(allowed: &[Method]) -> Response {
    let allow = allowed.iter().map(|m| m.as_str()).collect::<Vec<_>>().join(", ");
    let mut res = Response::status(StatusCode::METHOD_NOT_ALLOWED);
    // Built only from method names, which are valid header characters.
    if let Ok(value) = HeaderValue::from_str(&allow) {
        res.headers_mut().insert(ALLOW, value);
    }
    res
}
