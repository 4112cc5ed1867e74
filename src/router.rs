//! The application router.
//!
//! Build it once at startup: resolve the configuration, register every
//! route, then call [`Router::start`]. Registration methods take and return
//! `self` and `start` consumes the router, so the routing table can only be
//! written before the server is running.

use std::convert::Infallible;
use std::future::Future;

use tracing::{debug, info};

use crate::chain;
use crate::config::{PartialConfig, RouterConfig, resolve};
use crate::error::Error;
use crate::handler::Handler;
use crate::method::Method;
use crate::mux::Mux;
use crate::server::Server;

/// Route registration with a fixed middleware chain around every handler.
///
/// ```rust,no_run
/// use servez::{PartialConfig, Request, Response, Router};
///
/// # async fn run() -> Result<(), servez::Error> {
/// Router::new(Some(PartialConfig::new().addr("0.0.0.0:3000")))
///     .get("/items/{id}", get_item)
///     .post("/items",     create_item)
///     .start()
///     .await?;
/// # Ok(())
/// # }
/// # async fn get_item(_: Request) -> Response { Response::text("") }
/// # async fn create_item(_: Request) -> Response { Response::text("") }
/// ```
pub struct Router {
    config: RouterConfig,
    mux: Mux,
}

impl Router {
    /// Builds a router from the built-in defaults, overridden by `config`.
    ///
    /// See [`RouterConfig::default`] for what the defaults are and
    /// [`PartialConfig`] for how overrides apply.
    pub fn new(config: Option<PartialConfig>) -> Self {
        Self::from_config(resolve(&RouterConfig::default(), config))
    }

    /// Builds a router from an already resolved configuration.
    pub fn from_config(config: RouterConfig) -> Self {
        Self { config, mux: Mux::new() }
    }

    /// The configuration every route is wrapped with.
    pub fn config(&self) -> &RouterConfig {
        &self.config
    }

    /// Register a handler for a method + pattern pair. Returns `self` for chaining.
    ///
    /// # Panics
    ///
    /// Panics if the pattern is malformed or the same method + pattern was
    /// already registered.
    pub fn on(mut self, method: Method, pattern: &str, handler: impl Handler) -> Self {
        let endpoint = endpoint(method, pattern);
        let handler = chain::build(
            &self.config.pre_middleware,
            &self.config.post_middleware,
            handler.into_boxed_handler(),
        );

        self.mux
            .handle(&endpoint, handler)
            .unwrap_or_else(|e| panic!("cannot register `{endpoint}`: {e}"));
        debug!(%endpoint, "route registered");
        self
    }

    pub fn get(self, pattern: &str, handler: impl Handler) -> Self {
        self.on(Method::Get, pattern, handler)
    }

    pub fn post(self, pattern: &str, handler: impl Handler) -> Self {
        self.on(Method::Post, pattern, handler)
    }

    pub fn put(self, pattern: &str, handler: impl Handler) -> Self {
        self.on(Method::Put, pattern, handler)
    }

    pub fn delete(self, pattern: &str, handler: impl Handler) -> Self {
        self.on(Method::Delete, pattern, handler)
    }

    /// Binds the configured address and serves until the listener dies or
    /// the process receives SIGTERM / Ctrl-C.
    ///
    /// Only returns on failure: a bind or fatal accept error, or
    /// [`Error::ServerClosed`] after a signal-driven shutdown.
    pub async fn start(self) -> Result<Infallible, Error> {
        info!(addr = %self.config.addr, "starting server");
        Server::bind(self.config.addr).serve(self.mux).await
    }

    /// Like [`start`](Router::start), but shuts down when `signal` resolves.
    pub async fn start_with_shutdown(
        self,
        signal: impl Future<Output = ()>,
    ) -> Result<Infallible, Error> {
        info!(addr = %self.config.addr, "starting server");
        Server::bind(self.config.addr).serve_with_shutdown(self.mux, signal).await
    }

    #[cfg(test)]
    pub(crate) fn mux(&self) -> &Mux {
        &self.mux
    }
}

impl Default for Router {
    fn default() -> Self {
        Self::new(None)
    }
}

/// The key a route is registered under: `"<VERB> <pattern>"`.
pub fn endpoint(method: Method, pattern: &str) -> String {
    format!("{method} {pattern}")
}
