//! Router configuration and the rules for merging it with defaults.
//!
//! There are two types. [`RouterConfig`] is a complete configuration, the
//! thing a [`Router`](crate::Router) actually runs with. [`PartialConfig`] is
//! what a caller hands in: every field optional, and only the fields that are
//! set replace the base.
//!
//! ```rust
//! use servez::{PartialConfig, RouterConfig, resolve};
//!
//! let cfg = resolve(&RouterConfig::default(), Some(PartialConfig::new().addr("0.0.0.0:3000")));
//! assert_eq!(cfg.addr, "0.0.0.0:3000");
//! assert_eq!(cfg.pre_middleware.len(), 1); // default request logger kept
//! ```

use std::fmt;
use std::sync::Arc;

use crate::middleware::{BoxedMiddleware, LogRequest, LogResponse, Middleware};

/// Listen address used when none is configured.
pub const DEFAULT_ADDR: &str = "localhost:8080";

/// A fully resolved router configuration.
///
/// Middleware are shared behind `Arc`, so cloning a config is cheap and
/// never duplicates middleware state.
#[derive(Clone)]
pub struct RouterConfig {
    /// `host:port` to listen on. Host names are resolved at bind time.
    pub addr: String,
    /// Run before the handler, first entry first.
    pub pre_middleware: Vec<BoxedMiddleware>,
    /// Run after the handler, first entry first.
    pub post_middleware: Vec<BoxedMiddleware>,
}

impl RouterConfig {
    /// [`DEFAULT_ADDR`] with no middleware at all.
    pub fn bare() -> Self {
        Self {
            addr: DEFAULT_ADDR.to_owned(),
            pre_middleware: Vec::new(),
            post_middleware: Vec::new(),
        }
    }
}

/// [`DEFAULT_ADDR`], [`LogRequest`] before every handler and [`LogResponse`]
/// after it.
impl Default for RouterConfig {
    fn default() -> Self {
        Self {
            addr: DEFAULT_ADDR.to_owned(),
            pre_middleware: vec![Arc::new(LogRequest) as BoxedMiddleware],
            post_middleware: vec![Arc::new(LogResponse) as BoxedMiddleware],
        }
    }
}

impl fmt::Debug for RouterConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RouterConfig")
            .field("addr", &self.addr)
            .field("pre_middleware", &self.pre_middleware.len())
            .field("post_middleware", &self.post_middleware.len())
            .finish()
    }
}

/// Caller-supplied overrides for a [`RouterConfig`].
///
/// `None` keeps the base value, and so does an empty address. For the
/// middleware lists `Some(vec![])` is not the same as `None`: it replaces
/// the base list with nothing. Lists are replaced wholesale, never appended
/// to the base.
#[derive(Clone, Default)]
pub struct PartialConfig {
    pub addr: Option<String>,
    pub pre_middleware: Option<Vec<BoxedMiddleware>>,
    pub post_middleware: Option<Vec<BoxedMiddleware>>,
}

impl PartialConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn addr(mut self, addr: impl Into<String>) -> Self {
        self.addr = Some(addr.into());
        self
    }

    /// Appends a pre-middleware. The first call replaces the base list.
    pub fn pre(mut self, middleware: impl Middleware) -> Self {
        self.pre_middleware.get_or_insert_with(Vec::new).push(Arc::new(middleware));
        self
    }

    /// Appends a post-middleware. The first call replaces the base list.
    pub fn post(mut self, middleware: impl Middleware) -> Self {
        self.post_middleware.get_or_insert_with(Vec::new).push(Arc::new(middleware));
        self
    }

    /// Run no pre-middleware, whatever the base has.
    pub fn without_pre_middleware(mut self) -> Self {
        self.pre_middleware = Some(Vec::new());
        self
    }

    /// Run no post-middleware, whatever the base has.
    pub fn without_post_middleware(mut self) -> Self {
        self.post_middleware = Some(Vec::new());
        self
    }
}

impl fmt::Debug for PartialConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PartialConfig")
            .field("addr", &self.addr)
            .field("pre_middleware", &self.pre_middleware.as_ref().map(Vec::len))
            .field("post_middleware", &self.post_middleware.as_ref().map(Vec::len))
            .finish()
    }
}

/// Merges `overrides` onto `base`, field by field.
///
/// Without overrides the result is `base` itself.
pub fn resolve(base: &RouterConfig, overrides: Option<PartialConfig>) -> RouterConfig {
    let mut cfg = base.clone();
    let Some(overrides) = overrides else {
        return cfg;
    };

    if let Some(addr) = overrides.addr.filter(|a| !a.is_empty()) {
        cfg.addr = addr;
    }
    if let Some(pre) = overrides.pre_middleware {
        cfg.pre_middleware = pre;
    }
    if let Some(post) = overrides.post_middleware {
        cfg.post_middleware = post;
    }
    cfg
}
