//! HTTP listener.
//!
//! One tokio task per connection, HTTP/1.1 or HTTP/2 as the client
//! negotiates. The server owns no routing logic: it reads the body, builds a
//! [`Request`] and hands it to the [`Mux`].
//!
//! # When `serve` returns
//!
//! Never with `Ok`. It returns:
//! - `Err(Error::Io)` if binding fails, or if `accept` fails with anything
//!   other than a per-connection or resource-exhaustion error;
//! - `Err(Error::ServerClosed)` once the shutdown signal has fired and every
//!   connection has closed. Idle keep-alive connections are closed at once;
//!   a connection with a request in progress closes after its response.
//!
//! While `accept` keeps failing for lack of file descriptors the loop backs
//! off, from 5ms doubling up to 1s, and resets after the next success.

use std::convert::Infallible;
use std::future::Future;
use std::io;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use http::StatusCode;
use http_body_util::{BodyExt, Full};
use hyper::body::Incoming;
use hyper::service::service_fn;
use hyper_util::rt::{TokioExecutor, TokioIo};
use hyper_util::server::conn::auto::Builder as ConnBuilder;
use tokio::net::TcpListener;
use tokio::sync::watch;
use tokio::task::JoinSet;
use tracing::{error, info, warn};

use crate::error::Error;
use crate::method::Method;
use crate::mux::Mux;
use crate::request::Request;
use crate::response::Response;

/// The HTTP server.
pub struct Server {
    addr: String,
}

impl Server {
    /// Configures the server to bind to `addr` when [`serve`](Server::serve)
    /// is called. Nothing is resolved or bound yet.
    pub fn bind(addr: impl Into<String>) -> Self {
        Self { addr: addr.into() }
    }

    /// Accepts connections and dispatches them through `mux` until SIGTERM
    /// or Ctrl-C.
    pub async fn serve(self, mux: Mux) -> Result<Infallible, Error> {
        self.serve_with_shutdown(mux, shutdown_signal()).await
    }

    /// Like [`serve`](Server::serve), but stops accepting when `signal`
    /// resolves, then closes every open connection.
    pub async fn serve_with_shutdown(
        self,
        mux: Mux,
        signal: impl Future<Output = ()>,
    ) -> Result<Infallible, Error> {
        let listener = TcpListener::bind(self.addr.as_str()).await?;
        let local_addr = listener.local_addr()?;
        let mux = Arc::new(mux);

        info!(addr = %local_addr, "servez listening");

        let mut tasks = JoinSet::new();
        let mut backoff = Backoff::default();
        // Every connection task holds a receiver; a send asks them all to close.
        let (closing, _) = watch::channel(());
        tokio::pin!(signal);

        loop {
            tokio::select! {
                // Check shutdown first so a signal stops accepting at once,
                // even if more connections are queued.
                biased;

                () = &mut signal => {
                    info!(in_flight = tasks.len(), "shutdown signal received, draining connections");
                    closing.send_replace(());
                    break;
                }

                res = listener.accept() => {
                    let (stream, remote_addr) = match res {
                        Ok(v) => {
                            backoff.reset();
                            v
                        }
                        Err(e) if is_connection_error(&e) => {
                            warn!("accept error: {e}");
                            continue;
                        }
                        Err(e) if is_resource_exhaustion(&e) => {
                            let delay = backoff.next();
                            warn!(retry_in = ?delay, "accept error: {e}");
                            tokio::time::sleep(delay).await;
                            continue;
                        }
                        Err(e) => {
                            error!("listener failed: {e}");
                            return Err(e.into());
                        }
                    };

                    let mux = Arc::clone(&mux);
                    let io = TokioIo::new(stream);
                    let mut close = closing.subscribe();

                    tasks.spawn(async move {
                        // Called once per request on the connection.
                        let svc = service_fn(move |req| {
                            let mux = Arc::clone(&mux);
                            async move { dispatch(mux, req, remote_addr).await }
                        });

                        let builder = ConnBuilder::new(TokioExecutor::new());
                        let conn = builder.serve_connection(io, svc);
                        tokio::pin!(conn);

                        // On shutdown, let the request in progress finish and
                        // close idle keep-alive connections right away.
                        let res = tokio::select! {
                            res = conn.as_mut() => res,
                            _ = close.changed() => {
                                conn.as_mut().graceful_shutdown();
                                conn.await
                            }
                        };
                        if let Err(e) = res {
                            error!(peer = %remote_addr, "connection error: {e}");
                        }
                    });
                }

                // Reap finished connection tasks so the JoinSet does not grow
                // without bound on long-running servers.
                Some(joined) = tasks.join_next(), if !tasks.is_empty() => {
                    if let Err(e) = joined {
                        error!("connection task failed: {e}");
                    }
                }
            }
        }

        while let Some(joined) = tasks.join_next().await {
            if let Err(e) = joined {
                error!("connection task failed: {e}");
            }
        }

        info!("servez stopped");
        Err(Error::ServerClosed)
    }
}

/// Errors that concern only the connection being accepted.
fn is_connection_error(e: &io::Error) -> bool {
    matches!(
        e.kind(),
        io::ErrorKind::ConnectionAborted
            | io::ErrorKind::ConnectionRefused
            | io::ErrorKind::ConnectionReset
            | io::ErrorKind::Interrupted
            | io::ErrorKind::WouldBlock
    )
}

/// Errors that pass once load drops: out of file descriptors, out of memory.
fn is_resource_exhaustion(e: &io::Error) -> bool {
    matches!(e.kind(), io::ErrorKind::OutOfMemory | io::ErrorKind::TimedOut)
        // ENFILE / EMFILE
        || (cfg!(unix) && matches!(e.raw_os_error(), Some(23 | 24)))
}

const BACKOFF_MIN: Duration = Duration::from_millis(5);
const BACKOFF_MAX: Duration = Duration::from_secs(1);

/// Delay between retries of a failing `accept`: 5ms, doubling, capped at 1s.
#[derive(Debug, Default)]
struct Backoff {
    current: Option<Duration>,
}

impl Backoff {
    fn next(&mut self) -> Duration {
        let delay = match self.current {
            None => BACKOFF_MIN,
            Some(d) => (d * 2).min(BACKOFF_MAX),
        };
        self.current = Some(delay);
        delay
    }

    fn reset(&mut self) {
        self.current = None;
    }
}

// ── Request dispatch ──────────────────────────────────────────────────────────

/// Reads one request off the wire and runs it through the mux.
///
/// Every failure becomes a response, so hyper never sees an error.
async fn dispatch(
    mux: Arc<Mux>,
    req: hyper::Request<Incoming>,
    remote_addr: SocketAddr,
) -> Result<http::Response<Full<Bytes>>, Infallible> {
    let Ok(method) = Method::try_from(req.method()) else {
        return Ok(mux.reject_method(req.uri().path()).into_inner());
    };

    let (parts, body) = req.into_parts();
    let body = match body.collect().await {
        Ok(collected) => collected.to_bytes(),
        Err(e) => {
            warn!(peer = %remote_addr, "failed to read request body: {e}");
            return Ok(Response::status(StatusCode::BAD_REQUEST).into_inner());
        }
    };

    let response = mux.dispatch(Request::from_parts(method, parts, body, remote_addr)).await;
    Ok(response.into_inner())
}

// ── Shutdown signal ───────────────────────────────────────────────────────────

/// Resolves on the first SIGTERM or SIGINT (Ctrl-C).
///
/// On Windows only Ctrl-C is available. If a handler cannot be installed
/// that signal is simply never seen.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("failed to install Ctrl-C handler: {e}");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let sigterm = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                error!("failed to install SIGTERM handler: {e}");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let sigterm = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c  => {}
        () = sigterm => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn backoff_doubles_up_to_a_cap_and_resets() {
        let mut backoff = Backoff::default();
        let delays: Vec<_> = (0..10).map(|_| backoff.next()).collect();

        assert_eq!(delays[0], Duration::from_millis(5));
        assert_eq!(delays[1], Duration::from_millis(10));
        assert_eq!(delays[2], Duration::from_millis(20));
        assert_eq!(delays[8], Duration::from_secs(1));
        assert_eq!(delays[9], Duration::from_secs(1));

        backoff.reset();
        assert_eq!(backoff.next(), Duration::from_millis(5));
    }

    #[test]
    fn classifies_accept_errors() {
        assert!(is_connection_error(&io::Error::from(io::ErrorKind::ConnectionAborted)));
        assert!(!is_resource_exhaustion(&io::Error::from(io::ErrorKind::ConnectionAborted)));

        #[cfg(unix)]
        assert!(is_resource_exhaustion(&io::Error::from_raw_os_error(24)));

        let fatal = io::Error::from(io::ErrorKind::PermissionDenied);
        assert!(!is_connection_error(&fatal) && !is_resource_exhaustion(&fatal));
    }
}
