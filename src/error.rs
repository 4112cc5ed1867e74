//! Unified error type.

/// The error type returned by servez's fallible operations.
///
/// Application-level errors (404, 422, etc.) are expressed as HTTP
/// [`Response`](crate::Response) values, not as `Error`s. This type surfaces
/// infrastructure failures: registering a bad route, binding to a port, or
/// the listener going away.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Binding the listen address or accepting a connection failed.
    #[error("io: {0}")]
    Io(#[from] std::io::Error),

    /// The endpoint key was not of the form `"<VERB> <pattern>"`.
    #[error("invalid endpoint `{0}`")]
    Pattern(String),

    /// The pattern was malformed or conflicts with an existing route.
    #[error("route `{endpoint}`: {source}")]
    Route {
        endpoint: String,
        #[source]
        source: matchit::InsertError,
    },

    /// The server stopped accepting connections after a shutdown signal.
    #[error("server closed")]
    ServerClosed,
}
