//! Error types for the forwarding engine.

use axum::http::StatusCode;
use thiserror::Error;

/// Failure while forwarding a request.
#[derive(Debug, Error)]
pub enum ProxyError {
    /// The inbound connection's remote address could not be split into a
    /// bare IP. No upstream call is made.
    #[error("malformed remote address {addr:?}")]
    ClientAddress { addr: String },

    /// The rewritten request URI was not assemblable.
    #[error("request rewrite failed: {0}")]
    Rewrite(#[from] axum::http::uri::InvalidUriParts),

    /// Transport failure contacting the target (DNS, connect, timeout).
    #[error("upstream request failed: {0}")]
    Upstream(#[source] hyper_util::client::legacy::Error),

    /// Failure while copying body bytes after the status line was written.
    /// Not recoverable into a clean error response; logged only.
    #[error("body relay failed: {0}")]
    BodyCopy(#[source] Box<dyn std::error::Error + Send + Sync>),
}

impl ProxyError {
    /// Status reported to the client when this error occurs before any
    /// response bytes have been written.
    pub fn status(&self) -> StatusCode {
        match self {
            ProxyError::ClientAddress { .. }
            | ProxyError::Rewrite(_)
            | ProxyError::Upstream(_)
            | ProxyError::BodyCopy(_) => StatusCode::BAD_GATEWAY,
        }
    }
}

/// Rejected target URL at construction time. Fatal at startup.
#[derive(Debug, Error)]
#[error("invalid target url {raw:?}: {reason}")]
pub struct InvalidTarget {
    pub raw: String,
    pub reason: String,
}
