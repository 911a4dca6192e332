//! Forwarding engine.
//!
//! # Responsibilities
//! - Hold the immutable upstream target bound at construction
//! - Rewrite inbound requests (URI scheme/authority, Host, X-Forwarded-For)
//! - Dispatch upstream and relay the response as a streaming body
//! - Announce upstream trailer keys before the status line is committed
//!
//! # Design Decisions
//! - The target is never mutated after construction
//! - A fresh URI is assembled from parts, so any pre-set absolute-form
//!   request target from the client is discarded
//! - Header copy is last-value-wins per key (see `http::headers`)

use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;
use std::time::Duration;

use axum::body::Body;
use axum::http::uri::{Authority, PathAndQuery, Scheme};
use axum::http::{header, HeaderMap, HeaderValue, Request, Response, Uri};
use hyper_util::client::legacy::{connect::HttpConnector, Client};
use tokio::sync::mpsc;
use url::Url;

use crate::http::headers::{self, X_FORWARDED_FOR};
use crate::proxy::error::{InvalidTarget, ProxyError};
use crate::proxy::relay::{self, RelayBody};

/// Frames buffered between the relay task and the client body.
const RELAY_CHANNEL_CAPACITY: usize = 16;

/// The single upstream origin all traffic is forwarded to.
///
/// Immutable once parsed; the engine clones the pieces into each rewritten
/// request.
#[derive(Debug, Clone)]
pub struct Target {
    scheme: Scheme,
    authority: Authority,
    host_header: HeaderValue,
}

impl Target {
    /// Parse and validate a target URL (scheme + host, plain http only).
    pub fn parse(raw: &str) -> Result<Self, InvalidTarget> {
        let invalid = |reason: &str| InvalidTarget {
            raw: raw.to_string(),
            reason: reason.to_string(),
        };

        let url = Url::parse(raw).map_err(|e| invalid(&e.to_string()))?;
        if url.scheme() != "http" {
            return Err(invalid("only http targets are supported"));
        }
        let host = url.host_str().ok_or_else(|| invalid("missing host"))?;
        let authority = match url.port() {
            Some(port) => format!("{}:{}", host, port),
            None => host.to_string(),
        };

        let authority: Authority = authority
            .parse()
            .map_err(|_| invalid("host is not a valid authority"))?;
        let host_header = HeaderValue::from_str(authority.as_str())
            .map_err(|_| invalid("host is not a valid header value"))?;

        Ok(Self {
            scheme: Scheme::HTTP,
            authority,
            host_header,
        })
    }

    /// Rewrite a request URI to address this target, keeping the original
    /// path and query.
    pub(crate) fn rewrite_uri(&self, uri: Uri) -> Result<Uri, ProxyError> {
        let mut parts = uri.into_parts();
        parts.scheme = Some(self.scheme.clone());
        parts.authority = Some(self.authority.clone());
        if parts.path_and_query.is_none() {
            parts.path_and_query = Some(PathAndQuery::from_static("/"));
        }
        Ok(Uri::from_parts(parts)?)
    }
}

/// Derive the client's bare IP from the connection's remote address.
pub(crate) fn client_ip(remote_addr: &str) -> Result<IpAddr, ProxyError> {
    remote_addr
        .parse::<SocketAddr>()
        .map(|addr| addr.ip())
        .map_err(|_| ProxyError::ClientAddress {
            addr: remote_addr.to_string(),
        })
}

/// Forwards rewritten requests to the target and relays responses back.
pub struct ForwardingEngine {
    target: Target,
    client: Client<HttpConnector, Body>,
    flush_interval: Duration,
}

impl ForwardingEngine {
    /// Create an engine bound to `target`, flushing streamed output at
    /// `flush_interval`.
    pub fn new(target: Target, client: Client<HttpConnector, Body>, flush_interval: Duration) -> Arc<Self> {
        Arc::new(Self {
            target,
            client,
            flush_interval,
        })
    }

    /// Forward one request and return the streaming response.
    ///
    /// Any error returned here occurred before response bytes were written,
    /// so the caller can still produce a clean 502. Failures during the body
    /// copy are logged by the relay task instead.
    pub async fn forward(
        &self,
        remote_addr: &str,
        req: Request<Body>,
    ) -> Result<Response<Body>, ProxyError> {
        let (mut parts, body) = req.into_parts();

        parts.uri = self.target.rewrite_uri(parts.uri)?;

        let ip = client_ip(remote_addr)?;
        let forwarded_for =
            HeaderValue::from_str(&ip.to_string()).map_err(|_| ProxyError::ClientAddress {
                addr: remote_addr.to_string(),
            })?;

        headers::strip_hop_by_hop(&mut parts.headers);
        parts.headers.insert(header::HOST, self.target.host_header.clone());
        parts.headers.insert(X_FORWARDED_FOR, forwarded_for);

        tracing::debug!(uri = %parts.uri, method = %parts.method, "forwarding request");

        let upstream = self
            .client
            .request(Request::from_parts(parts, body))
            .await
            .map_err(ProxyError::Upstream)?;

        let (up_parts, up_body) = upstream.into_parts();

        // Headers first: copy, drop connection-level fields, then announce
        // trailer keys before the status line goes out.
        let mut out_headers = HeaderMap::new();
        headers::copy_headers(&mut out_headers, &up_parts.headers);
        headers::strip_hop_by_hop(&mut out_headers);
        headers::announce_trailers(&mut out_headers, &up_parts.headers);

        let (tx, rx) = mpsc::channel(RELAY_CHANNEL_CAPACITY);
        tokio::spawn(relay::run(up_body, tx, self.flush_interval));

        let mut response = Response::new(Body::new(RelayBody::new(rx)));
        *response.status_mut() = up_parts.status;
        *response.headers_mut() = out_headers;
        Ok(response)
    }
}
