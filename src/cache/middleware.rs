//! Cache middleware wrapping the forwarding handler.
//!
//! # Responsibilities
//! - Classify cacheability (GET only; everything else always forwards)
//! - Replay stored responses on a hit without contacting upstream
//! - Tee the streamed body on a cacheable miss and populate the store
//! - Mark every response with `X-Proxy-Cached: true|false`
//!
//! # Design Decisions
//! - The tee is a pass-through `http_body::Body` wrapper: every frame the
//!   client receives is forwarded unmodified, so the relay's flush cadence
//!   and trailer ordering are unaffected
//! - A forward that errored (engine 502 marker, or an error frame mid-body)
//!   is never stored; oversize bodies are relayed but not captured
//! - Store problems degrade to a miss; forwarding is never blocked

use std::pin::Pin;
use std::task::{Context, Poll};

use axum::{
    body::Body,
    extract::{Request, State},
    http::{HeaderMap, HeaderValue, Method},
    middleware::Next,
    response::Response,
};
use bytes::{Bytes, BytesMut};
use http_body::Frame;
use std::convert::Infallible;
use std::sync::Arc;

use crate::cache::codec::{self, CachedResponse};
use crate::cache::key;
use crate::cache::store::Store;
use crate::http::headers::X_PROXY_CACHED;
use crate::http::server::AppState;
use crate::observability::metrics;

/// Response extension marking a failed forward that must not be cached.
#[derive(Debug, Clone, Copy)]
pub struct SkipCache;

/// Middleware entry point.
pub async fn handle(State(state): State<AppState>, req: Request, next: Next) -> Response {
    if !state.cache_enabled || req.method() != Method::GET {
        metrics::record_cache("bypass");
        let mut response = next.run(req).await;
        mark(response.headers_mut(), false);
        return response;
    }

    let key = key::fingerprint(req.uri(), req.headers());

    if let Some(blob) = state.store.get(&key) {
        match codec::deserialize(&blob) {
            Ok(cached) => {
                metrics::record_cache("hit");
                tracing::debug!(key = %key, status = %cached.status, "cache hit");
                return replay(cached);
            }
            Err(error) => {
                // Never let a bad entry block the live path.
                tracing::warn!(key = %key, %error, "evicting undecodable cache entry");
                state.store.remove(&key);
            }
        }
    }

    metrics::record_cache("miss");
    tracing::debug!(key = %key, "cache miss");

    let mut response = next.run(req).await;
    mark(response.headers_mut(), false);

    if response.extensions().get::<SkipCache>().is_some() {
        return response;
    }

    let (parts, body) = response.into_parts();

    // The marker is not part of the stored header set; the replay path
    // writes its own.
    let mut stored_headers = parts.headers.clone();
    stored_headers.remove(X_PROXY_CACHED);

    let tee = TeeBody::new(
        body,
        Capture {
            status: parts.status,
            headers: stored_headers,
            key,
            store: state.store.clone(),
            limit: state.max_object_bytes,
        },
    );
    Response::from_parts(parts, Body::new(tee))
}

fn mark(headers: &mut HeaderMap, hit: bool) {
    let value = if hit { "true" } else { "false" };
    headers.insert(X_PROXY_CACHED, HeaderValue::from_static(value));
}

/// Build a client response from a stored entry, original status included.
fn replay(cached: CachedResponse) -> Response {
    let CachedResponse {
        status,
        headers,
        trailers,
        body,
    } = cached;

    let mut response = Response::new(Body::new(ReplayBody::new(body, trailers)));
    *response.status_mut() = status;
    *response.headers_mut() = headers;
    mark(response.headers_mut(), true);
    response
}

/// Everything needed to persist a captured response once its body ends.
struct Capture {
    status: axum::http::StatusCode,
    headers: HeaderMap,
    key: String,
    store: Arc<Store>,
    limit: usize,
}

/// Pass-through body that tees data frames into a capture buffer.
///
/// On clean end-of-stream the captured response is serialized and inserted
/// into the store. An error frame or an oversize body drops the capture and
/// only relays.
struct TeeBody {
    inner: Body,
    capture: Option<Capture>,
    buf: BytesMut,
    trailers: HeaderMap,
    overflowed: bool,
}

impl TeeBody {
    fn new(inner: Body, capture: Capture) -> Self {
        Self {
            inner,
            capture: Some(capture),
            buf: BytesMut::new(),
            trailers: HeaderMap::new(),
            overflowed: false,
        }
    }

    fn finish(&mut self) {
        let Some(capture) = self.capture.take() else {
            return;
        };
        if self.overflowed {
            tracing::debug!(key = %capture.key, "response exceeds cache object limit");
            return;
        }
        let entry = CachedResponse {
            status: capture.status,
            headers: capture.headers,
            trailers: std::mem::take(&mut self.trailers),
            body: self.buf.split().freeze(),
        };
        capture.store.insert(capture.key, codec::serialize(&entry));
    }
}

impl http_body::Body for TeeBody {
    type Data = Bytes;
    type Error = axum::Error;

    fn poll_frame(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
    ) -> Poll<Option<Result<Frame<Self::Data>, Self::Error>>> {
        let this = self.get_mut();
        match Pin::new(&mut this.inner).poll_frame(cx) {
            Poll::Ready(Some(Ok(frame))) => {
                if let Some(data) = frame.data_ref() {
                    if !this.overflowed && this.capture.is_some() {
                        let limit = this.capture.as_ref().map(|c| c.limit).unwrap_or(0);
                        if this.buf.len() + data.len() > limit {
                            this.overflowed = true;
                            this.buf.clear();
                        } else {
                            this.buf.extend_from_slice(data);
                        }
                    }
                } else if let Some(trailers) = frame.trailers_ref() {
                    // Trailers are the final frame; callers may never poll
                    // again after receiving them, so persist here.
                    this.trailers = trailers.clone();
                    this.finish();
                }
                Poll::Ready(Some(Ok(frame)))
            }
            Poll::Ready(Some(Err(e))) => {
                // Failed forward; drop the capture.
                this.capture = None;
                Poll::Ready(Some(Err(e)))
            }
            Poll::Ready(None) => {
                this.finish();
                Poll::Ready(None)
            }
            Poll::Pending => Poll::Pending,
        }
    }

    fn is_end_stream(&self) -> bool {
        self.inner.is_end_stream()
    }
}

/// Body replaying a stored entry: one data frame, then trailers if any.
struct ReplayBody {
    data: Option<Bytes>,
    trailers: Option<HeaderMap>,
}

impl ReplayBody {
    fn new(data: Bytes, trailers: HeaderMap) -> Self {
        Self {
            data: Some(data),
            trailers: Some(trailers),
        }
    }
}

impl http_body::Body for ReplayBody {
    type Data = Bytes;
    type Error = Infallible;

    fn poll_frame(
        self: Pin<&mut Self>,
        _cx: &mut Context<'_>,
    ) -> Poll<Option<Result<Frame<Self::Data>, Self::Error>>> {
        let this = self.get_mut();
        if let Some(data) = this.data.take() {
            if !data.is_empty() {
                return Poll::Ready(Some(Ok(Frame::data(data))));
            }
        }
        if let Some(trailers) = this.trailers.take() {
            if !trailers.is_empty() {
                return Poll::Ready(Some(Ok(Frame::trailers(trailers))));
            }
        }
        Poll::Ready(None)
    }

    fn is_end_stream(&self) -> bool {
        self.data.is_none() && self.trailers.is_none()
    }
}
