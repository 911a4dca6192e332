//! Per-request body relay.
//!
//! One relay task runs for the duration of each streamed response. It pulls
//! frames from the upstream body and pushes them through the flusher into an
//! mpsc channel; `RelayBody` drains that channel on the client side. The
//! select loop interleaves upstream reads with flush ticks, and every exit
//! path drops the flusher, which stops the ticker.

use std::pin::Pin;
use std::task::{Context, Poll};
use std::time::Duration;

use bytes::Bytes;
use http_body::Frame;
use http_body_util::BodyExt;
use tokio::sync::mpsc;

use crate::proxy::error::ProxyError;
use crate::proxy::flush::{FrameSender, Flusher};

/// Copy all frames of `upstream` into `tx`.
///
/// Data frames are coalesced and flushed on `flush_interval`; the trailer
/// frame, if any, is forwarded after the final data flush. A mid-body
/// upstream error cannot be reported at the protocol level any more (the
/// status line is committed), so it is logged and surfaced as an error frame
/// that aborts the client connection.
pub(crate) async fn run<B>(mut upstream: B, tx: FrameSender, flush_interval: Duration)
where
    B: http_body::Body<Data = Bytes> + Send + Unpin + 'static,
    B::Error: std::error::Error + Send + Sync + 'static,
{
    let mut flusher = Flusher::new(flush_interval);

    loop {
        tokio::select! {
            frame = upstream.frame() => match frame {
                Some(Ok(frame)) => match frame.into_data() {
                    Ok(data) => {
                        if !flusher.push(data, &tx).await {
                            return;
                        }
                    }
                    Err(frame) => {
                        if let Ok(trailers) = frame.into_trailers() {
                            if !flusher.flush(&tx).await {
                                return;
                            }
                            let _ = tx.send(Ok(Frame::trailers(trailers))).await;
                        }
                    }
                },
                Some(Err(e)) => {
                    tracing::error!(error = %e, "body copy from upstream failed");
                    let _ = flusher.flush(&tx).await;
                    let _ = tx.send(Err(ProxyError::BodyCopy(Box::new(e)))).await;
                    return;
                }
                None => {
                    let _ = flusher.flush(&tx).await;
                    return;
                }
            },
            _ = flusher.tick() => {
                if !flusher.flush(&tx).await {
                    return;
                }
            }
        }
    }
}

/// Client-facing body fed by the relay task.
pub struct RelayBody {
    rx: mpsc::Receiver<Result<Frame<Bytes>, ProxyError>>,
}

impl RelayBody {
    pub(crate) fn new(rx: mpsc::Receiver<Result<Frame<Bytes>, ProxyError>>) -> Self {
        Self { rx }
    }
}

impl http_body::Body for RelayBody {
    type Data = Bytes;
    type Error = ProxyError;

    fn poll_frame(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
    ) -> Poll<Option<Result<Frame<Self::Data>, Self::Error>>> {
        self.get_mut().rx.poll_recv(cx)
    }
}
