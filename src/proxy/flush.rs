//! Periodic flushing of streamed response output.
//!
//! Long-running chunked responses must reach the client promptly even when
//! the upstream produces small writes. The relay loop feeds data through a
//! coalescing buffer which is forced out whenever the high watermark is hit
//! or the flush ticker fires, whichever comes first.

use bytes::{Bytes, BytesMut};
use http_body::Frame;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::{Instant, Interval};

use crate::proxy::error::ProxyError;

/// Channel end the relay writes client-bound frames into.
pub(crate) type FrameSender = mpsc::Sender<Result<Frame<Bytes>, ProxyError>>;

/// Buffered output is flushed unconditionally once it reaches this size.
const HIGH_WATERMARK: usize = 16 * 1024;

/// Coalescing output buffer with a fixed flush cadence.
///
/// The ticker is owned here, so dropping the `Flusher` (any relay exit path)
/// stops the periodic wake-ups; no timer survives the request.
pub(crate) struct Flusher {
    interval: Interval,
    buf: BytesMut,
}

impl Flusher {
    pub(crate) fn new(period: Duration) -> Self {
        // `interval` completes its first tick immediately; the first flush
        // should only happen a full period after streaming starts.
        Self {
            interval: tokio::time::interval_at(Instant::now() + period, period),
            buf: BytesMut::new(),
        }
    }

    /// Wait for the next flush tick.
    pub(crate) async fn tick(&mut self) {
        self.interval.tick().await;
    }

    /// Buffer a chunk of body data, flushing if the watermark is reached.
    ///
    /// Returns `false` once the client side is gone and relaying should stop.
    pub(crate) async fn push(&mut self, data: Bytes, tx: &FrameSender) -> bool {
        if self.buf.is_empty() && data.len() >= HIGH_WATERMARK {
            return tx.send(Ok(Frame::data(data))).await.is_ok();
        }
        self.buf.extend_from_slice(&data);
        if self.buf.len() >= HIGH_WATERMARK {
            return self.flush(tx).await;
        }
        true
    }

    /// Force any buffered output to the client.
    ///
    /// Returns `false` once the client side is gone.
    pub(crate) async fn flush(&mut self, tx: &FrameSender) -> bool {
        if self.buf.is_empty() {
            return true;
        }
        let chunk = self.buf.split().freeze();
        tx.send(Ok(Frame::data(chunk))).await.is_ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn channel(cap: usize) -> (FrameSender, mpsc::Receiver<Result<Frame<Bytes>, ProxyError>>) {
        mpsc::channel(cap)
    }

    #[tokio::test]
    async fn small_writes_are_held_until_flushed() {
        let (tx, mut rx) = channel(4);
        let mut flusher = Flusher::new(Duration::from_millis(10));

        assert!(flusher.push(Bytes::from_static(b"hel"), &tx).await);
        assert!(flusher.push(Bytes::from_static(b"lo"), &tx).await);
        assert!(rx.try_recv().is_err());

        assert!(flusher.flush(&tx).await);
        let frame = rx.recv().await.unwrap().unwrap();
        assert_eq!(frame.into_data().unwrap(), Bytes::from_static(b"hello"));
    }

    #[tokio::test]
    async fn large_write_bypasses_the_buffer() {
        let (tx, mut rx) = channel(4);
        let mut flusher = Flusher::new(Duration::from_millis(10));

        let big = Bytes::from(vec![7u8; HIGH_WATERMARK]);
        assert!(flusher.push(big.clone(), &tx).await);
        let frame = rx.recv().await.unwrap().unwrap();
        assert_eq!(frame.into_data().unwrap().len(), big.len());
    }

    #[tokio::test]
    async fn flush_of_empty_buffer_sends_nothing() {
        let (tx, mut rx) = channel(4);
        let mut flusher = Flusher::new(Duration::from_millis(10));
        assert!(flusher.flush(&tx).await);
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn reports_disconnected_client() {
        let (tx, rx) = channel(4);
        drop(rx);
        let mut flusher = Flusher::new(Duration::from_millis(10));
        assert!(flusher.push(Bytes::from_static(b"data"), &tx).await);
        assert!(!flusher.flush(&tx).await);
    }
}
