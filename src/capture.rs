//! Bounded body capture.
//!
//! A [`Capture`] mirrors at most `limit` bytes of a body into memory for the
//! log record while counting every byte that passes. It never alters the
//! data handed to the reader: truncation only affects what gets logged.
//!
//! [`CaptureBody`] wraps any [`http_body::Body`] and feeds each data frame
//! through a `Capture` as the body is polled. Response bodies are fully
//! buffered by the time the downstream stage returns, so the logging
//! middleware feeds those through [`Capture::observe`] directly.

use std::pin::Pin;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::task::{Context, Poll, ready};

use bytes::{Bytes, BytesMut};
use http_body::{Body, Frame, SizeHint};

/// Default capture limit for request and response bodies: 64 KiB.
pub const DEFAULT_BODY_LIMIT: usize = 64 * 1024;

// ── CaptureBuffer ─────────────────────────────────────────────────────────────

/// A byte counter plus an optional buffer that stops growing at `limit`.
///
/// When capture is disabled no buffer is allocated; only the count is kept.
#[derive(Debug)]
pub struct CaptureBuffer {
    limit: usize,
    total: usize,
    body: Option<BytesMut>,
}

impl CaptureBuffer {
    pub fn new(limit: usize, enabled: bool) -> Self {
        Self { limit, total: 0, body: enabled.then(BytesMut::new) }
    }

    /// Records `chunk`: the count always grows by its full length, the buffer
    /// only by the prefix that still fits.
    pub fn observe(&mut self, chunk: &[u8]) {
        if let Some(body) = &mut self.body {
            let room = self.limit.saturating_sub(body.len());
            body.extend_from_slice(&chunk[..room.min(chunk.len())]);
        }
        self.total += chunk.len();
    }

    /// Total bytes observed, including any that were not buffered.
    pub fn total(&self) -> usize {
        self.total
    }

    /// The captured prefix, or `None` when capture is disabled.
    pub fn body(&self) -> Option<&[u8]> {
        self.body.as_deref()
    }
}

// ── Capture ───────────────────────────────────────────────────────────────────

/// Shared handle to a [`CaptureBuffer`].
///
/// The request body moves down the handler chain while the logging middleware
/// keeps its own handle, so both sides point at the same buffer.
#[derive(Clone, Debug)]
pub struct Capture(Arc<Mutex<CaptureBuffer>>);

impl Capture {
    pub fn new(limit: usize, enabled: bool) -> Self {
        Self(Arc::new(Mutex::new(CaptureBuffer::new(limit, enabled))))
    }

    pub fn observe(&self, chunk: &[u8]) {
        self.lock().observe(chunk);
    }

    /// Current byte count and captured text (lossy UTF-8).
    pub fn snapshot(&self) -> CaptureSnapshot {
        let buffer = self.lock();
        CaptureSnapshot {
            length: buffer.total(),
            body: buffer.body().map(|b| String::from_utf8_lossy(b).into_owned()),
        }
    }

    fn lock(&self) -> MutexGuard<'_, CaptureBuffer> {
        self.0.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// What a [`Capture`] saw, taken once the body has been consumed.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct CaptureSnapshot {
    pub length: usize,
    pub body: Option<String>,
}

// ── CaptureBody ───────────────────────────────────────────────────────────────

pin_project_lite::pin_project! {
    /// Body wrapper that mirrors data frames into a [`Capture`].
    ///
    /// Frames, errors and trailers pass through untouched.
    pub struct CaptureBody<B> {
        #[pin]
        inner: B,
        capture: Capture,
    }
}

impl<B> CaptureBody<B> {
    pub fn new(inner: B, capture: Capture) -> Self {
        Self { inner, capture }
    }
}

impl<B> Body for CaptureBody<B>
where
    B: Body<Data = Bytes>,
{
    type Data = Bytes;
    type Error = B::Error;

    fn poll_frame(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
    ) -> Poll<Option<Result<Frame<Bytes>, Self::Error>>> {
        let this = self.project();
        let frame = ready!(this.inner.poll_frame(cx));
        if let Some(Ok(frame)) = &frame {
            if let Some(data) = frame.data_ref() {
                this.capture.observe(data);
            }
        }
        Poll::Ready(frame)
    }

    fn is_end_stream(&self) -> bool {
        self.inner.is_end_stream()
    }

    fn size_hint(&self) -> SizeHint {
        self.inner.size_hint()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::VecDeque;
    use std::convert::Infallible;

    use http_body_util::BodyExt;

    #[test]
    fn disabled_capture_only_counts() {
        let mut buf = CaptureBuffer::new(4, false);
        buf.observe(b"hello world");
        assert_eq!(buf.total(), 11);
        assert!(buf.body().is_none());
    }

    #[test]
    fn buffer_stops_at_limit_but_count_keeps_going() {
        let mut buf = CaptureBuffer::new(8, true);
        buf.observe(b"abcde");
        buf.observe(b"fghij");
        buf.observe(b"klmno");
        assert_eq!(buf.body(), Some(&b"abcdefgh"[..]));
        assert_eq!(buf.total(), 15);
    }

    #[test]
    fn exact_fit_then_overflow() {
        let mut buf = CaptureBuffer::new(3, true);
        buf.observe(b"abc");
        buf.observe(b"d");
        assert_eq!(buf.body(), Some(&b"abc"[..]));
        assert_eq!(buf.total(), 4);
    }

    #[test]
    fn zero_limit_captures_nothing() {
        let mut buf = CaptureBuffer::new(0, true);
        buf.observe(b"abc");
        assert_eq!(buf.body(), Some(&b""[..]));
        assert_eq!(buf.total(), 3);
    }

    #[tokio::test]
    async fn capture_body_passes_everything_through() {
        let capture = Capture::new(10, true);
        let body = CaptureBody::new(Chunked::new(["first ", "second ", "third"]), capture.clone());

        let collected = body.collect().await.unwrap().to_bytes();
        assert_eq!(&collected[..], b"first second third");

        let snapshot = capture.snapshot();
        assert_eq!(snapshot.length, 18);
        assert_eq!(snapshot.body.as_deref(), Some("first seco"));
    }

    #[test]
    fn snapshot_is_lossy_on_invalid_utf8() {
        let capture = Capture::new(16, true);
        capture.observe(&[b'o', b'k', 0xff]);
        assert_eq!(capture.snapshot().body.as_deref(), Some("ok\u{fffd}"));
    }

    /// Yields one data frame per chunk.
    struct Chunked(VecDeque<Bytes>);

    impl Chunked {
        fn new<const N: usize>(chunks: [&'static str; N]) -> Self {
            Self(chunks.into_iter().map(|c| Bytes::from_static(c.as_bytes())).collect())
        }
    }

    impl Body for Chunked {
        type Data = Bytes;
        type Error = Infallible;

        fn poll_frame(
            mut self: Pin<&mut Self>,
            _: &mut Context<'_>,
        ) -> Poll<Option<Result<Frame<Bytes>, Infallible>>> {
            Poll::Ready(self.0.pop_front().map(|chunk| Ok(Frame::data(chunk))))
        }
    }
}
