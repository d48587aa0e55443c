//! Response body streaming and capture.
//!
//! [`Body`] is the byte stream attached to a [`Response`](super::Response).
//! [`CapturingReader`] wraps a body so the full content is handed to a one-shot
//! callback once the caller has consumed the stream to its end; the transport
//! uses it to defer the cache write until the complete response body is known,
//! without buffering ahead of the caller or changing what the caller reads.

use std::fmt;
use std::io;
use std::pin::Pin;
use std::task::{Context, Poll};

use bytes::{Bytes, BytesMut};
use tokio::io::{AsyncRead, AsyncReadExt, ReadBuf};

/// A response body: an async byte stream.
///
/// Bodies served from the cache are in-memory buffers; bodies from a live
/// origin are whatever stream the underlying transport produced.
pub struct Body {
    reader: Box<dyn AsyncRead + Send + Unpin>,
}

impl Body {
    /// An empty body.
    pub fn empty() -> Self {
        Self::from_bytes(Bytes::new())
    }

    /// A body backed by an in-memory buffer.
    pub fn from_bytes(data: impl Into<Bytes>) -> Self {
        Self {
            reader: Box::new(io::Cursor::new(data.into())),
        }
    }

    /// A body backed by an arbitrary async reader.
    pub fn from_reader(reader: impl AsyncRead + Send + Unpin + 'static) -> Self {
        Self {
            reader: Box::new(reader),
        }
    }

    /// Reads the remainder of the body into memory.
    pub async fn bytes(&mut self) -> io::Result<Bytes> {
        let mut buf = Vec::new();
        self.reader.read_to_end(&mut buf).await?;
        Ok(buf.into())
    }
}

impl AsyncRead for Body {
    fn poll_read(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        Pin::new(&mut self.get_mut().reader).poll_read(cx, buf)
    }
}

impl fmt::Debug for Body {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Body")
    }
}

impl Default for Body {
    fn default() -> Self {
        Self::empty()
    }
}

/// Wraps a [`Body`] so that every byte read by the caller is also appended to
/// an internal buffer. When the stream reaches end-of-file (a zero-length
/// fill under tokio's `AsyncRead` convention), the registered callback fires
/// exactly once with the complete buffered content.
///
/// Dropping the wrapper drops the wrapped stream; the callback does not fire
/// for a body that was never read to completion.
pub(crate) struct CapturingReader {
    inner: Body,
    captured: BytesMut,
    on_complete: Option<Box<dyn FnOnce(Bytes) + Send>>,
}

impl CapturingReader {
    pub(crate) fn new(inner: Body, on_complete: impl FnOnce(Bytes) + Send + 'static) -> Self {
        Self {
            inner,
            captured: BytesMut::new(),
            on_complete: Some(Box::new(on_complete)),
        }
    }
}

impl AsyncRead for CapturingReader {
    fn poll_read(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        let this = self.get_mut();
        if buf.remaining() == 0 {
            // A zero-capacity read says nothing about EOF.
            return Poll::Ready(Ok(()));
        }

        let before = buf.filled().len();
        match Pin::new(&mut this.inner).poll_read(cx, buf) {
            Poll::Ready(Ok(())) => {
                let read = &buf.filled()[before..];
                if read.is_empty() {
                    if let Some(callback) = this.on_complete.take() {
                        callback(std::mem::take(&mut this.captured).freeze());
                    }
                } else {
                    this.captured.extend_from_slice(read);
                }
                Poll::Ready(Ok(()))
            }
            other => other,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tokio::io::AsyncReadExt;

    #[tokio::test]
    async fn body_bytes_reads_everything() {
        let mut body = Body::from_bytes(&b"hello world"[..]);
        assert_eq!(body.bytes().await.unwrap().as_ref(), b"hello world");
    }

    #[tokio::test]
    async fn capture_fires_once_with_full_content() {
        let fired = Arc::new(AtomicUsize::new(0));
        let captured = Arc::new(std::sync::Mutex::new(Bytes::new()));

        let fired2 = Arc::clone(&fired);
        let captured2 = Arc::clone(&captured);
        let mut reader = CapturingReader::new(Body::from_bytes(&b"0123456789"[..]), move |data| {
            fired2.fetch_add(1, Ordering::SeqCst);
            *captured2.lock().unwrap() = data;
        });

        // Consume in small chunks to exercise incremental buffering.
        let mut out = Vec::new();
        let mut chunk = [0u8; 3];
        loop {
            let n = reader.read(&mut chunk).await.unwrap();
            if n == 0 {
                break;
            }
            out.extend_from_slice(&chunk[..n]);
        }
        // A second EOF read must not re-fire the callback.
        assert_eq!(reader.read(&mut chunk).await.unwrap(), 0);

        assert_eq!(out, b"0123456789");
        assert_eq!(fired.load(Ordering::SeqCst), 1);
        assert_eq!(captured.lock().unwrap().as_ref(), b"0123456789");
    }

    #[tokio::test]
    async fn capture_fires_for_empty_body() {
        let fired = Arc::new(AtomicUsize::new(0));
        let fired2 = Arc::clone(&fired);
        let mut reader = CapturingReader::new(Body::empty(), move |data| {
            assert!(data.is_empty());
            fired2.fetch_add(1, Ordering::SeqCst);
        });
        let mut chunk = [0u8; 8];
        assert_eq!(reader.read(&mut chunk).await.unwrap(), 0);
        assert_eq!(fired.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn capture_does_not_fire_when_dropped_early() {
        let fired = Arc::new(AtomicUsize::new(0));
        let fired2 = Arc::clone(&fired);
        let mut reader = CapturingReader::new(Body::from_bytes(&b"partial read"[..]), move |_| {
            fired2.fetch_add(1, Ordering::SeqCst);
        });
        let mut chunk = [0u8; 4];
        reader.read(&mut chunk).await.unwrap();
        drop(reader);
        assert_eq!(fired.load(Ordering::SeqCst), 0);
    }
}
