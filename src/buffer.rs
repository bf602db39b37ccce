//! The ingress/egress byte channels the rest of the crate is built on.
//!
//! `InputChannel` wraps any `AsyncRead` in a growable `BytesMut` accumulator and hands out
//! zero-copy `Bytes` slices (`PreservedBuffer`) as soon as enough data has arrived — there is
//! no separate "preserve" / "dispose" pair to get wrong, since a cloned `Bytes` keeps its
//! backing storage alive on its own and `Drop` releases it. `OutputChannel` is the egress
//! half: it writes a frame's header and payload as a single vectored write where possible.

use crate::error::Error;
use bytes::{Buf, Bytes, BytesMut};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

/// A zero-copy slice handed out by [`InputChannel`]. Backed by `bytes::Bytes`, so it shares
/// the original read buffer's allocation via refcounting rather than copying; dropping the
/// last clone frees the backing storage automatically.
pub type PreservedBuffer = Bytes;

const INITIAL_CAPACITY: usize = 8 * 1024;

/// Buffers bytes read from `R` and exposes them for progressive, non-blocking-style parsing:
/// callers look at what's already buffered, and only await `read_async` when they need more.
pub struct InputChannel<R> {
    inner: R,
    buf: BytesMut,
    eof: bool,
}

impl<R: AsyncRead + Unpin> InputChannel<R> {
    pub fn new(inner: R) -> Self {
        InputChannel {
            inner,
            buf: BytesMut::with_capacity(INITIAL_CAPACITY),
            eof: false,
        }
    }

    /// Reads more bytes from the underlying source into the accumulator. Returns `true` if
    /// the peer has closed the write half (subsequent calls are no-ops returning `true`).
    pub async fn read_async(&mut self) -> Result<bool, Error> {
        if self.eof {
            return Ok(true);
        }
        let mut scratch = [0u8; 4096];
        let n = self.inner.read(&mut scratch).await?;
        if n == 0 {
            self.eof = true;
        } else {
            self.buf.extend_from_slice(&scratch[..n]);
        }
        Ok(self.eof)
    }

    pub fn len(&self) -> usize {
        self.buf.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    pub fn is_eof(&self) -> bool {
        self.eof
    }

    pub fn as_slice(&self) -> &[u8] {
        &self.buf
    }

    /// Discards the first `n` buffered bytes without returning them, e.g. to skip past a
    /// frame header once its fields have been read out of `as_slice()`.
    pub fn advance(&mut self, n: usize) {
        self.buf.advance(n);
    }

    /// Splits off and returns the first `n` buffered bytes as a zero-copy [`PreservedBuffer`],
    /// advancing past them. Panics if fewer than `n` bytes are buffered; callers must only
    /// call this once `len() >= n`.
    pub fn preserve(&mut self, n: usize) -> PreservedBuffer {
        self.buf.split_to(n).freeze()
    }

    /// Looks for `delim` in the buffered bytes and, if found, splits off and returns
    /// everything before it as a [`PreservedBuffer`], advancing past the delimiter itself.
    /// Returns `None` (without consuming anything) if `delim` hasn't fully arrived yet.
    pub fn try_slice_to(&mut self, delim: &[u8]) -> Option<PreservedBuffer> {
        let pos = find_subslice(&self.buf, delim)?;
        let out = self.buf.split_to(pos).freeze();
        self.buf.advance(delim.len());
        Some(out)
    }

    /// Reads from the underlying source until `n` bytes are buffered or the peer closes the
    /// connection, then returns them as a [`PreservedBuffer`]. Used by the frame codec once a
    /// header has announced a payload length.
    pub async fn take_exact(&mut self, n: usize) -> Result<PreservedBuffer, Error> {
        while self.buf.len() < n {
            if self.read_async().await? {
                return Err(Error::HandshakeMalformed);
            }
        }
        Ok(self.preserve(n))
    }
}

fn find_subslice(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    if needle.is_empty() || haystack.len() < needle.len() {
        return None;
    }
    haystack.windows(needle.len()).position(|w| w == needle)
}

/// The egress half: writes complete frames (header + payload) to `W`.
pub struct OutputChannel<W> {
    inner: W,
}

impl<W: AsyncWrite + Unpin> OutputChannel<W> {
    pub fn new(inner: W) -> Self {
        OutputChannel { inner }
    }

    pub async fn write_frame(&mut self, header: &[u8], payload: &[u8]) -> Result<(), Error> {
        self.inner.write_all(header).await?;
        if !payload.is_empty() {
            self.inner.write_all(payload).await?;
        }
        self.inner.flush().await?;
        Ok(())
    }

    pub async fn write_raw(&mut self, bytes: &[u8]) -> Result<(), Error> {
        self.inner.write_all(bytes).await?;
        self.inner.flush().await?;
        Ok(())
    }

    pub async fn shutdown(&mut self) -> Result<(), Error> {
        self.inner.shutdown().await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[tokio::test]
    async fn try_slice_to_finds_and_consumes_the_delimiter() {
        let mut chan = InputChannel::new(Cursor::new(b"GET / HTTP/1.1\r\nHost: x\r\n\r\n".to_vec()));
        chan.read_async().await.unwrap();
        let line = chan.try_slice_to(b"\r\n").unwrap();
        assert_eq!(&line[..], b"GET / HTTP/1.1");
        let line = chan.try_slice_to(b"\r\n").unwrap();
        assert_eq!(&line[..], b"Host: x");
        let line = chan.try_slice_to(b"\r\n").unwrap();
        assert_eq!(&line[..], b"");
    }

    #[tokio::test]
    async fn try_slice_to_returns_none_without_consuming_when_delimiter_is_absent() {
        let mut chan = InputChannel::new(Cursor::new(b"partial".to_vec()));
        chan.read_async().await.unwrap();
        assert!(chan.try_slice_to(b"\r\n").is_none());
        assert_eq!(chan.len(), 7);
    }

    #[tokio::test]
    async fn take_exact_reads_until_enough_bytes_are_buffered() {
        let mut chan = InputChannel::new(Cursor::new(b"hello world".to_vec()));
        let first = chan.take_exact(5).await.unwrap();
        assert_eq!(&first[..], b"hello");
        let rest = chan.take_exact(6).await.unwrap();
        assert_eq!(&rest[..], b" world");
    }

    #[tokio::test]
    async fn take_exact_errors_on_premature_eof() {
        let mut chan = InputChannel::new(Cursor::new(b"short".to_vec()));
        assert!(chan.take_exact(100).await.is_err());
    }

    #[tokio::test]
    async fn preserved_buffers_share_storage_without_copying() {
        let mut chan = InputChannel::new(Cursor::new(b"abcdefgh".to_vec()));
        chan.read_async().await.unwrap();
        let a = chan.preserve(4);
        let b = chan.preserve(4);
        assert_eq!(&a[..], b"abcd");
        assert_eq!(&b[..], b"efgh");
    }
}
