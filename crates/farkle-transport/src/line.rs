//! Newline framing over any `AsyncRead`.

use bytes::{Bytes, BytesMut};
use memchr::memchr;
use tokio::io::{AsyncRead, AsyncReadExt};

use crate::DEFAULT_MAX_FRAME_SIZE;

/// Buffers an async byte stream and yields it one line at a time.
///
/// Bytes without a delimiter yet are kept in the buffer until more
/// arrive. If the buffer grows past `max_line_len` before a `\n` shows
/// up, the read fails with `InvalidData` instead of buffering forever.
#[derive(Debug)]
pub struct LineReader<R> {
    inner: R,
    buf: BytesMut,
    max_line_len: usize,
}

impl<R> LineReader<R> {
    pub fn new(inner: R) -> Self {
        Self {
            inner,
            buf: BytesMut::with_capacity(DEFAULT_MAX_FRAME_SIZE),
            max_line_len: DEFAULT_MAX_FRAME_SIZE,
        }
    }

    pub fn max_line_len(mut self, max: usize) -> Self {
        self.max_line_len = max.max(1);
        self
    }

    /// Number of bytes buffered but not yet returned as a line.
    pub fn buffered(&self) -> usize {
        self.buf.len()
    }

    pub fn into_inner(self) -> R {
        self.inner
    }
}

impl<R: AsyncRead + Unpin> LineReader<R> {
    /// Read one line, stripping trailing `\n` and optional `\r`.
    ///
    /// Returns:
    /// - `Ok(Some(bytes))` for a line (may be empty),
    /// - `Ok(None)` on clean EOF with no buffered data.
    ///
    /// Cancel safe: dropping the future keeps any partial line buffered.
    pub async fn read_line(&mut self) -> std::io::Result<Option<Bytes>> {
        loop {
            if let Some(i) = memchr(b'\n', &self.buf) {
                if i > self.max_line_len {
                    return Err(too_long());
                }
                let raw = self.buf.split_to(i + 1).freeze();
                return Ok(Some(trim_crlf(raw)));
            }

            if self.buf.len() > self.max_line_len {
                return Err(too_long());
            }

            let n = self.inner.read_buf(&mut self.buf).await?;
            if n == 0 {
                if self.buf.is_empty() {
                    return Ok(None);
                }
                return Err(std::io::Error::new(
                    std::io::ErrorKind::UnexpectedEof,
                    "eof while reading line",
                ));
            }
        }
    }
}

fn too_long() -> std::io::Error {
    std::io::Error::new(std::io::ErrorKind::InvalidData, "line too long")
}

fn trim_crlf(mut b: Bytes) -> Bytes {
    let mut end = b.len();
    if end > 0 && b[end - 1] == b'\n' {
        end -= 1;
    }
    if end > 0 && b[end - 1] == b'\r' {
        end -= 1;
    }
    b.truncate(end);
    b
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::AsyncWriteExt;

    #[tokio::test]
    async fn test_read_line_crlf_and_lf_both_stripped() {
        let (a, b) = tokio::io::duplex(64);
        tokio::spawn(async move {
            let mut b = b;
            b.write_all(b"hello\r\nworld\n").await.unwrap();
        });

        let mut lr = LineReader::new(a);
        let l1 = lr.read_line().await.unwrap().unwrap();
        let l2 = lr.read_line().await.unwrap().unwrap();
        assert_eq!(&l1[..], b"hello");
        assert_eq!(&l2[..], b"world");
    }

    #[tokio::test]
    async fn test_read_line_partial_frame_waits_for_delimiter() {
        let (a, mut b) = tokio::io::duplex(64);
        let mut lr = LineReader::new(a);

        b.write_all(b"KIVU").await.unwrap();
        let pending = tokio::time::timeout(
            std::time::Duration::from_millis(50),
            lr.read_line(),
        )
        .await;
        assert!(pending.is_err(), "no delimiter yet, read should block");
        assert_eq!(lr.buffered(), 4);

        b.write_all(b"PS\n").await.unwrap();
        let line = lr.read_line().await.unwrap().unwrap();
        assert_eq!(&line[..], b"KIVUPS");
    }

    #[tokio::test]
    async fn test_read_line_clean_eof_returns_none() {
        let (a, b) = tokio::io::duplex(64);
        drop(b);

        let mut lr = LineReader::new(a);
        assert!(lr.read_line().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_read_line_eof_mid_line_is_error() {
        let (a, mut b) = tokio::io::duplex(64);
        b.write_all(b"half").await.unwrap();
        drop(b);

        let mut lr = LineReader::new(a);
        let err = lr.read_line().await.unwrap_err();
        assert_eq!(err.kind(), std::io::ErrorKind::UnexpectedEof);
    }

    #[tokio::test]
    async fn test_read_line_oversized_line_is_rejected() {
        let (a, mut b) = tokio::io::duplex(256);
        tokio::spawn(async move {
            b.write_all(&[b'x'; 100]).await.unwrap();
            b.write_all(b"\n").await.unwrap();
        });

        let mut lr = LineReader::new(a).max_line_len(16);
        let err = lr.read_line().await.unwrap_err();
        assert_eq!(err.kind(), std::io::ErrorKind::InvalidData);
    }
}
