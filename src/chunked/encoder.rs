use async_std::sync::Mutex;
use futures_lite::io::{AsyncWrite, AsyncWriteExt};

use super::{write_chunk, write_last_chunk, CRLF};
use crate::charset::Charset;
use crate::error::checked_range;
use crate::{Error, Result};

/// An encoder for chunked encoding of raw bytes.
///
/// Every call to [`write`](ChunkedEncoder::write) emits exactly one chunk,
/// so the caller controls chunk boundaries. All methods take `&self`; calls
/// from different tasks are serialized by an internal lock.
#[derive(Debug)]
pub struct ChunkedEncoder<W> {
    state: Mutex<FramerState<W>>,
}

#[derive(Debug)]
struct FramerState<W> {
    sink: W,
    closed: bool,
}

impl<W> FramerState<W> {
    fn ensure_open(&self) -> Result<()> {
        if self.closed {
            Err(Error::Closed)
        } else {
            Ok(())
        }
    }
}

impl<W: AsyncWrite + Unpin> ChunkedEncoder<W> {
    /// Create a new instance.
    pub fn new(sink: W) -> Self {
        Self {
            state: Mutex::new(FramerState {
                sink,
                closed: false,
            }),
        }
    }

    /// Write a single byte as its own chunk.
    pub async fn write_byte(&self, byte: u8) -> Result<()> {
        let mut state = self.state.lock().await;
        state.ensure_open()?;
        state
            .sink
            .write_all(&[b'1', b'\r', b'\n', byte, b'\r', b'\n'])
            .await?;
        Ok(())
    }

    /// Write `len` bytes of `buf` starting at `offset` as one chunk.
    ///
    /// Nothing is written when `len` is zero, since an empty chunk would end
    /// the body.
    pub async fn write(&self, buf: &[u8], offset: usize, len: usize) -> Result<()> {
        let mut state = self.state.lock().await;
        state.ensure_open()?;
        let payload = checked_range(buf, offset, len)?;
        if payload.is_empty() {
            return Ok(());
        }
        log::trace!("chunk: {} bytes", payload.len());
        write_chunk(&mut state.sink, payload).await?;
        Ok(())
    }

    /// Write all of `buf` as one chunk.
    pub async fn write_all(&self, buf: &[u8]) -> Result<()> {
        self.write(buf, 0, buf.len()).await
    }

    /// Write `text` encoded with `charset` as one chunk.
    pub async fn print(&self, text: &str, charset: &Charset) -> Result<()> {
        self.write_all(&charset.encode(text)).await
    }

    /// Write a CRLF line break as one chunk.
    pub async fn newline(&self) -> Result<()> {
        self.write_all(CRLF).await
    }

    /// Write `text` followed by a CRLF line break, as two chunks.
    pub async fn println(&self, text: &str, charset: &Charset) -> Result<()> {
        let encoded = charset.encode(text);
        let mut state = self.state.lock().await;
        state.ensure_open()?;
        if !encoded.is_empty() {
            write_chunk(&mut state.sink, &encoded).await?;
        }
        write_chunk(&mut state.sink, CRLF).await?;
        Ok(())
    }

    /// Flush the underlying sink. No chunk is emitted.
    pub async fn flush(&self) -> Result<()> {
        let mut state = self.state.lock().await;
        state.sink.flush().await?;
        Ok(())
    }

    /// Emit the last chunk and flush the sink.
    ///
    /// Closing twice is a no-op. The stream counts as closed even if the
    /// sink fails while the last chunk is written. The sink itself is left
    /// open; use [`into_inner`](ChunkedEncoder::into_inner) to get it back.
    pub async fn close(&self) -> Result<()> {
        let mut state = self.state.lock().await;
        if state.closed {
            return Ok(());
        }
        state.closed = true;
        log::debug!("closing chunked stream");
        write_last_chunk(&mut state.sink).await.map_err(|err| {
            log::warn!("failed to write last chunk: {}", err);
            Error::Io(err)
        })
    }

    /// Whether [`close`](ChunkedEncoder::close) has been called.
    pub async fn is_closed(&self) -> bool {
        self.state.lock().await.closed
    }

    /// Consume the encoder, returning the underlying sink.
    pub fn into_inner(self) -> W {
        self.state.into_inner().sink
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn wire(encoder: ChunkedEncoder<Vec<u8>>) -> String {
        String::from_utf8(encoder.into_inner()).unwrap()
    }

    #[async_std::test]
    async fn one_chunk_per_byte() -> Result<()> {
        let encoder = ChunkedEncoder::new(Vec::new());
        encoder.write_byte(b'h').await?;
        encoder.write_byte(b'i').await?;
        encoder.close().await?;
        assert_eq!(wire(encoder), "1\r\nh\r\n1\r\ni\r\n0\r\n\r\n");
        Ok(())
    }

    #[async_std::test]
    async fn one_chunk_per_write() -> Result<()> {
        let encoder = ChunkedEncoder::new(Vec::new());
        encoder.write(b"__hello world__", 2, 11).await?;
        encoder.write(b"xyz", 3, 0).await?;
        encoder.close().await?;
        assert_eq!(wire(encoder), "b\r\nhello world\r\n0\r\n\r\n");
        Ok(())
    }

    #[async_std::test]
    async fn println_writes_two_chunks() -> Result<()> {
        let encoder = ChunkedEncoder::new(Vec::new());
        let latin1 = Charset::for_name("latin1")?;
        encoder.println("caf\u{e9}", &latin1).await?;
        encoder.println("", &latin1).await?;
        encoder.print("ok", &latin1).await?;
        encoder.newline().await?;
        let wire = encoder.into_inner();
        assert_eq!(
            wire,
            b"4\r\ncaf\xe9\r\n2\r\n\r\n\r\n2\r\n\r\n\r\n2\r\nok\r\n2\r\n\r\n\r\n".to_vec()
        );
        Ok(())
    }

    #[async_std::test]
    async fn flush_emits_nothing() -> Result<()> {
        let encoder = ChunkedEncoder::new(Vec::new());
        encoder.flush().await?;
        encoder.close().await?;
        encoder.flush().await?;
        assert_eq!(wire(encoder), "0\r\n\r\n");
        Ok(())
    }

    #[async_std::test]
    async fn rejects_writes_after_close() -> Result<()> {
        let encoder = ChunkedEncoder::new(Vec::new());
        encoder.close().await?;
        encoder.close().await?;
        assert!(encoder.is_closed().await);
        assert!(matches!(encoder.write_byte(b'x').await, Err(Error::Closed)));
        assert!(matches!(encoder.write_all(b"").await, Err(Error::Closed)));
        assert!(matches!(
            encoder.println("x", &Charset::utf_8()).await,
            Err(Error::Closed)
        ));
        assert_eq!(wire(encoder), "0\r\n\r\n");
        Ok(())
    }
}
