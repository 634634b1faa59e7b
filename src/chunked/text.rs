use std::fmt;

use async_std::sync::Mutex;
use futures_lite::io::{self, AsyncWrite, AsyncWriteExt};

use super::{write_chunk, write_last_chunk};
use crate::charset::{is_high_surrogate, is_low_surrogate, Charset, CharsetEncoder, CoderResult};
use crate::error::checked_range;
use crate::{Error, Result};

/// Capacity of the buffer holding encoded bytes not yet sent as a chunk.
pub(crate) const DEFAULT_BUFFER_SIZE: usize = 4096;

/// Smallest buffer able to hold any single encoded character along with
/// the escape sequences of stateful charsets.
const MIN_BUFFER_SIZE: usize = 16;

/// A chunked encoder for text.
///
/// Characters are given as UTF-16 code units, encoded into the configured
/// charset and collected in a fixed-size buffer. A chunk is emitted each
/// time the buffer fills up, and on [`flush`](ChunkedTextEncoder::flush)
/// and [`close`](ChunkedTextEncoder::close).
///
/// A surrogate pair may be split across two writes: a trailing high
/// surrogate is held back until the next write or until close.
///
/// # Examples
///
/// ```
/// # async_std::task::block_on(async {
/// use async_chunked::ChunkedTextEncoder;
///
/// let encoder = ChunkedTextEncoder::new(Vec::new(), "utf-8")?;
/// encoder.write_str("A").await?;
/// encoder.flush().await?;
/// assert_eq!(encoder.into_inner(), b"1\r\nA\r\n");
/// # Ok::<(), async_chunked::Error>(())
/// # }).unwrap();
/// ```
pub struct ChunkedTextEncoder<W> {
    charset: Charset,
    state: Mutex<TextState<W>>,
}

struct TextState<W> {
    sink: W,
    encoder: CharsetEncoder,
    buf: Box<[u8]>,
    /// Number of encoded bytes at the front of `buf`.
    filled: usize,
    /// High surrogate left over from the previous write.
    pending: Option<u16>,
    open: bool,
}

impl<W> fmt::Debug for ChunkedTextEncoder<W> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ChunkedTextEncoder")
            .field("charset", &self.charset)
            .finish()
    }
}

impl<W: AsyncWrite + Unpin> ChunkedTextEncoder<W> {
    /// Create a new instance writing text encoded as `charset_name`.
    ///
    /// Fails with [`Error::UnsupportedCharset`] if the name is unknown.
    pub fn new(sink: W, charset_name: &str) -> Result<Self> {
        let charset = Charset::for_name(charset_name)?;
        Ok(Self::with_charset(sink, charset))
    }

    /// Create a new instance for an already resolved charset.
    pub fn with_charset(sink: W, charset: Charset) -> Self {
        Self::with_capacity(sink, charset, DEFAULT_BUFFER_SIZE)
    }

    pub(crate) fn with_capacity(sink: W, charset: Charset, capacity: usize) -> Self {
        assert!(
            capacity >= MIN_BUFFER_SIZE,
            "buffers of length {} are too small",
            capacity
        );
        Self {
            charset,
            state: Mutex::new(TextState {
                sink,
                encoder: charset.new_encoder(),
                buf: vec![0; capacity].into_boxed_slice(),
                filled: 0,
                pending: None,
                open: true,
            }),
        }
    }

    /// The charset text is encoded with.
    pub fn charset(&self) -> Charset {
        self.charset
    }

    /// Encode `len` code units of `units` starting at `offset`.
    pub async fn write(&self, units: &[u16], offset: usize, len: usize) -> Result<()> {
        let mut state = self.state.lock().await;
        state.ensure_open()?;
        let input = checked_range(units, offset, len)?;
        if input.is_empty() {
            return Ok(());
        }
        state.write_units(input).await?;
        Ok(())
    }

    /// Encode a string.
    pub async fn write_str(&self, text: &str) -> Result<()> {
        let mut state = self.state.lock().await;
        state.ensure_open()?;
        if text.is_empty() {
            return Ok(());
        }
        let units: Vec<u16> = text.encode_utf16().collect();
        state.write_units(&units).await?;
        Ok(())
    }

    /// Send the buffered bytes as one chunk and flush the sink.
    ///
    /// The chunk is written even when the buffer is empty, in which case it
    /// is the zero-length chunk `0\r\n\r\n`. Peers treat that as the end of
    /// the body, so only flush an empty encoder when that is intended.
    pub async fn flush(&self) -> Result<()> {
        let mut state = self.state.lock().await;
        state.ensure_open()?;
        state.emit_buffer().await?;
        state.sink.flush().await?;
        Ok(())
    }

    /// Finish the body.
    ///
    /// A pending high surrogate is encoded as a replacement, the charset
    /// encoder is finalized, buffered bytes go out as a last data chunk, and
    /// the zero-length chunk follows. Closing twice is a no-op. The stream
    /// counts as closed even if the sink fails along the way.
    pub async fn close(&self) -> Result<()> {
        let mut state = self.state.lock().await;
        if !state.open {
            return Ok(());
        }
        state.open = false;
        log::debug!("closing chunked {} stream", self.charset);
        state.finish().await.map_err(|err| {
            log::warn!("failed to finish chunked stream: {}", err);
            Error::Io(err)
        })
    }

    /// Whether [`close`](ChunkedTextEncoder::close) has been called.
    pub async fn is_closed(&self) -> bool {
        !self.state.lock().await.open
    }

    /// Consume the encoder, returning the underlying sink.
    ///
    /// Bytes still buffered are dropped.
    pub fn into_inner(self) -> W {
        self.state.into_inner().sink
    }
}

impl<W: AsyncWrite + Unpin> TextState<W> {
    fn ensure_open(&self) -> Result<()> {
        if self.open {
            Ok(())
        } else {
            Err(Error::Closed)
        }
    }

    async fn write_units(&mut self, mut input: &[u16]) -> io::Result<()> {
        if let Some(high) = self.pending.take() {
            match input.first() {
                Some(&low) if is_low_surrogate(low) => {
                    self.encode(&[high, low], false).await?;
                    input = &input[1..];
                }
                _ => {
                    log::trace!("unpaired high surrogate {:#06x}", high);
                    self.encode(&[high], false).await?;
                }
            }
        }

        match input.split_last() {
            Some((&last, rest)) if is_high_surrogate(last) => {
                self.encode(rest, false).await?;
                log::trace!("holding high surrogate {:#06x}", last);
                self.pending = Some(last);
                Ok(())
            }
            _ => self.encode(input, false).await,
        }
    }

    /// Feed `src` to the charset encoder, emitting a chunk whenever the
    /// buffer fills up.
    async fn encode(&mut self, mut src: &[u16], last: bool) -> io::Result<()> {
        loop {
            let (result, read, written) =
                self.encoder.encode(src, &mut self.buf[self.filled..], last);
            self.filled += written;
            src = &src[read..];
            match result {
                CoderResult::Underflow => return Ok(()),
                CoderResult::Overflow => {
                    debug_assert!(self.filled > 0);
                    self.emit_buffer().await?;
                }
            }
        }
    }

    /// Write the buffer as one chunk. The buffer is cleared first so that a
    /// failing sink never causes the same bytes to be sent twice.
    async fn emit_buffer(&mut self) -> io::Result<()> {
        let len = std::mem::replace(&mut self.filled, 0);
        log::trace!("chunk: {} bytes", len);
        write_chunk(&mut self.sink, &self.buf[..len]).await
    }

    async fn finish(&mut self) -> io::Result<()> {
        let pending = self.pending.take();
        let tail = pending.as_ref().map_or(&[][..], std::slice::from_ref);
        self.encode(tail, true).await?;
        if self.filled > 0 {
            self.emit_buffer().await?;
        }
        write_last_chunk(&mut self.sink).await
    }
}
