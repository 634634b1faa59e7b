//! Streaming HTTP/1.1 chunked transfer-coding writers.
//!
//! A body of unknown length is sent as a series of length-prefixed chunks
//! followed by a zero-length chunk. This crate produces that framing on
//! top of any [`AsyncWrite`](futures_lite::io::AsyncWrite) sink.
//!
//! - [`ChunkedEncoder`] frames raw bytes. Each write becomes one chunk.
//! - [`ChunkedTextEncoder`] encodes text into a [`Charset`], buffers the
//!   bytes and emits a chunk whenever the buffer fills up or is flushed.
//!
//! ```txt
//!   write ──> [charset encoder] ──> [buffer] ──> hex(len) CRLF data CRLF
//!   close ──────────────────────────────────────> 0 CRLF CRLF
//! ```
//!
//! Neither encoder closes the sink; [`close`](ChunkedEncoder::close) only
//! writes the last chunk and flushes.
//!
//! # Example
//!
//! ```
//! # async_std::task::block_on(async {
//! use async_chunked::{Charset, ChunkedEncoder};
//!
//! let encoder = ChunkedEncoder::new(Vec::new());
//! encoder.write_all(b"hello").await?;
//! encoder.print(" world", &Charset::utf_8()).await?;
//! encoder.close().await?;
//! assert_eq!(encoder.into_inner(), b"5\r\nhello\r\n6\r\n world\r\n0\r\n\r\n");
//! # Ok::<(), async_chunked::Error>(())
//! # }).unwrap();
//! ```

#![forbid(unsafe_code, future_incompatible, rust_2018_idioms)]
#![deny(missing_debug_implementations, nonstandard_style)]
#![warn(missing_docs, unreachable_pub)]
#![cfg_attr(test, deny(warnings))]

mod chunked;
mod error;

pub mod charset;

pub use charset::Charset;
pub use chunked::{ChunkedEncoder, ChunkedTextEncoder};
pub use error::{Error, Result};
