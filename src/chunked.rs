//! Chunked transfer-coding writers, per
//! https://tools.ietf.org/html/rfc7230#section-4.1

use futures_lite::io::{self, AsyncWrite, AsyncWriteExt};

mod encoder;
mod text;

pub use encoder::ChunkedEncoder;
pub use text::ChunkedTextEncoder;

const CRLF: &[u8] = b"\r\n";

/// The zero-length chunk ending a body, with an empty trailer section.
const LAST_CHUNK: &[u8] = b"0\r\n\r\n";

fn chunk_header(len: usize) -> String {
    format!("{:x}\r\n", len)
}

/// Write `payload` as a single chunk. An empty payload yields `0\r\n\r\n`.
async fn write_chunk<W>(sink: &mut W, payload: &[u8]) -> io::Result<()>
where
    W: AsyncWrite + Unpin,
{
    sink.write_all(chunk_header(payload.len()).as_bytes()).await?;
    sink.write_all(payload).await?;
    sink.write_all(CRLF).await
}

async fn write_last_chunk<W>(sink: &mut W) -> io::Result<()>
where
    W: AsyncWrite + Unpin,
{
    sink.write_all(LAST_CHUNK).await?;
    sink.flush().await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn headers_are_lower_case_hex() {
        assert_eq!(chunk_header(0), "0\r\n");
        assert_eq!(chunk_header(10), "a\r\n");
        assert_eq!(chunk_header(4096), "1000\r\n");
        assert_eq!(chunk_header(0xbeef), "beef\r\n");
    }

    #[async_std::test]
    async fn frames_payload() -> io::Result<()> {
        let mut sink = Vec::new();
        write_chunk(&mut sink, b"hello").await?;
        write_chunk(&mut sink, b"").await?;
        assert_eq!(sink, b"5\r\nhello\r\n0\r\n\r\n");
        Ok(())
    }
}
