use std::pin::Pin;
use std::task::{Context, Poll};

use futures_lite::io::{self, AsyncWrite};
use httparse::Status;

/// Split chunked wire output into chunk payloads, checking the framing.
#[allow(dead_code)]
pub fn frames(mut wire: &[u8]) -> Vec<Vec<u8>> {
    let mut out = Vec::new();
    while !wire.is_empty() {
        let (used, size) = match httparse::parse_chunk_size(wire) {
            Ok(Status::Complete(parsed)) => parsed,
            Ok(Status::Partial) => panic!("truncated chunk header"),
            Err(_) => panic!(
                "invalid chunk header in {:?}",
                String::from_utf8_lossy(wire)
            ),
        };
        let end = used + size as usize;
        assert!(wire.len() >= end + 2, "truncated chunk");
        assert_eq!(&wire[end..end + 2], b"\r\n", "missing CRLF after chunk data");
        out.push(wire[used..end].to_vec());
        wire = &wire[end + 2..];
    }
    out
}

/// Decode a complete chunked body.
#[allow(dead_code)]
pub fn decode(wire: &[u8]) -> Vec<u8> {
    let frames = frames(wire);
    let (last, data) = frames.split_last().expect("no chunks");
    assert!(last.is_empty(), "body is not terminated");
    assert!(data.iter().all(|f| !f.is_empty()), "early last chunk");
    data.concat()
}

/// A sink that accepts a fixed number of bytes and then fails.
#[derive(Debug, Default)]
pub struct FailingSink {
    pub written: Vec<u8>,
    budget: usize,
}

#[allow(dead_code)]
impl FailingSink {
    pub fn new(budget: usize) -> Self {
        Self {
            written: Vec::new(),
            budget,
        }
    }
}

impl AsyncWrite for FailingSink {
    fn poll_write(
        mut self: Pin<&mut Self>,
        _cx: &mut Context<'_>,
        buf: &[u8],
    ) -> Poll<io::Result<usize>> {
        let room = self.budget - self.written.len();
        if room == 0 {
            return Poll::Ready(Err(io::Error::new(
                io::ErrorKind::ConnectionReset,
                "sink failure",
            )));
        }
        let n = room.min(buf.len());
        self.written.extend_from_slice(&buf[..n]);
        Poll::Ready(Ok(n))
    }

    fn poll_flush(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Poll::Ready(Ok(()))
    }

    fn poll_close(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Poll::Ready(Ok(()))
    }
}
