#![no_main]
use libfuzzer_sys::fuzz_target;

use async_chunked::ChunkedEncoder;
use httparse::Status;

fn decode(mut wire: &[u8]) -> Vec<u8> {
    let mut body = Vec::new();
    loop {
        let (used, size) = match httparse::parse_chunk_size(wire) {
            Ok(Status::Complete(parsed)) => parsed,
            other => panic!("bad chunk header: {:?}", other),
        };
        let end = used + size as usize;
        assert_eq!(&wire[end..end + 2], b"\r\n");
        body.extend_from_slice(&wire[used..end]);
        wire = &wire[end + 2..];
        if size == 0 {
            assert!(wire.is_empty());
            return body;
        }
    }
}

fuzz_target!(|input: &[u8]| {
    // The first byte picks the write size, the rest is the body.
    let (step, body) = match input.split_first() {
        Some((&step, body)) => (usize::from(step).max(1), body),
        None => return,
    };

    let wire = async_std::task::block_on(async {
        let encoder = ChunkedEncoder::new(Vec::new());
        for piece in body.chunks(step) {
            encoder.write_all(piece).await.unwrap();
        }
        encoder.close().await.unwrap();
        encoder.into_inner()
    });

    assert_eq!(decode(&wire), body);
});
