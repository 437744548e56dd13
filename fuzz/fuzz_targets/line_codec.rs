//! Fuzz target for stream framing.
//!
//! Feeds arbitrary bytes through the line decoder in two chunks; decoded
//! lines never carry a terminator.

#![no_main]

use bytes::BytesMut;
use libfuzzer_sys::fuzz_target;
use slirc_client::LineCodec;
use tokio_util::codec::Decoder;

fuzz_target!(|data: &[u8]| {
    let split = data.first().map_or(0, |b| *b as usize % (data.len() + 1));
    let (head, tail) = data.split_at(split);

    let mut codec = LineCodec::new();
    let mut buf = BytesMut::new();
    for chunk in [head, tail] {
        buf.extend_from_slice(chunk);
        while let Ok(Some(line)) = codec.decode(&mut buf) {
            assert!(!line.contains(['\r', '\n']));
        }
    }
    while let Ok(Some(line)) = codec.decode_eof(&mut buf) {
        assert!(!line.contains(['\r', '\n']));
    }
});
