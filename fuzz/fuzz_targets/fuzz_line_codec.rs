#![no_main]

use bytes::BytesMut;
use libfuzzer_sys::fuzz_target;
use sigma::serial::DeviceLineCodec;
use tokio_util::codec::Decoder;

fuzz_target!(|data: &[u8]| {
    let mut codec = DeviceLineCodec::with_max_line(64);
    let mut buf = BytesMut::new();
    for chunk in data.chunks(7) {
        buf.extend_from_slice(chunk);
        while let Ok(Some(line)) = codec.decode(&mut buf) {
            assert!(line.chars().count() <= 64);
            assert!(!line.contains('\n'));
        }
    }
    let _ = codec.decode_eof(&mut buf);
});
