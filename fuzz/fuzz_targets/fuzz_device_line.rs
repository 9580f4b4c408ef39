#![no_main]

use libfuzzer_sys::fuzz_target;
use sigma::serial::{InboundLine, encode_schedule, parse_line};

fuzz_target!(|data: &[u8]| {
    let Ok(line) = std::str::from_utf8(data) else {
        return;
    };
    // An accepted echo must survive re-encoding as a command line.
    if let Some(InboundLine::Schedule(schedule)) = parse_line(line) {
        let encoded = encode_schedule(&schedule);
        assert!(encoded.ends_with('\n'));
        assert_eq!(encoded.trim_end().split(',').count(), 8);
    }
});
