//! Fuzz target: `LineDecoder::feed`
//!
//! Arbitrary serial noise must never panic the framer, never yield a line
//! longer than its buffer, and never yield a line holding a terminator.
//!
//! cargo fuzz run fuzz_line_decoder

#![no_main]

use libfuzzer_sys::fuzz_target;
use mashctl::protocol::line::{LineDecoder, LineEvent, MAX_LINE_LEN};

fuzz_target!(|data: &[u8]| {
    let mut decoder = LineDecoder::<MAX_LINE_LEN>::new();

    decoder.feed(data, |event| {
        if let LineEvent::Line(line) = event {
            assert!(!line.is_empty() && line.len() <= MAX_LINE_LEN);
            assert!(!line.iter().any(|&b| b == b'\n' || b == b'\r'));
        }
    });
    assert!(decoder.pending() <= MAX_LINE_LEN);

    decoder.reset();
    assert_eq!(decoder.pending(), 0);
});
