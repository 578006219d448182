//! Fuzz target for RequestFrame::decode
//!
//! Arbitrary bytes must never panic the decoder. Anything that decodes must
//! re-encode to the exact prefix it was read from.

#![no_main]

use libfuzzer_sys::fuzz_target;
use servolink_proto::{RequestFrame, RequestHeader};

fuzz_target!(|data: &[u8]| {
    let _ = RequestHeader::from_bytes(data);

    if let Ok(frame) = RequestFrame::decode(data) {
        let mut wire = Vec::new();
        frame.encode(&mut wire);
        assert_eq!(wire.len(), frame.encoded_len());
        assert_eq!(&data[..wire.len()], &wire[..]);
    }
});
