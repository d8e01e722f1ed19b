// SPDX-License-Identifier: PMPL-1.0-or-later
// Fuzz target for segment frame decoding

#![no_main]

use libfuzzer_sys::fuzz_target;
use tributary_segment::{decode_frame, Frame};

fuzz_target!(|data: &[u8]| {
    // Walk the buffer the way recovery scans a segment file
    let mut position = 0;
    while position < data.len() {
        match decode_frame(&data[position..]) {
            Ok(Frame::Entry(entry, consumed)) => {
                assert!(consumed > 0 && position + consumed <= data.len());
                assert!(entry.data.len() < consumed);
                position += consumed;
            }
            Ok(Frame::Incomplete) | Err(_) => break,
        }
    }
});
