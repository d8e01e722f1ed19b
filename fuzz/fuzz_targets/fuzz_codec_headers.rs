// SPDX-License-Identifier: PMPL-1.0-or-later
// Fuzz target for the framed Avro headers (registry and single-object)

#![no_main]

use libfuzzer_sys::fuzz_target;
use tributary_codec::avro_confluent::{parse_confluent_header, CONFLUENT_HEADER_LEN};
use tributary_codec::avro_message::parse_single_object_header;

fuzz_target!(|data: &[u8]| {
    if let Ok((_, datum)) = parse_confluent_header(data) {
        assert_eq!(datum.len() + CONFLUENT_HEADER_LEN, data.len());
    }
    if let Ok((_, datum)) = parse_single_object_header(data) {
        assert!(datum.len() < data.len());
    }
});
