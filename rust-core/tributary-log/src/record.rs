// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Record and watermark.
//
// A `Record` is the unit stored in a partition: a routing key, opaque payload
// bytes, a logical watermark and optional headers. The watermark is stamped
// once at creation and never changes afterwards.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::atomic::{AtomicU16, Ordering};

use chrono::Utc;
use serde::{Deserialize, Serialize};

const SEQUENCE_MASK: i64 = 0x7fff;

static SEQUENCE: AtomicU16 = AtomicU16::new(0);

/// A logical timestamp packed into an `i64`.
///
/// Layout: `timestamp_ms << 16 | (sequence & 0x7fff) << 1 | completed`.
/// Packed values order by timestamp first, then sequence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Watermark {
    /// Milliseconds since the Unix epoch.
    pub timestamp_ms: i64,
    /// Discriminator for watermarks issued within the same millisecond.
    pub sequence: u16,
    /// Marks a watermark that closes a batch of related records.
    pub completed: bool,
}

impl Watermark {
    /// A fresh watermark from the wall clock and the process-local sequence.
    pub fn now() -> Self {
        let sequence = SEQUENCE.fetch_add(1, Ordering::Relaxed) & SEQUENCE_MASK as u16;
        Self::of(Utc::now().timestamp_millis(), sequence, false)
    }

    pub fn of(timestamp_ms: i64, sequence: u16, completed: bool) -> Self {
        Self {
            timestamp_ms,
            sequence: sequence & SEQUENCE_MASK as u16,
            completed,
        }
    }

    /// The lowest watermark for a given timestamp.
    pub fn lowest(timestamp_ms: i64) -> Self {
        Self::of(timestamp_ms, 0, false)
    }

    /// The same watermark with the completed flag set.
    pub fn completed(self) -> Self {
        Self {
            completed: true,
            ..self
        }
    }

    pub fn pack(&self) -> i64 {
        (self.timestamp_ms << 16) | ((self.sequence as i64 & SEQUENCE_MASK) << 1) | self.completed as i64
    }

    pub fn unpack(value: i64) -> Self {
        Self {
            timestamp_ms: value >> 16,
            sequence: ((value >> 1) & SEQUENCE_MASK) as u16,
            completed: value & 1 == 1,
        }
    }
}

impl fmt::Display for Watermark {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}:{}{}",
            self.timestamp_ms,
            self.sequence,
            if self.completed { ":completed" } else { "" }
        )
    }
}

/// The record appended to and read from a log partition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Record {
    /// Routing key; also selects the partition for keyed appends.
    pub key: String,
    /// Opaque payload, usually produced by a codec.
    pub data: Vec<u8>,
    /// Packed [`Watermark`].
    pub watermark: i64,
    /// Optional metadata, e.g. the codec tag.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub headers: BTreeMap<String, Vec<u8>>,
}

impl Record {
    /// A record stamped with a fresh watermark.
    pub fn of(key: impl Into<String>, data: impl Into<Vec<u8>>) -> Self {
        Self {
            key: key.into(),
            data: data.into(),
            watermark: Watermark::now().pack(),
            headers: BTreeMap::new(),
        }
    }

    /// A record carrying an explicit watermark.
    pub fn with_watermark(key: impl Into<String>, data: impl Into<Vec<u8>>, watermark: Watermark) -> Self {
        Self {
            key: key.into(),
            data: data.into(),
            watermark: watermark.pack(),
            headers: BTreeMap::new(),
        }
    }

    /// Builder-style header insertion.
    pub fn header(mut self, name: impl Into<String>, value: impl Into<Vec<u8>>) -> Self {
        self.headers.insert(name.into(), value.into());
        self
    }

    /// A header value, if present.
    pub fn get_header(&self, name: &str) -> Option<&[u8]> {
        self.headers.get(name).map(Vec::as_slice)
    }

    pub fn watermark(&self) -> Watermark {
        Watermark::unpack(self.watermark)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_record_of_stamps_watermark() {
        let before = Utc::now().timestamp_millis();
        let record = Record::of("key0", b"value".to_vec());
        let after = Utc::now().timestamp_millis();
        let watermark = record.watermark();
        assert!(watermark.timestamp_ms >= before && watermark.timestamp_ms <= after);
        assert!(!watermark.completed);
        assert!(record.headers.is_empty());
    }

    #[test]
    fn test_watermarks_in_same_millisecond_order_by_sequence() {
        let a = Watermark::of(1_000, 1, false);
        let b = Watermark::of(1_000, 2, false);
        let c = Watermark::of(1_001, 0, false);
        assert!(a.pack() < b.pack());
        assert!(b.pack() < c.pack());
    }

    #[test]
    fn test_completed_flag() {
        let watermark = Watermark::lowest(42).completed();
        assert_eq!(watermark.pack() & 1, 1);
        assert!(Watermark::unpack(watermark.pack()).completed);
    }

    #[test]
    fn test_headers() {
        let record = Record::of("k", b"v".to_vec()).header("codec", "avro");
        assert_eq!(record.get_header("codec"), Some(&b"avro"[..]));
        assert_eq!(record.get_header("missing"), None);
    }

    proptest! {
        #[test]
        fn test_pack_unpack(timestamp_ms in 0i64..(1i64 << 46), sequence in 0u16..0x8000, completed: bool) {
            let watermark = Watermark::of(timestamp_ms, sequence, completed);
            prop_assert_eq!(Watermark::unpack(watermark.pack()), watermark);
        }

        #[test]
        fn test_pack_preserves_order(a in 0i64..(1i64 << 46), b in 0i64..(1i64 << 46), sa in 0u16..0x8000, sb in 0u16..0x8000) {
            let wa = Watermark::of(a, sa, false);
            let wb = Watermark::of(b, sb, false);
            prop_assert_eq!(wa.cmp(&wb), wa.pack().cmp(&wb.pack()));
        }
    }
}
