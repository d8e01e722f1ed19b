// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Tributary segment engine
//
// Storage for one partition of an embedded log: a directory of append-only
// segment files holding length-prefixed, CRC32-protected entries. Segments
// are rotated when they exceed a configurable maximum size (default 64 MiB).
// Offsets are assigned by the single writer and have no gaps.
//
// ## On-disk entry format (all integers little-endian)
//
// ```text
// [4 bytes: entry_length (u32)]   -- length of everything after this field
// [4 bytes: crc32 checksum]       -- CRC32 of all bytes after this field
// [8 bytes: offset (u64)]
// [8 bytes: watermark (i64)]
// [4 bytes: key_len (u32)] [key]
// [4 bytes: header_count (u32)] {[u32 name_len][name][u32 value_len][value]}*
// [4 bytes: data_len (u32)] [data]
// ```
//
// ## Usage
//
// ```no_run
// use tributary_segment::{SegmentCursor, SegmentEntry, SegmentWriter, SyncMode};
//
// let mut writer = SegmentWriter::open("/tmp/tributary/orders/P-00", SyncMode::Fsync).unwrap();
// let offset = writer.append(SegmentEntry::new("order-1", 0, b"{}".to_vec())).unwrap();
//
// let mut cursor = SegmentCursor::open("/tmp/tributary/orders/P-00").unwrap();
// while let Some(entry) = cursor.next().unwrap() {
//     println!("offset={} key={}", entry.offset, entry.key);
// }
// # let _ = offset;
// ```

pub mod cursor;
pub mod entry;
pub mod error;
pub mod segment;
pub mod writer;

pub use cursor::SegmentCursor;
pub use entry::{decode_frame, Frame, SegmentEntry, MAX_ENTRY_SIZE};
pub use error::{SegmentError, SegmentResult};
pub use segment::{end_offset, list_segments, start_offset, SegmentInfo, DEFAULT_MAX_SEGMENT_SIZE};
pub use writer::{SegmentWriter, SyncMode};
