// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Segment entry and its on-disk framing.
//
// On-disk binary format (all integers little-endian):
//   [4 bytes: entry_length (u32)]   -- length of everything after this field
//   [4 bytes: crc32 checksum]       -- CRC32 of all bytes after this field
//   [8 bytes: offset (u64)]
//   [8 bytes: watermark (i64)]
//   [4 bytes: key_len (u32)]
//   [N bytes: key, UTF-8]
//   [4 bytes: header_count (u32)]
//   header_count times:
//     [4 bytes: name_len (u32)] [name, UTF-8] [4 bytes: value_len (u32)] [value]
//   [4 bytes: data_len (u32)]
//   [M bytes: data]

use std::collections::BTreeMap;

use crc32fast::Hasher as Crc32Hasher;

use crate::error::{SegmentError, SegmentResult};

/// Maximum allowed entry size: 64 MiB. Any entry declaring a larger size
/// is treated as corrupted.
pub const MAX_ENTRY_SIZE: u32 = 64 * 1024 * 1024;

/// Size of the length prefix.
pub const LENGTH_PREFIX_SIZE: usize = 4;

/// Size of the fixed-length entry header prefix (entry_length + crc32).
pub const HEADER_PREFIX_SIZE: usize = LENGTH_PREFIX_SIZE + 4;

/// One record as stored in a partition.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SegmentEntry {
    /// Position in the partition, assigned by the writer.
    pub offset: u64,
    /// Packed watermark of the record.
    pub watermark: i64,
    pub key: String,
    pub headers: BTreeMap<String, Vec<u8>>,
    pub data: Vec<u8>,
}

impl SegmentEntry {
    pub fn new(key: impl Into<String>, watermark: i64, data: Vec<u8>) -> Self {
        Self {
            offset: 0,
            watermark,
            key: key.into(),
            headers: BTreeMap::new(),
            data,
        }
    }

    /// Serialize this entry to the on-disk binary format.
    ///
    /// Returns the complete frame including the length prefix and CRC.
    pub fn serialize(&self) -> Vec<u8> {
        let headers_size: usize = self
            .headers
            .iter()
            .map(|(name, value)| 8 + name.len() + value.len())
            .sum();
        let inner_size = 8 + 8 + 4 + self.key.len() + 4 + headers_size + 4 + self.data.len();

        let mut inner = Vec::with_capacity(inner_size);
        inner.extend_from_slice(&self.offset.to_le_bytes());
        inner.extend_from_slice(&self.watermark.to_le_bytes());
        put_bytes(&mut inner, self.key.as_bytes());
        inner.extend_from_slice(&(self.headers.len() as u32).to_le_bytes());
        for (name, value) in &self.headers {
            put_bytes(&mut inner, name.as_bytes());
            put_bytes(&mut inner, value);
        }
        put_bytes(&mut inner, &self.data);

        let crc = compute_crc32(&inner);
        let entry_length = (4 + inner.len()) as u32;
        let mut buffer = Vec::with_capacity(LENGTH_PREFIX_SIZE + entry_length as usize);
        buffer.extend_from_slice(&entry_length.to_le_bytes());
        buffer.extend_from_slice(&crc.to_le_bytes());
        buffer.extend_from_slice(&inner);
        buffer
    }

    /// Deserialize an entry from the bytes that follow the length prefix
    /// (i.e. starting with the CRC32).
    pub fn deserialize(body: &[u8]) -> SegmentResult<Self> {
        if body.len() < 4 {
            return Err(SegmentError::Malformed(format!("{} byte entry has no checksum", body.len())));
        }
        let stored_crc = u32::from_le_bytes([body[0], body[1], body[2], body[3]]);
        let inner = &body[4..];

        let computed_crc = compute_crc32(inner);
        if stored_crc != computed_crc {
            let offset = inner
                .get(..8)
                .and_then(|bytes| bytes.try_into().ok())
                .map(u64::from_le_bytes)
                .unwrap_or(0);
            return Err(SegmentError::CrcMismatch {
                offset,
                expected: stored_crc,
                actual: computed_crc,
            });
        }

        Self::parse_inner(inner)
    }

    fn parse_inner(inner: &[u8]) -> SegmentResult<Self> {
        let mut reader = FieldReader::new(inner);
        let offset = reader.u64()?;
        let watermark = reader.i64()?;
        let key = reader.string("key")?;
        let header_count = reader.u32()?;
        let mut headers = BTreeMap::new();
        for _ in 0..header_count {
            let name = reader.string("header name")?;
            let value = reader.bytes()?.to_vec();
            headers.insert(name, value);
        }
        let data = reader.bytes()?.to_vec();
        if !reader.is_empty() {
            return Err(SegmentError::Malformed(format!(
                "{} trailing bytes after entry {offset}",
                reader.remaining()
            )));
        }
        Ok(Self {
            offset,
            watermark,
            key,
            headers,
            data,
        })
    }
}

/// Outcome of decoding one frame from the front of a buffer.
#[derive(Debug, PartialEq, Eq)]
pub enum Frame {
    /// A complete, verified entry and the number of bytes it occupied.
    Entry(SegmentEntry, usize),
    /// The buffer ends inside the frame (torn or still being written).
    Incomplete,
}

/// Decode the frame at the start of `buf`.
///
/// A zero length prefix marks unwritten space and reads as incomplete.
pub fn decode_frame(buf: &[u8]) -> SegmentResult<Frame> {
    let Some(prefix) = buf.get(..LENGTH_PREFIX_SIZE) else {
        return Ok(Frame::Incomplete);
    };
    let length = u32::from_le_bytes([prefix[0], prefix[1], prefix[2], prefix[3]]);
    if length == 0 {
        return Ok(Frame::Incomplete);
    }
    if length > MAX_ENTRY_SIZE {
        return Err(SegmentError::EntryTooLarge {
            segment: String::new(),
            position: 0,
            length,
            max_length: MAX_ENTRY_SIZE,
        });
    }
    let end = LENGTH_PREFIX_SIZE + length as usize;
    let Some(body) = buf.get(LENGTH_PREFIX_SIZE..end) else {
        return Ok(Frame::Incomplete);
    };
    Ok(Frame::Entry(SegmentEntry::deserialize(body)?, end))
}

/// Compute a CRC32 checksum over the given byte slice using the IEEE
/// polynomial (same as zlib/gzip).
pub fn compute_crc32(data: &[u8]) -> u32 {
    let mut hasher = Crc32Hasher::new();
    hasher.update(data);
    hasher.finalize()
}

fn put_bytes(buffer: &mut Vec<u8>, bytes: &[u8]) {
    buffer.extend_from_slice(&(bytes.len() as u32).to_le_bytes());
    buffer.extend_from_slice(bytes);
}

/// Bounds-checked little-endian field reader.
struct FieldReader<'a> {
    data: &'a [u8],
    position: usize,
}

impl<'a> FieldReader<'a> {
    fn new(data: &'a [u8]) -> Self {
        Self { data, position: 0 }
    }

    fn take(&mut self, len: usize) -> SegmentResult<&'a [u8]> {
        let end = self
            .position
            .checked_add(len)
            .filter(|end| *end <= self.data.len())
            .ok_or_else(|| {
                SegmentError::Malformed(format!(
                    "field of {len} bytes at {} overruns {} byte entry",
                    self.position,
                    self.data.len()
                ))
            })?;
        let slice = &self.data[self.position..end];
        self.position = end;
        Ok(slice)
    }

    fn array<const N: usize>(&mut self) -> SegmentResult<[u8; N]> {
        let mut out = [0u8; N];
        out.copy_from_slice(self.take(N)?);
        Ok(out)
    }

    fn u32(&mut self) -> SegmentResult<u32> {
        Ok(u32::from_le_bytes(self.array()?))
    }

    fn u64(&mut self) -> SegmentResult<u64> {
        Ok(u64::from_le_bytes(self.array()?))
    }

    fn i64(&mut self) -> SegmentResult<i64> {
        Ok(i64::from_le_bytes(self.array()?))
    }

    fn bytes(&mut self) -> SegmentResult<&'a [u8]> {
        let len = self.u32()? as usize;
        self.take(len)
    }

    fn string(&mut self, field: &str) -> SegmentResult<String> {
        let bytes = self.bytes()?;
        String::from_utf8(bytes.to_vec()).map_err(|e| SegmentError::Malformed(format!("{field} is not UTF-8: {e}")))
    }

    fn remaining(&self) -> usize {
        self.data.len() - self.position
    }

    fn is_empty(&self) -> bool {
        self.remaining() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn sample_entry(offset: u64) -> SegmentEntry {
        let mut entry = SegmentEntry::new(format!("key-{offset}"), 1_700_000_000_000 << 16, b"payload".to_vec());
        entry.offset = offset;
        entry.headers.insert("codec".into(), b"avro".to_vec());
        entry.headers.insert("trace".into(), vec![0, 1, 2]);
        entry
    }

    fn body(frame: &[u8]) -> &[u8] {
        &frame[LENGTH_PREFIX_SIZE..]
    }

    #[test]
    fn test_roundtrip_with_headers() {
        let entry = sample_entry(7);
        let frame = entry.serialize();
        let length = u32::from_le_bytes(frame[0..4].try_into().unwrap()) as usize;
        assert_eq!(length + LENGTH_PREFIX_SIZE, frame.len());
        assert_eq!(SegmentEntry::deserialize(body(&frame)).unwrap(), entry);
    }

    #[test]
    fn test_crc_mismatch_reports_offset() {
        let mut frame = sample_entry(42).serialize();
        let last = frame.len() - 1;
        frame[last] ^= 0xFF;
        match SegmentEntry::deserialize(body(&frame)) {
            Err(SegmentError::CrcMismatch { offset, expected, actual }) => {
                assert_eq!(offset, 42);
                assert_ne!(expected, actual);
            }
            other => panic!("expected CrcMismatch, got {other:?}"),
        }
    }

    #[test]
    fn test_empty_key_and_data() {
        let entry = SegmentEntry::new("", 0, Vec::new());
        let frame = entry.serialize();
        let recovered = SegmentEntry::deserialize(body(&frame)).unwrap();
        assert_eq!(recovered.key, "");
        assert!(recovered.data.is_empty());
        assert!(recovered.headers.is_empty());
    }

    #[test]
    fn test_decode_frame_incomplete() {
        let frame = sample_entry(1).serialize();
        assert_eq!(decode_frame(&frame[..3]).unwrap(), Frame::Incomplete);
        assert_eq!(decode_frame(&frame[..frame.len() - 1]).unwrap(), Frame::Incomplete);
        assert_eq!(decode_frame(&[0u8; 16]).unwrap(), Frame::Incomplete);
        assert_eq!(decode_frame(&frame).unwrap(), Frame::Entry(sample_entry(1), frame.len()));
    }

    #[test]
    fn test_decode_frame_rejects_huge_length() {
        let mut frame = sample_entry(1).serialize();
        frame[0..4].copy_from_slice(&u32::MAX.to_le_bytes());
        assert!(matches!(decode_frame(&frame), Err(SegmentError::EntryTooLarge { .. })));
    }

    #[test]
    fn test_lying_field_length_is_malformed() {
        // Re-checksum a body whose key length points past the end.
        let frame = sample_entry(3).serialize();
        let mut inner = body(&frame)[4..].to_vec();
        inner[16..20].copy_from_slice(&10_000u32.to_le_bytes());
        let mut forged = compute_crc32(&inner).to_le_bytes().to_vec();
        forged.extend_from_slice(&inner);
        assert!(matches!(SegmentEntry::deserialize(&forged), Err(SegmentError::Malformed(_))));
    }

    proptest! {
        #[test]
        fn prop_decode_frame_never_panics(bytes in proptest::collection::vec(any::<u8>(), 0..256)) {
            let _ = decode_frame(&bytes);
        }

        #[test]
        fn prop_frame_preserves_fields(
            key in "[a-z0-9-]{0,24}",
            watermark in any::<i64>(),
            data in proptest::collection::vec(any::<u8>(), 0..128),
        ) {
            let entry = SegmentEntry::new(key, watermark, data);
            let frame = entry.serialize();
            prop_assert_eq!(decode_frame(&frame).unwrap(), Frame::Entry(entry, frame.len()));
        }
    }
}
