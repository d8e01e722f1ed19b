// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Segment file naming, discovery and scanning.
//
// Each partition directory holds append-only files named
// `seg-{start_offset:016}.log`. Offsets are gapless, so the entry at index
// `i` of a segment has offset `start_offset + i` and a scan only needs the
// length prefixes.

use std::fs::{self, File};
use std::io::{BufReader, Read, Seek, SeekFrom};
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::entry::{LENGTH_PREFIX_SIZE, MAX_ENTRY_SIZE};
use crate::error::{SegmentError, SegmentResult};

/// Default maximum segment size in bytes (64 MiB).
pub const DEFAULT_MAX_SEGMENT_SIZE: u64 = 64 * 1024 * 1024;

/// The file extension used for segment files.
pub const SEGMENT_EXTENSION: &str = "log";

/// The prefix used for segment file names.
pub const SEGMENT_PREFIX: &str = "seg-";

/// Metadata about a single segment file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SegmentInfo {
    /// The full path to the segment file on disk.
    pub path: PathBuf,

    /// Offset of the first entry in this segment.
    pub start_offset: u64,

    /// File size in bytes when the segment was listed.
    pub file_size: u64,
}

impl SegmentInfo {
    /// Returns `true` if the segment file has reached or exceeded the given
    /// maximum size in bytes.
    pub fn is_full(&self, max_size: u64) -> bool {
        self.file_size >= max_size
    }
}

impl PartialOrd for SegmentInfo {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for SegmentInfo {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.start_offset.cmp(&other.start_offset)
    }
}

/// Format: `seg-0000000000000001.log`
pub fn segment_filename(start_offset: u64) -> String {
    format!("{SEGMENT_PREFIX}{start_offset:016}.{SEGMENT_EXTENSION}")
}

pub fn segment_path(dir: &Path, start_offset: u64) -> PathBuf {
    dir.join(segment_filename(start_offset))
}

/// Parse the start offset from a segment file name.
pub fn parse_segment_filename(name: &str) -> Option<u64> {
    let stripped = name.strip_prefix(SEGMENT_PREFIX)?;
    let digits = stripped.strip_suffix(&format!(".{SEGMENT_EXTENSION}"))?;
    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    digits.parse::<u64>().ok()
}

/// Scan a partition directory and return its segments ordered by start
/// offset. Other files are ignored.
pub fn list_segments(dir: &Path) -> SegmentResult<Vec<SegmentInfo>> {
    if !dir.is_dir() {
        return Err(SegmentError::DirectoryNotFound(dir.display().to_string()));
    }

    let mut segments = Vec::new();
    for dir_entry in fs::read_dir(dir)? {
        let dir_entry = dir_entry?;
        let file_name = dir_entry.file_name();
        if let Some(start_offset) = parse_segment_filename(&file_name.to_string_lossy()) {
            let metadata = dir_entry.metadata()?;
            segments.push(SegmentInfo {
                path: dir_entry.path(),
                start_offset,
                file_size: metadata.len(),
            });
        }
    }
    segments.sort();

    debug!(count = segments.len(), dir = %dir.display(), "Discovered segments");
    Ok(segments)
}

/// Result of walking the frames of one segment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SegmentScan {
    /// Number of complete frames.
    pub entries: u64,
    /// Byte length covered by complete frames.
    pub valid_len: u64,
    /// Actual file length.
    pub file_len: u64,
}

impl SegmentScan {
    /// Returns `true` when bytes past the last complete frame remain.
    pub fn has_torn_tail(&self) -> bool {
        self.valid_len < self.file_len
    }
}

/// Walk the length prefixes of a segment without verifying checksums.
///
/// Stops at the first frame that does not fit in the file, at a zero
/// length or at an oversized length.
pub fn scan_segment(path: &Path) -> SegmentResult<SegmentScan> {
    let file = File::open(path)?;
    let file_len = file.metadata()?.len();
    let mut reader = BufReader::new(file);
    let mut position = 0u64;
    let mut entries = 0u64;
    let mut prefix = [0u8; LENGTH_PREFIX_SIZE];

    while position + LENGTH_PREFIX_SIZE as u64 <= file_len {
        reader.read_exact(&mut prefix)?;
        let length = u32::from_le_bytes(prefix);
        if length == 0 || length > MAX_ENTRY_SIZE {
            break;
        }
        let end = position + LENGTH_PREFIX_SIZE as u64 + u64::from(length);
        if end > file_len {
            break;
        }
        reader.seek(SeekFrom::Current(i64::from(length)))?;
        position = end;
        entries += 1;
    }

    Ok(SegmentScan {
        entries,
        valid_len: position,
        file_len,
    })
}

/// Offset of the oldest entry kept in the partition directory.
pub fn start_offset(dir: &Path) -> SegmentResult<u64> {
    Ok(list_segments(dir)?.first().map(|s| s.start_offset).unwrap_or(0))
}

/// Offset the next appended entry will receive.
pub fn end_offset(dir: &Path) -> SegmentResult<u64> {
    match list_segments(dir)?.last() {
        Some(last) => Ok(last.start_offset + scan_segment(&last.path)?.entries),
        None => Ok(0),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entry::SegmentEntry;
    use std::io::Write;
    use tempfile::TempDir;

    fn create_segment(dir: &Path, start: u64, entries: u64) {
        let mut file = File::create(segment_path(dir, start)).unwrap();
        for i in 0..entries {
            let mut entry = SegmentEntry::new("k", 0, vec![1, 2, 3]);
            entry.offset = start + i;
            file.write_all(&entry.serialize()).unwrap();
        }
    }

    #[test]
    fn test_segment_filename_format() {
        assert_eq!(segment_filename(0), "seg-0000000000000000.log");
        assert_eq!(segment_filename(42), "seg-0000000000000042.log");
        assert_eq!(parse_segment_filename("seg-0000000000000042.log"), Some(42));
    }

    #[test]
    fn test_parse_segment_filename_invalid() {
        assert_eq!(parse_segment_filename("offsets"), None);
        assert_eq!(parse_segment_filename("seg-.log"), None);
        assert_eq!(parse_segment_filename("seg-+12.log"), None);
        assert_eq!(parse_segment_filename("seg-12.log.tmp"), None);
    }

    #[test]
    fn test_list_segments_sorted_and_filtered() {
        let dir = TempDir::new().unwrap();
        create_segment(dir.path(), 100, 1);
        create_segment(dir.path(), 0, 1);
        create_segment(dir.path(), 50, 1);
        fs::create_dir(dir.path().join("offsets")).unwrap();

        let segments = list_segments(dir.path()).unwrap();
        let starts: Vec<u64> = segments.iter().map(|s| s.start_offset).collect();
        assert_eq!(starts, vec![0, 50, 100]);
    }

    #[test]
    fn test_list_segments_missing_dir() {
        assert!(matches!(
            list_segments(Path::new("/nonexistent/tributary/P-00")),
            Err(SegmentError::DirectoryNotFound(_))
        ));
    }

    #[test]
    fn test_bounds() {
        let dir = TempDir::new().unwrap();
        assert_eq!(end_offset(dir.path()).unwrap(), 0);
        create_segment(dir.path(), 0, 3);
        create_segment(dir.path(), 3, 2);
        assert_eq!(start_offset(dir.path()).unwrap(), 0);
        assert_eq!(end_offset(dir.path()).unwrap(), 5);
    }

    #[test]
    fn test_scan_detects_torn_tail() {
        let dir = TempDir::new().unwrap();
        create_segment(dir.path(), 0, 2);
        let path = segment_path(dir.path(), 0);
        let clean = scan_segment(&path).unwrap();
        assert!(!clean.has_torn_tail());

        let mut file = fs::OpenOptions::new().append(true).open(&path).unwrap();
        let frame = SegmentEntry::new("k", 0, vec![9; 32]).serialize();
        file.write_all(&frame[..frame.len() / 2]).unwrap();

        let torn = scan_segment(&path).unwrap();
        assert_eq!(torn.entries, 2);
        assert_eq!(torn.valid_len, clean.valid_len);
        assert!(torn.has_torn_tail());
    }
}
