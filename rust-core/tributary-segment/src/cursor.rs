// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Positioned reader over one partition directory.
//
// The cursor tracks the segment it is in, a byte position inside it and the
// offset of the next entry. Reaching the end of a segment is only final when
// no segment starts at the next offset; otherwise the cursor moves on. A
// frame that is not fully on disk yet reads as the end and is retried on the
// next call.

use std::fs::File;
use std::io::{Read, Seek, SeekFrom};
use std::path::{Path, PathBuf};

use tracing::{debug, warn};

use crate::entry::{SegmentEntry, LENGTH_PREFIX_SIZE, MAX_ENTRY_SIZE};
use crate::error::{SegmentError, SegmentResult};
use crate::segment::{list_segments, segment_filename, segment_path};

pub struct SegmentCursor {
    dir: PathBuf,
    segment_start: u64,
    file: Option<File>,
    position: u64,
    next_offset: u64,
}

impl SegmentCursor {
    /// Open a cursor at the oldest entry of the partition.
    pub fn open(dir: impl AsRef<Path>) -> SegmentResult<Self> {
        let mut cursor = Self {
            dir: dir.as_ref().to_path_buf(),
            segment_start: 0,
            file: None,
            position: 0,
            next_offset: 0,
        };
        cursor.seek(0)?;
        Ok(cursor)
    }

    /// Offset of the entry the next call to [`next`](Self::next) returns.
    pub fn position(&self) -> u64 {
        self.next_offset
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Position the cursor at `offset`, clamped to the partition bounds.
    /// Returns the effective position.
    pub fn seek(&mut self, offset: u64) -> SegmentResult<u64> {
        let segments = list_segments(&self.dir)?;
        let Some(segment) = segments
            .iter()
            .rev()
            .find(|s| s.start_offset <= offset)
            .or_else(|| segments.first())
        else {
            self.file = None;
            self.segment_start = 0;
            self.position = 0;
            self.next_offset = 0;
            return Ok(0);
        };

        let mut file = File::open(&segment.path)?;
        let file_len = file.metadata()?.len();
        self.segment_start = segment.start_offset;
        self.position = 0;
        self.next_offset = segment.start_offset;
        while self.next_offset < offset {
            match frame_length(&mut file, self.position, file_len)? {
                Some(length) => {
                    self.position += LENGTH_PREFIX_SIZE as u64 + u64::from(length);
                    self.next_offset += 1;
                }
                None => break,
            }
        }
        self.file = Some(file);

        debug!(dir = %self.dir.display(), requested = offset, position = self.next_offset, "Cursor seek");
        Ok(self.next_offset)
    }

    /// Move past the last complete entry.
    pub fn seek_to_end(&mut self) -> SegmentResult<u64> {
        self.seek(u64::MAX)
    }

    /// Read the next entry, or `None` at the current end of the partition.
    ///
    /// A corrupt entry is logged, skipped and reported as an error; the
    /// following call continues with the entry after it.
    pub fn next(&mut self) -> SegmentResult<Option<SegmentEntry>> {
        loop {
            if self.file.is_none() {
                self.seek(self.next_offset)?;
            }
            let Some(file) = self.file.as_mut() else {
                return Ok(None);
            };
            let file_len = file.metadata()?.len();

            let length = match frame_length(file, self.position, file_len) {
                Ok(Some(length)) => length,
                Ok(None) => {
                    if self.advance_segment()? {
                        continue;
                    }
                    return Ok(None);
                }
                Err(SegmentError::EntryTooLarge { length, max_length, .. }) => {
                    return Err(SegmentError::EntryTooLarge {
                        segment: segment_filename(self.segment_start),
                        position: self.position,
                        length,
                        max_length,
                    });
                }
                Err(other) => return Err(other),
            };

            let mut body = vec![0u8; length as usize];
            file.seek(SeekFrom::Start(self.position + LENGTH_PREFIX_SIZE as u64))?;
            file.read_exact(&mut body)?;

            let expected = self.next_offset;
            self.position += LENGTH_PREFIX_SIZE as u64 + u64::from(length);
            self.next_offset += 1;

            return match SegmentEntry::deserialize(&body) {
                Ok(entry) if entry.offset == expected => Ok(Some(entry)),
                Ok(entry) => {
                    warn!(
                        dir = %self.dir.display(),
                        expected,
                        found = entry.offset,
                        "Skipping out-of-sequence segment entry"
                    );
                    Err(SegmentError::Malformed(format!(
                        "entry at offset {expected} claims offset {}",
                        entry.offset
                    )))
                }
                Err(error) => {
                    warn!(
                        dir = %self.dir.display(),
                        segment = %segment_filename(self.segment_start),
                        offset = expected,
                        error = %error,
                        "Skipping corrupted segment entry"
                    );
                    Err(error)
                }
            };
        }
    }

    /// Switch to the segment starting at the next offset, if one exists.
    fn advance_segment(&mut self) -> SegmentResult<bool> {
        if self.next_offset == self.segment_start {
            return Ok(false);
        }
        let path = segment_path(&self.dir, self.next_offset);
        if !path.exists() {
            return Ok(false);
        }
        self.file = Some(File::open(&path)?);
        self.segment_start = self.next_offset;
        self.position = 0;
        debug!(segment = %path.display(), "Cursor followed rotation");
        Ok(true)
    }
}

/// Length of the frame at `position`, or `None` if no complete frame is
/// there yet.
fn frame_length(file: &mut File, position: u64, file_len: u64) -> SegmentResult<Option<u32>> {
    if position + LENGTH_PREFIX_SIZE as u64 > file_len {
        return Ok(None);
    }
    let mut prefix = [0u8; LENGTH_PREFIX_SIZE];
    file.seek(SeekFrom::Start(position))?;
    file.read_exact(&mut prefix)?;
    let length = u32::from_le_bytes(prefix);
    if length == 0 {
        return Ok(None);
    }
    if length > MAX_ENTRY_SIZE {
        return Err(SegmentError::EntryTooLarge {
            segment: String::new(),
            position,
            length,
            max_length: MAX_ENTRY_SIZE,
        });
    }
    if position + LENGTH_PREFIX_SIZE as u64 + u64::from(length) > file_len {
        return Ok(None);
    }
    Ok(Some(length))
}
