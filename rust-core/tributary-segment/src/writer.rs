// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// The `SegmentWriter` appends entries to the newest segment of a partition,
// assigns gapless offsets, rotates segments and controls fsync behavior
// according to the configured `SyncMode`.

use std::fmt;
use std::fs::{self, File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::entry::SegmentEntry;
use crate::error::{SegmentError, SegmentResult};
use crate::segment::{list_segments, scan_segment, segment_path, SegmentInfo, DEFAULT_MAX_SEGMENT_SIZE};

// ---------------------------------------------------------------------------
// SyncMode
// ---------------------------------------------------------------------------

/// Controls how aggressively the writer calls `fsync`.
///
/// Parsed from and shown as `fsync`, `async`, or a periodic interval in
/// milliseconds (e.g. `100`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum SyncMode {
    /// Call `fsync` after every append. Acknowledged appends survive a
    /// crash.
    Fsync,

    /// Call `fsync` at most once per interval. Appends between syncs may
    /// be lost on crash.
    Periodic(Duration),

    /// Never call `fsync` explicitly; rely on the OS page cache.
    Async,
}

impl Default for SyncMode {
    fn default() -> Self {
        Self::Periodic(Duration::from_millis(100))
    }
}

impl fmt::Display for SyncMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Fsync => f.write_str("fsync"),
            Self::Async => f.write_str("async"),
            Self::Periodic(interval) => write!(f, "{}", interval.as_millis()),
        }
    }
}

impl FromStr for SyncMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "fsync" => Ok(Self::Fsync),
            "async" => Ok(Self::Async),
            other => other
                .parse::<u64>()
                .map(|ms| Self::Periodic(Duration::from_millis(ms)))
                .map_err(|_| format!("invalid sync mode '{s}': expected fsync, async or milliseconds")),
        }
    }
}

impl TryFrom<String> for SyncMode {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<SyncMode> for String {
    fn from(mode: SyncMode) -> Self {
        mode.to_string()
    }
}

// ---------------------------------------------------------------------------
// SegmentWriter
// ---------------------------------------------------------------------------

/// An append-only writer for one partition directory.
///
/// Only one writer per partition may exist at a time; readers are
/// unrestricted.
pub struct SegmentWriter {
    dir: PathBuf,
    current_file: File,
    current_segment: SegmentInfo,
    next_offset: u64,
    max_segment_size: u64,
    sync_mode: SyncMode,
    last_sync: Instant,
}

impl SegmentWriter {
    /// Open a partition directory, creating it and its first segment if
    /// needed.
    ///
    /// An existing partition resumes after its last complete entry; a torn
    /// tail left by a crash is truncated away.
    pub fn open(dir: impl AsRef<Path>, sync_mode: SyncMode) -> SegmentResult<Self> {
        Self::open_with_max_size(dir, sync_mode, DEFAULT_MAX_SEGMENT_SIZE)
    }

    /// Open with a custom maximum segment size.
    pub fn open_with_max_size(
        dir: impl AsRef<Path>,
        sync_mode: SyncMode,
        max_segment_size: u64,
    ) -> SegmentResult<Self> {
        let dir = dir.as_ref().to_path_buf();
        if !dir.exists() {
            fs::create_dir_all(&dir)?;
            info!(dir = %dir.display(), "Created partition directory");
        }

        let segments = list_segments(&dir)?;
        let (current_segment, current_file, next_offset) = match segments.last() {
            None => {
                let path = segment_path(&dir, 0);
                let file = OpenOptions::new().create(true).append(true).open(&path)?;
                let segment = SegmentInfo {
                    path,
                    start_offset: 0,
                    file_size: 0,
                };
                debug!(dir = %dir.display(), "Initialized empty partition");
                (segment, file, 0u64)
            }
            Some(last) => {
                let (segment, next_offset) = Self::recover(last)?;
                let file = OpenOptions::new().append(true).open(&segment.path)?;
                debug!(
                    segment = %segment.path.display(),
                    next_offset,
                    "Resuming partition"
                );
                (segment, file, next_offset)
            }
        };

        Ok(Self {
            dir,
            current_file,
            current_segment,
            next_offset,
            max_segment_size,
            sync_mode,
            last_sync: Instant::now(),
        })
    }

    /// Append an entry. Its `offset` field is overwritten with the next
    /// offset of the partition, which is returned.
    pub fn append(&mut self, mut entry: SegmentEntry) -> SegmentResult<u64> {
        let offset = self.next_offset;
        entry.offset = offset;
        let bytes = entry.serialize();

        if self.current_segment.file_size > 0
            && self.current_segment.file_size + bytes.len() as u64 > self.max_segment_size
        {
            self.rotate()?;
        }

        self.current_file.write_all(&bytes)?;
        self.current_segment.file_size += bytes.len() as u64;
        self.next_offset += 1;
        self.maybe_sync()?;

        Ok(offset)
    }

    /// Force an immediate `fsync` of the current segment file.
    pub fn sync(&mut self) -> SegmentResult<()> {
        self.current_file.sync_all()?;
        self.last_sync = Instant::now();
        Ok(())
    }

    /// Close the current segment and start a new one at the next offset.
    pub fn rotate(&mut self) -> SegmentResult<()> {
        self.sync()?;

        let new_start = self.next_offset;
        let new_path = segment_path(&self.dir, new_start);
        let new_file = OpenOptions::new().create_new(true).append(true).open(&new_path)?;
        sync_dir(&self.dir)?;

        info!(
            old_segment = %self.current_segment.path.display(),
            new_segment = %new_path.display(),
            start_offset = new_start,
            "Rotated segment"
        );

        self.current_file = new_file;
        self.current_segment = SegmentInfo {
            path: new_path,
            start_offset: new_start,
            file_size: 0,
        };
        Ok(())
    }

    /// Offset the next appended entry will receive.
    pub fn next_offset(&self) -> u64 {
        self.next_offset
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn current_segment(&self) -> &SegmentInfo {
        &self.current_segment
    }

    pub fn sync_mode(&self) -> SyncMode {
        self.sync_mode
    }

    // -----------------------------------------------------------------------
    // Private helpers
    // -----------------------------------------------------------------------

    fn maybe_sync(&mut self) -> SegmentResult<()> {
        match self.sync_mode {
            SyncMode::Fsync => self.sync()?,
            SyncMode::Periodic(interval) => {
                if self.last_sync.elapsed() >= interval {
                    self.sync()?;
                }
            }
            SyncMode::Async => {}
        }
        Ok(())
    }

    /// Count the complete entries of the last segment and cut off any torn
    /// tail.
    fn recover(last: &SegmentInfo) -> SegmentResult<(SegmentInfo, u64)> {
        let scan = scan_segment(&last.path)?;
        if scan.has_torn_tail() {
            warn!(
                segment = %last.path.display(),
                valid_len = scan.valid_len,
                file_len = scan.file_len,
                "Truncating torn segment tail"
            );
            let file = OpenOptions::new().write(true).open(&last.path)?;
            file.set_len(scan.valid_len)?;
            file.sync_all()?;
        }
        let segment = SegmentInfo {
            path: last.path.clone(),
            start_offset: last.start_offset,
            file_size: scan.valid_len,
        };
        Ok((segment, last.start_offset + scan.entries))
    }
}

impl Drop for SegmentWriter {
    fn drop(&mut self) {
        if self.sync_mode != SyncMode::Async {
            if let Err(error) = self.current_file.sync_all() {
                warn!(dir = %self.dir.display(), error = %error, "Final segment sync failed");
            }
        }
    }
}

#[cfg(unix)]
fn sync_dir(dir: &Path) -> SegmentResult<()> {
    File::open(dir)?.sync_all().map_err(SegmentError::from)
}

#[cfg(not(unix))]
fn sync_dir(_dir: &Path) -> SegmentResult<()> {
    Ok(())
}
