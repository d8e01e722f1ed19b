// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Segment engine error types.
//
// Torn tails are not errors: a writer truncates them on open and a cursor
// treats them as the current end of the partition.

use thiserror::Error;

/// Errors that can occur while reading or writing segment files.
#[derive(Debug, Error)]
pub enum SegmentError {
    /// An I/O error occurred while reading or writing a segment file.
    #[error("segment I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// CRC32 checksum mismatch. The entry was skipped.
    #[error("CRC mismatch at offset {offset}: expected {expected:#010x}, got {actual:#010x}")]
    CrcMismatch {
        /// The log offset of the entry, as far as it could be determined.
        offset: u64,
        /// The CRC32 value stored in the entry header.
        expected: u32,
        /// The CRC32 value computed from the entry body.
        actual: u32,
    },

    /// The entry header declares a length above [`crate::MAX_ENTRY_SIZE`].
    #[error("entry at byte {position} of {segment} declares {length} bytes, exceeding maximum {max_length}")]
    EntryTooLarge {
        /// The segment file name.
        segment: String,
        /// Byte position of the entry inside the segment.
        position: u64,
        /// The declared length.
        length: u32,
        /// The maximum allowed entry length.
        max_length: u32,
    },

    /// A checksummed entry whose fields do not add up.
    #[error("malformed entry: {0}")]
    Malformed(String),

    /// The partition directory does not exist or is not accessible.
    #[error("segment directory not found or inaccessible: {0}")]
    DirectoryNotFound(String),
}

impl SegmentError {
    /// Returns `true` when the error describes damaged data rather than an
    /// I/O failure.
    pub fn is_corruption(&self) -> bool {
        matches!(
            self,
            Self::CrcMismatch { .. } | Self::EntryTooLarge { .. } | Self::Malformed(_)
        )
    }
}

/// Convenience type alias for segment results.
pub type SegmentResult<T> = Result<T, SegmentError>;
