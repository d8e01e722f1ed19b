// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Error types shared by every Tributary log backend.
//
// The variants follow the failure taxonomy of the log contract:
// configuration errors are fatal, transient backend errors are retryable by
// the caller, codec errors are reported separately from storage errors, and
// capability gaps are explicit `Unsupported` errors. A read timeout is never
// an error.

use thiserror::Error;

use tributary_codec::CodecError;

use crate::name::Name;
use crate::offset::LogPartition;

/// Errors returned by log managers, appenders and tailers.
#[derive(Debug, Error)]
pub enum LogError {
    /// Invalid configuration, e.g. a zero partition count or a log that
    /// already exists with a different partition count. Never retried.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// The named log does not exist.
    #[error("log not found: {0}")]
    NotFound(Name),

    /// A partition index outside `0..size` was requested.
    #[error("invalid partition {partition} for log {name} ({size} partitions)")]
    InvalidPartition {
        /// The log that was addressed.
        name: Name,
        /// The requested partition index.
        partition: u32,
        /// The partition count of the log.
        size: u32,
    },

    /// Another open tailer of the same manager already reads this partition
    /// under this consumer group.
    #[error("partition {partition} is already tailed by group {group}")]
    AlreadyTailed {
        /// The consumer group.
        group: Name,
        /// The contended partition.
        partition: LogPartition,
    },

    /// A seek or commit addressed a partition the tailer is not assigned to.
    #[error("partition {0} is not assigned to this tailer")]
    NotAssigned(LogPartition),

    /// The manager (or the handle itself) has been closed.
    #[error("log manager or handle is closed")]
    Closed,

    /// The backend lacks the requested capability.
    #[error("unsupported operation: {0}")]
    Unsupported(String),

    /// The backend failed. `retryable` is true for transient failures
    /// (connection loss, timeouts) that the caller may retry.
    #[error("backend error: {message}")]
    Backend {
        /// Human-readable description from the backend.
        message: String,
        /// Whether retrying the same call may succeed.
        retryable: bool,
    },

    /// Encoding or decoding a typed message failed.
    #[error("codec error: {0}")]
    Codec(#[from] CodecError),

    /// A record was tagged with a different codec than the tailer uses.
    #[error("codec mismatch: record written with '{actual}', tailer expects '{expected}'")]
    CodecMismatch {
        /// The codec name the reader was configured with.
        expected: String,
        /// The codec name carried by the record.
        actual: String,
    },

    /// Stored log data failed validation.
    #[error("corrupted log data: {0}")]
    Corrupted(String),

    /// An I/O error from a local backend.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl LogError {
    /// A retryable backend failure.
    pub fn transient(message: impl Into<String>) -> Self {
        Self::Backend {
            message: message.into(),
            retryable: true,
        }
    }

    /// A non-retryable backend failure.
    pub fn fatal(message: impl Into<String>) -> Self {
        Self::Backend {
            message: message.into(),
            retryable: false,
        }
    }

    /// Returns `true` when the caller may retry the failed operation.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Backend { retryable: true, .. })
    }
}

/// Convenience type alias for log results.
pub type LogResult<T> = Result<T, LogError>;
