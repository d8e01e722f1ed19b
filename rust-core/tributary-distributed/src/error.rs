// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Error types for broker clients.

use thiserror::Error;

use tributary_log::{LogError, Name};

/// Errors reported by a [`crate::BrokerClient`].
#[derive(Debug, Error)]
pub enum BrokerError {
    /// No broker could be reached.
    #[error("broker unavailable: {0}")]
    Unavailable(String),

    /// The broker did not answer in time.
    #[error("broker request timed out: {0}")]
    Timeout(String),

    #[error("unknown topic: {0}")]
    UnknownTopic(String),

    #[error("unknown partition {partition} of topic {topic}")]
    UnknownPartition { topic: String, partition: u32 },

    /// The broker lacks the requested capability.
    #[error("unsupported by broker: {0}")]
    Unsupported(String),

    /// The broker answered with something the client cannot interpret.
    #[error("broker protocol error: {0}")]
    Protocol(String),
}

impl BrokerError {
    /// `true` for failures a caller may retry as is.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Unavailable(_) | Self::Timeout(_))
    }

    /// Map onto the log error taxonomy, reporting a missing topic as the
    /// log `name`.
    pub fn into_log_error(self, name: &Name) -> LogError {
        match self {
            Self::UnknownTopic(_) => LogError::NotFound(name.clone()),
            other => other.into(),
        }
    }
}

impl From<BrokerError> for LogError {
    fn from(error: BrokerError) -> Self {
        match error {
            BrokerError::Unsupported(message) => LogError::Unsupported(message),
            error if error.is_retryable() => LogError::transient(error.to_string()),
            error => LogError::fatal(error.to_string()),
        }
    }
}

impl From<reqwest::Error> for BrokerError {
    fn from(error: reqwest::Error) -> Self {
        if error.is_timeout() {
            Self::Timeout(error.to_string())
        } else if error.is_connect() || error.is_request() {
            Self::Unavailable(error.to_string())
        } else {
            Self::Protocol(error.to_string())
        }
    }
}

/// Convenience type alias for broker results.
pub type BrokerResult<T> = Result<T, BrokerError>;
