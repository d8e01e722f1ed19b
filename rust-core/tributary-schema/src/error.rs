// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Error types for schema stores and registry clients.

use thiserror::Error;

/// Errors from schema parsing, schema stores and schema registries.
#[derive(Debug, Error)]
pub enum SchemaError {
    /// The schema text is not a valid Avro schema.
    #[error("invalid schema: {0}")]
    Parse(String),

    /// The registry does not know the requested subject or schema id.
    #[error("schema not found: {0}")]
    NotFound(String),

    /// No registry URL could be reached.
    #[error("schema registry unavailable: {0}")]
    Unavailable(String),

    /// The registry answered with an error status.
    #[error("schema registry error ({status}): {message}")]
    Server {
        /// HTTP status code.
        status: u16,
        /// Message from the response body.
        message: String,
    },

    /// Invalid client configuration, such as a malformed registry URL.
    #[error("configuration error: {0}")]
    Configuration(String),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl SchemaError {
    /// `true` when the schema is simply unknown. Callers may fall back safely.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_))
    }

    /// `true` when the registry could not be reached at all.
    pub fn is_unavailable(&self) -> bool {
        matches!(self, Self::Unavailable(_))
    }
}

impl From<apache_avro::Error> for SchemaError {
    fn from(error: apache_avro::Error) -> Self {
        Self::Parse(error.to_string())
    }
}

/// Convenience type alias for schema results.
pub type SchemaResult<T> = Result<T, SchemaError>;
