// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Codec errors.
//
// Decoding distinguishes bytes that are simply malformed from payloads whose
// writer schema cannot be resolved, so callers can choose to fail loudly or
// accept degraded decoding.

use thiserror::Error;

use tributary_schema::SchemaError;

#[derive(Debug, Error)]
pub enum CodecError {
    /// The payload could not be decoded: bad framing, truncated data or a
    /// value that does not match the expected type.
    #[error("malformed payload: {0}")]
    Malformed(String),

    /// The value could not be encoded.
    #[error("encode failed: {0}")]
    Encode(String),

    /// The writer schema referenced by the payload is unknown.
    #[error("unknown writer schema: {0}")]
    UnknownSchema(String),

    /// The codec's own schema is invalid.
    #[error("invalid schema: {0}")]
    Schema(String),

    /// The schema store or registry failed.
    #[error("schema registry error: {0}")]
    Registry(#[from] SchemaError),

    /// No codec with this name exists.
    #[error("unknown codec '{0}'")]
    UnknownCodec(String),
}

impl CodecError {
    pub(crate) fn malformed(error: impl std::fmt::Display) -> Self {
        Self::Malformed(error.to_string())
    }

    pub(crate) fn encode(error: impl std::fmt::Display) -> Self {
        Self::Encode(error.to_string())
    }
}

/// Convenience type alias for codec results.
pub type CodecResult<T> = Result<T, CodecError>;
