// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Avro schema declaration and datum helpers shared by the Avro codecs.
//
// Types opt into Avro encoding by declaring their schema next to the type
// through `AvroRecord`. Codecs parse that schema once at construction and
// reuse it for every message.

use apache_avro::types::Value;
use apache_avro::Schema;
use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::error::{CodecError, CodecResult};

/// A serde type with a declared Avro schema.
///
/// ```
/// use serde::{Deserialize, Serialize};
/// use tributary_codec::AvroRecord;
///
/// #[derive(Serialize, Deserialize)]
/// struct Event {
///     id: String,
///     count: i64,
/// }
///
/// impl AvroRecord for Event {
///     const SCHEMA: &'static str = r#"{"type":"record","name":"Event","fields":[
///         {"name":"id","type":"string"},
///         {"name":"count","type":"long"}]}"#;
/// }
/// ```
pub trait AvroRecord: Serialize + DeserializeOwned + Send + Sync {
    /// The Avro schema of the type, as JSON.
    const SCHEMA: &'static str;

    fn schema() -> CodecResult<Schema> {
        Schema::parse_str(Self::SCHEMA).map_err(|e| CodecError::Schema(e.to_string()))
    }
}

/// Convert a serde value into an Avro value conforming to `schema`.
pub(crate) fn to_avro_value<T: Serialize>(schema: &Schema, value: &T) -> CodecResult<Value> {
    let value = apache_avro::to_value(value).map_err(CodecError::encode)?;
    value.resolve(schema).map_err(CodecError::encode)
}

/// Encode `value` as a bare Avro datum.
pub(crate) fn encode_datum<T: Serialize>(schema: &Schema, value: &T) -> CodecResult<Vec<u8>> {
    let value = to_avro_value(schema, value)?;
    apache_avro::to_avro_datum(schema, value).map_err(CodecError::encode)
}

/// Decode a bare Avro datum written with `writer`, resolved against `reader`.
pub(crate) fn decode_datum<T: DeserializeOwned>(writer: &Schema, reader: &Schema, data: &[u8]) -> CodecResult<T> {
    let mut input = data;
    let reader_schema = if std::ptr::eq(writer, reader) { None } else { Some(reader) };
    let value = apache_avro::from_avro_datum(writer, &mut input, reader_schema).map_err(CodecError::malformed)?;
    if !input.is_empty() {
        return Err(CodecError::Malformed(format!("{} trailing bytes after datum", input.len())));
    }
    apache_avro::from_value(&value).map_err(CodecError::malformed)
}
