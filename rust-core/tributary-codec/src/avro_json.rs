// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Avro JSON encoding, for inspecting payloads by eye.
//
// Follows the Avro JSON encoding rules: non-null union values are wrapped in
// a single-key object naming the branch, bytes and fixed values are strings
// whose code points are the byte values (ISO-8859-1), enums are their symbol.
// Every value is checked against the schema in both directions.

use std::collections::HashMap;
use std::marker::PhantomData;

use apache_avro::types::Value;
use apache_avro::Schema;
use async_trait::async_trait;
use serde_json::{Map, Number, Value as Json};

use crate::avro::{to_avro_value, AvroRecord};
use crate::codec::{Codec, AVRO_JSON};
use crate::error::{CodecError, CodecResult};

type Names<'a> = HashMap<String, &'a Schema>;

/// Debug codec writing Avro JSON text.
pub struct AvroJsonCodec<T> {
    schema: Schema,
    _type: PhantomData<fn() -> T>,
}

impl<T: AvroRecord> AvroJsonCodec<T> {
    pub fn new() -> CodecResult<Self> {
        Ok(Self {
            schema: T::schema()?,
            _type: PhantomData,
        })
    }

    pub fn schema(&self) -> &Schema {
        &self.schema
    }
}

#[async_trait]
impl<T: AvroRecord> Codec<T> for AvroJsonCodec<T> {
    fn name(&self) -> &str {
        AVRO_JSON
    }

    async fn encode(&self, value: &T) -> CodecResult<Vec<u8>> {
        let avro = to_avro_value(&self.schema, value)?;
        let json = avro_to_json(&avro, &self.schema)?;
        serde_json::to_vec(&json).map_err(CodecError::encode)
    }

    async fn decode(&self, data: &[u8]) -> CodecResult<T> {
        let json: Json = serde_json::from_slice(data).map_err(CodecError::malformed)?;
        let avro = json_to_avro(&json, &self.schema)?;
        apache_avro::from_value(&avro).map_err(CodecError::malformed)
    }
}

/// Render an Avro value as Avro JSON.
pub fn avro_to_json(value: &Value, schema: &Schema) -> CodecResult<Json> {
    let mut names = Names::new();
    collect_names(schema, &mut names);
    value_to_json(value, schema, &names)
}

/// Parse Avro JSON into an Avro value conforming to `schema`.
pub fn json_to_avro(json: &Json, schema: &Schema) -> CodecResult<Value> {
    let mut names = Names::new();
    collect_names(schema, &mut names);
    let value = json_to_value(json, schema, &names, true)?;
    if !value.validate(schema) {
        return Err(CodecError::Malformed("JSON does not match the schema".into()));
    }
    Ok(value)
}

fn collect_names<'a>(schema: &'a Schema, names: &mut Names<'a>) {
    match schema {
        Schema::Record(record) => {
            if names.insert(record.name.fullname(None), schema).is_none() {
                for field in &record.fields {
                    collect_names(&field.schema, names);
                }
            }
        }
        Schema::Enum(enum_schema) => {
            names.insert(enum_schema.name.fullname(None), schema);
        }
        Schema::Fixed(fixed) => {
            names.insert(fixed.name.fullname(None), schema);
        }
        Schema::Array(array) => collect_names(&array.items, names),
        Schema::Map(map) => collect_names(&map.types, names),
        Schema::Union(union) => {
            for variant in union.variants() {
                collect_names(variant, names);
            }
        }
        _ => {}
    }
}

fn deref<'a>(schema: &'a Schema, names: &Names<'a>) -> CodecResult<&'a Schema> {
    match schema {
        Schema::Ref { name } => names
            .get(&name.fullname(None))
            .copied()
            .ok_or_else(|| CodecError::Schema(format!("unresolved schema reference {}", name.fullname(None)))),
        other => Ok(other),
    }
}

/// The key naming a union branch in Avro JSON.
fn branch_name(schema: &Schema) -> String {
    match schema {
        Schema::Record(record) => record.name.fullname(None),
        Schema::Enum(enum_schema) => enum_schema.name.fullname(None),
        Schema::Fixed(fixed) => fixed.name.fullname(None),
        Schema::Ref { name } => name.fullname(None),
        Schema::Array(_) => "array".to_string(),
        Schema::Map(_) => "map".to_string(),
        // Primitives and logical types use their underlying primitive name.
        other => other.canonical_form().trim_matches('"').to_string(),
    }
}

fn float(value: f64) -> CodecResult<Json> {
    Number::from_f64(value)
        .map(Json::Number)
        .ok_or_else(|| CodecError::Encode(format!("{value} has no JSON representation")))
}

fn bytes_to_string(bytes: &[u8]) -> String {
    bytes.iter().map(|b| char::from(*b)).collect()
}

fn string_to_bytes(text: &str) -> CodecResult<Vec<u8>> {
    text.chars()
        .map(|c| u8::try_from(u32::from(c)).map_err(|_| CodecError::Malformed(format!("'{c}' is not a byte"))))
        .collect()
}

fn value_to_json(value: &Value, schema: &Schema, names: &Names) -> CodecResult<Json> {
    let schema = deref(schema, names)?;
    let json = match (value, schema) {
        (Value::Union(index, inner), Schema::Union(union)) => {
            let branch = union
                .variants()
                .get(*index as usize)
                .ok_or_else(|| CodecError::Encode(format!("union branch {index} out of range")))?;
            if matches!(branch, Schema::Null) {
                Json::Null
            } else {
                let mut object = Map::new();
                object.insert(branch_name(branch), value_to_json(inner, branch, names)?);
                Json::Object(object)
            }
        }
        (Value::Null, _) => Json::Null,
        (Value::Boolean(b), _) => Json::Bool(*b),
        (Value::Int(i) | Value::Date(i) | Value::TimeMillis(i), _) => Json::from(*i),
        (
            Value::Long(l)
            | Value::TimeMicros(l)
            | Value::TimestampMillis(l)
            | Value::TimestampMicros(l)
            | Value::TimestampNanos(l)
            | Value::LocalTimestampMillis(l)
            | Value::LocalTimestampMicros(l)
            | Value::LocalTimestampNanos(l),
            _,
        ) => Json::from(*l),
        (Value::Float(f), _) => float(f64::from(*f))?,
        (Value::Double(d), _) => float(*d)?,
        (Value::Bytes(bytes) | Value::Fixed(_, bytes), _) => Json::String(bytes_to_string(bytes)),
        (Value::String(s) | Value::Enum(_, s), _) => Json::String(s.clone()),
        (Value::Uuid(uuid), _) => Json::String(uuid.to_string()),
        (Value::Array(items), Schema::Array(array)) => Json::Array(
            items
                .iter()
                .map(|item| value_to_json(item, &array.items, names))
                .collect::<CodecResult<_>>()?,
        ),
        (Value::Map(entries), Schema::Map(map)) => {
            let mut object = Map::new();
            for (key, item) in entries {
                object.insert(key.clone(), value_to_json(item, &map.types, names)?);
            }
            Json::Object(object)
        }
        (Value::Record(fields), Schema::Record(record)) => {
            let mut object = Map::new();
            for (name, item) in fields {
                let index = record
                    .lookup
                    .get(name)
                    .ok_or_else(|| CodecError::Encode(format!("field '{name}' not in schema")))?;
                object.insert(name.clone(), value_to_json(item, &record.fields[*index].schema, names)?);
            }
            Json::Object(object)
        }
        (other, schema) => {
            return Err(CodecError::Encode(format!(
                "cannot write {other:?} as {} in Avro JSON",
                branch_name(schema)
            )))
        }
    };
    Ok(json)
}

fn mismatch(json: &Json, schema: &Schema) -> CodecError {
    CodecError::Malformed(format!("expected {}, found {json}", branch_name(schema)))
}

/// `wrapped` is false for schema default values, whose unions are not
/// wrapped and always take the first branch.
fn json_to_value(json: &Json, schema: &Schema, names: &Names, wrapped: bool) -> CodecResult<Value> {
    let schema = deref(schema, names)?;
    let value = match schema {
        Schema::Null => match json {
            Json::Null => Value::Null,
            _ => return Err(mismatch(json, schema)),
        },
        Schema::Boolean => Value::Boolean(json.as_bool().ok_or_else(|| mismatch(json, schema))?),
        Schema::Int | Schema::Date | Schema::TimeMillis => {
            let i = json
                .as_i64()
                .and_then(|i| i32::try_from(i).ok())
                .ok_or_else(|| mismatch(json, schema))?;
            match schema {
                Schema::Date => Value::Date(i),
                Schema::TimeMillis => Value::TimeMillis(i),
                _ => Value::Int(i),
            }
        }
        Schema::Long
        | Schema::TimeMicros
        | Schema::TimestampMillis
        | Schema::TimestampMicros
        | Schema::TimestampNanos
        | Schema::LocalTimestampMillis
        | Schema::LocalTimestampMicros
        | Schema::LocalTimestampNanos => {
            let l = json.as_i64().ok_or_else(|| mismatch(json, schema))?;
            match schema {
                Schema::TimeMicros => Value::TimeMicros(l),
                Schema::TimestampMillis => Value::TimestampMillis(l),
                Schema::TimestampMicros => Value::TimestampMicros(l),
                Schema::TimestampNanos => Value::TimestampNanos(l),
                Schema::LocalTimestampMillis => Value::LocalTimestampMillis(l),
                Schema::LocalTimestampMicros => Value::LocalTimestampMicros(l),
                Schema::LocalTimestampNanos => Value::LocalTimestampNanos(l),
                _ => Value::Long(l),
            }
        }
        Schema::Float => Value::Float(json.as_f64().ok_or_else(|| mismatch(json, schema))? as f32),
        Schema::Double => Value::Double(json.as_f64().ok_or_else(|| mismatch(json, schema))?),
        Schema::Bytes => Value::Bytes(string_to_bytes(json.as_str().ok_or_else(|| mismatch(json, schema))?)?),
        Schema::String => Value::String(json.as_str().ok_or_else(|| mismatch(json, schema))?.to_string()),
        Schema::Array(array) => {
            let items = json.as_array().ok_or_else(|| mismatch(json, schema))?;
            Value::Array(
                items
                    .iter()
                    .map(|item| json_to_value(item, &array.items, names, wrapped))
                    .collect::<CodecResult<_>>()?,
            )
        }
        Schema::Map(map) => {
            let object = json.as_object().ok_or_else(|| mismatch(json, schema))?;
            Value::Map(
                object
                    .iter()
                    .map(|(key, item)| Ok((key.clone(), json_to_value(item, &map.types, names, wrapped)?)))
                    .collect::<CodecResult<_>>()?,
            )
        }
        Schema::Record(record) => {
            let object = json.as_object().ok_or_else(|| mismatch(json, schema))?;
            let mut fields = Vec::with_capacity(record.fields.len());
            for field in &record.fields {
                let value = match (object.get(&field.name), &field.default) {
                    (Some(item), _) => json_to_value(item, &field.schema, names, wrapped)?,
                    (None, Some(default)) => json_to_value(default, &field.schema, names, false)?,
                    (None, None) => {
                        return Err(CodecError::Malformed(format!("missing field '{}'", field.name)));
                    }
                };
                fields.push((field.name.clone(), value));
            }
            Value::Record(fields)
        }
        Schema::Enum(enum_schema) => {
            let symbol = json.as_str().ok_or_else(|| mismatch(json, schema))?;
            let index = enum_schema
                .symbols
                .iter()
                .position(|s| s == symbol)
                .ok_or_else(|| CodecError::Malformed(format!("unknown enum symbol '{symbol}'")))?;
            Value::Enum(index as u32, symbol.to_string())
        }
        Schema::Fixed(fixed) => {
            let bytes = string_to_bytes(json.as_str().ok_or_else(|| mismatch(json, schema))?)?;
            if bytes.len() != fixed.size {
                return Err(CodecError::Malformed(format!(
                    "fixed {} needs {} bytes, found {}",
                    fixed.name.fullname(None),
                    fixed.size,
                    bytes.len()
                )));
            }
            Value::Fixed(fixed.size, bytes)
        }
        Schema::Union(union) => {
            let variants = union.variants();
            if !wrapped {
                let first = variants.first().ok_or_else(|| mismatch(json, schema))?;
                return Ok(Value::Union(0, Box::new(json_to_value(json, first, names, false)?)));
            }
            let (index, branch, inner) = match json {
                Json::Null => {
                    let index = variants
                        .iter()
                        .position(|v| matches!(v, Schema::Null))
                        .ok_or_else(|| mismatch(json, schema))?;
                    (index, &variants[index], json)
                }
                Json::Object(object) if object.len() == 1 => {
                    let (key, inner) = object.iter().next().ok_or_else(|| mismatch(json, schema))?;
                    let index = variants
                        .iter()
                        .position(|v| branch_name(v) == *key)
                        .ok_or_else(|| CodecError::Malformed(format!("no union branch named '{key}'")))?;
                    (index, &variants[index], inner)
                }
                _ => return Err(mismatch(json, schema)),
            };
            Value::Union(index as u32, Box::new(json_to_value(inner, branch, names, wrapped)?))
        }
        other => {
            return Err(CodecError::Malformed(format!(
                "Avro JSON decoding of {} is not supported",
                branch_name(other)
            )))
        }
    };
    Ok(value)
}
