// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Schema-registry Avro codec (Confluent wire format).
//
// Layout: `0x00` marker, the 4-byte big-endian registry id of the writer
// schema, then the datum. The codec registers its own schema once at
// construction and keeps the id. On decode the writer schema comes from the
// codec itself, then a local cache, then the registry.
//
// When the registry cannot resolve the id (unknown id or unreachable
// registry) the default policy decodes as if the writer used the reader
// schema and logs a warning. This keeps consumers available but can
// misinterpret data written with an incompatible schema.

use std::collections::HashMap;
use std::marker::PhantomData;
use std::sync::{Arc, RwLock};

use apache_avro::Schema;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use tributary_schema::{schema_name, SchemaRegistry};

use crate::avro::{decode_datum, encode_datum, AvroRecord};
use crate::codec::{Codec, AVRO_CONFLUENT};
use crate::error::{CodecError, CodecResult};

pub const CONFLUENT_MAGIC: u8 = 0x00;
pub const CONFLUENT_HEADER_LEN: usize = 5;

/// What to do when the writer schema id cannot be resolved.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FallbackPolicy {
    /// Decode with the reader schema as writer schema and warn.
    #[default]
    ReaderSchema,
    /// Fail with [`CodecError::UnknownSchema`].
    Strict,
}

/// Split a Confluent-framed payload into its schema id and datum.
pub fn parse_confluent_header(data: &[u8]) -> CodecResult<(u32, &[u8])> {
    if data.len() < CONFLUENT_HEADER_LEN {
        return Err(CodecError::Malformed(format!(
            "{} bytes is shorter than the registry header",
            data.len()
        )));
    }
    if data[0] != CONFLUENT_MAGIC {
        return Err(CodecError::Malformed(format!("bad registry marker {:02x}", data[0])));
    }
    let id = u32::from_be_bytes([data[1], data[2], data[3], data[4]]);
    Ok((id, &data[CONFLUENT_HEADER_LEN..]))
}

pub struct AvroConfluentCodec<T> {
    schema: Schema,
    id: u32,
    registry: Arc<dyn SchemaRegistry>,
    writers: RwLock<HashMap<u32, Arc<Schema>>>,
    policy: FallbackPolicy,
    _type: PhantomData<fn() -> T>,
}

impl<T: AvroRecord> AvroConfluentCodec<T> {
    /// Register the type's schema under its full name and build the codec.
    pub async fn new(registry: Arc<dyn SchemaRegistry>, policy: FallbackPolicy) -> CodecResult<Self> {
        let schema = T::schema()?;
        let subject = schema_name(&schema);
        let id = registry.register(&subject, &schema).await?;
        info!(subject = %subject, id, "Registered codec schema");
        Ok(Self {
            schema,
            id,
            registry,
            writers: RwLock::new(HashMap::new()),
            policy,
            _type: PhantomData,
        })
    }

    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    /// The registry id of the codec's own schema.
    pub fn id(&self) -> u32 {
        self.id
    }

    pub fn policy(&self) -> FallbackPolicy {
        self.policy
    }

    fn cached(&self, id: u32) -> Option<Arc<Schema>> {
        self.writers.read().ok()?.get(&id).cloned()
    }

    /// The writer schema for `id`, or `None` when falling back to the reader schema.
    async fn writer_schema(&self, id: u32) -> CodecResult<Option<Arc<Schema>>> {
        if let Some(schema) = self.cached(id) {
            return Ok(Some(schema));
        }
        match self.registry.get_by_id(id).await {
            Ok(schema) => {
                let schema = Arc::new(schema);
                if let Ok(mut writers) = self.writers.write() {
                    writers.insert(id, Arc::clone(&schema));
                }
                debug!(id, "Fetched writer schema");
                Ok(Some(schema))
            }
            Err(error) if error.is_not_found() || error.is_unavailable() => match self.policy {
                FallbackPolicy::ReaderSchema => {
                    warn!(
                        id,
                        reader_id = self.id,
                        error = %error,
                        "Writer schema unresolvable, decoding with the reader schema"
                    );
                    Ok(None)
                }
                FallbackPolicy::Strict => Err(CodecError::UnknownSchema(format!("registry id {id}: {error}"))),
            },
            Err(error) => Err(CodecError::Registry(error)),
        }
    }
}

#[async_trait]
impl<T: AvroRecord> Codec<T> for AvroConfluentCodec<T> {
    fn name(&self) -> &str {
        AVRO_CONFLUENT
    }

    async fn encode(&self, value: &T) -> CodecResult<Vec<u8>> {
        let datum = encode_datum(&self.schema, value)?;
        let mut bytes = Vec::with_capacity(CONFLUENT_HEADER_LEN + datum.len());
        bytes.push(CONFLUENT_MAGIC);
        bytes.extend_from_slice(&self.id.to_be_bytes());
        bytes.extend_from_slice(&datum);
        Ok(bytes)
    }

    async fn decode(&self, data: &[u8]) -> CodecResult<T> {
        let (id, datum) = parse_confluent_header(data)?;
        if id == self.id {
            return decode_datum(&self.schema, &self.schema, datum);
        }
        match self.writer_schema(id).await? {
            Some(writer) => decode_datum(&writer, &self.schema, datum),
            None => decode_datum(&self.schema, &self.schema, datum),
        }
    }
}
