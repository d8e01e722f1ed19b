// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Avro single-object encoding backed by a schema store.
//
// Layout: `C3 01` marker, the 8-byte little-endian fingerprint of the writer
// schema, then the datum. The codec stores its own schema once at
// construction; decoding looks the writer schema up by fingerprint and
// resolves it against the codec's schema.

use std::marker::PhantomData;
use std::sync::Arc;

use apache_avro::Schema;
use async_trait::async_trait;
use tracing::{debug, warn};

use tributary_schema::{fingerprint_hex, SchemaStore};

use crate::avro::{decode_datum, encode_datum, AvroRecord};
use crate::codec::{Codec, AVRO_MESSAGE};
use crate::error::{CodecError, CodecResult};

/// Single-object encoding marker.
pub const SINGLE_OBJECT_MAGIC: [u8; 2] = [0xC3, 0x01];

/// Length of the marker plus fingerprint.
pub const SINGLE_OBJECT_HEADER_LEN: usize = 10;

/// Split a single-object payload into its writer fingerprint and datum.
pub fn parse_single_object_header(data: &[u8]) -> CodecResult<(i64, &[u8])> {
    if data.len() < SINGLE_OBJECT_HEADER_LEN {
        return Err(CodecError::Malformed(format!(
            "{} bytes is shorter than the single-object header",
            data.len()
        )));
    }
    if data[..2] != SINGLE_OBJECT_MAGIC {
        return Err(CodecError::Malformed(format!(
            "bad single-object marker {:02x}{:02x}",
            data[0], data[1]
        )));
    }
    let mut fp = [0u8; 8];
    fp.copy_from_slice(&data[2..SINGLE_OBJECT_HEADER_LEN]);
    Ok((i64::from_le_bytes(fp), &data[SINGLE_OBJECT_HEADER_LEN..]))
}

pub struct AvroMessageCodec<T> {
    schema: Schema,
    fingerprint: i64,
    store: Arc<dyn SchemaStore>,
    _type: PhantomData<fn() -> T>,
}

impl<T: AvroRecord> AvroMessageCodec<T> {
    /// Build the codec and add its schema to `store`.
    pub async fn new(store: Arc<dyn SchemaStore>) -> CodecResult<Self> {
        let schema = T::schema()?;
        let fingerprint = store.add_schema(&schema).await?;
        debug!(fingerprint = %fingerprint_hex(fingerprint), "Avro message codec ready");
        Ok(Self {
            schema,
            fingerprint,
            store,
            _type: PhantomData,
        })
    }

    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    pub fn fingerprint(&self) -> i64 {
        self.fingerprint
    }
}

#[async_trait]
impl<T: AvroRecord> Codec<T> for AvroMessageCodec<T> {
    fn name(&self) -> &str {
        AVRO_MESSAGE
    }

    async fn encode(&self, value: &T) -> CodecResult<Vec<u8>> {
        let datum = encode_datum(&self.schema, value)?;
        let mut bytes = Vec::with_capacity(SINGLE_OBJECT_HEADER_LEN + datum.len());
        bytes.extend_from_slice(&SINGLE_OBJECT_MAGIC);
        bytes.extend_from_slice(&self.fingerprint.to_le_bytes());
        bytes.extend_from_slice(&datum);
        Ok(bytes)
    }

    async fn decode(&self, data: &[u8]) -> CodecResult<T> {
        let (fp, datum) = parse_single_object_header(data)?;
        if fp == self.fingerprint {
            return decode_datum(&self.schema, &self.schema, datum);
        }
        match self.store.find_by_fingerprint(fp).await {
            Some(writer) => decode_datum(&writer, &self.schema, datum),
            None => {
                warn!(fingerprint = %fingerprint_hex(fp), "Writer schema not in schema store");
                Err(CodecError::UnknownSchema(format!("fingerprint {}", fingerprint_hex(fp))))
            }
        }
    }
}
