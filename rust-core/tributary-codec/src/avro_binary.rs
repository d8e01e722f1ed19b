// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Raw Avro datum codec. No header: writer and reader must share the schema.

use std::marker::PhantomData;

use apache_avro::Schema;
use async_trait::async_trait;

use crate::avro::{decode_datum, encode_datum, AvroRecord};
use crate::codec::{Codec, AVRO_BINARY};
use crate::error::CodecResult;

pub struct AvroBinaryCodec<T> {
    schema: Schema,
    _type: PhantomData<fn() -> T>,
}

impl<T: AvroRecord> AvroBinaryCodec<T> {
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
impl<T: AvroRecord> Codec<T> for AvroBinaryCodec<T> {
    fn name(&self) -> &str {
        AVRO_BINARY
    }

    async fn encode(&self, value: &T) -> CodecResult<Vec<u8>> {
        encode_datum(&self.schema, value)
    }

    async fn decode(&self, data: &[u8]) -> CodecResult<T> {
        decode_datum(&self.schema, &self.schema, data)
    }
}
