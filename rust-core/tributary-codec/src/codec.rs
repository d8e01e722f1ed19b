// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// The codec contract.

use async_trait::async_trait;

use crate::error::CodecResult;

pub const SERIALIZABLE: &str = "serializable";
pub const AVRO_JSON: &str = "avroJson";
pub const AVRO_BINARY: &str = "avroBinary";
pub const AVRO_MESSAGE: &str = "avro";
pub const AVRO_CONFLUENT: &str = "avroConfluent";

/// A bidirectional transform between `T` and bytes.
///
/// `decode(encode(x)) == x` holds for every codec as long as the schema does
/// not change in between. The name tags encoded records so readers can detect
/// payloads written by another codec.
#[async_trait]
pub trait Codec<T>: Send + Sync
where
    T: Send + Sync,
{
    fn name(&self) -> &str;

    async fn encode(&self, value: &T) -> CodecResult<Vec<u8>>;

    async fn decode(&self, data: &[u8]) -> CodecResult<T>;
}
