// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Codec selection by name, for configuration-driven setups.

use std::sync::Arc;

use tributary_schema::{MemorySchemaStore, SchemaError, SchemaRegistry, SchemaStore};

use crate::avro::AvroRecord;
use crate::avro_binary::AvroBinaryCodec;
use crate::avro_confluent::{AvroConfluentCodec, FallbackPolicy};
use crate::avro_json::AvroJsonCodec;
use crate::avro_message::AvroMessageCodec;
use crate::codec::{Codec, AVRO_BINARY, AVRO_CONFLUENT, AVRO_JSON, AVRO_MESSAGE, SERIALIZABLE};
use crate::error::{CodecError, CodecResult};
use crate::serializable::SerializableCodec;

/// Collaborators handed to codecs that need them.
#[derive(Clone, Default)]
pub struct CodecContext {
    /// Used by the `avro` codec. A process-local store is used when absent.
    pub store: Option<Arc<dyn SchemaStore>>,
    /// Required by the `avroConfluent` codec.
    pub registry: Option<Arc<dyn SchemaRegistry>>,
    pub fallback: FallbackPolicy,
}

/// Every codec name understood by [`codec_by_name`].
pub const CODEC_NAMES: [&str; 5] = [SERIALIZABLE, AVRO_JSON, AVRO_BINARY, AVRO_MESSAGE, AVRO_CONFLUENT];

/// Build the codec registered under `name`.
pub async fn codec_by_name<T>(name: &str, context: &CodecContext) -> CodecResult<Arc<dyn Codec<T>>>
where
    T: AvroRecord + 'static,
{
    let codec: Arc<dyn Codec<T>> = match name {
        SERIALIZABLE => Arc::new(SerializableCodec::<T>::new()),
        AVRO_JSON => Arc::new(AvroJsonCodec::<T>::new()?),
        AVRO_BINARY => Arc::new(AvroBinaryCodec::<T>::new()?),
        AVRO_MESSAGE => {
            let store = context
                .store
                .clone()
                .unwrap_or_else(|| Arc::new(MemorySchemaStore::new()) as Arc<dyn SchemaStore>);
            Arc::new(AvroMessageCodec::<T>::new(store).await?)
        }
        AVRO_CONFLUENT => {
            let registry = context.registry.clone().ok_or_else(|| {
                CodecError::Registry(SchemaError::Configuration(
                    "the avroConfluent codec needs a schema registry".into(),
                ))
            })?;
            Arc::new(AvroConfluentCodec::<T>::new(registry, context.fallback).await?)
        }
        other => return Err(CodecError::UnknownCodec(other.to_string())),
    };
    Ok(codec)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::avro::fixtures::*;
    use tributary_schema::InMemorySchemaRegistry;

    #[tokio::test]
    async fn test_every_name_builds_and_roundtrips() {
        let context = CodecContext {
            registry: Some(Arc::new(InMemorySchemaRegistry::new())),
            ..CodecContext::default()
        };
        for name in CODEC_NAMES {
            let codec = codec_by_name::<Customer>(name, &context).await.unwrap();
            assert_eq!(codec.name(), name);
            let bytes = codec.encode(&customer()).await.unwrap();
            assert_eq!(codec.decode(&bytes).await.unwrap(), customer());
        }
    }

    #[tokio::test]
    async fn test_unknown_and_unconfigured() {
        let context = CodecContext::default();
        assert!(matches!(
            codec_by_name::<Customer>("protobuf", &context).await,
            Err(CodecError::UnknownCodec(_))
        ));
        assert!(matches!(
            codec_by_name::<Customer>("avroConfluent", &context).await,
            Err(CodecError::Registry(SchemaError::Configuration(_)))
        ));
    }
}
