// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Schema-less codec for any serde type, encoded as CBOR.

use std::marker::PhantomData;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::codec::{Codec, SERIALIZABLE};
use crate::error::{CodecError, CodecResult};

/// Encodes the serde data model directly. Needs no schema, so it is the
/// most permissive codec and the slowest to evolve safely.
pub struct SerializableCodec<T> {
    _type: PhantomData<fn() -> T>,
}

impl<T> SerializableCodec<T> {
    pub fn new() -> Self {
        Self { _type: PhantomData }
    }
}

impl<T> Default for SerializableCodec<T> {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl<T> Codec<T> for SerializableCodec<T>
where
    T: Serialize + DeserializeOwned + Send + Sync,
{
    fn name(&self) -> &str {
        SERIALIZABLE
    }

    async fn encode(&self, value: &T) -> CodecResult<Vec<u8>> {
        let mut bytes = Vec::new();
        ciborium::into_writer(value, &mut bytes).map_err(CodecError::encode)?;
        Ok(bytes)
    }

    async fn decode(&self, data: &[u8]) -> CodecResult<T> {
        ciborium::from_reader(data).map_err(CodecError::malformed)
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use proptest::prelude::*;
    use serde::Deserialize;

    use super::*;

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    struct Document {
        id: String,
        version: Option<u32>,
        properties: BTreeMap<String, Vec<String>>,
        children: Vec<Document>,
    }

    #[tokio::test]
    async fn test_nested_roundtrip() {
        let codec = SerializableCodec::<Document>::new();
        assert_eq!(codec.name(), "serializable");
        let doc = Document {
            id: "root".into(),
            version: None,
            properties: BTreeMap::from([("dc:title".to_string(), vec!["A".to_string(), "B".to_string()])]),
            children: vec![Document {
                id: "child".into(),
                version: Some(3),
                properties: BTreeMap::new(),
                children: Vec::new(),
            }],
        };
        let bytes = codec.encode(&doc).await.unwrap();
        assert_eq!(codec.decode(&bytes).await.unwrap(), doc);
    }

    #[tokio::test]
    async fn test_type_mismatch_is_an_error() {
        let bytes = SerializableCodec::<String>::new().encode(&"text".to_string()).await.unwrap();
        let result = SerializableCodec::<Document>::new().decode(&bytes).await;
        assert!(matches!(result, Err(CodecError::Malformed(_))));
        assert!(SerializableCodec::<Document>::new().decode(&[0xff, 0x00]).await.is_err());
    }

    proptest! {
        #[test]
        fn test_roundtrip_any_map(entries in proptest::collection::btree_map(".{0,8}", proptest::collection::vec(any::<i64>(), 0..4), 0..6)) {
            let runtime = tokio::runtime::Builder::new_current_thread().build().unwrap();
            let codec = SerializableCodec::<BTreeMap<String, Vec<i64>>>::new();
            let decoded = runtime.block_on(async {
                let bytes = codec.encode(&entries).await.unwrap();
                codec.decode(&bytes).await.unwrap()
            });
            prop_assert_eq!(decoded, entries);
        }
    }
}
