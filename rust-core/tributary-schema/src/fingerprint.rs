// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Structural schema fingerprints.
//
// A fingerprint is the CRC-64-AVRO (Rabin) hash of the schema's Parsing
// Canonical Form, read as a little-endian `i64`. The canonical form drops
// docs, aliases and formatting, so structurally identical schemas hash
// identically in every process.

use apache_avro::rabin::Rabin;
use apache_avro::Schema;

use crate::error::SchemaResult;

/// The 64-bit fingerprint of `schema`.
pub fn fingerprint(schema: &Schema) -> i64 {
    let digest = schema.fingerprint::<Rabin>();
    let mut bytes = [0u8; 8];
    let len = digest.bytes.len().min(8);
    bytes[..len].copy_from_slice(&digest.bytes[..len]);
    i64::from_le_bytes(bytes)
}

/// `0x`-prefixed, zero-padded hex rendering used in file names and logs.
pub fn fingerprint_hex(fingerprint: i64) -> String {
    format!("0x{:016x}", fingerprint as u64)
}

/// Parse a `0x`-prefixed hex fingerprint.
pub fn parse_fingerprint_hex(text: &str) -> Option<i64> {
    let digits = text.strip_prefix("0x")?;
    u64::from_str_radix(digits, 16).ok().map(|v| v as i64)
}

/// Parse an Avro schema from its JSON text.
pub fn parse_schema(json: &str) -> SchemaResult<Schema> {
    Ok(Schema::parse_str(json)?)
}

/// The full name of a named schema, or the canonical type name otherwise.
pub fn schema_name(schema: &Schema) -> String {
    match schema.name() {
        Some(name) => name.fullname(None),
        None => schema.canonical_form().trim_matches('"').to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    const USER_V1: &str = r#"{
        "type": "record", "name": "User", "namespace": "org.example",
        "fields": [
            {"name": "id", "type": "long"},
            {"name": "name", "type": "string"}
        ]
    }"#;

    #[test]
    fn test_formatting_and_docs_do_not_change_fingerprint() {
        let compact = r#"{"type":"record","name":"User","namespace":"org.example","doc":"a user","fields":[{"name":"id","type":"long","doc":"key"},{"name":"name","type":"string"}]}"#;
        let a = parse_schema(USER_V1).unwrap();
        let b = parse_schema(compact).unwrap();
        assert_eq!(fingerprint(&a), fingerprint(&b));
    }

    #[test]
    fn test_structure_changes_fingerprint() {
        let renamed = USER_V1.replace("\"name\", \"type\": \"string\"", "\"login\", \"type\": \"string\"");
        let reordered = r#"{"type":"record","name":"User","namespace":"org.example","fields":[{"name":"name","type":"string"},{"name":"id","type":"long"}]}"#;
        let base = fingerprint(&parse_schema(USER_V1).unwrap());
        assert_ne!(base, fingerprint(&parse_schema(&renamed).unwrap()));
        assert_ne!(base, fingerprint(&parse_schema(reordered).unwrap()));
    }

    #[test]
    fn test_fingerprint_matches_rabin_bytes() {
        let schema = parse_schema(USER_V1).unwrap();
        let bytes = schema.fingerprint::<Rabin>().bytes;
        assert_eq!(bytes.len(), 8);
        assert_eq!(fingerprint(&schema).to_le_bytes().to_vec(), bytes);
    }

    #[test]
    fn test_schema_name() {
        assert_eq!(schema_name(&parse_schema(USER_V1).unwrap()), "org.example.User");
        assert_eq!(schema_name(&parse_schema("\"string\"").unwrap()), "string");
    }

    proptest! {
        #[test]
        fn test_hex_roundtrip(fp: i64) {
            let hex = fingerprint_hex(fp);
            prop_assert_eq!(hex.len(), 18);
            prop_assert_eq!(parse_fingerprint_hex(&hex), Some(fp));
        }
    }
}
