// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Tributary schemas
//
// Avro schema identity and lookup for the schema-aware codecs:
//
// - [`fingerprint`] -- Rabin fingerprints of the Parsing Canonical Form.
// - [`store`] -- `SchemaStore` keyed by fingerprint, in memory or on disk.
// - [`registry`] -- `SchemaRegistry` clients keyed by registry-assigned id.
// - [`error`] -- The `SchemaError` enum.

pub mod error;
pub mod fingerprint;
pub mod registry;
pub mod store;

pub use apache_avro::Schema;
pub use error::{SchemaError, SchemaResult};
pub use fingerprint::{fingerprint, fingerprint_hex, parse_schema, schema_name};
pub use registry::{HttpSchemaRegistry, InMemorySchemaRegistry, RegistryConfig, SchemaRegistry};
pub use store::{FileSchemaStore, MemorySchemaStore, SchemaStore};
