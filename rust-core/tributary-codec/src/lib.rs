// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Tributary codecs
//
// Transforms between typed messages and record payloads. Each codec has a
// name that tagged records carry, so a reader can tell when a payload was
// written by a different codec.
//
// | Name            | Type                    | Framing                              |
// |-----------------|-------------------------|--------------------------------------|
// | `serializable`  | [`SerializableCodec`]   | CBOR, no schema                      |
// | `avroJson`      | [`AvroJsonCodec`]       | Avro JSON text                       |
// | `avroBinary`    | [`AvroBinaryCodec`]     | bare Avro datum                      |
// | `avro`          | [`AvroMessageCodec`]    | `C3 01` + fingerprint + datum        |
// | `avroConfluent` | [`AvroConfluentCodec`]  | `00` + registry id + datum           |

pub mod avro;
pub mod avro_binary;
pub mod avro_confluent;
pub mod avro_json;
pub mod avro_message;
pub mod codec;
pub mod error;
pub mod factory;
pub mod serializable;

pub use avro::AvroRecord;
pub use avro_binary::AvroBinaryCodec;
pub use avro_confluent::{AvroConfluentCodec, FallbackPolicy};
pub use avro_json::AvroJsonCodec;
pub use avro_message::AvroMessageCodec;
pub use codec::Codec;
pub use error::{CodecError, CodecResult};
pub use factory::{codec_by_name, CodecContext, CODEC_NAMES};
pub use serializable::SerializableCodec;
