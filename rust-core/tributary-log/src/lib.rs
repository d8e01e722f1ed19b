// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Tributary log contract
//
// Partitioned, append-only logs with consumer groups. This crate defines the
// data model and the traits every storage backend implements; the backends
// themselves live in `tributary-embedded` and `tributary-distributed`.
//
// # Modules
//
// - [`name`] -- Log and consumer group names (`namespace/name`).
// - [`record`] -- The stored `Record` and its packed `Watermark`.
// - [`offset`] -- Partitions, offsets, read results, `LogLag` and `LogLatency`.
// - [`manager`] -- The `LogManager`, `LogAppender` and `LogTailer` traits.
// - [`cursor`] -- Per-tailer read and commit positions shared by backends.
// - [`handle`] -- Close signalling and tailer reservations.
// - [`typed`] -- Codec-aware appender and tailer wrappers.
// - [`error`] -- The `LogError` taxonomy.
//
// # Usage
//
// ```no_run
// use std::time::Duration;
// use tributary_log::{LogManager, Name, Record};
//
// # async fn demo(manager: &dyn LogManager) -> tributary_log::LogResult<()> {
// let log = Name::of_urn("app/events")?;
// let group = Name::of_urn("app/indexer")?;
// manager.create_if_not_exists(&log, 4).await?;
//
// let appender = manager.get_appender(&log).await?;
// appender.append("doc-1", Record::of("doc-1", b"payload".to_vec())).await?;
//
// let mut tailer = manager.create_tailer(&group, &log).await?;
// while let Some(record) = tailer.read(Duration::from_millis(100)).await? {
//     println!("{} {}", record.offset, record.message.key);
// }
// tailer.commit().await?;
// # Ok(())
// # }
// ```

pub mod cursor;
pub mod error;
pub mod handle;
pub mod manager;
pub mod name;
pub mod offset;
pub mod record;
pub mod typed;

pub use cursor::ReadPositions;
pub use error::{LogError, LogResult};
pub use handle::{CloseSignal, Reservation, TailerReservations};
pub use manager::{partition_for_key, LogAppender, LogManager, LogTailer};
pub use name::Name;
pub use offset::{LogLag, LogLatency, LogOffset, LogPartition, LogRecord};
pub use record::{Record, Watermark};
pub use typed::{CodecAppender, CodecTailer, Keyed, CODEC_HEADER};
