// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Tributary
//
// Partitioned, append-only logs with consumer groups, behind one
// `LogManager` interface with two storage backends, plus schema-aware codecs
// for typed messages.
//
// This crate wires the pieces together from a `TributaryConfig`:
//
// ```no_run
// use std::time::Duration;
// use tributary::{open_log_manager, telemetry, Name, Record, TributaryConfig};
//
// # async fn demo() -> Result<(), Box<dyn std::error::Error>> {
// telemetry::init_tracing(false);
// let config = TributaryConfig::from_env()?;
// let manager = open_log_manager(&config).await?;
//
// let log = Name::of_urn("app/events")?;
// manager.create_if_not_exists(&log, 4).await?;
// manager.get_appender(&log).await?.append("k", Record::of("k", b"v".to_vec())).await?;
//
// let mut tailer = manager.create_tailer(&Name::of_urn("app/reader")?, &log).await?;
// while let Some(record) = tailer.read(Duration::from_millis(100)).await? {
//     println!("{} {}", record.offset, record.message.key);
// }
// tailer.commit().await?;
// manager.close().await?;
// # Ok(())
// # }
// ```

pub mod config;
pub mod telemetry;

use std::sync::Arc;

use tracing::info;

pub use config::{BackendConfig, ConfigError, ConfigResult, TributaryConfig};
pub use tributary_codec::{
    codec_by_name, AvroConfluentCodec, AvroRecord, Codec, CodecContext, CodecError, FallbackPolicy,
};
pub use tributary_distributed::{DistributedConfig, DistributedLogManager, HttpBrokerClient, InMemoryBroker};
pub use tributary_embedded::{EmbeddedConfig, EmbeddedLogManager};
pub use tributary_log::{
    CodecAppender, CodecTailer, LogAppender, LogError, LogLag, LogLatency, LogManager, LogOffset, LogPartition, LogRecord,
    LogResult, LogTailer, Name, Record, Watermark,
};
pub use tributary_schema::{HttpSchemaRegistry, RegistryConfig, SchemaError, SchemaRegistry, SchemaStore};
pub use tributary_segment::SyncMode;

/// Open the log manager of the configured backend.
pub async fn open_log_manager(config: &TributaryConfig) -> LogResult<Arc<dyn LogManager>> {
    let manager: Arc<dyn LogManager> = match &config.backend {
        BackendConfig::Embedded(embedded) => Arc::new(EmbeddedLogManager::open(embedded.clone()).await?),
        BackendConfig::Distributed(distributed) => {
            Arc::new(DistributedLogManager::connect_http(distributed.clone()).await?)
        }
    };
    info!(
        backend = match config.backend {
            BackendConfig::Embedded(_) => "embedded",
            BackendConfig::Distributed(_) => "distributed",
        },
        "Opened log manager"
    );
    Ok(manager)
}

/// The configured schema registry client, if any.
pub fn open_schema_registry(config: &TributaryConfig) -> Result<Option<Arc<dyn SchemaRegistry>>, SchemaError> {
    config
        .registry
        .as_ref()
        .map(|registry| Ok(Arc::new(HttpSchemaRegistry::new(registry)?) as Arc<dyn SchemaRegistry>))
        .transpose()
}

/// Codec collaborators derived from the configuration.
pub fn codec_context(config: &TributaryConfig, fallback: FallbackPolicy) -> Result<CodecContext, SchemaError> {
    Ok(CodecContext {
        store: None,
        registry: open_schema_registry(config)?,
        fallback,
    })
}
