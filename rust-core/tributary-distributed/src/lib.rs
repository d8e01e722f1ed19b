// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Tributary distributed backend
//
// A `LogManager` whose logs are topics on a broker cluster. The cluster is
// reached through the `BrokerClient` trait: `HttpBrokerClient` speaks
// REST/JSON with failover across broker URLs, and `InMemoryBroker` serves
// the same contract inside one process.
//
// Topic and group names on the broker are the log and group ids behind a
// configurable prefix, so several deployments can share a cluster.
// Timestamp seeks depend on the broker and are probed when connecting.
//
// # Usage
//
// ```no_run
// use std::sync::Arc;
// use tributary_distributed::{DistributedConfig, DistributedLogManager, InMemoryBroker};
// use tributary_log::{LogManager, Name};
//
// # async fn demo() -> tributary_log::LogResult<()> {
// let manager = DistributedLogManager::connect(
//     DistributedConfig::default(),
//     Arc::new(InMemoryBroker::new()),
// )
// .await?;
// manager.create_if_not_exists(&Name::of_urn("app/events")?, 4).await?;
// # Ok(())
// # }
// ```

pub mod appender;
pub mod broker;
pub mod config;
pub mod error;
pub mod http;
pub mod manager;
pub mod memory;
pub mod tailer;

pub use appender::DistributedAppender;
pub use broker::{
    BrokerCapabilities, BrokerClient, BrokerRecord, FetchPosition, FetchRequest, FetchedRecord, OffsetRange,
    TopicDescription,
};
pub use config::DistributedConfig;
pub use error::{BrokerError, BrokerResult};
pub use http::HttpBrokerClient;
pub use manager::DistributedLogManager;
pub use memory::InMemoryBroker;
pub use tailer::DistributedTailer;
