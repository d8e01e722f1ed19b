// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// `LogManager` over a broker cluster.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use tracing::{debug, info, warn};

use tributary_log::{
    CloseSignal, LogAppender, LogError, LogLag, LogManager, LogPartition, LogResult, LogTailer, Name, ReadPositions,
    TailerReservations,
};

use crate::appender::DistributedAppender;
use crate::broker::{BrokerCapabilities, BrokerClient};
use crate::config::DistributedConfig;
use crate::http::HttpBrokerClient;
use crate::tailer::DistributedTailer;

/// Logs stored as broker topics, one broker partition per log partition.
///
/// Consumer group offsets live in the broker. Several managers, in one
/// process or many, may share the same cluster and prefix.
pub struct DistributedLogManager {
    config: Arc<DistributedConfig>,
    client: Arc<dyn BrokerClient>,
    capabilities: BrokerCapabilities,
    close: CloseSignal,
    reservations: TailerReservations,
    appenders: Mutex<HashMap<Name, Arc<DistributedAppender>>>,
}

impl DistributedLogManager {
    /// Probe the broker through `client` and build a manager on it.
    pub async fn connect(config: DistributedConfig, client: Arc<dyn BrokerClient>) -> LogResult<Self> {
        let capabilities = client.probe().await.map_err(|e| {
            warn!(error = %e, "Broker probe failed");
            LogError::fatal(format!("cannot connect to broker: {e}"))
        })?;
        info!(
            brokers = ?config.brokers,
            prefix = %config.prefix,
            timestamp_lookup = capabilities.timestamp_lookup,
            "Connected distributed log manager"
        );
        Ok(Self {
            config: Arc::new(config),
            client,
            capabilities,
            close: CloseSignal::new(),
            reservations: TailerReservations::new(),
            appenders: Mutex::new(HashMap::new()),
        })
    }

    /// Connect over HTTP to the brokers named in `config`.
    pub async fn connect_http(config: DistributedConfig) -> LogResult<Self> {
        let client = HttpBrokerClient::new(&config).map_err(|e| LogError::Configuration(e.to_string()))?;
        Self::connect(config, Arc::new(client)).await
    }

    pub fn config(&self) -> &DistributedConfig {
        &self.config
    }

    pub fn capabilities(&self) -> BrokerCapabilities {
        self.capabilities
    }

    async fn partitions(&self, name: &Name) -> LogResult<u32> {
        self.client
            .describe_topic(&self.config.topic(name))
            .await
            .map_err(|e| e.into_log_error(name))?
            .map(|description| description.partitions)
            .ok_or_else(|| LogError::NotFound(name.clone()))
    }

    fn cached_appender(&self, name: &Name) -> LogResult<Option<Arc<DistributedAppender>>> {
        let appenders = self.appenders.lock().map_err(|_| poisoned())?;
        Ok(appenders.get(name).cloned())
    }
}

fn poisoned() -> LogError {
    LogError::fatal("appender cache lock poisoned")
}

#[async_trait]
impl LogManager for DistributedLogManager {
    async fn exists(&self, name: &Name) -> LogResult<bool> {
        self.close.ensure_open()?;
        Ok(self
            .client
            .describe_topic(&self.config.topic(name))
            .await
            .map_err(|e| e.into_log_error(name))?
            .is_some())
    }

    async fn size(&self, name: &Name) -> LogResult<u32> {
        self.close.ensure_open()?;
        self.partitions(name).await
    }

    async fn create_if_not_exists(&self, name: &Name, partitions: u32) -> LogResult<bool> {
        self.close.ensure_open()?;
        if partitions == 0 {
            return Err(LogError::Configuration(format!("log {name} needs at least one partition")));
        }
        let topic = self.config.topic(name);
        let existing = match self.client.describe_topic(&topic).await.map_err(LogError::from)? {
            Some(description) => Some(description.partitions),
            None => {
                if self.client.create_topic(&topic, partitions).await.map_err(LogError::from)? {
                    info!(log = %name, topic = %topic, partitions, "Created log");
                    return Ok(true);
                }
                // Someone else created it in between.
                Some(self.partitions(name).await?)
            }
        };
        match existing {
            Some(size) if size != partitions => Err(LogError::Configuration(format!(
                "log {name} exists with {size} partitions, not {partitions}"
            ))),
            _ => Ok(false),
        }
    }

    async fn delete(&self, name: &Name) -> LogResult<bool> {
        self.close.ensure_open()?;
        self.appenders.lock().map_err(|_| poisoned())?.remove(name);
        let deleted = self
            .client
            .delete_topic(&self.config.topic(name))
            .await
            .map_err(LogError::from)?;
        if deleted {
            info!(log = %name, "Deleted log");
        }
        Ok(deleted)
    }

    async fn get_appender(&self, name: &Name) -> LogResult<Arc<dyn LogAppender>> {
        self.close.ensure_open()?;
        if let Some(appender) = self.cached_appender(name)? {
            return Ok(appender as Arc<dyn LogAppender>);
        }
        let size = self.partitions(name).await?;
        let appender = DistributedAppender::new(
            name.clone(),
            size,
            Arc::clone(&self.config),
            Arc::clone(&self.client),
            self.close.clone(),
        );
        let mut appenders = self.appenders.lock().map_err(|_| poisoned())?;
        let appender = appenders
            .entry(name.clone())
            .or_insert_with(|| Arc::new(appender))
            .clone();
        debug!(log = %name, partitions = size, "Opened appender");
        Ok(appender as Arc<dyn LogAppender>)
    }

    async fn create_tailer_for(&self, group: &Name, partitions: &[LogPartition]) -> LogResult<Box<dyn LogTailer>> {
        self.close.ensure_open()?;
        if partitions.is_empty() {
            return Err(LogError::Configuration("a tailer needs at least one partition".into()));
        }

        let mut sizes: HashMap<Name, u32> = HashMap::new();
        for partition in partitions {
            let size = match sizes.get(&partition.name) {
                Some(size) => *size,
                None => {
                    let size = self.partitions(&partition.name).await?;
                    sizes.insert(partition.name.clone(), size);
                    size
                }
            };
            if partition.partition >= size {
                return Err(LogError::InvalidPartition {
                    name: partition.name.clone(),
                    partition: partition.partition,
                    size,
                });
            }
        }

        let reservation = self.reservations.reserve(group, partitions)?;
        let broker_group = self.config.group(group);
        let mut starts = Vec::with_capacity(partitions.len());
        for partition in partitions {
            let topic = self.config.topic(&partition.name);
            let committed = self
                .client
                .committed_offset(&broker_group, &topic, partition.partition)
                .await
                .map_err(|e| e.into_log_error(&partition.name))?;
            let start = match committed {
                Some(offset) => offset,
                None => {
                    self.client
                        .offset_range(&topic, partition.partition)
                        .await
                        .map_err(|e| e.into_log_error(&partition.name))?
                        .start
                }
            };
            starts.push(start);
        }

        let positions = ReadPositions::new(partitions.to_vec(), starts)?;
        debug!(group = %group, partitions = partitions.len(), "Created tailer");
        Ok(Box::new(DistributedTailer::new(
            group.clone(),
            positions,
            Arc::clone(&self.config),
            Arc::clone(&self.client),
            self.capabilities,
            self.close.clone(),
            reservation,
        )))
    }

    async fn list_all(&self) -> LogResult<Vec<Name>> {
        self.close.ensure_open()?;
        let mut names: Vec<Name> = self
            .client
            .list_topics()
            .await
            .map_err(LogError::from)?
            .iter()
            .filter_map(|topic| self.config.strip(topic))
            .collect();
        names.sort();
        Ok(names)
    }

    async fn list_consumer_groups(&self, name: &Name) -> LogResult<Vec<Name>> {
        self.close.ensure_open()?;
        let mut groups: Vec<Name> = self
            .client
            .list_groups(&self.config.topic(name))
            .await
            .map_err(|e| e.into_log_error(name))?
            .iter()
            .filter_map(|group| self.config.strip(group))
            .collect();
        groups.sort();
        groups.dedup();
        Ok(groups)
    }

    async fn get_lag_per_partition(&self, name: &Name, group: &Name) -> LogResult<Vec<LogLag>> {
        self.close.ensure_open()?;
        let size = self.partitions(name).await?;
        let topic = self.config.topic(name);
        let broker_group = self.config.group(group);
        let mut lags = Vec::with_capacity(size as usize);
        for partition in 0..size {
            let range = self
                .client
                .offset_range(&topic, partition)
                .await
                .map_err(|e| e.into_log_error(name))?;
            let committed = self
                .client
                .committed_offset(&broker_group, &topic, partition)
                .await
                .map_err(|e| e.into_log_error(name))?;
            // Records dropped by retention are not lag.
            let lower = committed.unwrap_or(range.start).max(range.start);
            lags.push(LogLag::of_range(lower, range.end));
        }
        Ok(lags)
    }

    fn supports_timestamp_seek(&self) -> bool {
        self.capabilities.timestamp_lookup
    }

    async fn close(&self) -> LogResult<()> {
        if self.close.close() {
            let released = {
                let mut appenders = self.appenders.lock().map_err(|_| poisoned())?;
                let count = appenders.len();
                appenders.clear();
                count
            };
            info!(prefix = %self.config.prefix, appenders = released, "Closed distributed log manager");
        }
        Ok(())
    }
}
