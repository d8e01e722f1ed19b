// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Appender of the distributed backend.

use std::sync::Arc;

use async_trait::async_trait;

use tributary_log::{CloseSignal, LogAppender, LogError, LogOffset, LogPartition, LogResult, Name, Record};

use crate::broker::{BrokerClient, BrokerRecord};
use crate::config::DistributedConfig;

pub struct DistributedAppender {
    name: Name,
    topic: String,
    size: u32,
    config: Arc<DistributedConfig>,
    client: Arc<dyn BrokerClient>,
    close: CloseSignal,
}

impl DistributedAppender {
    pub(crate) fn new(
        name: Name,
        size: u32,
        config: Arc<DistributedConfig>,
        client: Arc<dyn BrokerClient>,
        close: CloseSignal,
    ) -> Self {
        Self {
            topic: config.topic(&name),
            name,
            size,
            config,
            client,
            close,
        }
    }

    fn check_partition(&self, partition: u32) -> LogResult<()> {
        if partition >= self.size {
            return Err(LogError::InvalidPartition {
                name: self.name.clone(),
                partition,
                size: self.size,
            });
        }
        Ok(())
    }
}

pub(crate) fn to_broker_record(record: Record) -> BrokerRecord {
    BrokerRecord {
        timestamp_ms: record.watermark().timestamp_ms,
        key: record.key,
        headers: record.headers,
        data: record.data,
        watermark: record.watermark,
    }
}

#[async_trait]
impl LogAppender for DistributedAppender {
    fn name(&self) -> &Name {
        &self.name
    }

    fn size(&self) -> u32 {
        self.size
    }

    fn closed(&self) -> bool {
        self.close.is_closed()
    }

    async fn append_to(&self, partition: u32, record: Record) -> LogResult<LogOffset> {
        self.close.ensure_open()?;
        self.check_partition(partition)?;
        let offset = self
            .client
            .produce(&self.topic, partition, &to_broker_record(record))
            .await
            .map_err(|e| e.into_log_error(&self.name))?;
        Ok(LogPartition::of(self.name.clone(), partition).at(offset))
    }

    async fn committed_offset(&self, group: &Name, partition: u32) -> LogResult<Option<u64>> {
        self.close.ensure_open()?;
        self.check_partition(partition)?;
        self.client
            .committed_offset(&self.config.group(group), &self.topic, partition)
            .await
            .map_err(|e| e.into_log_error(&self.name))
    }
}
