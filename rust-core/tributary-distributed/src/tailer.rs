// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Tailer of the distributed backend.
//
// A fetch long-polls every assigned partition at once and buffers what comes
// back per partition. Reads drain the buffers in round-robin order and only
// fetch again once all of them are empty. Moving a partition discards its
// buffer.

use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::time::Instant;
use tracing::{debug, info};

use tributary_log::{
    CloseSignal, LogError, LogOffset, LogPartition, LogRecord, LogResult, LogTailer, Name, ReadPositions, Record,
    Reservation,
};

use crate::broker::{BrokerCapabilities, BrokerClient, FetchPosition, FetchRequest, FetchedRecord};
use crate::config::DistributedConfig;

pub struct DistributedTailer {
    group: Name,
    broker_group: String,
    positions: ReadPositions,
    topics: Vec<String>,
    buffers: Vec<VecDeque<FetchedRecord>>,
    config: Arc<DistributedConfig>,
    client: Arc<dyn BrokerClient>,
    capabilities: BrokerCapabilities,
    close: CloseSignal,
    closed: bool,
    reservation: Reservation,
}

#[derive(Clone, Copy)]
enum Target {
    Start,
    End,
    Committed,
}

impl DistributedTailer {
    pub(crate) fn new(
        group: Name,
        positions: ReadPositions,
        config: Arc<DistributedConfig>,
        client: Arc<dyn BrokerClient>,
        capabilities: BrokerCapabilities,
        close: CloseSignal,
        reservation: Reservation,
    ) -> Self {
        let topics: Vec<String> = positions.assignments().iter().map(|p| config.topic(&p.name)).collect();
        let buffers = topics.iter().map(|_| VecDeque::new()).collect();
        Self {
            broker_group: config.group(&group),
            group,
            positions,
            topics,
            buffers,
            config,
            client,
            capabilities,
            close,
            closed: false,
            reservation,
        }
    }

    fn ensure_open(&self) -> LogResult<()> {
        if self.closed {
            return Err(LogError::Closed);
        }
        self.close.ensure_open()
    }

    fn move_to(&mut self, index: usize, offset: u64) {
        self.positions.set_position(index, offset);
        self.buffers[index].clear();
    }

    /// The next buffered record in round-robin order.
    fn take_buffered(&mut self) -> Option<(usize, FetchedRecord)> {
        let index = self.positions.poll_order().find(|&index| !self.buffers[index].is_empty())?;
        self.buffers[index].pop_front().map(|record| (index, record))
    }

    /// One long poll of at most `wait`. Returns whether anything was buffered.
    async fn fetch(&mut self, wait: Duration) -> LogResult<bool> {
        let request = FetchRequest {
            positions: self
                .positions
                .poll_order()
                .map(|index| FetchPosition {
                    topic: self.topics[index].clone(),
                    partition: self.positions.partition(index).partition,
                    offset: self.positions.position(index),
                })
                .collect(),
            max_records: self.config.fetch_max_records.max(1),
            max_wait_ms: wait.as_millis() as u64,
        };
        let fetched = tokio::select! {
            fetched = self.client.fetch(&request) => fetched.map_err(LogError::from)?,
            _ = self.close.closed() => return Err(LogError::Closed),
        };

        let mut buffered = false;
        for record in fetched {
            let Some(index) = self.index_of(&record.topic, record.partition) else {
                debug!(topic = %record.topic, partition = record.partition, "Ignoring record for unassigned partition");
                continue;
            };
            // Skip anything at or before what is already buffered or read.
            let expected = self.buffers[index]
                .back()
                .map(|last| last.offset + 1)
                .unwrap_or_else(|| self.positions.position(index));
            if record.offset >= expected {
                self.buffers[index].push_back(record);
                buffered = true;
            }
        }
        Ok(buffered)
    }

    fn index_of(&self, topic: &str, partition: u32) -> Option<usize> {
        (0..self.topics.len()).find(|&index| {
            self.topics[index] == topic && self.positions.partition(index).partition == partition
        })
    }

    async fn target_offset(&self, index: usize, target: Target) -> LogResult<u64> {
        let partition = self.positions.partition(index);
        let topic = &self.topics[index];
        let committed = match target {
            Target::Committed => self
                .client
                .committed_offset(&self.broker_group, topic, partition.partition)
                .await
                .map_err(|e| e.into_log_error(&partition.name))?,
            _ => None,
        };
        if let Some(offset) = committed {
            return Ok(offset);
        }
        let range = self
            .client
            .offset_range(topic, partition.partition)
            .await
            .map_err(|e| e.into_log_error(&partition.name))?;
        Ok(match target {
            Target::End => range.end,
            _ => range.start,
        })
    }

    async fn reposition(&mut self, target: Target) -> LogResult<()> {
        self.ensure_open()?;
        let mut offsets = Vec::with_capacity(self.positions.len());
        for index in 0..self.positions.len() {
            offsets.push(self.target_offset(index, target).await?);
        }
        for (index, offset) in offsets.into_iter().enumerate() {
            self.move_to(index, offset);
        }
        Ok(())
    }

    async fn persist(&self, commits: &[(usize, u64)]) -> LogResult<()> {
        for &(index, offset) in commits {
            let partition = self.positions.partition(index);
            self.client
                .commit_offset(&self.broker_group, &self.topics[index], partition.partition, offset)
                .await
                .map_err(|e| e.into_log_error(&partition.name))?;
        }
        Ok(())
    }

    fn check_timestamp_lookup(&self) -> LogResult<()> {
        if self.capabilities.timestamp_lookup {
            Ok(())
        } else {
            Err(LogError::Unsupported("the broker cannot look up offsets by timestamp".into()))
        }
    }

    async fn lookup_timestamp(&self, index: usize, timestamp_ms: i64) -> LogResult<Option<u64>> {
        let partition = self.positions.partition(index);
        self.client
            .offset_for_timestamp(&self.topics[index], partition.partition, timestamp_ms)
            .await
            .map_err(|e| e.into_log_error(&partition.name))
    }
}

fn to_record(fetched: FetchedRecord) -> Record {
    Record {
        key: fetched.record.key,
        data: fetched.record.data,
        watermark: fetched.record.watermark,
        headers: fetched.record.headers,
    }
}

#[async_trait]
impl LogTailer for DistributedTailer {
    fn group(&self) -> &Name {
        &self.group
    }

    fn assignments(&self) -> &[LogPartition] {
        self.positions.assignments()
    }

    fn closed(&self) -> bool {
        self.closed || self.close.is_closed()
    }

    async fn read(&mut self, timeout: Duration) -> LogResult<Option<LogRecord<Record>>> {
        self.ensure_open()?;
        let deadline = Instant::now() + timeout;
        loop {
            if let Some((index, fetched)) = self.take_buffered() {
                let offset = self.positions.advance(index, fetched.offset);
                return Ok(Some(LogRecord::new(to_record(fetched), offset)));
            }
            let remaining = deadline.saturating_duration_since(Instant::now());
            let buffered = self.fetch(remaining.min(self.config.poll_interval)).await?;
            if !buffered && Instant::now() >= deadline {
                return Ok(None);
            }
            self.ensure_open()?;
        }
    }

    async fn commit(&mut self) -> LogResult<Vec<LogOffset>> {
        self.ensure_open()?;
        let pending = self.positions.take_pending();
        if pending.is_empty() {
            return Ok(Vec::new());
        }
        if let Err(error) = self.persist(&pending).await {
            self.positions.restore_pending(pending);
            return Err(error);
        }
        let committed: Vec<LogOffset> = pending
            .into_iter()
            .map(|(index, offset)| self.positions.partition(index).at(offset))
            .collect();
        debug!(group = %self.group, count = committed.len(), "Committed offsets");
        Ok(committed)
    }

    async fn commit_partition(&mut self, partition: &LogPartition) -> LogResult<Option<LogOffset>> {
        self.ensure_open()?;
        let index = self.positions.index_of(partition)?;
        let Some(offset) = self.positions.take_pending_for(index) else {
            return Ok(None);
        };
        if let Err(error) = self.persist(&[(index, offset)]).await {
            self.positions.restore_pending([(index, offset)]);
            return Err(error);
        }
        debug!(group = %self.group, partition = %partition, offset, "Committed offset");
        Ok(Some(partition.at(offset)))
    }

    async fn to_start(&mut self) -> LogResult<()> {
        self.reposition(Target::Start).await
    }

    async fn to_end(&mut self) -> LogResult<()> {
        self.reposition(Target::End).await
    }

    async fn to_last_committed(&mut self) -> LogResult<()> {
        self.reposition(Target::Committed).await
    }

    async fn seek(&mut self, offset: &LogOffset) -> LogResult<()> {
        self.ensure_open()?;
        let index = self.positions.index_of(&offset.partition)?;
        self.move_to(index, offset.offset);
        Ok(())
    }

    async fn reset(&mut self) -> LogResult<()> {
        self.reposition(Target::Start).await?;
        let starts: Vec<(usize, u64)> = (0..self.positions.len())
            .map(|index| (index, self.positions.position(index)))
            .collect();
        self.persist(&starts).await?;
        info!(group = %self.group, partitions = self.positions.len(), "Reset consumer positions");
        Ok(())
    }

    async fn offset_for_timestamp(&mut self, partition: &LogPartition, timestamp_ms: i64) -> LogResult<Option<LogOffset>> {
        self.ensure_open()?;
        self.check_timestamp_lookup()?;
        let index = self.positions.index_of(partition)?;
        Ok(self
            .lookup_timestamp(index, timestamp_ms)
            .await?
            .map(|offset| partition.at(offset)))
    }

    async fn seek_to_timestamp(&mut self, timestamp_ms: i64) -> LogResult<()> {
        self.ensure_open()?;
        self.check_timestamp_lookup()?;
        let mut offsets = Vec::with_capacity(self.positions.len());
        for index in 0..self.positions.len() {
            // Partitions with nothing that recent go to their end.
            let offset = match self.lookup_timestamp(index, timestamp_ms).await? {
                Some(offset) => offset,
                None => self.target_offset(index, Target::End).await?,
            };
            offsets.push(offset);
        }
        for (index, offset) in offsets.into_iter().enumerate() {
            self.move_to(index, offset);
        }
        Ok(())
    }

    async fn close(&mut self) -> LogResult<()> {
        if !self.closed {
            self.closed = true;
            self.reservation.release();
            self.buffers.iter_mut().for_each(VecDeque::clear);
            debug!(group = %self.group, "Closed tailer");
        }
        Ok(())
    }
}
