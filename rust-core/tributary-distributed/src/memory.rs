// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Single-process broker for tests and local development.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use tokio::sync::Notify;
use tokio::time::Instant;
use tracing::debug;

use crate::broker::{
    BrokerCapabilities, BrokerClient, BrokerRecord, FetchRequest, FetchedRecord, OffsetRange, TopicDescription,
};
use crate::error::{BrokerError, BrokerResult};

#[derive(Default)]
struct PartitionLog {
    /// Offset of `records[0]`.
    base: u64,
    records: Vec<BrokerRecord>,
}

impl PartitionLog {
    fn end(&self) -> u64 {
        self.base + self.records.len() as u64
    }
}

#[derive(Default)]
struct BrokerState {
    topics: BTreeMap<String, Vec<PartitionLog>>,
    /// (topic, group, partition) -> next offset to read.
    groups: BTreeMap<(String, String, u32), u64>,
}

impl BrokerState {
    fn topic(&self, topic: &str) -> BrokerResult<&[PartitionLog]> {
        self.topics
            .get(topic)
            .map(Vec::as_slice)
            .ok_or_else(|| BrokerError::UnknownTopic(topic.to_string()))
    }

    fn partition(&self, topic: &str, partition: u32) -> BrokerResult<&PartitionLog> {
        self.topic(topic)?
            .get(partition as usize)
            .ok_or_else(|| BrokerError::UnknownPartition {
                topic: topic.to_string(),
                partition,
            })
    }

    fn partition_mut(&mut self, topic: &str, partition: u32) -> BrokerResult<&mut PartitionLog> {
        self.topics
            .get_mut(topic)
            .ok_or_else(|| BrokerError::UnknownTopic(topic.to_string()))?
            .get_mut(partition as usize)
            .ok_or_else(|| BrokerError::UnknownPartition {
                topic: topic.to_string(),
                partition,
            })
    }
}

/// A broker held in memory.
///
/// Honours the whole [`BrokerClient`] contract, including long-poll fetches.
/// It can be marked unavailable to exercise retry paths.
pub struct InMemoryBroker {
    state: Mutex<BrokerState>,
    appended: Notify,
    capabilities: BrokerCapabilities,
    available: AtomicBool,
}

impl InMemoryBroker {
    /// A broker that supports timestamp lookups.
    pub fn new() -> Self {
        Self::with_capabilities(BrokerCapabilities { timestamp_lookup: true })
    }

    pub fn with_capabilities(capabilities: BrokerCapabilities) -> Self {
        Self {
            state: Mutex::new(BrokerState::default()),
            appended: Notify::new(),
            capabilities,
            available: AtomicBool::new(true),
        }
    }

    /// While unavailable, every call fails with [`BrokerError::Unavailable`].
    pub fn set_available(&self, available: bool) {
        self.available.store(available, Ordering::SeqCst);
    }

    /// Drop the records of a partition below `offset`, as retention would.
    pub fn truncate(&self, topic: &str, partition: u32, offset: u64) -> BrokerResult<()> {
        let mut state = self.lock();
        let log = state.partition_mut(topic, partition)?;
        let removed = offset.clamp(log.base, log.end()) - log.base;
        log.records.drain(..removed as usize);
        log.base += removed;
        Ok(())
    }

    fn lock(&self) -> MutexGuard<'_, BrokerState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn check_available(&self) -> BrokerResult<()> {
        if self.available.load(Ordering::SeqCst) {
            Ok(())
        } else {
            Err(BrokerError::Unavailable("in-memory broker marked unavailable".into()))
        }
    }

    fn collect(&self, request: &FetchRequest) -> BrokerResult<Vec<FetchedRecord>> {
        let state = self.lock();
        let mut fetched = Vec::new();
        for position in &request.positions {
            let log = state.partition(&position.topic, position.partition)?;
            // Positions below the low watermark read from it.
            let mut offset = position.offset.max(log.base);
            while offset < log.end() && fetched.len() < request.max_records {
                fetched.push(FetchedRecord {
                    topic: position.topic.clone(),
                    partition: position.partition,
                    offset,
                    record: log.records[(offset - log.base) as usize].clone(),
                });
                offset += 1;
            }
        }
        Ok(fetched)
    }
}

impl Default for InMemoryBroker {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl BrokerClient for InMemoryBroker {
    async fn probe(&self) -> BrokerResult<BrokerCapabilities> {
        self.check_available()?;
        Ok(self.capabilities)
    }

    async fn create_topic(&self, topic: &str, partitions: u32) -> BrokerResult<bool> {
        self.check_available()?;
        if partitions == 0 {
            return Err(BrokerError::Protocol(format!("topic {topic} needs at least one partition")));
        }
        let mut state = self.lock();
        if state.topics.contains_key(topic) {
            return Ok(false);
        }
        state
            .topics
            .insert(topic.to_string(), (0..partitions).map(|_| PartitionLog::default()).collect());
        debug!(topic, partitions, "Created topic");
        Ok(true)
    }

    async fn describe_topic(&self, topic: &str) -> BrokerResult<Option<TopicDescription>> {
        self.check_available()?;
        Ok(self.lock().topics.get(topic).map(|partitions| TopicDescription {
            name: topic.to_string(),
            partitions: partitions.len() as u32,
        }))
    }

    async fn list_topics(&self) -> BrokerResult<Vec<String>> {
        self.check_available()?;
        Ok(self.lock().topics.keys().cloned().collect())
    }

    async fn delete_topic(&self, topic: &str) -> BrokerResult<bool> {
        self.check_available()?;
        let mut state = self.lock();
        if state.topics.remove(topic).is_none() {
            return Ok(false);
        }
        state.groups.retain(|(t, _, _), _| t != topic);
        debug!(topic, "Deleted topic");
        Ok(true)
    }

    async fn produce(&self, topic: &str, partition: u32, record: &BrokerRecord) -> BrokerResult<u64> {
        self.check_available()?;
        let offset = {
            let mut state = self.lock();
            let log = state.partition_mut(topic, partition)?;
            let offset = log.end();
            log.records.push(record.clone());
            offset
        };
        self.appended.notify_waiters();
        Ok(offset)
    }

    async fn fetch(&self, request: &FetchRequest) -> BrokerResult<Vec<FetchedRecord>> {
        self.check_available()?;
        let deadline = Instant::now() + request.max_wait();
        loop {
            // Register for wakeups before looking, so a produce in between
            // is not missed.
            let notified = self.appended.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();

            let fetched = self.collect(request)?;
            if !fetched.is_empty() || Instant::now() >= deadline {
                return Ok(fetched);
            }
            let _ = tokio::time::timeout_at(deadline, notified).await;
            self.check_available()?;
        }
    }

    async fn offset_range(&self, topic: &str, partition: u32) -> BrokerResult<OffsetRange> {
        self.check_available()?;
        let state = self.lock();
        let log = state.partition(topic, partition)?;
        Ok(OffsetRange {
            start: log.base,
            end: log.end(),
        })
    }

    async fn offset_for_timestamp(
        &self,
        topic: &str,
        partition: u32,
        timestamp_ms: i64,
    ) -> BrokerResult<Option<u64>> {
        self.check_available()?;
        if !self.capabilities.timestamp_lookup {
            return Err(BrokerError::Unsupported("timestamp lookup".into()));
        }
        let state = self.lock();
        let log = state.partition(topic, partition)?;
        Ok(log
            .records
            .iter()
            .position(|record| record.timestamp_ms >= timestamp_ms)
            .map(|index| log.base + index as u64))
    }

    async fn commit_offset(&self, group: &str, topic: &str, partition: u32, offset: u64) -> BrokerResult<()> {
        self.check_available()?;
        let mut state = self.lock();
        state.partition(topic, partition)?;
        state
            .groups
            .insert((topic.to_string(), group.to_string(), partition), offset);
        Ok(())
    }

    async fn committed_offset(&self, group: &str, topic: &str, partition: u32) -> BrokerResult<Option<u64>> {
        self.check_available()?;
        let state = self.lock();
        state.partition(topic, partition)?;
        Ok(state
            .groups
            .get(&(topic.to_string(), group.to_string(), partition))
            .copied())
    }

    async fn list_groups(&self, topic: &str) -> BrokerResult<Vec<String>> {
        self.check_available()?;
        let state = self.lock();
        state.topic(topic)?;
        let groups: BTreeSet<&String> = state
            .groups
            .keys()
            .filter(|(t, _, _)| t == topic)
            .map(|(_, group, _)| group)
            .collect();
        Ok(groups.into_iter().cloned().collect())
    }
}
