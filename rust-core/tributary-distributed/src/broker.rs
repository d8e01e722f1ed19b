// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// The broker contract and its wire types.
//
// A broker hosts topics split into partitions. Offsets within a partition
// are gapless and start at the partition's low watermark. Consumer group
// offsets are stored by the broker and hold the next offset to read.

use std::collections::BTreeMap;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::BrokerResult;

/// What a broker can do beyond the base contract.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BrokerCapabilities {
    /// The broker can map a timestamp to an offset.
    pub timestamp_lookup: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TopicDescription {
    pub name: String,
    pub partitions: u32,
}

/// A record as stored by the broker.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BrokerRecord {
    pub key: String,
    #[serde(default)]
    pub headers: BTreeMap<String, Vec<u8>>,
    pub data: Vec<u8>,
    /// Packed watermark, passed through untouched.
    #[serde(default)]
    pub watermark: i64,
    /// Milliseconds since the epoch used for timestamp lookups.
    pub timestamp_ms: i64,
}

/// Where a fetch starts reading one partition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FetchPosition {
    pub topic: String,
    pub partition: u32,
    pub offset: u64,
}

/// A multi-partition long poll.
///
/// The broker answers as soon as any partition has records at or after its
/// position, or once `max_wait_ms` elapses with nothing to return.
/// Partitions are served in request order until `max_records` is reached.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FetchRequest {
    pub positions: Vec<FetchPosition>,
    pub max_records: usize,
    pub max_wait_ms: u64,
}

impl FetchRequest {
    pub fn max_wait(&self) -> Duration {
        Duration::from_millis(self.max_wait_ms)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FetchedRecord {
    pub topic: String,
    pub partition: u32,
    pub offset: u64,
    pub record: BrokerRecord,
}

/// Offsets currently held by a partition: `start` is the first readable
/// offset, `end` the offset the next produce will get.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OffsetRange {
    pub start: u64,
    pub end: u64,
}

/// Client view of a broker cluster.
#[async_trait]
pub trait BrokerClient: Send + Sync {
    /// Check connectivity and report capabilities.
    async fn probe(&self) -> BrokerResult<BrokerCapabilities>;

    /// Create a topic. Returns `false` when it already exists, whatever its
    /// partition count.
    async fn create_topic(&self, topic: &str, partitions: u32) -> BrokerResult<bool>;

    async fn describe_topic(&self, topic: &str) -> BrokerResult<Option<TopicDescription>>;

    async fn list_topics(&self) -> BrokerResult<Vec<String>>;

    /// Delete a topic and its group offsets. Returns `false` when it did not
    /// exist.
    async fn delete_topic(&self, topic: &str) -> BrokerResult<bool>;

    /// Append one record once acknowledged; returns its offset.
    async fn produce(&self, topic: &str, partition: u32, record: &BrokerRecord) -> BrokerResult<u64>;

    async fn fetch(&self, request: &FetchRequest) -> BrokerResult<Vec<FetchedRecord>>;

    async fn offset_range(&self, topic: &str, partition: u32) -> BrokerResult<OffsetRange>;

    /// The first offset whose timestamp is at or after `timestamp_ms`, or
    /// `None` when every record is older.
    async fn offset_for_timestamp(&self, topic: &str, partition: u32, timestamp_ms: i64)
        -> BrokerResult<Option<u64>>;

    async fn commit_offset(&self, group: &str, topic: &str, partition: u32, offset: u64) -> BrokerResult<()>;

    async fn committed_offset(&self, group: &str, topic: &str, partition: u32) -> BrokerResult<Option<u64>>;

    /// Groups with a committed offset on any partition of `topic`.
    async fn list_groups(&self, topic: &str) -> BrokerResult<Vec<String>>;
}
