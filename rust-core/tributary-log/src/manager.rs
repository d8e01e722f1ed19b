// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// The log contract: `LogManager`, `LogAppender` and `LogTailer`.
//
// A manager owns a backend session and hands out appenders (shared, one per
// log) and tailers (owned, one per consumer). Every backend implements these
// traits, and callers only ever see the trait objects.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use tokio::time::Instant;

use crate::error::{LogError, LogResult};
use crate::name::Name;
use crate::offset::{LogLag, LogLatency, LogOffset, LogPartition, LogRecord};
use crate::record::Record;

/// Interval at which [`LogAppender::wait_for`] polls committed offsets.
pub const WAIT_FOR_POLL_INTERVAL: Duration = Duration::from_millis(20);

/// How long a latency report waits for the last committed record.
pub const LATENCY_READ_TIMEOUT: Duration = Duration::from_secs(1);

static LATENCY_READERS: AtomicU64 = AtomicU64::new(0);

/// A private group for reading records back without touching real groups.
fn latency_reader() -> LogResult<Name> {
    let n = LATENCY_READERS.fetch_add(1, Ordering::Relaxed);
    Name::of("tributary", &format!("latency{n}"))
}

const FNV_OFFSET_BASIS: u32 = 0x811c_9dc5;
const FNV_PRIME: u32 = 0x0100_0193;

/// The partition a keyed append goes to.
///
/// FNV-1a over the UTF-8 key bytes, so every process and backend agree.
pub fn partition_for_key(key: &str, partitions: u32) -> u32 {
    if partitions <= 1 {
        return 0;
    }
    let hash = key
        .as_bytes()
        .iter()
        .fold(FNV_OFFSET_BASIS, |hash, byte| (hash ^ u32::from(*byte)).wrapping_mul(FNV_PRIME));
    hash % partitions
}

/// Factory and registry for named logs on one backend.
#[async_trait]
pub trait LogManager: Send + Sync {
    /// Whether the log exists.
    async fn exists(&self, name: &Name) -> LogResult<bool>;

    /// The partition count of an existing log.
    async fn size(&self, name: &Name) -> LogResult<u32>;

    /// Create the log unless it exists.
    ///
    /// Returns `true` only when a new log was created. A zero partition count,
    /// or an existing log with a different partition count, is a
    /// [`LogError::Configuration`] error.
    async fn create_if_not_exists(&self, name: &Name, partitions: u32) -> LogResult<bool>;

    /// Delete a log and its consumer offsets. Returns `false` if it did not exist.
    async fn delete(&self, name: &Name) -> LogResult<bool>;

    /// The appender for a log, shared between callers.
    async fn get_appender(&self, name: &Name) -> LogResult<Arc<dyn LogAppender>>;

    /// A tailer over every partition of `name` under `group`.
    async fn create_tailer(&self, group: &Name, name: &Name) -> LogResult<Box<dyn LogTailer>> {
        let size = self.size(name).await?;
        let partitions: Vec<LogPartition> = (0..size).map(|p| LogPartition::of(name.clone(), p)).collect();
        self.create_tailer_for(group, &partitions).await
    }

    /// A tailer over an explicit set of partitions, possibly spanning logs.
    ///
    /// Each partition resumes at the group's committed offset, or at the
    /// oldest available record when the group never committed.
    async fn create_tailer_for(&self, group: &Name, partitions: &[LogPartition]) -> LogResult<Box<dyn LogTailer>>;

    async fn list_all(&self) -> LogResult<Vec<Name>>;

    /// Consumer groups with committed offsets on `name`.
    async fn list_consumer_groups(&self, name: &Name) -> LogResult<Vec<Name>>;

    /// Lag of `group` on each partition of `name`, indexed by partition.
    async fn get_lag_per_partition(&self, name: &Name, group: &Name) -> LogResult<Vec<LogLag>>;

    /// Lag of `group` summed over all partitions of `name`.
    async fn get_lag(&self, name: &Name, group: &Name) -> LogResult<LogLag> {
        Ok(self.get_lag_per_partition(name, group).await?.into_iter().sum())
    }

    /// Latency of `group` on each partition of `name`, indexed by partition.
    ///
    /// Measured from the watermark of the last record the group committed
    /// on each partition, read back through a throwaway tailer. Partitions
    /// the group has fully consumed, never committed on, or whose last
    /// committed record is gone report lag only.
    async fn get_latency_per_partition(&self, name: &Name, group: &Name) -> LogResult<Vec<LogLatency>> {
        let lags = self.get_lag_per_partition(name, group).await?;
        let appender = self.get_appender(name).await?;
        let reader = latency_reader()?;
        let upper_ms = Utc::now().timestamp_millis();
        let mut latencies = Vec::with_capacity(lags.len());
        for (partition, lag) in (0u32..).zip(lags) {
            let last = match appender.committed_offset(group, partition).await? {
                Some(next) if next > 0 && lag.lag > 0 => {
                    let at = LogPartition::of(name.clone(), partition).at(next - 1);
                    let mut tailer = self.create_tailer_for(&reader, &[at.partition.clone()]).await?;
                    let read = match tailer.seek(&at).await {
                        Ok(()) => tailer.read(LATENCY_READ_TIMEOUT).await,
                        Err(error) => Err(error),
                    };
                    tailer.close().await?;
                    read?.filter(|record| record.offset == at).map(|record| record.message)
                }
                _ => None,
            };
            latencies.push(match last {
                Some(record) => LogLatency::of(lag, record.watermark().timestamp_ms, upper_ms, record.key),
                None => LogLatency::none(lag, upper_ms),
            });
        }
        Ok(latencies)
    }

    /// Latency of `group` over all partitions of `name`: summed lag, and the
    /// latency of the partition furthest behind.
    async fn get_latency(&self, name: &Name, group: &Name) -> LogResult<LogLatency> {
        Ok(LogLatency::merge(self.get_latency_per_partition(name, group).await?))
    }

    /// Whether tailers of this manager can seek by timestamp.
    fn supports_timestamp_seek(&self) -> bool;

    /// Close the manager and every handle it created. Idempotent.
    async fn close(&self) -> LogResult<()>;
}

/// Write access to every partition of one log.
#[async_trait]
pub trait LogAppender: Send + Sync {
    fn name(&self) -> &Name;

    /// Partition count.
    fn size(&self) -> u32;

    fn closed(&self) -> bool;

    /// Append to the partition selected by [`partition_for_key`].
    async fn append(&self, key: &str, record: Record) -> LogResult<LogOffset> {
        self.append_to(partition_for_key(key, self.size()), record).await
    }

    /// Append to a pinned partition and return the assigned offset once the
    /// backend acknowledged it.
    async fn append_to(&self, partition: u32, record: Record) -> LogResult<LogOffset>;

    /// The next offset `group` will read on `partition`, if it ever committed.
    async fn committed_offset(&self, group: &Name, partition: u32) -> LogResult<Option<u64>>;

    /// Wait until `group` has committed past `offset`.
    ///
    /// Returns `false` when the timeout elapses first.
    async fn wait_for(&self, offset: &LogOffset, group: &Name, timeout: Duration) -> LogResult<bool> {
        if offset.partition.name != *self.name() {
            return Err(LogError::Configuration(format!(
                "offset {offset} does not belong to log {}",
                self.name()
            )));
        }
        let deadline = Instant::now() + timeout;
        loop {
            if self.closed() {
                return Err(LogError::Closed);
            }
            let committed = self.committed_offset(group, offset.partition.partition).await?;
            if committed.is_some_and(|next| next > offset.offset) {
                return Ok(true);
            }
            let now = Instant::now();
            if now >= deadline {
                return Ok(false);
            }
            tokio::time::sleep(WAIT_FOR_POLL_INTERVAL.min(deadline - now)).await;
        }
    }
}

/// Resumable read access to a set of partitions under a consumer group.
///
/// A tailer is driven by one task at a time; independent tailers of the same
/// manager run concurrently.
#[async_trait]
pub trait LogTailer: Send {
    fn group(&self) -> &Name;

    fn assignments(&self) -> &[LogPartition];

    fn closed(&self) -> bool;

    /// The next record across the assigned partitions, or `None` when nothing
    /// arrives within `timeout`. Does not commit.
    async fn read(&mut self, timeout: Duration) -> LogResult<Option<LogRecord<Record>>>;

    /// Persist the position past the last record read, for every partition
    /// read since the previous commit. Returns the committed positions (the
    /// next offsets to read); empty when nothing was pending.
    async fn commit(&mut self) -> LogResult<Vec<LogOffset>>;

    /// Commit a single partition. `None` when nothing was pending on it.
    async fn commit_partition(&mut self, partition: &LogPartition) -> LogResult<Option<LogOffset>>;

    /// Move every assigned partition to its oldest available record.
    async fn to_start(&mut self) -> LogResult<()>;

    /// Move every assigned partition past its last record.
    async fn to_end(&mut self) -> LogResult<()>;

    /// Move every assigned partition back to the group's committed offset.
    async fn to_last_committed(&mut self) -> LogResult<()>;

    /// Move one partition so the next read returns the record at `offset`.
    async fn seek(&mut self, offset: &LogOffset) -> LogResult<()>;

    /// Commit the start position of every assigned partition and move there.
    async fn reset(&mut self) -> LogResult<()>;

    /// The first offset whose record watermark is at or after `timestamp_ms`,
    /// or `None` when no such record exists.
    async fn offset_for_timestamp(&mut self, partition: &LogPartition, timestamp_ms: i64) -> LogResult<Option<LogOffset>>;

    /// Move every assigned partition to the first record at or after
    /// `timestamp_ms`, or to its end when there is none.
    async fn seek_to_timestamp(&mut self, timestamp_ms: i64) -> LogResult<()>;

    /// Release the partitions. Further reads fail with [`LogError::Closed`].
    async fn close(&mut self) -> LogResult<()>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_fnv1a_known_values() {
        // FNV-1a 32-bit reference vectors
        let hash = |s: &str| {
            s.as_bytes()
                .iter()
                .fold(FNV_OFFSET_BASIS, |h, b| (h ^ u32::from(*b)).wrapping_mul(FNV_PRIME))
        };
        assert_eq!(hash(""), 0x811c_9dc5);
        assert_eq!(hash("a"), 0xe40c_292c);
        assert_eq!(hash("foobar"), 0xbf9c_f968);
    }

    #[test]
    fn test_single_partition() {
        assert_eq!(partition_for_key("anything", 1), 0);
        assert_eq!(partition_for_key("anything", 0), 0);
    }

    #[test]
    fn test_keys_spread_over_partitions() {
        let mut seen = [false; 4];
        for i in 0..100 {
            seen[partition_for_key(&format!("key{i}"), 4) as usize] = true;
        }
        assert!(seen.iter().all(|s| *s));
    }

    proptest! {
        #[test]
        fn test_partition_in_range_and_stable(key in ".{0,32}", partitions in 1u32..64) {
            let p = partition_for_key(&key, partitions);
            prop_assert!(p < partitions);
            prop_assert_eq!(p, partition_for_key(&key, partitions));
        }
    }
}
