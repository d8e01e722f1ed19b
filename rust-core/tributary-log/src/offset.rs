// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Partitions, offsets, read results and consumer lag.

use std::fmt;
use std::iter::Sum;

use serde::{Deserialize, Serialize};

use crate::name::Name;

/// One partition of a named log.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct LogPartition {
    pub name: Name,
    pub partition: u32,
}

impl LogPartition {
    pub fn of(name: Name, partition: u32) -> Self {
        Self { name, partition }
    }

    /// The offset at `offset` within this partition.
    pub fn at(&self, offset: u64) -> LogOffset {
        LogOffset::of(self.clone(), offset)
    }
}

impl fmt::Display for LogPartition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.name, self.partition)
    }
}

/// A position within a partition. Ordered by partition then offset.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct LogOffset {
    pub partition: LogPartition,
    pub offset: u64,
}

impl LogOffset {
    pub fn of(partition: LogPartition, offset: u64) -> Self {
        Self { partition, offset }
    }

    /// The offset of the record that follows this one.
    pub fn next(&self) -> Self {
        Self {
            partition: self.partition.clone(),
            offset: self.offset + 1,
        }
    }
}

impl fmt::Display for LogOffset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:+{}", self.partition, self.offset)
    }
}

/// A message read from a log together with its position.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogRecord<M> {
    pub message: M,
    pub offset: LogOffset,
}

impl<M> LogRecord<M> {
    pub fn new(message: M, offset: LogOffset) -> Self {
        Self { message, offset }
    }

    pub fn map<N>(self, f: impl FnOnce(M) -> N) -> LogRecord<N> {
        LogRecord {
            message: f(self.message),
            offset: self.offset,
        }
    }
}

/// How far a consumer group is behind the end of a log.
///
/// `lower` is the position the group will read next (its committed offset,
/// or the first available offset when it never committed), `upper` is the
/// end offset of the partition and `lag` their difference.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogLag {
    pub lower: u64,
    pub upper: u64,
    pub lag: u64,
}

impl LogLag {
    /// A lag without position information.
    pub fn of(lag: u64) -> Self {
        Self { lower: 0, upper: lag, lag }
    }

    /// The lag between a consumer position and an end offset.
    pub fn of_range(lower: u64, upper: u64) -> Self {
        let lower = lower.min(upper);
        Self {
            lower,
            upper,
            lag: upper - lower,
        }
    }
}

impl Sum for LogLag {
    fn sum<I: Iterator<Item = LogLag>>(iter: I) -> Self {
        iter.fold(LogLag::default(), |acc, lag| LogLag {
            lower: acc.lower + lag.lower,
            upper: acc.upper + lag.upper,
            lag: acc.lag + lag.lag,
        })
    }
}

impl fmt::Display for LogLag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "lag {} ({}..{})", self.lag, self.lower, self.upper)
    }
}

/// How far behind in time a consumer group is on a partition.
///
/// `lower_ms` is the watermark timestamp of the last record the group
/// committed, `upper_ms` the time of the report and `latency_ms` their
/// difference. A partition the group has fully consumed or never committed
/// on has no latency and no `key`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogLatency {
    pub lag: LogLag,
    pub lower_ms: i64,
    pub upper_ms: i64,
    pub latency_ms: i64,
    /// Key of the last committed record.
    pub key: Option<String>,
}

impl LogLatency {
    /// The latency of a group whose last committed record is `key`, stamped
    /// `lower_ms`.
    pub fn of(lag: LogLag, lower_ms: i64, upper_ms: i64, key: impl Into<String>) -> Self {
        Self {
            lag,
            lower_ms,
            upper_ms,
            latency_ms: upper_ms.saturating_sub(lower_ms).max(0),
            key: Some(key.into()),
        }
    }

    /// A partition with lag only.
    pub fn none(lag: LogLag, upper_ms: i64) -> Self {
        Self {
            lag,
            upper_ms,
            ..Self::default()
        }
    }

    /// Lags summed, latency and key of the partition furthest behind.
    pub fn merge(latencies: impl IntoIterator<Item = LogLatency>) -> Self {
        let mut lags = Vec::new();
        let mut upper_ms = 0;
        let mut oldest: Option<LogLatency> = None;
        for latency in latencies {
            lags.push(latency.lag);
            upper_ms = upper_ms.max(latency.upper_ms);
            if latency.key.is_some() && oldest.as_ref().map_or(true, |o| latency.lower_ms < o.lower_ms) {
                oldest = Some(latency);
            }
        }
        let lag = lags.into_iter().sum();
        match oldest {
            Some(LogLatency { lower_ms, key: Some(key), .. }) => Self::of(lag, lower_ms, upper_ms, key),
            _ => Self::none(lag, upper_ms),
        }
    }
}

impl fmt::Display for LogLatency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.key {
            Some(key) => write!(f, "latency {}ms at key '{}', {}", self.latency_ms, key, self.lag),
            None => write!(f, "no latency, {}", self.lag),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn partition(n: u32) -> LogPartition {
        LogPartition::of(Name::of_urn("test/events").unwrap(), n)
    }

    #[test]
    fn test_offset_ordering() {
        let a = partition(0).at(10);
        let b = partition(0).at(11);
        let c = partition(1).at(0);
        assert!(a < b);
        assert!(b < c);
        assert_eq!(a.next(), b);
    }

    #[test]
    fn test_lag() {
        assert_eq!(LogLag::of(5), LogLag { lower: 0, upper: 5, lag: 5 });
        assert_eq!(LogLag::of_range(2, 50).lag, 48);
        assert_eq!(LogLag::of_range(50, 50).lag, 0);
        // a stale position past the end never underflows
        assert_eq!(LogLag::of_range(60, 50).lag, 0);
    }

    #[test]
    fn test_lag_sum() {
        let total: LogLag = vec![LogLag::of_range(1, 4), LogLag::of_range(0, 10)].into_iter().sum();
        assert_eq!(total, LogLag { lower: 1, upper: 14, lag: 13 });
    }

    #[test]
    fn test_display() {
        assert_eq!(partition(3).at(7).to_string(), "test/events:3:+7");
    }

    #[test]
    fn test_log_record_map() {
        let record = LogRecord::new(21u32, partition(0).at(4));
        let doubled = record.map(|v| v * 2);
        assert_eq!(doubled.message, 42);
        assert_eq!(doubled.offset.offset, 4);
    }

    #[test]
    fn test_latency_merge_keeps_oldest() {
        let p0 = LogLatency::of(LogLag::of_range(2, 3), 1_000, 5_000, "here");
        let p1 = LogLatency::none(LogLag::of_range(2, 2), 5_000);
        let p2 = LogLatency::of(LogLag::of_range(1, 2), 4_000, 6_000, "later");
        assert_eq!(p0.latency_ms, 4_000);

        let total = LogLatency::merge(vec![p0, p1, p2]);
        assert_eq!(total.lag.lag, 2);
        assert_eq!(total.key.as_deref(), Some("here"));
        assert_eq!((total.lower_ms, total.upper_ms, total.latency_ms), (1_000, 6_000, 5_000));
    }

    #[test]
    fn test_latency_without_commits() {
        let total = LogLatency::merge(vec![LogLatency::none(LogLag::of(3), 9), LogLatency::none(LogLag::of(0), 7)]);
        assert_eq!(total, LogLatency::none(LogLag { lower: 0, upper: 3, lag: 3 }, 9));
        assert_eq!(total.to_string(), "no latency, lag 3 (0..3)");
        // a watermark ahead of the clock never reports negative latency
        assert_eq!(LogLatency::of(LogLag::of(1), 10, 5, "k").latency_ms, 0);
    }
}
