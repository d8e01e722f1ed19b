// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// In-memory read positions of a tailer.
//
// Backends keep the actual data; this tracks, per assigned partition, the
// next offset to read and the position waiting to be committed, and decides
// the round-robin order in which partitions are polled.

use std::collections::BTreeMap;

use crate::error::{LogError, LogResult};
use crate::offset::{LogOffset, LogPartition};

#[derive(Debug, Clone)]
pub struct ReadPositions {
    assignments: Vec<LogPartition>,
    next: Vec<u64>,
    pending: BTreeMap<usize, u64>,
    cursor: usize,
}

impl ReadPositions {
    /// Start every partition at the given offset.
    pub fn new(assignments: Vec<LogPartition>, start: Vec<u64>) -> LogResult<Self> {
        if assignments.is_empty() {
            return Err(LogError::Configuration("a tailer needs at least one partition".into()));
        }
        if assignments.len() != start.len() {
            return Err(LogError::Configuration(format!(
                "{} partitions but {} start offsets",
                assignments.len(),
                start.len()
            )));
        }
        Ok(Self {
            assignments,
            next: start,
            pending: BTreeMap::new(),
            cursor: 0,
        })
    }

    pub fn assignments(&self) -> &[LogPartition] {
        &self.assignments
    }

    pub fn len(&self) -> usize {
        self.assignments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.assignments.is_empty()
    }

    /// Index of an assigned partition.
    pub fn index_of(&self, partition: &LogPartition) -> LogResult<usize> {
        self.assignments
            .iter()
            .position(|p| p == partition)
            .ok_or_else(|| LogError::NotAssigned(partition.clone()))
    }

    /// The next offset to read on the partition at `index`.
    pub fn position(&self, index: usize) -> u64 {
        self.next[index]
    }

    pub fn partition(&self, index: usize) -> &LogPartition {
        &self.assignments[index]
    }

    /// Partition indices in polling order, starting after the partition that
    /// produced the previous record.
    pub fn poll_order(&self) -> impl Iterator<Item = usize> + '_ {
        let n = self.assignments.len();
        (0..n).map(move |i| (self.cursor + i) % n)
    }

    /// Record that the entry at `offset` on `index` was returned to the caller.
    pub fn advance(&mut self, index: usize, offset: u64) -> LogOffset {
        self.next[index] = offset + 1;
        self.pending.insert(index, offset + 1);
        self.cursor = (index + 1) % self.assignments.len();
        self.assignments[index].at(offset)
    }

    /// Move one partition without marking anything for commit.
    pub fn set_position(&mut self, index: usize, offset: u64) {
        self.next[index] = offset;
        self.pending.remove(&index);
    }

    /// Take every pending commit position.
    pub fn take_pending(&mut self) -> Vec<(usize, u64)> {
        std::mem::take(&mut self.pending).into_iter().collect()
    }

    /// Take the pending commit position of one partition.
    pub fn take_pending_for(&mut self, index: usize) -> Option<u64> {
        self.pending.remove(&index)
    }

    /// Put commit positions back after a failed commit.
    pub fn restore_pending(&mut self, pending: impl IntoIterator<Item = (usize, u64)>) {
        for (index, offset) in pending {
            self.pending.entry(index).or_insert(offset);
        }
    }
}
