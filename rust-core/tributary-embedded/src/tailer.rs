// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Tailer of the embedded backend.
//
// Each assigned partition gets a segment cursor, opened lazily at the
// tailer's position and dropped whenever the position is moved. A read polls
// the cursors once on the blocking pool, then waits for an in-process append,
// the manager closing, the poll interval or the deadline, whichever comes
// first, and polls again.

use std::path::PathBuf;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::watch;
use tokio::time::Instant;
use tracing::{debug, info};

use tributary_log::{
    CloseSignal, LogError, LogOffset, LogPartition, LogRecord, LogResult, LogTailer, Name, ReadPositions, Record,
    Reservation,
};
use tributary_segment::{end_offset, start_offset, SegmentCursor, SegmentEntry};

use crate::layout::{blocking, read_committed, storage_error, write_committed};

pub struct EmbeddedTailer {
    group: Name,
    positions: ReadPositions,
    dirs: Vec<PathBuf>,
    cursors: Vec<Option<SegmentCursor>>,
    close: CloseSignal,
    closed: bool,
    reservation: Reservation,
    appends: watch::Receiver<u64>,
    poll_interval: Duration,
}

/// Where a repositioning moves each partition.
#[derive(Clone, Copy)]
enum Target {
    Start,
    End,
    Committed,
}

impl EmbeddedTailer {
    pub(crate) fn new(
        group: Name,
        positions: ReadPositions,
        dirs: Vec<PathBuf>,
        close: CloseSignal,
        reservation: Reservation,
        appends: watch::Receiver<u64>,
        poll_interval: Duration,
    ) -> Self {
        let cursors = dirs.iter().map(|_| None).collect();
        Self {
            group,
            positions,
            dirs,
            cursors,
            close,
            closed: false,
            reservation,
            appends,
            poll_interval,
        }
    }

    fn ensure_open(&self) -> LogResult<()> {
        if self.closed {
            return Err(LogError::Closed);
        }
        self.close.ensure_open()
    }

    /// Try every partition once, in round-robin order.
    async fn poll_once(&mut self) -> LogResult<Option<(usize, SegmentEntry)>> {
        let order: Vec<(usize, u64)> = self
            .positions
            .poll_order()
            .map(|index| (index, self.positions.position(index)))
            .collect();
        let dirs = self.dirs.clone();
        // Leave empty slots behind while the cursors are on the blocking
        // pool: if this future is dropped they reopen from `positions`.
        let empty = dirs.iter().map(|_| None).collect();
        let mut cursors = std::mem::replace(&mut self.cursors, empty);

        let outcome = tokio::task::spawn_blocking(move || {
            let result = poll_cursors(&dirs, &mut cursors, &order);
            (cursors, result)
        })
        .await;

        match outcome {
            Ok((cursors, result)) => {
                self.cursors = cursors;
                result
            }
            Err(e) => Err(LogError::fatal(format!("task join: {e}"))),
        }
    }

    /// Move every partition and drop the cursors.
    async fn reposition(&mut self, target: Target) -> LogResult<()> {
        self.ensure_open()?;
        let dirs = self.dirs.clone();
        let group = self.group.clone();
        let offsets = blocking(move || {
            dirs.iter()
                .map(|dir| match target {
                    Target::Start => start_offset(dir).map_err(storage_error),
                    Target::End => end_offset(dir).map_err(storage_error),
                    Target::Committed => match read_committed(dir, &group)? {
                        Some(offset) => Ok(offset),
                        None => start_offset(dir).map_err(storage_error),
                    },
                })
                .collect::<LogResult<Vec<u64>>>()
        })
        .await?;
        for (index, offset) in offsets.into_iter().enumerate() {
            self.positions.set_position(index, offset);
            self.cursors[index] = None;
        }
        Ok(())
    }

    async fn persist(&self, commits: Vec<(usize, u64)>) -> LogResult<()> {
        let targets: Vec<(PathBuf, u64)> = commits
            .iter()
            .map(|(index, offset)| (self.dirs[*index].clone(), *offset))
            .collect();
        let group = self.group.clone();
        blocking(move || {
            for (dir, offset) in &targets {
                write_committed(dir, &group, *offset)?;
            }
            Ok(())
        })
        .await
    }
}

fn poll_cursors(
    dirs: &[PathBuf],
    cursors: &mut [Option<SegmentCursor>],
    order: &[(usize, u64)],
) -> LogResult<Option<(usize, SegmentEntry)>> {
    for &(index, position) in order {
        if cursors[index].is_none() {
            let mut cursor = SegmentCursor::open(&dirs[index]).map_err(storage_error)?;
            cursor.seek(position).map_err(storage_error)?;
            cursors[index] = Some(cursor);
        }
        let Some(cursor) = cursors[index].as_mut() else {
            continue;
        };
        if let Some(entry) = cursor.next().map_err(storage_error)? {
            return Ok(Some((index, entry)));
        }
    }
    Ok(None)
}

fn to_record(entry: SegmentEntry) -> Record {
    Record {
        key: entry.key,
        data: entry.data,
        watermark: entry.watermark,
        headers: entry.headers,
    }
}

#[async_trait]
impl LogTailer for EmbeddedTailer {
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
            // Mark appends seen before polling so none slips between the two.
            self.appends.borrow_and_update();
            if let Some((index, entry)) = self.poll_once().await? {
                let offset = self.positions.advance(index, entry.offset);
                return Ok(Some(LogRecord::new(to_record(entry), offset)));
            }

            let now = Instant::now();
            if now >= deadline {
                return Ok(None);
            }
            let wait = (deadline - now).min(self.poll_interval);
            tokio::select! {
                changed = self.appends.changed() => {
                    if changed.is_err() {
                        tokio::time::sleep(wait).await;
                    }
                }
                _ = self.close.closed() => return Err(LogError::Closed),
                _ = tokio::time::sleep(wait) => {}
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
        if let Err(error) = self.persist(pending.clone()).await {
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
        if let Err(error) = self.persist(vec![(index, offset)]).await {
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
        self.positions.set_position(index, offset.offset);
        self.cursors[index] = None;
        Ok(())
    }

    async fn reset(&mut self) -> LogResult<()> {
        self.reposition(Target::Start).await?;
        let starts: Vec<(usize, u64)> = (0..self.positions.len())
            .map(|index| (index, self.positions.position(index)))
            .collect();
        self.persist(starts).await?;
        info!(group = %self.group, partitions = self.positions.len(), "Reset consumer positions");
        Ok(())
    }

    async fn offset_for_timestamp(&mut self, _partition: &LogPartition, _timestamp_ms: i64) -> LogResult<Option<LogOffset>> {
        self.ensure_open()?;
        Err(LogError::Unsupported("the embedded backend cannot look up offsets by timestamp".into()))
    }

    async fn seek_to_timestamp(&mut self, _timestamp_ms: i64) -> LogResult<()> {
        self.ensure_open()?;
        Err(LogError::Unsupported("the embedded backend cannot seek by timestamp".into()))
    }

    async fn close(&mut self) -> LogResult<()> {
        if !self.closed {
            self.closed = true;
            self.reservation.release();
            self.cursors.iter_mut().for_each(|cursor| *cursor = None);
            debug!(group = %self.group, "Closed tailer");
        }
        Ok(())
    }
}
