// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Appender of the embedded backend: one segment writer per partition,
// driven on the blocking pool.

use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use tokio::sync::watch;
use tracing::debug;

use tributary_log::{CloseSignal, LogAppender, LogError, LogOffset, LogPartition, LogResult, Name, Record};
use tributary_segment::{SegmentEntry, SegmentWriter};

use crate::config::EmbeddedConfig;
use crate::layout::{blocking, partition_dir, read_committed, storage_error};

pub struct EmbeddedAppender {
    name: Name,
    log_dir: PathBuf,
    writers: Vec<Arc<Mutex<SegmentWriter>>>,
    close: CloseSignal,
    appends: Arc<watch::Sender<u64>>,
}

impl EmbeddedAppender {
    /// Open a writer on every partition of the log.
    pub(crate) async fn open(
        name: Name,
        log_dir: PathBuf,
        partitions: u32,
        config: &EmbeddedConfig,
        close: CloseSignal,
        appends: Arc<watch::Sender<u64>>,
    ) -> LogResult<Self> {
        let dir = log_dir.clone();
        let sync_mode = config.sync_mode;
        let max_segment_size = config.max_segment_size;
        let writers = blocking(move || {
            (0..partitions)
                .map(|p| {
                    SegmentWriter::open_with_max_size(partition_dir(&dir, p), sync_mode, max_segment_size)
                        .map(|writer| Arc::new(Mutex::new(writer)))
                        .map_err(storage_error)
                })
                .collect::<LogResult<Vec<_>>>()
        })
        .await?;
        debug!(log = %name, partitions, "Opened appender");
        Ok(Self {
            name,
            log_dir,
            writers,
            close,
            appends,
        })
    }

    fn check_partition(&self, partition: u32) -> LogResult<usize> {
        let index = partition as usize;
        if index >= self.writers.len() {
            return Err(LogError::InvalidPartition {
                name: self.name.clone(),
                partition,
                size: self.size(),
            });
        }
        Ok(index)
    }
}

#[async_trait]
impl LogAppender for EmbeddedAppender {
    fn name(&self) -> &Name {
        &self.name
    }

    fn size(&self) -> u32 {
        self.writers.len() as u32
    }

    fn closed(&self) -> bool {
        self.close.is_closed()
    }

    async fn append_to(&self, partition: u32, record: Record) -> LogResult<LogOffset> {
        self.close.ensure_open()?;
        let index = self.check_partition(partition)?;
        let writer = Arc::clone(&self.writers[index]);
        let entry = SegmentEntry {
            offset: 0,
            watermark: record.watermark,
            key: record.key,
            headers: record.headers,
            data: record.data,
        };
        let offset = blocking(move || {
            let mut writer = writer
                .lock()
                .map_err(|_| LogError::fatal("segment writer lock poisoned"))?;
            writer.append(entry).map_err(storage_error)
        })
        .await?;
        self.appends.send_modify(|count| *count = count.wrapping_add(1));
        Ok(LogPartition::of(self.name.clone(), partition).at(offset))
    }

    async fn committed_offset(&self, group: &Name, partition: u32) -> LogResult<Option<u64>> {
        self.close.ensure_open()?;
        self.check_partition(partition)?;
        let dir = partition_dir(&self.log_dir, partition);
        let group = group.clone();
        blocking(move || read_committed(&dir, &group)).await
    }
}
