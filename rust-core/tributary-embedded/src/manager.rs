// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// `LogManager` over a local directory.

use std::collections::HashMap;
use std::fs;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::watch;
use tracing::{debug, info};

use tributary_log::{
    CloseSignal, LogAppender, LogError, LogLag, LogManager, LogPartition, LogResult, LogTailer, Name, ReadPositions,
    TailerReservations,
};
use tributary_segment::{end_offset, start_offset};

use crate::appender::EmbeddedAppender;
use crate::config::EmbeddedConfig;
use crate::layout::{
    blocking, create_log, list_groups, list_logs, log_dir, partition_dir, read_committed, read_metadata,
    storage_error, LogMetadata,
};
use crate::tailer::EmbeddedTailer;

/// Logs stored as directories under [`EmbeddedConfig::base_dir`].
///
/// Meant for a single process: appends are serialised per partition within
/// one manager, and only one manager may append to a log at a time. Tailers
/// of other managers see appends through the poll interval.
pub struct EmbeddedLogManager {
    config: EmbeddedConfig,
    close: CloseSignal,
    reservations: TailerReservations,
    appenders: Mutex<HashMap<Name, Arc<EmbeddedAppender>>>,
    appends: Arc<watch::Sender<u64>>,
}

impl EmbeddedLogManager {
    /// Open the base directory, creating it if needed.
    pub async fn open(config: EmbeddedConfig) -> LogResult<Self> {
        let base = config.base_dir.clone();
        blocking(move || fs::create_dir_all(&base).map_err(LogError::from)).await?;
        info!(base_dir = %config.base_dir.display(), sync_mode = %config.sync_mode, "Opened embedded log manager");
        let (appends, _) = watch::channel(0u64);
        Ok(Self {
            config,
            close: CloseSignal::new(),
            reservations: TailerReservations::new(),
            appenders: Mutex::new(HashMap::new()),
            appends: Arc::new(appends),
        })
    }

    pub fn config(&self) -> &EmbeddedConfig {
        &self.config
    }

    fn log_dir(&self, name: &Name) -> PathBuf {
        log_dir(&self.config.base_dir, name)
    }

    async fn metadata(&self, name: &Name) -> LogResult<LogMetadata> {
        let dir = self.log_dir(name);
        blocking(move || read_metadata(&dir))
            .await?
            .ok_or_else(|| LogError::NotFound(name.clone()))
    }

    fn cached_appender(&self, name: &Name) -> LogResult<Option<Arc<EmbeddedAppender>>> {
        let appenders = self.appenders.lock().map_err(|_| poisoned())?;
        Ok(appenders.get(name).cloned())
    }
}

fn poisoned() -> LogError {
    LogError::fatal("appender cache lock poisoned")
}

#[async_trait]
impl LogManager for EmbeddedLogManager {
    async fn exists(&self, name: &Name) -> LogResult<bool> {
        self.close.ensure_open()?;
        let dir = self.log_dir(name);
        Ok(blocking(move || read_metadata(&dir)).await?.is_some())
    }

    async fn size(&self, name: &Name) -> LogResult<u32> {
        self.close.ensure_open()?;
        Ok(self.metadata(name).await?.partitions)
    }

    async fn create_if_not_exists(&self, name: &Name, partitions: u32) -> LogResult<bool> {
        self.close.ensure_open()?;
        if partitions == 0 {
            return Err(LogError::Configuration(format!("log {name} needs at least one partition")));
        }
        let dir = self.log_dir(name);
        let log = name.clone();
        let created = blocking(move || {
            if let Some(existing) = read_metadata(&dir)? {
                if existing.partitions != partitions {
                    return Err(LogError::Configuration(format!(
                        "log {log} exists with {} partitions, not {partitions}",
                        existing.partitions
                    )));
                }
                return Ok(false);
            }
            create_log(
                &dir,
                &LogMetadata {
                    name: log,
                    partitions,
                    created: Utc::now(),
                },
            )?;
            Ok(true)
        })
        .await?;
        if created {
            info!(log = %name, partitions, "Created log");
        }
        Ok(created)
    }

    async fn delete(&self, name: &Name) -> LogResult<bool> {
        self.close.ensure_open()?;
        self.appenders.lock().map_err(|_| poisoned())?.remove(name);
        let dir = self.log_dir(name);
        let deleted = blocking(move || {
            if read_metadata(&dir)?.is_none() {
                return Ok(false);
            }
            fs::remove_dir_all(&dir)?;
            Ok(true)
        })
        .await?;
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
        let metadata = self.metadata(name).await?;
        let appender = EmbeddedAppender::open(
            name.clone(),
            self.log_dir(name),
            metadata.partitions,
            &self.config,
            self.close.clone(),
            Arc::clone(&self.appends),
        )
        .await?;
        let mut appenders = self.appenders.lock().map_err(|_| poisoned())?;
        // A concurrent caller may have won the race; keep its writers.
        let appender = appenders
            .entry(name.clone())
            .or_insert_with(|| Arc::new(appender))
            .clone();
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
                    let size = self.metadata(&partition.name).await?.partitions;
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
        let dirs: Vec<PathBuf> = partitions
            .iter()
            .map(|p| partition_dir(&self.log_dir(&p.name), p.partition))
            .collect();

        let start_dirs = dirs.clone();
        let start_group = group.clone();
        let starts = blocking(move || {
            start_dirs
                .iter()
                .map(|dir| match read_committed(dir, &start_group)? {
                    Some(offset) => Ok(offset),
                    None => start_offset(dir).map_err(storage_error),
                })
                .collect::<LogResult<Vec<u64>>>()
        })
        .await?;

        let positions = ReadPositions::new(partitions.to_vec(), starts)?;
        debug!(group = %group, partitions = partitions.len(), "Created tailer");
        Ok(Box::new(EmbeddedTailer::new(
            group.clone(),
            positions,
            dirs,
            self.close.clone(),
            reservation,
            self.appends.subscribe(),
            self.config.poll_interval,
        )))
    }

    async fn list_all(&self) -> LogResult<Vec<Name>> {
        self.close.ensure_open()?;
        let base = self.config.base_dir.clone();
        blocking(move || list_logs(&base)).await
    }

    async fn list_consumer_groups(&self, name: &Name) -> LogResult<Vec<Name>> {
        self.close.ensure_open()?;
        let partitions = self.metadata(name).await?.partitions;
        let dir = self.log_dir(name);
        blocking(move || list_groups(&dir, partitions)).await
    }

    async fn get_lag_per_partition(&self, name: &Name, group: &Name) -> LogResult<Vec<LogLag>> {
        self.close.ensure_open()?;
        let partitions = self.metadata(name).await?.partitions;
        let dir = self.log_dir(name);
        let group = group.clone();
        blocking(move || {
            (0..partitions)
                .map(|p| {
                    let pdir = partition_dir(&dir, p);
                    let upper = end_offset(&pdir).map_err(storage_error)?;
                    let lower = match read_committed(&pdir, &group)? {
                        Some(offset) => offset,
                        None => start_offset(&pdir).map_err(storage_error)?,
                    };
                    Ok(LogLag::of_range(lower, upper))
                })
                .collect::<LogResult<Vec<LogLag>>>()
        })
        .await
    }

    fn supports_timestamp_seek(&self) -> bool {
        false
    }

    async fn close(&self) -> LogResult<()> {
        if self.close.close() {
            let released = {
                let mut appenders = self.appenders.lock().map_err(|_| poisoned())?;
                let count = appenders.len();
                appenders.clear();
                count
            };
            info!(base_dir = %self.config.base_dir.display(), appenders = released, "Closed embedded log manager");
        }
        Ok(())
    }
}
