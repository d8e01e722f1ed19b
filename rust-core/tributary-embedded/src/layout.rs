// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// On-disk layout of the embedded backend.
//
//   {base_dir}/{log_id}/metadata.json
//   {base_dir}/{log_id}/P-{nn}/seg-{start:016}.log
//   {base_dir}/{log_id}/P-{nn}/offsets/{group_id}.json
//
// A log exists once its metadata file exists, so metadata is written last
// on creation. Metadata and offset files are replaced atomically.
//
// Everything here is blocking and runs on the blocking pool.

use std::collections::BTreeSet;
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::warn;
use uuid::Uuid;

use tributary_log::{LogError, LogResult, Name};
use tributary_segment::SegmentError;

pub const METADATA_FILE: &str = "metadata.json";
pub const OFFSETS_DIR: &str = "offsets";

/// Contents of `metadata.json`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogMetadata {
    pub name: Name,
    pub partitions: u32,
    pub created: DateTime<Utc>,
}

/// Contents of an offsets file: the next offset `group` will read.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroupOffset {
    pub group: Name,
    pub offset: u64,
}

pub fn log_dir(base: &Path, name: &Name) -> PathBuf {
    base.join(name.id())
}

pub fn partition_dir(log_dir: &Path, partition: u32) -> PathBuf {
    log_dir.join(format!("P-{partition:02}"))
}

pub fn offset_path(partition_dir: &Path, group: &Name) -> PathBuf {
    partition_dir.join(OFFSETS_DIR).join(format!("{}.json", group.id()))
}

pub fn read_metadata(log_dir: &Path) -> LogResult<Option<LogMetadata>> {
    let path = log_dir.join(METADATA_FILE);
    let bytes = match fs::read(&path) {
        Ok(bytes) => bytes,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(e.into()),
    };
    serde_json::from_slice(&bytes)
        .map(Some)
        .map_err(|e| LogError::Corrupted(format!("{}: {e}", path.display())))
}

/// Create the directory tree of a new log and then its metadata.
pub fn create_log(log_dir: &Path, metadata: &LogMetadata) -> LogResult<()> {
    for partition in 0..metadata.partitions {
        fs::create_dir_all(partition_dir(log_dir, partition).join(OFFSETS_DIR))?;
    }
    let bytes = serde_json::to_vec_pretty(metadata).map_err(|e| LogError::fatal(e.to_string()))?;
    write_durably(&log_dir.join(METADATA_FILE), &bytes)?;
    Ok(())
}

/// Every log under `base`, skipping directories without readable metadata.
pub fn list_logs(base: &Path) -> LogResult<Vec<Name>> {
    let entries = match fs::read_dir(base) {
        Ok(entries) => entries,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => return Err(e.into()),
    };
    let mut names = Vec::new();
    for entry in entries {
        let path = entry?.path();
        if !path.is_dir() {
            continue;
        }
        match read_metadata(&path) {
            Ok(Some(metadata)) => names.push(metadata.name),
            Ok(None) => {}
            Err(error) => warn!(dir = %path.display(), error = %error, "Skipping log with unreadable metadata"),
        }
    }
    names.sort();
    Ok(names)
}

pub fn read_committed(partition_dir: &Path, group: &Name) -> LogResult<Option<u64>> {
    let path = offset_path(partition_dir, group);
    let bytes = match fs::read(&path) {
        Ok(bytes) => bytes,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(e.into()),
    };
    let stored: GroupOffset =
        serde_json::from_slice(&bytes).map_err(|e| LogError::Corrupted(format!("{}: {e}", path.display())))?;
    Ok(Some(stored.offset))
}

pub fn write_committed(partition_dir: &Path, group: &Name, offset: u64) -> LogResult<()> {
    let path = offset_path(partition_dir, group);
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let stored = GroupOffset {
        group: group.clone(),
        offset,
    };
    let bytes = serde_json::to_vec(&stored).map_err(|e| LogError::fatal(e.to_string()))?;
    write_durably(&path, &bytes)?;
    Ok(())
}

/// Groups that committed on any of the first `partitions` partitions.
pub fn list_groups(log_dir: &Path, partitions: u32) -> LogResult<Vec<Name>> {
    let mut groups = BTreeSet::new();
    for partition in 0..partitions {
        let dir = partition_dir(log_dir, partition).join(OFFSETS_DIR);
        let entries = match fs::read_dir(&dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == io::ErrorKind::NotFound => continue,
            Err(e) => return Err(e.into()),
        };
        for entry in entries {
            let path = entry?.path();
            if path.extension().and_then(|e| e.to_str()) != Some("json") {
                continue;
            }
            match fs::read(&path)
                .map_err(|e| e.to_string())
                .and_then(|bytes| serde_json::from_slice::<GroupOffset>(&bytes).map_err(|e| e.to_string()))
            {
                Ok(stored) => {
                    groups.insert(stored.group);
                }
                Err(error) => warn!(file = %path.display(), error = %error, "Skipping unreadable offsets file"),
            }
        }
    }
    Ok(groups.into_iter().collect())
}

/// Map segment engine failures onto the log error taxonomy.
pub fn storage_error(error: SegmentError) -> LogError {
    match error {
        SegmentError::Io(e) => LogError::Io(e),
        SegmentError::DirectoryNotFound(dir) => LogError::Corrupted(format!("missing partition directory {dir}")),
        other => LogError::Corrupted(other.to_string()),
    }
}

/// Run blocking filesystem work off the async runtime.
pub async fn blocking<T, F>(work: F) -> LogResult<T>
where
    F: FnOnce() -> LogResult<T> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(work)
        .await
        .map_err(|e| LogError::fatal(format!("task join: {e}")))?
}

fn write_durably(path: &Path, bytes: &[u8]) -> io::Result<()> {
    let tmp = path.with_extension(format!("{}.tmp", Uuid::new_v4().simple()));
    {
        let mut file = fs::File::create(&tmp)?;
        file.write_all(bytes)?;
        file.sync_all()?;
    }
    fs::rename(&tmp, path)?;
    if let Some(parent) = path.parent() {
        if let Ok(dir) = fs::File::open(parent) {
            // Not every platform can fsync a directory handle.
            let _ = dir.sync_all();
        }
    }
    Ok(())
}
