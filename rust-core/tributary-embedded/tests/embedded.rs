// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Behaviour specific to the directory-backed backend: what lands on disk,
// what survives a restart, and what another manager on the same directory
// can see.

use std::io::Write;
use std::time::Duration;

use tempfile::TempDir;

use tributary_embedded::layout::{log_dir, offset_path, partition_dir, METADATA_FILE};
use tributary_embedded::{EmbeddedConfig, EmbeddedLogManager};
use tributary_log::{LogError, LogManager, LogPartition, Name, Record};
use tributary_segment::{SegmentEntry, SyncMode};

fn name(urn: &str) -> Name {
    Name::of_urn(urn).unwrap()
}

fn config(dir: &TempDir) -> EmbeddedConfig {
    EmbeddedConfig {
        sync_mode: SyncMode::Fsync,
        poll_interval: Duration::from_millis(10),
        ..EmbeddedConfig::new(dir.path())
    }
}

#[tokio::test]
async fn test_layout_on_disk() {
    let dir = TempDir::new().unwrap();
    let manager = EmbeddedLogManager::open(config(&dir)).await.unwrap();
    let log = name("test/myLog");
    let group = name("test/aGroup");
    assert!(manager.create_if_not_exists(&log, 2).await.unwrap());

    let appender = manager.get_appender(&log).await.unwrap();
    appender.append_to(1, Record::of("k", b"v".to_vec())).await.unwrap();
    let mut tailer = manager.create_tailer(&group, &log).await.unwrap();
    tailer.read(Duration::from_secs(1)).await.unwrap().unwrap();
    tailer.commit().await.unwrap();

    let root = log_dir(dir.path(), &log);
    assert!(root.join(METADATA_FILE).is_file());
    let p1 = partition_dir(&root, 1);
    assert!(p1.join("seg-0000000000000000.log").is_file());
    let stored: serde_json::Value =
        serde_json::from_slice(&std::fs::read(offset_path(&p1, &group)).unwrap()).unwrap();
    assert_eq!(stored["group"], "test/aGroup");
    assert_eq!(stored["offset"], 1);
}

#[tokio::test]
async fn test_positions_survive_restart() {
    let dir = TempDir::new().unwrap();
    let log = name("test/restart");
    let group = name("test/aGroup");
    {
        let manager = EmbeddedLogManager::open(config(&dir)).await.unwrap();
        manager.create_if_not_exists(&log, 1).await.unwrap();
        let appender = manager.get_appender(&log).await.unwrap();
        for i in 0..5 {
            appender.append("k", Record::of("k", format!("m{i}").into_bytes())).await.unwrap();
        }
        let mut tailer = manager.create_tailer(&group, &log).await.unwrap();
        for _ in 0..3 {
            tailer.read(Duration::from_secs(1)).await.unwrap().unwrap();
        }
        tailer.commit().await.unwrap();
        manager.close().await.unwrap();
    }

    let manager = EmbeddedLogManager::open(config(&dir)).await.unwrap();
    assert!(!manager.create_if_not_exists(&log, 1).await.unwrap());
    let mut tailer = manager.create_tailer(&group, &log).await.unwrap();
    let next = tailer.read(Duration::from_secs(1)).await.unwrap().unwrap();
    assert_eq!(next.offset.offset, 3);
    assert_eq!(next.message.data, b"m3");

    let appender = manager.get_appender(&log).await.unwrap();
    let offset = appender.append("k", Record::of("k", b"m5".to_vec())).await.unwrap();
    assert_eq!(offset.offset, 5);
    assert_eq!(manager.get_lag(&log, &group).await.unwrap().lag, 3);
}

#[tokio::test]
async fn test_torn_tail_is_dropped_on_restart() {
    let dir = TempDir::new().unwrap();
    let log = name("test/torn");
    {
        let manager = EmbeddedLogManager::open(config(&dir)).await.unwrap();
        manager.create_if_not_exists(&log, 1).await.unwrap();
        let appender = manager.get_appender(&log).await.unwrap();
        appender.append_to(0, Record::of("a", b"1".to_vec())).await.unwrap();
        manager.close().await.unwrap();
    }
    // Simulate a crash in the middle of the second append.
    let segment = partition_dir(&log_dir(dir.path(), &log), 0).join("seg-0000000000000000.log");
    let frame = SegmentEntry::new("b", 0, b"2".to_vec()).serialize();
    let mut file = std::fs::OpenOptions::new().append(true).open(&segment).unwrap();
    file.write_all(&frame[..frame.len() - 4]).unwrap();
    drop(file);

    let manager = EmbeddedLogManager::open(config(&dir)).await.unwrap();
    let appender = manager.get_appender(&log).await.unwrap();
    let offset = appender.append_to(0, Record::of("c", b"3".to_vec())).await.unwrap();
    assert_eq!(offset.offset, 1);

    let mut tailer = manager.create_tailer(&name("test/reader"), &log).await.unwrap();
    let keys = [
        tailer.read(Duration::from_secs(1)).await.unwrap().unwrap().message.key,
        tailer.read(Duration::from_secs(1)).await.unwrap().unwrap().message.key,
    ];
    assert_eq!(keys, ["a".to_string(), "c".to_string()]);
    assert!(tailer.read(Duration::from_millis(20)).await.unwrap().is_none());
}

#[tokio::test]
async fn test_reader_in_another_manager_sees_appends() {
    let dir = TempDir::new().unwrap();
    let log = name("test/shared");
    let writer = EmbeddedLogManager::open(config(&dir)).await.unwrap();
    let reader = EmbeddedLogManager::open(config(&dir)).await.unwrap();
    writer.create_if_not_exists(&log, 1).await.unwrap();

    let mut tailer = reader.create_tailer(&name("test/aGroup"), &log).await.unwrap();
    let appender = writer.get_appender(&log).await.unwrap();
    let handle = tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(30)).await;
        appender.append_to(0, Record::of("k", b"hello".to_vec())).await.unwrap();
    });

    let record = tailer.read(Duration::from_secs(2)).await.unwrap().unwrap();
    assert_eq!(record.message.data, b"hello");
    handle.await.unwrap();
}

#[tokio::test]
async fn test_timestamp_seek_unsupported() {
    let dir = TempDir::new().unwrap();
    let manager = EmbeddedLogManager::open(config(&dir)).await.unwrap();
    let log = name("test/ts");
    manager.create_if_not_exists(&log, 1).await.unwrap();
    assert!(!manager.supports_timestamp_seek());

    let mut tailer = manager.create_tailer(&name("test/aGroup"), &log).await.unwrap();
    assert!(matches!(tailer.seek_to_timestamp(0).await, Err(LogError::Unsupported(_))));
    let partition = LogPartition::of(log.clone(), 0);
    assert!(matches!(
        tailer.offset_for_timestamp(&partition, 0).await,
        Err(LogError::Unsupported(_))
    ));
}

#[tokio::test]
async fn test_delete_removes_offsets() {
    let dir = TempDir::new().unwrap();
    let manager = EmbeddedLogManager::open(config(&dir)).await.unwrap();
    let log = name("test/doomed");
    let group = name("test/aGroup");
    manager.create_if_not_exists(&log, 1).await.unwrap();
    manager
        .get_appender(&log)
        .await
        .unwrap()
        .append_to(0, Record::of("k", b"v".to_vec()))
        .await
        .unwrap();
    {
        let mut tailer = manager.create_tailer(&group, &log).await.unwrap();
        tailer.read(Duration::from_secs(1)).await.unwrap().unwrap();
        tailer.commit().await.unwrap();
        tailer.close().await.unwrap();
    }
    assert_eq!(manager.list_consumer_groups(&log).await.unwrap(), vec![group.clone()]);

    assert!(manager.delete(&log).await.unwrap());
    assert!(!manager.delete(&log).await.unwrap());
    assert!(!log_dir(dir.path(), &log).exists());

    manager.create_if_not_exists(&log, 1).await.unwrap();
    assert!(manager.list_consumer_groups(&log).await.unwrap().is_empty());
    assert_eq!(manager.get_lag(&log, &group).await.unwrap().lag, 0);
}

#[test]
fn test_dropped_read_leaves_tailer_usable() {
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .max_blocking_threads(1)
        .build()
        .unwrap();
    runtime.block_on(async {
        let dir = TempDir::new().unwrap();
        let manager = EmbeddedLogManager::open(config(&dir)).await.unwrap();
        let log = name("test/cancel");
        manager.create_if_not_exists(&log, 1).await.unwrap();
        let appender = manager.get_appender(&log).await.unwrap();
        for i in 0..3 {
            appender.append_to(0, Record::of("k", format!("m{i}").into_bytes())).await.unwrap();
        }
        let mut tailer = manager.create_tailer(&name("test/aGroup"), &log).await.unwrap();

        // Hold the only blocking thread so the read stays pending on it.
        let (release, held) = std::sync::mpsc::channel::<()>();
        let blocker = tokio::task::spawn_blocking(move || held.recv().ok());
        let abandoned = tokio::time::timeout(Duration::ZERO, tailer.read(Duration::from_secs(5))).await;
        assert!(abandoned.is_err());
        release.send(()).unwrap();
        blocker.await.unwrap();

        let partition = LogPartition::of(log.clone(), 0);
        tailer.seek(&partition.at(1)).await.unwrap();
        let read = tailer.read(Duration::from_secs(1)).await.unwrap().unwrap();
        assert_eq!((read.offset.offset, read.message.data), (1, b"m1".to_vec()));
        tailer.to_start().await.unwrap();
        assert_eq!(tailer.read(Duration::from_secs(1)).await.unwrap().unwrap().offset.offset, 0);
    });
}
