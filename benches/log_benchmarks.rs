// SPDX-License-Identifier: PMPL-1.0-or-later
//! Throughput benchmarks for Tributary logs and codecs

use std::sync::Arc;
use std::time::Duration;

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use serde::{Deserialize, Serialize};
use tempfile::TempDir;
use tokio::runtime::Runtime;

use tributary_codec::{
    AvroBinaryCodec, AvroConfluentCodec, AvroJsonCodec, AvroMessageCodec, AvroRecord, Codec, FallbackPolicy,
    SerializableCodec,
};
use tributary_distributed::{DistributedConfig, DistributedLogManager, InMemoryBroker};
use tributary_embedded::{EmbeddedConfig, EmbeddedLogManager};
use tributary_log::{LogManager, Name, Record};
use tributary_schema::{InMemorySchemaRegistry, MemorySchemaStore};
use tributary_segment::{SegmentEntry, SegmentWriter, SyncMode};

const PAYLOAD_SIZES: [usize; 3] = [64, 1024, 16 * 1024];

fn log_name() -> Name {
    Name::of_urn("bench/events").unwrap()
}

async fn embedded_manager(dir: &TempDir) -> Arc<dyn LogManager> {
    let config = EmbeddedConfig {
        sync_mode: SyncMode::Async,
        ..EmbeddedConfig::new(dir.path())
    };
    Arc::new(EmbeddedLogManager::open(config).await.unwrap())
}

async fn distributed_manager() -> Arc<dyn LogManager> {
    Arc::new(
        DistributedLogManager::connect(DistributedConfig::default(), Arc::new(InMemoryBroker::new()))
            .await
            .unwrap(),
    )
}

// ============================================================================
// Segment Engine Benchmarks
// ============================================================================

fn bench_segment_append(c: &mut Criterion) {
    let mut group = c.benchmark_group("segment");

    for size in PAYLOAD_SIZES {
        group.throughput(Throughput::Bytes(size as u64));
        group.bench_with_input(BenchmarkId::new("append", size), &size, |b, &size| {
            let dir = TempDir::new().unwrap();
            let mut writer = SegmentWriter::open(dir.path(), SyncMode::Async).unwrap();
            let payload = vec![0xA5u8; size];
            b.iter(|| {
                let entry = SegmentEntry::new("key", 0, payload.clone());
                black_box(writer.append(entry).unwrap())
            });
        });
    }

    group.finish();
}

// ============================================================================
// Backend Benchmarks
// ============================================================================

fn bench_append(c: &mut Criterion) {
    let rt = Runtime::new().unwrap();
    let mut group = c.benchmark_group("append");
    group.throughput(Throughput::Elements(1));

    let dir = TempDir::new().unwrap();
    let backends = [
        ("embedded", rt.block_on(embedded_manager(&dir))),
        ("distributed_in_memory", rt.block_on(distributed_manager())),
    ];
    for (label, manager) in backends {
        let appender = rt.block_on(async {
            manager.create_if_not_exists(&log_name(), 4).await.unwrap();
            manager.get_appender(&log_name()).await.unwrap()
        });
        group.bench_function(label, |b| {
            b.to_async(&rt).iter(|| async {
                black_box(appender.append("key", Record::of("key", vec![0u8; 256])).await.unwrap())
            });
        });
    }

    group.finish();
}

fn bench_tail(c: &mut Criterion) {
    const RECORDS: u64 = 1_000;
    let rt = Runtime::new().unwrap();
    let mut group = c.benchmark_group("tail");
    group.throughput(Throughput::Elements(RECORDS));
    group.sample_size(20);

    let dir = TempDir::new().unwrap();
    let backends = [
        ("embedded", rt.block_on(embedded_manager(&dir))),
        ("distributed_in_memory", rt.block_on(distributed_manager())),
    ];
    for (label, manager) in backends {
        rt.block_on(async {
            manager.create_if_not_exists(&log_name(), 4).await.unwrap();
            let appender = manager.get_appender(&log_name()).await.unwrap();
            for i in 0..RECORDS {
                let key = format!("key{i}");
                appender.append(&key, Record::of(key.as_str(), vec![0u8; 256])).await.unwrap();
            }
        });
        let group_name = Name::of_urn("bench/reader").unwrap();
        group.bench_function(label, |b| {
            b.to_async(&rt).iter(|| async {
                let mut tailer = manager.create_tailer(&group_name, &log_name()).await.unwrap();
                let mut count = 0u64;
                while count < RECORDS {
                    if tailer.read(Duration::from_secs(1)).await.unwrap().is_some() {
                        count += 1;
                    }
                }
                tailer.close().await.unwrap();
                black_box(count)
            });
        });
    }

    group.finish();
}

// ============================================================================
// Codec Benchmarks
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
struct Event {
    id: String,
    sequence: i64,
    tags: Vec<String>,
    note: Option<String>,
}

impl AvroRecord for Event {
    const SCHEMA: &'static str = r#"{"type":"record","name":"Event","namespace":"bench","fields":[
        {"name":"id","type":"string"},
        {"name":"sequence","type":"long"},
        {"name":"tags","type":{"type":"array","items":"string"}},
        {"name":"note","type":["null","string"],"default":null}]}"#;
}

fn sample_event() -> Event {
    Event {
        id: "evt-000042".to_string(),
        sequence: 42,
        tags: vec!["orders".to_string(), "eu-west".to_string(), "priority".to_string()],
        note: Some("benchmark payload".to_string()),
    }
}

fn bench_codecs(c: &mut Criterion) {
    let rt = Runtime::new().unwrap();
    let codecs: Vec<Arc<dyn Codec<Event>>> = rt.block_on(async {
        vec![
            Arc::new(SerializableCodec::<Event>::new()) as Arc<dyn Codec<Event>>,
            Arc::new(AvroJsonCodec::<Event>::new().unwrap()),
            Arc::new(AvroBinaryCodec::<Event>::new().unwrap()),
            Arc::new(AvroMessageCodec::<Event>::new(Arc::new(MemorySchemaStore::new())).await.unwrap()),
            Arc::new(
                AvroConfluentCodec::<Event>::new(Arc::new(InMemorySchemaRegistry::new()), FallbackPolicy::Strict)
                    .await
                    .unwrap(),
            ),
        ]
    });
    let event = sample_event();

    let mut group = c.benchmark_group("codec");
    for codec in &codecs {
        let encoded = rt.block_on(codec.encode(&event)).unwrap();
        group.throughput(Throughput::Bytes(encoded.len() as u64));
        group.bench_function(BenchmarkId::new("encode", codec.name()), |b| {
            b.to_async(&rt).iter(|| async { black_box(codec.encode(&event).await.unwrap()) });
        });
        group.bench_function(BenchmarkId::new("decode", codec.name()), |b| {
            b.to_async(&rt).iter(|| async { black_box(codec.decode(&encoded).await.unwrap()) });
        });
    }
    group.finish();
}

criterion_group!(segment_benches, bench_segment_append);
criterion_group!(backend_benches, bench_append, bench_tail);
criterion_group!(codec_benches, bench_codecs);

criterion_main!(segment_benches, backend_benches, codec_benches);
