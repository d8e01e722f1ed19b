// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// HttpBrokerClient and DistributedLogManager against an in-process REST
// broker that serves an InMemoryBroker.

use std::sync::Arc;
use std::time::Duration;

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::routing::{get, post, put};
use axum::{Json, Router};
use serde::Deserialize;
use serde_json::{json, Value};

use tributary_distributed::http::{CreateTopicRequest, ErrorResponse, OffsetBody};
use tributary_distributed::{
    BrokerCapabilities, BrokerClient, BrokerError, BrokerRecord, DistributedConfig, DistributedLogManager,
    FetchRequest, HttpBrokerClient, InMemoryBroker,
};
use tributary_log::{LogError, LogManager, Name, Record, Watermark};

type Broker = State<Arc<InMemoryBroker>>;
type Reply<T = Json<Value>> = Result<T, (StatusCode, Json<ErrorResponse>)>;

fn reject(error: BrokerError) -> (StatusCode, Json<ErrorResponse>) {
    let (status, code, topic, partition) = match &error {
        BrokerError::UnknownTopic(topic) => (StatusCode::NOT_FOUND, "unknown_topic", Some(topic.clone()), None),
        BrokerError::UnknownPartition { topic, partition } => {
            (StatusCode::NOT_FOUND, "unknown_partition", Some(topic.clone()), Some(*partition))
        }
        BrokerError::Unsupported(_) => (StatusCode::NOT_IMPLEMENTED, "unsupported", None, None),
        BrokerError::Unavailable(_) => (StatusCode::SERVICE_UNAVAILABLE, "unavailable", None, None),
        BrokerError::Timeout(_) => (StatusCode::GATEWAY_TIMEOUT, "timeout", None, None),
        BrokerError::Protocol(_) => (StatusCode::BAD_REQUEST, "bad_request", None, None),
    };
    (
        status,
        Json(ErrorResponse {
            error: code.to_string(),
            message: error.to_string(),
            topic,
            partition,
        }),
    )
}

async fn capabilities(State(broker): Broker) -> Reply {
    Ok(Json(json!(broker.probe().await.map_err(reject)?)))
}

async fn list_topics(State(broker): Broker) -> Reply {
    Ok(Json(json!({ "topics": broker.list_topics().await.map_err(reject)? })))
}

async fn create_topic(
    State(broker): Broker,
    Path(topic): Path<String>,
    Json(body): Json<CreateTopicRequest>,
) -> Reply {
    let created = broker.create_topic(&topic, body.partitions).await.map_err(reject)?;
    Ok(Json(json!({ "created": created })))
}

async fn describe_topic(State(broker): Broker, Path(topic): Path<String>) -> Reply {
    match broker.describe_topic(&topic).await.map_err(reject)? {
        Some(description) => Ok(Json(json!(description))),
        None => Err(reject(BrokerError::UnknownTopic(topic))),
    }
}

async fn delete_topic(State(broker): Broker, Path(topic): Path<String>) -> Reply {
    Ok(Json(json!({ "deleted": broker.delete_topic(&topic).await.map_err(reject)? })))
}

async fn produce(
    State(broker): Broker,
    Path((topic, partition)): Path<(String, u32)>,
    Json(record): Json<BrokerRecord>,
) -> Reply {
    Ok(Json(json!({ "offset": broker.produce(&topic, partition, &record).await.map_err(reject)? })))
}

#[derive(Deserialize)]
struct OffsetsQuery {
    timestamp: Option<i64>,
}

async fn offsets(
    State(broker): Broker,
    Path((topic, partition)): Path<(String, u32)>,
    Query(query): Query<OffsetsQuery>,
) -> Reply {
    match query.timestamp {
        Some(timestamp) => {
            let offset = broker
                .offset_for_timestamp(&topic, partition, timestamp)
                .await
                .map_err(reject)?;
            Ok(Json(json!({ "offset": offset })))
        }
        None => Ok(Json(json!(broker.offset_range(&topic, partition).await.map_err(reject)?))),
    }
}

async fn list_groups(State(broker): Broker, Path(topic): Path<String>) -> Reply {
    Ok(Json(json!({ "groups": broker.list_groups(&topic).await.map_err(reject)? })))
}

async fn fetch(State(broker): Broker, Json(request): Json<FetchRequest>) -> Reply {
    Ok(Json(json!({ "records": broker.fetch(&request).await.map_err(reject)? })))
}

async fn commit(
    State(broker): Broker,
    Path((group, topic, partition)): Path<(String, String, u32)>,
    Json(body): Json<OffsetBody<u64>>,
) -> Reply<StatusCode> {
    broker
        .commit_offset(&group, &topic, partition, body.offset)
        .await
        .map_err(reject)?;
    Ok(StatusCode::NO_CONTENT)
}

async fn committed(State(broker): Broker, Path((group, topic, partition)): Path<(String, String, u32)>) -> Reply {
    let offset = broker.committed_offset(&group, &topic, partition).await.map_err(reject)?;
    Ok(Json(json!({ "offset": offset })))
}

async fn spawn_broker(broker: Arc<InMemoryBroker>) -> String {
    let app = Router::new()
        .route("/v1/capabilities", get(capabilities))
        .route("/v1/topics", get(list_topics))
        .route("/v1/topics/{topic}", put(create_topic).get(describe_topic).delete(delete_topic))
        .route("/v1/topics/{topic}/partitions/{partition}/records", post(produce))
        .route("/v1/topics/{topic}/partitions/{partition}/offsets", get(offsets))
        .route("/v1/topics/{topic}/groups", get(list_groups))
        .route("/v1/fetch", post(fetch))
        .route(
            "/v1/groups/{group}/topics/{topic}/partitions/{partition}",
            put(commit).get(committed),
        )
        .with_state(broker);
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    format!("http://{addr}")
}

/// A URL nothing listens on.
async fn dead_url() -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);
    format!("http://{addr}")
}

fn config(brokers: Vec<String>) -> DistributedConfig {
    DistributedConfig {
        request_timeout: Duration::from_secs(5),
        poll_interval: Duration::from_millis(200),
        ..DistributedConfig::new(brokers)
    }
}

fn name(urn: &str) -> Name {
    Name::of_urn(urn).unwrap()
}

#[tokio::test]
async fn test_manager_over_http_with_failover() {
    let url = spawn_broker(Arc::new(InMemoryBroker::new())).await;
    let manager = DistributedLogManager::connect_http(config(vec![dead_url().await, url]))
        .await
        .unwrap();
    assert!(manager.supports_timestamp_seek());

    let log = name("test/myLog");
    let group = name("test/aGroup");
    assert!(manager.create_if_not_exists(&log, 2).await.unwrap());
    assert!(!manager.create_if_not_exists(&log, 2).await.unwrap());
    assert!(matches!(
        manager.create_if_not_exists(&log, 3).await,
        Err(LogError::Configuration(_))
    ));

    let appender = manager.get_appender(&log).await.unwrap();
    for i in 0..10 {
        let key = format!("key{i}");
        let record = Record::of(key.as_str(), format!("id{i}").into_bytes()).header("h", b"x".to_vec());
        appender.append(&key, record).await.unwrap();
    }

    let mut tailer = manager.create_tailer(&group, &log).await.unwrap();
    let mut seen = Vec::new();
    while let Some(record) = tailer.read(Duration::from_millis(100)).await.unwrap() {
        assert_eq!(record.message.get_header("h"), Some(&b"x"[..]));
        seen.push(record.message.key);
    }
    seen.sort();
    assert_eq!(seen.len(), 10);
    tailer.commit().await.unwrap();

    assert_eq!(manager.get_lag(&log, &group).await.unwrap().lag, 0);
    assert_eq!(manager.list_all().await.unwrap(), vec![log.clone()]);
    assert_eq!(manager.list_consumer_groups(&log).await.unwrap(), vec![group.clone()]);
}

#[tokio::test]
async fn test_long_poll_over_http() {
    let url = spawn_broker(Arc::new(InMemoryBroker::new())).await;
    let manager = DistributedLogManager::connect_http(config(vec![url])).await.unwrap();
    let log = name("test/poll");
    manager.create_if_not_exists(&log, 1).await.unwrap();

    let mut tailer = manager.create_tailer(&name("test/aGroup"), &log).await.unwrap();
    let appender = manager.get_appender(&log).await.unwrap();
    let handle = tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(50)).await;
        appender.append_to(0, Record::of("k", b"late".to_vec())).await.unwrap();
    });
    let record = tailer.read(Duration::from_secs(3)).await.unwrap().unwrap();
    assert_eq!(record.message.data, b"late");
    handle.await.unwrap();
}

#[tokio::test]
async fn test_errors_over_http() {
    let broker = Arc::new(InMemoryBroker::with_capabilities(BrokerCapabilities::default()));
    let url = spawn_broker(Arc::clone(&broker)).await;
    let client = HttpBrokerClient::new(&config(vec![url])).unwrap();

    assert_eq!(client.describe_topic("missing").await.unwrap(), None);
    assert!(matches!(
        client.produce("missing", 0, &BrokerRecord::default()).await,
        Err(BrokerError::UnknownTopic(topic)) if topic == "missing"
    ));
    client.create_topic("t", 1).await.unwrap();
    assert!(matches!(
        client.offset_range("t", 4).await,
        Err(BrokerError::UnknownPartition { partition: 4, .. })
    ));
    assert!(matches!(
        client.offset_for_timestamp("t", 0, 0).await,
        Err(BrokerError::Unsupported(_))
    ));

    broker.set_available(false);
    let error = client.list_topics().await.unwrap_err();
    assert!(error.is_retryable(), "{error:?}");
}

#[tokio::test]
async fn test_timestamp_seek_over_http() {
    let url = spawn_broker(Arc::new(InMemoryBroker::new())).await;
    let manager = DistributedLogManager::connect_http(config(vec![url])).await.unwrap();
    let log = name("test/ts");
    manager.create_if_not_exists(&log, 1).await.unwrap();
    let appender = manager.get_appender(&log).await.unwrap();
    for (i, ts) in [1_000, 2_000, 3_000].into_iter().enumerate() {
        let record = Record::with_watermark("k", format!("m{i}").into_bytes(), Watermark::lowest(ts));
        appender.append_to(0, record).await.unwrap();
    }

    let mut tailer = manager.create_tailer(&name("test/aGroup"), &log).await.unwrap();
    tailer.seek_to_timestamp(1_500).await.unwrap();
    let record = tailer.read(Duration::from_secs(1)).await.unwrap().unwrap();
    assert_eq!(record.offset.offset, 1);
    assert_eq!(record.message.watermark().timestamp_ms, 2_000);
}

#[tokio::test]
async fn test_unreachable_cluster() {
    let urls = vec![dead_url().await, dead_url().await];
    let client = HttpBrokerClient::new(&config(urls.clone())).unwrap();
    assert!(matches!(client.list_topics().await, Err(BrokerError::Unavailable(_))));

    match DistributedLogManager::connect_http(config(urls)).await {
        Err(LogError::Backend { retryable, .. }) => assert!(!retryable),
        Err(other) => panic!("unexpected error {other:?}"),
        Ok(_) => panic!("connected to nothing"),
    }
}
