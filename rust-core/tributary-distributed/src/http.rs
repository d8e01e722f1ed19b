// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// REST/JSON broker client.
//
// Endpoints, relative to each broker base URL:
//
//   GET    v1/capabilities
//   GET    v1/topics
//   PUT    v1/topics/{topic}                              {"partitions": n}
//   GET    v1/topics/{topic}
//   DELETE v1/topics/{topic}
//   POST   v1/topics/{topic}/partitions/{p}/records       BrokerRecord
//   GET    v1/topics/{topic}/partitions/{p}/offsets[?timestamp=ms]
//   GET    v1/topics/{topic}/groups
//   POST   v1/fetch                                       FetchRequest
//   PUT    v1/groups/{group}/topics/{topic}/partitions/{p} {"offset": n}
//   GET    v1/groups/{group}/topics/{topic}/partitions/{p}
//
// Errors come back as `{"error": code, "message": text}` with `code` one of
// `unknown_topic`, `unknown_partition`, `unsupported`.

use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use reqwest::StatusCode;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};
use url::Url;

use crate::broker::{
    BrokerCapabilities, BrokerClient, BrokerRecord, FetchRequest, FetchedRecord, OffsetRange, TopicDescription,
};
use crate::config::DistributedConfig;
use crate::error::{BrokerError, BrokerResult};

#[derive(Serialize, Deserialize)]
pub struct CreateTopicRequest {
    pub partitions: u32,
}

#[derive(Serialize, Deserialize)]
pub struct CreatedResponse {
    pub created: bool,
}

#[derive(Serialize, Deserialize)]
pub struct DeletedResponse {
    pub deleted: bool,
}

#[derive(Serialize, Deserialize)]
pub struct TopicsResponse {
    pub topics: Vec<String>,
}

#[derive(Serialize, Deserialize)]
pub struct GroupsResponse {
    pub groups: Vec<String>,
}

#[derive(Serialize, Deserialize)]
pub struct FetchResponse {
    pub records: Vec<FetchedRecord>,
}

/// Body of a produce answer and of group offset reads and writes.
#[derive(Serialize, Deserialize)]
pub struct OffsetBody<T> {
    pub offset: T,
}

/// Error body returned with any non-success status.
#[derive(Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub topic: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub partition: Option<u32>,
}

/// Broker client over HTTP with multi-URL failover.
///
/// Requests go to the URL that answered last; a connection failure moves on
/// to the next URL and sticks there once it answers.
pub struct HttpBrokerClient {
    urls: Vec<Url>,
    http: reqwest::Client,
    request_timeout: std::time::Duration,
    current: AtomicUsize,
}

impl HttpBrokerClient {
    pub fn new(config: &DistributedConfig) -> BrokerResult<Self> {
        if config.brokers.is_empty() {
            return Err(BrokerError::Protocol("no broker URL configured".into()));
        }
        let urls = config
            .brokers
            .iter()
            .map(|raw| {
                let normalized = if raw.ends_with('/') { raw.clone() } else { format!("{raw}/") };
                Url::parse(&normalized).map_err(|e| BrokerError::Protocol(format!("invalid broker URL '{raw}': {e}")))
            })
            .collect::<BrokerResult<Vec<_>>>()?;
        let http = reqwest::Client::builder()
            .build()
            .map_err(|e| BrokerError::Protocol(format!("cannot build HTTP client: {e}")))?;
        Ok(Self {
            urls,
            http,
            request_timeout: config.request_timeout,
            current: AtomicUsize::new(0),
        })
    }

    async fn send<F>(&self, path: &str, build: F) -> BrokerResult<reqwest::Response>
    where
        F: Fn(&reqwest::Client, Url) -> reqwest::RequestBuilder,
    {
        let start = self.current.load(Ordering::Relaxed);
        let mut last_error = String::new();
        for attempt in 0..self.urls.len() {
            let index = (start + attempt) % self.urls.len();
            let url = self.urls[index]
                .join(path)
                .map_err(|e| BrokerError::Protocol(format!("invalid broker path '{path}': {e}")))?;
            match build(&self.http, url.clone()).send().await {
                Ok(response) => {
                    if index != start {
                        debug!(url = %self.urls[index], "Broker client failed over");
                        self.current.store(index, Ordering::Relaxed);
                    }
                    return Ok(response);
                }
                Err(error) if error.is_connect() => {
                    warn!(url = %url, error = %error, "Broker unreachable");
                    last_error = error.to_string();
                }
                Err(error) => return Err(error.into()),
            }
        }
        Err(BrokerError::Unavailable(last_error))
    }

    async fn call<R, F>(&self, path: &str, build: F) -> BrokerResult<R>
    where
        R: DeserializeOwned,
        F: Fn(&reqwest::Client, Url) -> reqwest::RequestBuilder,
    {
        let response = self.send(path, build).await?;
        if !response.status().is_success() {
            return Err(Self::extract_error(response).await);
        }
        response
            .json::<R>()
            .await
            .map_err(|e| BrokerError::Protocol(format!("unexpected response to {path}: {e}")))
    }

    async fn extract_error(response: reqwest::Response) -> BrokerError {
        let status = response.status();
        let body = match response.json::<ErrorResponse>().await {
            Ok(body) => body,
            Err(_) => ErrorResponse {
                error: String::new(),
                message: format!("HTTP {status}"),
                topic: None,
                partition: None,
            },
        };
        match (body.error.as_str(), body.topic, body.partition) {
            ("unknown_topic", topic, _) => BrokerError::UnknownTopic(topic.unwrap_or(body.message)),
            ("unknown_partition", Some(topic), Some(partition)) => BrokerError::UnknownPartition { topic, partition },
            ("unsupported", _, _) => BrokerError::Unsupported(body.message),
            _ if status == StatusCode::SERVICE_UNAVAILABLE => BrokerError::Unavailable(body.message),
            _ if status == StatusCode::GATEWAY_TIMEOUT => BrokerError::Timeout(body.message),
            _ => BrokerError::Protocol(format!("{status}: {}", body.message)),
        }
    }
}

fn partition_path(topic: &str, partition: u32) -> String {
    format!("v1/topics/{topic}/partitions/{partition}")
}

fn group_path(group: &str, topic: &str, partition: u32) -> String {
    format!("v1/groups/{group}/topics/{topic}/partitions/{partition}")
}

#[async_trait]
impl BrokerClient for HttpBrokerClient {
    async fn probe(&self) -> BrokerResult<BrokerCapabilities> {
        self.call("v1/capabilities", |http, url| http.get(url).timeout(self.request_timeout))
            .await
    }

    async fn create_topic(&self, topic: &str, partitions: u32) -> BrokerResult<bool> {
        let body = CreateTopicRequest { partitions };
        let response: CreatedResponse = self
            .call(&format!("v1/topics/{topic}"), |http, url| {
                http.put(url).json(&body).timeout(self.request_timeout)
            })
            .await?;
        Ok(response.created)
    }

    async fn describe_topic(&self, topic: &str) -> BrokerResult<Option<TopicDescription>> {
        match self
            .call(&format!("v1/topics/{topic}"), |http, url| {
                http.get(url).timeout(self.request_timeout)
            })
            .await
        {
            Ok(description) => Ok(Some(description)),
            Err(BrokerError::UnknownTopic(_)) => Ok(None),
            Err(error) => Err(error),
        }
    }

    async fn list_topics(&self) -> BrokerResult<Vec<String>> {
        let response: TopicsResponse = self
            .call("v1/topics", |http, url| http.get(url).timeout(self.request_timeout))
            .await?;
        Ok(response.topics)
    }

    async fn delete_topic(&self, topic: &str) -> BrokerResult<bool> {
        let response: DeletedResponse = self
            .call(&format!("v1/topics/{topic}"), |http, url| {
                http.delete(url).timeout(self.request_timeout)
            })
            .await?;
        Ok(response.deleted)
    }

    async fn produce(&self, topic: &str, partition: u32, record: &BrokerRecord) -> BrokerResult<u64> {
        let response: OffsetBody<u64> = self
            .call(&format!("{}/records", partition_path(topic, partition)), |http, url| {
                http.post(url).json(record).timeout(self.request_timeout)
            })
            .await?;
        Ok(response.offset)
    }

    async fn fetch(&self, request: &FetchRequest) -> BrokerResult<Vec<FetchedRecord>> {
        // The broker may hold the request for the whole wait.
        let timeout = self.request_timeout + request.max_wait();
        let response: FetchResponse = self
            .call("v1/fetch", |http, url| http.post(url).json(request).timeout(timeout))
            .await?;
        Ok(response.records)
    }

    async fn offset_range(&self, topic: &str, partition: u32) -> BrokerResult<OffsetRange> {
        self.call(&format!("{}/offsets", partition_path(topic, partition)), |http, url| {
            http.get(url).timeout(self.request_timeout)
        })
        .await
    }

    async fn offset_for_timestamp(
        &self,
        topic: &str,
        partition: u32,
        timestamp_ms: i64,
    ) -> BrokerResult<Option<u64>> {
        let response: OffsetBody<Option<u64>> = self
            .call(&format!("{}/offsets", partition_path(topic, partition)), |http, url| {
                http.get(url)
                    .query(&[("timestamp", timestamp_ms)])
                    .timeout(self.request_timeout)
            })
            .await?;
        Ok(response.offset)
    }

    async fn commit_offset(&self, group: &str, topic: &str, partition: u32, offset: u64) -> BrokerResult<()> {
        let body = OffsetBody { offset };
        let response = self
            .send(&group_path(group, topic, partition), |http, url| {
                http.put(url).json(&body).timeout(self.request_timeout)
            })
            .await?;
        if !response.status().is_success() {
            return Err(Self::extract_error(response).await);
        }
        Ok(())
    }

    async fn committed_offset(&self, group: &str, topic: &str, partition: u32) -> BrokerResult<Option<u64>> {
        let response: OffsetBody<Option<u64>> = self
            .call(&group_path(group, topic, partition), |http, url| {
                http.get(url).timeout(self.request_timeout)
            })
            .await?;
        Ok(response.offset)
    }

    async fn list_groups(&self, topic: &str) -> BrokerResult<Vec<String>> {
        let response: GroupsResponse = self
            .call(&format!("v1/topics/{topic}/groups"), |http, url| {
                http.get(url).timeout(self.request_timeout)
            })
            .await?;
        Ok(response.groups)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rejects_bad_urls() {
        assert!(HttpBrokerClient::new(&DistributedConfig::new(Vec::<String>::new())).is_err());
        assert!(HttpBrokerClient::new(&DistributedConfig::new(["not a url"])).is_err());
        assert!(HttpBrokerClient::new(&DistributedConfig::new(["http://broker:9092/base"])).is_ok());
    }

    #[test]
    fn test_paths() {
        assert_eq!(partition_path("t", 3), "v1/topics/t/partitions/3");
        assert_eq!(group_path("g", "t", 0), "v1/groups/g/topics/t/partitions/0");
    }
}
