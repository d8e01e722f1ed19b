// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Schema registry clients.
//
// `HttpSchemaRegistry` speaks the Confluent-compatible REST API against one
// or more registry URLs and fails over to the next URL when a request cannot
// be delivered. `InMemorySchemaRegistry` implements the same contract inside
// the process and can be switched unreachable to exercise fallback paths.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU32, AtomicUsize, Ordering};
use std::sync::RwLock;
use std::time::Duration;

use apache_avro::Schema;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};
use url::Url;

use crate::error::{SchemaError, SchemaResult};
use crate::fingerprint::fingerprint;

/// Content type of the Confluent schema registry API.
pub const REGISTRY_CONTENT_TYPE: &str = "application/vnd.schemaregistry.v1+json";

/// A remote schema registry assigning integer ids to schemas.
#[async_trait]
pub trait SchemaRegistry: Send + Sync {
    /// Register `schema` under `subject`. Idempotent: the same schema gets the
    /// same id.
    async fn register(&self, subject: &str, schema: &Schema) -> SchemaResult<u32>;

    /// The schema with this id. Unknown ids are [`SchemaError::NotFound`].
    async fn get_by_id(&self, id: u32) -> SchemaResult<Schema>;
}

/// Registry client configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RegistryConfig {
    /// Registry base URLs, tried in order.
    pub urls: Vec<String>,
    /// Per-request timeout.
    #[serde(with = "millis")]
    pub timeout: Duration,
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            urls: vec!["http://localhost:8081".to_string()],
            timeout: Duration::from_secs(10),
        }
    }
}

mod millis {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(value.as_millis() as u64)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        Ok(Duration::from_millis(u64::deserialize(deserializer)?))
    }
}

#[derive(Serialize)]
struct RegisterRequest<'a> {
    schema: &'a str,
}

#[derive(Deserialize)]
struct RegisterResponse {
    id: u32,
}

#[derive(Deserialize)]
struct SchemaResponse {
    schema: String,
}

#[derive(Deserialize)]
struct ErrorResponse {
    #[serde(default)]
    error_code: Option<u32>,
    message: String,
}

/// Confluent-compatible REST registry client with multi-URL failover.
pub struct HttpSchemaRegistry {
    urls: Vec<Url>,
    http: reqwest::Client,
    /// Index of the URL that answered last.
    current: AtomicUsize,
}

impl HttpSchemaRegistry {
    pub fn new(config: &RegistryConfig) -> SchemaResult<Self> {
        if config.urls.is_empty() {
            return Err(SchemaError::Configuration("no schema registry URL configured".into()));
        }
        let urls = config
            .urls
            .iter()
            .map(|raw| {
                // A trailing slash keeps the base path when joining.
                let normalized = if raw.ends_with('/') { raw.clone() } else { format!("{raw}/") };
                Url::parse(&normalized)
                    .map_err(|e| SchemaError::Configuration(format!("invalid registry URL '{raw}': {e}")))
            })
            .collect::<SchemaResult<Vec<_>>>()?;
        let http = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| SchemaError::Configuration(format!("cannot build HTTP client: {e}")))?;
        Ok(Self {
            urls,
            http,
            current: AtomicUsize::new(0),
        })
    }

    /// Send a request built for each URL in turn, starting with the one that
    /// answered last, until one delivers a response.
    async fn send<F>(&self, path: &str, build: F) -> SchemaResult<reqwest::Response>
    where
        F: Fn(&reqwest::Client, Url) -> reqwest::RequestBuilder,
    {
        let start = self.current.load(Ordering::Relaxed);
        let mut last_error = String::new();
        for attempt in 0..self.urls.len() {
            let index = (start + attempt) % self.urls.len();
            let url = self.urls[index]
                .join(path)
                .map_err(|e| SchemaError::Configuration(format!("invalid registry path '{path}': {e}")))?;
            match build(&self.http, url.clone()).send().await {
                Ok(response) => {
                    if index != start {
                        debug!(url = %self.urls[index], "Schema registry failed over");
                        self.current.store(index, Ordering::Relaxed);
                    }
                    return Ok(response);
                }
                Err(error) => {
                    warn!(url = %url, error = %error, "Schema registry request failed");
                    last_error = error.to_string();
                }
            }
        }
        Err(SchemaError::Unavailable(last_error))
    }

    async fn extract_error(response: reqwest::Response) -> SchemaError {
        let status = response.status().as_u16();
        let (code, message) = match response.json::<ErrorResponse>().await {
            Ok(body) => (body.error_code, body.message),
            Err(_) => (None, format!("HTTP {status}")),
        };
        match (status, code) {
            (404, _) | (_, Some(40401..=40403)) => SchemaError::NotFound(message),
            _ => SchemaError::Server { status, message },
        }
    }
}

#[async_trait]
impl SchemaRegistry for HttpSchemaRegistry {
    async fn register(&self, subject: &str, schema: &Schema) -> SchemaResult<u32> {
        let text = serde_json::to_string(schema)?;
        let body = serde_json::to_vec(&RegisterRequest { schema: &text })?;
        let path = format!("subjects/{subject}/versions");
        let response = self
            .send(&path, |http, url| {
                http.post(url)
                    .header(reqwest::header::CONTENT_TYPE, REGISTRY_CONTENT_TYPE)
                    .body(body.clone())
            })
            .await?;
        if !response.status().is_success() {
            return Err(Self::extract_error(response).await);
        }
        let text = response
            .text()
            .await
            .map_err(|e| SchemaError::Unavailable(e.to_string()))?;
        let registered: RegisterResponse = serde_json::from_str(&text)?;
        debug!(subject, id = registered.id, "Registered schema");
        Ok(registered.id)
    }

    async fn get_by_id(&self, id: u32) -> SchemaResult<Schema> {
        let path = format!("schemas/ids/{id}");
        let response = self
            .send(&path, |http, url| http.get(url).header(reqwest::header::ACCEPT, REGISTRY_CONTENT_TYPE))
            .await?;
        if !response.status().is_success() {
            return Err(Self::extract_error(response).await);
        }
        let text = response
            .text()
            .await
            .map_err(|e| SchemaError::Unavailable(e.to_string()))?;
        let body: SchemaResponse = serde_json::from_str(&text)?;
        Ok(Schema::parse_str(&body.schema)?)
    }
}

/// A process-local registry.
///
/// Ids start at 1 and are shared across subjects for identical schemas, like
/// a Confluent registry.
#[derive(Debug)]
pub struct InMemorySchemaRegistry {
    by_fingerprint: RwLock<HashMap<i64, u32>>,
    by_id: RwLock<HashMap<u32, Schema>>,
    subjects: RwLock<HashMap<String, Vec<u32>>>,
    next_id: AtomicU32,
    reachable: AtomicBool,
}

impl Default for InMemorySchemaRegistry {
    fn default() -> Self {
        Self {
            by_fingerprint: RwLock::new(HashMap::new()),
            by_id: RwLock::new(HashMap::new()),
            subjects: RwLock::new(HashMap::new()),
            next_id: AtomicU32::new(1),
            reachable: AtomicBool::new(true),
        }
    }
}

impl InMemorySchemaRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Simulate the registry going down (`false`) or coming back (`true`).
    pub fn set_reachable(&self, reachable: bool) {
        self.reachable.store(reachable, Ordering::SeqCst);
    }

    pub fn is_reachable(&self) -> bool {
        self.reachable.load(Ordering::SeqCst)
    }

    /// Ids registered under `subject`, in registration order.
    pub fn versions(&self, subject: &str) -> Vec<u32> {
        self.subjects
            .read()
            .ok()
            .and_then(|s| s.get(subject).cloned())
            .unwrap_or_default()
    }

    fn ensure_reachable(&self) -> SchemaResult<()> {
        if self.is_reachable() {
            Ok(())
        } else {
            Err(SchemaError::Unavailable("in-memory registry is unreachable".into()))
        }
    }
}

fn poisoned() -> SchemaError {
    SchemaError::Configuration("registry lock poisoned".into())
}

#[async_trait]
impl SchemaRegistry for InMemorySchemaRegistry {
    async fn register(&self, subject: &str, schema: &Schema) -> SchemaResult<u32> {
        self.ensure_reachable()?;
        let fp = fingerprint(schema);
        let id = {
            let mut by_fingerprint = self.by_fingerprint.write().map_err(|_| poisoned())?;
            match by_fingerprint.get(&fp) {
                Some(id) => *id,
                None => {
                    let id = self.next_id.fetch_add(1, Ordering::SeqCst);
                    by_fingerprint.insert(fp, id);
                    self.by_id.write().map_err(|_| poisoned())?.insert(id, schema.clone());
                    id
                }
            }
        };
        let mut subjects = self.subjects.write().map_err(|_| poisoned())?;
        let versions = subjects.entry(subject.to_string()).or_default();
        if !versions.contains(&id) {
            versions.push(id);
        }
        Ok(id)
    }

    async fn get_by_id(&self, id: u32) -> SchemaResult<Schema> {
        self.ensure_reachable()?;
        self.by_id
            .read()
            .map_err(|_| poisoned())?
            .get(&id)
            .cloned()
            .ok_or_else(|| SchemaError::NotFound(format!("schema id {id}")))
    }
}
