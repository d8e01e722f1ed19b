// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Schema stores: fingerprint -> schema maps used by self-describing codecs.
//
// `MemorySchemaStore` is process-local. `FileSchemaStore` additionally keeps
// one `.avsc` file per fingerprint in a directory, so reopening the directory
// rebuilds the same map. A new schema is written and fsynced before it enters
// the in-memory map: once any reader can observe a fingerprint, the schema is
// already on disk.

use std::collections::HashMap;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Arc, RwLock};

use apache_avro::Schema;
use async_trait::async_trait;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::error::{SchemaError, SchemaResult};
use crate::fingerprint::{fingerprint, fingerprint_hex, parse_fingerprint_hex, schema_name};

const SCHEMA_EXTENSION: &str = "avsc";

/// A fingerprint-addressed, append-only schema store.
#[async_trait]
pub trait SchemaStore: Send + Sync {
    /// Store `schema` unless present. Returns its fingerprint either way.
    async fn add_schema(&self, schema: &Schema) -> SchemaResult<i64>;

    /// The schema with this fingerprint. `None` is a normal outcome.
    async fn find_by_fingerprint(&self, fingerprint: i64) -> Option<Schema>;
}

/// Process-local schema store.
#[derive(Debug, Clone, Default)]
pub struct MemorySchemaStore {
    schemas: Arc<RwLock<HashMap<i64, Schema>>>,
}

impl MemorySchemaStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.schemas.read().map(|s| s.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn contains(&self, fingerprint: i64) -> bool {
        self.schemas
            .read()
            .map(|s| s.contains_key(&fingerprint))
            .unwrap_or(false)
    }

    /// Insert if absent. Returns `true` when the schema was new.
    fn insert(&self, fingerprint: i64, schema: &Schema) -> SchemaResult<bool> {
        let mut schemas = self
            .schemas
            .write()
            .map_err(|_| SchemaError::Configuration("schema store lock poisoned".into()))?;
        if schemas.contains_key(&fingerprint) {
            return Ok(false);
        }
        schemas.insert(fingerprint, schema.clone());
        Ok(true)
    }

    fn get(&self, fingerprint: i64) -> Option<Schema> {
        self.schemas.read().ok()?.get(&fingerprint).cloned()
    }
}

#[async_trait]
impl SchemaStore for MemorySchemaStore {
    async fn add_schema(&self, schema: &Schema) -> SchemaResult<i64> {
        let fp = fingerprint(schema);
        if self.insert(fp, schema)? {
            debug!(fingerprint = %fingerprint_hex(fp), schema = %schema_name(schema), "Registered schema");
        }
        Ok(fp)
    }

    async fn find_by_fingerprint(&self, fingerprint: i64) -> Option<Schema> {
        self.get(fingerprint)
    }
}

/// A schema store persisted as one `{name}-0x{fingerprint}.avsc` file per schema.
#[derive(Debug, Clone)]
pub struct FileSchemaStore {
    dir: PathBuf,
    memory: MemorySchemaStore,
}

impl FileSchemaStore {
    /// Open (creating if needed) a schema directory and load its schemas.
    pub async fn open(dir: impl AsRef<Path>) -> SchemaResult<Self> {
        let dir = dir.as_ref().to_path_buf();
        let create = dir.clone();
        tokio::task::spawn_blocking(move || fs::create_dir_all(&create))
            .await
            .map_err(|e| SchemaError::Io(std::io::Error::other(e)))??;
        let store = Self {
            dir: dir.clone(),
            memory: MemorySchemaStore::new(),
        };
        let loaded = store.load_schemas(&dir).await?;
        info!(dir = %dir.display(), loaded, "Opened file schema store");
        Ok(store)
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn len(&self) -> usize {
        self.memory.len()
    }

    pub fn is_empty(&self) -> bool {
        self.memory.is_empty()
    }

    /// Load every `.avsc` file of `dir` into memory. Corrupt files are skipped
    /// with a warning. Returns the number of schemas added.
    pub async fn load_schemas(&self, dir: &Path) -> SchemaResult<usize> {
        let dir = dir.to_path_buf();
        let parsed = tokio::task::spawn_blocking(move || read_schema_dir(&dir))
            .await
            .map_err(|e| SchemaError::Io(std::io::Error::other(e)))??;
        let mut added = 0;
        for (fp, schema) in parsed {
            if self.memory.insert(fp, &schema)? {
                added += 1;
            }
        }
        Ok(added)
    }

    fn schema_path(&self, fp: i64, schema: &Schema) -> PathBuf {
        let name: String = schema_name(schema)
            .chars()
            .map(|c| if c.is_ascii_alphanumeric() || c == '.' || c == '_' { c } else { '_' })
            .collect();
        self.dir
            .join(format!("{name}-{}.{SCHEMA_EXTENSION}", fingerprint_hex(fp)))
    }
}

#[async_trait]
impl SchemaStore for FileSchemaStore {
    async fn add_schema(&self, schema: &Schema) -> SchemaResult<i64> {
        let fp = fingerprint(schema);
        if self.memory.contains(fp) {
            return Ok(fp);
        }
        let path = self.schema_path(fp, schema);
        let json = serde_json::to_string_pretty(schema)?;
        tokio::task::spawn_blocking(move || write_durably(&path, json.as_bytes()))
            .await
            .map_err(|e| SchemaError::Io(std::io::Error::other(e)))??;
        if self.memory.insert(fp, schema)? {
            info!(
                fingerprint = %fingerprint_hex(fp),
                schema = %schema_name(schema),
                dir = %self.dir.display(),
                "Persisted schema"
            );
        }
        Ok(fp)
    }

    async fn find_by_fingerprint(&self, fingerprint: i64) -> Option<Schema> {
        self.memory.get(fingerprint)
    }
}

fn read_schema_dir(dir: &Path) -> SchemaResult<Vec<(i64, Schema)>> {
    let mut schemas = Vec::new();
    for entry in fs::read_dir(dir)? {
        let path = entry?.path();
        if path.extension().and_then(|e| e.to_str()) != Some(SCHEMA_EXTENSION) {
            continue;
        }
        match read_schema_file(&path) {
            Ok((fp, schema)) => schemas.push((fp, schema)),
            Err(error) => {
                warn!(path = %path.display(), error = %error, "Skipping unreadable schema file");
            }
        }
    }
    Ok(schemas)
}

fn read_schema_file(path: &Path) -> SchemaResult<(i64, Schema)> {
    let text = fs::read_to_string(path)?;
    let schema = Schema::parse_str(&text)?;
    let fp = fingerprint(&schema);
    // The fingerprint in the file name must agree with the content.
    let named = path
        .file_stem()
        .and_then(|s| s.to_str())
        .and_then(|s| s.rsplit_once('-'))
        .and_then(|(_, hex)| parse_fingerprint_hex(hex));
    match named {
        Some(named) if named == fp => Ok((fp, schema)),
        Some(named) => Err(SchemaError::Parse(format!(
            "file name fingerprint {} does not match content fingerprint {}",
            fingerprint_hex(named),
            fingerprint_hex(fp)
        ))),
        None => Err(SchemaError::Parse("file name carries no fingerprint".into())),
    }
}

/// Write via a temporary file, fsync, rename, then fsync the directory.
fn write_durably(path: &Path, bytes: &[u8]) -> std::io::Result<()> {
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

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fingerprint::parse_schema;

    const MESSAGE_V1: &str = r#"{"type":"record","name":"Message","namespace":"org.example","fields":[{"name":"id","type":"string"},{"name":"body","type":"bytes"}]}"#;
    const MESSAGE_V2: &str = r#"{"type":"record","name":"Message","namespace":"org.example","fields":[{"name":"id","type":"string"},{"name":"body","type":"bytes"},{"name":"priority","type":"int","default":0}]}"#;

    fn avsc_files(dir: &Path) -> Vec<PathBuf> {
        let mut files: Vec<PathBuf> = fs::read_dir(dir)
            .unwrap()
            .map(|e| e.unwrap().path())
            .filter(|p| p.extension().and_then(|e| e.to_str()) == Some("avsc"))
            .collect();
        files.sort();
        files
    }

    #[tokio::test]
    async fn test_memory_store_is_idempotent() {
        let store = MemorySchemaStore::new();
        let schema = parse_schema(MESSAGE_V1).unwrap();
        let a = store.add_schema(&schema).await.unwrap();
        let b = store.add_schema(&schema).await.unwrap();
        assert_eq!(a, b);
        assert_eq!(store.len(), 1);
        assert_eq!(store.find_by_fingerprint(a).await, Some(schema));
        assert_eq!(store.find_by_fingerprint(a ^ 1).await, None);
    }

    #[tokio::test]
    async fn test_file_store_writes_one_file_per_fingerprint() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileSchemaStore::open(dir.path()).await.unwrap();
        let v1 = parse_schema(MESSAGE_V1).unwrap();
        let v2 = parse_schema(MESSAGE_V2).unwrap();

        let fp1 = store.add_schema(&v1).await.unwrap();
        assert_eq!(store.add_schema(&v1).await.unwrap(), fp1);
        let fp2 = store.add_schema(&v2).await.unwrap();
        assert_ne!(fp1, fp2);

        let files = avsc_files(dir.path());
        assert_eq!(files.len(), 2);
        let expected = format!("org.example.Message-{}.avsc", fingerprint_hex(fp1));
        assert!(files.iter().any(|f| f.file_name().unwrap().to_str() == Some(expected.as_str())));
    }

    #[tokio::test]
    async fn test_file_store_reloads() {
        let dir = tempfile::tempdir().unwrap();
        let v2 = parse_schema(MESSAGE_V2).unwrap();
        let fp = {
            let store = FileSchemaStore::open(dir.path()).await.unwrap();
            store.add_schema(&v2).await.unwrap()
        };
        let reopened = FileSchemaStore::open(dir.path()).await.unwrap();
        assert_eq!(reopened.len(), 1);
        let loaded = reopened.find_by_fingerprint(fp).await.unwrap();
        assert_eq!(fingerprint(&loaded), fp);
        let Schema::Record(record) = loaded else {
            panic!("expected a record schema");
        };
        assert_eq!(record.fields[2].default, Some(serde_json::json!(0)));
    }

    #[tokio::test]
    async fn test_corrupt_files_are_skipped() {
        let dir = tempfile::tempdir().unwrap();
        let v1 = parse_schema(MESSAGE_V1).unwrap();
        {
            let store = FileSchemaStore::open(dir.path()).await.unwrap();
            store.add_schema(&v1).await.unwrap();
        }
        fs::write(dir.path().join("Broken-0x0000000000000001.avsc"), "{ not a schema").unwrap();
        fs::write(dir.path().join("Mislabeled-0x0000000000000002.avsc"), MESSAGE_V1).unwrap();
        fs::write(dir.path().join("notes.txt"), "ignored").unwrap();

        let store = FileSchemaStore::open(dir.path()).await.unwrap();
        assert_eq!(store.len(), 1);
        assert!(store.find_by_fingerprint(fingerprint(&v1)).await.is_some());
    }

    #[tokio::test]
    async fn test_concurrent_adds() {
        let dir = tempfile::tempdir().unwrap();
        let store = Arc::new(FileSchemaStore::open(dir.path()).await.unwrap());
        let schema = parse_schema(MESSAGE_V1).unwrap();
        let mut handles = Vec::new();
        for _ in 0..8 {
            let store = Arc::clone(&store);
            let schema = schema.clone();
            handles.push(tokio::spawn(async move { store.add_schema(&schema).await.unwrap() }));
        }
        let mut fps = Vec::new();
        for handle in handles {
            fps.push(handle.await.unwrap());
        }
        fps.dedup();
        assert_eq!(fps.len(), 1);
        assert_eq!(avsc_files(dir.path()).len(), 1);
    }
}
