// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Top-level configuration, from JSON or from the environment.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use tributary_distributed::DistributedConfig;
use tributary_embedded::EmbeddedConfig;
use tributary_schema::RegistryConfig;
use tributary_segment::SyncMode;

pub const ENV_BACKEND: &str = "TRIBUTARY_BACKEND";
pub const ENV_LOG_DIR: &str = "TRIBUTARY_LOG_DIR";
pub const ENV_BROKERS: &str = "TRIBUTARY_BROKERS";
pub const ENV_PREFIX: &str = "TRIBUTARY_PREFIX";
pub const ENV_SYNC: &str = "TRIBUTARY_SYNC";
pub const ENV_REGISTRY_URLS: &str = "TRIBUTARY_REGISTRY_URLS";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{0} is not set")]
    Missing(&'static str),

    #[error("invalid {var} '{value}': {reason}")]
    Invalid {
        var: &'static str,
        value: String,
        reason: String,
    },

    #[error("cannot read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid configuration file {path}: {source}")]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

pub type ConfigResult<T> = Result<T, ConfigError>;

/// Which storage engine backs the logs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum BackendConfig {
    Embedded(EmbeddedConfig),
    Distributed(DistributedConfig),
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self::Embedded(EmbeddedConfig::default())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TributaryConfig {
    pub backend: BackendConfig,
    /// Needed only by the `avroConfluent` codec.
    pub registry: Option<RegistryConfig>,
}

impl TributaryConfig {
    /// Build the configuration from `TRIBUTARY_*` environment variables.
    ///
    /// - `TRIBUTARY_BACKEND`: `embedded` (default) or `distributed`
    /// - `TRIBUTARY_LOG_DIR`: embedded base directory
    /// - `TRIBUTARY_SYNC`: `fsync`, `async` or a periodic interval in ms
    /// - `TRIBUTARY_BROKERS`: comma separated broker URLs, required for `distributed`
    /// - `TRIBUTARY_PREFIX`: topic and group prefix on the brokers
    /// - `TRIBUTARY_REGISTRY_URLS`: comma separated schema registry URLs
    pub fn from_env() -> ConfigResult<Self> {
        Self::from_lookup(|var| std::env::var(var).ok())
    }

    /// Same as [`Self::from_env`], reading variables through `lookup`.
    pub fn from_lookup<F>(lookup: F) -> ConfigResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |var: &str| lookup(var).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        let backend = match get(ENV_BACKEND).map(|v| v.to_ascii_lowercase()).as_deref() {
            None | Some("embedded") => {
                let mut config = EmbeddedConfig::default();
                if let Some(dir) = get(ENV_LOG_DIR) {
                    config.base_dir = PathBuf::from(dir);
                }
                if let Some(sync) = get(ENV_SYNC) {
                    config.sync_mode = sync.parse::<SyncMode>().map_err(|reason| ConfigError::Invalid {
                        var: ENV_SYNC,
                        value: sync.clone(),
                        reason,
                    })?;
                }
                BackendConfig::Embedded(config)
            }
            Some("distributed") => {
                let brokers = get(ENV_BROKERS).ok_or(ConfigError::Missing(ENV_BROKERS))?;
                let mut config = DistributedConfig::new(split_list(&brokers));
                if let Some(prefix) = get(ENV_PREFIX) {
                    config.prefix = prefix;
                }
                BackendConfig::Distributed(config)
            }
            Some(other) => {
                return Err(ConfigError::Invalid {
                    var: ENV_BACKEND,
                    value: other.to_string(),
                    reason: "expected embedded or distributed".into(),
                })
            }
        };

        let registry = get(ENV_REGISTRY_URLS).map(|urls| RegistryConfig {
            urls: split_list(&urls),
            ..RegistryConfig::default()
        });

        Ok(Self { backend, registry })
    }

    pub fn from_json_file(path: impl AsRef<Path>) -> ConfigResult<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        serde_json::from_str(&text).map_err(|source| ConfigError::Json {
            path: path.to_path_buf(),
            source,
        })
    }
}

fn split_list(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(str::trim)
        .filter(|item| !item.is_empty())
        .map(String::from)
        .collect()
}
