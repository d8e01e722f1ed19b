// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Embedded backend configuration.

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use tributary_segment::{SyncMode, DEFAULT_MAX_SEGMENT_SIZE};

/// Settings for [`crate::EmbeddedLogManager`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EmbeddedConfig {
    /// Directory holding one sub-directory per log.
    pub base_dir: PathBuf,
    pub sync_mode: SyncMode,
    /// Segment rotation threshold in bytes.
    pub max_segment_size: u64,
    /// How often a waiting read re-checks the disk for appends made by
    /// other managers, in milliseconds.
    #[serde(with = "millis")]
    pub poll_interval: Duration,
}

impl EmbeddedConfig {
    /// Defaults rooted at `base_dir`.
    pub fn new(base_dir: impl Into<PathBuf>) -> Self {
        Self {
            base_dir: base_dir.into(),
            ..Self::default()
        }
    }
}

impl Default for EmbeddedConfig {
    fn default() -> Self {
        Self {
            base_dir: PathBuf::from("data/tributary"),
            sync_mode: SyncMode::default(),
            max_segment_size: DEFAULT_MAX_SEGMENT_SIZE,
            poll_interval: Duration::from_millis(50),
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
