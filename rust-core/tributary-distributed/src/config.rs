// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Distributed backend configuration.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use tributary_log::Name;

/// Settings for [`crate::DistributedLogManager`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DistributedConfig {
    /// Broker base URLs, tried in order.
    pub brokers: Vec<String>,
    /// Prepended to every topic and group name on the broker.
    pub prefix: String,
    /// Upper bound on records returned by one fetch.
    pub fetch_max_records: usize,
    /// Per-request timeout in milliseconds, on top of any long-poll wait.
    #[serde(with = "millis")]
    pub request_timeout: Duration,
    /// Longest single broker wait during a read, in milliseconds.
    #[serde(with = "millis")]
    pub poll_interval: Duration,
}

impl DistributedConfig {
    /// Defaults pointing at `brokers`.
    pub fn new<I, S>(brokers: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            brokers: brokers.into_iter().map(Into::into).collect(),
            ..Self::default()
        }
    }

    pub fn topic(&self, log: &Name) -> String {
        format!("{}{}", self.prefix, log.id())
    }

    pub fn group(&self, group: &Name) -> String {
        format!("{}{}", self.prefix, group.id())
    }

    /// The log or group behind a broker-side name, if it carries the prefix.
    pub fn strip(&self, broker_name: &str) -> Option<Name> {
        let id = broker_name.strip_prefix(&self.prefix)?;
        Name::of_id(id).ok()
    }
}

impl Default for DistributedConfig {
    fn default() -> Self {
        Self {
            brokers: vec!["http://localhost:9092".to_string()],
            prefix: "tributary-".to_string(),
            fetch_max_records: 500,
            request_timeout: Duration::from_secs(30),
            poll_interval: Duration::from_secs(1),
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
