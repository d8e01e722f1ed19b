// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Log and consumer group names.
//
// A name is an optional namespace plus a local name. It has two renderings:
// the URN `namespace/name` used in APIs and logs, and the id `namespace-name`
// used wherever the name becomes a directory, topic or group identifier.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{LogError, LogResult};

const URN_SEPARATOR: char = '/';
const ID_SEPARATOR: char = '-';

/// A process-wide unique identifier for a log or a consumer group.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Name {
    namespace: Option<String>,
    name: String,
}

impl Name {
    /// Build a name from a namespace and a local name.
    pub fn of(namespace: &str, name: &str) -> LogResult<Self> {
        validate_namespace(namespace)?;
        validate_local(name, true)?;
        Ok(Self {
            namespace: Some(namespace.to_string()),
            name: name.to_string(),
        })
    }

    /// Parse a URN of the form `namespace/name` or `name`.
    pub fn of_urn(urn: &str) -> LogResult<Self> {
        match urn.split_once(URN_SEPARATOR) {
            Some((namespace, name)) => Self::of(namespace, name),
            None => {
                validate_local(urn, false)?;
                Ok(Self {
                    namespace: None,
                    name: urn.to_string(),
                })
            }
        }
    }

    /// Parse an id of the form `namespace-name` or `name`.
    ///
    /// The namespace never contains `-`, so the first separator splits.
    pub fn of_id(id: &str) -> LogResult<Self> {
        match id.split_once(ID_SEPARATOR) {
            Some((namespace, name)) => Self::of(namespace, name),
            None => Self::of_urn(id),
        }
    }

    /// The namespace, if any.
    pub fn namespace(&self) -> Option<&str> {
        self.namespace.as_deref()
    }

    /// The local name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The `namespace/name` rendering.
    pub fn urn(&self) -> String {
        match &self.namespace {
            Some(namespace) => format!("{namespace}{URN_SEPARATOR}{}", self.name),
            None => self.name.clone(),
        }
    }

    /// The `namespace-name` rendering, safe for paths and topic names.
    pub fn id(&self) -> String {
        match &self.namespace {
            Some(namespace) => format!("{namespace}{ID_SEPARATOR}{}", self.name),
            None => self.name.clone(),
        }
    }
}

fn validate_namespace(namespace: &str) -> LogResult<()> {
    if namespace.is_empty() {
        return Err(LogError::Configuration("empty namespace".into()));
    }
    if namespace.starts_with('.') || !namespace.chars().all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '.') {
        return Err(LogError::Configuration(format!(
            "invalid namespace '{namespace}': expected [A-Za-z0-9_.]"
        )));
    }
    Ok(())
}

fn validate_local(name: &str, allow_dash: bool) -> LogResult<()> {
    if name.is_empty() {
        return Err(LogError::Configuration("empty name".into()));
    }
    let valid = !name.starts_with('.')
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '.' || (allow_dash && c == '-'));
    if !valid {
        let expected = if allow_dash { "[A-Za-z0-9_.-]" } else { "[A-Za-z0-9_.]" };
        return Err(LogError::Configuration(format!(
            "invalid name '{name}': expected {expected}"
        )));
    }
    Ok(())
}

impl fmt::Display for Name {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.urn())
    }
}

impl FromStr for Name {
    type Err = LogError;

    fn from_str(urn: &str) -> Result<Self, Self::Err> {
        Self::of_urn(urn)
    }
}

impl TryFrom<String> for Name {
    type Error = LogError;

    fn try_from(urn: String) -> Result<Self, Self::Error> {
        Self::of_urn(&urn)
    }
}

impl From<Name> for String {
    fn from(name: Name) -> Self {
        name.urn()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_urn_and_id() {
        let name = Name::of("test", "group-a").unwrap();
        assert_eq!(name.urn(), "test/group-a");
        assert_eq!(name.id(), "test-group-a");
        assert_eq!(name.namespace(), Some("test"));
        assert_eq!(name.name(), "group-a");
    }

    #[test]
    fn test_of_id_splits_on_first_dash() {
        let name = Name::of_id("test-group-a").unwrap();
        assert_eq!(name, Name::of_urn("test/group-a").unwrap());
    }

    #[test]
    fn test_name_without_namespace() {
        let name = Name::of_urn("unknown_log_name").unwrap();
        assert_eq!(name.namespace(), None);
        assert_eq!(name.urn(), "unknown_log_name");
        assert_eq!(name.id(), "unknown_log_name");
        assert_eq!(Name::of_id("unknown_log_name").unwrap(), name);
    }

    #[test]
    fn test_invalid_names() {
        assert!(Name::of_urn("").is_err());
        assert!(Name::of_urn("a/").is_err());
        assert!(Name::of_urn("/a").is_err());
        assert!(Name::of_urn("a/b/c").is_err());
        assert!(Name::of("ns-x", "log").is_err());
        assert!(Name::of_urn("no-namespace-dash").is_err());
        assert!(Name::of_urn("test/../escape").is_err());
        assert!(Name::of_urn("test/.hidden").is_err());
    }

    #[test]
    fn test_serde_as_urn() {
        let name = Name::of_urn("test/myLog").unwrap();
        let json = serde_json::to_string(&name).unwrap();
        assert_eq!(json, "\"test/myLog\"");
        let back: Name = serde_json::from_str(&json).unwrap();
        assert_eq!(back, name);
        assert!(serde_json::from_str::<Name>("\"bad/na/me\"").is_err());
    }

    proptest! {
        #[test]
        fn test_id_roundtrip(namespace in "[a-z][a-z0-9_]{0,8}", local in "[a-zA-Z0-9_][a-zA-Z0-9_-]{0,12}") {
            let name = Name::of(&namespace, &local).unwrap();
            prop_assert_eq!(Name::of_id(&name.id()).unwrap(), name.clone());
            prop_assert_eq!(Name::of_urn(&name.urn()).unwrap(), name);
        }
    }
}
