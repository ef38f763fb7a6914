// Copyright (c) 2023 - 2025 Restate Software, Inc., Restate GmbH.
// All rights reserved.
//
// Use of this software is governed by the Business Source License
// included in the LICENSE file.
//
// As of the Change Date specified in that file, in accordance with
// the Business Source License, use of this software will be governed
// by the Apache License, Version 2.0.

use std::fmt;
use std::sync::LazyLock;

use tracing::warn;

/// Separator between the components of namespaces and composite partition keys.
pub const PARTITION_KEY_DELIMITER: char = '|';

/// Reserved partition type tag of the namespace holding non-leased global state.
pub const GLOBAL_STATE_TYPE: &str = "GLOBAL";

/// Owner id of nodes whose hostname cannot be resolved. Nodes sharing it cannot tell their
/// leases apart, so configurations resolving to it are rejected.
pub const UNRESOLVED_HOSTNAME: &str = "INVALID_HOSTNAME";

static HOSTNAME: LazyLock<String> = LazyLock::new(|| match hostname::get() {
    Ok(hostname) => hostname.into_string().unwrap_or_else(|hostname| {
        warn!(?hostname, "Hostname is not valid unicode, set an explicit owner id");
        UNRESOLVED_HOSTNAME.to_owned()
    }),
    Err(err) => {
        warn!(%err, "Cannot resolve the hostname, set an explicit owner id");
        UNRESOLVED_HOSTNAME.to_owned()
    }
});

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum InvalidIdentifierError {
    #[error("{what} must not be empty")]
    Empty { what: &'static str },
    #[error("{what} '{value}' must not contain the '|' delimiter")]
    ContainsDelimiter { what: &'static str, value: String },
}

fn validate_component(what: &'static str, value: &str) -> Result<(), InvalidIdentifierError> {
    if value.is_empty() {
        return Err(InvalidIdentifierError::Empty { what });
    }
    if value.contains(PARTITION_KEY_DELIMITER) {
        return Err(InvalidIdentifierError::ContainsDelimiter {
            what,
            value: value.to_owned(),
        });
    }
    Ok(())
}

/// Identity of the node holding a lease.
#[derive(
    Debug,
    Clone,
    PartialEq,
    Eq,
    Hash,
    PartialOrd,
    Ord,
    derive_more::Display,
    derive_more::From,
    serde::Serialize,
    serde::Deserialize,
)]
#[serde(transparent)]
pub struct OwnerId(String);

impl OwnerId {
    pub fn new(owner: impl Into<String>) -> Self {
        Self(owner.into())
    }

    /// The local hostname, resolved once per process.
    pub fn from_hostname() -> Self {
        Self(HOSTNAME.clone())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for OwnerId {
    fn from(value: &str) -> Self {
        Self(value.to_owned())
    }
}

/// Identifies the source whose partitions are coordinated, optionally scoped by a prefix
/// (for example a pipeline or tenant name). Formats as `{prefix}|{source}` or `{source}`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SourceIdentifier {
    prefix: Option<String>,
    source: String,
}

impl SourceIdentifier {
    pub fn new(source: impl Into<String>) -> Result<Self, InvalidIdentifierError> {
        let source = source.into();
        validate_component("source identifier", &source)?;
        Ok(Self {
            prefix: None,
            source,
        })
    }

    pub fn with_prefix(
        prefix: impl Into<String>,
        source: impl Into<String>,
    ) -> Result<Self, InvalidIdentifierError> {
        let prefix = prefix.into();
        validate_component("partition prefix", &prefix)?;
        let mut identifier = Self::new(source)?;
        identifier.prefix = Some(prefix);
        Ok(identifier)
    }

    pub fn prefix(&self) -> Option<&str> {
        self.prefix.as_deref()
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    /// Namespace of the partitions of the given type.
    pub fn namespace(&self, partition_type: &str) -> PartitionNamespace {
        PartitionNamespace(format!("{self}{PARTITION_KEY_DELIMITER}{partition_type}"))
    }

    /// Namespace of the non-leased global state of this source.
    pub fn global_namespace(&self) -> PartitionNamespace {
        self.namespace(GLOBAL_STATE_TYPE)
    }
}

impl fmt::Display for SourceIdentifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.prefix {
            Some(prefix) => write!(f, "{prefix}{PARTITION_KEY_DELIMITER}{}", self.source),
            None => f.write_str(&self.source),
        }
    }
}

/// Primary grouping key of stored partition items: `{sourceIdentifier}|{partitionType}`.
#[derive(
    Debug,
    Clone,
    PartialEq,
    Eq,
    Hash,
    PartialOrd,
    Ord,
    derive_more::Display,
    serde::Serialize,
    serde::Deserialize,
)]
#[serde(transparent)]
pub struct PartitionNamespace(String);

impl PartitionNamespace {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The partition type tag, i.e. the last component of the namespace.
    pub fn partition_type(&self) -> &str {
        self.0
            .rsplit_once(PARTITION_KEY_DELIMITER)
            .map(|(_, partition_type)| partition_type)
            .unwrap_or(&self.0)
    }

    pub fn is_global(&self) -> bool {
        self.partition_type() == GLOBAL_STATE_TYPE
    }
}

impl From<String> for PartitionNamespace {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl From<&str> for PartitionNamespace {
    fn from(value: &str) -> Self {
        Self(value.to_owned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn namespaces_carry_prefix_and_type() {
        let source = SourceIdentifier::with_prefix("orders-pipeline", "rds").unwrap();

        let namespace = source.namespace("EXPORT");
        assert_eq!(namespace.as_str(), "orders-pipeline|rds|EXPORT");
        assert_eq!(namespace.partition_type(), "EXPORT");
        assert!(!namespace.is_global());

        let global = SourceIdentifier::new("rds").unwrap().global_namespace();
        assert_eq!(global.as_str(), "rds|GLOBAL");
        assert!(global.is_global());
    }

    #[test]
    fn identifiers_reject_delimiter() {
        assert_eq!(
            SourceIdentifier::new("a|b"),
            Err(InvalidIdentifierError::ContainsDelimiter {
                what: "source identifier",
                value: "a|b".to_owned()
            })
        );
        assert!(SourceIdentifier::with_prefix("", "rds").is_err());
    }
}
