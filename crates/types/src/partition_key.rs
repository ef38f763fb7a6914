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
use std::str::FromStr;

use crate::identifiers::PARTITION_KEY_DELIMITER;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PartitionKeyError {
    #[error("partition key must have at least one non-empty component")]
    Empty,
    #[error("partition key component '{0}' contains the '|' delimiter")]
    DelimiterInComponent(String),
    #[error("partition key '{key}' has {actual} components, expected {expected}")]
    WrongArity {
        key: String,
        expected: usize,
        actual: usize,
    },
    #[error("partition key '{key}' has an invalid component: {reason}")]
    InvalidComponent { key: String, reason: String },
}

/// Structured identity of a partition within its namespace.
///
/// Partition kinds build keys from their typed identity fields; stores persist the
/// pipe-delimited [`Display`](fmt::Display) form, which [`PartitionKey::parse`] turns
/// back into the same components. Components may be empty but must not contain `|`.
#[derive(
    Debug,
    Clone,
    PartialEq,
    Eq,
    Hash,
    PartialOrd,
    Ord,
    serde_with::SerializeDisplay,
    serde_with::DeserializeFromStr,
)]
pub struct PartitionKey {
    components: Vec<String>,
}

impl PartitionKey {
    pub fn new<I, S>(components: I) -> Result<Self, PartitionKeyError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let components: Vec<String> = components.into_iter().map(Into::into).collect();

        if let Some(component) = components
            .iter()
            .find(|c| c.contains(PARTITION_KEY_DELIMITER))
        {
            return Err(PartitionKeyError::DelimiterInComponent(component.clone()));
        }
        if components.iter().all(String::is_empty) {
            return Err(PartitionKeyError::Empty);
        }

        Ok(Self { components })
    }

    pub fn single(component: impl Into<String>) -> Result<Self, PartitionKeyError> {
        Self::new([component])
    }

    /// Parses the stored string form.
    pub fn parse(key: &str) -> Result<Self, PartitionKeyError> {
        Self::new(key.split(PARTITION_KEY_DELIMITER))
    }

    /// Returns the components as a fixed-size array, failing if the key has a different
    /// number of components.
    pub fn parts<const N: usize>(&self) -> Result<[&str; N], PartitionKeyError> {
        let parts: Vec<&str> = self.components.iter().map(String::as_str).collect();
        parts
            .try_into()
            .map_err(|parts: Vec<&str>| PartitionKeyError::WrongArity {
                key: self.to_string(),
                expected: N,
                actual: parts.len(),
            })
    }

    pub fn invalid_component(&self, reason: impl Into<String>) -> PartitionKeyError {
        PartitionKeyError::InvalidComponent {
            key: self.to_string(),
            reason: reason.into(),
        }
    }
}

impl fmt::Display for PartitionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut components = self.components.iter();
        if let Some(first) = components.next() {
            f.write_str(first)?;
        }
        for component in components {
            write!(f, "{PARTITION_KEY_DELIMITER}{component}")?;
        }
        Ok(())
    }
}

impl FromStr for PartitionKey {
    type Err = PartitionKeyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn composite_keys_use_pipe_delimiter() {
        let key = PartitionKey::new(["export-1", "bucket", "prefix/part-000.parquet"]).unwrap();
        assert_eq!(key.to_string(), "export-1|bucket|prefix/part-000.parquet");

        let parsed = PartitionKey::parse("export-1|bucket|prefix/part-000.parquet").unwrap();
        assert_eq!(parsed, key);
        assert_eq!(
            parsed.parts::<3>().unwrap(),
            ["export-1", "bucket", "prefix/part-000.parquet"]
        );
    }

    #[test]
    fn rejects_delimiter_in_component() {
        assert_eq!(
            PartitionKey::new(["db1", "a|b"]),
            Err(PartitionKeyError::DelimiterInComponent("a|b".to_owned()))
        );
        assert_eq!(PartitionKey::single(""), Err(PartitionKeyError::Empty));
    }

    #[test]
    fn wrong_arity_is_reported() {
        let key = PartitionKey::parse("db1|cluster").unwrap();
        assert_eq!(
            key.parts::<3>(),
            Err(PartitionKeyError::WrongArity {
                key: "db1|cluster".to_owned(),
                expected: 3,
                actual: 2,
            })
        );
    }

    #[test]
    fn serializes_as_string() {
        let key = PartitionKey::new(["db1", "table", "1700000000000"]).unwrap();
        let json = serde_json::to_string(&key).unwrap();
        assert_eq!(json, "\"db1|table|1700000000000\"");
        assert_eq!(serde_json::from_str::<PartitionKey>(&json).unwrap(), key);
    }
}
