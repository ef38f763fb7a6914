// Copyright (c) 2023 - 2025 Restate Software, Inc., Restate GmbH.
// All rights reserved.
//
// Use of this software is governed by the Business Source License
// included in the LICENSE file.
//
// As of the Change Date specified in that file, in accordance with
// the Business Source License, use of this software will be governed
// by the Apache License, Version 2.0.

use serde::{Deserialize, Serialize};

use sluice_clock::MillisSinceEpoch;
use sluice_types::partition_key::{PartitionKey, PartitionKeyError};

use crate::partition::PartitionKind;

pub const EXPORT_PARTITION_TYPE: &str = "EXPORT";

/// Whether a snapshot export covers an Aurora cluster or a single database instance.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    strum::Display,
    strum::EnumString,
    Serialize,
    Deserialize,
)]
#[strum(serialize_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum ExportScope {
    Cluster,
    Instance,
}

/// Snapshot export of one database, keyed `dbIdentifier|scope`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportPartition {
    db_identifier: String,
    scope: ExportScope,
}

impl ExportPartition {
    pub fn new(db_identifier: impl Into<String>, scope: ExportScope) -> Self {
        Self {
            db_identifier: db_identifier.into(),
            scope,
        }
    }

    pub fn db_identifier(&self) -> &str {
        &self.db_identifier
    }

    pub fn scope(&self) -> ExportScope {
        self.scope
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExportProgressState {
    pub snapshot_id: Option<String>,
    pub export_task_id: Option<String>,
    pub iam_role_arn: Option<String>,
    pub bucket: Option<String>,
    pub prefix: Option<String>,
    pub kms_key_id: Option<String>,
    #[serde(default)]
    pub tables: Vec<String>,
    pub snapshot_time: Option<MillisSinceEpoch>,
    /// Status of the export task as reported by the database service.
    pub status: Option<String>,
}

impl PartitionKind for ExportPartition {
    const PARTITION_TYPE: Option<&'static str> = Some(EXPORT_PARTITION_TYPE);

    type ProgressState = ExportProgressState;

    fn partition_key(&self) -> Result<PartitionKey, PartitionKeyError> {
        PartitionKey::new([self.db_identifier.clone(), self.scope.to_string()])
    }

    fn from_partition_key(key: &PartitionKey) -> Result<Self, PartitionKeyError> {
        let [db_identifier, scope] = key.parts::<2>()?;
        let scope = scope
            .parse()
            .map_err(|_| key.invalid_component(format!("unknown export scope '{scope}'")))?;
        Ok(Self::new(db_identifier, scope))
    }
}

#[cfg(test)]
mod tests {
    use sluice_test_util::{assert, let_assert};

    use super::*;

    #[test]
    fn key_holds_identifier_and_scope() {
        let partition = ExportPartition::new("db1", ExportScope::Cluster);
        let key = partition.partition_key().unwrap();
        assert!(key.to_string() == "db1|cluster");
        assert!(ExportPartition::from_partition_key(&key).unwrap() == partition);
    }

    #[test]
    fn unknown_scope_is_rejected() {
        let key = PartitionKey::parse("db1|shard").unwrap();
        let_assert!(
            Err(PartitionKeyError::InvalidComponent { reason, .. }) =
                ExportPartition::from_partition_key(&key)
        );
        assert!(reason.contains("shard"));
    }
}
