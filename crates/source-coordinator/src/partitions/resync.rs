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

pub const RESYNC_PARTITION_TYPE: &str = "RESYNC";

/// Re-read of the rows of a table affected by a cascading change at `timestamp`, keyed
/// `database|table|timestamp` with the timestamp in epoch millis.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResyncPartition {
    database: String,
    table: String,
    timestamp: MillisSinceEpoch,
}

impl ResyncPartition {
    pub fn new(
        database: impl Into<String>,
        table: impl Into<String>,
        timestamp: MillisSinceEpoch,
    ) -> Self {
        Self {
            database: database.into(),
            table: table.into(),
            timestamp,
        }
    }

    pub fn database(&self) -> &str {
        &self.database
    }

    pub fn table(&self) -> &str {
        &self.table
    }

    pub fn timestamp(&self) -> MillisSinceEpoch {
        self.timestamp
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResyncProgressState {
    pub foreign_key_name: Option<String>,
    pub updated_value: Option<serde_json::Value>,
    #[serde(default)]
    pub primary_keys: Vec<String>,
}

impl PartitionKind for ResyncPartition {
    const PARTITION_TYPE: Option<&'static str> = Some(RESYNC_PARTITION_TYPE);

    type ProgressState = ResyncProgressState;

    fn partition_key(&self) -> Result<PartitionKey, PartitionKeyError> {
        PartitionKey::new([
            self.database.clone(),
            self.table.clone(),
            self.timestamp.as_u64().to_string(),
        ])
    }

    fn from_partition_key(key: &PartitionKey) -> Result<Self, PartitionKeyError> {
        let [database, table, timestamp] = key.parts::<3>()?;
        let timestamp = timestamp.parse::<u64>().map_err(|err| {
            key.invalid_component(format!("invalid timestamp '{timestamp}': {err}"))
        })?;
        Ok(Self::new(database, table, MillisSinceEpoch::new(timestamp)))
    }
}

#[cfg(test)]
mod tests {
    use sluice_test_util::{assert, let_assert};

    use super::*;

    #[test]
    fn timestamp_is_stored_in_millis() {
        let partition = ResyncPartition::new(
            "shop",
            "orders",
            MillisSinceEpoch::new(1_700_000_000_000),
        );
        let key = partition.partition_key().unwrap();
        assert!(key.to_string() == "shop|orders|1700000000000");
        assert!(ResyncPartition::from_partition_key(&key).unwrap() == partition);
    }

    #[test]
    fn non_numeric_timestamp_is_rejected() {
        let key = PartitionKey::parse("shop|orders|yesterday").unwrap();
        let_assert!(
            Err(PartitionKeyError::InvalidComponent { .. }) =
                ResyncPartition::from_partition_key(&key)
        );
    }
}
