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

pub const DATA_FILE_PARTITION_TYPE: &str = "DATAFILE";

/// One exported object to load, keyed `exportTaskId|bucket|objectKey`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DataFilePartition {
    export_task_id: String,
    bucket: String,
    object_key: String,
}

impl DataFilePartition {
    pub fn new(
        export_task_id: impl Into<String>,
        bucket: impl Into<String>,
        object_key: impl Into<String>,
    ) -> Self {
        Self {
            export_task_id: export_task_id.into(),
            bucket: bucket.into(),
            object_key: object_key.into(),
        }
    }

    pub fn export_task_id(&self) -> &str {
        &self.export_task_id
    }

    pub fn bucket(&self) -> &str {
        &self.bucket
    }

    pub fn object_key(&self) -> &str {
        &self.object_key
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DataFileProgressState {
    #[serde(default)]
    pub loaded: bool,
    #[serde(default)]
    pub total_records: u64,
    pub source_database: Option<String>,
    pub source_table: Option<String>,
    #[serde(default)]
    pub primary_keys: Vec<String>,
    pub snapshot_time: Option<MillisSinceEpoch>,
}

impl PartitionKind for DataFilePartition {
    const PARTITION_TYPE: Option<&'static str> = Some(DATA_FILE_PARTITION_TYPE);

    type ProgressState = DataFileProgressState;

    fn partition_key(&self) -> Result<PartitionKey, PartitionKeyError> {
        PartitionKey::new([
            self.export_task_id.as_str(),
            self.bucket.as_str(),
            self.object_key.as_str(),
        ])
    }

    fn from_partition_key(key: &PartitionKey) -> Result<Self, PartitionKeyError> {
        let [export_task_id, bucket, object_key] = key.parts::<3>()?;
        Ok(Self::new(export_task_id, bucket, object_key))
    }
}
