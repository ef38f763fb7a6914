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

use sluice_types::partition_key::{PartitionKey, PartitionKeyError};

use crate::partition::PartitionKind;

pub const STREAM_PARTITION_TYPE: &str = "STREAM";

/// Change stream of one database, keyed by the database identifier.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamPartition {
    db_identifier: String,
}

impl StreamPartition {
    pub fn new(db_identifier: impl Into<String>) -> Self {
        Self {
            db_identifier: db_identifier.into(),
        }
    }

    pub fn db_identifier(&self) -> &str {
        &self.db_identifier
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StreamProgressState {
    pub engine: Option<String>,
    /// Engine specific stream position, e.g. a binlog coordinate or an LSN.
    pub current_position: Option<String>,
    /// Streaming must not start before the initial export has been loaded.
    #[serde(default)]
    pub wait_for_export: bool,
    #[serde(default)]
    pub tables: Vec<String>,
}

impl PartitionKind for StreamPartition {
    const PARTITION_TYPE: Option<&'static str> = Some(STREAM_PARTITION_TYPE);

    type ProgressState = StreamProgressState;

    fn partition_key(&self) -> Result<PartitionKey, PartitionKeyError> {
        PartitionKey::single(self.db_identifier.as_str())
    }

    fn from_partition_key(key: &PartitionKey) -> Result<Self, PartitionKeyError> {
        let [db_identifier] = key.parts::<1>()?;
        Ok(Self::new(db_identifier))
    }
}
