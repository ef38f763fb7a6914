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

pub const LEADER_PARTITION_TYPE: &str = "LEADER";

/// The one key of the leader partition of a source.
pub const LEADER_PARTITION_KEY: &str = "GLOBAL";

/// Singleton partition whose owner discovers and creates the other partitions of a source.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LeaderPartition;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LeaderProgressState {
    pub initialized: bool,
    pub stream_start_time: Option<MillisSinceEpoch>,
}

impl PartitionKind for LeaderPartition {
    const PARTITION_TYPE: Option<&'static str> = Some(LEADER_PARTITION_TYPE);

    type ProgressState = LeaderProgressState;

    fn partition_key(&self) -> Result<PartitionKey, PartitionKeyError> {
        PartitionKey::single(LEADER_PARTITION_KEY)
    }

    fn from_partition_key(key: &PartitionKey) -> Result<Self, PartitionKeyError> {
        let [key_component] = key.parts::<1>()?;
        if key_component != LEADER_PARTITION_KEY {
            return Err(key.invalid_component(format!(
                "leader partition key must be '{LEADER_PARTITION_KEY}'"
            )));
        }
        Ok(LeaderPartition)
    }
}
