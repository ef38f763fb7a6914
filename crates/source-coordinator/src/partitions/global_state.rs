// Copyright (c) 2023 - 2025 Restate Software, Inc., Restate GmbH.
// All rights reserved.
//
// Use of this software is governed by the Business Source License
// included in the LICENSE file.
//
// As of the Change Date specified in that file, in accordance with
// the Business Source License, use of this software will be governed
// by the Apache License, Version 2.0.

use serde_json::{Map, Value};

use sluice_types::partition_key::{PartitionKey, PartitionKeyError};

use crate::partition::PartitionKind;

/// Named, non-leased state shared by all nodes of a source, e.g. the set of tables that
/// have finished their initial load. Any node may read and write it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GlobalState {
    name: String,
}

impl GlobalState {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }

    pub fn name(&self) -> &str {
        &self.name
    }
}

impl PartitionKind for GlobalState {
    const PARTITION_TYPE: Option<&'static str> = None;

    type ProgressState = Map<String, Value>;

    fn partition_key(&self) -> Result<PartitionKey, PartitionKeyError> {
        PartitionKey::single(self.name.as_str())
    }

    fn from_partition_key(key: &PartitionKey) -> Result<Self, PartitionKeyError> {
        let [name] = key.parts::<1>()?;
        Ok(Self::new(name))
    }
}
