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

use serde::Serialize;
use serde::de::DeserializeOwned;

use sluice_types::identifiers::GLOBAL_STATE_TYPE;
use sluice_types::partition_item::{SourcePartitionStatus, SourcePartitionStoreItem};
use sluice_types::partition_key::{PartitionKey, PartitionKeyError};

use crate::error::PartitionDecodeError;

/// A kind of work unit the source splits its work into.
///
/// The implementing type is the typed identity of one partition of that kind. It must
/// encode into a [`PartitionKey`] and decode back into an equal value.
pub trait PartitionKind: fmt::Debug + Clone + Send + Sync + Sized + 'static {
    /// Tag that selects the namespace partitions of this kind are stored in. [`None`]
    /// marks global state, which lives in the `GLOBAL` namespace and is never leased.
    const PARTITION_TYPE: Option<&'static str>;

    type ProgressState: Serialize + DeserializeOwned + fmt::Debug + Clone + Send + Sync;

    fn partition_key(&self) -> Result<PartitionKey, PartitionKeyError>;

    fn from_partition_key(key: &PartitionKey) -> Result<Self, PartitionKeyError>;

    /// Tag used in logs and errors, `GLOBAL` for global state.
    fn partition_type_name() -> &'static str {
        Self::PARTITION_TYPE.unwrap_or(GLOBAL_STATE_TYPE)
    }
}

/// Handle to one partition: its identity, its progress and, once it has been read from or
/// written to the store, the stored item it was last seen as.
///
/// The stored item carries the version every update is conditioned on. Handles are
/// therefore passed mutably to the coordinator, which refreshes the item after each
/// successful write.
#[derive(Debug, Clone)]
pub struct SourcePartition<K: PartitionKind> {
    identity: K,
    partition_key: PartitionKey,
    progress_state: Option<K::ProgressState>,
    store_item: Option<SourcePartitionStoreItem>,
}

impl<K: PartitionKind> SourcePartition<K> {
    /// A partition that does not exist in the store yet, typically passed to
    /// `create_partition`.
    pub fn new(
        identity: K,
        progress_state: Option<K::ProgressState>,
    ) -> Result<Self, PartitionKeyError> {
        let partition_key = identity.partition_key()?;
        Ok(Self {
            identity,
            partition_key,
            progress_state,
            store_item: None,
        })
    }

    pub fn from_store_item(item: SourcePartitionStoreItem) -> Result<Self, PartitionDecodeError> {
        let partition_type = K::partition_type_name();

        let partition_key = PartitionKey::parse(&item.partition_key)
            .map_err(|source| PartitionDecodeError::InvalidKey {
                partition_type,
                source,
            })?;
        let identity = K::from_partition_key(&partition_key).map_err(|source| {
            PartitionDecodeError::InvalidKey {
                partition_type,
                source,
            }
        })?;

        let progress_state = item
            .progress_state
            .as_deref()
            .map(serde_json::from_str)
            .transpose()
            .map_err(|source| PartitionDecodeError::ProgressState {
                partition_type,
                partition_key: item.partition_key.clone(),
                source,
            })?;

        Ok(Self {
            identity,
            partition_key,
            progress_state,
            store_item: Some(item),
        })
    }

    pub fn identity(&self) -> &K {
        &self.identity
    }

    pub fn partition_type(&self) -> Option<&'static str> {
        K::PARTITION_TYPE
    }

    pub fn partition_key(&self) -> &PartitionKey {
        &self.partition_key
    }

    pub fn progress_state(&self) -> Option<&K::ProgressState> {
        self.progress_state.as_ref()
    }

    pub fn progress_state_mut(&mut self) -> Option<&mut K::ProgressState> {
        self.progress_state.as_mut()
    }

    /// Replaces the progress; it is persisted by the next coordinator call on this handle.
    pub fn set_progress_state(&mut self, progress_state: K::ProgressState) {
        self.progress_state = Some(progress_state);
    }

    pub fn store_item(&self) -> Option<&SourcePartitionStoreItem> {
        self.store_item.as_ref()
    }

    pub fn status(&self) -> Option<SourcePartitionStatus> {
        self.store_item.as_ref().and_then(|item| item.status)
    }

    pub(crate) fn set_store_item(&mut self, item: SourcePartitionStoreItem) {
        self.store_item = Some(item);
    }

    pub(crate) fn serialize_progress_state(&self) -> Result<Option<String>, serde_json::Error> {
        self.progress_state
            .as_ref()
            .map(serde_json::to_string)
            .transpose()
    }
}

#[cfg(test)]
mod tests {
    use sluice_clock::MillisSinceEpoch;
    use sluice_test_util::{assert, assert_eq, let_assert};

    use super::*;
    use crate::partitions::{
        DataFilePartition, DataFileProgressState, StreamPartition, StreamProgressState,
    };

    #[test]
    fn decodes_identity_and_progress_from_store_item() {
        let progress = StreamProgressState {
            engine: Some("postgresql".to_owned()),
            current_position: Some("0/16B3748".to_owned()),
            wait_for_export: false,
            tables: vec!["public.orders".to_owned()],
        };
        let item = SourcePartitionStoreItem::new_unassigned(
            "rds|STREAM".into(),
            "db1",
            Some(serde_json::to_string(&progress).unwrap()),
            MillisSinceEpoch::new(1_700_000_000_000),
        );

        let partition = SourcePartition::<StreamPartition>::from_store_item(item).unwrap();

        assert_eq!(partition.identity().db_identifier(), "db1");
        assert_eq!(partition.progress_state(), Some(&progress));
        assert_eq!(partition.status(), Some(SourcePartitionStatus::Unassigned));
    }

    #[test]
    fn rejects_unencodable_identity() {
        let identity = DataFilePartition::new("export-1", "bucket", "weird|key.parquet");
        let_assert!(
            Err(PartitionKeyError::DelimiterInComponent(component)) =
                SourcePartition::new(identity, Some(DataFileProgressState::default()))
        );
        assert!(component == "weird|key.parquet");
    }

    #[test]
    fn malformed_progress_state_is_a_decode_error() {
        let item = SourcePartitionStoreItem::new_unassigned(
            "rds|STREAM".into(),
            "db1",
            Some("{not json".to_owned()),
            MillisSinceEpoch::new(1_700_000_000_000),
        );

        let_assert!(
            Err(PartitionDecodeError::ProgressState { partition_type, .. }) =
                SourcePartition::<StreamPartition>::from_store_item(item)
        );
        assert!(partition_type == "STREAM");
    }
}
