// Copyright (c) 2023 - 2025 Restate Software, Inc., Restate GmbH.
// All rights reserved.
//
// Use of this software is governed by the Business Source License
// included in the LICENSE file.
//
// As of the Change Date specified in that file, in accordance with
// the Business Source License, use of this software will be governed
// by the Apache License, Version 2.0.

use sluice_clock::MillisSinceEpoch;

use crate::Version;
use crate::identifiers::{OwnerId, PartitionNamespace};

/// Lease status of a stored partition. Global state items carry no status at all.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    strum::Display,
    strum::EnumString,
    strum::IntoStaticStr,
    serde::Serialize,
    serde::Deserialize,
)]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SourcePartitionStatus {
    Unassigned,
    Assigned,
    Closed,
    Completed,
}

/// The persisted record of one partition.
///
/// Stores own this representation; the coordinator only mutates it through conditional
/// updates that carry the [`Version`] under which the item was read.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SourcePartitionStoreItem {
    pub source_identifier: PartitionNamespace,
    pub partition_key: String,
    pub status: Option<SourcePartitionStatus>,
    pub partition_owner: Option<OwnerId>,
    pub ownership_timeout: Option<MillisSinceEpoch>,
    pub progress_state: Option<String>,
    pub reopen_at: Option<MillisSinceEpoch>,
    pub closed_count: u64,
    pub read_only: bool,
    /// Time of the last status transition. Completed items record their completion time
    /// here.
    pub status_updated_at: MillisSinceEpoch,
    pub version: Version,
}

impl SourcePartitionStoreItem {
    /// A fresh, unleased item ready for insertion.
    pub fn new_unassigned(
        source_identifier: PartitionNamespace,
        partition_key: impl Into<String>,
        progress_state: Option<String>,
        now: MillisSinceEpoch,
    ) -> Self {
        Self {
            source_identifier,
            partition_key: partition_key.into(),
            status: Some(SourcePartitionStatus::Unassigned),
            partition_owner: None,
            ownership_timeout: None,
            progress_state,
            reopen_at: None,
            closed_count: 0,
            read_only: false,
            status_updated_at: now,
            version: Version::MIN,
        }
    }

    /// A global state item: never leased, never carries a status.
    pub fn new_read_only(
        source_identifier: PartitionNamespace,
        partition_key: impl Into<String>,
        progress_state: Option<String>,
        now: MillisSinceEpoch,
    ) -> Self {
        Self {
            status: None,
            read_only: true,
            ..Self::new_unassigned(source_identifier, partition_key, progress_state, now)
        }
    }

    pub fn is_leasable(&self) -> bool {
        !self.read_only && self.status.is_some()
    }

    /// Whether the item can be acquired at `now`: unassigned, assigned with an expired
    /// lease, or closed with an elapsed reopen time. Completed and read-only items are
    /// never acquirable.
    pub fn is_acquirable(&self, now: MillisSinceEpoch) -> bool {
        if self.read_only {
            return false;
        }
        match self.status {
            Some(SourcePartitionStatus::Unassigned) => true,
            Some(SourcePartitionStatus::Assigned) => {
                self.ownership_timeout.is_none_or(|timeout| timeout < now)
            }
            Some(SourcePartitionStatus::Closed) => {
                self.reopen_at.is_none_or(|reopen_at| reopen_at <= now)
            }
            Some(SourcePartitionStatus::Completed) | None => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use std::str::FromStr;
    use std::time::Duration;

    use super::*;

    fn item(now: MillisSinceEpoch) -> SourcePartitionStoreItem {
        SourcePartitionStoreItem::new_unassigned("rds|STREAM".into(), "db1", None, now)
    }

    #[test]
    fn status_uses_upper_case_names() {
        assert_eq!(SourcePartitionStatus::Unassigned.to_string(), "UNASSIGNED");
        assert_eq!(
            SourcePartitionStatus::from_str("COMPLETED").unwrap(),
            SourcePartitionStatus::Completed
        );
        assert_eq!(
            serde_json::to_string(&SourcePartitionStatus::Closed).unwrap(),
            "\"CLOSED\""
        );
    }

    #[test]
    fn assigned_items_become_acquirable_after_timeout() {
        let now = MillisSinceEpoch::new(1_700_000_000_000);
        let mut item = item(now);
        item.status = Some(SourcePartitionStatus::Assigned);
        item.partition_owner = Some(OwnerId::new("node-a"));
        item.ownership_timeout = Some(now + Duration::from_secs(60));

        assert!(!item.is_acquirable(now));

        // the lease is still valid at the exact timeout instant
        let timeout = now + Duration::from_secs(60);
        assert!(!item.is_acquirable(timeout));
        assert!(item.is_acquirable(timeout + Duration::from_millis(1)));
    }

    #[test]
    fn closed_items_reopen_at_reopen_time() {
        let now = MillisSinceEpoch::new(1_700_000_000_000);
        let mut item = item(now);
        item.status = Some(SourcePartitionStatus::Closed);
        item.reopen_at = Some(now + Duration::from_secs(5));

        assert!(!item.is_acquirable(now));
        assert!(item.is_acquirable(now + Duration::from_secs(5)));
    }

    #[test]
    fn completed_and_global_items_are_never_acquirable() {
        let now = MillisSinceEpoch::new(1_700_000_000_000);
        let mut completed = item(now);
        completed.status = Some(SourcePartitionStatus::Completed);
        assert!(!completed.is_acquirable(MillisSinceEpoch::MAX));

        let global =
            SourcePartitionStoreItem::new_read_only("rds|GLOBAL".into(), "settings", None, now);
        assert!(!global.is_leasable());
        assert!(!global.is_acquirable(MillisSinceEpoch::MAX));
    }
}
