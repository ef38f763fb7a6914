// Copyright (c) 2023 - 2025 Restate Software, Inc., Restate GmbH.
// All rights reserved.
//
// Use of this software is governed by the Business Source License
// included in the LICENSE file.
//
// As of the Change Date specified in that file, in accordance with
// the Business Source License, use of this software will be governed
// by the Apache License, Version 2.0.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tracing::{debug, instrument};

use sluice_clock::{Clock, MillisSinceEpoch, WallClock};
use sluice_types::identifiers::{OwnerId, PartitionNamespace};
use sluice_types::partition_item::{SourcePartitionStatus, SourcePartitionStoreItem};

use crate::coordination_store::{
    ProvisionError, ReadError, ReadWriteError, SourceCoordinationStore, WriteError,
    acquire_candidates, claim_first_available,
};

/// In-memory [`SourceCoordinationStore`].
///
/// Clones share the same items, so several coordinators created from clones of one store
/// behave like nodes sharing a table. Each operation holds the lock only for its own
/// read or its own conditional write, which keeps the same interleavings possible as
/// against a remote store.
#[derive(Clone)]
pub struct InMemorySourceCoordinationStore {
    inner: Arc<Mutex<Inner>>,
    clock: Arc<dyn Clock>,
}

#[derive(Default)]
struct Inner {
    provisioned: bool,
    items: HashMap<PartitionNamespace, BTreeMap<String, SourcePartitionStoreItem>>,
}

impl InMemorySourceCoordinationStore {
    pub fn new() -> Self {
        Self::with_clock(WallClock)
    }

    /// Uses `clock` to decide whether leases have expired when acquiring.
    pub fn with_clock(clock: impl Clock) -> Self {
        Self {
            inner: Arc::new(Mutex::new(Inner::default())),
            clock: Arc::new(clock),
        }
    }

    fn items_in(&self, namespace: &PartitionNamespace) -> Vec<SourcePartitionStoreItem> {
        self.inner
            .lock()
            .items
            .get(namespace)
            .map(|items| items.values().cloned().collect())
            .unwrap_or_default()
    }
}

impl Default for InMemorySourceCoordinationStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait::async_trait]
impl SourceCoordinationStore for InMemorySourceCoordinationStore {
    async fn initialize_store(&self) -> Result<bool, ProvisionError> {
        let mut inner = self.inner.lock();
        if inner.provisioned {
            debug!("In-memory coordination store is already provisioned");
            Ok(false)
        } else {
            inner.provisioned = true;
            debug!("Provisioned in-memory coordination store");
            Ok(true)
        }
    }

    #[instrument(level = "trace", skip_all, fields(namespace = %item.source_identifier, key = %item.partition_key), err)]
    async fn try_create_partition_item(
        &self,
        item: SourcePartitionStoreItem,
    ) -> Result<bool, WriteError> {
        let mut inner = self.inner.lock();
        let items = inner
            .items
            .entry(item.source_identifier.clone())
            .or_default();

        if items.contains_key(&item.partition_key) {
            debug!("Partition item already exists");
            return Ok(false);
        }

        items.insert(item.partition_key.clone(), item);
        Ok(true)
    }

    #[instrument(level = "trace", skip(self), err)]
    async fn try_acquire_available_partition(
        &self,
        namespace: &PartitionNamespace,
        owner: &OwnerId,
        lease_duration: Duration,
    ) -> Result<Option<SourcePartitionStoreItem>, ReadWriteError> {
        let now = self.clock.now();
        let candidates = acquire_candidates(self.items_in(namespace), now);
        debug!(candidates = candidates.len(), "Trying to acquire partition");

        claim_first_available(self, candidates, owner, lease_duration, now).await
    }

    #[instrument(level = "trace", skip(self), err)]
    async fn query_partition_items_by_status(
        &self,
        namespace: &PartitionNamespace,
        status: SourcePartitionStatus,
        from: MillisSinceEpoch,
    ) -> Result<Vec<SourcePartitionStoreItem>, ReadError> {
        let mut items: Vec<_> = self
            .items_in(namespace)
            .into_iter()
            .filter(|item| item.status == Some(status) && item.status_updated_at >= from)
            .collect();
        items.sort_by_key(|item| item.status_updated_at);
        Ok(items)
    }

    #[instrument(level = "trace", skip(self), err)]
    async fn query_all_partition_items(
        &self,
        namespace: &PartitionNamespace,
    ) -> Result<Vec<SourcePartitionStoreItem>, ReadError> {
        Ok(self.items_in(namespace))
    }

    #[instrument(level = "trace", skip_all, fields(namespace = %item.source_identifier, key = %item.partition_key, version = %item.version), err)]
    async fn try_update_partition_item(
        &self,
        item: SourcePartitionStoreItem,
    ) -> Result<SourcePartitionStoreItem, WriteError> {
        let mut inner = self.inner.lock();
        let Some(current) = inner
            .items
            .get_mut(&item.source_identifier)
            .and_then(|items| items.get_mut(&item.partition_key))
        else {
            return Err(WriteError::NotFound {
                namespace: item.source_identifier,
                partition_key: item.partition_key,
            });
        };

        if current.version != item.version {
            return Err(WriteError::FailedPrecondition(format!(
                "expected version '{}' but found version '{}'",
                item.version, current.version
            )));
        }

        let updated = SourcePartitionStoreItem {
            version: item.version.next(),
            ..item
        };
        *current = updated.clone();
        Ok(updated)
    }

    #[instrument(level = "trace", skip(self), err)]
    async fn get_partition_item(
        &self,
        namespace: &PartitionNamespace,
        partition_key: &str,
    ) -> Result<Option<SourcePartitionStoreItem>, ReadError> {
        Ok(self
            .inner
            .lock()
            .items
            .get(namespace)
            .and_then(|items| items.get(partition_key))
            .cloned())
    }
}

static_assertions::assert_impl_all!(InMemorySourceCoordinationStore: Send, Sync, Clone);

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use futures::future::join_all;
    use test_log::test;
    use tokio::sync::Barrier;

    use sluice_clock::MockClock;
    use sluice_test_util::{assert, assert_eq, let_assert, mock_clock};
    use sluice_types::Version;

    use super::*;

    const LEASE: Duration = Duration::from_secs(600);

    fn namespace() -> PartitionNamespace {
        "pipeline|rds|DATAFILE".into()
    }

    fn unassigned(key: &str, clock: &MockClock) -> SourcePartitionStoreItem {
        SourcePartitionStoreItem::new_unassigned(
            namespace(),
            key,
            Some(r#"{"loaded":false}"#.to_owned()),
            clock.now(),
        )
    }

    fn store() -> (InMemorySourceCoordinationStore, MockClock) {
        let clock = mock_clock();
        (
            InMemorySourceCoordinationStore::with_clock(clock.clone()),
            clock,
        )
    }

    #[test(tokio::test)]
    async fn initialize_is_idempotent() -> anyhow::Result<()> {
        let (store, _) = store();
        assert!(store.initialize_store().await?);
        assert!(!store.initialize_store().await?);
        Ok(())
    }

    #[test(tokio::test)]
    async fn create_only_inserts_once() -> anyhow::Result<()> {
        let (store, clock) = store();

        assert!(
            store
                .try_create_partition_item(unassigned("a", &clock))
                .await?
        );

        let mut other = unassigned("a", &clock);
        other.progress_state = Some("{}".to_owned());
        assert!(!store.try_create_partition_item(other).await?);

        let_assert!(Some(stored) = store.get_partition_item(&namespace(), "a").await?);
        assert_eq!(
            stored.progress_state.as_deref(),
            Some(r#"{"loaded":false}"#)
        );
        assert_eq!(stored.version, Version::MIN);
        Ok(())
    }

    #[test(tokio::test)]
    async fn update_requires_matching_version() -> anyhow::Result<()> {
        let (store, clock) = store();
        store
            .try_create_partition_item(unassigned("a", &clock))
            .await?;

        let_assert!(Some(read) = store.get_partition_item(&namespace(), "a").await?);
        let stale = read.clone();

        let mut update = read;
        update.progress_state = Some(r#"{"loaded":true}"#.to_owned());
        let updated = store.try_update_partition_item(update).await?;
        assert_eq!(updated.version, Version::MIN.next());

        let result = store.try_update_partition_item(stale).await;
        assert!(let Err(WriteError::FailedPrecondition(_)) = result);

        let missing = unassigned("missing", &clock);
        let result = store.try_update_partition_item(missing).await;
        assert!(let Err(WriteError::NotFound { .. }) = result);
        Ok(())
    }

    #[test(tokio::test)]
    async fn acquire_respects_leases() -> anyhow::Result<()> {
        let (store, clock) = store();
        store
            .try_create_partition_item(unassigned("a", &clock))
            .await?;

        let node_a = OwnerId::new("node-a");
        let node_b = OwnerId::new("node-b");

        let_assert!(
            Some(acquired) = store
                .try_acquire_available_partition(&namespace(), &node_a, LEASE)
                .await?
        );
        assert_eq!(acquired.partition_owner.as_ref(), Some(&node_a));
        assert_eq!(acquired.status, Some(SourcePartitionStatus::Assigned));
        assert_eq!(acquired.ownership_timeout, Some(clock.now() + LEASE));

        assert!(
            store
                .try_acquire_available_partition(&namespace(), &node_b, LEASE)
                .await?
                .is_none()
        );

        clock.advance(LEASE + Duration::from_millis(1));

        let_assert!(
            Some(reclaimed) = store
                .try_acquire_available_partition(&namespace(), &node_b, LEASE)
                .await?
        );
        assert_eq!(reclaimed.partition_owner.as_ref(), Some(&node_b));
        assert!(reclaimed.version > acquired.version);
        Ok(())
    }

    #[test(tokio::test)]
    async fn acquire_skips_read_only_and_completed_items() -> anyhow::Result<()> {
        let (store, clock) = store();
        let global = SourcePartitionStoreItem::new_read_only(
            namespace(),
            "global",
            None,
            clock.now(),
        );
        let mut completed = unassigned("completed", &clock);
        completed.status = Some(SourcePartitionStatus::Completed);

        store.try_create_partition_item(global).await?;
        store.try_create_partition_item(completed).await?;

        assert!(
            store
                .try_acquire_available_partition(&namespace(), &OwnerId::new("node-a"), LEASE)
                .await?
                .is_none()
        );
        Ok(())
    }

    #[test(tokio::test)]
    async fn query_by_status_filters_on_status_time() -> anyhow::Result<()> {
        let (store, clock) = store();
        let start = clock.now();

        let mut early = unassigned("early", &clock);
        early.status = Some(SourcePartitionStatus::Completed);
        store.try_create_partition_item(early).await?;

        clock.advance(Duration::from_secs(10));
        let mut late = unassigned("late", &clock);
        late.status = Some(SourcePartitionStatus::Completed);
        store.try_create_partition_item(late).await?;
        store
            .try_create_partition_item(unassigned("open", &clock))
            .await?;

        let all_completed = store
            .query_partition_items_by_status(&namespace(), SourcePartitionStatus::Completed, start)
            .await?;
        assert_eq!(all_completed.len(), 2);

        let recent = store
            .query_partition_items_by_status(
                &namespace(),
                SourcePartitionStatus::Completed,
                start + Duration::from_secs(5),
            )
            .await?;
        assert_eq!(recent.len(), 1);
        assert_eq!(recent[0].partition_key, "late");

        assert_eq!(
            store.query_all_partition_items(&namespace()).await?.len(),
            3
        );
        Ok(())
    }

    #[test(tokio::test(flavor = "multi_thread", worker_threads = 8))]
    async fn concurrent_acquires_grant_each_partition_once() -> anyhow::Result<()> {
        let (store, clock) = store();
        for key in ["a", "b", "c", "d"] {
            store
                .try_create_partition_item(unassigned(key, &clock))
                .await?;
        }

        let nodes = 16;
        let barrier = Arc::new(Barrier::new(nodes));
        let acquisitions = join_all((0..nodes).map(|node| {
            let store = store.clone();
            let barrier = Arc::clone(&barrier);
            tokio::spawn(async move {
                barrier.wait().await;
                store
                    .try_acquire_available_partition(
                        &namespace(),
                        &OwnerId::new(format!("node-{node}")),
                        LEASE,
                    )
                    .await
            })
        }))
        .await;

        let mut acquired_keys = Vec::new();
        for acquisition in acquisitions {
            if let Some(item) = acquisition?? {
                acquired_keys.push(item.partition_key);
            }
        }
        acquired_keys.sort();

        assert_eq!(acquired_keys, ["a", "b", "c", "d"]);
        Ok(())
    }

    /// Store whose first conditional update loses against a concurrent writer.
    struct RacingStore {
        inner: InMemorySourceCoordinationStore,
        updates: AtomicUsize,
    }

    #[async_trait::async_trait]
    impl SourceCoordinationStore for RacingStore {
        async fn initialize_store(&self) -> Result<bool, ProvisionError> {
            self.inner.initialize_store().await
        }

        async fn try_create_partition_item(
            &self,
            item: SourcePartitionStoreItem,
        ) -> Result<bool, WriteError> {
            self.inner.try_create_partition_item(item).await
        }

        async fn try_acquire_available_partition(
            &self,
            namespace: &PartitionNamespace,
            owner: &OwnerId,
            lease_duration: Duration,
        ) -> Result<Option<SourcePartitionStoreItem>, ReadWriteError> {
            let now = self.inner.clock.now();
            let candidates = acquire_candidates(self.inner.items_in(namespace), now);
            claim_first_available(self, candidates, owner, lease_duration, now).await
        }

        async fn query_partition_items_by_status(
            &self,
            namespace: &PartitionNamespace,
            status: SourcePartitionStatus,
            from: MillisSinceEpoch,
        ) -> Result<Vec<SourcePartitionStoreItem>, ReadError> {
            self.inner
                .query_partition_items_by_status(namespace, status, from)
                .await
        }

        async fn query_all_partition_items(
            &self,
            namespace: &PartitionNamespace,
        ) -> Result<Vec<SourcePartitionStoreItem>, ReadError> {
            self.inner.query_all_partition_items(namespace).await
        }

        async fn try_update_partition_item(
            &self,
            item: SourcePartitionStoreItem,
        ) -> Result<SourcePartitionStoreItem, WriteError> {
            if self.updates.fetch_add(1, Ordering::SeqCst) == 0 {
                // another node claims the same item right before us
                let rival = SourcePartitionStoreItem {
                    partition_owner: Some(OwnerId::new("rival")),
                    ..item.clone()
                };
                self.inner.try_update_partition_item(rival).await?;
            }
            self.inner.try_update_partition_item(item).await
        }

        async fn get_partition_item(
            &self,
            namespace: &PartitionNamespace,
            partition_key: &str,
        ) -> Result<Option<SourcePartitionStoreItem>, ReadError> {
            self.inner
                .get_partition_item(namespace, partition_key)
                .await
        }
    }

    #[test(tokio::test)]
    async fn lost_race_moves_on_to_next_candidate() -> anyhow::Result<()> {
        let (inner, clock) = store();
        let store = RacingStore {
            inner,
            updates: AtomicUsize::new(0),
        };
        store
            .try_create_partition_item(unassigned("a", &clock))
            .await?;
        store
            .try_create_partition_item(unassigned("b", &clock))
            .await?;

        let node = OwnerId::new("node-a");
        let_assert!(
            Some(acquired) = store
                .try_acquire_available_partition(&namespace(), &node, LEASE)
                .await?
        );
        assert_eq!(acquired.partition_key, "b");
        assert_eq!(acquired.partition_owner.as_ref(), Some(&node));

        let_assert!(Some(lost) = store.get_partition_item(&namespace(), "a").await?);
        assert_eq!(lost.partition_owner, Some(OwnerId::new("rival")));
        Ok(())
    }

    #[test(tokio::test)]
    async fn lost_race_on_only_candidate_yields_nothing() -> anyhow::Result<()> {
        let (inner, clock) = store();
        let store = RacingStore {
            inner,
            updates: AtomicUsize::new(0),
        };
        store
            .try_create_partition_item(unassigned("a", &clock))
            .await?;

        assert!(
            store
                .try_acquire_available_partition(&namespace(), &OwnerId::new("node-a"), LEASE)
                .await?
                .is_none()
        );
        Ok(())
    }
}
