// Copyright (c) 2023 - 2025 Restate Software, Inc., Restate GmbH.
// All rights reserved.
//
// Use of this software is governed by the Business Source License
// included in the LICENSE file.
//
// As of the Change Date specified in that file, in accordance with
// the Business Source License, use of this software will be governed
// by the Apache License, Version 2.0.


use std::sync::Arc;
use std::time::Duration;

use metrics::{counter, histogram};
use tokio::time::Instant;
use tracing::{debug, error, info, warn};

use sluice_clock::{Clock, MillisSinceEpoch, WallClock};
use sluice_coordination_store::{SourceCoordinationStore, WriteError};
use sluice_types::config::{InvalidConfigurationError, SourceCoordinationOptions};
use sluice_types::identifiers::{GLOBAL_STATE_TYPE, OwnerId, PartitionNamespace, SourceIdentifier};
use sluice_types::partition_item::{SourcePartitionStatus, SourcePartitionStoreItem};

use crate::error::CoordinatorError;
use crate::factory::PartitionFactory;
use crate::metric_definitions::{
    OPERATION_ACQUIRE, OPERATION_CLOSE, OPERATION_COMPLETE, OPERATION_CREATE, OPERATION_GET,
    OPERATION_GIVE_UP, OPERATION_INITIALIZE, OPERATION_QUERY, OPERATION_SAVE_PROGRESS,
    OUTCOME_ACQUIRED, OUTCOME_CREATED, OUTCOME_EXISTS, OUTCOME_NONE_AVAILABLE,
    SOURCE_COORDINATOR_ACQUIRE_TOTAL, SOURCE_COORDINATOR_CREATE_TOTAL,
    SOURCE_COORDINATOR_LEASE_LOST_TOTAL, SOURCE_COORDINATOR_STORE_DURATION, describe_metrics,
};
use crate::partition::{PartitionKind, SourcePartition};
use crate::partitions::Partition;

/// Hands out partitions of a source to the nodes processing it.
///
/// Every node creates one coordinator with its own owner id over a store shared by all
/// nodes. A node owns a partition from acquiring it until its lease runs out, so it must
/// save progress at least every [`renewal_interval`](Self::renewal_interval) while
/// working on it. Once a node's update is rejected with [`CoordinatorError::LeaseLost`]
/// another node may already be working on the partition. Ownership is at least once: the
/// work done since the last saved progress may be repeated by the next owner.
///
/// The coordinator keeps no state besides its configuration; clones share the store.
pub struct LeaseBasedSourceCoordinator<P = Partition> {
    store: Arc<dyn SourceCoordinationStore>,
    factory: Arc<PartitionFactory<P>>,
    clock: Arc<dyn Clock>,
    source_identifier: SourceIdentifier,
    owner_id: OwnerId,
    default_lease_duration: Duration,
}

impl<P> Clone for LeaseBasedSourceCoordinator<P> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
            factory: Arc::clone(&self.factory),
            clock: Arc::clone(&self.clock),
            source_identifier: self.source_identifier.clone(),
            owner_id: self.owner_id.clone(),
            default_lease_duration: self.default_lease_duration,
        }
    }
}

impl<P: 'static> LeaseBasedSourceCoordinator<P> {
    pub fn new<S>(
        options: &SourceCoordinationOptions,
        store: S,
        factory: PartitionFactory<P>,
    ) -> Result<Self, InvalidConfigurationError>
    where
        S: SourceCoordinationStore + 'static,
    {
        options.validate()?;
        describe_metrics();

        Ok(Self {
            store: Arc::new(store),
            factory: Arc::new(factory),
            clock: Arc::new(WallClock),
            source_identifier: options.source_identifier()?,
            owner_id: options.owner_id(),
            default_lease_duration: options.default_lease_duration(),
        })
    }

    /// Uses `clock` for lease timeouts, reopen times and status timestamps.
    pub fn with_clock(mut self, clock: impl Clock) -> Self {
        self.clock = Arc::new(clock);
        self
    }

    pub fn owner_id(&self) -> &OwnerId {
        &self.owner_id
    }

    pub fn source_identifier(&self) -> &SourceIdentifier {
        &self.source_identifier
    }

    pub fn default_lease_duration(&self) -> Duration {
        self.default_lease_duration
    }

    /// How often an owner should save progress to keep its lease.
    pub fn renewal_interval(&self) -> Duration {
        self.default_lease_duration / 2
    }

    /// Provisions the store. Every node may call this on start up.
    pub async fn initialize(&self) -> Result<(), CoordinatorError> {
        let start_time = Instant::now();
        let result = self.store.initialize_store().await;
        record_store_duration(OPERATION_INITIALIZE, start_time);

        if result? {
            info!(source = %self.source_identifier, "Initialized source coordination store");
        }
        Ok(())
    }

    /// Stores `partition` unless a partition with the same key exists. Returns whether this
    /// call created it. Partitions without a partition type are stored as global state.
    pub async fn create_partition<K: PartitionKind>(
        &self,
        partition: &SourcePartition<K>,
    ) -> Result<bool, CoordinatorError> {
        let partition_key = partition.partition_key().to_string();
        let progress_state = self.serialize_progress_state(partition)?;
        let now = self.clock.now();

        let item = match K::PARTITION_TYPE {
            Some(partition_type) => SourcePartitionStoreItem::new_unassigned(
                self.source_identifier.namespace(partition_type),
                partition_key,
                progress_state,
                now,
            ),
            None => SourcePartitionStoreItem::new_read_only(
                self.source_identifier.global_namespace(),
                partition_key,
                progress_state,
                now,
            ),
        };
        let namespace = item.source_identifier.clone();
        let partition_key = item.partition_key.clone();

        let start_time = Instant::now();
        let result = self.store.try_create_partition_item(item).await;
        record_store_duration(OPERATION_CREATE, start_time);

        let created = result.map_err(|err| CoordinatorError::Store(err.into()))?;
        let outcome = if created {
            debug!(%namespace, %partition_key, "Created partition");
            OUTCOME_CREATED
        } else {
            debug!(%namespace, %partition_key, "Partition already exists");
            OUTCOME_EXISTS
        };
        counter!(
            SOURCE_COORDINATOR_CREATE_TOTAL,
            "partition_type" => K::partition_type_name(),
            "outcome" => outcome
        )
        .increment(1);

        Ok(created)
    }

    /// Acquires a lease on one partition of `partition_type` that is unassigned, whose
    /// lease expired, or that is due to be reopened. Returns [`None`] if there is no such
    /// partition or other nodes claimed all of them first.
    pub async fn acquire_available_partition(
        &self,
        partition_type: &str,
    ) -> Result<Option<P>, CoordinatorError> {
        if partition_type == GLOBAL_STATE_TYPE {
            error!(
                source = %self.source_identifier,
                "Global state cannot be acquired, use get_partition to read it instead"
            );
            return Ok(None);
        }
        let namespace = self.source_identifier.namespace(partition_type);

        let start_time = Instant::now();
        let result = self
            .store
            .try_acquire_available_partition(
                &namespace,
                &self.owner_id,
                self.default_lease_duration,
            )
            .await;
        record_store_duration(OPERATION_ACQUIRE, start_time);

        let Some(item) = result? else {
            counter!(
                SOURCE_COORDINATOR_ACQUIRE_TOTAL,
                "partition_type" => partition_type.to_owned(),
                "outcome" => OUTCOME_NONE_AVAILABLE
            )
            .increment(1);
            return Ok(None);
        };
        counter!(
            SOURCE_COORDINATOR_ACQUIRE_TOTAL,
            "partition_type" => partition_type.to_owned(),
            "outcome" => OUTCOME_ACQUIRED
        )
        .increment(1);

        debug!(
            %namespace,
            partition_key = %item.partition_key,
            owner = %self.owner_id,
            ownership_timeout = ?item.ownership_timeout,
            "Acquired partition"
        );

        let partition_key = item.partition_key.clone();
        self.factory.decode(item).map(Some).map_err(|err| {
            // the lease stays with this node until it times out
            error!(%namespace, %partition_key, %err, "Acquired partition cannot be decoded");
            err.into()
        })
    }

    /// Partitions of `partition_type` that completed at or after `from`.
    pub async fn query_completed_partitions(
        &self,
        partition_type: &str,
        from: MillisSinceEpoch,
    ) -> Result<Vec<P>, CoordinatorError> {
        let namespace = self.source_identifier.namespace(partition_type);

        let start_time = Instant::now();
        let result = self
            .store
            .query_partition_items_by_status(&namespace, SourcePartitionStatus::Completed, from)
            .await;
        record_store_duration(OPERATION_QUERY, start_time);

        self.decode_all(result?)
    }

    pub async fn query_all_partitions(
        &self,
        partition_type: &str,
    ) -> Result<Vec<P>, CoordinatorError> {
        let namespace = self.source_identifier.namespace(partition_type);

        let start_time = Instant::now();
        let result = self.store.query_all_partition_items(&namespace).await;
        record_store_duration(OPERATION_QUERY, start_time);

        self.decode_all(result?)
    }

    /// Reads the global state stored under `partition_key`.
    pub async fn get_partition(&self, partition_key: &str) -> Result<Option<P>, CoordinatorError> {
        let namespace = self.source_identifier.global_namespace();

        let start_time = Instant::now();
        let result = self
            .store
            .get_partition_item(&namespace, partition_key)
            .await;
        record_store_duration(OPERATION_GET, start_time);

        result?
            .map(|item| self.factory.decode(item))
            .transpose()
            .map_err(Into::into)
    }

    /// Persists the progress of `partition`. If the partition is leased, the lease is
    /// extended to `ownership_timeout_renewal` (or the default lease duration) from now.
    ///
    /// Global state is saved through this method as well.
    pub async fn save_progress_state_for_partition<K: PartitionKind>(
        &self,
        partition: &mut SourcePartition<K>,
        ownership_timeout_renewal: Option<Duration>,
    ) -> Result<(), CoordinatorError> {
        let Some(item) = partition.store_item() else {
            error!(
                partition_key = %partition.partition_key(),
                "Cannot save progress of a partition that was not read from the store"
            );
            return Ok(());
        };
        self.ensure_not_owned_by_other(item)?;

        let mut item = item.clone();
        item.progress_state = self.serialize_progress_state(partition)?;
        if item.status == Some(SourcePartitionStatus::Assigned) {
            let renewal = ownership_timeout_renewal.unwrap_or(self.default_lease_duration);
            item.ownership_timeout = Some(self.clock.now() + renewal);
        }

        self.update_partition(partition, item, OPERATION_SAVE_PROGRESS)

            .await
    }

    /// Releases the lease on `partition` so any node can acquire it right away.
    pub async fn give_up_partition<K: PartitionKind>(
        &self,
        partition: &mut SourcePartition<K>,
    ) -> Result<(), CoordinatorError> {
        let Some(item) = self.leasable_item(partition, "give up")? else {
            return Ok(());
        };
        if item.status == Some(SourcePartitionStatus::Completed) {
            warn!(
                namespace = %item.source_identifier,
                partition_key = %item.partition_key,
                "Cannot give up a completed partition"
            );
            return Ok(());
        }

        let item = SourcePartitionStoreItem {
            status: Some(SourcePartitionStatus::Unassigned),
            partition_owner: None,
            ownership_timeout: None,
            reopen_at: None,
            progress_state: self.serialize_progress_state(partition)?,
            status_updated_at: self.clock.now(),
            ..item
        };

        self.update_partition(partition, item, OPERATION_GIVE_UP)

            .await
    }

    /// Marks `partition` as done for good. Completed partitions are never acquired again.
    pub async fn complete_partition<K: PartitionKind>(
        &self,
        partition: &mut SourcePartition<K>,
    ) -> Result<(), CoordinatorError> {
        let Some(item) = self.leasable_item(partition, "complete")? else {
            return Ok(());
        };

        let item = SourcePartitionStoreItem {
            status: Some(SourcePartitionStatus::Completed),
            partition_owner: None,
            ownership_timeout: None,
            reopen_at: None,
            progress_state: self.serialize_progress_state(partition)?,
            status_updated_at: self.clock.now(),
            ..item
        };

        self.update_partition(partition, item, OPERATION_COMPLETE)

            .await
    }

    /// Releases `partition` until `reopen_after` has passed. The partition completes
    /// instead once it has been closed `max_closed_count` times.
    pub async fn close_partition<K: PartitionKind>(
        &self,
        partition: &mut SourcePartition<K>,
        reopen_after: Duration,
        max_closed_count: u64,
    ) -> Result<(), CoordinatorError> {
        let Some(item) = self.leasable_item(partition, "close")? else {
            return Ok(());
        };
        if item.status == Some(SourcePartitionStatus::Completed) {
            warn!(
                namespace = %item.source_identifier,
                partition_key = %item.partition_key,
                "Cannot close a completed partition"
            );
            return Ok(());
        }

        let now = self.clock.now();
        let closed_count = item.closed_count + 1;
        let (status, reopen_at) = if closed_count >= max_closed_count {
            (SourcePartitionStatus::Completed, None)
        } else {
            (SourcePartitionStatus::Closed, Some(now + reopen_after))
        };
        debug!(
            namespace = %item.source_identifier,
            partition_key = %item.partition_key,
            closed_count,
            max_closed_count,
            %status,
            "Closing partition"
        );

        let item = SourcePartitionStoreItem {
            status: Some(status),
            partition_owner: None,
            ownership_timeout: None,
            reopen_at,
            closed_count,
            progress_state: self.serialize_progress_state(partition)?,
            status_updated_at: now,
            ..item
        };

        self.update_partition(partition, item, OPERATION_CLOSE)

            .await
    }

    /// The stored item of `partition` if lease operations apply to it. Partitions without
    /// a stored item and global state are logged and skipped.
    fn leasable_item<K: PartitionKind>(
        &self,
        partition: &SourcePartition<K>,
        operation: &str,
    ) -> Result<Option<SourcePartitionStoreItem>, CoordinatorError> {
        let Some(item) = partition.store_item() else {
            error!(
                partition_key = %partition.partition_key(),
                "Cannot {operation} a partition that was not read from the store"
            );
            return Ok(None);
        };
        if !item.is_leasable() {
            error!(
                namespace = %item.source_identifier,
                partition_key = %item.partition_key,
                "Cannot {operation} global state, it is never leased"
            );
            return Ok(None);
        }
        self.ensure_not_owned_by_other(item)?;

        Ok(Some(item.clone()))
    }

    /// Rejects updates through a handle that shows another node as lease owner. Writing
    /// through it would take over or extend that node's lease.
    fn ensure_not_owned_by_other(
        &self,
        item: &SourcePartitionStoreItem,
    ) -> Result<(), CoordinatorError> {
        match &item.partition_owner {
            Some(owner)
                if item.status == Some(SourcePartitionStatus::Assigned)
                    && owner != &self.owner_id =>
            {
                Err(self.lease_lost(
                    item.source_identifier.clone(),
                    item.partition_key.clone(),
                    format!("partition is owned by '{owner}'"),
                ))
            }
            _ => Ok(()),
        }
    }

    async fn update_partition<K: PartitionKind>(
        &self,
        partition: &mut SourcePartition<K>,
        item: SourcePartitionStoreItem,
        operation: &'static str,
    ) -> Result<(), CoordinatorError> {
        let namespace = item.source_identifier.clone();
        let partition_key = item.partition_key.clone();

        let start_time = Instant::now();
        let result = self.store.try_update_partition_item(item).await;
        record_store_duration(operation, start_time);

        match result {
            Ok(updated) => {
                debug!(
                    %namespace,
                    %partition_key,
                    status = ?updated.status,
                    version = %updated.version,
                    "Updated partition ({operation})"
                );
                partition.set_store_item(updated);
                Ok(())
            }
            Err(WriteError::FailedPrecondition(reason)) => {
                Err(self.lease_lost(namespace, partition_key, reason))
            }
            Err(WriteError::NotFound { .. }) => {
                error!(
                    %namespace,
                    %partition_key,
                    "Partition does not exist in the store, ignoring {operation}"
                );
                Ok(())
            }
            Err(err) => Err(CoordinatorError::Store(err.into())),
        }
    }

    fn lease_lost(
        &self,
        namespace: PartitionNamespace,
        partition_key: String,
        reason: String,
    ) -> CoordinatorError {
        warn!(
            %namespace,
            %partition_key,
            owner = %self.owner_id,
            "Lost partition lease: {reason}"
        );
        counter!(SOURCE_COORDINATOR_LEASE_LOST_TOTAL).increment(1);

        CoordinatorError::LeaseLost {
            namespace,
            partition_key,
            reason,
        }
    }

    fn serialize_progress_state<K: PartitionKind>(
        &self,
        partition: &SourcePartition<K>,
    ) -> Result<Option<String>, CoordinatorError> {
        partition
            .serialize_progress_state()
            .map_err(|source| CoordinatorError::ProgressState {
                partition_key: partition.partition_key().to_string(),
                source,
            })
    }

    fn decode_all(&self, items: Vec<SourcePartitionStoreItem>) -> Result<Vec<P>, CoordinatorError> {
        items
            .into_iter()
            .map(|item| self.factory.decode(item).map_err(Into::into))
            .collect()
    }
}

fn record_store_duration(operation: &'static str, start_time: Instant) {
    histogram!(SOURCE_COORDINATOR_STORE_DURATION, "operation" => operation)
        .record(start_time.elapsed());
}

static_assertions::assert_impl_all!(LeaseBasedSourceCoordinator: Send, Sync, Clone);
