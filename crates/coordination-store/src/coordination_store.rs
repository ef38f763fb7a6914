// Copyright (c) 2023 - 2025 Restate Software, Inc., Restate GmbH.
// All rights reserved.
//
// Use of this software is governed by the Business Source License
// included in the LICENSE file.
//
// As of the Change Date specified in that file, in accordance with
// the Business Source License, use of this software will be governed
// by the Apache License, Version 2.0.

use std::time::Duration;

use async_trait::async_trait;
use tracing::debug;

use sluice_clock::MillisSinceEpoch;
use sluice_types::errors::{
    BoxedMaybeRetryableError, GenericError, IntoMaybeRetryable, MaybeRetryableError,
};
use sluice_types::identifiers::{OwnerId, PartitionNamespace};
use sluice_types::partition_item::{SourcePartitionStatus, SourcePartitionStoreItem};

#[derive(Debug, thiserror::Error)]
pub enum ReadError {
    #[error("codec error: {0}")]
    Codec(GenericError),
    #[error("other error: {0}")]
    Other(BoxedMaybeRetryableError),
}

impl ReadError {
    pub fn retryable<E: std::error::Error + Send + Sync + 'static>(error: E) -> Self {
        Self::Other(Box::new(error.into_retryable()))
    }

    pub fn terminal<E: std::error::Error + Send + Sync + 'static>(error: E) -> Self {
        Self::Other(Box::new(error.into_terminal()))
    }

    pub fn other<E: MaybeRetryableError + Send + Sync>(error: E) -> Self {
        Self::Other(Box::new(error))
    }
}

impl MaybeRetryableError for ReadError {
    fn retryable(&self) -> bool {
        match self {
            ReadError::Other(err) => err.retryable(),
            ReadError::Codec(_) => false,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum WriteError {
    /// The stored item no longer matches the version the write was conditioned on.
    #[error("failed precondition: {0}")]
    FailedPrecondition(String),
    #[error("partition item '{partition_key}' does not exist in '{namespace}'")]
    NotFound {
        namespace: PartitionNamespace,
        partition_key: String,
    },
    #[error("other error: {0}")]
    Other(BoxedMaybeRetryableError),
    #[error("codec error: {0}")]
    Codec(GenericError),
}

impl WriteError {
    pub fn retryable<E: std::error::Error + Send + Sync + 'static>(error: E) -> Self {
        Self::Other(Box::new(error.into_retryable()))
    }

    pub fn terminal<E: std::error::Error + Send + Sync + 'static>(error: E) -> Self {
        Self::Other(Box::new(error.into_terminal()))
    }

    pub fn other<E: MaybeRetryableError + Send + Sync>(error: E) -> Self {
        Self::Other(Box::new(error))
    }
}

impl MaybeRetryableError for WriteError {
    fn retryable(&self) -> bool {
        match self {
            WriteError::Other(err) => err.retryable(),
            WriteError::Codec(_) => false,
            WriteError::FailedPrecondition(_) => false,
            WriteError::NotFound { .. } => false,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ProvisionError {
    #[error("other error: {0}")]
    Other(BoxedMaybeRetryableError),
    #[error("provisioning is not supported: {0}")]
    NotSupported(String),
}

impl ProvisionError {
    pub fn retryable<E: std::error::Error + Send + Sync + 'static>(error: E) -> Self {
        Self::Other(Box::new(error.into_retryable()))
    }

    pub fn terminal<E: std::error::Error + Send + Sync + 'static>(error: E) -> Self {
        Self::Other(Box::new(error.into_terminal()))
    }
}

impl MaybeRetryableError for ProvisionError {
    fn retryable(&self) -> bool {
        match self {
            ProvisionError::Other(err) => err.retryable(),
            ProvisionError::NotSupported(_) => false,
        }
    }
}

/// Error of operations that read and then conditionally write, such as acquiring a
/// partition. Lost races are not errors; they are resolved inside the operation.
#[derive(Debug, thiserror::Error)]
pub enum ReadWriteError {
    #[error("other error: {0}")]
    Other(BoxedMaybeRetryableError),
    #[error("codec error: {0}")]
    Codec(GenericError),
}

impl MaybeRetryableError for ReadWriteError {
    fn retryable(&self) -> bool {
        match self {
            ReadWriteError::Other(err) => err.retryable(),
            ReadWriteError::Codec(_) => false,
        }
    }
}

impl From<ReadError> for ReadWriteError {
    fn from(value: ReadError) -> Self {
        match value {
            ReadError::Other(err) => ReadWriteError::Other(err),
            ReadError::Codec(err) => ReadWriteError::Codec(err),
        }
    }
}

/// Backing store of the partition coordination. Implementations must support consistent
/// reads and atomic conditional writes: a write conditioned on a version must fail with
/// [`WriteError::FailedPrecondition`] if the stored version differs, never overwrite.
#[async_trait]
pub trait SourceCoordinationStore: Send + Sync {
    /// Provisions the store (e.g. creates the table). Returns `true` if the store was newly
    /// provisioned and `false` if it already was.
    ///
    /// # Important
    /// Every node calls this on startup, so repeated calls must be harmless.
    async fn initialize_store(&self) -> Result<bool, ProvisionError>;

    /// Inserts the item unless an item with the same namespace and key exists. Returns
    /// whether this call performed the insert.
    async fn try_create_partition_item(
        &self,
        item: SourcePartitionStoreItem,
    ) -> Result<bool, WriteError>;

    /// Finds one acquirable item in the namespace and assigns it to `owner` for
    /// `lease_duration`, atomically with respect to concurrent writers. Returns [`None`] if
    /// no item is acquirable or every candidate was claimed concurrently.
    async fn try_acquire_available_partition(
        &self,
        namespace: &PartitionNamespace,
        owner: &OwnerId,
        lease_duration: Duration,
    ) -> Result<Option<SourcePartitionStoreItem>, ReadWriteError>;

    /// Items of the namespace with the given status whose status changed at or after `from`.
    async fn query_partition_items_by_status(
        &self,
        namespace: &PartitionNamespace,
        status: SourcePartitionStatus,
        from: MillisSinceEpoch,
    ) -> Result<Vec<SourcePartitionStoreItem>, ReadError>;

    async fn query_all_partition_items(
        &self,
        namespace: &PartitionNamespace,
    ) -> Result<Vec<SourcePartitionStoreItem>, ReadError>;

    /// Writes the item if the stored item still has `item.version`. Returns the item as
    /// stored, carrying its new version.
    async fn try_update_partition_item(
        &self,
        item: SourcePartitionStoreItem,
    ) -> Result<SourcePartitionStoreItem, WriteError>;

    async fn get_partition_item(
        &self,
        namespace: &PartitionNamespace,
        partition_key: &str,
    ) -> Result<Option<SourcePartitionStoreItem>, ReadError>;
}

static_assertions::assert_obj_safe!(SourceCoordinationStore);

/// Selects and orders the items that may be acquired at `now`.
///
/// An item is a candidate iff it is not read-only and it is `UNASSIGNED`, or `ASSIGNED`
/// with `ownership_timeout < now`, or `CLOSED` with `reopen_at <= now`. Unassigned items
/// come first, then expired leases, then reopened items; within a group the item whose
/// status changed longest ago comes first.
pub fn acquire_candidates(
    items: impl IntoIterator<Item = SourcePartitionStoreItem>,
    now: MillisSinceEpoch,
) -> Vec<SourcePartitionStoreItem> {
    let mut candidates: Vec<_> = items
        .into_iter()
        .filter(|item| item.is_acquirable(now))
        .collect();

    candidates.sort_by(|a, b| {
        status_rank(a.status)
            .cmp(&status_rank(b.status))
            .then(a.status_updated_at.cmp(&b.status_updated_at))
            .then_with(|| a.partition_key.cmp(&b.partition_key))
    });

    candidates
}

fn status_rank(status: Option<SourcePartitionStatus>) -> u8 {
    match status {
        Some(SourcePartitionStatus::Unassigned) => 0,
        Some(SourcePartitionStatus::Assigned) => 1,
        Some(SourcePartitionStatus::Closed) => 2,
        Some(SourcePartitionStatus::Completed) | None => 3,
    }
}

/// Claims the first candidate that can still be updated under the version it was read
/// with. A failed precondition means another node changed the item after it was read, so
/// the next candidate is tried. There is no re-read and no waiting.
pub async fn claim_first_available<S>(
    store: &S,
    candidates: Vec<SourcePartitionStoreItem>,
    owner: &OwnerId,
    lease_duration: Duration,
    now: MillisSinceEpoch,
) -> Result<Option<SourcePartitionStoreItem>, ReadWriteError>
where
    S: SourceCoordinationStore + ?Sized,
{
    for candidate in candidates {
        let partition_key = candidate.partition_key.clone();
        let previous_owner = candidate.partition_owner.clone();

        let claimed = SourcePartitionStoreItem {
            status: Some(SourcePartitionStatus::Assigned),
            partition_owner: Some(owner.clone()),
            ownership_timeout: Some(now + lease_duration),
            reopen_at: None,
            status_updated_at: now,
            ..candidate
        };

        match store.try_update_partition_item(claimed).await {
            Ok(item) => {
                if let Some(previous_owner) = previous_owner {
                    debug!(
                        %partition_key,
                        %previous_owner,
                        %owner,
                        "Reclaimed partition whose lease expired"
                    );
                }
                return Ok(Some(item));
            }
            Err(WriteError::FailedPrecondition(msg)) => {
                debug!(%partition_key, %owner, "Lost acquire race: {msg}; trying next candidate");
            }
            Err(WriteError::NotFound { .. }) => {
                debug!(%partition_key, "Candidate vanished before it could be claimed");
            }
            Err(WriteError::Other(err)) => return Err(ReadWriteError::Other(err)),
            Err(WriteError::Codec(err)) => return Err(ReadWriteError::Codec(err)),
        }
    }

    Ok(None)
}
