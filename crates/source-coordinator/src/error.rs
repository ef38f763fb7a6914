// Copyright (c) 2023 - 2025 Restate Software, Inc., Restate GmbH.
// All rights reserved.
//
// Use of this software is governed by the Business Source License
// included in the LICENSE file.
//
// As of the Change Date specified in that file, in accordance with
// the Business Source License, use of this software will be governed
// by the Apache License, Version 2.0.

use sluice_coordination_store::{ProvisionError, ReadError, ReadWriteError, WriteError};
use sluice_types::errors::MaybeRetryableError;
use sluice_types::identifiers::PartitionNamespace;
use sluice_types::partition_key::PartitionKeyError;

/// Failure to turn a stored item into a typed partition.
#[derive(Debug, thiserror::Error)]
pub enum PartitionDecodeError {
    #[error("no partition kind is registered for partition type '{0}'")]
    UnknownPartitionType(String),
    #[error("invalid key of {partition_type} partition: {source}")]
    InvalidKey {
        partition_type: &'static str,
        #[source]
        source: PartitionKeyError,
    },
    #[error("cannot deserialize progress state of {partition_type} partition '{partition_key}': {source}")]
    ProgressState {
        partition_type: &'static str,
        partition_key: String,
        #[source]
        source: serde_json::Error,
    },
}

#[derive(Debug, thiserror::Error)]
pub enum CoordinatorError {
    /// The partition was changed by someone else since this node last read it. Whatever
    /// work the caller does on the partition must stop.
    #[error("lost lease on partition '{partition_key}' in '{namespace}': {reason}")]
    LeaseLost {
        namespace: PartitionNamespace,
        partition_key: String,
        reason: String,
    },
    #[error("cannot serialize progress state of partition '{partition_key}': {source}")]
    ProgressState {
        partition_key: String,
        #[source]
        source: serde_json::Error,
    },
    #[error(transparent)]
    Decode(#[from] PartitionDecodeError),
    #[error("store: {0}")]
    Store(#[from] StoreError),
}

impl CoordinatorError {
    pub fn is_lease_lost(&self) -> bool {
        matches!(self, CoordinatorError::LeaseLost { .. })
    }
}

impl MaybeRetryableError for CoordinatorError {
    fn retryable(&self) -> bool {
        match self {
            CoordinatorError::Store(err) => err.retryable(),
            CoordinatorError::LeaseLost { .. }
            | CoordinatorError::ProgressState { .. }
            | CoordinatorError::Decode(_) => false,
        }
    }
}

/// Errors of the coordination store, kept apart per operation kind.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error(transparent)]
    Read(#[from] ReadError),
    #[error(transparent)]
    Write(#[from] WriteError),
    #[error(transparent)]
    ReadWrite(#[from] ReadWriteError),
    #[error(transparent)]
    Provision(#[from] ProvisionError),
}

impl MaybeRetryableError for StoreError {
    fn retryable(&self) -> bool {
        match self {
            StoreError::Read(err) => err.retryable(),
            StoreError::Write(err) => err.retryable(),
            StoreError::ReadWrite(err) => err.retryable(),
            StoreError::Provision(err) => err.retryable(),
        }
    }
}

impl From<ReadError> for CoordinatorError {
    fn from(value: ReadError) -> Self {
        CoordinatorError::Store(value.into())
    }
}

impl From<ReadWriteError> for CoordinatorError {
    fn from(value: ReadWriteError) -> Self {
        CoordinatorError::Store(value.into())
    }
}

impl From<ProvisionError> for CoordinatorError {
    fn from(value: ProvisionError) -> Self {
        CoordinatorError::Store(value.into())
    }
}

#[cfg(test)]
mod tests {
    use sluice_types::errors::GenericError;

    use super::*;

    #[derive(Debug, thiserror::Error)]
    #[error("connection reset")]
    struct ConnectionReset;

    #[test]
    fn store_classification_is_forwarded() {
        let retryable: CoordinatorError = ReadError::retryable(ConnectionReset).into();
        assert!(retryable.retryable());

        let terminal: CoordinatorError = ReadError::terminal(ConnectionReset).into();
        assert!(!terminal.retryable());

        let codec = CoordinatorError::from(ReadError::Codec(GenericError::from("truncated item")));
        assert!(!codec.retryable());
    }

    #[test]
    fn lease_lost_is_terminal() {
        let err = CoordinatorError::LeaseLost {
            namespace: "rds|EXPORT".into(),
            partition_key: "db1|cluster".to_owned(),
            reason: "expected version 'v2' but found version 'v3'".to_owned(),
        };
        assert!(err.is_lease_lost());
        assert!(!err.retryable());
    }
}
