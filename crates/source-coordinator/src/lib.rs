// Copyright (c) 2023 - 2025 Restate Software, Inc., Restate GmbH.
// All rights reserved.
//
// Use of this software is governed by the Business Source License
// included in the LICENSE file.
//
// As of the Change Date specified in that file, in accordance with
// the Business Source License, use of this software will be governed
// by the Apache License, Version 2.0.

//! Lease-based coordination of the partitions of a source among the nodes processing it.
//!
//! A source splits its work into partitions of several kinds. Nodes create the partitions
//! they discover and acquire them one by one through a [`LeaseBasedSourceCoordinator`];
//! the shared [`SourceCoordinationStore`](sluice_coordination_store::SourceCoordinationStore)
//! makes sure that at most one node holds an unexpired lease on a partition.

mod coordinator;
mod error;
mod factory;
mod metric_definitions;
mod partition;
pub mod partitions;

pub use coordinator::LeaseBasedSourceCoordinator;
pub use error::{CoordinatorError, PartitionDecodeError, StoreError};
pub use factory::PartitionFactory;
pub use metric_definitions::describe_metrics;
pub use partition::{PartitionKind, SourcePartition};
pub use partitions::Partition;
