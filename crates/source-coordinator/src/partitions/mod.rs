// Copyright (c) 2023 - 2025 Restate Software, Inc., Restate GmbH.
// All rights reserved.
//
// Use of this software is governed by the Business Source License
// included in the LICENSE file.
//
// As of the Change Date specified in that file, in accordance with
// the Business Source License, use of this software will be governed
// by the Apache License, Version 2.0.

//! Partition kinds of a relational database source: a leader that plans the work, snapshot
//! exports, the exported data files, change streams, and resyncs of rows touched by
//! cascading changes.

mod data_file;
mod export;
mod global_state;
mod leader;
mod resync;
mod stream;

pub use data_file::*;
pub use export::*;
pub use global_state::*;
pub use leader::*;
pub use resync::*;
pub use stream::*;

use sluice_types::partition_item::SourcePartitionStoreItem;
use sluice_types::partition_key::PartitionKey;

use crate::factory::PartitionFactory;
use crate::partition::{PartitionKind, SourcePartition};

/// Any partition of a relational database source, as decoded by
/// [`PartitionFactory::<Partition>::default()`](PartitionFactory).
#[derive(Debug, Clone, derive_more::From)]
pub enum Partition {
    Leader(SourcePartition<LeaderPartition>),
    Export(SourcePartition<ExportPartition>),
    DataFile(SourcePartition<DataFilePartition>),
    Stream(SourcePartition<StreamPartition>),
    Resync(SourcePartition<ResyncPartition>),
    GlobalState(SourcePartition<GlobalState>),
}

impl Partition {
    pub fn partition_type(&self) -> Option<&'static str> {
        match self {
            Partition::Leader(_) => LeaderPartition::PARTITION_TYPE,
            Partition::Export(_) => ExportPartition::PARTITION_TYPE,
            Partition::DataFile(_) => DataFilePartition::PARTITION_TYPE,
            Partition::Stream(_) => StreamPartition::PARTITION_TYPE,
            Partition::Resync(_) => ResyncPartition::PARTITION_TYPE,
            Partition::GlobalState(_) => GlobalState::PARTITION_TYPE,
        }
    }

    pub fn partition_key(&self) -> &PartitionKey {
        match self {
            Partition::Leader(p) => p.partition_key(),
            Partition::Export(p) => p.partition_key(),
            Partition::DataFile(p) => p.partition_key(),
            Partition::Stream(p) => p.partition_key(),
            Partition::Resync(p) => p.partition_key(),
            Partition::GlobalState(p) => p.partition_key(),
        }
    }

    pub fn store_item(&self) -> Option<&SourcePartitionStoreItem> {
        match self {
            Partition::Leader(p) => p.store_item(),
            Partition::Export(p) => p.store_item(),
            Partition::DataFile(p) => p.store_item(),
            Partition::Stream(p) => p.store_item(),
            Partition::Resync(p) => p.store_item(),
            Partition::GlobalState(p) => p.store_item(),
        }
    }
}

impl Default for PartitionFactory<Partition> {
    fn default() -> Self {
        PartitionFactory::new()
            .with::<LeaderPartition>(Partition::Leader)
            .with::<ExportPartition>(Partition::Export)
            .with::<DataFilePartition>(Partition::DataFile)
            .with::<StreamPartition>(Partition::Stream)
            .with::<ResyncPartition>(Partition::Resync)
            .with::<GlobalState>(Partition::GlobalState)
    }
}
