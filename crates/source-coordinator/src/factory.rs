// Copyright (c) 2023 - 2025 Restate Software, Inc., Restate GmbH.
// All rights reserved.
//
// Use of this software is governed by the Business Source License
// included in the LICENSE file.
//
// As of the Change Date specified in that file, in accordance with
// the Business Source License, use of this software will be governed
// by the Apache License, Version 2.0.

use std::collections::HashMap;
use std::fmt;

use tracing::warn;

use sluice_types::partition_item::SourcePartitionStoreItem;

use crate::error::PartitionDecodeError;
use crate::partition::{PartitionKind, SourcePartition};

type Decoder<P> =
    Box<dyn Fn(SourcePartitionStoreItem) -> Result<P, PartitionDecodeError> + Send + Sync>;

/// Turns stored items into typed partitions.
///
/// Kinds are registered under their partition type tag; the kind without a tag is
/// registered for the `GLOBAL` namespace. Decoding dispatches on the tag at the end of
/// the item's namespace, so the coordinator never needs to know the kinds of a source.
pub struct PartitionFactory<P> {
    decoders: HashMap<&'static str, Decoder<P>>,
}

impl<P: 'static> PartitionFactory<P> {
    pub fn new() -> Self {
        Self {
            decoders: HashMap::new(),
        }
    }

    /// Registers kind `K`, wrapping decoded partitions with `wrap`. Registering a second
    /// kind under the same tag replaces the first.
    pub fn register<K: PartitionKind>(
        &mut self,
        wrap: impl Fn(SourcePartition<K>) -> P + Send + Sync + 'static,
    ) -> &mut Self {
        let partition_type = K::partition_type_name();
        let decoder: Decoder<P> =
            Box::new(move |item| SourcePartition::<K>::from_store_item(item).map(&wrap));

        if self.decoders.insert(partition_type, decoder).is_some() {
            warn!(%partition_type, "Replaced the partition kind registered for this type");
        }
        self
    }

    pub fn with<K: PartitionKind>(
        mut self,
        wrap: impl Fn(SourcePartition<K>) -> P + Send + Sync + 'static,
    ) -> Self {
        self.register::<K>(wrap);
        self
    }

    pub fn is_registered(&self, partition_type: &str) -> bool {
        self.decoders.contains_key(partition_type)
    }

    pub fn decode(&self, item: SourcePartitionStoreItem) -> Result<P, PartitionDecodeError> {
        let partition_type = item.source_identifier.partition_type();

        let decoder = self.decoders.get(partition_type).ok_or_else(|| {
            PartitionDecodeError::UnknownPartitionType(partition_type.to_owned())
        })?;
        decoder(item)
    }
}

impl<P> fmt::Debug for PartitionFactory<P> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut partition_types: Vec<_> = self.decoders.keys().collect();
        partition_types.sort();
        f.debug_struct("PartitionFactory")
            .field("partition_types", &partition_types)
            .finish()
    }
}
