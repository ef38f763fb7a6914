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

use serde::{Deserialize, Serialize};
use serde_with::serde_as;

use super::InvalidConfigurationError;
use crate::identifiers::{InvalidIdentifierError, OwnerId, SourceIdentifier, UNRESOLVED_HOSTNAME};

/// # Source coordination options
///
/// Every node running the same source must use the same source identifier and partition
/// prefix, otherwise the nodes will coordinate in disjoint namespaces.
#[serde_as]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, derive_builder::Builder)]
#[serde(rename_all = "kebab-case", default)]
#[builder(default)]
pub struct SourceCoordinationOptions {
    /// # Source identifier
    ///
    /// Identifies the source whose partitions are coordinated. Must not contain `|`.
    #[builder(setter(into))]
    pub source_identifier: String,

    /// # Partition prefix
    ///
    /// Optional scope (pipeline or tenant name) prepended to the source identifier.
    #[builder(setter(into, strip_option))]
    pub partition_prefix: Option<String>,

    /// # Owner id
    ///
    /// Identity recorded as lease owner. It defaults to the node's hostname. Nodes sharing
    /// a store must use distinct owner ids.
    #[builder(setter(into, strip_option))]
    owner_id: Option<String>,

    /// # Default lease duration
    ///
    /// How long an acquired partition stays owned without a progress save. Owners must
    /// save progress well within this interval.
    ///
    /// Can be configured using the [`humantime`](https://docs.rs/humantime/latest/humantime/fn.parse_duration.html) format.
    #[serde_as(as = "serde_with::DisplayFromStr")]
    pub default_lease_duration: humantime::Duration,
}

impl SourceCoordinationOptions {
    pub fn owner_id(&self) -> OwnerId {
        self.owner_id
            .as_deref()
            .map(OwnerId::from)
            .unwrap_or_else(OwnerId::from_hostname)
    }

    pub fn source_identifier(&self) -> Result<SourceIdentifier, InvalidIdentifierError> {
        match &self.partition_prefix {
            Some(prefix) => SourceIdentifier::with_prefix(prefix, &self.source_identifier),
            None => SourceIdentifier::new(&self.source_identifier),
        }
    }

    pub fn default_lease_duration(&self) -> Duration {
        self.default_lease_duration.into()
    }

    pub fn validate(&self) -> Result<(), InvalidConfigurationError> {
        self.source_identifier()?;
        let owner_id = self.owner_id();
        if owner_id.as_str().is_empty() {
            return Err(InvalidConfigurationError::EmptyOwnerId);
        }
        if owner_id.as_str() == UNRESOLVED_HOSTNAME {
            return Err(InvalidConfigurationError::UnresolvedOwnerId);
        }
        if self.default_lease_duration().is_zero() {
            return Err(InvalidConfigurationError::ZeroLeaseDuration);
        }
        Ok(())
    }
}

impl Default for SourceCoordinationOptions {
    fn default() -> Self {
        Self {
            source_identifier: "source".to_owned(),
            partition_prefix: None,
            owner_id: None,
            default_lease_duration: Duration::from_secs(10 * 60).into(),
        }
    }
}
