// Copyright (c) 2024 -  Restate Software, Inc., Restate GmbH.
// All rights reserved.
//
// Use of this software is governed by the Business Source License
// included in the LICENSE file.
//
// As of the Change Date specified in that file, in accordance with
// the Business Source License, use of this software will be governed
// by the Apache License, Version 2.0.

mod source_coordination;

pub use source_coordination::*;

use crate::identifiers::InvalidIdentifierError;

#[derive(Debug, thiserror::Error)]
pub enum InvalidConfigurationError {
    #[error(transparent)]
    InvalidIdentifier(#[from] InvalidIdentifierError),
    #[error("owner id must not be empty")]
    EmptyOwnerId,
    #[error("hostname cannot be resolved, owner id must be set explicitly")]
    UnresolvedOwnerId,
    #[error("default lease duration must be greater than zero")]
    ZeroLeaseDuration,
}
