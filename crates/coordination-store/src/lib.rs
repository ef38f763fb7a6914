// Copyright (c) 2023 - 2025 Restate Software, Inc., Restate GmbH.
// All rights reserved.
//
// Use of this software is governed by the Business Source License
// included in the LICENSE file.
//
// As of the Change Date specified in that file, in accordance with
// the Business Source License, use of this software will be governed
// by the Apache License, Version 2.0.

mod coordination_store;
mod in_memory;

pub use coordination_store::{
    ProvisionError, ReadError, ReadWriteError, SourceCoordinationStore, WriteError,
    acquire_candidates, claim_first_available,
};
pub use in_memory::InMemorySourceCoordinationStore;
