// Copyright (c) 2023 - 2025 Restate Software, Inc., Restate GmbH.
// All rights reserved.
//
// Use of this software is governed by the Business Source License
// included in the LICENSE file.
//
// As of the Change Date specified in that file, in accordance with
// the Business Source License, use of this software will be governed
// by the Apache License, Version 2.0.

use std::sync::Once;

use metrics::{Unit, describe_counter, describe_histogram};

// values of label `outcome` in SOURCE_COORDINATOR_ACQUIRE_TOTAL
pub const OUTCOME_ACQUIRED: &str = "acquired";
pub const OUTCOME_NONE_AVAILABLE: &str = "none_available";

// values of label `outcome` in SOURCE_COORDINATOR_CREATE_TOTAL
pub const OUTCOME_CREATED: &str = "created";
pub const OUTCOME_EXISTS: &str = "exists";

// values of label `operation`
pub const OPERATION_INITIALIZE: &str = "initialize";
pub const OPERATION_CREATE: &str = "create";
pub const OPERATION_ACQUIRE: &str = "acquire";
pub const OPERATION_QUERY: &str = "query";
pub const OPERATION_GET: &str = "get";
pub const OPERATION_SAVE_PROGRESS: &str = "save_progress";
pub const OPERATION_GIVE_UP: &str = "give_up";
pub const OPERATION_COMPLETE: &str = "complete";
pub const OPERATION_CLOSE: &str = "close";

pub(crate) const SOURCE_COORDINATOR_ACQUIRE_TOTAL: &str = "sluice.source_coordinator.acquire.total";
pub(crate) const SOURCE_COORDINATOR_CREATE_TOTAL: &str = "sluice.source_coordinator.create.total";
pub(crate) const SOURCE_COORDINATOR_LEASE_LOST_TOTAL: &str =
    "sluice.source_coordinator.lease_lost.total";
pub(crate) const SOURCE_COORDINATOR_STORE_DURATION: &str =
    "sluice.source_coordinator.store_duration.seconds";

static DESCRIBE: Once = Once::new();

pub fn describe_metrics() {
    DESCRIBE.call_once(|| {
        describe_counter!(
            SOURCE_COORDINATOR_ACQUIRE_TOTAL,
            Unit::Count,
            "Number of partition acquire attempts, by outcome"
        );

        describe_counter!(
            SOURCE_COORDINATOR_CREATE_TOTAL,
            Unit::Count,
            "Number of partition create requests, by outcome"
        );

        describe_counter!(
            SOURCE_COORDINATOR_LEASE_LOST_TOTAL,
            Unit::Count,
            "Number of partition updates rejected because another node changed the partition"
        );

        describe_histogram!(
            SOURCE_COORDINATOR_STORE_DURATION,
            Unit::Seconds,
            "Coordination store round trip duration in seconds, by operation"
        );
    });
}
