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
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use crate::time::MillisSinceEpoch;
use crate::{Clock, SLUICE_EPOCH, WallClock};

/// A clock that only moves when told to. Clones share the same time, which lets a test
/// hand one clock to a store and several coordinators and advance all of them at once.
#[derive(Debug, Clone)]
pub struct MockClock {
    storage: Arc<AtomicU64>,
}

impl Default for MockClock {
    fn default() -> Self {
        let clock = Self {
            storage: Arc::new(AtomicU64::default()),
        };
        clock.refresh_from_wall_clock();
        clock
    }
}

impl MockClock {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_timestamp(timestamp: MillisSinceEpoch) -> Self {
        assert!(
            timestamp > SLUICE_EPOCH,
            "mock clock must be set after Sat Jan 01 2022 00:00:00 GMT+0000"
        );

        Self {
            storage: Arc::new(AtomicU64::new(timestamp.as_u64())),
        }
    }

    pub fn advance_ms(&self, ms: u64) {
        self.storage.fetch_add(ms, Ordering::SeqCst);
    }

    pub fn advance(&self, duration: Duration) {
        self.advance_ms(u64::try_from(duration.as_millis()).unwrap_or(u64::MAX));
    }

    pub fn refresh_from_wall_clock(&self) {
        self.set(WallClock.now());
    }

    pub fn set(&self, timestamp: MillisSinceEpoch) {
        assert!(
            timestamp > SLUICE_EPOCH,
            "mock clock must be set after Sat Jan 01 2022 00:00:00 GMT+0000"
        );
        self.storage.store(timestamp.as_u64(), Ordering::SeqCst);
    }
}

impl Clock for MockClock {
    fn now(&self) -> MillisSinceEpoch {
        MillisSinceEpoch::new(self.storage.load(Ordering::SeqCst))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clones_share_time() {
        let clock = MockClock::with_timestamp(MillisSinceEpoch::new(1_700_000_000_000));
        let other = clock.clone();

        clock.advance(Duration::from_secs(5));

        assert_eq!(other.now(), MillisSinceEpoch::new(1_700_000_005_000));
    }

    #[test]
    #[should_panic]
    fn rejects_timestamps_before_epoch() {
        let _ = MockClock::with_timestamp(MillisSinceEpoch::new(42));
    }
}
