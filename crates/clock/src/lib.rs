// Copyright (c) 2023 - 2025 Restate Software, Inc., Restate GmbH.
// All rights reserved.
//
// Use of this software is governed by the Business Source License
// included in the LICENSE file.
//
// As of the Change Date specified in that file, in accordance with
// the Business Source License, use of this software will be governed
// by the Apache License, Version 2.0.

//! Time sources used for lease bookkeeping.
//!
//! Every lease deadline in the coordination engine is an absolute [`MillisSinceEpoch`]
//! computed from a [`Clock`]. Production code uses [`WallClock`]; tests inject a
//! [`MockClock`] to move time forward without sleeping.

mod mock_clock;
pub mod time;
mod wall_clock;

pub use mock_clock::MockClock;
pub use time::MillisSinceEpoch;
pub use wall_clock::WallClock;

/// Sat Jan 01 2022 00:00:00 GMT+0000. Any sane clock reads later than this.
pub const SLUICE_EPOCH: MillisSinceEpoch = MillisSinceEpoch::new(1_640_995_200_000);

/// A source of the current unix time.
pub trait Clock: Send + Sync + 'static {
    /// Returns the current unix timestamp in milliseconds.
    fn now(&self) -> MillisSinceEpoch;
}

impl<T: Clock + ?Sized> Clock for std::sync::Arc<T> {
    fn now(&self) -> MillisSinceEpoch {
        (**self).now()
    }
}

impl<T: Clock + ?Sized> Clock for Box<T> {
    fn now(&self) -> MillisSinceEpoch {
        (**self).now()
    }
}
