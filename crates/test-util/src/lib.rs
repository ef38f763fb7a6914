// Copyright (c) 2023 - 2025 Restate Software, Inc., Restate GmbH.
// All rights reserved.
//
// Use of this software is governed by the Business Source License
// included in the LICENSE file.
//
// As of the Change Date specified in that file, in accordance with
// the Business Source License, use of this software will be governed
// by the Apache License, Version 2.0.

//! Useful test utilities for Sluice crates. Import them with:
//!
//! ```rust
//! use sluice_test_util::{assert, assert_eq, assert_ne};
//! ```
//!
//! Note: You cannot import them with a glob import, as the compiler won't be able to distinguish our imports and the stdlib imports.

use sluice_clock::{MillisSinceEpoch, MockClock};

// A couple of useful re-exports
pub use assert2::{assert, check, let_assert};
pub use pretty_assertions::{assert_eq, assert_ne};

/// Tue Nov 14 2023 22:13:20 GMT+0000, the starting point of [`mock_clock`].
pub const MOCK_CLOCK_START: MillisSinceEpoch = MillisSinceEpoch::new(1_700_000_000_000);

/// A [`MockClock`] starting at [`MOCK_CLOCK_START`], so tests see the same timestamps on
/// every run.
pub fn mock_clock() -> MockClock {
    MockClock::with_timestamp(MOCK_CLOCK_START)
}
