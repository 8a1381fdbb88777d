// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! rig-adapters: boundary implementations for the rig scheduler.
//!
//! The engine talks to drones (the machines that actually run test
//! processes) only through the [`DroneAdapter`] trait defined here.

pub mod drone;

pub use drone::{DroneAdapter, DroneError, ExecutionRequest, Launch, LocalDroneAdapter};

#[cfg(any(test, feature = "test-support"))]
pub use drone::{DroneCall, FakeDroneAdapter};
