// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! rig-storage: in-memory model store for the rig scheduler.
//!
//! The relational layer proper is an external collaborator; this crate is
//! the scheduler-side view of it: an ordered-query plus atomic-update API
//! over jobs, hosts, and host queue entries. Constructed once per process
//! and shared behind a mutex; there is no ambient global state.

pub mod state;

pub use state::{SchedulerState, StatusCensus, StorageError};
