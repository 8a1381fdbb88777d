// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Error types for the engine.

use rig_adapters::DroneError;
use rig_storage::StorageError;
use thiserror::Error;

/// Errors that can occur while dispatching.
///
/// Boundary failures propagate out of a tick untouched; the surrounding
/// loop retries on the next tick.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("drone error: {0}")]
    Drone(#[from] DroneError),
    #[error("storage error: {0}")]
    Storage(#[from] StorageError),
    #[error("unknown drone set: {0}")]
    UnknownDroneSet(String),
}
