// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Drone adapters: launching and observing remote test processes.

mod local;

pub use local::LocalDroneAdapter;

// Test support - only compiled for tests or when explicitly requested
#[cfg(any(test, feature = "test-support"))]
mod fake;
#[cfg(any(test, feature = "test-support"))]
pub use fake::{DroneCall, FakeDroneAdapter};

use async_trait::async_trait;
use rig_core::{PidfileContents, PidfileId, PidfileParseError, Process};
use std::collections::BTreeSet;
use thiserror::Error;

/// Errors from drone operations.
#[derive(Debug, Error)]
pub enum DroneError {
    /// The pidfile exists but cannot be read as valid contents. Callers
    /// must not interpret anything about the process from this.
    #[error("invalid pidfile {id}: {source}")]
    InvalidPidfile {
        id: PidfileId,
        #[source]
        source: PidfileParseError,
    },
    /// No drone in the allowed set can take the process.
    #[error("no drone available for {tag}")]
    NoDroneAvailable { tag: String },
    #[error("spawn failed: {0}")]
    SpawnFailed(String),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// A request to launch one process under an execution tag.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecutionRequest {
    /// Execution tag: names the results directory on the drone.
    pub tag: String,
    /// Pidfile the launched process will write inside the tag directory.
    pub pidfile_name: String,
    /// Command and arguments.
    pub command: Vec<String>,
    /// Drone hostnames this process may run on. `None` means
    /// unrestricted; an empty set means no drone is eligible.
    pub drone_hostnames_allowed: Option<BTreeSet<String>>,
}

/// A successfully launched process: the pidfile handle to poll and the
/// drone it landed on. The pid itself arrives later, via the pidfile.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Launch {
    pub pidfile_id: PidfileId,
    pub hostname: String,
}

/// Adapter for launching and observing processes on drones.
#[async_trait]
pub trait DroneAdapter: Clone + Send + Sync + 'static {
    /// Launch the requested process on an eligible drone.
    async fn execute(&self, request: &ExecutionRequest) -> Result<Launch, DroneError>;

    /// Read and parse a pidfile. Absent files are an empty (not invalid)
    /// result. `use_second_read` marks the confirmation read performed
    /// after an OS-level liveness check came back negative; transports
    /// that cache reads must bypass the cache for it.
    async fn get_pidfile_contents(
        &self,
        id: &PidfileId,
        use_second_read: bool,
    ) -> Result<PidfileContents, DroneError>;

    /// OS-level liveness check for a process on a drone.
    async fn is_process_running(&self, process: &Process) -> Result<bool, DroneError>;

    /// Terminate a process on a drone.
    async fn kill_process(&self, process: &Process) -> Result<(), DroneError>;

    /// Resolve the pidfile handle for an execution tag.
    fn pidfile_id_from(&self, tag: &str, pidfile_name: &str) -> PidfileId {
        PidfileId::new(tag, pidfile_name)
    }
}
