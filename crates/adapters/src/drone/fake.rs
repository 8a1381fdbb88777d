// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Fake drone adapter for testing
#![cfg_attr(coverage_nightly, coverage(off))]

use super::{DroneAdapter, DroneError, ExecutionRequest, Launch};
use async_trait::async_trait;
use parking_lot::Mutex;
use rig_core::{PidfileContents, PidfileId, PidfileParseError, Process};
use std::collections::HashMap;
use std::sync::Arc;

/// Recorded drone call
#[derive(Debug, Clone)]
pub enum DroneCall {
    Execute {
        request: ExecutionRequest,
        hostname: String,
    },
    GetPidfileContents {
        id: PidfileId,
        use_second_read: bool,
    },
    IsProcessRunning {
        process: Process,
    },
    KillProcess {
        process: Process,
    },
}

/// Scripted pidfile read result
#[derive(Debug, Clone)]
enum PidfileScript {
    Contents(PidfileContents),
    Invalid,
}

struct FakeDroneState {
    drones: Vec<String>,
    calls: Vec<DroneCall>,
    launches: Vec<Launch>,
    pidfiles: HashMap<PidfileId, PidfileScript>,
    second_reads: HashMap<PidfileId, PidfileScript>,
    running: HashMap<Process, bool>,
    fail_execute: bool,
}

/// Fake drone adapter for testing.
///
/// Tests script pidfile contents and process liveness, then assert on the
/// recorded calls and launches.
#[derive(Clone)]
pub struct FakeDroneAdapter {
    inner: Arc<Mutex<FakeDroneState>>,
}

impl Default for FakeDroneAdapter {
    fn default() -> Self {
        Self {
            inner: Arc::new(Mutex::new(FakeDroneState {
                drones: vec!["fake-drone".to_string()],
                calls: Vec::new(),
                launches: Vec::new(),
                pidfiles: HashMap::new(),
                second_reads: HashMap::new(),
                running: HashMap::new(),
                fail_execute: false,
            })),
        }
    }
}

impl FakeDroneAdapter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the drone inventory (default is a single "fake-drone").
    pub fn with_drones(drones: &[&str]) -> Self {
        let adapter = Self::default();
        adapter.inner.lock().drones = drones.iter().map(|d| d.to_string()).collect();
        adapter
    }

    /// Get all recorded calls
    pub fn calls(&self) -> Vec<DroneCall> {
        self.inner.lock().calls.clone()
    }

    /// Get all launches performed so far
    pub fn launches(&self) -> Vec<Launch> {
        self.inner.lock().launches.clone()
    }

    /// Script the contents returned for a pidfile
    pub fn set_pidfile(&self, id: &PidfileId, contents: PidfileContents) {
        self.inner
            .lock()
            .pidfiles
            .insert(id.clone(), PidfileScript::Contents(contents));
    }

    /// Script a pidfile as explicitly invalid
    pub fn set_pidfile_invalid(&self, id: &PidfileId) {
        self.inner
            .lock()
            .pidfiles
            .insert(id.clone(), PidfileScript::Invalid);
    }

    /// Script contents returned only for the confirmation (second) read
    pub fn set_second_read(&self, id: &PidfileId, contents: PidfileContents) {
        self.inner
            .lock()
            .second_reads
            .insert(id.clone(), PidfileScript::Contents(contents));
    }

    /// Script OS-level liveness for a process
    pub fn set_process_running(&self, process: &Process, running: bool) {
        self.inner.lock().running.insert(process.clone(), running);
    }

    /// Make the next execute calls fail
    pub fn set_fail_execute(&self, fail: bool) {
        self.inner.lock().fail_execute = fail;
    }
}

#[async_trait]
impl DroneAdapter for FakeDroneAdapter {
    async fn execute(&self, request: &ExecutionRequest) -> Result<Launch, DroneError> {
        let mut inner = self.inner.lock();

        if inner.fail_execute {
            return Err(DroneError::SpawnFailed("scripted failure".to_string()));
        }

        let hostname = match &request.drone_hostnames_allowed {
            None => inner.drones.first().cloned(),
            Some(allowed) => inner
                .drones
                .iter()
                .find(|d| allowed.contains(*d))
                .cloned(),
        }
        .ok_or_else(|| DroneError::NoDroneAvailable {
            tag: request.tag.clone(),
        })?;

        let launch = Launch {
            pidfile_id: self.pidfile_id_from(&request.tag, &request.pidfile_name),
            hostname: hostname.clone(),
        };

        inner.calls.push(DroneCall::Execute {
            request: request.clone(),
            hostname,
        });
        inner.launches.push(launch.clone());

        Ok(launch)
    }

    async fn get_pidfile_contents(
        &self,
        id: &PidfileId,
        use_second_read: bool,
    ) -> Result<PidfileContents, DroneError> {
        let mut inner = self.inner.lock();

        inner.calls.push(DroneCall::GetPidfileContents {
            id: id.clone(),
            use_second_read,
        });

        let script = if use_second_read {
            inner.second_reads.get(id).or_else(|| inner.pidfiles.get(id))
        } else {
            inner.pidfiles.get(id)
        };

        match script {
            None => Ok(PidfileContents::default()),
            Some(PidfileScript::Contents(contents)) => Ok(contents.clone()),
            Some(PidfileScript::Invalid) => Err(DroneError::InvalidPidfile {
                id: id.clone(),
                source: PidfileParseError::BadPid("scripted".to_string()),
            }),
        }
    }

    async fn is_process_running(&self, process: &Process) -> Result<bool, DroneError> {
        let mut inner = self.inner.lock();

        inner.calls.push(DroneCall::IsProcessRunning {
            process: process.clone(),
        });

        Ok(inner.running.get(process).copied().unwrap_or(false))
    }

    async fn kill_process(&self, process: &Process) -> Result<(), DroneError> {
        let mut inner = self.inner.lock();

        inner.calls.push(DroneCall::KillProcess {
            process: process.clone(),
        });

        inner.running.insert(process.clone(), false);
        Ok(())
    }
}

#[cfg(test)]
#[path = "fake_tests.rs"]
mod tests;
