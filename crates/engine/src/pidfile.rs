// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Pidfile monitor: tracks one remote process via the file it writes.
//!
//! The process is the only writer; this side only reads. Its lifecycle is
//! reconstructed from two laggy signals (the pidfile contents and an
//! OS-level liveness check), so loss can only be concluded from persistent
//! inconsistency, never from a single stale read.

use crate::error::EngineError;
use rig_adapters::DroneAdapter;
use rig_core::{Clock, PidfileContents, PidfileId, Process};

/// Observed lifecycle state of the monitored process.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PidfileState {
    /// Pidfile absent or empty.
    NotYetRun,
    /// Pid present, no exit status yet.
    Running,
    /// Pid, exit status, and failed-test count all present. Terminal.
    Complete,
    /// The process can no longer be accounted for. Terminal; surfaced as
    /// a failed completion so downstream handling needs no special case.
    Lost,
}

/// Poll-driven view of one remote process.
#[derive(Debug)]
pub struct PidfileMonitor {
    id: PidfileId,
    hostname: String,
    state: PidfileState,
    contents: PidfileContents,
    start_ms: u64,
    timeout_ms: u64,
}

impl PidfileMonitor {
    /// Start monitoring a freshly launched process.
    pub fn new(
        id: PidfileId,
        hostname: impl Into<String>,
        clock: &impl Clock,
        pidfile_timeout_secs: u64,
    ) -> Self {
        Self {
            id,
            hostname: hostname.into(),
            state: PidfileState::NotYetRun,
            contents: PidfileContents::default(),
            start_ms: clock.epoch_ms(),
            timeout_ms: pidfile_timeout_secs * 1000,
        }
    }

    pub fn state(&self) -> PidfileState {
        self.state
    }

    pub fn is_done(&self) -> bool {
        matches!(self.state, PidfileState::Complete | PidfileState::Lost)
    }

    pub fn is_lost(&self) -> bool {
        self.state == PidfileState::Lost
    }

    /// Exit status once terminal (synthesized as 1 for lost processes).
    pub fn exit_status(&self) -> Option<i32> {
        self.contents.exit_status
    }

    /// Failed-test count once terminal (synthesized as 0 for lost processes).
    pub fn num_tests_failed(&self) -> Option<u32> {
        self.contents.num_tests_failed
    }

    /// The process, once the pidfile has reported a pid.
    pub fn process(&self) -> Option<Process> {
        self.contents.pid.map(|pid| Process {
            hostname: self.hostname.clone(),
            pid,
        })
    }

    /// Terminal, actually completed, and exited zero.
    pub fn succeeded(&self) -> bool {
        self.state == PidfileState::Complete && self.contents.exit_status == Some(0)
    }

    /// Advance the state machine one step.
    ///
    /// An invalid pidfile fails the poll with a typed error; partially
    /// populated contents are never interpreted as terminal state.
    pub async fn poll<D: DroneAdapter, C: Clock>(
        &mut self,
        drones: &D,
        clock: &C,
    ) -> Result<(), EngineError> {
        match self.state {
            // Terminal states never regress or re-synthesize.
            PidfileState::Complete | PidfileState::Lost => Ok(()),
            PidfileState::NotYetRun => self.poll_not_yet_run(drones, clock).await,
            PidfileState::Running => self.poll_running(drones).await,
        }
    }

    async fn poll_not_yet_run<D: DroneAdapter, C: Clock>(
        &mut self,
        drones: &D,
        clock: &C,
    ) -> Result<(), EngineError> {
        let contents = drones.get_pidfile_contents(&self.id, false).await?;

        if contents.is_complete() {
            self.contents = contents;
            self.state = PidfileState::Complete;
        } else if contents.pid.is_some() {
            self.contents = contents;
            self.state = PidfileState::Running;
        } else if clock.epoch_ms().saturating_sub(self.start_ms) > self.timeout_ms {
            tracing::warn!(pidfile = %self.id, "process never wrote its pid; declaring lost");
            self.mark_lost();
        }

        Ok(())
    }

    async fn poll_running<D: DroneAdapter>(&mut self, drones: &D) -> Result<(), EngineError> {
        let contents = drones.get_pidfile_contents(&self.id, false).await?;

        if contents.is_complete() {
            self.contents = contents;
            self.state = PidfileState::Complete;
            return Ok(());
        }
        if contents.pid.is_some() {
            self.contents = contents;
        }

        let process = match self.process() {
            Some(process) => process,
            None => return Ok(()),
        };
        if drones.is_process_running(&process).await? {
            return Ok(());
        }

        // The OS says the process is gone but the pidfile shows no exit.
        // It may have exited and flushed between our two looks, so give
        // the writer one confirmation read before concluding loss.
        let second = drones.get_pidfile_contents(&self.id, true).await?;
        if second.is_complete() {
            self.contents = second;
            self.state = PidfileState::Complete;
        } else {
            tracing::warn!(
                pidfile = %self.id,
                process = %process,
                "process gone with incomplete pidfile; declaring lost"
            );
            self.mark_lost();
        }

        Ok(())
    }

    fn mark_lost(&mut self) {
        self.contents.exit_status = Some(1);
        self.contents.num_tests_failed = Some(0);
        self.state = PidfileState::Lost;
    }
}

#[cfg(test)]
#[path = "pidfile_tests.rs"]
mod tests;
