// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! SpecialTask: host preparation and recovery (verify/cleanup/repair/reset).

use super::{AgentTask, ProcessRunner, TaskCtx};
use crate::drone_manager::DroneScope;
use crate::error::EngineError;
use async_trait::async_trait;
use rig_adapters::DroneAdapter;
use rig_core::{Clock, EntryId, EntryStatus, HostId, HostStatus, AUTOSERV_PIDFILE};
use std::fmt;

/// Kind of host-preparation work.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SpecialTaskKind {
    Verify,
    Cleanup,
    Repair,
    Reset,
}

impl SpecialTaskKind {
    /// Flag passed to the test-runner binary.
    pub fn command_flag(&self) -> &'static str {
        match self {
            SpecialTaskKind::Verify => "--verify",
            SpecialTaskKind::Cleanup => "--cleanup",
            SpecialTaskKind::Repair => "--repair",
            SpecialTaskKind::Reset => "--reset",
        }
    }

    /// Host status while the task runs.
    fn active_host_status(&self) -> HostStatus {
        match self {
            SpecialTaskKind::Verify => HostStatus::Verifying,
            SpecialTaskKind::Cleanup | SpecialTaskKind::Reset => HostStatus::Cleaning,
            SpecialTaskKind::Repair => HostStatus::Repairing,
        }
    }
}

impl fmt::Display for SpecialTaskKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SpecialTaskKind::Verify => write!(f, "verify"),
            SpecialTaskKind::Cleanup => write!(f, "cleanup"),
            SpecialTaskKind::Repair => write!(f, "repair"),
            SpecialTaskKind::Reset => write!(f, "reset"),
        }
    }
}

/// Runs one preparation pass against one host.
///
/// When tied to a queue entry it runs as a pre-job step inside that
/// entry's agent; on success the entry is handed back for the run, on
/// failure the host is pulled from rotation and the entry is requeued
/// (metahost) or failed (direct).
pub struct SpecialTask {
    kind: SpecialTaskKind,
    host_id: HostId,
    entry_id: Option<EntryId>,
    requested_by: Option<String>,
    runner: ProcessRunner,
    finished: bool,
    success: bool,
}

impl SpecialTask {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        kind: SpecialTaskKind,
        host_id: HostId,
        entry_id: Option<EntryId>,
        requested_by: Option<String>,
        tag: String,
        command: Vec<String>,
        scope: DroneScope,
    ) -> Self {
        Self {
            kind,
            host_id,
            entry_id,
            requested_by,
            runner: ProcessRunner::new(tag, AUTOSERV_PIDFILE, command, scope),
            finished: false,
            success: false,
        }
    }

    /// User the task runs on behalf of, when not tied to a queue entry.
    pub fn requested_by(&self) -> Option<&str> {
        self.requested_by.as_deref()
    }
}

#[async_trait]
impl<D: DroneAdapter, C: Clock> AgentTask<D, C> for SpecialTask {
    async fn poll(&mut self, ctx: &TaskCtx<'_, D, C>) -> Result<(), EngineError> {
        if self.finished {
            return Ok(());
        }

        if !self.runner.launched() {
            {
                let mut state = ctx.state.lock();
                state.set_host_status(self.host_id, self.kind.active_host_status())?;
                if let Some(entry_id) = self.entry_id {
                    state.set_entry_status(entry_id, EntryStatus::Verifying)?;
                }
            }
            self.runner.launch(ctx).await?;
        }

        self.runner.poll(ctx).await?;
        if !self.runner.is_done() {
            return Ok(());
        }

        self.finished = true;
        self.success = self.runner.succeeded();
        let mut state = ctx.state.lock();

        if self.success {
            // Hand the host back: still claimed if a run follows.
            let next = if self.entry_id.is_some() {
                HostStatus::Pending
            } else {
                HostStatus::Ready
            };
            state.set_host_status(self.host_id, next)?;
            if let Some(entry_id) = self.entry_id {
                state.set_entry_status(entry_id, EntryStatus::Starting)?;
            }
        } else {
            tracing::warn!(kind = %self.kind, host = %self.host_id, "special task failed");
            state.set_host_status(self.host_id, HostStatus::RepairFailed)?;
            if let Some(entry_id) = self.entry_id {
                let is_metahost = state.require_entry(entry_id)?.meta_host.is_some();
                if is_metahost {
                    // Send the entry back for re-matching on a healthy host.
                    state.clear_host(entry_id)?;
                    state.set_entry_status(entry_id, EntryStatus::Queued)?;
                } else {
                    state.set_entry_status(entry_id, EntryStatus::Failed)?;
                }
            }
        }
        Ok(())
    }

    async fn abort(&mut self, ctx: &TaskCtx<'_, D, C>) -> Result<(), EngineError> {
        if self.finished {
            return Ok(());
        }

        self.runner.kill(ctx).await?;
        self.finished = true;
        self.success = false;

        let mut state = ctx.state.lock();
        state.set_host_status(self.host_id, HostStatus::Ready)?;
        if let Some(entry_id) = self.entry_id {
            if !state.require_entry(entry_id)?.complete {
                state.set_entry_status(entry_id, EntryStatus::Aborted)?;
            }
        }
        Ok(())
    }

    fn is_done(&self) -> bool {
        self.finished
    }

    fn succeeded(&self) -> bool {
        self.success
    }

    fn num_processes(&self) -> usize {
        1
    }

    fn queue_entry_ids(&self) -> Vec<EntryId> {
        self.entry_id.into_iter().collect()
    }

    fn host_ids(&self) -> Vec<HostId> {
        vec![self.host_id]
    }
}
