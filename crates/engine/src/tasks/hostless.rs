// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! HostlessQueueTask: runs a job that needs no host.

use super::{AgentTask, ProcessRunner, TaskCtx};
use crate::drone_manager::DroneScope;
use crate::error::EngineError;
use async_trait::async_trait;
use rig_adapters::DroneAdapter;
use rig_core::{Clock, EntryId, EntryStatus, AUTOSERV_PIDFILE};

/// Runs a hostless job's process: no host bookkeeping, but the same
/// launch-and-monitor lifecycle as a real run.
pub struct HostlessQueueTask {
    entry_id: EntryId,
    runner: ProcessRunner,
    finished: bool,
    success: bool,
}

impl HostlessQueueTask {
    pub fn new(entry_id: EntryId, tag: String, command: Vec<String>, scope: DroneScope) -> Self {
        Self {
            entry_id,
            runner: ProcessRunner::new(tag, AUTOSERV_PIDFILE, command, scope),
            finished: false,
            success: false,
        }
    }
}

#[async_trait]
impl<D: DroneAdapter, C: Clock> AgentTask<D, C> for HostlessQueueTask {
    async fn poll(&mut self, ctx: &TaskCtx<'_, D, C>) -> Result<(), EngineError> {
        if self.finished {
            return Ok(());
        }

        if !self.runner.launched() {
            {
                let mut state = ctx.state.lock();
                state.set_entry_status(self.entry_id, EntryStatus::Running)?;
            }
            self.runner.launch(ctx).await?;
        }

        self.runner.poll(ctx).await?;
        if self.runner.is_done() {
            self.finished = true;
            self.success = self.runner.succeeded();
            let mut state = ctx.state.lock();
            state.set_entry_status(self.entry_id, EntryStatus::Parsing)?;
        }
        Ok(())
    }

    async fn abort(&mut self, ctx: &TaskCtx<'_, D, C>) -> Result<(), EngineError> {
        if self.finished {
            return Ok(());
        }

        let status = {
            let state = ctx.state.lock();
            state.require_entry(self.entry_id)?.status
        };

        match status {
            // Nothing external was launched yet; aborting is a no-op.
            EntryStatus::Starting => {
                self.finished = true;
            }
            // An aborted run is never silently discarded: hand the entry
            // to the final reparse so whatever results exist are kept.
            EntryStatus::Running => {
                self.runner.kill(ctx).await?;
                self.finished = true;
                let mut state = ctx.state.lock();
                state.set_entry_status(self.entry_id, EntryStatus::Parsing)?;
            }
            _ => {
                self.finished = true;
            }
        }
        self.success = false;
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
        vec![self.entry_id]
    }
}
