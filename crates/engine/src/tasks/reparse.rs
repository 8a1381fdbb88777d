// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! FinalReparseTask: collects results for entries that finished running.

use super::{AgentTask, ProcessRunner, TaskCtx};
use crate::drone_manager::DroneScope;
use crate::error::EngineError;
use async_trait::async_trait;
use rig_adapters::DroneAdapter;
use rig_core::{Clock, EntryId, EntryStatus, PARSER_PIDFILE};

/// Runs the results parser over one execution and finalizes its entries.
///
/// Zero process cost: parser concurrency is the parser's own problem, not
/// the scheduler throttle's. Holds no hosts, so it never conflicts.
pub struct FinalReparseTask {
    entry_ids: Vec<EntryId>,
    runner: ProcessRunner,
    finished: bool,
    success: bool,
}

impl FinalReparseTask {
    pub fn new(entry_ids: Vec<EntryId>, tag: String, command: Vec<String>, scope: DroneScope) -> Self {
        Self {
            entry_ids,
            runner: ProcessRunner::new(tag, PARSER_PIDFILE, command, scope),
            finished: false,
            success: false,
        }
    }

    fn finalize(&self, state: &mut rig_storage::SchedulerState) -> Result<(), EngineError> {
        for entry_id in &self.entry_ids {
            let aborted = state.require_entry(*entry_id)?.abort_requested;
            let status = if aborted {
                EntryStatus::Aborted
            } else {
                EntryStatus::Completed
            };
            state.set_entry_status(*entry_id, status)?;
        }
        Ok(())
    }
}

#[async_trait]
impl<D: DroneAdapter, C: Clock> AgentTask<D, C> for FinalReparseTask {
    async fn poll(&mut self, ctx: &TaskCtx<'_, D, C>) -> Result<(), EngineError> {
        if self.finished {
            return Ok(());
        }

        if !self.runner.launched() {
            self.runner.launch(ctx).await?;
        }

        self.runner.poll(ctx).await?;
        if self.runner.is_done() {
            self.finished = true;
            self.success = self.runner.succeeded();
            let mut state = ctx.state.lock();
            self.finalize(&mut state)?;
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
        for entry_id in &self.entry_ids {
            state.set_entry_status(*entry_id, EntryStatus::Aborted)?;
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
        0
    }

    fn queue_entry_ids(&self) -> Vec<EntryId> {
        self.entry_ids.clone()
    }
}
