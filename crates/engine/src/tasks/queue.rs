// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! QueueTask: runs the test process for one entry or one synchronous group.

use super::{AgentTask, ProcessRunner, TaskCtx};
use crate::drone_manager::DroneScope;
use crate::error::EngineError;
use async_trait::async_trait;
use rig_adapters::DroneAdapter;
use rig_core::{Clock, EntryId, EntryStatus, HostId, HostStatus, AUTOSERV_PIDFILE};

/// Drives the actual test run on one or more hosts.
///
/// For synchronous jobs one task carries the whole group: all entries move
/// together and the process cost is the group size.
pub struct QueueTask {
    entry_ids: Vec<EntryId>,
    host_ids: Vec<HostId>,
    runner: ProcessRunner,
    finished: bool,
    success: bool,
}

impl QueueTask {
    pub fn new(
        entry_ids: Vec<EntryId>,
        host_ids: Vec<HostId>,
        tag: String,
        command: Vec<String>,
        scope: DroneScope,
    ) -> Self {
        Self {
            entry_ids,
            host_ids,
            runner: ProcessRunner::new(tag, AUTOSERV_PIDFILE, command, scope),
            finished: false,
            success: false,
        }
    }
}

#[async_trait]
impl<D: DroneAdapter, C: Clock> AgentTask<D, C> for QueueTask {
    async fn poll(&mut self, ctx: &TaskCtx<'_, D, C>) -> Result<(), EngineError> {
        if self.finished {
            return Ok(());
        }

        if !self.runner.launched() {
            {
                let mut state = ctx.state.lock();
                for entry_id in &self.entry_ids {
                    state.set_entry_status(*entry_id, EntryStatus::Running)?;
                }
                for host_id in &self.host_ids {
                    state.set_host_status(*host_id, HostStatus::Running)?;
                }
            }
            self.runner.launch(ctx).await?;
        }

        self.runner.poll(ctx).await?;
        if self.runner.is_done() {
            self.finished = true;
            self.success = self.runner.succeeded();
            let mut state = ctx.state.lock();
            for entry_id in &self.entry_ids {
                state.set_entry_status(*entry_id, EntryStatus::Parsing)?;
            }
        }
        Ok(())
    }

    async fn abort(&mut self, ctx: &TaskCtx<'_, D, C>) -> Result<(), EngineError> {
        if self.finished {
            return Ok(());
        }

        let launched = self.runner.launched();
        self.runner.kill(ctx).await?;
        self.finished = true;
        self.success = false;

        let mut state = ctx.state.lock();
        for entry_id in &self.entry_ids {
            if launched {
                // Whatever the run produced still gets parsed.
                state.set_entry_status(*entry_id, EntryStatus::Parsing)?;
            } else {
                state.set_entry_status(*entry_id, EntryStatus::Aborted)?;
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
        self.entry_ids.len()
    }

    fn queue_entry_ids(&self) -> Vec<EntryId> {
        self.entry_ids.clone()
    }

    fn host_ids(&self) -> Vec<HostId> {
        self.host_ids.clone()
    }
}
