// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Agent: drives a FIFO of tasks to completion over repeated ticks.

use crate::drone_manager::DroneScope;
use crate::error::EngineError;
use crate::tasks::{AgentTask, TaskCtx};
use rig_adapters::DroneAdapter;
use rig_core::{Clock, EntryId, HostId};
use std::collections::VecDeque;

/// Scheduler-side handle for one unit of scheduled work.
///
/// Created by the dispatcher when queue entries are promoted to
/// execution, ticked once per dispatch cycle, and destroyed once done.
pub struct Agent<D: DroneAdapter, C: Clock> {
    tasks: VecDeque<Box<dyn AgentTask<D, C>>>,
    queue_entry_ids: Vec<EntryId>,
    host_ids: Vec<HostId>,
    scope: DroneScope,
    started: bool,
    aborted: bool,
}

impl<D: DroneAdapter, C: Clock> Agent<D, C> {
    pub fn new(tasks: Vec<Box<dyn AgentTask<D, C>>>, scope: DroneScope) -> Self {
        let mut queue_entry_ids = Vec::new();
        let mut host_ids = Vec::new();
        for task in &tasks {
            for entry_id in task.queue_entry_ids() {
                if !queue_entry_ids.contains(&entry_id) {
                    queue_entry_ids.push(entry_id);
                }
            }
            for host_id in task.host_ids() {
                if !host_ids.contains(&host_id) {
                    host_ids.push(host_id);
                }
            }
        }
        Self {
            tasks: tasks.into(),
            queue_entry_ids,
            host_ids,
            scope,
            started: false,
            aborted: false,
        }
    }

    /// Queue entries owned by any of this agent's tasks.
    pub fn queue_entry_ids(&self) -> &[EntryId] {
        &self.queue_entry_ids
    }

    /// Hosts owned by any of this agent's tasks.
    pub fn host_ids(&self) -> &[HostId] {
        &self.host_ids
    }

    pub fn claims_entry(&self, entry_id: EntryId) -> bool {
        self.queue_entry_ids.contains(&entry_id)
    }

    pub fn scope(&self) -> &DroneScope {
        &self.scope
    }

    /// True once `tick()` has run at least once.
    pub fn started(&self) -> bool {
        self.started
    }

    pub fn was_aborted(&self) -> bool {
        self.aborted
    }

    /// Process cost for throttle admission: the current task's cost.
    pub fn num_processes(&self) -> usize {
        self.tasks.front().map_or(0, |task| task.num_processes())
    }

    pub fn is_done(&self) -> bool {
        self.tasks.is_empty()
    }

    /// Advance the current task; walk through tasks that complete within
    /// this tick. A task that finishes unsuccessfully (or an abort)
    /// invalidates the rest of the FIFO.
    pub async fn tick(&mut self, ctx: &TaskCtx<'_, D, C>) -> Result<(), EngineError> {
        self.started = true;
        while let Some(task) = self.tasks.front_mut() {
            task.poll(ctx).await?;
            if !task.is_done() {
                return Ok(());
            }
            let succeeded = task.succeeded();
            self.tasks.pop_front();
            if !succeeded || self.aborted {
                self.tasks.clear();
                return Ok(());
            }
        }
        Ok(())
    }

    /// Abort this agent's work.
    ///
    /// Before the first tick this is unconditional: every task is dropped
    /// without ever being polled. After start, the current task gets to
    /// abort properly (it may need to move queue entries) and is polled
    /// to completion on subsequent ticks; queued follow-up tasks are
    /// dropped either way.
    pub async fn abort(&mut self, ctx: &TaskCtx<'_, D, C>) -> Result<(), EngineError> {
        if self.aborted {
            return Ok(());
        }
        self.aborted = true;

        if !self.started {
            self.tasks.clear();
            return Ok(());
        }

        self.tasks.truncate(1);
        if let Some(task) = self.tasks.front_mut() {
            task.abort(ctx).await?;
            if task.is_done() {
                self.tasks.clear();
            }
        }
        Ok(())
    }
}

#[cfg(test)]
#[path = "agent_tests.rs"]
mod tests;
