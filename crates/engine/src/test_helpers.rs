// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Shared test helpers for the engine crate.

use crate::agent::Agent;
use crate::error::EngineError;
use crate::tasks::{AgentTask, TaskCtx};
use async_trait::async_trait;
use parking_lot::{Mutex, MutexGuard};
use rig_adapters::FakeDroneAdapter;
use rig_core::{EntryId, FakeClock, HostId, SchedulerConfig};
use rig_storage::SchedulerState;
use std::sync::Arc;

pub(crate) type TestAgent = Agent<FakeDroneAdapter, FakeClock>;

/// Test context bundling the dispatcher's collaborators.
pub(crate) struct TestContext {
    pub state: Arc<Mutex<SchedulerState>>,
    pub drones: FakeDroneAdapter,
    pub clock: FakeClock,
    pub config: SchedulerConfig,
}

impl TestContext {
    pub fn new() -> Self {
        Self::with_config(SchedulerConfig::default())
    }

    pub fn with_config(config: SchedulerConfig) -> Self {
        Self {
            state: Arc::new(Mutex::new(SchedulerState::new())),
            drones: FakeDroneAdapter::new(),
            clock: FakeClock::new(),
            config,
        }
    }

    pub fn ctx(&self) -> TaskCtx<'_, FakeDroneAdapter, FakeClock> {
        TaskCtx {
            state: &self.state,
            drones: &self.drones,
            clock: &self.clock,
            config: &self.config,
        }
    }

    pub fn lock(&self) -> MutexGuard<'_, SchedulerState> {
        self.state.lock()
    }
}

#[derive(Default)]
struct ScriptState {
    polls: usize,
    aborts: usize,
    done: bool,
}

/// Shared view into a [`ScriptedTask`]'s recorded activity.
#[derive(Clone, Default)]
pub(crate) struct ScriptHandle(Arc<Mutex<ScriptState>>);

impl ScriptHandle {
    pub fn polls(&self) -> usize {
        self.0.lock().polls
    }

    pub fn aborts(&self) -> usize {
        self.0.lock().aborts
    }

    /// Force the task done from outside (e.g. "one agent finishes").
    pub fn finish(&self) {
        self.0.lock().done = true;
    }
}

/// Task with scripted poll/abort behavior, for agent and throttle tests.
pub(crate) struct ScriptedTask {
    handle: ScriptHandle,
    polls_until_done: usize,
    succeed: bool,
    abort_finishes: bool,
    cost: usize,
    entries: Vec<EntryId>,
    hosts: Vec<HostId>,
}

impl ScriptedTask {
    pub fn new(polls_until_done: usize, succeed: bool) -> (Self, ScriptHandle) {
        let handle = ScriptHandle::default();
        (
            Self {
                handle: handle.clone(),
                polls_until_done,
                succeed,
                abort_finishes: true,
                cost: 1,
                entries: Vec::new(),
                hosts: Vec::new(),
            },
            handle,
        )
    }

    /// A task that never finishes on its own.
    pub fn endless(succeed: bool) -> (Self, ScriptHandle) {
        Self::new(usize::MAX, succeed)
    }

    pub fn with_cost(mut self, cost: usize) -> Self {
        self.cost = cost;
        self
    }

    pub fn with_slow_abort(mut self) -> Self {
        self.abort_finishes = false;
        self
    }
}

#[async_trait]
impl AgentTask<FakeDroneAdapter, FakeClock> for ScriptedTask {
    async fn poll(
        &mut self,
        _ctx: &TaskCtx<'_, FakeDroneAdapter, FakeClock>,
    ) -> Result<(), EngineError> {
        let mut state = self.handle.0.lock();
        state.polls += 1;
        if state.polls >= self.polls_until_done {
            state.done = true;
        }
        Ok(())
    }

    async fn abort(
        &mut self,
        _ctx: &TaskCtx<'_, FakeDroneAdapter, FakeClock>,
    ) -> Result<(), EngineError> {
        let mut state = self.handle.0.lock();
        state.aborts += 1;
        if self.abort_finishes {
            state.done = true;
        } else {
            // Finish on the next poll instead.
            self.polls_until_done = state.polls + 1;
        }
        Ok(())
    }

    fn is_done(&self) -> bool {
        self.handle.0.lock().done
    }

    fn succeeded(&self) -> bool {
        self.succeed && self.handle.0.lock().done
    }

    fn num_processes(&self) -> usize {
        self.cost
    }

    fn queue_entry_ids(&self) -> Vec<EntryId> {
        self.entries.clone()
    }

    fn host_ids(&self) -> Vec<HostId> {
        self.hosts.clone()
    }
}
