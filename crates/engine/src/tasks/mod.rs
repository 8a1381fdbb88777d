// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Agent tasks: pollable units of work.
//!
//! The dispatcher and [`Agent`](crate::agent::Agent) never switch on
//! concrete task types; everything goes through the [`AgentTask`] trait.

mod hostless;
mod queue;
mod reparse;
mod special;

pub use hostless::HostlessQueueTask;
pub use queue::QueueTask;
pub use reparse::FinalReparseTask;
pub use special::{SpecialTask, SpecialTaskKind};

use crate::drone_manager::DroneScope;
use crate::error::EngineError;
use crate::pidfile::PidfileMonitor;
use async_trait::async_trait;
use parking_lot::Mutex;
use rig_adapters::{DroneAdapter, ExecutionRequest};
use rig_core::{Clock, EntryId, HostId, SchedulerConfig};
use rig_storage::SchedulerState;

/// Everything a task may touch during a poll.
///
/// Tasks lock `state` themselves, briefly; nothing here holds the lock
/// across an await.
pub struct TaskCtx<'a, D, C> {
    pub state: &'a Mutex<SchedulerState>,
    pub drones: &'a D,
    pub clock: &'a C,
    pub config: &'a SchedulerConfig,
}

/// One schedulable unit of work, driven by repeated non-blocking polls.
#[async_trait]
pub trait AgentTask<D: DroneAdapter, C: Clock>: Send {
    /// Inspect current state and advance; updates `is_done()`.
    async fn poll(&mut self, ctx: &TaskCtx<'_, D, C>) -> Result<(), EngineError>;

    /// Abort a started task. May need to move queue entries rather than
    /// just stop; the agent keeps polling until `is_done()` afterwards.
    async fn abort(&mut self, ctx: &TaskCtx<'_, D, C>) -> Result<(), EngineError>;

    fn is_done(&self) -> bool;

    /// Whether the task ended well. Meaningful once `is_done()`; a failed
    /// task invalidates the rest of its agent's queue.
    fn succeeded(&self) -> bool;

    /// Process cost for the drone throttle. Zero-cost work is never
    /// throttled.
    fn num_processes(&self) -> usize;

    /// Queue entries this task owns.
    fn queue_entry_ids(&self) -> Vec<EntryId> {
        Vec::new()
    }

    /// Hosts this task owns, for conflict accounting and release.
    fn host_ids(&self) -> Vec<HostId> {
        Vec::new()
    }
}

/// Shared launch-then-monitor plumbing for tasks that run one process.
pub(crate) struct ProcessRunner {
    tag: String,
    pidfile_name: String,
    command: Vec<String>,
    scope: DroneScope,
    monitor: Option<PidfileMonitor>,
}

impl ProcessRunner {
    pub fn new(
        tag: impl Into<String>,
        pidfile_name: impl Into<String>,
        command: Vec<String>,
        scope: DroneScope,
    ) -> Self {
        Self {
            tag: tag.into(),
            pidfile_name: pidfile_name.into(),
            command,
            scope,
            monitor: None,
        }
    }

    pub fn launched(&self) -> bool {
        self.monitor.is_some()
    }

    /// Launch the process and start monitoring its pidfile.
    pub async fn launch<D: DroneAdapter, C: Clock>(
        &mut self,
        ctx: &TaskCtx<'_, D, C>,
    ) -> Result<(), EngineError> {
        let request = ExecutionRequest {
            tag: self.tag.clone(),
            pidfile_name: self.pidfile_name.clone(),
            command: self.command.clone(),
            drone_hostnames_allowed: self.scope.clone(),
        };
        let launch = ctx.drones.execute(&request).await?;
        tracing::info!(tag = %self.tag, drone = %launch.hostname, "launched process");
        self.monitor = Some(PidfileMonitor::new(
            launch.pidfile_id,
            launch.hostname,
            ctx.clock,
            ctx.config.pidfile_timeout_secs,
        ));
        Ok(())
    }

    pub async fn poll<D: DroneAdapter, C: Clock>(
        &mut self,
        ctx: &TaskCtx<'_, D, C>,
    ) -> Result<(), EngineError> {
        if let Some(monitor) = &mut self.monitor {
            monitor.poll(ctx.drones, ctx.clock).await?;
        }
        Ok(())
    }

    pub fn is_done(&self) -> bool {
        self.monitor.as_ref().is_some_and(|m| m.is_done())
    }

    pub fn succeeded(&self) -> bool {
        self.monitor.as_ref().is_some_and(|m| m.succeeded())
    }

    /// Kill the monitored process if it has reported a pid.
    pub async fn kill<D: DroneAdapter, C: Clock>(
        &mut self,
        ctx: &TaskCtx<'_, D, C>,
    ) -> Result<(), EngineError> {
        if let Some(process) = self.monitor.as_ref().and_then(|m| m.process()) {
            ctx.drones.kill_process(&process).await?;
        }
        Ok(())
    }
}
