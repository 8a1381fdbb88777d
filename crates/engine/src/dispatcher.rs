// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Dispatcher: the top-level control loop.
//!
//! One `tick()` per cycle: consume abort requests, promote assigned
//! entries to agents, run the assignment pass, offer starts under the
//! drone throttle in FIFO order, advance every live agent, reap the
//! finished ones, and do periodic maintenance accounting.

use crate::agent::Agent;
use crate::drone_manager::{DroneManager, DroneScope};
use crate::error::EngineError;
use crate::host_scheduler::HostScheduler;
use crate::tasks::{
    AgentTask, FinalReparseTask, HostlessQueueTask, QueueTask, SpecialTask, SpecialTaskKind,
    TaskCtx,
};
use parking_lot::Mutex;
use rig_adapters::DroneAdapter;
use rig_core::{
    Clock, EntryId, EntryStatus, HostId, HostStatus, Job, JobId, SchedulerConfig, HOSTLESS_SUBDIR,
};
use rig_storage::SchedulerState;
use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;
use std::time::Instant;

/// Execution subdirectory for synchronous groups.
const SYNC_GROUP_SUBDIR: &str = "group0";

/// The scheduler's top-level control loop.
pub struct Dispatcher<D: DroneAdapter, C: Clock> {
    state: Arc<Mutex<SchedulerState>>,
    drones: D,
    clock: C,
    config: SchedulerConfig,
    drone_manager: DroneManager,
    host_scheduler: HostScheduler,
    /// Live agents in creation order; admission is FIFO over this list.
    agents: Vec<Agent<D, C>>,
    last_maintenance: Option<Instant>,
}

impl<D: DroneAdapter, C: Clock> Dispatcher<D, C> {
    pub fn new(
        state: Arc<Mutex<SchedulerState>>,
        drones: D,
        clock: C,
        config: SchedulerConfig,
    ) -> Self {
        let drone_manager = DroneManager::new(&config);
        Self {
            state,
            drones,
            clock,
            config,
            drone_manager,
            host_scheduler: HostScheduler::new(),
            agents: Vec::new(),
            last_maintenance: None,
        }
    }

    pub fn state(&self) -> Arc<Mutex<SchedulerState>> {
        Arc::clone(&self.state)
    }

    pub fn num_agents(&self) -> usize {
        self.agents.len()
    }

    pub fn num_started_agents(&self) -> usize {
        self.agents.iter().filter(|agent| agent.started()).count()
    }

    /// Run one dispatch cycle.
    ///
    /// Boundary errors propagate; the caller retries on the next tick.
    pub async fn tick(&mut self) -> Result<(), EngineError> {
        self.process_abort_requests().await?;
        self.promote_pending_entries()?;
        self.promote_parsing_entries()?;
        self.schedule_new_entries()?;
        self.promote_hostless_entries()?;
        self.advance_agents().await?;
        self.reap_agents()?;
        self.periodic_maintenance();
        Ok(())
    }

    /// Queue a repair/verify/cleanup/reset pass against a host on behalf
    /// of a requesting user (operator surface of the engine).
    pub fn request_special_task(
        &mut self,
        kind: SpecialTaskKind,
        host_id: HostId,
        requested_by: &str,
    ) -> Result<(), EngineError> {
        let (hostname, scope) = {
            let state = self.state.lock();
            let hostname = state.require_host(host_id)?.hostname.clone();
            let scope = self.drone_manager.scope_for_user(Some(requested_by))?;
            (hostname, scope)
        };
        let tag = format!("hosts/{}/{}-{}", hostname, kind, self.clock.epoch_ms());
        let command = special_command(&self.config, kind, &hostname, &tag);
        let task = SpecialTask::new(
            kind,
            host_id,
            None,
            Some(requested_by.to_string()),
            tag,
            command,
            scope.clone(),
        );
        tracing::info!(%kind, host = %host_id, user = requested_by, "special task requested");
        self.agents.push(Agent::new(vec![Box::new(task)], scope));
        Ok(())
    }

    fn claimed_entries(&self) -> HashSet<EntryId> {
        self.agents
            .iter()
            .flat_map(|agent| agent.queue_entry_ids().iter().copied())
            .collect()
    }

    fn claimed_hosts(&self) -> HashSet<HostId> {
        self.agents
            .iter()
            .flat_map(|agent| agent.host_ids().iter().copied())
            .collect()
    }

    /// Consume operator abort flags: abort the owning agent if one
    /// exists, otherwise finalize the entry directly.
    async fn process_abort_requests(&mut self) -> Result<(), EngineError> {
        let flagged = self.state.lock().abort_requested_entries();
        if flagged.is_empty() {
            return Ok(());
        }

        let ctx = TaskCtx {
            state: &self.state,
            drones: &self.drones,
            clock: &self.clock,
            config: &self.config,
        };

        for entry_id in flagged {
            if let Some(agent) = self
                .agents
                .iter_mut()
                .find(|agent| agent.claims_entry(entry_id))
            {
                tracing::info!(entry = %entry_id, "abort requested; aborting agent");
                agent.abort(&ctx).await?;
                continue;
            }

            let mut state = self.state.lock();
            let status = state.require_entry(entry_id)?.status;
            match status {
                // Already on its way to a terminal status via reparse.
                EntryStatus::Parsing => {}
                _ => {
                    tracing::info!(entry = %entry_id, "abort requested; no agent, finalizing");
                    state.set_entry_status(entry_id, EntryStatus::Aborted)?;
                }
            }
        }
        Ok(())
    }

    /// Promote entries whose assignment settled in an earlier tick.
    /// Running before the assignment pass keeps a two-phase gap between
    /// "host assigned" and "agent polling", so an assignment is never
    /// polled as running within the tick that made it.
    fn promote_pending_entries(&mut self) -> Result<(), EngineError> {
        let claimed_entries = self.claimed_entries();
        let mut claimed_hosts = self.claimed_hosts();
        let mut new_agents = Vec::new();

        {
            let mut state = self.state.lock();
            let mut handled_sync_jobs: HashSet<JobId> = HashSet::new();

            for entry_id in state.entries_with_status(EntryStatus::Pending) {
                if claimed_entries.contains(&entry_id) {
                    continue;
                }
                let entry = state.require_entry(entry_id)?.clone();
                let job = match state.get_job(entry.job_id) {
                    Some(job) => job.clone(),
                    None => continue,
                };

                if job.synchronous {
                    if !handled_sync_jobs.insert(job.id) {
                        continue;
                    }
                    let Some((group, hosts)) = sync_group_ready(&state, job.id)? else {
                        // Partially-ready synchronous job stays Pending.
                        continue;
                    };
                    if hosts.iter().any(|host| claimed_hosts.contains(host)) {
                        // Expected race with a live agent; not an error.
                        tracing::debug!(job = %job.id, "sync group host busy; skipping");
                        continue;
                    }
                    for id in &group {
                        state.set_execution_subdir(*id, SYNC_GROUP_SUBDIR)?;
                        state.set_entry_status(*id, EntryStatus::Starting)?;
                    }
                    for host in &hosts {
                        state.set_host_status(*host, HostStatus::Pending)?;
                        claimed_hosts.insert(*host);
                    }
                    let agent =
                        self.build_queue_agent(&state, &job, group, hosts, SYNC_GROUP_SUBDIR)?;
                    new_agents.push(agent);
                } else {
                    let Some(host_id) = entry.host_id else {
                        continue;
                    };
                    if claimed_hosts.contains(&host_id) {
                        // Another agent already holds the host; expected.
                        tracing::debug!(entry = %entry_id, host = %host_id, "host busy; skipping");
                        continue;
                    }
                    state.set_entry_status(entry_id, EntryStatus::Starting)?;
                    state.set_host_status(host_id, HostStatus::Pending)?;
                    claimed_hosts.insert(host_id);
                    let agent = self.build_queue_agent(
                        &state,
                        &job,
                        vec![entry_id],
                        vec![host_id],
                        &entry.execution_subdir,
                    )?;
                    new_agents.push(agent);
                }
            }
        }

        self.agents.extend(new_agents);
        Ok(())
    }

    /// Entries that finished running get a final-reparse agent, grouped
    /// by execution (a synchronous group parses as one).
    fn promote_parsing_entries(&mut self) -> Result<(), EngineError> {
        let claimed_entries = self.claimed_entries();
        let mut new_agents = Vec::new();

        {
            let state = self.state.lock();
            let mut groups: BTreeMap<(JobId, String), Vec<EntryId>> = BTreeMap::new();
            for entry_id in state.entries_with_status(EntryStatus::Parsing) {
                if claimed_entries.contains(&entry_id) {
                    continue;
                }
                let entry = state.require_entry(entry_id)?;
                groups
                    .entry((entry.job_id, entry.execution_subdir.clone()))
                    .or_default()
                    .push(entry_id);
            }

            for ((job_id, subdir), entry_ids) in groups {
                let job = match state.get_job(job_id) {
                    Some(job) => job.clone(),
                    None => continue,
                };
                let scope = self.drone_manager.resolve_scope(&state, &entry_ids, None)?;
                let tag = job.execution_tag(&subdir);
                let command = parser_command(&self.config, &tag);
                let task = FinalReparseTask::new(entry_ids, tag, command, scope.clone());
                new_agents.push(Agent::new(
                    vec![Box::new(task) as Box<dyn AgentTask<D, C>>],
                    scope,
                ));
            }
        }

        self.agents.extend(new_agents);
        Ok(())
    }

    fn schedule_new_entries(&mut self) -> Result<(), EngineError> {
        let busy_hosts = self.claimed_hosts();
        let mut state = self.state.lock();
        self.host_scheduler.schedule(&mut state, &busy_hosts)
    }

    /// Hostless entries scheduled this tick (or left over) get an agent.
    /// Idempotent: a hostless entry already claimed by an agent is never
    /// promoted twice.
    fn promote_hostless_entries(&mut self) -> Result<(), EngineError> {
        let claimed_entries = self.claimed_entries();
        let mut new_agents = Vec::new();

        {
            let state = self.state.lock();
            for entry_id in state.entries_with_status(EntryStatus::Starting) {
                let entry = state.require_entry(entry_id)?;
                if !entry.is_hostless() || claimed_entries.contains(&entry_id) {
                    continue;
                }
                let job = match state.get_job(entry.job_id) {
                    Some(job) => job.clone(),
                    None => continue,
                };
                let scope = self.drone_manager.resolve_scope(&state, &[entry_id], None)?;
                let tag = job.execution_tag(HOSTLESS_SUBDIR);
                let command = autoserv_command(&self.config, &job, &[], &tag);
                let task = HostlessQueueTask::new(entry_id, tag, command, scope.clone());
                new_agents.push(Agent::new(
                    vec![Box::new(task) as Box<dyn AgentTask<D, C>>],
                    scope,
                ));
            }
        }

        self.agents.extend(new_agents);
        Ok(())
    }

    /// Offer start slots in FIFO order under the throttle, then advance
    /// every started agent one poll.
    async fn advance_agents(&mut self) -> Result<(), EngineError> {
        // Usage is derived from the live agent set on every pass; nothing
        // is incremented or decremented anywhere else.
        let mut charges: Vec<(DroneScope, usize)> = self
            .agents
            .iter()
            .filter(|agent| agent.started() && !agent.is_done())
            .map(|agent| (agent.scope().clone(), agent.num_processes()))
            .collect();

        let ctx = TaskCtx {
            state: &self.state,
            drones: &self.drones,
            clock: &self.clock,
            config: &self.config,
        };
        let mut blocked: Vec<DroneScope> = Vec::new();

        for agent in self.agents.iter_mut() {
            if agent.is_done() {
                // Nothing to advance (e.g. aborted before start).
                continue;
            }
            if agent.started() {
                agent.tick(&ctx).await?;
                continue;
            }

            let cost = agent.num_processes();
            if cost > 0 {
                // An agent ahead of us is waiting on this scope; starting
                // a later, smaller one past it would starve it.
                if blocked
                    .iter()
                    .any(|scope| DroneManager::scopes_overlap(scope, agent.scope()))
                {
                    continue;
                }
                let in_use: usize = charges
                    .iter()
                    .filter(|(scope, _)| DroneManager::scopes_overlap(scope, agent.scope()))
                    .map(|(_, cost)| *cost)
                    .sum();
                if self.drone_manager.max_runnable_processes(agent.scope(), in_use) < cost {
                    blocked.push(agent.scope().clone());
                    continue;
                }
                charges.push((agent.scope().clone(), cost));
            }

            agent.tick(&ctx).await?;
        }
        Ok(())
    }

    /// Remove finished agents, releasing their hosts and finalizing
    /// entries of never-started aborts.
    fn reap_agents(&mut self) -> Result<(), EngineError> {
        let mut state = self.state.lock();
        let mut kept = Vec::with_capacity(self.agents.len());

        for agent in self.agents.drain(..) {
            if !agent.is_done() {
                kept.push(agent);
                continue;
            }

            for host_id in agent.host_ids() {
                let status = state.require_host(*host_id)?.status;
                if matches!(
                    status,
                    HostStatus::Pending
                        | HostStatus::Running
                        | HostStatus::Verifying
                        | HostStatus::Cleaning
                        | HostStatus::Repairing
                ) {
                    state.set_host_status(*host_id, HostStatus::Ready)?;
                }
            }

            if agent.was_aborted() && !agent.started() {
                for entry_id in agent.queue_entry_ids() {
                    if !state.require_entry(*entry_id)?.complete {
                        state.set_entry_status(*entry_id, EntryStatus::Aborted)?;
                    }
                }
            }
            tracing::debug!(entries = ?agent.queue_entry_ids(), "agent finished");
        }

        self.agents = kept;
        Ok(())
    }

    /// Utilization accounting on the configured cadence.
    fn periodic_maintenance(&mut self) {
        let now = self.clock.now();
        if let Some(last) = self.last_maintenance {
            if now.duration_since(last).as_secs() < self.config.gc_interval_secs {
                return;
            }
        }
        self.last_maintenance = Some(now);

        let started = self
            .agents
            .iter()
            .filter(|agent| agent.started() && !agent.is_done())
            .count();
        let processes: usize = self
            .agents
            .iter()
            .filter(|agent| agent.started() && !agent.is_done())
            .map(Agent::num_processes)
            .sum();
        let census = self.state.lock().census();
        tracing::info!(
            agents = self.agents.len(),
            started,
            processes,
            entries = ?census.entries,
            hosts = ?census.hosts,
            "maintenance"
        );
    }

    fn build_queue_agent(
        &self,
        state: &SchedulerState,
        job: &Job,
        entry_ids: Vec<EntryId>,
        host_ids: Vec<HostId>,
        subdir: &str,
    ) -> Result<Agent<D, C>, EngineError> {
        let scope = self.drone_manager.resolve_scope(state, &entry_ids, None)?;
        let tag = job.execution_tag(subdir);

        let mut tasks: Vec<Box<dyn AgentTask<D, C>>> = Vec::new();
        if job.run_verify {
            for (entry_id, host_id) in entry_ids.iter().zip(&host_ids) {
                let hostname = state.require_host(*host_id)?.hostname.clone();
                let verify_tag = format!("hosts/{}/verify-{}", hostname, job.id);
                let command =
                    special_command(&self.config, SpecialTaskKind::Verify, &hostname, &verify_tag);
                tasks.push(Box::new(SpecialTask::new(
                    SpecialTaskKind::Verify,
                    *host_id,
                    Some(*entry_id),
                    None,
                    verify_tag,
                    command,
                    scope.clone(),
                )));
            }
        }

        let mut hostnames = Vec::with_capacity(host_ids.len());
        for host_id in &host_ids {
            hostnames.push(state.require_host(*host_id)?.hostname.clone());
        }
        let command = autoserv_command(&self.config, job, &hostnames, &tag);
        tasks.push(Box::new(QueueTask::new(
            entry_ids,
            host_ids,
            tag,
            command,
            scope.clone(),
        )));

        Ok(Agent::new(tasks, scope))
    }
}

/// Entries and hosts of a synchronous job, if every entry is Pending with
/// a host. `None` while the group is still gathering.
fn sync_group_ready(
    state: &SchedulerState,
    job_id: JobId,
) -> Result<Option<(Vec<EntryId>, Vec<HostId>)>, EngineError> {
    let mut entries = Vec::new();
    let mut hosts = Vec::new();
    for entry_id in state.entries_for_job(job_id) {
        let entry = state.require_entry(entry_id)?;
        match (entry.status, entry.host_id) {
            (EntryStatus::Pending, Some(host_id)) => {
                entries.push(entry_id);
                hosts.push(host_id);
            }
            _ => return Ok(None),
        }
    }
    Ok(Some((entries, hosts)))
}

fn autoserv_command(
    config: &SchedulerConfig,
    job: &Job,
    hostnames: &[String],
    tag: &str,
) -> Vec<String> {
    let mut command = vec![
        config.autoserv_path.clone(),
        "-P".to_string(),
        tag.to_string(),
        "-u".to_string(),
        job.owner.clone(),
        "-l".to_string(),
        job.name.clone(),
        "-r".to_string(),
        tag.to_string(),
    ];
    if !hostnames.is_empty() {
        command.push("-m".to_string());
        command.push(hostnames.join(","));
    }
    command
}

fn special_command(
    config: &SchedulerConfig,
    kind: SpecialTaskKind,
    hostname: &str,
    tag: &str,
) -> Vec<String> {
    vec![
        config.autoserv_path.clone(),
        kind.command_flag().to_string(),
        "-m".to_string(),
        hostname.to_string(),
        "-r".to_string(),
        tag.to_string(),
    ]
}

fn parser_command(config: &SchedulerConfig, tag: &str) -> Vec<String> {
    vec![
        config.parser_path.clone(),
        "--write-pidfile".to_string(),
        "-r".to_string(),
        tag.to_string(),
    ]
}

#[cfg(test)]
#[path = "dispatcher_tests.rs"]
mod tests;
