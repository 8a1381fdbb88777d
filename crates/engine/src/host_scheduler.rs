// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Host scheduler: assigns newly-queued entries to eligible hosts.

use crate::error::EngineError;
use rig_core::{EntryStatus, HostId, HOSTLESS_SUBDIR};
use rig_storage::SchedulerState;
use std::collections::HashSet;

/// One assignment pass per dispatcher tick.
///
/// Walks eligible entries in scheduling order (priority first, earlier
/// jobs winning ties) and resolves them to hosts. Assignment only moves
/// entries to `Pending` (or `Starting` for hostless work); promotion to a
/// live agent is the dispatcher's next phase, so a host assigned in one
/// tick is never also polled as running within it.
#[derive(Debug, Default)]
pub struct HostScheduler;

impl HostScheduler {
    pub fn new() -> Self {
        Self
    }

    /// Assign eligible entries. `busy_hosts` are hosts already claimed by
    /// live agents this cycle.
    pub fn schedule(
        &self,
        state: &mut SchedulerState,
        busy_hosts: &HashSet<HostId>,
    ) -> Result<(), EngineError> {
        // Hosts spoken for: by live agents or by earlier active entries.
        let mut claimed: HashSet<HostId> = busy_hosts.clone();
        claimed.extend(state.active_entry_hosts());

        for entry_id in state.pending_queue_entries() {
            let entry = match state.get_entry(entry_id) {
                Some(entry) => entry.clone(),
                None => continue,
            };
            let owner = match state.get_job(entry.job_id) {
                Some(job) => job.owner.clone(),
                None => {
                    tracing::warn!(entry = %entry_id, job = %entry.job_id, "entry without job");
                    continue;
                }
            };

            if entry.is_hostless() {
                // Hostless entries go straight to Starting, unconditionally.
                state.set_execution_subdir(entry_id, HOSTLESS_SUBDIR)?;
                state.set_entry_status(entry_id, EntryStatus::Starting)?;
                tracing::debug!(entry = %entry_id, "hostless entry starting");
            } else if let Some(host_id) = entry.host_id {
                // Direct-host entry: Ready, unlocked, and ACL-permitted.
                // One-time hosts bypass the ACL check.
                if claimed.contains(&host_id) {
                    continue;
                }
                let host = match state.get_host(host_id) {
                    Some(host) => host,
                    None => {
                        tracing::warn!(entry = %entry_id, host = %host_id, "entry targets missing host");
                        continue;
                    }
                };
                if !host.is_schedulable() {
                    continue;
                }
                if !host.invalid && !state.acl_accessible(&owner, host_id) {
                    continue;
                }
                let subdir = host.hostname.clone();
                state.assign_host(entry_id, host_id, &subdir)?;
                state.set_entry_status(entry_id, EntryStatus::Pending)?;
                claimed.insert(host_id);
                tracing::debug!(entry = %entry_id, host = %host_id, "direct host assigned");
            } else if let Some(label) = entry.meta_host {
                // Metahost entry: any enrolled, ACL-permitted host with the
                // label that nobody has claimed yet this cycle.
                let pick = state
                    .metahost_candidates(label, &owner)
                    .into_iter()
                    .rev()
                    .find(|host_id| !claimed.contains(host_id));
                let Some(host_id) = pick else {
                    continue;
                };
                let subdir = state.require_host(host_id)?.hostname.clone();
                state.assign_host(entry_id, host_id, &subdir)?;
                state.set_entry_status(entry_id, EntryStatus::Pending)?;
                claimed.insert(host_id);
                tracing::debug!(entry = %entry_id, label = %label, host = %host_id, "metahost resolved");
            }
        }
        Ok(())
    }
}

#[cfg(test)]
#[path = "host_scheduler_tests.rs"]
mod tests;
