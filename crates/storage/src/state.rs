// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The scheduler-side model store.

use rig_core::{
    AclGroup, EntryId, EntryStatus, Host, HostId, HostQueueEntry, HostStatus, Job, JobId, LabelId,
};
use std::cmp::Reverse;
use std::collections::{BTreeMap, HashMap, HashSet};
use thiserror::Error;

/// Errors from targeted lookups and updates.
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("job not found: {0}")]
    JobNotFound(JobId),
    #[error("host not found: {0}")]
    HostNotFound(HostId),
    #[error("queue entry not found: {0}")]
    EntryNotFound(EntryId),
}

/// Status counts for periodic maintenance logging.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StatusCensus {
    pub entries: BTreeMap<String, usize>,
    pub hosts: BTreeMap<String, usize>,
}

/// In-memory store of jobs, hosts, queue entries, and ACL groups.
///
/// Shared as `Arc<parking_lot::Mutex<SchedulerState>>` between the
/// dispatcher and whatever feeds rows in. Updates are atomic per method
/// call: an update committed here is visible to the next query.
#[derive(Debug, Default)]
pub struct SchedulerState {
    jobs: HashMap<JobId, Job>,
    hosts: HashMap<HostId, Host>,
    entries: HashMap<EntryId, HostQueueEntry>,
    acl_groups: Vec<AclGroup>,
}

impl SchedulerState {
    pub fn new() -> Self {
        Self::default()
    }

    // ── Ingest (front-end side of the boundary) ─────────────────────────

    pub fn add_job(&mut self, job: Job) {
        self.jobs.insert(job.id, job);
    }

    pub fn add_host(&mut self, host: Host) {
        self.hosts.insert(host.id, host);
    }

    pub fn add_entry(&mut self, entry: HostQueueEntry) {
        self.entries.insert(entry.id, entry);
    }

    pub fn add_acl_group(&mut self, group: AclGroup) {
        self.acl_groups.push(group);
    }

    // ── Lookups ─────────────────────────────────────────────────────────

    pub fn get_job(&self, id: JobId) -> Option<&Job> {
        self.jobs.get(&id)
    }

    pub fn get_host(&self, id: HostId) -> Option<&Host> {
        self.hosts.get(&id)
    }

    pub fn get_entry(&self, id: EntryId) -> Option<&HostQueueEntry> {
        self.entries.get(&id)
    }

    pub fn require_job(&self, id: JobId) -> Result<&Job, StorageError> {
        self.jobs.get(&id).ok_or(StorageError::JobNotFound(id))
    }

    pub fn require_host(&self, id: HostId) -> Result<&Host, StorageError> {
        self.hosts.get(&id).ok_or(StorageError::HostNotFound(id))
    }

    pub fn require_entry(&self, id: EntryId) -> Result<&HostQueueEntry, StorageError> {
        self.entries.get(&id).ok_or(StorageError::EntryNotFound(id))
    }

    // ── Targeted updates ────────────────────────────────────────────────

    /// Set an entry's status, keeping its derived flags in sync.
    pub fn set_entry_status(
        &mut self,
        id: EntryId,
        status: EntryStatus,
    ) -> Result<(), StorageError> {
        let entry = self
            .entries
            .get_mut(&id)
            .ok_or(StorageError::EntryNotFound(id))?;
        tracing::debug!(entry = %id, from = %entry.status, to = %status, "entry status");
        entry.set_status(status);
        Ok(())
    }

    /// Resolve an entry to a concrete host and execution subdirectory.
    /// Metahost entries keep their label for possible re-matching.
    pub fn assign_host(
        &mut self,
        id: EntryId,
        host_id: HostId,
        execution_subdir: &str,
    ) -> Result<(), StorageError> {
        if !self.hosts.contains_key(&host_id) {
            return Err(StorageError::HostNotFound(host_id));
        }
        let entry = self
            .entries
            .get_mut(&id)
            .ok_or(StorageError::EntryNotFound(id))?;
        entry.host_id = Some(host_id);
        entry.execution_subdir = execution_subdir.to_string();
        Ok(())
    }

    /// Set the execution subdirectory without touching host assignment
    /// (hostless entries, synchronous group subdirs).
    pub fn set_execution_subdir(
        &mut self,
        id: EntryId,
        execution_subdir: &str,
    ) -> Result<(), StorageError> {
        let entry = self
            .entries
            .get_mut(&id)
            .ok_or(StorageError::EntryNotFound(id))?;
        entry.execution_subdir = execution_subdir.to_string();
        Ok(())
    }

    /// Drop a metahost entry's resolved host so the label is re-matched.
    pub fn clear_host(&mut self, id: EntryId) -> Result<(), StorageError> {
        let entry = self
            .entries
            .get_mut(&id)
            .ok_or(StorageError::EntryNotFound(id))?;
        entry.host_id = None;
        entry.execution_subdir.clear();
        Ok(())
    }

    pub fn set_host_status(&mut self, id: HostId, status: HostStatus) -> Result<(), StorageError> {
        let host = self
            .hosts
            .get_mut(&id)
            .ok_or(StorageError::HostNotFound(id))?;
        tracing::debug!(host = %host.hostname, from = %host.status, to = %status, "host status");
        host.status = status;
        Ok(())
    }

    pub fn lock_host(&mut self, id: HostId, reason: Option<String>) -> Result<(), StorageError> {
        let host = self
            .hosts
            .get_mut(&id)
            .ok_or(StorageError::HostNotFound(id))?;
        host.locked = true;
        host.lock_reason = reason;
        Ok(())
    }

    pub fn unlock_host(&mut self, id: HostId) -> Result<(), StorageError> {
        let host = self
            .hosts
            .get_mut(&id)
            .ok_or(StorageError::HostNotFound(id))?;
        host.locked = false;
        host.lock_reason = None;
        Ok(())
    }

    /// Flag an entry for abort. The dispatcher consumes the flag each tick.
    pub fn request_abort(&mut self, id: EntryId) -> Result<(), StorageError> {
        let entry = self
            .entries
            .get_mut(&id)
            .ok_or(StorageError::EntryNotFound(id))?;
        if !entry.complete {
            entry.abort_requested = true;
        }
        Ok(())
    }

    // ── Ordered queries ─────────────────────────────────────────────────

    /// Entries eligible for new scheduling, in scheduling order:
    /// priority descending, then direct-host entries before metahost
    /// entries before hostless (ids descending, absent last), then job id
    /// ascending so earlier-submitted jobs win ties.
    pub fn pending_queue_entries(&self) -> Vec<EntryId> {
        let mut eligible: Vec<&HostQueueEntry> = self
            .entries
            .values()
            .filter(|entry| entry.is_eligible())
            .collect();

        eligible.sort_by_key(|entry| {
            let priority = match self.jobs.get(&entry.job_id) {
                Some(job) => job.priority,
                None => {
                    tracing::warn!(entry = %entry.id, job = %entry.job_id, "entry references missing job");
                    i32::MIN
                }
            };
            (
                Reverse(priority),
                desc_ids_first(entry.host_id.map(|id| id.value())),
                desc_ids_first(entry.meta_host.map(|id| id.value())),
                entry.job_id,
                entry.id,
            )
        });

        eligible.into_iter().map(|entry| entry.id).collect()
    }

    /// Incomplete entries with an operator abort request.
    pub fn abort_requested_entries(&self) -> Vec<EntryId> {
        let mut ids: Vec<EntryId> = self
            .entries
            .values()
            .filter(|entry| entry.abort_requested && !entry.complete)
            .map(|entry| entry.id)
            .collect();
        ids.sort();
        ids
    }

    /// Entries currently in the given status, id order.
    pub fn entries_with_status(&self, status: EntryStatus) -> Vec<EntryId> {
        let mut ids: Vec<EntryId> = self
            .entries
            .values()
            .filter(|entry| entry.status == status)
            .map(|entry| entry.id)
            .collect();
        ids.sort();
        ids
    }

    /// All entries belonging to a job, id order.
    pub fn entries_for_job(&self, job_id: JobId) -> Vec<EntryId> {
        let mut ids: Vec<EntryId> = self
            .entries
            .values()
            .filter(|entry| entry.job_id == job_id)
            .map(|entry| entry.id)
            .collect();
        ids.sort();
        ids
    }

    /// Hosts already held by active (non-terminal, non-queued) entries.
    pub fn active_entry_hosts(&self) -> HashSet<HostId> {
        self.entries
            .values()
            .filter(|entry| entry.active)
            .filter_map(|entry| entry.host_id)
            .collect()
    }

    /// Schedulable, enrolled hosts carrying a label, accessible to a user.
    /// Candidates for metahost assignment.
    pub fn metahost_candidates(&self, label: LabelId, user: &str) -> Vec<HostId> {
        let mut ids: Vec<HostId> = self
            .hosts
            .values()
            .filter(|host| {
                host.has_label(label)
                    && host.is_schedulable()
                    && !host.invalid
                    && self.acl_accessible(user, host.id)
            })
            .map(|host| host.id)
            .collect();
        ids.sort();
        ids
    }

    /// Whether any ACL group grants the user access to the host.
    pub fn acl_accessible(&self, user: &str, host: HostId) -> bool {
        self.acl_groups
            .iter()
            .any(|group| group.permits(user, host))
    }

    // ── Maintenance ─────────────────────────────────────────────────────

    /// Status counts over entries and hosts, for utilization logging.
    pub fn census(&self) -> StatusCensus {
        let mut census = StatusCensus::default();
        for entry in self.entries.values() {
            *census.entries.entry(entry.status.to_string()).or_insert(0) += 1;
        }
        for host in self.hosts.values() {
            *census.hosts.entry(host.status.to_string()).or_insert(0) += 1;
        }
        census
    }
}

/// Sort key for "descending, absent last" id ordering.
fn desc_ids_first(id: Option<u64>) -> (bool, Reverse<u64>) {
    match id {
        Some(value) => (false, Reverse(value)),
        None => (true, Reverse(0)),
    }
}

#[cfg(test)]
#[path = "state_tests.rs"]
mod tests;
