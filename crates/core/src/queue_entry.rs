// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Host queue entries: one job-to-host (or label) assignment.

use crate::host::{HostId, LabelId};
use crate::job::JobId;
use serde::{Deserialize, Serialize};
use std::fmt;

crate::define_id! {
    /// Unique identifier for a host queue entry.
    pub struct EntryId;
}

/// Status of a host queue entry.
///
/// The `active` and `complete` flags on [`HostQueueEntry`] are derived from
/// the status via [`HostQueueEntry::set_status`]; nothing else may write
/// them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntryStatus {
    /// Waiting for a host. The only status eligible for new scheduling.
    Queued,
    /// Host assigned; waiting for the rest of a synchronous group, or for
    /// the dispatcher to promote it to an agent.
    Pending,
    /// A pre-job verify is running on the host.
    Verifying,
    /// An agent owns it but the test process has not launched yet.
    Starting,
    /// The test process is running.
    Running,
    /// The run ended (or was aborted mid-run); results are being parsed.
    Parsing,
    /// Terminal: ran to completion and results were collected.
    Completed,
    /// Terminal: the entry failed before producing a run.
    Failed,
    /// Terminal: aborted by operator request.
    Aborted,
}

impl EntryStatus {
    /// Statuses where an agent (or a pending assignment) owns the entry.
    pub fn is_active(&self) -> bool {
        matches!(
            self,
            EntryStatus::Pending
                | EntryStatus::Verifying
                | EntryStatus::Starting
                | EntryStatus::Running
                | EntryStatus::Parsing
        )
    }

    /// Terminal statuses.
    pub fn is_complete(&self) -> bool {
        matches!(
            self,
            EntryStatus::Completed | EntryStatus::Failed | EntryStatus::Aborted
        )
    }
}

impl fmt::Display for EntryStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EntryStatus::Queued => write!(f, "Queued"),
            EntryStatus::Pending => write!(f, "Pending"),
            EntryStatus::Verifying => write!(f, "Verifying"),
            EntryStatus::Starting => write!(f, "Starting"),
            EntryStatus::Running => write!(f, "Running"),
            EntryStatus::Parsing => write!(f, "Parsing"),
            EntryStatus::Completed => write!(f, "Completed"),
            EntryStatus::Failed => write!(f, "Failed"),
            EntryStatus::Aborted => write!(f, "Aborted"),
        }
    }
}

/// Reserved execution subdirectory for jobs that run without a host.
pub const HOSTLESS_SUBDIR: &str = "hostless";

/// One job-to-host (or job-to-label) assignment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HostQueueEntry {
    pub id: EntryId,
    pub job_id: JobId,
    /// Concrete host. For metahost entries this is empty until assignment
    /// resolves the label to a host.
    pub host_id: Option<HostId>,
    /// Label to resolve to a host at assignment time. Retained after
    /// resolution so a failed host can send the entry back for re-matching.
    pub meta_host: Option<LabelId>,
    pub status: EntryStatus,
    /// Empty until assigned; [`HOSTLESS_SUBDIR`] for jobs with no host.
    #[serde(default)]
    pub execution_subdir: String,
    /// Derived from `status`; see [`HostQueueEntry::set_status`].
    pub active: bool,
    /// Derived from `status`; see [`HostQueueEntry::set_status`].
    pub complete: bool,
    /// Operator asked for this entry to be aborted. The dispatcher consumes
    /// this each tick.
    #[serde(default)]
    pub abort_requested: bool,
}

impl HostQueueEntry {
    pub fn new(id: EntryId, job_id: JobId) -> Self {
        Self {
            id,
            job_id,
            host_id: None,
            meta_host: None,
            status: EntryStatus::Queued,
            execution_subdir: String::new(),
            active: false,
            complete: false,
            abort_requested: false,
        }
    }

    /// Set the status and keep the derived `active`/`complete` flags in sync.
    pub fn set_status(&mut self, status: EntryStatus) {
        self.status = status;
        self.active = status.is_active();
        self.complete = status.is_complete();
    }

    /// Eligible for new scheduling: not complete, not active, still Queued.
    pub fn is_eligible(&self) -> bool {
        !self.complete && !self.active && self.status == EntryStatus::Queued
    }

    /// A hostless entry has neither a host nor a label to resolve.
    pub fn is_hostless(&self) -> bool {
        self.host_id.is_none() && self.meta_host.is_none()
    }

    /// A metahost entry that has not been resolved to a host yet.
    pub fn is_unresolved_metahost(&self) -> bool {
        self.host_id.is_none() && self.meta_host.is_some()
    }
}

#[cfg(test)]
#[path = "queue_entry_tests.rs"]
mod tests;
