// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Job rows as created by the external front end.
//!
//! Jobs are read-only to the scheduler: status lives on the job's host
//! queue entries, never here.

use serde::{Deserialize, Serialize};

crate::define_id! {
    /// Unique identifier for a job.
    ///
    /// Assigned by the external store in creation order, so `JobId`
    /// ordering doubles as submission ordering for scheduling tie-breaks.
    pub struct JobId;
}

/// A test job as submitted through the front end.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Job {
    pub id: JobId,
    pub name: String,
    /// Login of the submitting user. ACL checks and default drone-set
    /// resolution key off this.
    pub owner: String,
    /// Higher priority is scheduled first.
    pub priority: i32,
    /// When true, every queue entry of this job must have a ready host
    /// before any of them starts, and they run as one group.
    pub synchronous: bool,
    /// Run a verify pass on each host before the test proper.
    pub run_verify: bool,
    /// Explicit drone set this job's processes are confined to.
    pub drone_set: Option<String>,
}

impl Job {
    /// Execution tag for one of this job's queue entries.
    ///
    /// The tag names the results directory on the drone and is the stable
    /// half of every pidfile handle for this execution.
    pub fn execution_tag(&self, execution_subdir: &str) -> String {
        format!("{}-{}/{}", self.id, self.owner, execution_subdir)
    }
}

#[cfg(test)]
#[path = "job_tests.rs"]
mod tests;
