// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Host rows and ACL groups.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

crate::define_id! {
    /// Unique identifier for a host.
    pub struct HostId;
}

crate::define_id! {
    /// Unique identifier for a host label (used for metahost matching).
    pub struct LabelId;
}

/// Status of a lab host.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HostStatus {
    /// Idle and schedulable.
    Ready,
    /// Claimed by a queue entry that has not launched yet.
    Pending,
    /// A verify task is running against it.
    Verifying,
    /// A cleanup task is running against it.
    Cleaning,
    /// A repair task is running against it.
    Repairing,
    /// Repair gave up; the host is out of rotation until an operator steps in.
    RepairFailed,
    /// A test process is running on it.
    Running,
}

impl fmt::Display for HostStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HostStatus::Ready => write!(f, "Ready"),
            HostStatus::Pending => write!(f, "Pending"),
            HostStatus::Verifying => write!(f, "Verifying"),
            HostStatus::Cleaning => write!(f, "Cleaning"),
            HostStatus::Repairing => write!(f, "Repairing"),
            HostStatus::RepairFailed => write!(f, "Repair Failed"),
            HostStatus::Running => write!(f, "Running"),
        }
    }
}

/// A physical or virtual machine tests run against.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Host {
    pub id: HostId,
    pub hostname: String,
    pub status: HostStatus,
    pub locked: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lock_reason: Option<String>,
    /// A "one-time" host: never formally enrolled, exempt from ACL checks
    /// for direct assignment, and never eligible for metahost matching.
    pub invalid: bool,
    /// Labels this host carries, for metahost resolution.
    #[serde(default)]
    pub labels: BTreeSet<LabelId>,
}

impl Host {
    /// A host can take new work only when it is Ready and unlocked.
    /// ACL and validity checks are the scheduler's, not the host's.
    pub fn is_schedulable(&self) -> bool {
        self.status == HostStatus::Ready && !self.locked
    }

    pub fn has_label(&self, label: LabelId) -> bool {
        self.labels.contains(&label)
    }
}

/// An access-control group tying users to the hosts they may use.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AclGroup {
    pub name: String,
    pub users: BTreeSet<String>,
    pub hosts: BTreeSet<HostId>,
}

impl AclGroup {
    pub fn permits(&self, user: &str, host: HostId) -> bool {
        self.users.contains(user) && self.hosts.contains(&host)
    }
}

#[cfg(test)]
#[path = "host_tests.rs"]
mod tests;
