// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Shared test builders for use across crates.
//!
//! Gated behind `#[cfg(any(test, feature = "test-support"))]`.

use crate::host::{AclGroup, Host, HostId, HostStatus, LabelId};
use crate::job::{Job, JobId};
use crate::queue_entry::{EntryId, HostQueueEntry};
use std::collections::BTreeSet;

pub fn job(id: u64, owner: &str, priority: i32) -> Job {
    Job {
        id: JobId::new(id),
        name: format!("job-{}", id),
        owner: owner.to_string(),
        priority,
        synchronous: false,
        run_verify: false,
        drone_set: None,
    }
}

pub fn sync_job(id: u64, owner: &str, priority: i32) -> Job {
    Job {
        synchronous: true,
        ..job(id, owner, priority)
    }
}

pub fn ready_host(id: u64, hostname: &str) -> Host {
    Host {
        id: HostId::new(id),
        hostname: hostname.to_string(),
        status: HostStatus::Ready,
        locked: false,
        lock_reason: None,
        invalid: false,
        labels: BTreeSet::new(),
    }
}

pub fn labeled_host(id: u64, hostname: &str, labels: &[u64]) -> Host {
    Host {
        labels: labels.iter().copied().map(LabelId::new).collect(),
        ..ready_host(id, hostname)
    }
}

/// Direct-host entry when `host` is set, hostless otherwise.
pub fn queued_entry(id: u64, job_id: u64, host: Option<u64>) -> HostQueueEntry {
    HostQueueEntry {
        host_id: host.map(HostId::new),
        ..HostQueueEntry::new(EntryId::new(id), JobId::new(job_id))
    }
}

pub fn meta_entry(id: u64, job_id: u64, label: u64) -> HostQueueEntry {
    HostQueueEntry {
        meta_host: Some(LabelId::new(label)),
        ..HostQueueEntry::new(EntryId::new(id), JobId::new(job_id))
    }
}

pub fn hostless_entry(id: u64, job_id: u64) -> HostQueueEntry {
    HostQueueEntry::new(EntryId::new(id), JobId::new(job_id))
}

pub fn acl_group(name: &str, users: &[&str], hosts: &[u64]) -> AclGroup {
    AclGroup {
        name: name.to_string(),
        users: users.iter().map(|u| u.to_string()).collect(),
        hosts: hosts.iter().copied().map(HostId::new).collect(),
    }
}
