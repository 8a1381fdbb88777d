// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Workspace-level behavior specs: a real dispatcher driven against the
//! fake drone adapter, asserting the scheduler's externally visible
//! guarantees.

use parking_lot::Mutex;
use rig_adapters::FakeDroneAdapter;
use rig_core::test_support::{acl_group, hostless_entry, job, queued_entry, ready_host};
use rig_core::{EntryId, EntryStatus, FakeClock, PidfileContents, SchedulerConfig};
use rig_engine::Dispatcher;
use rig_storage::SchedulerState;
use std::sync::Arc;

struct Lab {
    state: Arc<Mutex<SchedulerState>>,
    drones: FakeDroneAdapter,
    clock: FakeClock,
    dispatcher: Dispatcher<FakeDroneAdapter, FakeClock>,
}

impl Lab {
    fn new(config: SchedulerConfig) -> Self {
        let state = Arc::new(Mutex::new(SchedulerState::new()));
        let drones = FakeDroneAdapter::new();
        let clock = FakeClock::new();
        let dispatcher = Dispatcher::new(
            Arc::clone(&state),
            drones.clone(),
            clock.clone(),
            config,
        );
        Self {
            state,
            drones,
            clock,
            dispatcher,
        }
    }

    async fn tick(&mut self) {
        self.dispatcher.tick().await.unwrap();
    }

    fn entry_status(&self, id: u64) -> EntryStatus {
        self.state.lock().get_entry(EntryId::new(id)).unwrap().status
    }

    fn complete_launch(&self, index: usize, exit: i32) {
        let launch = self.drones.launches()[index].clone();
        self.drones.set_pidfile(
            &launch.pidfile_id,
            PidfileContents {
                pid: Some(500 + index as u32),
                exit_status: Some(exit),
                num_tests_failed: Some(0),
            },
        );
    }

    /// Drive an entry from wherever it is to a terminal status, scripting
    /// every launch that appears as an immediate success.
    async fn drain(&mut self, max_ticks: usize) {
        for _ in 0..max_ticks {
            let launches = self.drones.launches();
            for (index, _) in launches.iter().enumerate() {
                self.complete_launch(index, 0);
            }
            self.tick().await;
        }
    }
}

#[tokio::test]
async fn higher_priority_job_is_scheduled_first() {
    let mut lab = Lab::new(SchedulerConfig::default());
    {
        let mut state = lab.state.lock();
        state.add_acl_group(acl_group("lab", &["deborah"], &[1]));
        state.add_job(job(1, "deborah", 0));
        state.add_job(job(2, "deborah", 1));
        state.add_host(ready_host(1, "rig-01"));
        state.add_entry(queued_entry(10, 1, Some(1)));
        state.add_entry(queued_entry(11, 2, Some(1)));
    }

    lab.tick().await;

    assert_eq!(lab.entry_status(11), EntryStatus::Pending);
    assert_eq!(lab.entry_status(10), EntryStatus::Queued);
}

#[tokio::test]
async fn equal_priority_falls_to_submission_order() {
    let mut lab = Lab::new(SchedulerConfig::default());
    {
        let mut state = lab.state.lock();
        state.add_acl_group(acl_group("lab", &["deborah"], &[1]));
        // Job 9 was submitted after job 4; both want the same host.
        state.add_job(job(9, "deborah", 2));
        state.add_job(job(4, "deborah", 2));
        state.add_host(ready_host(1, "rig-01"));
        state.add_entry(queued_entry(10, 9, Some(1)));
        state.add_entry(queued_entry(11, 4, Some(1)));
    }

    lab.tick().await;

    assert_eq!(lab.entry_status(11), EntryStatus::Pending);
    assert_eq!(lab.entry_status(10), EntryStatus::Queued);
}

#[tokio::test]
async fn acl_blocks_direct_assignment_until_one_time_bypass() {
    let mut lab = Lab::new(SchedulerConfig::default());
    {
        let mut state = lab.state.lock();
        // deborah has no ACL covering the host.
        state.add_acl_group(acl_group("lab", &["mallory"], &[1]));
        state.add_job(job(1, "deborah", 0));
        state.add_host(ready_host(1, "rig-01"));
        state.add_entry(queued_entry(10, 1, Some(1)));
    }

    lab.tick().await;
    lab.tick().await;
    assert_eq!(lab.entry_status(10), EntryStatus::Queued, "ACL enforced");

    // Re-enroll the host as one-time: direct assignment now bypasses ACLs.
    {
        let mut state = lab.state.lock();
        let mut host = ready_host(1, "rig-01");
        host.invalid = true;
        state.add_host(host);
    }
    lab.tick().await;
    assert_eq!(lab.entry_status(10), EntryStatus::Pending);
}

#[tokio::test]
async fn hostless_scheduling_is_idempotent() {
    let mut lab = Lab::new(SchedulerConfig::default());
    {
        let mut state = lab.state.lock();
        state.add_job(job(1, "ci", 0));
        state.add_entry(hostless_entry(10, 1));
    }

    lab.tick().await;
    let launches_after_first = lab.drones.launches().len();
    lab.tick().await;
    lab.tick().await;

    assert_eq!(launches_after_first, 1);
    assert_eq!(lab.drones.launches().len(), 1, "never re-triggered");
    assert_eq!(lab.entry_status(10), EntryStatus::Running);
}

#[tokio::test]
async fn throttle_admits_fifo_and_never_oversubscribes() {
    let mut lab = Lab::new(SchedulerConfig {
        max_processes_per_drone: 3,
        ..SchedulerConfig::default()
    });
    {
        let mut state = lab.state.lock();
        state.add_acl_group(acl_group("lab", &["deborah"], &[1, 2, 3, 4]));
        for id in 1u64..=4 {
            state.add_job(job(id, "deborah", 0));
            state.add_host(ready_host(id, &format!("rig-{:02}", id)));
            state.add_entry(queued_entry(10 + id, id, Some(id)));
        }
    }

    lab.tick().await;
    lab.tick().await;

    assert_eq!(lab.drones.launches().len(), 3, "cap honored");
    assert_eq!(lab.entry_status(14), EntryStatus::Starting);

    for _ in 0..4 {
        lab.tick().await;
    }
    assert_eq!(lab.drones.launches().len(), 3, "fourth never sneaks in");

    // One run finishes; the waiting agent is admitted.
    lab.complete_launch(0, 0);
    lab.tick().await;
    lab.tick().await;
    assert_eq!(lab.entry_status(14), EntryStatus::Running);
}

#[tokio::test]
async fn every_run_reaches_a_terminal_status() {
    let mut lab = Lab::new(SchedulerConfig::default());
    {
        let mut state = lab.state.lock();
        state.add_acl_group(acl_group("lab", &["deborah"], &[1, 2]));
        state.add_job(job(1, "deborah", 0));
        state.add_job(job(2, "deborah", 0));
        state.add_host(ready_host(1, "rig-01"));
        state.add_host(ready_host(2, "rig-02"));
        // Entry 10 will run cleanly; entry 11's process will vanish.
        state.add_entry(queued_entry(10, 1, Some(1)));
        state.add_entry(queued_entry(11, 2, Some(2)));
    }

    lab.tick().await;
    lab.tick().await;
    assert_eq!(lab.entry_status(10), EntryStatus::Running);
    assert_eq!(lab.entry_status(11), EntryStatus::Running);

    // Entry 10 completes; entry 11's process reports a pid then dies
    // without ever writing an exit record.
    lab.complete_launch(0, 0);
    let lost = lab.drones.launches()[1].clone();
    lab.drones.set_pidfile(
        &lost.pidfile_id,
        PidfileContents {
            pid: Some(77),
            exit_status: None,
            num_tests_failed: None,
        },
    );

    // Loss detection: one tick to observe the pid, one for the failed
    // liveness check and confirmation read.
    lab.tick().await;
    lab.tick().await;
    assert_eq!(lab.entry_status(11), EntryStatus::Parsing);

    // Both executions go through reparse and finalize.
    for index in 2..4 {
        lab.tick().await;
        if lab.drones.launches().len() > index {
            lab.complete_launch(index, 0);
        }
    }
    lab.tick().await;

    assert_eq!(lab.entry_status(10), EntryStatus::Completed);
    assert_eq!(
        lab.entry_status(11),
        EntryStatus::Completed,
        "a lost process still finishes as a failed run, never hangs"
    );
}

#[tokio::test]
async fn abort_requests_always_terminate_entries() {
    let mut lab = Lab::new(SchedulerConfig::default());
    {
        let mut state = lab.state.lock();
        state.add_acl_group(acl_group("lab", &["deborah"], &[1]));
        state.add_job(job(1, "deborah", 0));
        state.add_host(ready_host(1, "rig-01"));
        state.add_entry(queued_entry(10, 1, Some(1)));
    }

    // Abort while still queued: terminal immediately, nothing launched.
    lab.state.lock().request_abort(EntryId::new(10)).unwrap();
    lab.tick().await;
    assert_eq!(lab.entry_status(10), EntryStatus::Aborted);
    assert!(lab.drones.launches().is_empty());
}

#[tokio::test]
async fn pidfile_timeout_fails_silent_processes() {
    let mut lab = Lab::new(SchedulerConfig {
        pidfile_timeout_secs: 60,
        ..SchedulerConfig::default()
    });
    {
        let mut state = lab.state.lock();
        state.add_acl_group(acl_group("lab", &["deborah"], &[1]));
        state.add_job(job(1, "deborah", 0));
        state.add_host(ready_host(1, "rig-01"));
        state.add_entry(queued_entry(10, 1, Some(1)));
    }

    lab.tick().await;
    lab.tick().await;
    assert_eq!(lab.entry_status(10), EntryStatus::Running);

    // The launched process never writes a pid at all.
    lab.clock.advance(std::time::Duration::from_secs(61));
    lab.tick().await;
    assert_eq!(lab.entry_status(10), EntryStatus::Parsing);

    lab.drain(3).await;
    assert_eq!(lab.entry_status(10), EntryStatus::Completed);
}
