// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::{DroneAdapter, DroneError, ExecutionRequest, LocalDroneAdapter, LOCAL_HOSTNAME};
use rig_core::{PidfileContents, PidfileId, Process};
use std::collections::BTreeSet;
use std::time::Duration;

fn request(tag: &str, command: &[&str]) -> ExecutionRequest {
    ExecutionRequest {
        tag: tag.to_string(),
        pidfile_name: ".autoserv_execute".to_string(),
        command: command.iter().map(|a| a.to_string()).collect(),
        drone_hostnames_allowed: None,
    }
}

/// Poll the pidfile until the predicate holds or a few seconds pass.
async fn wait_for<F>(
    adapter: &LocalDroneAdapter,
    id: &PidfileId,
    predicate: F,
) -> PidfileContents
where
    F: Fn(&PidfileContents) -> bool,
{
    for _ in 0..100 {
        let contents = adapter.get_pidfile_contents(id, false).await.unwrap();
        if predicate(&contents) {
            return contents;
        }
        tokio::time::sleep(Duration::from_millis(50)).await;
    }
    panic!("pidfile never reached expected state");
}

#[tokio::test]
async fn successful_command_completes_with_exit_zero() {
    let dir = tempfile::tempdir().unwrap();
    let adapter = LocalDroneAdapter::new(dir.path());

    let launch = adapter.execute(&request("1-u/h1", &["true"])).await.unwrap();
    assert_eq!(launch.hostname, LOCAL_HOSTNAME);

    let contents = wait_for(&adapter, &launch.pidfile_id, |c| c.is_complete()).await;
    assert_eq!(contents.exit_status, Some(0));
    assert_eq!(contents.num_tests_failed, Some(0));
}

#[tokio::test]
async fn failing_command_reports_exit_status() {
    let dir = tempfile::tempdir().unwrap();
    let adapter = LocalDroneAdapter::new(dir.path());

    let launch = adapter
        .execute(&request("2-u/h1", &["sh", "-c", "exit 7"]))
        .await
        .unwrap();

    let contents = wait_for(&adapter, &launch.pidfile_id, |c| c.is_complete()).await;
    assert_eq!(contents.exit_status, Some(7));
}

#[tokio::test]
async fn failed_count_file_is_reported() {
    let dir = tempfile::tempdir().unwrap();
    let adapter = LocalDroneAdapter::new(dir.path());

    let launch = adapter
        .execute(&request(
            "3-u/h1",
            &["sh", "-c", "echo 2 > .failed_count; exit 1"],
        ))
        .await
        .unwrap();

    let contents = wait_for(&adapter, &launch.pidfile_id, |c| c.is_complete()).await;
    assert_eq!(contents.exit_status, Some(1));
    assert_eq!(contents.num_tests_failed, Some(2));
}

#[tokio::test]
async fn absent_pidfile_reads_as_empty() {
    let dir = tempfile::tempdir().unwrap();
    let adapter = LocalDroneAdapter::new(dir.path());

    let id = PidfileId::new("9-u/h1", ".autoserv_execute");
    let contents = adapter.get_pidfile_contents(&id, false).await.unwrap();
    assert!(contents.is_empty());
}

#[tokio::test]
async fn garbage_pidfile_is_invalid() {
    let dir = tempfile::tempdir().unwrap();
    let adapter = LocalDroneAdapter::new(dir.path());

    let tag_dir = dir.path().join("4-u/h1");
    std::fs::create_dir_all(&tag_dir).unwrap();
    std::fs::write(tag_dir.join(".autoserv_execute"), "not a pid\n").unwrap();

    let id = PidfileId::new("4-u/h1", ".autoserv_execute");
    let err = adapter.get_pidfile_contents(&id, false).await.unwrap_err();
    assert!(matches!(err, DroneError::InvalidPidfile { .. }));
}

#[tokio::test]
async fn liveness_and_kill_follow_the_real_process() {
    let dir = tempfile::tempdir().unwrap();
    let adapter = LocalDroneAdapter::new(dir.path());

    let launch = adapter
        .execute(&request("5-u/h1", &["sleep", "30"]))
        .await
        .unwrap();

    let contents = wait_for(&adapter, &launch.pidfile_id, |c| c.pid.is_some()).await;
    let process = Process {
        hostname: LOCAL_HOSTNAME.to_string(),
        pid: contents.pid.unwrap(),
    };

    assert!(adapter.is_process_running(&process).await.unwrap());

    adapter.kill_process(&process).await.unwrap();
    for _ in 0..100 {
        if !adapter.is_process_running(&process).await.unwrap() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(50)).await;
    }
    panic!("process survived kill");
}

#[tokio::test]
async fn execute_outside_allowed_set_fails() {
    let dir = tempfile::tempdir().unwrap();
    let adapter = LocalDroneAdapter::new(dir.path());

    let mut req = request("6-u/h1", &["true"]);
    req.drone_hostnames_allowed = Some(BTreeSet::from(["drone-elsewhere".to_string()]));

    let err = adapter.execute(&req).await.unwrap_err();
    assert!(matches!(err, DroneError::NoDroneAvailable { .. }));
}
