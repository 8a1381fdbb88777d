// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use crate::test_helpers::{ScriptedTask, TestAgent, TestContext};

#[tokio::test]
async fn abort_before_start_never_polls() {
    let harness = TestContext::new();
    let (task, handle) = ScriptedTask::endless(true);
    let mut agent = TestAgent::new(vec![Box::new(task)], None);

    assert!(!agent.started());
    agent.abort(&harness.ctx()).await.unwrap();

    assert!(agent.is_done(), "pre-start abort is unconditional");
    assert!(agent.was_aborted());
    assert_eq!(handle.polls(), 0, "the task was never polled");
    assert_eq!(handle.aborts(), 0, "the task's own abort was not needed");
}

#[tokio::test]
async fn tick_marks_started_and_polls() {
    let harness = TestContext::new();
    let (task, handle) = ScriptedTask::new(2, true);
    let mut agent = TestAgent::new(vec![Box::new(task)], None);

    agent.tick(&harness.ctx()).await.unwrap();
    assert!(agent.started());
    assert!(!agent.is_done());
    assert_eq!(handle.polls(), 1);

    agent.tick(&harness.ctx()).await.unwrap();
    assert!(agent.is_done());
}

#[tokio::test]
async fn fifo_walks_through_tasks_finished_within_a_tick() {
    let harness = TestContext::new();
    let (first, first_handle) = ScriptedTask::new(1, true);
    let (second, second_handle) = ScriptedTask::new(2, true);
    let mut agent = TestAgent::new(vec![Box::new(first), Box::new(second)], None);

    // First task completes on its first poll, so the same tick already
    // polls the second.
    agent.tick(&harness.ctx()).await.unwrap();
    assert_eq!(first_handle.polls(), 1);
    assert_eq!(second_handle.polls(), 1);
    assert!(!agent.is_done());

    agent.tick(&harness.ctx()).await.unwrap();
    assert_eq!(second_handle.polls(), 2);
    assert!(agent.is_done());
}

#[tokio::test]
async fn failed_task_invalidates_the_rest_of_the_fifo() {
    let harness = TestContext::new();
    let (failing, _) = ScriptedTask::new(1, false);
    let (follow_up, follow_up_handle) = ScriptedTask::new(1, true);
    let mut agent = TestAgent::new(vec![Box::new(failing), Box::new(follow_up)], None);

    agent.tick(&harness.ctx()).await.unwrap();

    assert!(agent.is_done());
    assert_eq!(follow_up_handle.polls(), 0, "follow-up work never ran");
}

#[tokio::test]
async fn abort_after_start_delegates_and_keeps_polling() {
    let harness = TestContext::new();
    let (task, handle) = ScriptedTask::endless(true);
    let task = task.with_slow_abort();
    let (follow_up, follow_up_handle) = ScriptedTask::new(1, true);
    let mut agent = TestAgent::new(vec![Box::new(task), Box::new(follow_up)], None);

    agent.tick(&harness.ctx()).await.unwrap();
    agent.abort(&harness.ctx()).await.unwrap();

    assert_eq!(handle.aborts(), 1, "started abort goes through the task");
    assert!(!agent.is_done(), "task needs another poll to wind down");

    agent.tick(&harness.ctx()).await.unwrap();
    assert!(agent.is_done());
    assert_eq!(follow_up_handle.polls(), 0, "queued tasks were dropped");
}

#[tokio::test]
async fn abort_is_idempotent() {
    let harness = TestContext::new();
    let (task, handle) = ScriptedTask::endless(true);
    let mut agent = TestAgent::new(vec![Box::new(task)], None);

    agent.tick(&harness.ctx()).await.unwrap();
    agent.abort(&harness.ctx()).await.unwrap();
    agent.abort(&harness.ctx()).await.unwrap();

    assert_eq!(handle.aborts(), 1);
}

#[tokio::test]
async fn num_processes_follows_the_current_task() {
    let harness = TestContext::new();
    let (first, _) = ScriptedTask::new(1, true);
    let first = first.with_cost(3);
    let (second, _) = ScriptedTask::endless(true);
    let mut agent = TestAgent::new(vec![Box::new(first), Box::new(second)], None);

    assert_eq!(agent.num_processes(), 3);

    agent.tick(&harness.ctx()).await.unwrap();
    assert_eq!(agent.num_processes(), 1, "front task finished; cost follows");

    agent.abort(&harness.ctx()).await.unwrap();
    let _ = agent.tick(&harness.ctx()).await;
    assert_eq!(agent.num_processes(), 0, "done agents cost nothing");
}
