//! Integration tests for the supervisor driving real child processes.
//!
//! Workers are stand-in shells so the tests exercise process groups, the
//! deferred kill and the record protocol without a browser.

mod common;

use std::time::Duration;

use tablefleet_supervisor::{is_alive, MemberState};
use tablefleet_types::{Action, IntentRead, WorkerId};

use common::{drain_retirements, fleet, group_members, idle_worker, intent, nested_worker};

#[tokio::test]
async fn broadcast_reaches_every_live_worker_at_one_version() {
    let dir = tempfile::tempdir().unwrap();
    let (mut sup, mut events) = fleet(dir.path(), idle_worker());
    sup.start(3).unwrap();

    let v1 = sup.broadcast(Action::Call);
    let v2 = sup.broadcast(Action::AllIn);
    assert_eq!(v2, v1 + 1);
    for id in sup.live_ids() {
        assert_eq!(sup.store().read(id).unwrap(), intent(v2, Action::AllIn));
    }

    sup.shutdown(&mut events).await;
}

#[tokio::test]
async fn killed_worker_leaves_no_descendant_alive() {
    let dir = tempfile::tempdir().unwrap();
    let (mut sup, mut events) = fleet(dir.path(), nested_worker());
    sup.start(1).unwrap();
    let pid = sup.pid_of(WorkerId(0)).unwrap();

    tokio::time::sleep(Duration::from_millis(300)).await;
    assert!(group_members(pid).len() >= 3, "expected a nested tree");

    sup.kill(WorkerId(0)).unwrap();
    drain_retirements(&mut sup, &mut events).await;

    assert!(!is_alive(pid as i32));
    assert!(group_members(pid).is_empty(), "descendants survived");
}

#[tokio::test]
async fn killed_identity_is_reused_only_after_retirement() {
    let dir = tempfile::tempdir().unwrap();
    let (mut sup, mut events) = fleet(dir.path(), idle_worker());
    sup.start(3).unwrap();

    sup.kill(WorkerId(1)).unwrap();
    assert_eq!(sup.spawn_worker().unwrap(), WorkerId(3));

    drain_retirements(&mut sup, &mut events).await;
    assert_eq!(sup.spawn_worker().unwrap(), WorkerId(1));

    sup.shutdown(&mut events).await;
}

#[tokio::test]
async fn restart_reasserts_standing_intent_and_keeps_log() {
    let dir = tempfile::tempdir().unwrap();
    let (mut sup, mut events) = fleet(dir.path(), idle_worker());
    sup.start(2).unwrap();
    sup.broadcast(Action::Fold);

    sup.restart(WorkerId(0)).unwrap();
    drain_retirements(&mut sup, &mut events).await;

    let version = sup.version();
    assert_eq!(sup.store().read(WorkerId(0)).unwrap(), intent(version, Action::Fold));
    let log = std::fs::read_to_string(sup.store().log_path(WorkerId(0))).unwrap();
    assert_eq!(log.matches("=== Starting worker 0 (pid=").count(), 2);

    // Outlast the delayed exit clear; the re-asserted record must survive.
    tokio::time::sleep(Duration::from_millis(400)).await;
    assert_eq!(sup.store().read(WorkerId(0)).unwrap(), intent(version, Action::Fold));

    sup.shutdown(&mut events).await;
}

#[tokio::test]
async fn restart_of_unknown_identity_is_refused() {
    let dir = tempfile::tempdir().unwrap();
    let (mut sup, mut events) = fleet(dir.path(), idle_worker());
    sup.start(1).unwrap();

    assert!(sup.restart(WorkerId(5)).is_err());
    assert!(sup.pid_of(WorkerId(5)).is_none());
    assert!(!sup.store().log_path(WorkerId(5)).exists());
    // The refused identity stays free for normal allocation.
    assert_eq!(sup.spawn_worker().unwrap(), WorkerId(1));

    sup.shutdown(&mut events).await;
}

#[tokio::test]
async fn worker_that_exits_on_its_own_is_listed_as_exited() {
    let dir = tempfile::tempdir().unwrap();
    let (mut sup, mut events) = fleet(dir.path(), common::shell("exit 4"));
    sup.start(1).unwrap();

    tokio::time::sleep(Duration::from_millis(300)).await;
    let members = sup.statuses();
    assert_eq!(members.len(), 1);
    assert_eq!(members[0].state, MemberState::Exited { code: Some(4) });

    sup.shutdown(&mut events).await;
}

#[tokio::test]
async fn shutdown_exits_every_worker_and_clears_records() {
    let dir = tempfile::tempdir().unwrap();
    let (mut sup, mut events) = fleet(dir.path(), nested_worker());
    let ids = sup.start(2).unwrap();
    let pids: Vec<u32> = ids.iter().filter_map(|&id| sup.pid_of(id)).collect();

    sup.shutdown(&mut events).await;

    for pid in pids {
        assert!(group_members(pid).is_empty(), "group {pid} survived");
    }
    // No exit record outlives the supervisor.
    for id in ids {
        assert_eq!(sup.store().read(id).unwrap(), IntentRead::Empty);
    }
    assert!(sup.live_ids().is_empty());
}
