//! Shared helpers for integration tests.
//!
//! Each integration test file compiles common/ as its own module, so not
//! every helper is used in every file.
#![allow(dead_code)]

use std::path::{Path, PathBuf};
use std::time::Duration;

use tokio::sync::mpsc;

use tablefleet_supervisor::{
    LaunchContext, MemberState, Supervisor, SupervisorEvent, WorkerLaunch,
};
use tablefleet_types::{
    Action, Amount, IntentRead, IntentStore, RecordedAction, SupervisorSettings,
};

/// Grace windows short enough for tests.
pub fn fast_settings() -> SupervisorSettings {
    SupervisorSettings {
        exit_grace_ms: 50,
        exit_clear_delay_ms: 150,
        kill_grace_ms: 300,
    }
}

/// A stand-in worker: a shell that idles until signalled.
pub fn idle_worker() -> WorkerLaunch {
    shell("sleep 300 & wait")
}

/// A stand-in worker with a nested child shell, like a worker and its
/// browser helpers.
pub fn nested_worker() -> WorkerLaunch {
    shell("/bin/sh -c 'sleep 300 & wait' & sleep 300 & wait")
}

pub fn shell(script: &str) -> WorkerLaunch {
    WorkerLaunch {
        program: PathBuf::from("/bin/sh"),
        args: vec!["-c".into(), script.into()],
    }
}

pub fn fleet(
    root: &Path,
    launch: WorkerLaunch,
) -> (Supervisor, mpsc::UnboundedReceiver<SupervisorEvent>) {
    let context = LaunchContext {
        root: root.to_path_buf(),
        target_url: "https://table.example/room".into(),
        threshold: Amount::from_units(1000),
    };
    Supervisor::new(fast_settings(), IntentStore::new(root), launch, context)
}

pub fn intent(version: u64, action: Action) -> IntentRead {
    IntentRead::Intent {
        version,
        action: RecordedAction::Known(action),
    }
}

/// Feed events into the supervisor until every retiring worker is gone.
pub async fn drain_retirements(
    sup: &mut Supervisor,
    events: &mut mpsc::UnboundedReceiver<SupervisorEvent>,
) {
    let deadline = tokio::time::Instant::now() + Duration::from_secs(10);
    while sup
        .statuses()
        .iter()
        .any(|m| m.state == MemberState::Retiring)
    {
        let event = tokio::time::timeout_at(deadline, events.recv())
            .await
            .expect("timed out waiting for retirements")
            .expect("event channel closed");
        sup.handle_event(&event).expect("event should apply");
    }
}

/// Every process in the process group `pgid`, via `ps`.
pub fn group_members(pgid: u32) -> Vec<u32> {
    let output = std::process::Command::new("ps")
        .args(["-A", "-o", "pid=,pgid=,stat="])
        .output()
        .expect("ps should run");
    String::from_utf8_lossy(&output.stdout)
        .lines()
        .filter_map(|line| {
            let mut fields = line.split_whitespace();
            let pid: u32 = fields.next()?.parse().ok()?;
            let group: u32 = fields.next()?.parse().ok()?;
            let zombie = fields.next().is_some_and(|s| s.starts_with('Z'));
            (group == pgid && !zombie).then_some(pid)
        })
        .collect()
}
