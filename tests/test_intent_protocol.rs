//! Integration tests for the intent record protocol.
//!
//! The supervisor side writes records through `IntentStore`; the worker side
//! reads them back through the same store and feeds them to an
//! `IntentTracker`. These tests drive both ends against one temp directory.

mod common;

use tablefleet_types::{Action, IntentRead, IntentStore, RecordedAction, WorkerId};
use tablefleet_worker::{IntentTracker, Observation};

use common::intent;

const W: WorkerId = WorkerId(0);

#[test]
fn worker_adopts_each_newer_record_once() {
    let dir = tempfile::tempdir().unwrap();
    let store = IntentStore::new(dir.path());
    let mut tracker = IntentTracker::new();

    store.write(W, Action::Check, 0).unwrap();
    assert_eq!(
        tracker.observe(store.read(W).unwrap()),
        Observation::Adopted {
            action: Action::Check,
            version: 0
        }
    );

    store.write(W, Action::Fold, 1).unwrap();
    assert_eq!(
        tracker.observe(store.read(W).unwrap()),
        Observation::Adopted {
            action: Action::Fold,
            version: 1
        }
    );
    assert_eq!(
        tracker.observe(store.read(W).unwrap()),
        Observation::Stale { version: 1 }
    );
    assert_eq!(tracker.current(), Action::Fold);
}

#[test]
fn older_version_never_rolls_back() {
    let dir = tempfile::tempdir().unwrap();
    let store = IntentStore::new(dir.path());
    let mut tracker = IntentTracker::new();

    store.write(W, Action::AllIn, 5).unwrap();
    tracker.observe(store.read(W).unwrap());
    store.write(W, Action::Fold, 3).unwrap();
    tracker.observe(store.read(W).unwrap());

    assert_eq!(tracker.current(), Action::AllIn);
    assert_eq!(tracker.last_applied(), Some(5));
}

#[test]
fn malformed_record_keeps_last_valid_action() {
    let dir = tempfile::tempdir().unwrap();
    let store = IntentStore::new(dir.path());
    let mut tracker = IntentTracker::new();

    store.write(W, Action::Call, 2).unwrap();
    tracker.observe(store.read(W).unwrap());

    std::fs::write(store.record_path(W), "{\"version\": 3, \"act").unwrap();
    assert!(matches!(
        tracker.observe(store.read(W).unwrap()),
        Observation::Malformed(_)
    ));
    assert_eq!(tracker.current(), Action::Call);
}

#[test]
fn legacy_command_field_is_accepted() {
    let dir = tempfile::tempdir().unwrap();
    let store = IntentStore::new(dir.path());
    std::fs::create_dir_all(store.worker_dir(W)).unwrap();
    std::fs::write(
        store.record_path(W),
        r#"{"version": 4, "command": "all_in"}"#,
    )
    .unwrap();

    assert_eq!(store.read(W).unwrap(), intent(4, Action::AllIn));
}

#[test]
fn maintenance_name_in_record_resets_to_default() {
    let dir = tempfile::tempdir().unwrap();
    let store = IntentStore::new(dir.path());
    let mut tracker = IntentTracker::new();

    store.write(W, Action::Fold, 1).unwrap();
    tracker.observe(store.read(W).unwrap());

    std::fs::write(store.record_path(W), r#"{"version": 2, "action": "rebuy"}"#).unwrap();
    let read = store.read(W).unwrap();
    assert!(matches!(
        read,
        IntentRead::Intent {
            action: RecordedAction::Maintenance(_),
            ..
        }
    ));
    assert!(matches!(
        tracker.observe(read),
        Observation::Invalidated { version: 2, .. }
    ));
    assert_eq!(tracker.current(), Action::SAFE_DEFAULT);
}

#[test]
fn delayed_exit_clear_spares_a_rewritten_record() {
    let dir = tempfile::tempdir().unwrap();
    let store = IntentStore::new(dir.path());

    store.write(W, Action::Exit, 6).unwrap();
    store.write(W, Action::Call, 6).unwrap();
    assert!(!store.clear_exit(W, 6).unwrap());
    assert_eq!(store.read(W).unwrap(), intent(6, Action::Call));

    store.write(W, Action::Exit, 7).unwrap();
    assert!(store.clear_exit(W, 7).unwrap());
    assert_eq!(store.read(W).unwrap(), IntentRead::Empty);
}

#[test]
fn reading_a_missing_record_creates_an_empty_one() {
    let dir = tempfile::tempdir().unwrap();
    let store = IntentStore::new(dir.path());

    assert_eq!(store.read(WorkerId(9)).unwrap(), IntentRead::Empty);
    assert!(store.record_path(WorkerId(9)).exists());
    assert_eq!(store.known_workers().unwrap(), vec![WorkerId(9)]);
}
