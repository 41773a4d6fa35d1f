//! Worker-side intent tracking.
//!
//! The tracker holds the action the worker is currently pursuing and the
//! last record version it applied. It only moves forward: a record whose
//! version is not strictly greater than the last applied one never changes
//! the current action, and unreadable records are ignored outright.

use tablefleet_types::{Action, IntentRead, RecordedAction};

/// What a single record read did to the tracker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Observation {
    /// A newer record named an action and it is now current.
    Adopted { action: Action, version: u64 },
    /// A newer record named something that is not an intent; the current
    /// action was reset to the safe default.
    Invalidated { raw: String, version: u64 },
    /// The record's version was already applied.
    Stale { version: u64 },
    /// The record was empty.
    Empty,
    /// The record could not be parsed.
    Malformed(String),
}

#[derive(Debug, Clone)]
pub struct IntentTracker {
    current: Action,
    last_applied: Option<u64>,
}

impl Default for IntentTracker {
    fn default() -> Self {
        Self::new()
    }
}

impl IntentTracker {
    pub fn new() -> Self {
        Self {
            current: Action::SAFE_DEFAULT,
            last_applied: None,
        }
    }

    pub fn current(&self) -> Action {
        self.current
    }

    pub fn last_applied(&self) -> Option<u64> {
        self.last_applied
    }

    pub fn observe(&mut self, read: IntentRead) -> Observation {
        let (version, recorded) = match read {
            IntentRead::Empty => return Observation::Empty,
            IntentRead::Malformed(detail) => return Observation::Malformed(detail),
            IntentRead::Intent { version, action } => (version, action),
        };

        if self.last_applied.is_some_and(|last| version <= last) {
            return Observation::Stale { version };
        }
        self.last_applied = Some(version);

        match recorded {
            RecordedAction::Known(action) => {
                self.current = action;
                Observation::Adopted { action, version }
            }
            other => {
                self.current = Action::SAFE_DEFAULT;
                Observation::Invalidated {
                    raw: other.to_string(),
                    version,
                }
            }
        }
    }
}
