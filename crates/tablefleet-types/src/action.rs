//! Intent actions and internal maintenance steps.
//!
//! [`Action`] is the closed set the supervisor may address to a worker.
//! [`MaintenanceStep`] names the session-upkeep operations a worker runs on
//! its own every cycle; they share the record's wire vocabulary but are never
//! accepted as an intent.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// A supervisor-addressable intent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Action {
    Fold,
    Check,
    Call,
    AllIn,
    Exit,
}

impl Action {
    /// The action a worker pursues before it has seen any valid intent.
    pub const SAFE_DEFAULT: Action = Action::Check;

    pub const ALL: [Action; 5] = [
        Action::Fold,
        Action::Check,
        Action::Call,
        Action::AllIn,
        Action::Exit,
    ];

    /// Wire name used in the intent record.
    pub fn as_str(&self) -> &'static str {
        match self {
            Action::Fold => "fold",
            Action::Check => "check",
            Action::Call => "call",
            Action::AllIn => "all_in",
            Action::Exit => "exit",
        }
    }

    /// Whether broadcasting this action replaces the fleet's standing intent.
    ///
    /// `exit` is one-shot: it retires the workers it reaches but a worker
    /// spawned afterwards still receives the previous standing action.
    pub fn is_standing(&self) -> bool {
        !matches!(self, Action::Exit)
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Action {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "fold" => Ok(Action::Fold),
            "check" => Ok(Action::Check),
            "call" => Ok(Action::Call),
            "all_in" | "all-in" | "allin" => Ok(Action::AllIn),
            "exit" => Ok(Action::Exit),
            other => Err(format!("unknown action: {other:?}")),
        }
    }
}

/// Session-upkeep operations run by every worker, never addressable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MaintenanceStep {
    StayActive,
    DismissPopup,
    RequestSeat,
    Rebuy,
    Refresh,
}

impl MaintenanceStep {
    pub const ALL: [MaintenanceStep; 5] = [
        MaintenanceStep::StayActive,
        MaintenanceStep::DismissPopup,
        MaintenanceStep::RequestSeat,
        MaintenanceStep::Rebuy,
        MaintenanceStep::Refresh,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            MaintenanceStep::StayActive => "stay_active",
            MaintenanceStep::DismissPopup => "dismiss_popup",
            MaintenanceStep::RequestSeat => "request_seat",
            MaintenanceStep::Rebuy => "rebuy",
            MaintenanceStep::Refresh => "refresh",
        }
    }

    /// Look up a maintenance step by its wire name.
    pub fn from_wire(s: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|step| step.as_str() == s)
    }
}

impl fmt::Display for MaintenanceStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wire_names_roundtrip_through_from_str() {
        for action in Action::ALL {
            assert_eq!(action.as_str().parse::<Action>().unwrap(), action);
        }
    }

    #[test]
    fn all_in_accepts_operator_spellings() {
        assert_eq!("all-in".parse::<Action>().unwrap(), Action::AllIn);
        assert_eq!("ALLIN".parse::<Action>().unwrap(), Action::AllIn);
    }

    #[test]
    fn maintenance_names_are_not_actions() {
        for step in MaintenanceStep::ALL {
            assert!(step.as_str().parse::<Action>().is_err());
            assert_eq!(MaintenanceStep::from_wire(step.as_str()), Some(step));
        }
    }

    #[test]
    fn serde_uses_snake_case() {
        let json = serde_json::to_string(&Action::AllIn).unwrap();
        assert_eq!(json, "\"all_in\"");
    }

    #[test]
    fn exit_is_not_standing() {
        assert!(!Action::Exit.is_standing());
        assert!(Action::Fold.is_standing());
    }
}
