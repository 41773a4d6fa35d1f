//! Addressable controls of the remote table surface.

use std::fmt;

/// One observable or clickable element of the table page.
///
/// The concrete selector for each control comes from the configured
/// [`SurfaceProfile`](crate::config::SurfaceProfile).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Control {
    Fold,
    Check,
    Call,
    /// Text element showing the amount a call currently costs.
    CallAmount,
    BetOpen,
    MaxPreset,
    Raise,
    ExitOpen,
    ExitConfirm,
    Popup,
    Seat,
    OpenSeat,
    Rebuy,
    Refresh,
    StayActive,
    LoginName,
    LoginSubmit,
    LoginError,
}

impl Control {
    pub fn as_str(&self) -> &'static str {
        match self {
            Control::Fold => "fold",
            Control::Check => "check",
            Control::Call => "call",
            Control::CallAmount => "call_amount",
            Control::BetOpen => "bet_open",
            Control::MaxPreset => "max_preset",
            Control::Raise => "raise",
            Control::ExitOpen => "exit_open",
            Control::ExitConfirm => "exit_confirm",
            Control::Popup => "popup",
            Control::Seat => "seat",
            Control::OpenSeat => "open_seat",
            Control::Rebuy => "rebuy",
            Control::Refresh => "refresh",
            Control::StayActive => "stay_active",
            Control::LoginName => "login_name",
            Control::LoginSubmit => "login_submit",
            Control::LoginError => "login_error",
        }
    }
}

impl fmt::Display for Control {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
