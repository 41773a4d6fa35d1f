//! Fleet configuration, loaded from `<root>/tablefleet.toml`.
//!
//! Every section and field is optional; missing values fall back to the
//! defaults below, so a fleet runs without any configuration file at all.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::control::Control;
use crate::error::FleetError;

/// Configuration file name inside the fleet root.
pub const CONFIG_FILENAME: &str = "tablefleet.toml";

/// Default fleet root: `$TABLEFLEET_ROOT`, else `$HOME/.tablefleet`.
pub fn default_root() -> PathBuf {
    if let Ok(root) = std::env::var(crate::env::ROOT_ENV) {
        if !root.trim().is_empty() {
            return PathBuf::from(root);
        }
    }
    let home = std::env::var("HOME").unwrap_or_else(|_| "/tmp".into());
    PathBuf::from(home).join(".tablefleet")
}

/// Top-level configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct FleetConfig {
    #[serde(default)]
    pub worker: WorkerSettings,
    #[serde(default)]
    pub supervisor: SupervisorSettings,
    #[serde(default)]
    pub browser: BrowserSettings,
    #[serde(default)]
    pub names: NamePool,
    #[serde(default)]
    pub surface: SurfaceProfile,
}

impl FleetConfig {
    /// Parse a configuration from a TOML string.
    pub fn from_toml(content: &str) -> Result<Self, FleetError> {
        let config: Self = toml::from_str(content)
            .map_err(|e| FleetError::ConfigError(format!("invalid fleet config: {e}")))?;
        if config.names.base_names.iter().all(|n| n.trim().is_empty()) {
            return Err(FleetError::ConfigError(
                "names.base_names must contain at least one non-empty name".into(),
            ));
        }
        if config.supervisor.exit_clear_delay_ms < config.worker.cycle_interval_ms {
            return Err(FleetError::ConfigError(format!(
                "supervisor.exit_clear_delay_ms ({}) must be at least worker.cycle_interval_ms ({})",
                config.supervisor.exit_clear_delay_ms, config.worker.cycle_interval_ms
            )));
        }
        Ok(config)
    }

    pub fn to_toml(&self) -> Result<String, FleetError> {
        toml::to_string_pretty(self)
            .map_err(|e| FleetError::ConfigError(format!("failed to serialize config: {e}")))
    }

    /// Load `<root>/tablefleet.toml`, or defaults if the file does not exist.
    pub fn load(root: &Path) -> Result<Self, FleetError> {
        let path = root.join(CONFIG_FILENAME);
        match std::fs::read_to_string(&path) {
            Ok(content) => Self::from_toml(&content),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!(path = %path.display(), "no fleet config, using defaults");
                Ok(Self::default())
            }
            Err(e) => Err(FleetError::ConfigError(format!(
                "failed to read {}: {e}",
                path.display()
            ))),
        }
    }
}

/// Worker cadence and interaction budgets.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct WorkerSettings {
    #[serde(default = "default_cycle_interval_ms")]
    pub cycle_interval_ms: u64,
    /// Budget for page navigation and login.
    #[serde(default = "default_navigation_timeout_ms")]
    pub navigation_timeout_ms: u64,
    /// Budget for a single element interaction.
    #[serde(default = "default_element_timeout_ms")]
    pub element_timeout_ms: u64,
    #[serde(default = "default_login_retry_delay_ms")]
    pub login_retry_delay_ms: u64,
    /// Pause after opening panels and submitting forms.
    #[serde(default = "default_settle_short_ms")]
    pub settle_short_ms: u64,
    /// Pause after seat and popup clicks.
    #[serde(default = "default_settle_long_ms")]
    pub settle_long_ms: u64,
    #[serde(default = "default_seat_rounds")]
    pub seat_rounds: u32,
    /// Whole currency units; used when a worker is launched without a valid threshold.
    #[serde(default = "default_call_threshold")]
    pub default_call_threshold: u64,
}

impl Default for WorkerSettings {
    fn default() -> Self {
        Self {
            cycle_interval_ms: default_cycle_interval_ms(),
            navigation_timeout_ms: default_navigation_timeout_ms(),
            element_timeout_ms: default_element_timeout_ms(),
            login_retry_delay_ms: default_login_retry_delay_ms(),
            settle_short_ms: default_settle_short_ms(),
            settle_long_ms: default_settle_long_ms(),
            seat_rounds: default_seat_rounds(),
            default_call_threshold: default_call_threshold(),
        }
    }
}

impl WorkerSettings {
    pub fn cycle_interval(&self) -> Duration {
        Duration::from_millis(self.cycle_interval_ms)
    }
}

/// Supervisor grace windows.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SupervisorSettings {
    /// How long a worker gets to exit on its own before it is force-killed.
    #[serde(default = "default_exit_grace_ms")]
    pub exit_grace_ms: u64,
    /// Delay before an `exit` record is cleared. Must cover at least one
    /// worker cycle interval.
    #[serde(default = "default_exit_clear_delay_ms")]
    pub exit_clear_delay_ms: u64,
    /// SIGTERM to SIGKILL escalation window during a forced kill.
    #[serde(default = "default_kill_grace_ms")]
    pub kill_grace_ms: u64,
}

impl Default for SupervisorSettings {
    fn default() -> Self {
        Self {
            exit_grace_ms: default_exit_grace_ms(),
            exit_clear_delay_ms: default_exit_clear_delay_ms(),
            kill_grace_ms: default_kill_grace_ms(),
        }
    }
}

/// Managed Chromium launch settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct BrowserSettings {
    #[serde(default)]
    pub binary_path: Option<String>,
    #[serde(default = "default_true")]
    pub headless: bool,
    #[serde(default)]
    pub extra_args: Vec<String>,
    #[serde(default = "default_launch_timeout_ms")]
    pub launch_timeout_ms: u64,
}

impl Default for BrowserSettings {
    fn default() -> Self {
        Self {
            binary_path: None,
            headless: true,
            extra_args: Vec::new(),
            launch_timeout_ms: default_launch_timeout_ms(),
        }
    }
}

/// Display-name candidates used at login.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct NamePool {
    #[serde(default = "default_base_names")]
    pub base_names: Vec<String>,
    /// Longest name the table displays without cutting it off.
    #[serde(default = "default_max_name_len")]
    pub max_len: usize,
}

impl Default for NamePool {
    fn default() -> Self {
        Self {
            base_names: default_base_names(),
            max_len: default_max_name_len(),
        }
    }
}

/// CSS selectors for each [`Control`] of the target application.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct SurfaceProfile {
    pub fold: String,
    pub check: String,
    pub call: String,
    pub call_amount: String,
    pub bet_open: String,
    pub max_preset: String,
    pub raise: String,
    pub exit_open: String,
    pub exit_confirm: String,
    pub popup: String,
    pub seat: String,
    pub open_seat: String,
    pub rebuy: String,
    pub refresh: String,
    pub stay_active: String,
    pub login_name: String,
    pub login_submit: String,
    pub login_error: String,
}

impl SurfaceProfile {
    pub fn selector(&self, control: Control) -> &str {
        match control {
            Control::Fold => &self.fold,
            Control::Check => &self.check,
            Control::Call => &self.call,
            Control::CallAmount => &self.call_amount,
            Control::BetOpen => &self.bet_open,
            Control::MaxPreset => &self.max_preset,
            Control::Raise => &self.raise,
            Control::ExitOpen => &self.exit_open,
            Control::ExitConfirm => &self.exit_confirm,
            Control::Popup => &self.popup,
            Control::Seat => &self.seat,
            Control::OpenSeat => &self.open_seat,
            Control::Rebuy => &self.rebuy,
            Control::Refresh => &self.refresh,
            Control::StayActive => &self.stay_active,
            Control::LoginName => &self.login_name,
            Control::LoginSubmit => &self.login_submit,
            Control::LoginError => &self.login_error,
        }
    }
}

impl Default for SurfaceProfile {
    fn default() -> Self {
        let action = |name: &str| format!("[data-action-type=\"{name}\"]");
        Self {
            fold: action("fold"),
            check: action("check"),
            call: action("call"),
            call_amount: ".btn[data-action-type=\"call\"] span".into(),
            bet_open: action("open_raise"),
            max_preset: ".quick-raise-amount[data-type=\"max\"]".into(),
            raise: action("raise"),
            exit_open: ".btn[data-action-type=\"show_popup\"][data-type=\"exit_lobby_popup\"]".into(),
            exit_confirm: ".btn[data-action-type=\"modal_yes\"]".into(),
            popup: action("close_popup"),
            seat: action("request_seat_join"),
            open_seat: "[data-action-type=\"request_seat_join\"][data-type=\"clicked_on_seat\"]"
                .into(),
            rebuy: "[data-action-type=\"request_seat_join\"][data-type=\"rebuy_seat_free\"]".into(),
            refresh: action("refresh_page"),
            stay_active: action("set_away_off"),
            login_name: "input[name=\"set_username\"]".into(),
            login_submit: "[data-action-type^=\"set_username\"]".into(),
            login_error: ".error-txt".into(),
        }
    }
}

fn default_cycle_interval_ms() -> u64 {
    500
}

fn default_navigation_timeout_ms() -> u64 {
    30_000
}

fn default_element_timeout_ms() -> u64 {
    2_000
}

fn default_login_retry_delay_ms() -> u64 {
    1_000
}

fn default_settle_short_ms() -> u64 {
    250
}

fn default_settle_long_ms() -> u64 {
    300
}

fn default_seat_rounds() -> u32 {
    5
}

fn default_call_threshold() -> u64 {
    1000
}

fn default_exit_grace_ms() -> u64 {
    5_000
}

fn default_exit_clear_delay_ms() -> u64 {
    10_000
}

fn default_kill_grace_ms() -> u64 {
    2_000
}

fn default_true() -> bool {
    true
}

fn default_launch_timeout_ms() -> u64 {
    10_000
}

fn default_max_name_len() -> usize {
    12
}

fn default_base_names() -> Vec<String> {
    [
        "Ace", "Bluff", "Shark", "River", "Flop", "Turn", "Kicker", "Dealer", "Blinds", "Nuts",
        "Pocket", "Gutshot", "Rounder", "Cowboy", "Lucky",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_toml_yields_defaults() {
        let config = FleetConfig::from_toml("").unwrap();
        assert_eq!(config, FleetConfig::default());
        assert_eq!(config.worker.cycle_interval(), Duration::from_millis(500));
        assert_eq!(config.supervisor.exit_clear_delay_ms, 10_000);
    }

    #[test]
    fn partial_sections_keep_other_defaults() {
        let config = FleetConfig::from_toml(
            r#"
            [worker]
            element_timeout_ms = 1500

            [surface]
            fold = "button.fold"
            "#,
        )
        .unwrap();
        assert_eq!(config.worker.element_timeout_ms, 1500);
        assert_eq!(config.worker.navigation_timeout_ms, 30_000);
        assert_eq!(config.surface.selector(Control::Fold), "button.fold");
        assert_eq!(
            config.surface.selector(Control::Check),
            "[data-action-type=\"check\"]"
        );
    }

    #[test]
    fn empty_name_pool_is_rejected() {
        let err = FleetConfig::from_toml("[names]\nbase_names = []\n").unwrap_err();
        assert!(err.to_string().contains("base_names"));
    }

    #[test]
    fn exit_clear_shorter_than_a_cycle_is_rejected() {
        let content = "[worker]\ncycle_interval_ms = 2000\n\n[supervisor]\nexit_clear_delay_ms = 1500\n";
        let err = FleetConfig::from_toml(content).unwrap_err();
        assert!(err.to_string().contains("exit_clear_delay_ms"), "{err}");

        let content = "[worker]\ncycle_interval_ms = 2000\n\n[supervisor]\nexit_clear_delay_ms = 2000\n";
        assert!(FleetConfig::from_toml(content).is_ok());
    }

    #[test]
    fn toml_roundtrip_preserves_values() {
        let mut config = FleetConfig::default();
        config.browser.extra_args = vec!["--mute-audio".into()];
        let text = config.to_toml().unwrap();
        assert_eq!(FleetConfig::from_toml(&text).unwrap(), config);
    }

    #[test]
    fn load_without_file_uses_defaults() {
        let dir = tempfile::tempdir().unwrap();
        assert_eq!(FleetConfig::load(dir.path()).unwrap(), FleetConfig::default());
    }
}
