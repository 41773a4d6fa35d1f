//! The remote table surface as seen by the engines.
//!
//! [`RemoteSurface`] is the seam between decision logic and the browser: the
//! resolution and recovery engines only address logical [`Control`]s, and the
//! CDP-backed implementation maps them to selectors from the surface profile.

use std::time::Duration;

use async_trait::async_trait;
use tablefleet_browser::BrowserError;
use tablefleet_types::{Control, WorkerSettings};
use thiserror::Error;

/// Errors from surface interactions.
#[derive(Debug, Error)]
pub enum SurfaceError {
    /// The control did not become available within the budget.
    #[error("{control} unavailable within {timeout:?}")]
    Unavailable { control: Control, timeout: Duration },

    /// The control was found but the interaction did not go through.
    #[error("{control} interaction failed: {reason}")]
    Interaction { control: Control, reason: String },

    #[error("navigation failed: {0}")]
    Navigation(String),

    #[error(transparent)]
    Browser(#[from] BrowserError),
}

/// Time budgets for remote interactions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Budgets {
    /// Page loads and login.
    pub navigation: Duration,
    /// Waiting for a single control.
    pub element: Duration,
    /// Pause after a click before the next step.
    pub settle_short: Duration,
    /// Pause after a click that opens or closes a dialog.
    pub settle_long: Duration,
}

impl Budgets {
    pub fn from_settings(settings: &WorkerSettings) -> Self {
        Self {
            navigation: Duration::from_millis(settings.navigation_timeout_ms),
            element: Duration::from_millis(settings.element_timeout_ms),
            settle_short: Duration::from_millis(settings.settle_short_ms),
            settle_long: Duration::from_millis(settings.settle_long_ms),
        }
    }

    pub fn half_element(&self) -> Duration {
        self.element / 2
    }

    pub fn half_navigation(&self) -> Duration {
        self.navigation / 2
    }
}

impl Default for Budgets {
    fn default() -> Self {
        Self::from_settings(&WorkerSettings::default())
    }
}

/// Operations the engines perform against the remote page.
///
/// Probes (`is_visible`, `is_enabled`) never fail: anything that prevents an
/// answer counts as `false`.
#[async_trait]
pub trait RemoteSurface: Send {
    /// Whether the control becomes visible within `timeout`.
    async fn is_visible(&mut self, control: Control, timeout: Duration) -> bool;

    /// Whether the control, once visible within `timeout`, is enabled.
    async fn is_enabled(&mut self, control: Control, timeout: Duration) -> bool;

    /// Click the control once it is enabled.
    async fn activate(&mut self, control: Control, timeout: Duration) -> Result<(), SurfaceError>;

    /// Text of the control, `None` when it is not present within `timeout`.
    async fn read_text(
        &mut self,
        control: Control,
        timeout: Duration,
    ) -> Result<Option<String>, SurfaceError>;

    /// Replace the value of an input control.
    async fn fill(
        &mut self,
        control: Control,
        text: &str,
        timeout: Duration,
    ) -> Result<(), SurfaceError>;

    /// Navigate to `url`.
    async fn open(&mut self, url: &str, timeout: Duration) -> Result<(), SurfaceError>;

    /// Reload the current page.
    async fn reload(&mut self, timeout: Duration) -> Result<(), SurfaceError>;

    /// Pause to let the page react to the previous step.
    async fn settle(&mut self, pause: Duration) {
        tokio::time::sleep(pause).await;
    }
}
