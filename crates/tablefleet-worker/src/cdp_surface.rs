//! [`RemoteSurface`] backed by a CDP browser driver.

use std::time::Duration;

use async_trait::async_trait;
use tablefleet_browser::{BrowserDriver, BrowserError};
use tablefleet_types::{Control, SurfaceProfile};

use crate::surface::{RemoteSurface, SurfaceError};

pub struct CdpSurface {
    driver: BrowserDriver,
    profile: SurfaceProfile,
}

impl CdpSurface {
    pub fn new(driver: BrowserDriver, profile: SurfaceProfile) -> Self {
        Self { driver, profile }
    }

    fn selector(&self, control: Control) -> &str {
        self.profile.selector(control)
    }
}

fn map_err(control: Control, err: BrowserError) -> SurfaceError {
    match err {
        BrowserError::WaitTimeout { duration, .. } => SurfaceError::Unavailable {
            control,
            timeout: duration,
        },
        BrowserError::ElementNotInteractable { reason } => {
            SurfaceError::Interaction { control, reason }
        }
        other => SurfaceError::Browser(other),
    }
}

#[async_trait]
impl RemoteSurface for CdpSurface {
    async fn is_visible(&mut self, control: Control, timeout: Duration) -> bool {
        self.driver
            .wait_visible(self.selector(control), timeout)
            .await
            .is_ok()
    }

    async fn is_enabled(&mut self, control: Control, timeout: Duration) -> bool {
        match self
            .driver
            .wait_visible(self.selector(control), timeout)
            .await
        {
            Ok(state) => state.is_enabled(),
            Err(_) => false,
        }
    }

    async fn activate(&mut self, control: Control, timeout: Duration) -> Result<(), SurfaceError> {
        self.driver
            .click(self.selector(control), timeout)
            .await
            .map_err(|e| map_err(control, e))
    }

    async fn read_text(
        &mut self,
        control: Control,
        timeout: Duration,
    ) -> Result<Option<String>, SurfaceError> {
        match self.driver.text_content(self.selector(control), timeout).await {
            Ok(text) => Ok(Some(text)),
            Err(BrowserError::WaitTimeout { .. }) => Ok(None),
            Err(e) => Err(map_err(control, e)),
        }
    }

    async fn fill(
        &mut self,
        control: Control,
        text: &str,
        timeout: Duration,
    ) -> Result<(), SurfaceError> {
        self.driver
            .fill(self.selector(control), text, timeout)
            .await
            .map_err(|e| map_err(control, e))
    }

    async fn open(&mut self, url: &str, timeout: Duration) -> Result<(), SurfaceError> {
        self.driver.navigate(url, timeout).await.map_err(|e| match e {
            BrowserError::NavigationFailed { reason } => SurfaceError::Navigation(reason),
            other => SurfaceError::Browser(other),
        })
    }

    async fn reload(&mut self, timeout: Duration) -> Result<(), SurfaceError> {
        self.driver.reload(timeout).await.map_err(|e| match e {
            BrowserError::NavigationFailed { reason } => SurfaceError::Navigation(reason),
            other => SurfaceError::Browser(other),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wait_timeout_maps_to_unavailable() {
        let err = map_err(
            Control::Raise,
            BrowserError::WaitTimeout {
                selector: "[data-action-type=\"raise\"]".into(),
                wanted: "enabled",
                last_seen: "disabled",
                duration: Duration::from_secs(2),
            },
        );
        assert!(matches!(
            err,
            SurfaceError::Unavailable {
                control: Control::Raise,
                ..
            }
        ));
    }

    #[test]
    fn protocol_errors_stay_browser_errors() {
        let err = map_err(
            Control::Fold,
            BrowserError::Protocol {
                detail: "socket closed".into(),
            },
        );
        assert!(matches!(err, SurfaceError::Browser(_)));
    }
}
