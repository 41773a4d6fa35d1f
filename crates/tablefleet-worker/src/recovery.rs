//! Session recovery: login, refresh detection, heartbeat and buy-back.
//!
//! Everything here is best-effort. Maintenance steps report what they did
//! as plain outcome values and never abort a cycle; only [`Recovery::login`]
//! returns an error, and its caller retries it until shutdown.

use std::time::Duration;

use tablefleet_types::{Control, WorkerId};
use thiserror::Error;
use tokio_util::sync::CancellationToken;

use crate::names::NameGenerator;
use crate::retry::RetryPolicy;
use crate::surface::{Budgets, RemoteSurface, SurfaceError};

/// Budget for probing controls that are usually absent.
const PROBE_TIMEOUT: Duration = Duration::from_secs(1);

/// Popup presence is checked without waiting.
const POPUP_CHECK: Duration = Duration::ZERO;

#[derive(Debug, Error)]
pub enum LoginError {
    #[error("failed to open target: {0}")]
    Navigation(#[source] SurfaceError),

    #[error("all {attempts} display names were rejected")]
    NamesRejected { attempts: usize },

    #[error("no seat after {rounds} rounds")]
    NoSeat { rounds: u32 },

    #[error(transparent)]
    Surface(#[from] SurfaceError),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RefreshOutcome {
    NotNeeded,
    Refreshed,
    /// The refresh logged the session out and login succeeded again.
    Rejoined,
    /// Shutdown was requested while logging back in.
    Cancelled,
    Failed(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HeartbeatOutcome {
    NotPresent,
    Sent,
    Failed(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BuyBackOutcome {
    NotNeeded,
    Recovered { round: u32 },
    /// Every round failed; the page was reloaded once.
    Exhausted,
    Failed(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MaintenanceReport {
    pub refresh: RefreshOutcome,
    pub heartbeat: HeartbeatOutcome,
    pub buy_back: BuyBackOutcome,
}

#[derive(Debug, Clone)]
pub struct Recovery {
    worker: WorkerId,
    target_url: String,
    budgets: Budgets,
    names: NameGenerator,
    seat_rounds: u32,
    retry: RetryPolicy,
}

impl Recovery {
    pub fn new(
        worker: WorkerId,
        target_url: impl Into<String>,
        budgets: Budgets,
        names: NameGenerator,
        seat_rounds: u32,
        retry: RetryPolicy,
    ) -> Self {
        Self {
            worker,
            target_url: target_url.into(),
            budgets,
            names,
            seat_rounds: seat_rounds.max(1),
            retry,
        }
    }

    /// Run refresh detection, heartbeat and buy-back in that order.
    pub async fn maintain<S>(&self, surface: &mut S, cancel: &CancellationToken) -> MaintenanceReport
    where
        S: RemoteSurface + ?Sized,
    {
        let refresh = self.refresh(surface, cancel).await;
        let heartbeat = self.heartbeat(surface).await;
        let buy_back = self.buy_back(surface).await;

        match &refresh {
            RefreshOutcome::NotNeeded => {}
            RefreshOutcome::Failed(reason) => tracing::warn!(%reason, "refresh failed"),
            other => tracing::info!(outcome = ?other, "refresh handled"),
        }
        if let HeartbeatOutcome::Failed(reason) = &heartbeat {
            tracing::debug!(%reason, "heartbeat failed");
        }
        match &buy_back {
            BuyBackOutcome::NotNeeded => {}
            BuyBackOutcome::Recovered { round } => tracing::info!(round, "bought back in"),
            BuyBackOutcome::Exhausted => tracing::warn!("buy-back exhausted, page reloaded"),
            BuyBackOutcome::Failed(reason) => tracing::warn!(%reason, "buy-back failed"),
        }

        MaintenanceReport {
            refresh,
            heartbeat,
            buy_back,
        }
    }

    /// Click the refresh prompt if shown, logging back in when the refresh
    /// dropped the session.
    pub async fn refresh<S>(&self, surface: &mut S, cancel: &CancellationToken) -> RefreshOutcome
    where
        S: RemoteSurface + ?Sized,
    {
        if !surface.is_visible(Control::Refresh, PROBE_TIMEOUT).await {
            return RefreshOutcome::NotNeeded;
        }
        if let Err(e) = surface.activate(Control::Refresh, PROBE_TIMEOUT).await {
            return RefreshOutcome::Failed(e.to_string());
        }
        tracing::info!("clicked refresh");

        if !surface.is_visible(Control::LoginName, PROBE_TIMEOUT).await {
            return RefreshOutcome::Refreshed;
        }
        tracing::info!("session dropped by refresh, logging back in");
        match self.login_until_joined(surface, cancel).await {
            Some(_) => RefreshOutcome::Rejoined,
            None => RefreshOutcome::Cancelled,
        }
    }

    /// Tell the table the player is still active. Absence is normal.
    pub async fn heartbeat<S>(&self, surface: &mut S) -> HeartbeatOutcome
    where
        S: RemoteSurface + ?Sized,
    {
        if !surface.is_visible(Control::StayActive, PROBE_TIMEOUT).await {
            return HeartbeatOutcome::NotPresent;
        }
        match surface.activate(Control::StayActive, PROBE_TIMEOUT).await {
            Ok(()) => HeartbeatOutcome::Sent,
            Err(e) => HeartbeatOutcome::Failed(e.to_string()),
        }
    }

    /// Recover from the out-of-funds popup by re-taking a seat and rebuying.
    pub async fn buy_back<S>(&self, surface: &mut S) -> BuyBackOutcome
    where
        S: RemoteSurface + ?Sized,
    {
        let budget = self.budgets.element;
        if !surface.is_visible(Control::Popup, POPUP_CHECK).await {
            return BuyBackOutcome::NotNeeded;
        }
        if let Err(e) = surface.activate(Control::Popup, budget).await {
            return BuyBackOutcome::Failed(e.to_string());
        }
        surface.settle(self.budgets.settle_long).await;

        for round in 1..=self.seat_rounds {
            if surface.is_enabled(Control::OpenSeat, budget).await
                && surface.activate(Control::OpenSeat, budget).await.is_ok()
            {
                surface.settle(self.budgets.settle_long).await;
                if surface.is_enabled(Control::Rebuy, budget).await
                    && surface.activate(Control::Rebuy, budget).await.is_ok()
                {
                    return BuyBackOutcome::Recovered { round };
                }
            }
            tracing::debug!(round, "buy-back seat attempt failed");

            if round == self.seat_rounds {
                if let Err(e) = surface.reload(self.budgets.half_navigation()).await {
                    return BuyBackOutcome::Failed(e.to_string());
                }
                surface.settle(self.budgets.settle_long).await;
            }
        }
        BuyBackOutcome::Exhausted
    }

    /// Open the target, claim a display name and take a seat.
    ///
    /// Returns the accepted display name.
    pub async fn login<S>(&self, surface: &mut S) -> Result<String, LoginError>
    where
        S: RemoteSurface + ?Sized,
    {
        surface
            .open(&self.target_url, self.budgets.navigation)
            .await
            .map_err(LoginError::Navigation)?;

        let name = self.claim_name(surface).await?;
        surface.settle(self.budgets.settle_short).await;
        self.take_seat(surface).await?;

        tracing::info!(worker = %self.worker, %name, "joined table");
        Ok(name)
    }

    /// Log in, retrying with the fixed backoff until it succeeds or `cancel`
    /// fires. Returns `None` only on cancellation.
    pub async fn login_until_joined<S>(
        &self,
        surface: &mut S,
        cancel: &CancellationToken,
    ) -> Option<String>
    where
        S: RemoteSurface + ?Sized,
    {
        let mut backoff = self.retry.attempts();
        loop {
            let result = tokio::select! {
                biased;
                _ = cancel.cancelled() => return None,
                result = self.login(surface) => result,
            };
            match result {
                Ok(name) => return Some(name),
                Err(e) => tracing::warn!(
                    attempt = backoff.attempt(),
                    error = %e,
                    delay_ms = self.retry.delay.as_millis() as u64,
                    "login failed, retrying"
                ),
            }
            if !backoff.wait(cancel).await {
                return None;
            }
        }
    }

    async fn claim_name<S>(&self, surface: &mut S) -> Result<String, LoginError>
    where
        S: RemoteSurface + ?Sized,
    {
        let candidates = self.names.candidates(self.worker);
        let attempts = candidates.len();
        for name in candidates {
            tracing::debug!(%name, "trying display name");
            surface
                .fill(Control::LoginName, &name, self.budgets.element)
                .await?;
            surface
                .activate(Control::LoginSubmit, self.budgets.element)
                .await?;
            surface.settle(self.budgets.settle_short).await;

            let error = surface
                .read_text(Control::LoginError, self.budgets.half_element())
                .await?;
            match error.as_deref().map(str::trim) {
                Some(text) if !text.is_empty() => {
                    tracing::info!(%name, reason = text, "display name rejected");
                }
                _ => return Ok(name),
            }
        }
        Err(LoginError::NamesRejected { attempts })
    }

    async fn take_seat<S>(&self, surface: &mut S) -> Result<(), LoginError>
    where
        S: RemoteSurface + ?Sized,
    {
        let budget = self.budgets.element;
        for round in 1..=self.seat_rounds {
            if surface.is_enabled(Control::Seat, budget).await {
                surface.activate(Control::Seat, budget).await?;
                surface.settle(self.budgets.settle_long).await;
                if !self.dismiss_popup(surface).await {
                    return Ok(());
                }
                tracing::info!(round, "seat taken, retrying");
            }
            if round == self.seat_rounds {
                surface.reload(self.budgets.half_navigation()).await?;
                surface.settle(self.budgets.settle_long).await;
            }
        }
        Err(LoginError::NoSeat {
            rounds: self.seat_rounds,
        })
    }

    /// Close a popup if one is showing. Returns whether one was showing.
    async fn dismiss_popup<S>(&self, surface: &mut S) -> bool
    where
        S: RemoteSurface + ?Sized,
    {
        if !surface.is_visible(Control::Popup, POPUP_CHECK).await {
            return false;
        }
        match surface.activate(Control::Popup, self.budgets.element).await {
            Ok(()) => surface.settle(self.budgets.settle_long).await,
            Err(e) => tracing::debug!(error = %e, "failed to close popup"),
        }
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::ScriptedSurface;
    use tablefleet_browser::ElementState;
    use tablefleet_types::NamePool;

    const URL: &str = "https://table.example/room/1";

    fn recovery() -> Recovery {
        let names = NameGenerator::new(NamePool {
            base_names: vec!["Ace".into(), "Nuts".into()],
            max_len: 12,
        });
        Recovery::new(
            WorkerId(3),
            URL,
            Budgets::default(),
            names,
            5,
            RetryPolicy::fixed(Duration::from_millis(1)),
        )
    }

    fn login_page() -> ScriptedSurface {
        ScriptedSurface::new().enabled(&[Control::LoginName, Control::LoginSubmit, Control::Seat])
    }

    #[tokio::test]
    async fn login_claims_name_and_seat() {
        let mut surface = login_page();
        let name = recovery().login(&mut surface).await.unwrap();

        assert!(name == "Ace3" || name == "Nuts3");
        assert_eq!(surface.opened, vec![URL.to_string()]);
        assert_eq!(surface.fills.len(), 1);
        assert_eq!(surface.activations, vec![Control::LoginSubmit, Control::Seat]);
    }

    #[tokio::test]
    async fn rejected_name_tries_another() {
        let mut surface = login_page()
            .text(Control::LoginError, Some("Username already taken"))
            .text(Control::LoginError, Some("   "));
        recovery().login(&mut surface).await.unwrap();
        assert_eq!(surface.fills.len(), 2);
    }

    #[tokio::test]
    async fn every_name_rejected_fails_login() {
        let mut surface = login_page()
            .text(Control::LoginError, Some("taken"))
            .text(Control::LoginError, Some("taken"));
        let err = recovery().login(&mut surface).await.unwrap_err();
        assert!(matches!(err, LoginError::NamesRejected { attempts: 2 }));
        assert!(!surface.activations.contains(&Control::Seat));
    }

    #[tokio::test]
    async fn seat_taken_every_round_reloads_once() {
        let mut surface = login_page().enabled(&[Control::Popup]);
        let err = recovery().login(&mut surface).await.unwrap_err();

        assert!(matches!(err, LoginError::NoSeat { rounds: 5 }));
        assert_eq!(surface.reloads, 1);
        let seats = surface
            .activations
            .iter()
            .filter(|c| **c == Control::Seat)
            .count();
        assert_eq!(seats, 5);
    }

    #[tokio::test]
    async fn navigation_failure_is_reported() {
        let mut surface = login_page().failing_navigation();
        let err = recovery().login(&mut surface).await.unwrap_err();
        assert!(matches!(err, LoginError::Navigation(_)));
    }

    #[tokio::test]
    async fn login_retry_stops_on_cancellation() {
        let mut surface = login_page().failing_navigation();
        let cancel = CancellationToken::new();
        let trigger = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(20)).await;
            trigger.cancel();
        });

        assert_eq!(recovery().login_until_joined(&mut surface, &cancel).await, None);
    }

    #[tokio::test]
    async fn refresh_without_prompt_is_a_no_op() {
        let mut surface = ScriptedSurface::new();
        let outcome = recovery()
            .refresh(&mut surface, &CancellationToken::new())
            .await;
        assert_eq!(outcome, RefreshOutcome::NotNeeded);
        assert!(surface.activations.is_empty());
    }

    #[tokio::test]
    async fn refresh_that_drops_session_logs_back_in() {
        let mut surface = ScriptedSurface::new()
            .enabled(&[Control::Refresh, Control::LoginSubmit, Control::Seat])
            .on_click(Control::Refresh, Control::LoginName, ElementState::Enabled);
        let outcome = recovery()
            .refresh(&mut surface, &CancellationToken::new())
            .await;

        assert_eq!(outcome, RefreshOutcome::Rejoined);
        assert_eq!(surface.opened, vec![URL.to_string()]);
    }

    #[tokio::test]
    async fn heartbeat_absent_is_not_an_error() {
        let mut surface = ScriptedSurface::new();
        assert_eq!(
            recovery().heartbeat(&mut surface).await,
            HeartbeatOutcome::NotPresent
        );

        let mut surface = ScriptedSurface::new().enabled(&[Control::StayActive]);
        assert_eq!(recovery().heartbeat(&mut surface).await, HeartbeatOutcome::Sent);
    }

    #[tokio::test]
    async fn buy_back_reseats_and_rebuys() {
        let mut surface = ScriptedSurface::new()
            .enabled(&[Control::Popup, Control::OpenSeat])
            .on_click(Control::Popup, Control::Popup, ElementState::Absent)
            .on_click(Control::OpenSeat, Control::Rebuy, ElementState::Enabled);
        let outcome = recovery().buy_back(&mut surface).await;

        assert_eq!(outcome, BuyBackOutcome::Recovered { round: 1 });
        assert_eq!(
            surface.activations,
            vec![Control::Popup, Control::OpenSeat, Control::Rebuy]
        );
    }

    #[tokio::test]
    async fn buy_back_without_popup_is_not_needed() {
        let mut surface = ScriptedSurface::new().enabled(&[Control::OpenSeat, Control::Rebuy]);
        assert_eq!(
            recovery().buy_back(&mut surface).await,
            BuyBackOutcome::NotNeeded
        );
        assert!(surface.activations.is_empty());
    }

    #[tokio::test]
    async fn popup_checks_do_not_wait() {
        let rec = recovery();

        let mut quiet = ScriptedSurface::new();
        rec.buy_back(&mut quiet).await;
        let mut seated = login_page();
        rec.login(&mut seated).await.unwrap();

        let popup_checks: Vec<Duration> = quiet
            .visibility_checks
            .iter()
            .chain(&seated.visibility_checks)
            .filter(|(control, _)| *control == Control::Popup)
            .map(|(_, timeout)| *timeout)
            .collect();
        assert_eq!(popup_checks, vec![Duration::ZERO, Duration::ZERO]);
    }

    #[tokio::test]
    async fn buy_back_gives_up_after_reload() {
        let mut surface = ScriptedSurface::new()
            .enabled(&[Control::Popup])
            .on_click(Control::Popup, Control::Popup, ElementState::Absent);
        assert_eq!(
            recovery().buy_back(&mut surface).await,
            BuyBackOutcome::Exhausted
        );
        assert_eq!(surface.reloads, 1);
    }
}
