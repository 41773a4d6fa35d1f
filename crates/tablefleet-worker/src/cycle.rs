//! The worker's polling loop.

use std::time::{Duration, Instant};

use tablefleet_types::{Action, IntentRead, IntentStore, WorkerId};
use tokio_util::sync::CancellationToken;

use crate::intent::{IntentTracker, Observation};
use crate::recovery::Recovery;
use crate::resolve::{Resolution, Resolver};
use crate::surface::RemoteSurface;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CycleOutcome {
    Continue,
    /// An exit intent was executed; the loop must end.
    Stop,
}

/// Sleep left in a cycle after `elapsed` of work, floored at zero.
pub fn pace_delay(interval: Duration, elapsed: Duration) -> Duration {
    interval.saturating_sub(elapsed)
}

/// One worker bound to one remote surface.
pub struct Worker<S> {
    id: WorkerId,
    surface: S,
    store: IntentStore,
    tracker: IntentTracker,
    resolver: Resolver,
    recovery: Recovery,
    interval: Duration,
}

impl<S: RemoteSurface> Worker<S> {
    pub fn new(
        id: WorkerId,
        surface: S,
        store: IntentStore,
        resolver: Resolver,
        recovery: Recovery,
        interval: Duration,
    ) -> Self {
        Self {
            id,
            surface,
            store,
            tracker: IntentTracker::new(),
            resolver,
            recovery,
            interval,
        }
    }

    pub fn current_action(&self) -> Action {
        self.tracker.current()
    }

    pub fn surface(&self) -> &S {
        &self.surface
    }

    /// Log in, then run cycles on the fixed cadence until an exit intent
    /// completes or `cancel` fires.
    pub async fn run(&mut self, cancel: &CancellationToken) {
        match self
            .recovery
            .login_until_joined(&mut self.surface, cancel)
            .await
        {
            Some(name) => tracing::info!(worker = %self.id, %name, "worker ready"),
            None => {
                tracing::info!(worker = %self.id, "shutdown requested before login completed");
                return;
            }
        }

        loop {
            if cancel.is_cancelled() {
                tracing::info!(worker = %self.id, "shutdown requested");
                return;
            }
            let started = Instant::now();
            if self.run_cycle(cancel).await == CycleOutcome::Stop {
                tracing::info!(worker = %self.id, "exit complete, stopping");
                return;
            }
            let delay = pace_delay(self.interval, started.elapsed());
            tokio::select! {
                _ = cancel.cancelled() => {}
                _ = tokio::time::sleep(delay) => {}
            }
        }
    }

    /// Read the record, run maintenance and execute the current action once.
    pub async fn run_cycle(&mut self, cancel: &CancellationToken) -> CycleOutcome {
        let read = self.store.read(self.id).unwrap_or_else(|e| {
            tracing::warn!(worker = %self.id, error = %e, "failed to read intent record");
            IntentRead::Empty
        });
        let observation = self.tracker.observe(read);
        self.log_observation(observation);

        let action = self.tracker.current();
        if action != Action::Exit {
            self.recovery.maintain(&mut self.surface, cancel).await;
        }

        let resolution = self.resolver.resolve(&mut self.surface, action).await;
        self.log_resolution(action, &resolution);

        if action == Action::Exit {
            CycleOutcome::Stop
        } else {
            CycleOutcome::Continue
        }
    }

    fn log_observation(&self, observation: Observation) {
        match observation {
            Observation::Adopted { action, version } => {
                tracing::info!(worker = %self.id, %action, version, "adopted new intent")
            }
            Observation::Invalidated { raw, version } => tracing::warn!(
                worker = %self.id,
                %raw,
                version,
                "record names no valid intent, reverting to default"
            ),
            Observation::Stale { version } => {
                tracing::debug!(worker = %self.id, version, "intent unchanged")
            }
            Observation::Empty => tracing::debug!(worker = %self.id, "intent record empty"),
            Observation::Malformed(detail) => {
                tracing::warn!(worker = %self.id, %detail, "malformed intent record ignored")
            }
        }
    }

    fn log_resolution(&self, action: Action, resolution: &Resolution) {
        match &resolution.outcome {
            Ok(_) => tracing::info!(worker = %self.id, %action, trail = %resolution, "action committed"),
            Err(failure) => tracing::warn!(
                worker = %self.id,
                %action,
                %failure,
                trail = %resolution,
                "action not committed"
            ),
        }
    }
}
