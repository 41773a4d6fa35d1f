//! The supervisor context.
//!
//! [`Supervisor`] owns the fleet's counters and worker handles. Deferred work
//! (the forced kill after an exit grace window, the delayed clear of an exit
//! record) runs on timed tasks that report back through [`SupervisorEvent`]s,
//! which the owner of the context feeds into [`Supervisor::handle_event`].

use std::collections::{BTreeMap, BTreeSet};
use std::time::Duration;

use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use tablefleet_types::{Action, FleetError, IntentStore, SupervisorSettings, WorkerId};

use crate::handle::{LaunchContext, LogMode, WorkerHandle, WorkerLaunch, WorkerStatus};
use crate::identity::allocate_identity;
use crate::kill_tree::{kill_tree, KillTreeConfig};

/// Completion notices from deferred supervisor tasks.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SupervisorEvent {
    /// A killed worker's process tree is gone and its identity is free.
    Retired { id: WorkerId },
    /// The delayed clear of an exit record ran. `cleared` is false when the
    /// record had been rewritten in the meantime.
    RecordCleared {
        id: WorkerId,
        version: u64,
        cleared: bool,
    },
}

/// What the status listing shows for one identity.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MemberState {
    Running { pid: u32, uptime: Duration },
    Exited { code: Option<i32> },
    /// Told to exit; waiting for the grace window and forced termination.
    Retiring,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MemberSummary {
    pub id: WorkerId,
    pub state: MemberState,
    pub respawn_pending: bool,
}

pub struct Supervisor {
    settings: SupervisorSettings,
    store: IntentStore,
    launch: WorkerLaunch,
    context: LaunchContext,
    version: u64,
    current: Action,
    workers: BTreeMap<WorkerId, WorkerHandle>,
    retiring: BTreeSet<WorkerId>,
    pending_respawn: BTreeSet<WorkerId>,
    /// Exit records awaiting their delayed clear, by the version written.
    pending_clears: BTreeMap<WorkerId, u64>,
    shutting_down: bool,
    events: mpsc::UnboundedSender<SupervisorEvent>,
}

impl Supervisor {
    /// Create an empty fleet. The receiver must be drained into
    /// [`handle_event`](Self::handle_event).
    pub fn new(
        settings: SupervisorSettings,
        store: IntentStore,
        launch: WorkerLaunch,
        context: LaunchContext,
    ) -> (Self, mpsc::UnboundedReceiver<SupervisorEvent>) {
        let (events, rx) = mpsc::unbounded_channel();
        let supervisor = Self {
            settings,
            store,
            launch,
            context,
            version: 0,
            current: Action::SAFE_DEFAULT,
            workers: BTreeMap::new(),
            retiring: BTreeSet::new(),
            pending_respawn: BTreeSet::new(),
            pending_clears: BTreeMap::new(),
            shutting_down: false,
            events,
        };
        (supervisor, rx)
    }

    pub fn version(&self) -> u64 {
        self.version
    }

    /// The standing intent new workers receive.
    pub fn current(&self) -> Action {
        self.current
    }

    pub fn store(&self) -> &IntentStore {
        &self.store
    }

    pub fn live_ids(&self) -> Vec<WorkerId> {
        self.workers.keys().copied().collect()
    }

    pub fn is_retiring(&self, id: WorkerId) -> bool {
        self.retiring.contains(&id)
    }

    pub fn pid_of(&self, id: WorkerId) -> Option<u32> {
        self.workers.get(&id).map(WorkerHandle::pid)
    }

    fn exit_grace(&self) -> Duration {
        Duration::from_millis(self.settings.exit_grace_ms)
    }

    fn kill_config(&self) -> KillTreeConfig {
        KillTreeConfig {
            grace_period: Duration::from_millis(self.settings.kill_grace_ms),
            ..KillTreeConfig::default()
        }
    }

    /// Launch `count` workers with freshly allocated identities.
    pub fn start(&mut self, count: usize) -> Result<Vec<WorkerId>, FleetError> {
        (0..count).map(|_| self.spawn_worker()).collect()
    }

    /// Launch one worker under the lowest free identity.
    pub fn spawn_worker(&mut self) -> Result<WorkerId, FleetError> {
        let in_use = self
            .workers
            .keys()
            .chain(self.retiring.iter())
            .chain(self.pending_respawn.iter())
            .copied();
        let id = allocate_identity(in_use);
        self.spawn(id, LogMode::Fresh)?;
        Ok(id)
    }

    fn spawn(&mut self, id: WorkerId, mode: LogMode) -> Result<(), FleetError> {
        self.store.write(id, self.current, self.version)?;
        let log_path = self.store.log_path(id);
        let handle = WorkerHandle::spawn(id, &self.launch, &self.context, &log_path, mode)?;
        info!(
            worker = %id,
            pid = handle.pid(),
            action = %self.current,
            version = self.version,
            log = %log_path.display(),
            "worker spawned"
        );
        self.workers.insert(id, handle);
        Ok(())
    }

    /// Address `action` to every live worker under one new version.
    ///
    /// A standing action also becomes the intent for workers spawned later.
    /// Returns the new version.
    pub fn broadcast(&mut self, action: Action) -> u64 {
        self.version += 1;
        let version = self.version;
        if action.is_standing() {
            self.current = action;
        }

        let ids = self.live_ids();
        for &id in &ids {
            match self.store.write(id, action, version) {
                Ok(()) => {
                    if action == Action::Exit {
                        self.schedule_clear(id, version);
                    }
                }
                Err(e) => warn!(worker = %id, error = %e, "failed to write intent record"),
            }
        }
        info!(%action, version, workers = ids.len(), "intent broadcast");
        version
    }

    /// Tell one worker to exit, then force-terminate it after the grace
    /// window.
    pub fn kill(&mut self, id: WorkerId) -> Result<(), FleetError> {
        let handle = self
            .workers
            .remove(&id)
            .ok_or_else(|| FleetError::ProcessError(format!("no live worker with id {id}")))?;

        self.version += 1;
        let version = self.version;
        match self.store.write(id, Action::Exit, version) {
            Ok(()) => self.schedule_clear(id, version),
            Err(e) => warn!(worker = %id, error = %e, "failed to write exit record"),
        }
        self.retiring.insert(id);
        info!(worker = %id, pid = handle.pid(), version, "worker told to exit");

        let grace = self.exit_grace();
        let config = self.kill_config();
        let events = self.events.clone();
        tokio::spawn(async move {
            tokio::time::sleep(grace).await;
            if let Err(e) = tokio::task::spawn_blocking(move || terminate(handle, &config)).await {
                warn!(worker = %id, error = %e, "termination task failed");
            }
            let _ = events.send(SupervisorEvent::Retired { id });
        });
        Ok(())
    }

    /// Re-spawn `id` under the same identity once its current holder has
    /// retired. The log is appended to and the standing intent re-asserted.
    ///
    /// Only a live or retiring identity can be restarted.
    pub fn restart(&mut self, id: WorkerId) -> Result<(), FleetError> {
        if self.workers.contains_key(&id) {
            self.kill(id)?;
        } else if !self.retiring.contains(&id) {
            return Err(FleetError::ProcessError(format!(
                "no live or retiring worker with id {id}"
            )));
        }
        self.pending_respawn.insert(id);
        info!(worker = %id, "restart scheduled after retirement");
        Ok(())
    }

    /// Apply a completion notice from a deferred task.
    pub fn handle_event(&mut self, event: &SupervisorEvent) -> Result<(), FleetError> {
        match *event {
            SupervisorEvent::Retired { id } => {
                self.retiring.remove(&id);
                info!(worker = %id, "worker retired");
                if self.pending_respawn.remove(&id) && !self.shutting_down {
                    self.spawn(id, LogMode::Append)?;
                }
            }
            SupervisorEvent::RecordCleared {
                id,
                version,
                cleared,
            } => {
                if self.pending_clears.get(&id) == Some(&version) {
                    self.pending_clears.remove(&id);
                }
                if cleared {
                    debug!(worker = %id, version, "exit record cleared");
                } else {
                    debug!(worker = %id, version, "exit record superseded, left in place");
                }
            }
        }
        Ok(())
    }

    fn schedule_clear(&mut self, id: WorkerId, version: u64) {
        self.pending_clears.insert(id, version);
        let delay = Duration::from_millis(self.settings.exit_clear_delay_ms);
        let store = self.store.clone();
        let events = self.events.clone();
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            let cleared = store.clear_exit(id, version).unwrap_or_else(|e| {
                warn!(worker = %id, error = %e, "failed to clear exit record");
                false
            });
            let _ = events.send(SupervisorEvent::RecordCleared {
                id,
                version,
                cleared,
            });
        });
    }

    pub fn statuses(&mut self) -> Vec<MemberSummary> {
        let mut members: Vec<MemberSummary> = self
            .workers
            .iter_mut()
            .map(|(&id, handle)| {
                let state = match handle.status() {
                    WorkerStatus::Running { pid } => MemberState::Running {
                        pid,
                        uptime: handle.started_at.elapsed(),
                    },
                    WorkerStatus::Exited { code } => MemberState::Exited { code },
                };
                MemberSummary {
                    id,
                    state,
                    respawn_pending: false,
                }
            })
            .collect();
        members.extend(self.retiring.iter().map(|&id| MemberSummary {
            id,
            state: MemberState::Retiring,
            respawn_pending: self.pending_respawn.contains(&id),
        }));
        members.sort_by_key(|m| m.id);
        members
    }

    /// Broadcast exit, wait the grace window, then force-terminate every
    /// worker and wait for pending retirements.
    ///
    /// Exit records whose delayed clear has not run yet are cleared before
    /// returning, since the timed tasks die with the runtime.
    pub async fn shutdown(&mut self, events: &mut mpsc::UnboundedReceiver<SupervisorEvent>) {
        self.shutting_down = true;
        self.pending_respawn.clear();
        if !self.workers.is_empty() {
            self.broadcast(Action::Exit);
            tokio::time::sleep(self.exit_grace()).await;
        }

        let config = self.kill_config();
        let mut tasks = Vec::new();
        for (id, handle) in std::mem::take(&mut self.workers) {
            let config = config.clone();
            let task = tokio::task::spawn_blocking(move || terminate(handle, &config));
            tasks.push((id, task));
        }
        for (id, task) in tasks {
            if let Err(e) = task.await {
                warn!(worker = %id, error = %e, "termination task failed");
            }
        }

        let patience = self.exit_grace() + config.grace_period + Duration::from_secs(1);
        while !self.retiring.is_empty() {
            match tokio::time::timeout(patience, events.recv()).await {
                Ok(Some(event)) => {
                    if let Err(e) = self.handle_event(&event) {
                        warn!(error = %e, "event handling failed during shutdown");
                    }
                }
                Ok(None) | Err(_) => {
                    warn!(
                        remaining = self.retiring.len(),
                        "gave up waiting for retiring workers"
                    );
                    break;
                }
            }
        }
        self.flush_clears();
        info!("all workers terminated");
    }

    /// Clear every exit record still waiting on its timed clear. Records
    /// rewritten since keep their content.
    fn flush_clears(&mut self) {
        for (id, version) in std::mem::take(&mut self.pending_clears) {
            match self.store.clear_exit(id, version) {
                Ok(true) => debug!(worker = %id, version, "exit record cleared at shutdown"),
                Ok(false) => debug!(worker = %id, version, "exit record superseded, left in place"),
                Err(e) => warn!(worker = %id, error = %e, "failed to clear exit record"),
            }
        }
    }
}

/// Kill a worker's process tree if it still runs, then reap it.
fn terminate(mut handle: WorkerHandle, config: &KillTreeConfig) {
    let id = handle.id;
    match handle.status() {
        WorkerStatus::Running { pid } => {
            if let Err(e) = kill_tree(pid as i32, config) {
                warn!(worker = %id, pid, error = %e, "failed to terminate worker tree");
            }
        }
        WorkerStatus::Exited { code } => {
            debug!(worker = %id, ?code, "worker already exited");
            return;
        }
    }
    match handle.child.wait() {
        Ok(status) => debug!(worker = %id, %status, "worker reaped"),
        Err(e) => warn!(worker = %id, error = %e, "failed to reap worker"),
    }
}
