//! Per-worker intent records and their flat-file store.
//!
//! Each worker owns one record file at `<root>/workers/<id>/intent.json`
//! holding `{"version": <u64>, "action": "<action>"}`. The supervisor is the
//! only writer and replaces the whole file on every write (temp file, then
//! rename), so no locking is needed. The worker is the only reader and must
//! tolerate empty or malformed content, which it treats as "no new intent".

use std::fmt;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::action::{Action, MaintenanceStep};
use crate::error::FleetError;
use crate::ids::WorkerId;

/// Record file name inside a worker directory.
pub const RECORD_FILENAME: &str = "intent.json";

/// Log file name inside a worker directory.
pub const LOG_FILENAME: &str = "worker.log";

/// A record as written by the supervisor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct IntentRecord {
    pub version: u64,
    pub action: Action,
}

/// Wire shape accepted on read. `command` is the legacy field name.
#[derive(Debug, Deserialize)]
struct WireRecord {
    version: u64,
    #[serde(alias = "command")]
    action: String,
}

/// The action named by a well-formed record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecordedAction {
    Known(Action),
    /// A maintenance step name. Workers run these internally; a record
    /// naming one is not a valid intent.
    Maintenance(MaintenanceStep),
    Unrecognized(String),
}

impl RecordedAction {
    fn classify(raw: &str) -> Self {
        if let Ok(action) = raw.parse::<Action>() {
            return RecordedAction::Known(action);
        }
        match MaintenanceStep::from_wire(raw.trim()) {
            Some(step) => RecordedAction::Maintenance(step),
            None => RecordedAction::Unrecognized(raw.to_string()),
        }
    }
}

impl fmt::Display for RecordedAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RecordedAction::Known(a) => write!(f, "{a}"),
            RecordedAction::Maintenance(s) => write!(f, "{s}"),
            RecordedAction::Unrecognized(raw) => write!(f, "{raw:?}"),
        }
    }
}

/// Outcome of reading a worker's record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IntentRead {
    Intent { version: u64, action: RecordedAction },
    Empty,
    Malformed(String),
}

/// Parse record file content.
pub fn parse_record(content: &str) -> IntentRead {
    let trimmed = content.trim();
    if trimmed.is_empty() {
        return IntentRead::Empty;
    }
    match serde_json::from_str::<WireRecord>(trimmed) {
        Ok(wire) => IntentRead::Intent {
            version: wire.version,
            action: RecordedAction::classify(&wire.action),
        },
        Err(e) => IntentRead::Malformed(format!("{e}: {trimmed:?}")),
    }
}

/// Flat-file store of intent records rooted at the fleet directory.
#[derive(Debug, Clone)]
pub struct IntentStore {
    root: PathBuf,
}

impl IntentStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn worker_dir(&self, id: WorkerId) -> PathBuf {
        self.root.join("workers").join(id.to_string())
    }

    pub fn record_path(&self, id: WorkerId) -> PathBuf {
        self.worker_dir(id).join(RECORD_FILENAME)
    }

    pub fn log_path(&self, id: WorkerId) -> PathBuf {
        self.worker_dir(id).join(LOG_FILENAME)
    }

    /// Replace the worker's record with `{version, action}`.
    ///
    /// Creates the worker directory if needed. Writing the same record twice
    /// is a no-op from the reader's point of view.
    pub fn write(&self, id: WorkerId, action: Action, version: u64) -> Result<(), FleetError> {
        let record = IntentRecord { version, action };
        let json = serde_json::to_string(&record)
            .map_err(|e| FleetError::StoreError(format!("failed to serialize record: {e}")))?;
        self.replace(id, &json)?;
        tracing::debug!(worker = %id, %action, version, "intent record written");
        Ok(())
    }

    /// Read the worker's record, creating an empty one if none exists.
    pub fn read(&self, id: WorkerId) -> Result<IntentRead, FleetError> {
        let path = self.record_path(id);
        match fs::read_to_string(&path) {
            Ok(content) => Ok(parse_record(&content)),
            Err(e) if e.kind() == ErrorKind::NotFound => {
                tracing::info!(path = %path.display(), "intent record missing, creating empty");
                self.replace(id, "")?;
                Ok(IntentRead::Empty)
            }
            Err(e) => Err(FleetError::StoreError(format!(
                "failed to read {}: {e}",
                path.display()
            ))),
        }
    }

    /// Empty the worker's record.
    pub fn clear(&self, id: WorkerId) -> Result<(), FleetError> {
        self.replace(id, "")
    }

    /// Empty the record only if it still holds `exit` at `version`.
    ///
    /// Used for the delayed clear after an exit so that a record rewritten in
    /// the meantime (a restart re-asserting the standing intent) survives.
    pub fn clear_exit(&self, id: WorkerId, version: u64) -> Result<bool, FleetError> {
        let still_exit = matches!(
            self.read(id)?,
            IntentRead::Intent {
                version: v,
                action: RecordedAction::Known(Action::Exit),
            } if v == version
        );
        if still_exit {
            self.clear(id)?;
        }
        Ok(still_exit)
    }

    /// Identities that have a worker directory, sorted.
    pub fn known_workers(&self) -> Result<Vec<WorkerId>, FleetError> {
        let dir = self.root.join("workers");
        let entries = match fs::read_dir(&dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => {
                return Err(FleetError::StoreError(format!(
                    "failed to list {}: {e}",
                    dir.display()
                )))
            }
        };
        let mut ids: Vec<WorkerId> = entries
            .filter_map(|entry| entry.ok())
            .filter_map(|entry| entry.file_name().to_str()?.parse().ok())
            .collect();
        ids.sort();
        Ok(ids)
    }

    fn replace(&self, id: WorkerId, content: &str) -> Result<(), FleetError> {
        let path = self.record_path(id);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|e| {
                FleetError::StoreError(format!("failed to create {}: {e}", parent.display()))
            })?;
        }
        let tmp_path = path.with_extension("json.tmp");
        fs::write(&tmp_path, content)
            .map_err(|e| FleetError::StoreError(format!("failed to write record tmp: {e}")))?;
        fs::rename(&tmp_path, &path)
            .map_err(|e| FleetError::StoreError(format!("failed to rename record: {e}")))?;
        Ok(())
    }
}
