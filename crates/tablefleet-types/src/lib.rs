//! Core types shared across all tablefleet crates.
//!
//! Defines the intent actions, the per-worker intent record and its file
//! store, worker identities, currency amounts, the remote-surface control
//! vocabulary, configuration, and the shared error type used by the worker,
//! the supervisor, and the CLI.

pub mod action;
pub mod amount;
pub mod config;
pub mod control;
pub mod env;
pub mod error;
pub mod ids;
pub mod intent;

pub use action::{Action, MaintenanceStep};
pub use amount::Amount;
pub use config::{
    default_root, BrowserSettings, FleetConfig, NamePool, SupervisorSettings, SurfaceProfile,
    WorkerSettings, CONFIG_FILENAME,
};
pub use control::Control;
pub use error::FleetError;
pub use ids::WorkerId;
pub use intent::{IntentRead, IntentRecord, IntentStore, RecordedAction};
