//! Error types shared across all tablefleet crates.

/// Errors that can occur across the tablefleet runtime.
///
/// Each variant corresponds to a subsystem: the intent store, configuration,
/// worker process management, or startup parameter validation.
#[derive(Debug, thiserror::Error)]
pub enum FleetError {
    #[error("intent store error: {0}")]
    StoreError(String),

    #[error("configuration error: {0}")]
    ConfigError(String),

    #[error("worker process error: {0}")]
    ProcessError(String),

    #[error("invalid startup parameter: {0}")]
    StartupError(String),
}
