//! Environment variables of the worker launch contract.

/// Worker identity.
pub const WORKER_ID_ENV: &str = "TABLEFLEET_WORKER_ID";

/// Target table URL.
pub const TARGET_URL_ENV: &str = "TABLEFLEET_TARGET_URL";

/// Call threshold in whole currency units.
pub const CALL_THRESHOLD_ENV: &str = "TABLEFLEET_CALL_THRESHOLD";

/// Fleet root directory.
pub const ROOT_ENV: &str = "TABLEFLEET_ROOT";
