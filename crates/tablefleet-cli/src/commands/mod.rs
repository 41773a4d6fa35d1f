//! CLI command implementations for the `tablefleet` binary.

pub mod status;
pub mod supervise;
pub mod worker;
