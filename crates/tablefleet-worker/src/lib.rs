//! Worker-side engines for tablefleet.
//!
//! A worker polls its intent record, keeps its table session healthy, and
//! turns the current intent into a committed move on the remote page:
//!
//! - [`intent`]: version-gated intent tracking.
//! - [`resolve`]: the fallback cascade from intent to committed move.
//! - [`recovery`]: login, refresh detection, heartbeat and buy-back.
//! - [`cycle`]: the fixed-cadence loop tying them together.
//!
//! All engines talk to the page through the [`RemoteSurface`] trait;
//! [`CdpSurface`] implements it over a CDP browser driver.

pub mod cdp_surface;
pub mod cycle;
pub mod intent;
pub mod names;
pub mod params;
pub mod recovery;
pub mod resolve;
pub mod retry;
pub mod surface;

#[cfg(test)]
mod testing;

pub use cdp_surface::CdpSurface;
pub use cycle::{pace_delay, CycleOutcome, Worker};
pub use intent::{IntentTracker, Observation};
pub use names::NameGenerator;
pub use params::{parse_threshold, validate_url, WorkerParams};
pub use recovery::{LoginError, Recovery};
pub use resolve::{Attempt, Failure, Move, Resolution, Resolver, Step};
pub use retry::RetryPolicy;
pub use surface::{Budgets, RemoteSurface, SurfaceError};
