//! Worker identity.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Small non-negative integer naming one worker slot.
///
/// Unique among live workers; the supervisor reuses an identity only after
/// its previous holder has fully retired.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct WorkerId(pub u32);

impl WorkerId {
    pub fn get(&self) -> u32 {
        self.0
    }
}

impl fmt::Display for WorkerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for WorkerId {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        trimmed
            .parse::<u32>()
            .map(WorkerId)
            .map_err(|_| format!("worker id must be a non-negative integer, got {trimmed:?}"))
    }
}
