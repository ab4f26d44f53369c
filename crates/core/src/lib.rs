#![warn(missing_docs)]
//! Core primitives shared across the command workspace.

pub mod dimension;
pub mod rotation;

use serde::{Deserialize, Serialize};

pub use dimension::{DimensionId, ParseDimensionError};
pub use glam::DVec3;
pub use rotation::{facing_rotation, wrap_degrees, Rotation};

/// Fixed tick type (20 TPS => 50 ms per tick).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SimTick(pub u64);

impl SimTick {
    /// First tick in any deterministic timeline.
    pub const ZERO: Self = Self(0);

    /// Advance by `delta` ticks.
    pub fn advance(self, delta: u64) -> Self {
        Self(self.0 + delta)
    }
}

/// Permission level granted to everyone.
pub const LEVEL_ALL: i32 = 0;
/// Permission level for moderators.
pub const LEVEL_MODERATORS: i32 = 1;
/// Permission level for game masters (selectors, most world commands).
pub const LEVEL_GAMEMASTERS: i32 = 2;
/// Permission level for administrators.
pub const LEVEL_ADMINS: i32 = 3;
/// Permission level for server owners and the console.
pub const LEVEL_OWNERS: i32 = 4;
