//! The world a command source acts against, seen through a narrow contract.

use glam::DVec3;
use mdcommand_core::{DimensionId, Rotation};

/// Read-only view of one entity at the time a command looked it up.
#[derive(Debug, Clone, PartialEq)]
pub struct EntitySnapshot {
    /// Stable entity id.
    pub id: u64,
    /// Display/text name (player name for players).
    pub name: String,
    /// Entity type key, e.g. `minecraft:zombie`.
    pub kind: String,
    /// Feet position.
    pub position: DVec3,
    /// Look orientation.
    pub rotation: Rotation,
    /// Dimension the entity is in.
    pub dimension: DimensionId,
    /// Eye offset above the feet.
    pub eye_height: f64,
    /// Whether the entity is a connected player.
    pub is_player: bool,
}

impl EntitySnapshot {
    /// Entity type key used for players.
    pub const PLAYER_KIND: &'static str = "minecraft:player";

    /// A player standing at `position` in the Overworld.
    pub fn player(id: u64, name: impl Into<String>, position: DVec3) -> Self {
        Self {
            id,
            name: name.into(),
            kind: Self::PLAYER_KIND.to_string(),
            position,
            rotation: Rotation::ZERO,
            dimension: DimensionId::DEFAULT,
            eye_height: 1.62,
            is_player: true,
        }
    }

    /// A non-player entity of `kind`.
    pub fn mob(id: u64, kind: impl Into<String>, position: DVec3) -> Self {
        let kind = kind.into();
        let name = kind.rsplit(':').next().unwrap_or_default().to_string();
        Self {
            id,
            name,
            kind,
            position,
            rotation: Rotation::ZERO,
            dimension: DimensionId::DEFAULT,
            eye_height: 1.0,
            is_player: false,
        }
    }

    /// Eye position.
    pub fn eye_position(&self) -> DVec3 {
        self.position + DVec3::new(0.0, self.eye_height, 0.0)
    }
}

/// Collaborator that owns world state and permission storage.
///
/// Implementations must be cheap to call from parse and suggestion paths.
pub trait CommandHost: Send + Sync {
    /// Whether `principal` holds `permission` in the external permission store.
    fn has_permission(&self, principal: &str, permission: &str) -> bool;

    /// Every entity currently loaded, in a stable order.
    fn entities(&self) -> Vec<EntitySnapshot>;

    /// Entity by id.
    fn entity(&self, id: u64) -> Option<EntitySnapshot> {
        self.entities().into_iter().find(|e| e.id == id)
    }

    /// Whether `viewer` may see `target` in lists and completions.
    fn can_see(&self, _viewer: &str, _target: &str) -> bool {
        true
    }

    /// Names of connected players.
    fn player_names(&self) -> Vec<String> {
        self.entities()
            .into_iter()
            .filter(|e| e.is_player)
            .map(|e| e.name)
            .collect()
    }

    /// Relay command feedback to operators other than `from`.
    fn broadcast_to_admins(&self, _from: &str, _message: &str) {}
}

/// A host with no entities that grants nothing.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullHost;

impl CommandHost for NullHost {
    fn has_permission(&self, _principal: &str, _permission: &str) -> bool {
        false
    }

    fn entities(&self) -> Vec<EntitySnapshot> {
        Vec::new()
    }
}
