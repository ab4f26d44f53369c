//! In-memory world the console binary runs commands against.

use std::sync::{Mutex, MutexGuard};

use glam::DVec3;
use indexmap::{IndexMap, IndexSet};
use mdcommand_core::{DimensionId, SimTick};
use mdcommand_server::{CommandHost, CommandOutput, EntitySnapshot};
use tracing::info;

/// Ticks in one in-game day.
pub const DAY_LENGTH: u64 = 24_000;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Weather {
    #[default]
    Clear,
    Rain,
    Thunder,
}

impl Weather {
    pub fn name(self) -> &'static str {
        match self {
            Self::Clear => "clear",
            Self::Rain => "rain",
            Self::Thunder => "thunder",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Gamemode {
    #[default]
    Survival,
    Creative,
}

impl Gamemode {
    pub fn display_name(self) -> &'static str {
        match self {
            Self::Survival => "Survival Mode",
            Self::Creative => "Creative Mode",
        }
    }
}

#[derive(Debug, Default)]
struct WorldState {
    entities: Vec<EntitySnapshot>,
    next_id: u64,
    game_time: u64,
    day_time: u64,
    weather: Weather,
    gamemodes: IndexMap<u64, Gamemode>,
    chat: Vec<String>,
}

/// Entities, clock, weather and chat for one console session.
#[derive(Debug, Default)]
pub struct ConsoleWorld {
    state: Mutex<WorldState>,
    grants: IndexSet<(String, String)>,
}

impl ConsoleWorld {
    /// World with `players` standing in a row at the spawn point.
    pub fn new<'a>(
        players: impl IntoIterator<Item = &'a str>,
        grants: &IndexMap<String, Vec<String>>,
    ) -> Self {
        let world = Self {
            state: Mutex::default(),
            grants: grants
                .iter()
                .flat_map(|(principal, keys)| keys.iter().map(|k| (principal.clone(), k.clone())))
                .collect(),
        };
        for (i, name) in players.into_iter().enumerate() {
            world.spawn(|id| EntitySnapshot::player(id, name, DVec3::new(i as f64 * 4.0, 64.0, 0.0)));
        }
        world
    }

    fn state(&self) -> MutexGuard<'_, WorldState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn spawn(&self, make: impl FnOnce(u64) -> EntitySnapshot) -> EntitySnapshot {
        let mut state = self.state();
        state.next_id += 1;
        let entity = make(state.next_id);
        state.entities.push(entity.clone());
        entity
    }

    /// Move entity `id`. Returns the updated snapshot.
    pub fn teleport(
        &self,
        id: u64,
        position: DVec3,
        dimension: DimensionId,
    ) -> Option<EntitySnapshot> {
        let mut state = self.state();
        let entity = state.entities.iter_mut().find(|e| e.id == id)?;
        entity.position = position;
        entity.dimension = dimension;
        Some(entity.clone())
    }

    pub fn game_time(&self) -> u64 {
        self.state().game_time
    }

    pub fn day_time(&self) -> u64 {
        self.state().day_time
    }

    pub fn set_day_time(&self, tick: u64) {
        self.state().day_time = tick;
    }

    /// Advance both clocks by one tick.
    pub fn tick(&self) -> SimTick {
        let mut state = self.state();
        state.game_time += 1;
        state.day_time += 1;
        SimTick(state.game_time)
    }

    #[cfg(test)]
    pub fn weather(&self) -> Weather {
        self.state().weather
    }

    pub fn set_weather(&self, weather: Weather) {
        self.state().weather = weather;
    }

    pub fn gamemode(&self, id: u64) -> Gamemode {
        self.state().gamemodes.get(&id).copied().unwrap_or_default()
    }

    pub fn set_gamemode(&self, id: u64, mode: Gamemode) {
        self.state().gamemodes.insert(id, mode);
    }

    /// Deliver a chat line to everyone.
    pub fn broadcast(&self, line: String) {
        info!("[chat] {}", line);
        self.state().chat.push(line);
    }

    #[cfg(test)]
    pub fn chat(&self) -> Vec<String> {
        self.state().chat.clone()
    }
}

impl CommandHost for ConsoleWorld {
    fn has_permission(&self, principal: &str, permission: &str) -> bool {
        self.grants
            .contains(&(principal.to_string(), permission.to_string()))
    }

    fn entities(&self) -> Vec<EntitySnapshot> {
        self.state().entities.clone()
    }

    fn broadcast_to_admins(&self, _from: &str, message: &str) {
        info!("{}", message);
    }
}

/// Prints feedback to stdout.
#[derive(Debug, Default, Clone, Copy)]
pub struct StdoutOutput;

impl CommandOutput for StdoutOutput {
    fn send_system_message(&self, message: &str) {
        println!("{message}");
    }

    fn always_accepts(&self) -> bool {
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn players_spawn_in_order_with_fresh_ids() {
        let world = ConsoleWorld::new(["Alex", "Steve"], &IndexMap::new());
        let names: Vec<_> = world.entities().into_iter().map(|e| (e.id, e.name)).collect();
        assert_eq!(names, vec![(1, "Alex".to_string()), (2, "Steve".to_string())]);
        assert_eq!(world.player_names(), vec!["Alex", "Steve"]);
    }

    #[test]
    fn grants_come_from_config() {
        let mut grants = IndexMap::new();
        grants.insert("Steve".to_string(), vec!["commands.level.2".to_string()]);
        let world = ConsoleWorld::new(["Steve"], &grants);
        assert!(world.has_permission("Steve", "commands.level.2"));
        assert!(!world.has_permission("Steve", "commands.level.3"));
    }

    #[test]
    fn clocks_and_teleports_update_state() {
        let world = ConsoleWorld::new(["Alex"], &IndexMap::new());
        world.set_day_time(100);
        assert_eq!(world.tick(), SimTick(1));
        assert_eq!((world.game_time(), world.day_time()), (1, 101));

        let moved = world
            .teleport(1, DVec3::new(1.0, 2.0, 3.0), DimensionId::Nether)
            .unwrap();
        assert_eq!(moved.position, DVec3::new(1.0, 2.0, 3.0));
        assert_eq!(world.entity(1).unwrap().dimension, DimensionId::Nether);
        assert!(world.teleport(99, DVec3::ZERO, DimensionId::Overworld).is_none());
    }
}
